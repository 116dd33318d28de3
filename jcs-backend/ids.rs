use crate::error::ControlError;

/// Random bytes per generated id (six hex characters).
pub const ID_BYTES: usize = 3;

/// Collisions tolerated before `unique_id` gives up.
pub const MAX_ID_ATTEMPTS: usize = 8;

const HEX: &[u8; 16] = b"0123456789abcdef";

/// [`ID_BYTES`] from the OS random source, lowercase hex encoded.
pub fn random_hex() -> Result<String, ControlError> {
    let mut bytes = [0u8; ID_BYTES];
    getrandom::fill(&mut bytes).map_err(|e| ControlError::Entropy(e.to_string()))?;

    let mut out = String::with_capacity(ID_BYTES * 2);
    for b in bytes {
        out.push(HEX[usize::from(b >> 4)] as char);
        out.push(HEX[usize::from(b & 0x0f)] as char);
    }
    Ok(out)
}

/// Generate `prefix` + [`ID_BYTES`] of hex until `taken` rejects none of them.
///
/// Callers run this while holding the write lock of the map the id is
/// inserted into, so the check and the insert cannot interleave with
/// another creator.
pub fn unique_id(
    kind: &'static str,
    prefix: &str,
    taken: impl Fn(&str) -> bool,
) -> Result<String, ControlError> {
    for _ in 0..MAX_ID_ATTEMPTS {
        let id = format!("{prefix}{}", random_hex()?);
        if !taken(&id) {
            return Ok(id);
        }
    }
    Err(ControlError::IdExhausted(kind))
}
