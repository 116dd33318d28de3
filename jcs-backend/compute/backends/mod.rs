pub mod hetzner;
pub mod local;
