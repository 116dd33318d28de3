use std::time::Duration;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Limits applied to every outbound call (cloud provider and host agents).
#[derive(Debug, Clone)]
pub struct RemoteCallConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// In-flight requests allowed per remote client.
    pub max_in_flight: usize,
}

impl Default for RemoteCallConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_in_flight: 16,
        }
    }
}

/// Unreserved characters (RFC 3986) stay as-is inside a path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encode an id for use as a single URL path segment.
pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

/// Shared HTTP client; the timeouts bound every request made through it.
pub fn build_client(config: &RemoteCallConfig) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.timeout)
        .build()
}
