//! Telemetry model types.

use chrono::{DateTime, Utc};

/// Outcome of a single probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestResult {
    pub timestamp: DateTime<Utc>,
    pub url: String,
    pub connection_id: u64,
    pub transfer_id: u64,
    /// Empty when the transfer never reached a connected socket
    pub remote_ip: String,
    pub scheme: String,
    pub local_port: u16,
    pub remote_port: u16,
    /// Only meaningful when `error` is `None`
    pub status_code: u16,
    pub error: Option<String>,
}

impl RequestResult {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn reuse_key(&self) -> ReuseKey {
        ReuseKey {
            remote_ip: self.remote_ip.clone(),
            remote_port: self.remote_port,
            connection_id: self.connection_id,
        }
    }
}

/// Grouping key for connection reuse accounting.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReuseKey {
    pub remote_ip: String,
    pub remote_port: u16,
    pub connection_id: u64,
}
