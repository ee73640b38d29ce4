//! Probe module: the HTTP transport and the single-probe executor.

mod conn_tracker;
mod executor;
mod http;

pub use conn_tracker::*;
pub use executor::*;
pub use http::*;

use reqwest::header::HeaderMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::sink::LogSink;

/// Probe error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid Host header '{0}'")]
    InvalidHeader(String),
    #[error("failed to read response body: {0}")]
    Body(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// A single GET as handed to the transport.
#[derive(Debug, Clone)]
pub struct ProbeRequest {
    pub url: String,
    pub headers: HeaderMap,
    pub timeout: Duration,
}

/// Per-transfer metadata. Fields the transport could not observe stay at
/// their zero value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferInfo {
    pub status_code: u16,
    pub scheme: String,
    pub remote_ip: String,
    pub local_port: u16,
    pub remote_port: u16,
    pub connection_id: u64,
    pub transfer_id: u64,
}

/// Everything a transport reports about one attempted transfer.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub info: TransferInfo,
    pub body: Vec<u8>,
    pub error: Option<ProbeError>,
}

impl TransferOutcome {
    pub fn completed(info: TransferInfo, body: Vec<u8>) -> Self {
        Self {
            info,
            body,
            error: None,
        }
    }

    pub fn failed(info: TransferInfo, error: ProbeError) -> Self {
        Self {
            info,
            body: Vec::new(),
            error: Some(error),
        }
    }
}

/// Kind of a transport trace line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceKind {
    Text,
    HeaderOut,
    HeaderIn,
}

impl fmt::Display for TraceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TraceKind::Text => "Text",
            TraceKind::HeaderOut => "HeaderOut",
            TraceKind::HeaderIn => "HeaderIn",
        };
        f.write_str(name)
    }
}

/// Write one debug trace line to `sink`.
pub fn trace(sink: &dyn LogSink, kind: TraceKind, message: &str) {
    sink.write_line(&format!("Debug: {} - {}", kind, message));
}

/// The HTTP capability a probe runs against.
///
/// Taking `&mut self` keeps the handle exclusive: only one transfer can be
/// in flight at a time.
pub trait Transport {
    /// Perform one GET. Never fails outright; errors are part of the outcome.
    async fn perform_get(&mut self, request: &ProbeRequest, trace: &dyn LogSink)
        -> TransferOutcome;

    /// Release process-wide transport state.
    fn close(&mut self) {}
}

impl<T: Transport> Transport for &mut T {
    async fn perform_get(&mut self, request: &ProbeRequest, trace: &dyn LogSink) -> TransferOutcome {
        (**self).perform_get(request, trace).await
    }

    fn close(&mut self) {
        (**self).close()
    }
}
