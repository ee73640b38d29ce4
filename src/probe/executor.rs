//! Single-probe execution.

use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, HOST};
use std::time::Duration;

use super::{ProbeError, ProbeRequest, TransferInfo, TransferOutcome, Transport};
use crate::input::ProbeTarget;
use crate::sink::LogSink;
use crate::telemetry::RequestResult;

/// Runs one probe at a time against a borrowed transport.
pub struct RequestExecutor<'a, T> {
    transport: &'a mut T,
    log: &'a dyn LogSink,
    timeout: Duration,
}

impl<'a, T: Transport> RequestExecutor<'a, T> {
    pub fn new(transport: &'a mut T, log: &'a dyn LogSink, timeout: Duration) -> Self {
        Self {
            transport,
            log,
            timeout,
        }
    }

    /// Probe `target` and describe what happened.
    ///
    /// Every outcome, including a malformed override or a transport failure,
    /// comes back as a `RequestResult`.
    pub async fn execute(&mut self, target: &ProbeTarget) -> RequestResult {
        let timestamp = Utc::now();
        self.log.write_line(&format!(
            "{} Performing request to {}",
            timestamp.to_rfc3339(),
            target.target
        ));

        let outcome = match build_headers(target) {
            Ok(headers) => {
                let request = ProbeRequest {
                    url: target.target.clone(),
                    headers,
                    timeout: self.timeout,
                };
                self.transport.perform_get(&request, self.log).await
            }
            Err(e) => TransferOutcome::failed(TransferInfo::default(), e),
        };

        match &outcome.error {
            Some(e) => {
                self.log.write_line(&format!("Error: {}", e));
                tracing::warn!("Probe to {} failed: {}", target.target, e);
            }
            None => {
                let info = &outcome.info;
                self.log.write_line(&format!(
                    "Response Data: {}",
                    String::from_utf8_lossy(&outcome.body)
                ));
                self.log
                    .write_line(&format!("Status Code: {}", info.status_code));
                self.log
                    .write_line(&format!("Connection ID: {}", info.connection_id));
                self.log.write_line(&format!("Xfer ID: {}", info.transfer_id));
                tracing::info!(
                    "Probe to {}: status {} via {}:{} (connection #{}, {} bytes)",
                    target.target,
                    info.status_code,
                    info.remote_ip,
                    info.remote_port,
                    info.connection_id,
                    outcome.body.len()
                );
            }
        }

        self.log.write_line(&format!(
            "{} Request completed to {}",
            Utc::now().to_rfc3339(),
            target.target
        ));

        let TransferOutcome { info, error, .. } = outcome;
        RequestResult {
            timestamp,
            url: target.target.clone(),
            connection_id: info.connection_id,
            transfer_id: info.transfer_id,
            remote_ip: info.remote_ip,
            scheme: info.scheme,
            local_port: info.local_port,
            remote_port: info.remote_port,
            status_code: info.status_code,
            error: error.map(|e| e.to_string()),
        }
    }
}

/// Headers for the probe: a `Host` override only when one was given.
fn build_headers(target: &ProbeTarget) -> Result<HeaderMap, ProbeError> {
    let mut headers = HeaderMap::new();
    if let Some(host) = &target.host_header {
        let value =
            HeaderValue::from_str(host).map_err(|_| ProbeError::InvalidHeader(host.clone()))?;
        headers.insert(HOST, value);
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::testing::{err_outcome, ok_outcome, ScriptedTransport};
    use crate::sink::MemorySink;

    #[tokio::test]
    async fn test_successful_probe_populates_result() {
        let mut transport =
            ScriptedTransport::new(vec![ok_outcome("10.0.0.1", 80, 3, 7, "<html>ok</html>")]);
        let log = MemorySink::new();
        let target = ProbeTarget::new("http://a.example/", 0, None);

        let result = RequestExecutor::new(&mut transport, &log, Duration::from_secs(10))
            .execute(&target)
            .await;

        assert!(!result.is_error());
        assert_eq!(result.url, "http://a.example/");
        assert_eq!(result.status_code, 200);
        assert_eq!(result.remote_ip, "10.0.0.1");
        assert_eq!(result.remote_port, 80);
        assert_eq!(result.local_port, 50003);
        assert_eq!(result.connection_id, 3);
        assert_eq!(result.transfer_id, 7);
        assert_eq!(result.scheme, "http");

        let lines = log.lines();
        assert!(lines[0].ends_with("Performing request to http://a.example/"));
        assert!(lines.contains(&"Debug: Text - scripted transfer".to_string()));
        assert!(lines.contains(&"Response Data: <html>ok</html>".to_string()));
        assert!(lines.contains(&"Connection ID: 3".to_string()));
        assert!(lines.contains(&"Xfer ID: 7".to_string()));
        assert!(lines.last().unwrap().ends_with("Request completed to http://a.example/"));
    }

    #[tokio::test]
    async fn test_failed_probe_is_captured_as_data() {
        let mut transport = ScriptedTransport::new(vec![err_outcome(2, "connection refused")]);
        let log = MemorySink::new();
        let target = ProbeTarget::new("http://down.example/", 0, None);

        let result = RequestExecutor::new(&mut transport, &log, Duration::from_secs(10))
            .execute(&target)
            .await;

        assert!(result.is_error());
        assert_eq!(
            result.error.as_deref(),
            Some("network error: connection refused")
        );
        assert_eq!(result.transfer_id, 2);
        assert_eq!(result.scheme, "http");
        assert_eq!(result.remote_ip, "");
        assert!(log
            .lines()
            .contains(&"Error: network error: connection refused".to_string()));
        assert!(!log.lines().iter().any(|l| l.starts_with("Response Data")));
    }

    #[tokio::test]
    async fn test_host_override_is_sent() {
        let mut transport = ScriptedTransport::new(vec![ok_outcome("1.2.3.4", 80, 0, 0, "")]);
        let log = MemorySink::new();
        let target = ProbeTarget::new("http://1.2.3.4/", 0, Some("internal.example"));

        RequestExecutor::new(&mut transport, &log, Duration::from_secs(10))
            .execute(&target)
            .await;

        assert_eq!(
            transport.requests,
            vec![(
                "http://1.2.3.4/".to_string(),
                Some("internal.example".to_string())
            )]
        );
    }

    #[tokio::test]
    async fn test_no_override_sends_no_host_header() {
        let mut transport = ScriptedTransport::new(vec![ok_outcome("1.2.3.4", 80, 0, 0, "")]);
        let log = MemorySink::new();
        let target = ProbeTarget::new("http://1.2.3.4/", 0, None);

        RequestExecutor::new(&mut transport, &log, Duration::from_secs(10))
            .execute(&target)
            .await;

        assert_eq!(transport.requests[0].1, None);
    }

    #[tokio::test]
    async fn test_invalid_override_skips_transport() {
        let mut transport = ScriptedTransport::default();
        let log = MemorySink::new();
        let target = ProbeTarget::new("http://1.2.3.4/", 0, Some("bad\nhost"));

        let result = RequestExecutor::new(&mut transport, &log, Duration::from_secs(10))
            .execute(&target)
            .await;

        assert!(result.is_error());
        assert!(transport.requests.is_empty());
        assert!(log.lines().iter().any(|l| l.starts_with("Error: invalid Host header")));
    }
}
