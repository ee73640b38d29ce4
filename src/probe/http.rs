//! HTTP probe transport.

use hyper_util::client::legacy::connect::HttpInfo;
use reqwest::header::HOST;
use reqwest::redirect::Policy;
use reqwest::{Client, Response, Url};
use std::time::Duration;

use super::{
    trace, ConnectionRegistry, ProbeError, ProbeRequest, TraceKind, TransferInfo,
    TransferOutcome, Transport,
};
use crate::config::RunConfig;
use crate::sink::LogSink;

/// Transport backed by one pooled `reqwest::Client`.
///
/// Certificate and hostname verification are disabled, redirects are not
/// followed, and idle connections stay pooled for the configured window.
pub struct HttpTransport {
    client: Option<Client>,
    connections: ConnectionRegistry,
    next_transfer_id: u64,
    verbose: bool,
}

impl HttpTransport {
    /// Build the client. This is the one-time acquisition for a run.
    pub fn new(config: &RunConfig) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .pool_idle_timeout(config.idle_timeout)
            .timeout(config.request_timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|e| ProbeError::Config(error_chain(&e)))?;

        Ok(Self {
            client: Some(client),
            connections: ConnectionRegistry::new(config.idle_timeout),
            next_transfer_id: 0,
            verbose: config.verbose,
        })
    }

    /// Fill in socket metadata from the connection the response arrived on.
    fn capture_connection(&mut self, response: &Response, info: &mut TransferInfo, sink: &dyn LogSink) {
        let Some(http_info) = response.extensions().get::<HttpInfo>() else {
            if self.verbose {
                trace(sink, TraceKind::Text, "Connection details unavailable");
            }
            return;
        };

        let remote = http_info.remote_addr();
        let local = http_info.local_addr();
        let sighting = self.connections.observe(local, remote);

        info.remote_ip = remote.ip().to_string();
        info.remote_port = remote.port();
        info.local_port = local.port();
        info.connection_id = sighting.id;

        if self.verbose {
            let message = if sighting.reused {
                format!(
                    "Re-using existing connection #{} with host {}",
                    sighting.id, remote
                )
            } else {
                format!(
                    "Connected to {} port {} from local port {} (#{})",
                    remote.ip(),
                    remote.port(),
                    local.port(),
                    sighting.id
                )
            };
            trace(sink, TraceKind::Text, &message);
        }
    }
}

impl Transport for HttpTransport {
    async fn perform_get(&mut self, request: &ProbeRequest, sink: &dyn LogSink) -> TransferOutcome {
        let mut info = TransferInfo {
            transfer_id: self.next_transfer_id,
            ..Default::default()
        };
        self.next_transfer_id += 1;

        let Some(client) = self.client.clone() else {
            return TransferOutcome::failed(
                info,
                ProbeError::Config("transport already closed".to_string()),
            );
        };

        let url = match Url::parse(&normalize_url(&request.url)) {
            Ok(url) => url,
            Err(e) => {
                return TransferOutcome::failed(
                    info,
                    ProbeError::InvalidUrl(format!("{}: {}", request.url, e)),
                )
            }
        };
        info.scheme = url.scheme().to_string();

        if self.verbose {
            trace_request(sink, &url, request);
        }

        let response = match client
            .get(url)
            .headers(request.headers.clone())
            .timeout(request.timeout)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return TransferOutcome::failed(info, classify_error(&e, request.timeout)),
        };

        // Metadata comes from the response head so a failed body read keeps it
        info.status_code = response.status().as_u16();
        self.capture_connection(&response, &mut info, sink);

        if self.verbose {
            trace(
                sink,
                TraceKind::HeaderIn,
                &format!("{:?} {}", response.version(), response.status()),
            );
            for (name, value) in response.headers() {
                trace(
                    sink,
                    TraceKind::HeaderIn,
                    &format!("{}: {}", name, String::from_utf8_lossy(value.as_bytes())),
                );
            }
        }

        match response.bytes().await {
            Ok(body) => TransferOutcome::completed(info, body.to_vec()),
            Err(e) => {
                let error = if e.is_timeout() {
                    ProbeError::Timeout(request.timeout)
                } else {
                    ProbeError::Body(error_chain(&e))
                };
                TransferOutcome::failed(info, error)
            }
        }
    }

    fn close(&mut self) {
        // Dropping the client closes every pooled connection
        if self.client.take().is_some() {
            tracing::info!(
                "HTTP transport closed: {} connection(s) over {} transfer(s)",
                self.connections.opened(),
                self.next_transfer_id
            );
            for (key, conn) in self.connections.connections() {
                tracing::debug!(
                    "Connection #{} {} -> {}: {} response(s) over {:?}",
                    conn.id,
                    key.local_addr,
                    key.remote_addr,
                    conn.response_count,
                    conn.last_seen.saturating_duration_since(conn.first_seen)
                );
            }
        }
    }
}

/// Default to plain HTTP when the target carries no scheme.
fn normalize_url(address: &str) -> String {
    if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    }
}

fn trace_request(sink: &dyn LogSink, url: &Url, request: &ProbeRequest) {
    let target = match url.query() {
        Some(q) => format!("{}?{}", url.path(), q),
        None => url.path().to_string(),
    };
    trace(sink, TraceKind::HeaderOut, &format!("GET {} HTTP/1.1", target));

    let host = match request.headers.get(HOST) {
        Some(value) => String::from_utf8_lossy(value.as_bytes()).into_owned(),
        None => {
            let host = url.host_str().unwrap_or_default();
            match url.port() {
                Some(port) => format!("{}:{}", host, port),
                None => host.to_string(),
            }
        }
    };
    trace(sink, TraceKind::HeaderOut, &format!("Host: {}", host));

    for (name, value) in request.headers.iter().filter(|(name, _)| **name != HOST) {
        trace(
            sink,
            TraceKind::HeaderOut,
            &format!("{}: {}", name, String::from_utf8_lossy(value.as_bytes())),
        );
    }
}

fn classify_error(err: &reqwest::Error, timeout: Duration) -> ProbeError {
    if err.is_timeout() {
        ProbeError::Timeout(timeout)
    } else if err.is_builder() {
        ProbeError::InvalidUrl(error_chain(err))
    } else {
        ProbeError::Network(error_chain(err))
    }
}

/// Render an error with its full source chain.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
