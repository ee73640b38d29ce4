//! Result accumulation and reuse grouping.

use std::collections::BTreeMap;

use super::models::{RequestResult, ReuseKey};

/// Reuse counts per connection, built from a full result log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReuseSummary {
    counts: BTreeMap<ReuseKey, u64>,
    /// Failed probes left out of the grouping.
    pub excluded_failures: usize,
}

impl ReuseSummary {
    /// Reuse count for `key`: sightings beyond the first.
    #[cfg(test)]
    pub fn get(&self, key: &ReuseKey) -> Option<u64> {
        self.counts.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ReuseKey, u64)> {
        self.counts.iter().map(|(k, v)| (k, *v))
    }
}

/// Ordered log of every probe outcome in a run.
#[derive(Debug, Default)]
pub struct Telemetry {
    results: Vec<RequestResult>,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a result. Failed probes are recorded too.
    pub fn record(&mut self, result: RequestResult) {
        self.results.push(result);
    }

    pub fn results(&self) -> &[RequestResult] {
        &self.results
    }

    /// Group successful probes by (IP, port, connection id).
    ///
    /// The first sighting of a key establishes the connection and counts 0;
    /// every later sighting counts as one reuse. Failed probes carry no
    /// observed connection and are only tallied in `excluded_failures`.
    pub fn summarize(&self) -> ReuseSummary {
        let mut summary = ReuseSummary::default();

        for result in &self.results {
            if result.is_error() {
                summary.excluded_failures += 1;
                continue;
            }

            summary
                .counts
                .entry(result.reuse_key())
                .and_modify(|count| *count += 1)
                .or_insert(0);
        }

        summary
    }

    /// Render the summary file: one line per probe, a blank separator, then
    /// the reuse block.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self.results.iter().map(probe_line).collect();
        let summary = self.summarize();

        lines.push(String::new());
        lines.push("Connection Reuse Summary:".to_string());
        for (key, reused) in summary.iter() {
            lines.push(format!(
                "IP: {} | Port: {} | Connection ID: {} | Reused Connections: {}",
                key.remote_ip, key.remote_port, key.connection_id, reused
            ));
        }
        if summary.excluded_failures > 0 {
            lines.push(format!(
                "Failed probes excluded: {}",
                summary.excluded_failures
            ));
        }

        lines
    }
}

fn probe_line(r: &RequestResult) -> String {
    let status = match &r.error {
        Some(reason) => format!("ERROR ({})", reason),
        None => r.status_code.to_string(),
    };

    format!(
        "Time: {} | URL: {} | IP: {} | Scheme: {} | Port: {} | Status: {} | Connection ID: {} | Xfer ID: {} | Local Port: {}",
        r.timestamp.to_rfc3339(),
        r.url,
        r.remote_ip,
        r.scheme,
        r.remote_port,
        status,
        r.connection_id,
        r.transfer_id,
        r.local_port
    )
}
