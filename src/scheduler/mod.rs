//! Scheduler module for running the probe sequence.

use crate::input::ProbeTarget;
use crate::probe::{ProbeError, RequestExecutor, Transport};
use crate::sink::LogSink;
use crate::telemetry::Telemetry;

use chrono::Utc;
use std::time::Duration;
use tokio::sync::watch;

/// Walks the target list strictly in order, one probe at a time.
pub struct Scheduler<'a> {
    log: &'a dyn LogSink,
    summary: &'a dyn LogSink,
    request_timeout: Duration,
    stop: watch::Receiver<bool>,
}

impl<'a> Scheduler<'a> {
    /// Create a scheduler writing to the given sinks.
    ///
    /// Setting `stop` to true ends the run before the next probe is issued.
    pub fn new(
        log: &'a dyn LogSink,
        summary: &'a dyn LogSink,
        request_timeout: Duration,
        stop: watch::Receiver<bool>,
    ) -> Self {
        Self {
            log,
            summary,
            request_timeout,
            stop,
        }
    }

    /// Run every target and write the summary.
    ///
    /// `connect` acquires the transport once for the whole run. If it fails
    /// no probe is issued, but the summary is still written.
    pub async fn run<T, F>(&self, connect: F, targets: &[ProbeTarget]) -> Telemetry
    where
        T: Transport,
        F: FnOnce() -> Result<T, ProbeError>,
    {
        let mut telemetry = Telemetry::new();
        tracing::info!("Starting run with {} targets", targets.len());

        match connect() {
            Ok(mut transport) => {
                self.log.write_line("Transport ready");
                self.probe_all(&mut transport, targets, &mut telemetry).await;
                transport.close();
            }
            Err(e) => {
                self.log.write_line(&format!("Transport unavailable: {}", e));
                tracing::error!(
                    "Transport unavailable, skipping {} probes: {}",
                    targets.len(),
                    e
                );
            }
        }
        self.log.write_line("Transport released");

        for line in telemetry.summary_lines() {
            self.summary.write_line(&line);
        }

        let summary = telemetry.summarize();
        tracing::info!(
            "Run finished: {} probes, {} connections, {} failed",
            telemetry.results().len(),
            summary.len(),
            summary.excluded_failures
        );

        telemetry
    }

    async fn probe_all<T: Transport>(
        &self,
        transport: &mut T,
        targets: &[ProbeTarget],
        telemetry: &mut Telemetry,
    ) {
        let mut executor = RequestExecutor::new(transport, self.log, self.request_timeout);

        for (issued, target) in targets.iter().enumerate() {
            if *self.stop.borrow() {
                self.log.write_line(&format!(
                    "Run cancelled after {} of {} probes",
                    issued,
                    targets.len()
                ));
                tracing::warn!("Run cancelled after {} of {} probes", issued, targets.len());
                break;
            }

            let result = executor.execute(target).await;
            telemetry.record(result);

            self.log.write_line(&format!(
                "{} Wait for {}",
                Utc::now().to_rfc3339(),
                target.wait_seconds
            ));
            tokio::time::sleep(target.wait()).await;
        }
    }
}
