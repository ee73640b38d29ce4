//! reuseprobe - sequential HTTP connection reuse prober
//!
//! Issues one GET per input line, waits the requested interval, and reports
//! how often each underlying connection was reused.

mod config;
mod input;
mod probe;
mod scheduler;
mod sink;
mod telemetry;

use config::{ConfigError, RunConfig};
use probe::HttpTransport;
use scheduler::Scheduler;
use sink::{FileSink, LogSink};

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("reuseprobe=info".parse()?))
        .init();

    match run(std::env::args()).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("{}", e);
            tracing::error!("{}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run<I>(args: I) -> Result<(), ConfigError>
where
    I: IntoIterator<Item = String>,
{
    let input_path = config::input_path_from_args(args)?;
    run_with(&input_path, &RunConfig::load()).await?;
    Ok(())
}

/// Probe every target in `input_path`, returning the summary file path.
async fn run_with(input_path: &Path, cfg: &RunConfig) -> Result<PathBuf, ConfigError> {
    let (targets, errors) =
        input::load_targets(input_path).map_err(|source| ConfigError::Input {
            path: input_path.to_path_buf(),
            source,
        })?;

    let started = Utc::now();
    let log = create_sink(&cfg.log_path(input_path, started))?;
    let summary = create_sink(&cfg.summary_path(input_path, started))?;
    tracing::info!("Writing request log to {}", log.path().display());
    tracing::info!("Writing summary to {}", summary.path().display());

    for e in &errors {
        log.write_line(&e.to_string());
        tracing::warn!("Skipping input {}", e);
    }

    let (stop_tx, stop_rx) = watch::channel(false);
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping before the next probe");
            let _ = stop_tx.send(true);
        }
    });

    let scheduler = Scheduler::new(&log, &summary, cfg.request_timeout, stop_rx);
    scheduler.run(|| HttpTransport::new(cfg), &targets).await;
    interrupt.abort();

    Ok(summary.path().to_path_buf())
}

fn create_sink(path: &Path) -> Result<FileSink, ConfigError> {
    FileSink::create(path).map_err(|source| ConfigError::Output {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_run_without_input_argument_is_usage_error() {
        let result = run(vec!["reuseprobe".to_string()]).await;
        assert!(matches!(result, Err(ConfigError::Usage)));
    }

    #[tokio::test]
    async fn test_missing_input_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = RunConfig {
            output_dir: dir.path().to_path_buf(),
            ..Default::default()
        };

        let result = run_with(&dir.path().join("absent.csv"), &cfg).await;
        assert!(matches!(result, Err(ConfigError::Input { .. })));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_run_writes_log_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("targets.csv");
        std::fs::write(
            &input,
            "bad-interval,notanumber\nhttp://127.0.0.1:1/,0\nhttp://127.0.0.1:1/,0,internal.example\n",
        )
        .unwrap();
        let cfg = RunConfig {
            output_dir: dir.path().to_path_buf(),
            request_timeout: std::time::Duration::from_secs(2),
            ..Default::default()
        };

        let summary_path = assert_ok!(run_with(&input, &cfg).await);

        let summary = std::fs::read_to_string(&summary_path).unwrap();
        let lines: Vec<_> = summary.lines().collect();
        assert_eq!(lines.len(), 2 + 1 + 1 + 1);
        assert!(lines[0].contains("URL: http://127.0.0.1:1/ | IP:  | Scheme: http"));
        assert!(lines[0].contains("Status: ERROR"));
        assert_eq!(lines[3], "Connection Reuse Summary:");
        assert_eq!(lines[4], "Failed probes excluded: 2");

        let log_path = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .find(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().starts_with("probelog_targets_"))
                    .unwrap_or(false)
            })
            .unwrap();
        let log = std::fs::read_to_string(log_path).unwrap();
        assert!(log.starts_with("line 1: Failed to parse integer from 'notanumber'\n"));
        assert_eq!(log.matches("Performing request to").count(), 2);
        assert_eq!(log.matches("\nError: ").count(), 2);
        assert!(log.contains("Debug: HeaderOut - Host: internal.example"));
        assert!(log.trim_end().ends_with("Transport released"));
    }
}
