//! Configuration module for reuseprobe.
//!
//! Loads run settings from environment variables with sensible defaults.

use chrono::{DateTime, Utc};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Run-level configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("usage: reuseprobe <input_file>")]
    Usage,
    #[error("failed to read input {path}: {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to create {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Run configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Per-request timeout (default: 10s)
    pub request_timeout: Duration,
    /// How long an idle connection stays eligible for reuse (default: 90s)
    pub idle_timeout: Duration,
    /// Directory receiving the log and summary files (default: ".")
    pub output_dir: PathBuf,
    /// Write transport trace lines into the request log (default: true)
    pub verbose: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(90),
            output_dir: PathBuf::from("."),
            verbose: true,
        }
    }
}

impl RunConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `REUSEPROBE_TIMEOUT_SECS`: per-request timeout (default: 10)
    /// - `REUSEPROBE_IDLE_TIMEOUT_SECS`: reuse-eligibility window (default: 90)
    /// - `REUSEPROBE_OUTPUT_DIR`: output directory (default: ".")
    /// - `REUSEPROBE_VERBOSE`: "true"/"false" (default: true)
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(secs) = lookup("REUSEPROBE_TIMEOUT_SECS").and_then(|s| s.trim().parse().ok()) {
            cfg.request_timeout = Duration::from_secs(secs);
        }

        if let Some(secs) =
            lookup("REUSEPROBE_IDLE_TIMEOUT_SECS").and_then(|s| s.trim().parse().ok())
        {
            cfg.idle_timeout = Duration::from_secs(secs);
        }

        if let Some(dir) = lookup("REUSEPROBE_OUTPUT_DIR") {
            if !dir.is_empty() {
                cfg.output_dir = PathBuf::from(dir);
            }
        }

        if let Some(verbose) = lookup("REUSEPROBE_VERBOSE").and_then(|s| s.trim().parse().ok()) {
            cfg.verbose = verbose;
        }

        cfg
    }

    /// Path of the request log for `input` started at `started`.
    pub fn log_path(&self, input: &Path, started: DateTime<Utc>) -> PathBuf {
        self.output_path("probelog", input, started)
    }

    /// Path of the summary file for `input` started at `started`.
    pub fn summary_path(&self, input: &Path, started: DateTime<Utc>) -> PathBuf {
        self.output_path("probesummary", input, started)
    }

    fn output_path(&self, prefix: &str, input: &Path, started: DateTime<Utc>) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".to_string());
        let stamp = started.format("%Y-%m-%d_%H-%M-%S");
        self.output_dir
            .join(format!("{}_{}_{}.txt", prefix, stem, stamp))
    }
}

/// Extract the single input-file argument.
pub fn input_path_from_args<I>(args: I) -> Result<PathBuf, ConfigError>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter().skip(1);
    match (args.next(), args.next()) {
        (Some(path), None) if !path.is_empty() => Ok(PathBuf::from(path)),
        _ => Err(ConfigError::Usage),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let cfg = RunConfig::default();
        assert_eq!(cfg.request_timeout, Duration::from_secs(10));
        assert_eq!(cfg.idle_timeout, Duration::from_secs(90));
        assert_eq!(cfg.output_dir, PathBuf::from("."));
        assert!(cfg.verbose);
    }

    #[test]
    fn test_config_from_env_values() {
        let vars: HashMap<&str, &str> = [
            ("REUSEPROBE_TIMEOUT_SECS", "3"),
            ("REUSEPROBE_IDLE_TIMEOUT_SECS", " 30 "),
            ("REUSEPROBE_OUTPUT_DIR", "/tmp/out"),
            ("REUSEPROBE_VERBOSE", "false"),
        ]
        .into_iter()
        .collect();

        let cfg = RunConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.request_timeout, Duration::from_secs(3));
        assert_eq!(cfg.idle_timeout, Duration::from_secs(30));
        assert_eq!(cfg.output_dir, PathBuf::from("/tmp/out"));
        assert!(!cfg.verbose);
    }

    #[test]
    fn test_config_ignores_bad_values() {
        let cfg = RunConfig::from_lookup(|k| match k {
            "REUSEPROBE_TIMEOUT_SECS" => Some("ten".to_string()),
            "REUSEPROBE_VERBOSE" => Some("maybe".to_string()),
            _ => None,
        });
        assert_eq!(cfg.request_timeout, Duration::from_secs(10));
        assert!(cfg.verbose);
    }

    #[test]
    fn test_output_paths_use_input_stem_and_timestamp() {
        let cfg = RunConfig {
            output_dir: PathBuf::from("out"),
            ..Default::default()
        };
        let started = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        let input = Path::new("/data/targets.csv");

        assert_eq!(
            cfg.log_path(input, started),
            PathBuf::from("out/probelog_targets_2024-03-05_07-08-09.txt")
        );
        assert_eq!(
            cfg.summary_path(input, started),
            PathBuf::from("out/probesummary_targets_2024-03-05_07-08-09.txt")
        );
    }

    #[test]
    fn test_input_path_from_args() {
        let ok = input_path_from_args(vec!["reuseprobe".to_string(), "list.csv".to_string()]);
        assert_eq!(ok.unwrap(), PathBuf::from("list.csv"));

        assert!(matches!(
            input_path_from_args(vec!["reuseprobe".to_string()]),
            Err(ConfigError::Usage)
        ));
        assert!(matches!(
            input_path_from_args(vec!["reuseprobe".into(), "a".into(), "b".into()]),
            Err(ConfigError::Usage)
        ));
    }
}
