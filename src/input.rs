//! Probe target list parsing.
//!
//! Each line is `target,waitSeconds[,hostHeaderOverride]`. Malformed lines
//! are reported and skipped; input order is preserved.

use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// One line of the input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub target: String,
    pub wait_seconds: u64,
    /// `Host` header to send instead of the URL's authority.
    pub host_header: Option<String>,
}

impl ProbeTarget {
    pub fn new(target: &str, wait_seconds: u64, host_header: Option<&str>) -> Self {
        Self {
            target: target.to_string(),
            wait_seconds,
            host_header: host_header
                .filter(|h| !h.is_empty())
                .map(|h| h.to_string()),
        }
    }

    pub fn wait(&self) -> Duration {
        Duration::from_secs(self.wait_seconds)
    }
}

/// Input line errors. Never fatal to the run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("line {line}: Invalid line format: {content}")]
    InvalidFormat { line: usize, content: String },
    #[error("line {line}: Failed to parse integer from '{field}'")]
    InvalidInterval { line: usize, field: String },
}

/// Parse the whole input text.
pub fn parse_targets(text: &str) -> (Vec<ProbeTarget>, Vec<ParseError>) {
    let mut targets = Vec::new();
    let mut errors = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        match parse_line(idx + 1, raw) {
            Ok(t) => targets.push(t),
            Err(e) => errors.push(e),
        }
    }

    (targets, errors)
}

fn parse_line(line: usize, raw: &str) -> Result<ProbeTarget, ParseError> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    if parts.len() < 2 {
        return Err(ParseError::InvalidFormat {
            line,
            content: raw.to_string(),
        });
    }

    let wait_seconds = parts[1]
        .parse::<u64>()
        .map_err(|_| ParseError::InvalidInterval {
            line,
            field: parts[1].to_string(),
        })?;

    Ok(ProbeTarget::new(parts[0], wait_seconds, parts.get(2).copied()))
}

/// Read and parse an input file.
pub fn load_targets<P: AsRef<Path>>(
    path: P,
) -> std::io::Result<(Vec<ProbeTarget>, Vec<ParseError>)> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_targets(&text))
}
