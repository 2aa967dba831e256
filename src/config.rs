//! Server configuration, loaded from a YAML file.
//!
//! Every knob has a default matching the sizes the server was tuned with, so
//! a missing file (or missing keys) still produces a runnable configuration.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::logger::LogConfig;

/// How readiness is reported by the kernel. Chosen once at startup and
/// passed through to the event registry and the connections; the read loop
/// drains until exhaustion either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerMode {
    Edge,
    Level,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Address the listener binds to.
    pub listen_addr: String,
    /// Directory request paths are resolved under.
    pub web_root: PathBuf,
    pub trigger_mode: TriggerMode,
    /// Accepted connections beyond this are rejected with a busy message.
    pub max_connections: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            web_root: PathBuf::from("www"),
            trigger_mode: TriggerMode::Edge,
            max_connections: 65536,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsSection {
    /// Per-connection read buffer; a request larger than this fails.
    pub read_buffer_size: usize,
    /// Per-connection buffer for the response status line and headers.
    pub write_buffer_size: usize,
    pub worker_threads: usize,
    /// Depth of the job queue feeding the worker pool.
    pub queue_depth: usize,
    /// Idle-timeout unit; connections are evicted after three quiet units.
    pub timeslot_secs: u64,
    /// Readiness events drained per poll.
    pub max_events: usize,
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            read_buffer_size: 2048,
            write_buffer_size: 1024,
            worker_threads: 8,
            queue_depth: 10000,
            timeslot_secs: 5,
            max_events: 10000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSection {
    pub dir: PathBuf,
    pub file_name: String,
    /// Lines per file before rotating to a `.N` sequence file.
    pub split_lines: u64,
    /// Log queue depth; `0` selects synchronous writes.
    pub queue_depth: usize,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            file_name: "server.log".to_string(),
            split_lines: 5_000_000,
            queue_depth: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerSection,
    pub limits: LimitsSection,
    pub log: LogSection,
}

impl Config {
    /// Reads and parses a YAML config file.
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_yaml::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Loads `path` when given, otherwise falls back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Config> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Config::default()),
        }
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            dir: self.log.dir.clone(),
            file_name: self.log.file_name.clone(),
            split_lines: self.log.split_lines,
            queue_depth: self.log.queue_depth,
        }
    }
}
