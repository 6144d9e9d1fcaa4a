//! Boundary configuration
//!
//! Read once from the environment when the process-wide instance is built:
//!
//! - `OBJECTFS_CONFIG`: a JSON object, e.g. `{"pipe_capacity": 64}`
//! - `OBJECTFS_PIPE_CAPACITY`, `OBJECTFS_WORKER_THREADS`: single overrides,
//!   applied on top of the JSON

use serde::Deserialize;

use crate::error::{Error, Result};

pub const CONFIG_VAR: &str = "OBJECTFS_CONFIG";
pub const PIPE_CAPACITY_VAR: &str = "OBJECTFS_PIPE_CAPACITY";
pub const WORKER_THREADS_VAR: &str = "OBJECTFS_WORKER_THREADS";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Chunks a writer may queue before `WriterWrite` blocks
    pub pipe_capacity: usize,
    /// Worker threads of the I/O runtime
    pub worker_threads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pipe_capacity: 16,
            worker_threads: 2,
        }
    }
}

impl Config {
    /// Configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Malformed JSON, unknown fields, unparsable or zero counts.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match lookup(CONFIG_VAR) {
            Some(json) if !json.trim().is_empty() => Self::from_json(&json)?,
            _ => Self::default(),
        };
        if let Some(value) = lookup(PIPE_CAPACITY_VAR) {
            config.pipe_capacity = parse_count(PIPE_CAPACITY_VAR, &value)?;
        }
        if let Some(value) = lookup(WORKER_THREADS_VAR) {
            config.worker_threads = parse_count(WORKER_THREADS_VAR, &value)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Malformed JSON or unknown fields.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("failed to parse {CONFIG_VAR} JSON: {e}")))
    }

    /// # Errors
    ///
    /// `Config` if a count is zero.
    pub fn validate(&self) -> Result<()> {
        if self.pipe_capacity == 0 {
            return Err(Error::Config("pipe_capacity must be positive".to_string()));
        }
        if self.worker_threads == 0 {
            return Err(Error::Config("worker_threads must be positive".to_string()));
        }
        Ok(())
    }
}

fn parse_count(name: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("{name}={value:?}: {e}")))
}
