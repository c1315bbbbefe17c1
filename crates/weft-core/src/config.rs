//! Runtime configuration: which named executors to build and how.
//!
//! ```json
//! {
//!   "idle_timeout_ms": 30000,
//!   "executors": [
//!     { "name": "io", "max_threads": 8, "max_queue": 256 },
//!     { "name": "background" }
//!   ]
//! }
//! ```

use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::WeftError;
use crate::executor::IMMEDIATE;

fn default_idle_timeout_ms() -> u64 {
    60_000
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Idle pool workers exit after this long without work.
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,

    #[serde(default)]
    pub executors: Vec<ExecutorConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_threads: Option<NonZeroUsize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_queue: Option<usize>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: default_idle_timeout_ms(),
            executors: Vec::new(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_json_str(json: &str) -> Result<Self, WeftError> {
        let config: RuntimeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, WeftError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), WeftError> {
        for executor in &self.executors {
            if executor.name.is_empty() {
                return Err(WeftError::InvalidExecutor {
                    name: executor.name.clone(),
                    reason: "name must not be empty".to_string(),
                });
            }
            if executor.name == IMMEDIATE {
                return Err(WeftError::InvalidExecutor {
                    name: executor.name.clone(),
                    reason: "name is reserved for the inline executor".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn parses_full_config() {
        let config = RuntimeConfig::from_json_str(
            r#"{
                "idle_timeout_ms": 500,
                "executors": [
                    { "name": "io", "max_threads": 8, "max_queue": 256 },
                    { "name": "background" }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.idle_timeout(), Duration::from_millis(500));
        assert_eq!(
            config.executors,
            vec![
                ExecutorConfig {
                    name: "io".to_string(),
                    max_threads: NonZeroUsize::new(8),
                    max_queue: Some(256),
                },
                ExecutorConfig {
                    name: "background".to_string(),
                    max_threads: None,
                    max_queue: None,
                },
            ]
        );
    }

    #[test]
    fn empty_object_uses_defaults() {
        let config = RuntimeConfig::from_json_str("{}").unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.idle_timeout(), Duration::from_secs(60));
    }

    #[rstest]
    #[case::zero_threads(r#"{ "executors": [{ "name": "io", "max_threads": 0 }] }"#)]
    #[case::negative_queue(r#"{ "executors": [{ "name": "io", "max_queue": -1 }] }"#)]
    #[case::not_json("executors = []")]
    fn rejects_malformed_input(#[case] json: &str) {
        let err = RuntimeConfig::from_json_str(json).unwrap_err();
        assert!(matches!(err, WeftError::Config(_)));
    }

    #[rstest]
    #[case::reserved(IMMEDIATE)]
    #[case::empty("")]
    fn rejects_invalid_names(#[case] name: &str) {
        let json = serde_json::json!({ "executors": [{ "name": name }] }).to_string();
        let err = RuntimeConfig::from_json_str(&json).unwrap_err();
        assert!(matches!(err, WeftError::InvalidExecutor { .. }));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = RuntimeConfig::from_path("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, WeftError::Io(_)));
    }
}
