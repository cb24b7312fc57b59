//! Handler configuration.
//!
//! Every field has a default, so an empty JSON object (or no file at all)
//! yields a working setup: job logs, event log, buffered cohesion, stderr
//! batching and the summary, all under `./log`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::encoding::OutputEncoding;
use crate::error::{OutputError, Result};

/// How the cohesion handler obtains a job's output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CohesionStrategy {
    /// No cohesion blocks
    Off,
    /// Keep output in memory until the job ends
    #[default]
    Buffered,
    /// Re-read the job's combined log file when the job ends
    LogReread,
}

/// Whether console output is colorized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorChoice {
    /// Colorize when the stream is a terminal
    #[default]
    Auto,
    Always,
    Never,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory holding `events.log` and one subdirectory per job
    pub log_base: PathBuf,

    pub cohesion: CohesionStrategy,

    /// Print each job's stderr as one block on the process stderr
    pub stderr_batch: bool,

    /// Print the queued jobs once the first job starts
    pub package_list: bool,

    pub event_log: bool,

    pub job_logs: bool,

    pub summary: bool,

    pub color: ColorChoice,

    pub encoding: OutputEncoding,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            log_base: PathBuf::from("log"),
            cohesion: CohesionStrategy::Buffered,
            stderr_batch: true,
            package_list: false,
            event_log: true,
            job_logs: true,
            summary: true,
            color: ColorChoice::Auto,
            encoding: OutputEncoding::Utf8,
        }
    }
}

impl OutputConfig {
    /// Defaults rooted at `log_base`.
    pub fn with_log_base(log_base: impl Into<PathBuf>) -> Self {
        Self {
            log_base: log_base.into(),
            ..Self::default()
        }
    }

    /// Load a JSON configuration file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| OutputError::io(path, e))?;
        let config: OutputConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations the handlers cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.log_base.as_os_str().is_empty() {
            return Err(OutputError::Config("log_base must not be empty".to_string()));
        }
        if self.cohesion == CohesionStrategy::LogReread && !self.job_logs {
            return Err(OutputError::Config(
                "cohesion = log-reread needs job_logs enabled".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = OutputConfig::default();
        assert_eq!(config.log_base, PathBuf::from("log"));
        assert_eq!(config.cohesion, CohesionStrategy::Buffered);
        assert!(config.job_logs);
        assert!(config.event_log);
        assert!(config.summary);
        assert!(!config.package_list);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: OutputConfig =
            serde_json::from_str(r#"{"cohesion": "log-reread", "color": "never"}"#).unwrap();
        assert_eq!(config.cohesion, CohesionStrategy::LogReread);
        assert_eq!(config.color, ColorChoice::Never);
        assert!(config.stderr_batch);
        assert_eq!(config.encoding, OutputEncoding::Utf8);
    }

    #[test]
    fn test_log_reread_requires_job_logs() {
        let config = OutputConfig {
            cohesion: CohesionStrategy::LogReread,
            job_logs: false,
            ..OutputConfig::default()
        };
        assert!(matches!(config.validate(), Err(OutputError::Config(_))));
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"log_base": "/tmp/build-logs", "encoding": "lossy-utf8"}}"#).unwrap();
        let config = OutputConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.log_base, PathBuf::from("/tmp/build-logs"));
        assert_eq!(config.encoding, OutputEncoding::LossyUtf8);
    }

    #[test]
    fn test_from_missing_file_is_io_error() {
        let err = OutputConfig::from_json_file(Path::new("/nonexistent/buildlog.json")).unwrap_err();
        assert!(matches!(err, OutputError::Io { .. }));
    }
}
