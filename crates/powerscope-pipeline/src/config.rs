//! Configuration for the update pipeline

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Update pipeline configuration
///
/// # Examples
///
/// ```
/// use powerscope_pipeline::PipelineConfig;
/// use std::time::Duration;
///
/// let config = PipelineConfig::default();
/// assert_eq!(config.debounce(), Duration::from_millis(400));
///
/// let fast = PipelineConfig::responsive();
/// assert!(fast.debounce() < config.debounce());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Quiet period before pending delayed edits are flushed (default: 400)
    pub debounce_ms: u64,

    /// Round incoming numbers before applying them (default: true)
    ///
    /// Sample sizes round up to whole units, everything else to two decimals.
    pub round_edits: bool,

    /// Drain pending edits and in-flight round trips on shutdown (default: true)
    pub drain_on_shutdown: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 400,
            round_edits: true,
            drain_on_shutdown: true,
        }
    }
}

impl PipelineConfig {
    /// Short quiet period for local solvers
    pub fn responsive() -> Self {
        Self {
            debounce_ms: 150,
            ..Self::default()
        }
    }

    /// Long quiet period for slow or metered solvers
    pub fn conservative() -> Self {
        Self {
            debounce_ms: 1000,
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file; missing keys take defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let contents = std::fs::read_to_string(path)?;
        let config: PipelineConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Get debounce period as Duration
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.debounce_ms, 400);
        assert!(config.round_edits);
        assert!(config.drain_on_shutdown);
    }

    #[test]
    fn test_presets() {
        assert_eq!(PipelineConfig::responsive().debounce_ms, 150);
        assert_eq!(PipelineConfig::conservative().debounce(), Duration::from_secs(1));
        assert!(PipelineConfig::conservative().round_edits);
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "debounce_ms = 250").unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.debounce_ms, 250);
        assert!(config.round_edits);
    }

    #[test]
    fn test_from_file_errors() {
        let missing = PipelineConfig::from_file("/nonexistent/pipeline.toml");
        assert!(matches!(missing, Err(PipelineError::ConfigRead(_))));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "debounce_ms = \"soon\"").unwrap();
        let invalid = PipelineConfig::from_file(file.path());
        assert!(matches!(invalid, Err(PipelineError::ConfigParse(_))));
    }
}
