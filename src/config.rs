//! Configuration management for Gradebox
//!
//! The language→image mapping, the in-container execution directory, and the
//! watchdog poll interval are explicit configuration rather than module-level
//! constants, so multiple grading engines with different settings can coexist
//! in one process.

use crate::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Supported submission languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
}

impl std::str::FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "python" | "py" => Ok(Language::Python),
            _ => Err(Error::UnsupportedLanguage(s.to_string())),
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The display form doubles as the code file extension
        match self {
            Language::Python => write!(f, "py"),
        }
    }
}

/// Grading engine configuration
#[derive(Debug, Clone)]
pub struct GraderConfig {
    /// Base image per language
    pub images: HashMap<Language, String>,
    /// Directory inside the sandbox where the bundle is unpacked and run
    pub exec_dir: String,
    /// Watchdog polling interval
    pub poll_interval: Duration,
    /// Deadline applied when a submission does not carry its own
    pub default_timeout: Duration,
}

impl Default for GraderConfig {
    fn default() -> Self {
        let mut images = HashMap::new();
        images.insert(Language::Python, "python:3".to_string());

        GraderConfig {
            images,
            exec_dir: "/tmp/grader".to_string(),
            poll_interval: Duration::from_millis(50),
            default_timeout: Duration::from_secs(2),
        }
    }
}

impl GraderConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let mut config = GraderConfig::default();

        if let Ok(image) = std::env::var("GRADEBOX_PYTHON_IMAGE") {
            config.images.insert(Language::Python, image);
        }
        if let Ok(dir) = std::env::var("GRADEBOX_EXEC_DIR") {
            config.exec_dir = dir;
        }
        if let Some(ms) = std::env::var("GRADEBOX_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.poll_interval = Duration::from_millis(ms);
        }

        config
    }

    /// Resolve the base image for a language.
    ///
    /// Fails with [`Error::UnsupportedLanguage`] before any sandbox resource
    /// is allocated.
    pub fn image_for(&self, language: Language) -> Result<&str> {
        self.images
            .get(&language)
            .map(|s| s.as_str())
            .ok_or_else(|| Error::UnsupportedLanguage(language.to_string()))
    }

    /// Command used to run a code file of the given language
    pub fn run_command(&self, language: Language, code_file: &str) -> String {
        match language {
            Language::Python => format!("python {}", code_file),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_parsing() {
        assert_eq!("py".parse::<Language>().unwrap(), Language::Python);
        assert_eq!("python".parse::<Language>().unwrap(), Language::Python);
        assert_eq!("PY".parse::<Language>().unwrap(), Language::Python);
        assert!("rb".parse::<Language>().is_err());
    }

    #[test]
    fn test_language_display_is_extension() {
        assert_eq!(Language::Python.to_string(), "py");
    }

    #[test]
    fn test_default_config() {
        let config = GraderConfig::default();
        assert_eq!(config.image_for(Language::Python).unwrap(), "python:3");
        assert_eq!(config.exec_dir, "/tmp/grader");
        assert_eq!(config.default_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_run_command() {
        let config = GraderConfig::default();
        assert_eq!(
            config.run_command(Language::Python, "two-sum.py"),
            "python two-sum.py"
        );
    }

    #[test]
    fn test_missing_image_mapping() {
        let mut config = GraderConfig::default();
        config.images.clear();
        assert!(matches!(
            config.image_for(Language::Python),
            Err(Error::UnsupportedLanguage(_))
        ));
    }
}
