//! # Configuration
//!
//! Settings read from `metagraph.toml`. Every section is optional; missing
//! sections and keys fall back to defaults. Relative paths are resolved
//! against the directory holding the file.

use metagraph_core::MetagraphError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "metagraph.toml";

/// Maximum config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

// =============================================================================
// CONFIG STRUCTURE
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub schema: SchemaConfig,
    pub model: ModelConfig,
    pub mounts: Vec<MountConfig>,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Schema document (JSON or TOML).
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model documents loaded into the working store, in order.
    pub paths: Vec<PathBuf>,
}

/// A read-only model mounted into the working store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountConfig {
    pub id: String,
    #[serde(default)]
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Parse a `METAGRAPH_LOG_FORMAT` value. Unknown values yield `None`.
    #[must_use]
    pub fn from_env_value(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

// =============================================================================
// LOADING
// =============================================================================

impl Config {
    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, `metagraph.toml` in the
    /// working directory is used if present, otherwise defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, MetagraphError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::from_file(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Read and parse one config file.
    pub fn from_file(path: &Path) -> Result<Self, MetagraphError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            MetagraphError::Document(format!("cannot read config '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(MetagraphError::Document(format!(
                "config '{}' exceeds {} bytes",
                path.display(),
                MAX_CONFIG_FILE_SIZE
            )));
        }
        let contents = std::fs::read_to_string(path).map_err(|e| {
            MetagraphError::Document(format!("cannot read config '{}': {}", path.display(), e))
        })?;

        let config = Self::parse(&contents).map_err(|e| match e {
            MetagraphError::Document(message) => {
                MetagraphError::Document(format!("{}: {}", path.display(), message))
            }
            other => other,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(config.resolved_against(base))
    }

    /// Parse TOML text. Paths are left as written.
    pub fn parse(contents: &str) -> Result<Self, MetagraphError> {
        toml::from_str(contents)
            .map_err(|e| MetagraphError::Document(format!("invalid config: {}", e)))
    }

    /// Rebase every relative path onto `base`.
    #[must_use]
    pub fn resolved_against(mut self, base: &Path) -> Self {
        let rebase = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        if let Some(path) = self.schema.path.as_mut() {
            rebase(path);
        }
        self.model.paths.iter_mut().for_each(rebase);
        for mount in &mut self.mounts {
            mount.paths.iter_mut().for_each(rebase);
        }
        self
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_default() {
        let config = Config::parse("").expect("parse");
        assert_eq!(config, Config::default());
        assert_eq!(config.output.format, OutputFormat::Table);
    }

    #[test]
    fn full_file() {
        let config = Config::parse(
            r#"
            [schema]
            path = "schema.json"

            [model]
            paths = ["a.json", "b.toml"]

            [[mounts]]
            id = "library"
            paths = ["lib.json"]

            [output]
            format = "json"

            [logging]
            format = "json"
            filter = "metagraph=debug"
            "#,
        )
        .expect("parse");

        assert_eq!(config.schema.path, Some(PathBuf::from("schema.json")));
        assert_eq!(config.model.paths.len(), 2);
        assert_eq!(config.mounts[0].id, "library");
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.filter.as_deref(), Some("metagraph=debug"));
    }

    #[test]
    fn unknown_section_rejected() {
        let result = Config::parse("[server]\nport = 1\n");
        assert!(matches!(result, Err(MetagraphError::Document(_))));
    }

    #[test]
    fn relative_paths_rebased() {
        let config = Config::parse("[schema]\npath = \"s.json\"\n[model]\npaths = [\"/abs/m.json\"]\n")
            .expect("parse")
            .resolved_against(Path::new("/work"));
        assert_eq!(config.schema.path, Some(PathBuf::from("/work/s.json")));
        assert_eq!(config.model.paths, vec![PathBuf::from("/abs/m.json")]);
    }

    #[test]
    fn log_format_env_values() {
        assert_eq!(LogFormat::from_env_value("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::from_env_value("text"), Some(LogFormat::Text));
        assert_eq!(LogFormat::from_env_value("xml"), None);
    }
}
