//! Application Configuration - server, ingest and outlier defaults as TOML
//!
//! Every tunable has a `Default` matching the built-in behaviour, so running
//! without a config file is always valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::analytics::outliers::{DEFAULT_K, DEFAULT_Z};
use crate::ingest::cleaning::DEFAULT_Z_THRESHOLD;

/// Env var naming a config file.
pub const CONFIG_ENV: &str = "AQUASTAT_CONFIG";

/// Env var overriding `server.addr`.
pub const ADDR_ENV: &str = "AQUASTAT_SERVER_ADDR";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG: &str = "aquastat.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration.
///
/// Load with `AppConfig::load()` which searches:
/// 1. `$AQUASTAT_CONFIG` env var
/// 2. `./aquastat.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server
    #[serde(default)]
    pub server: ServerConfig,

    /// Raw/cleaned data sources and the ingest z-score filter
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Defaults for `/api/outliers` when the caller omits `k` or `z`
    #[serde(default)]
    pub outliers: OutlierDefaults,
}

impl AppConfig {
    /// Load configuration using the standard search order:
    /// 1. `$AQUASTAT_CONFIG` environment variable
    /// 2. `./aquastat.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from {}", CONFIG_ENV);
                        return config;
                    }
                    Err(e) => {
                        warn!(
                            path = %p.display(),
                            error = %e,
                            "Failed to load config from {}, falling back",
                            CONFIG_ENV
                        );
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV);
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded config from ./{}", LOCAL_CONFIG);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG);
                }
            }
        }

        info!("No {} found, using built-in defaults", LOCAL_CONFIG);
        Self::default()
    }

    /// Load from a specific TOML file path. Unknown keys are warned about,
    /// never rejected.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Config saved");
        Ok(())
    }

    /// Apply `$AQUASTAT_SERVER_ADDR` if set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var(ADDR_ENV) {
            if !addr.trim().is_empty() {
                info!(addr = %addr, "Bind address overridden by {}", ADDR_ENV);
                self.server.addr = addr.trim().to_string();
            }
        }
    }

    /// Rules:
    /// - Thresholds (`z_threshold`, `default_k`, `default_z`) must be finite and >= 0
    /// - `server.addr` must parse as `HOST:PORT`
    /// - `ingest.cleaned_path` must not be empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        Self::check_threshold(self.ingest.z_threshold, "ingest.z_threshold", &mut errors);
        Self::check_threshold(self.outliers.default_k, "outliers.default_k", &mut errors);
        Self::check_threshold(self.outliers.default_z, "outliers.default_z", &mut errors);

        if self.server.addr.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "server.addr: '{}' is not a valid HOST:PORT socket address",
                self.server.addr
            ));
        }

        if self.ingest.cleaned_path.as_os_str().is_empty() {
            errors.push("ingest.cleaned_path: must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_threshold(value: f64, name: &str, errors: &mut Vec<String>) {
        if !value.is_finite() {
            errors.push(format!("{name}: value must be finite (got {value})"));
        } else if value < 0.0 {
            errors.push(format!("{name}: value must be >= 0 (got {value})"));
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Server
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server bind address.
    ///
    /// Can be overridden by `AQUASTAT_SERVER_ADDR` env var or `--addr` CLI flag.
    #[serde(default = "default_server_addr")]
    pub addr: String,

    /// Allowed CORS origins. Empty means any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_server_addr() -> String {
    "127.0.0.1:5000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
            cors_origins: Vec::new(),
        }
    }
}

// ============================================================================
// Ingest
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Raw instrument export, used when no cleaned artifact exists yet.
    #[serde(default = "default_raw_path")]
    pub raw_path: Option<PathBuf>,

    /// Cleaned artifact; preferred seed source when present.
    #[serde(default = "default_cleaned_path")]
    pub cleaned_path: PathBuf,

    /// Rows with any |z| above this are dropped at ingest.
    #[serde(default = "default_z_threshold")]
    pub z_threshold: f64,

    /// Write the cleaned artifact after ingesting the raw file.
    #[serde(default = "default_write_cleaned")]
    pub write_cleaned: bool,
}

fn default_raw_path() -> Option<PathBuf> {
    Some(PathBuf::from("data/2021-dec16.csv"))
}
fn default_cleaned_path() -> PathBuf {
    PathBuf::from("data/cleaned_output.csv")
}
fn default_z_threshold() -> f64 {
    DEFAULT_Z_THRESHOLD
}
fn default_write_cleaned() -> bool {
    true
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            raw_path: default_raw_path(),
            cleaned_path: default_cleaned_path(),
            z_threshold: default_z_threshold(),
            write_cleaned: default_write_cleaned(),
        }
    }
}

// ============================================================================
// Outlier defaults
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierDefaults {
    /// IQR fence multiplier
    #[serde(default = "default_k")]
    pub default_k: f64,

    /// Z-score threshold
    #[serde(default = "default_z")]
    pub default_z: f64,
}

fn default_k() -> f64 {
    DEFAULT_K
}
fn default_z() -> f64 {
    DEFAULT_Z
}

impl Default for OutlierDefaults {
    fn default() -> Self {
        Self {
            default_k: default_k(),
            default_z: default_z(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_validates() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok(), "Default config should be valid");
    }

    #[test]
    fn test_default_values() {
        let config = AppConfig::default();
        assert_eq!(config.server.addr, "127.0.0.1:5000");
        assert_eq!(config.ingest.cleaned_path, PathBuf::from("data/cleaned_output.csv"));
        assert_eq!(config.ingest.z_threshold, 3.0);
        assert_eq!(config.outliers.default_k, 1.5);
        assert_eq!(config.outliers.default_z, 3.0);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
[ingest]
z_threshold = 2.5

[server]
cors_origins = ["http://localhost:8501"]
"#,
        )
        .expect("partial config should parse");
        assert_eq!(config.ingest.z_threshold, 2.5);
        assert_eq!(config.ingest.cleaned_path, default_cleaned_path());
        assert_eq!(config.server.addr, default_server_addr());
        assert_eq!(config.server.cors_origins, vec!["http://localhost:8501"]);
        assert_eq!(config.outliers, OutlierDefaults::default());
    }

    #[test]
    fn test_validation_rejects_negative_threshold() {
        let mut config = AppConfig::default();
        config.outliers.default_k = -1.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("outliers.default_k"));
    }

    #[test]
    fn test_validation_rejects_non_finite() {
        let mut config = AppConfig::default();
        config.ingest.z_threshold = f64::NAN;
        assert!(config.validate().is_err(), "NaN threshold should fail");
    }

    #[test]
    fn test_validation_rejects_bad_addr() {
        let mut config = AppConfig::default();
        config.server.addr = "localhost".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_thresholds_are_valid() {
        let mut config = AppConfig::default();
        config.outliers.default_k = 0.0;
        config.outliers.default_z = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let err = AppConfig::from_toml_str("[server\naddr = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(..)));
    }

    #[test]
    fn test_roundtrip_through_file() {
        let mut original = AppConfig::default();
        original.ingest.z_threshold = 2.0;
        original.server.cors_origins = vec!["http://example.org".to_string()];

        let file = NamedTempFile::new().expect("temp file");
        original.save_to_file(file.path()).expect("save should work");
        let loaded = AppConfig::load_from_file(file.path()).expect("load should work");
        assert_eq!(original, loaded);
    }

    #[test]
    fn test_all_sections_serialize() {
        let toml_str = AppConfig::default().to_toml().expect("serialization should work");
        assert!(toml_str.contains("[server]"), "Missing [server] section");
        assert!(toml_str.contains("[ingest]"), "Missing [ingest] section");
        assert!(toml_str.contains("[outliers]"), "Missing [outliers] section");
        assert!(toml_str.contains("cleaned_path"), "Missing cleaned_path field");
    }
}
