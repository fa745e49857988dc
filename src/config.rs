//! Configuration resolution for photorestore
//!
//! Priority: CLI flag → environment variable → TOML file → compiled
//! default (clap collapses the first two tiers). Hosted-service API keys
//! resolve environment → TOML and are optional: a missing key disables
//! the corresponding remote path instead of failing startup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use tracing::info;

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_UPLOADS_DIR: &str = "uploads";
const DEFAULT_MAX_UPLOAD_MB: u64 = 10;
const DEFAULT_RETENTION_HOURS: u64 = 24;

/// Command-line arguments
#[derive(Parser, Debug, Default)]
#[command(name = "photorestore")]
#[command(about = "Photo restoration backend service")]
#[command(version)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PHOTORESTORE_PORT")]
    pub port: Option<u16>,

    /// Directory where uploads and enhanced outputs are staged
    #[arg(short, long, env = "PHOTORESTORE_UPLOADS_DIR")]
    pub uploads_dir: Option<PathBuf>,

    /// Path to a TOML config file
    #[arg(short, long, env = "PHOTORESTORE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Optional TOML config file contents
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub port: Option<u16>,
    pub uploads_dir: Option<PathBuf>,
    pub max_upload_mb: Option<u64>,
    pub retention_hours: Option<u64>,
    pub openai_api_key: Option<String>,
    pub replicate_api_token: Option<String>,
}

impl TomlConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("parse config file {}", path.display()))
    }
}

/// Fully resolved runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub uploads_dir: PathBuf,
    pub max_upload_mb: u64,
    pub retention_hours: u64,
    pub openai_api_key: Option<String>,
    pub replicate_api_token: Option<String>,
}

impl Config {
    /// Resolve the runtime configuration from arguments, environment, and
    /// the optional TOML file.
    pub fn resolve(args: &Args) -> Result<Self> {
        let toml_config = match &args.config {
            Some(path) => TomlConfig::load(path)?,
            None => TomlConfig::default(),
        };

        let port = args.port.or(toml_config.port).unwrap_or(DEFAULT_PORT);
        let uploads_dir = args
            .uploads_dir
            .clone()
            .or(toml_config.uploads_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOADS_DIR));
        let max_upload_mb = toml_config.max_upload_mb.unwrap_or(DEFAULT_MAX_UPLOAD_MB);
        let retention_hours = toml_config
            .retention_hours
            .unwrap_or(DEFAULT_RETENTION_HOURS);

        let openai_api_key =
            resolve_api_key("OPENAI_API_KEY", toml_config.openai_api_key.as_deref());
        let replicate_api_token = resolve_api_key(
            "REPLICATE_API_TOKEN",
            toml_config.replicate_api_token.as_deref(),
        );

        Ok(Self {
            port,
            uploads_dir,
            max_upload_mb,
            retention_hours,
            openai_api_key,
            replicate_api_token,
        })
    }

    /// Per-file upload cap in bytes
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb as usize * 1024 * 1024
    }

    /// How long upload artifacts stay on disk
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_hours * 60 * 60)
    }
}

/// Resolve an optional API key: environment first, then TOML. Blank
/// values count as absent.
fn resolve_api_key(env_var: &str, toml_value: Option<&str>) -> Option<String> {
    if let Ok(key) = std::env::var(env_var) {
        if is_valid_key(&key) {
            info!("{} loaded from environment", env_var);
            return Some(key);
        }
    }

    if let Some(key) = toml_value {
        if is_valid_key(key) {
            info!("{} loaded from TOML config", env_var);
            return Some(key.to_string());
        }
    }

    None
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn blank_keys_are_invalid() {
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("   "));
        assert!(is_valid_key("sk-live"));
    }

    #[test]
    #[serial]
    fn defaults_apply_when_nothing_is_configured() {
        std::env::remove_var("OPENAI_API_KEY");
        std::env::remove_var("REPLICATE_API_TOKEN");

        let config = Config::resolve(&Args::default()).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.uploads_dir, PathBuf::from("uploads"));
        assert_eq!(config.max_upload_mb, 10);
        assert_eq!(config.retention_hours, 24);
        assert!(config.openai_api_key.is_none());
        assert!(config.replicate_api_token.is_none());
    }

    #[test]
    #[serial]
    fn toml_overrides_defaults() {
        std::env::remove_var("OPENAI_API_KEY");
        std::env::remove_var("REPLICATE_API_TOKEN");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photorestore.toml");
        std::fs::write(
            &path,
            "port = 8080\nmax_upload_mb = 25\nopenai_api_key = \"sk-from-toml\"\n",
        )
        .unwrap();

        let args = Args {
            config: Some(path),
            ..Args::default()
        };
        let config = Config::resolve(&args).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_upload_mb, 25);
        assert_eq!(config.max_upload_bytes(), 25 * 1024 * 1024);
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-from-toml"));
    }

    #[test]
    #[serial]
    fn cli_beats_toml() {
        std::env::remove_var("OPENAI_API_KEY");
        std::env::remove_var("REPLICATE_API_TOKEN");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photorestore.toml");
        std::fs::write(&path, "port = 8080\n").unwrap();

        let args = Args {
            port: Some(9090),
            config: Some(path),
            ..Args::default()
        };
        let config = Config::resolve(&args).unwrap();
        assert_eq!(config.port, 9090);
    }

    #[test]
    #[serial]
    fn environment_beats_toml_for_api_keys() {
        std::env::set_var("OPENAI_API_KEY", "sk-from-env");
        std::env::remove_var("REPLICATE_API_TOKEN");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photorestore.toml");
        std::fs::write(&path, "openai_api_key = \"sk-from-toml\"\n").unwrap();

        let args = Args {
            config: Some(path),
            ..Args::default()
        };
        let config = Config::resolve(&args).unwrap();
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-from-env"));

        std::env::remove_var("OPENAI_API_KEY");
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let args = Args {
            config: Some(PathBuf::from("/nonexistent/photorestore.toml")),
            ..Args::default()
        };
        assert!(Config::resolve(&args).is_err());
    }

    #[test]
    fn retention_converts_to_duration() {
        let config = Config {
            port: 5000,
            uploads_dir: PathBuf::from("uploads"),
            max_upload_mb: 10,
            retention_hours: 24,
            openai_api_key: None,
            replicate_api_token: None,
        };
        assert_eq!(config.retention(), Duration::from_secs(24 * 60 * 60));
    }
}
