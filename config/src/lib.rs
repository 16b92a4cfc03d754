use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use awbw_integrations::Log;

/// Where we go for username lookups when nothing else is configured.
pub const DEFAULT_API_URL: &str = "https://awbw.amarriner.com";

/// Folder (relative to the host's data directory) that replays are stored in.
pub const DEFAULT_REPLAY_FOLDER: &str = "ReplayData/Replays";

pub const DEFAULT_MAX_LOOKUP_FAILURES: u32 = 3;
pub const DEFAULT_LOOKUP_RETRY_DELAY_MS: u64 = 1000;
pub const DEFAULT_LOOKUP_SPACING_MS: u64 = 150;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unable to read config file {path:?}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("Unable to parse config file {path:?}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
}

#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize)]
pub struct AwbwConfig {
    pub api_url: Option<String>,
    pub replay_folder: Option<PathBuf>,
    pub max_lookup_failures: Option<u32>,
    pub lookup_retry_delay_ms: Option<u64>,
    pub lookup_spacing_ms: Option<u64>,
}

impl AwbwConfig {
    /// Merges two configurations. Values in `other` take precedence.
    pub fn merge(self, other: Self) -> Self {
        Self {
            api_url: other.api_url.or(self.api_url),
            replay_folder: other.replay_folder.or(self.replay_folder),
            max_lookup_failures: other.max_lookup_failures.or(self.max_lookup_failures),
            lookup_retry_delay_ms: other.lookup_retry_delay_ms.or(self.lookup_retry_delay_ms),
            lookup_spacing_ms: other.lookup_spacing_ms.or(self.lookup_spacing_ms),
        }
    }

    /// Default configuration values are sourced from the environment.
    pub fn from_env() -> Self {
        Self {
            api_url: env::var("AWBW_API_URL").ok(),
            replay_folder: env::var_os("AWBW_REPLAY_FOLDER").map(PathBuf::from),
            ..Default::default()
        }
    }

    /// Parses a TOML file into a configuration, without merging anything.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Environment defaults with the file at `path` (if any) merged on top.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = Self::from_env();

        let Some(path) = path else {
            return Ok(defaults);
        };

        tracing::info!(target: Log::Catalog, ?path, "Loading configuration");

        Ok(defaults.merge(Self::from_file(path)?))
    }

    pub fn api_url(&self) -> &str {
        self.api_url.as_deref().unwrap_or(DEFAULT_API_URL)
    }

    pub fn replay_folder(&self) -> PathBuf {
        self.replay_folder
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_REPLAY_FOLDER))
    }

    pub fn max_lookup_failures(&self) -> u32 {
        self.max_lookup_failures.unwrap_or(DEFAULT_MAX_LOOKUP_FAILURES)
    }

    pub fn lookup_retry_delay(&self) -> Duration {
        Duration::from_millis(self.lookup_retry_delay_ms.unwrap_or(DEFAULT_LOOKUP_RETRY_DELAY_MS))
    }

    pub fn lookup_spacing(&self) -> Duration {
        Duration::from_millis(self.lookup_spacing_ms.unwrap_or(DEFAULT_LOOKUP_SPACING_MS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_values_take_precedence() {
        let base = AwbwConfig {
            api_url: Some("https://env.example".into()),
            max_lookup_failures: Some(5),
            ..Default::default()
        };

        let file: AwbwConfig = toml::from_str(
            r#"
            api_url = "https://file.example"
            lookup_spacing_ms = 10
        "#,
        )
        .unwrap();

        let merged = base.merge(file);
        assert_eq!(merged.api_url(), "https://file.example");
        assert_eq!(merged.max_lookup_failures(), 5);
        assert_eq!(merged.lookup_spacing(), Duration::from_millis(10));
        assert_eq!(merged.lookup_retry_delay(), Duration::from_millis(DEFAULT_LOOKUP_RETRY_DELAY_MS));
    }

    #[test]
    fn bundled_development_env_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("envs/development.toml");
        let config = AwbwConfig::from_file(&path).unwrap();

        assert_eq!(config.api_url(), DEFAULT_API_URL);
        assert_eq!(config.max_lookup_failures(), 3);
    }

    #[test]
    fn missing_file_is_reported() {
        let error = AwbwConfig::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(error, ConfigError::Io { .. }));
    }
}
