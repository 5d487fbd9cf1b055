//! Configuration file parser for ~/.config/reelfeed/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde but logged as likely typos.
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment variable holding the API read token. Wins over the file.
pub const TOKEN_ENV_VAR: &str = "TMDB_API_TOKEN";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// The `Debug` impl masks `api_token`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listing API root, e.g. `https://api.themoviedb.org/3`.
    pub api_base_url: String,

    /// Prefix joined with an item's poster path to form the image URL.
    pub image_base_url: String,

    /// Sent as the `language` query parameter on every request.
    pub language: String,

    /// API read token (alternative to the TMDB_API_TOKEN env var).
    pub api_token: Option<String>,

    /// Cached categories older than this are not served.
    pub cache_ttl_hours: i64,

    pub request_timeout_secs: u64,

    /// Quiet period before a search query is sent.
    pub search_debounce_ms: u64,

    /// Concurrent poster downloads.
    pub prefetch_concurrency: usize,

    /// Posters kept in memory.
    pub image_cache_capacity: usize,

    /// `host:port` dialled to decide whether we are online.
    pub probe_address: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.themoviedb.org/3".to_string(),
            image_base_url: "https://image.tmdb.org/t/p/w500".to_string(),
            language: "en-US".to_string(),
            api_token: None,
            cache_ttl_hours: 24,
            request_timeout_secs: 15,
            search_debounce_ms: 500,
            prefetch_concurrency: 5,
            image_cache_capacity: 100,
            probe_address: "api.themoviedb.org:443".to_string(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_base_url", &self.api_base_url)
            .field("image_base_url", &self.image_base_url)
            .field("language", &self.language)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("cache_ttl_hours", &self.cache_ttl_hours)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("search_debounce_ms", &self.search_debounce_ms)
            .field("prefetch_concurrency", &self.prefetch_concurrency)
            .field("image_cache_capacity", &self.image_cache_capacity)
            .field("probe_address", &self.probe_address)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 10] = [
        "api_base_url",
        "image_base_url",
        "language",
        "api_token",
        "cache_ttl_hours",
        "request_timeout_secs",
        "search_debounce_ms",
        "prefetch_concurrency",
        "image_cache_capacity",
        "probe_address",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check size before reading so a huge file is never pulled into memory
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            api = %config.api_base_url,
            ttl_hours = config.cache_ttl_hours,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Resolve the API token: the environment variable first, then the file.
    pub fn api_token(&self) -> Option<SecretString> {
        self.resolve_token(std::env::var(TOKEN_ENV_VAR).ok())
    }

    fn resolve_token(&self, from_env: Option<String>) -> Option<SecretString> {
        from_env
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.api_token.clone().filter(|t| !t.trim().is_empty()))
            .map(|t| SecretString::from(t.trim().to_string()))
    }

    /// Cache TTL; non-positive values fall back to the 24 hour default.
    pub fn cache_ttl(&self) -> chrono::Duration {
        let hours = if self.cache_ttl_hours > 0 {
            self.cache_ttl_hours
        } else {
            Self::default().cache_ttl_hours
        };
        chrono::Duration::hours(hours)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn write_config(name: &str, content: &str) -> (std::path::PathBuf, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("reelfeed_config_test_{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api_base_url, "https://api.themoviedb.org/3");
        assert_eq!(config.language, "en-US");
        assert_eq!(config.cache_ttl_hours, 24);
        assert_eq!(config.search_debounce_ms, 500);
        assert_eq!(config.prefetch_concurrency, 5);
        assert_eq!(config.image_cache_capacity, 100);
        assert!(config.api_token.is_none());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/reelfeed_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.cache_ttl_hours, 24);
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let (dir, path) = write_config("whitespace", "   \n  \n  ");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.language, "en-US");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let (dir, path) = write_config("partial", "language = \"de-DE\"\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.language, "de-DE");
        assert_eq!(config.request_timeout_secs, 15);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let content = r#"
api_base_url = "http://localhost:8080/3"
image_base_url = "http://localhost:8080/img"
language = "fr-FR"
api_token = "file-token"
cache_ttl_hours = 6
request_timeout_secs = 3
search_debounce_ms = 250
prefetch_concurrency = 2
image_cache_capacity = 10
probe_address = "localhost:8080"
"#;
        let (dir, path) = write_config("full", content);
        let config = Config::load(&path).unwrap();
        assert_eq!(config.api_base_url, "http://localhost:8080/3");
        assert_eq!(config.cache_ttl(), chrono::Duration::hours(6));
        assert_eq!(config.request_timeout(), Duration::from_secs(3));
        assert_eq!(config.search_debounce(), Duration::from_millis(250));
        assert_eq!(config.prefetch_concurrency, 2);
        assert_eq!(config.probe_address, "localhost:8080");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let (dir, path) = write_config("invalid", "this is not [valid toml");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let (dir, path) = write_config("unknown", "language = \"en-GB\"\ntheme = \"dark\"\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.language, "en-GB");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let (dir, path) = write_config("wrongtype", "cache_ttl_hours = \"a day\"\n");
        assert!(Config::load(&path).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_too_large_file_rejected() {
        let (dir, path) = write_config("too_large", &"a".repeat(1_048_577));
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_non_positive_ttl_falls_back() {
        let config = Config {
            cache_ttl_hours: 0,
            ..Config::default()
        };
        assert_eq!(config.cache_ttl(), chrono::Duration::hours(24));
    }

    #[test]
    fn test_env_token_wins_over_file() {
        let config = Config {
            api_token: Some("file-token".to_string()),
            ..Config::default()
        };

        let token = config.resolve_token(Some("env-token".to_string())).unwrap();
        assert_eq!(token.expose_secret(), "env-token");

        let token = config.resolve_token(None).unwrap();
        assert_eq!(token.expose_secret(), "file-token");

        let token = config.resolve_token(Some("  ".to_string())).unwrap();
        assert_eq!(token.expose_secret(), "file-token");

        assert!(Config::default().resolve_token(None).is_none());
    }

    #[test]
    fn test_debug_masks_api_token() {
        let config = Config {
            api_token: Some("super-secret-token-12345".to_string()),
            ..Config::default()
        };

        let debug_output = format!("{:?}", config);
        assert!(!debug_output.contains("super-secret-token-12345"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}
