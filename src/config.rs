//! Service configuration.
//!
//! Defaults match the docker-compose deployment (`db` host, Ollama on the
//! docker host). Environment variables overlay the defaults; a JSON file can
//! replace them entirely.

use crate::types::{NlqError, Result};
use serde::{Deserialize, Serialize};
use sqlx::mysql::MySqlConnectOptions;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Database connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Database (schema) name; also scopes schema introspection
    pub name: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    /// Upper bound for one generated query
    pub query_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "db".to_string(),
            port: 3306,
            user: "ctis_user".to_string(),
            password: "secret_password".to_string(),
            name: "ctis_sims".to_string(),
            max_connections: 5,
            acquire_timeout_secs: 10,
            query_timeout_secs: 30,
        }
    }
}

impl DatabaseConfig {
    /// Driver connect options.
    ///
    /// Credentials are passed as fields, never through a URL, so passwords
    /// may contain any character.
    pub fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.name)
    }

    /// Connection URL with the password masked, for logs.
    pub fn masked_url(&self) -> String {
        format!(
            "mysql://{}:****@{}:{}/{}",
            self.user, self.host, self.port, self.name
        )
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

/// Generation backend settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Ollama root URL (no trailing `/api/...`)
    pub base_url: String,
    pub translation_model: String,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://host.docker.internal:11434".to_string(),
            translation_model: "llama3.2:latest".to_string(),
            timeout_secs: 60,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// One entry of the generation fallback sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelAttempt {
    /// Display name reported with results (e.g. "Primary")
    pub name: String,

    /// Model identifier sent to the backend
    pub model_identifier: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Attempts made with this entry before moving on
    pub retry_count: u32,
}

impl ModelAttempt {
    /// Create new attempt entry.
    pub fn new(
        name: impl Into<String>,
        model_identifier: impl Into<String>,
        temperature: f32,
        retry_count: u32,
    ) -> Self {
        Self {
            name: name.into(),
            model_identifier: model_identifier.into(),
            temperature,
            retry_count,
        }
    }
}

/// Default fallback sequence: a low-temperature primary with one retry, then
/// a warmer fallback.
pub fn default_model_sequence() -> Vec<ModelAttempt> {
    vec![
        ModelAttempt::new("Primary", "llama3.2:latest", 0.1, 2),
        ModelAttempt::new("Fallback", "llama3.2:latest", 0.3, 1),
    ]
}

/// Response cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_seconds: u64,
    pub max_size: usize,
    /// Also cache failed pipeline runs
    pub cache_failures: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 300,
            max_size: 100,
            cache_failures: false,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

/// Complete service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub backend: BackendConfig,
    pub model_sequence: Vec<ModelAttempt>,
    pub cache: CacheConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            backend: BackendConfig::default(),
            model_sequence: default_model_sequence(),
            cache: CacheConfig::default(),
        }
    }
}

impl Config {
    /// Defaults overlaid with environment variables.
    ///
    /// Reads `DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASSWORD`, `DB_NAME`,
    /// `OLLAMA_HOST` (host only, port 11434), `OLLAMA_URL` (full root URL,
    /// wins over `OLLAMA_HOST`) and `TRANSLATION_MODEL`.
    ///
    /// # Errors
    ///
    /// Returns `NlqError::ConfigError` if `DB_PORT` is not a port number
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.overlay(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a JSON file.
    ///
    /// Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|e| NlqError::ConfigError(format!("Invalid config: {}", e)))?;
        Ok(config)
    }

    /// Apply variables from `lookup` on top of the current values.
    pub fn overlay(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(host) = lookup("DB_HOST") {
            self.database.host = host;
        }
        if let Some(port) = lookup("DB_PORT") {
            self.database.port = port
                .parse()
                .map_err(|_| NlqError::ConfigError(format!("Invalid DB_PORT: {}", port)))?;
        }
        if let Some(user) = lookup("DB_USER") {
            self.database.user = user;
        }
        if let Some(password) = lookup("DB_PASSWORD") {
            self.database.password = password;
        }
        if let Some(name) = lookup("DB_NAME") {
            self.database.name = name;
        }
        if let Some(host) = lookup("OLLAMA_HOST") {
            self.backend.base_url = format!("http://{}:11434", host);
        }
        if let Some(url) = lookup("OLLAMA_URL") {
            self.backend.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = lookup("TRANSLATION_MODEL") {
            self.backend.translation_model = model;
        }
        Ok(())
    }

    /// Check the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns `NlqError::ConfigError` naming the first problem found
    pub fn validate(&self) -> Result<()> {
        if self.model_sequence.is_empty() {
            return Err(NlqError::ConfigError("model_sequence is empty".to_string()));
        }
        if let Some(entry) = self.model_sequence.iter().find(|m| m.retry_count == 0) {
            return Err(NlqError::ConfigError(format!(
                "model '{}' has retry_count 0",
                entry.name
            )));
        }
        if let Some(entry) = self
            .model_sequence
            .iter()
            .find(|m| m.model_identifier.trim().is_empty())
        {
            return Err(NlqError::ConfigError(format!(
                "model '{}' has no model_identifier",
                entry.name
            )));
        }
        if self.cache.max_size == 0 {
            return Err(NlqError::ConfigError("cache.max_size must be at least 1".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(NlqError::ConfigError(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.database.query_timeout_secs == 0 || self.backend.timeout_secs == 0 {
            return Err(NlqError::ConfigError("timeouts must be non-zero".to_string()));
        }
        if self.backend.translation_model.trim().is_empty() {
            return Err(NlqError::ConfigError("backend.translation_model is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.database.masked_url(), "mysql://ctis_user:****@db:3306/ctis_sims");
        assert_eq!(config.backend.base_url, "http://host.docker.internal:11434");
        assert_eq!(config.model_sequence.len(), 2);
        assert_eq!(config.model_sequence[0].retry_count, 2);
        assert_eq!(config.model_sequence[1].temperature, 0.3);
        assert_eq!(config.cache.ttl(), Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overlay() {
        let vars: HashMap<&str, &str> = [
            ("DB_HOST", "localhost"),
            ("DB_PORT", "3307"),
            ("DB_NAME", "inventory"),
            ("OLLAMA_HOST", "ollama"),
            ("TRANSLATION_MODEL", "qwen2.5:7b"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .overlay(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.database.port, 3307);
        assert_eq!(config.database.name, "inventory");
        assert_eq!(config.database.user, "ctis_user");
        assert_eq!(config.backend.base_url, "http://ollama:11434");
        assert_eq!(config.backend.translation_model, "qwen2.5:7b");
    }

    #[test]
    fn test_connect_options_keep_special_password_out_of_url() {
        let database = DatabaseConfig {
            password: "p@ss#w/rd%".to_string(),
            ..DatabaseConfig::default()
        };
        let options = database.connect_options();
        assert_eq!(options.get_host(), "db");
        assert_eq!(options.get_port(), 3306);
        assert_eq!(options.get_username(), "ctis_user");
        assert_eq!(options.get_database(), Some("ctis_sims"));
        assert_eq!(database.masked_url(), "mysql://ctis_user:****@db:3306/ctis_sims");
    }

    #[test]
    fn test_ollama_url_wins_over_host() {
        let mut config = Config::default();
        config
            .overlay(|key| match key {
                "OLLAMA_HOST" => Some("ignored".to_string()),
                "OLLAMA_URL" => Some("https://llm.internal/".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.backend.base_url, "https://llm.internal");
    }

    #[test]
    fn test_bad_port_rejected() {
        let mut config = Config::default();
        let err = config
            .overlay(|key| (key == "DB_PORT").then(|| "mysql".to_string()))
            .unwrap_err();
        assert!(matches!(err, NlqError::ConfigError(_)));
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nlq.json");
        fs::write(
            &path,
            r#"{
                "database": {"host": "10.0.0.5"},
                "model_sequence": [
                    {"name": "Only", "model_identifier": "sqlcoder:7b", "temperature": 0.0, "retry_count": 3}
                ],
                "cache": {"cache_failures": true}
            }"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.database.host, "10.0.0.5");
        assert_eq!(config.database.name, "ctis_sims");
        assert_eq!(config.model_sequence, vec![ModelAttempt::new("Only", "sqlcoder:7b", 0.0, 3)]);
        assert!(config.cache.cache_failures);
        assert_eq!(config.cache.max_size, 100);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            Config::load(dir.path().join("missing.json")),
            Err(NlqError::IoError(_))
        ));

        let path = dir.path().join("bad.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(Config::load(&path), Err(NlqError::ConfigError(_))));
    }

    #[test]
    fn test_validate_rejects_unusable_settings() {
        let mut config = Config::default();
        config.model_sequence.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.model_sequence[1].retry_count = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.cache.max_size = 0;
        assert!(config.validate().is_err());
    }
}
