//! Service configuration.
//!
//! Precedence, lowest first: built-in defaults, the TOML file, environment
//! variables, then CLI flags (applied by the binary).

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use advisor::{ImageLimits, InputRanges, ACCEPTED_IMAGE_TYPES, DEFAULT_MAX_IMAGE_BYTES};

use crate::auth::DEFAULT_SESSION_TTL_SECS;

/// Default listen address.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Default request body limit. Leaves room for base64 overhead on an 8 MiB photo.
pub const DEFAULT_MAX_BODY_BYTES: usize = 12 * 1024 * 1024;

/// Config file path environment variable.
pub const CONFIG_ENV: &str = "AGRISMART_CONFIG";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub ai: AiConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub validation: ValidationConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// AI provider selection. API keys are read from the provider's own
/// environment variable, never from this file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// `gemini`, `anthropic` or `openai`; first configured if unset
    pub provider: Option<String>,
    /// Provider default if unset
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: None,
            model: None,
            temperature: advisor::flows::DEFAULT_TEMPERATURE,
            max_tokens: advisor::flows::DEFAULT_MAX_TOKENS,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AuthBackend {
    #[default]
    Local,
    Firebase,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub backend: AuthBackend,
    pub firebase_api_key: Option<String>,
    /// Lifetime of local-backend session tokens
    pub session_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            backend: AuthBackend::Local,
            firebase_api_key: None,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    #[default]
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            data_dir: PathBuf::from("./data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub ranges: InputRanges,
    pub max_image_bytes: usize,
    pub accepted_image_types: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            ranges: InputRanges::default(),
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            accepted_image_types: ACCEPTED_IMAGE_TYPES.iter().map(ToString::to_string).collect(),
        }
    }
}

impl ValidationConfig {
    pub fn image_limits(&self) -> ImageLimits {
        ImageLimits {
            accepted_types: self.accepted_image_types.clone(),
            max_bytes: self.max_image_bytes,
        }
    }
}

impl Config {
    /// Load from an optional TOML file, then apply environment overrides.
    ///
    /// Without an explicit path, `AGRISMART_CONFIG` is consulted. A path that
    /// was asked for but cannot be read is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `AGRISMART_*` and `FIREBASE_API_KEY` overrides.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(addr) = get("AGRISMART_BIND_ADDR") {
            self.server.bind_addr = addr;
        }
        if let Some(bytes) = get("AGRISMART_MAX_BODY_BYTES") {
            self.server.max_body_bytes = bytes
                .parse()
                .context("AGRISMART_MAX_BODY_BYTES must be a byte count")?;
        }
        if let Some(provider) = get("AGRISMART_AI_PROVIDER") {
            self.ai.provider = Some(provider);
        }
        if let Some(model) = get("AGRISMART_AI_MODEL") {
            self.ai.model = Some(model);
        }
        if let Some(backend) = get("AGRISMART_AUTH_BACKEND") {
            self.auth.backend = match backend.to_lowercase().as_str() {
                "local" => AuthBackend::Local,
                "firebase" => AuthBackend::Firebase,
                other => bail!("Unknown auth backend '{other}' (expected local or firebase)"),
            };
        }
        if let Some(key) = get("FIREBASE_API_KEY") {
            self.auth.firebase_api_key = Some(key);
        }
        if let Some(secs) = get("AGRISMART_SESSION_TTL_SECS") {
            self.auth.session_ttl_secs = secs
                .parse()
                .context("AGRISMART_SESSION_TTL_SECS must be a number of seconds")?;
        }
        if let Some(backend) = get("AGRISMART_STORAGE_BACKEND") {
            self.storage.backend = match backend.to_lowercase().as_str() {
                "memory" => StorageBackend::Memory,
                "file" => StorageBackend::File,
                other => bail!("Unknown storage backend '{other}' (expected memory or file)"),
            };
        }
        if let Some(dir) = get("AGRISMART_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use advisor::FieldRange;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.server.max_body_bytes, 12 * 1024 * 1024);
        assert_eq!(config.auth.backend, AuthBackend::Local);
        assert_eq!(config.auth.session_ttl_secs, 86_400);
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.validation.ranges, InputRanges::default());
        assert!((config.ai.temperature - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [ai]
            provider = "anthropic"

            [storage]
            backend = "memory"

            [validation.ranges.ph]
            min = 4.0
            max = 9.0
            "#,
        )
        .unwrap();

        assert_eq!(config.ai.provider.as_deref(), Some("anthropic"));
        assert_eq!(config.ai.max_tokens, 2048);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.validation.ranges.ph, FieldRange::new(4.0, 9.0));
        assert_eq!(
            config.validation.ranges.nitrogen,
            InputRanges::default().nitrogen
        );
        assert_eq!(config.server, ServerConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("AGRISMART_BIND_ADDR", "127.0.0.1:9000"),
            ("AGRISMART_AUTH_BACKEND", "Firebase"),
            ("FIREBASE_API_KEY", "key"),
            ("AGRISMART_DATA_DIR", "/var/lib/agrismart"),
            ("AGRISMART_AI_MODEL", ""),
            ("AGRISMART_SESSION_TTL_SECS", "600"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env(|key| env.get(key).map(ToString::to_string))
            .unwrap();

        assert_eq!(config.server.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.auth.backend, AuthBackend::Firebase);
        assert_eq!(config.auth.firebase_api_key.as_deref(), Some("key"));
        assert_eq!(config.storage.data_dir, PathBuf::from("/var/lib/agrismart"));
        assert_eq!(config.ai.model, None);
        assert_eq!(config.auth.session_ttl_secs, 600);
    }

    #[test]
    fn test_bad_env_values_are_errors() {
        let mut config = Config::default();
        assert!(config
            .apply_env(|key| (key == "AGRISMART_STORAGE_BACKEND").then(|| "sql".to_string()))
            .is_err());
    }

    #[test]
    fn test_image_limits() {
        let limits = ValidationConfig::default().image_limits();
        assert_eq!(limits, ImageLimits::default());
    }
}
