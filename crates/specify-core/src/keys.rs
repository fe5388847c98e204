//! API keys for LLM providers, stored in `<specify_dir>/keys.json`.
//!
//! Keys are kept in plain JSON with owner-only permissions. The provider's
//! environment variable is consulted whenever the file has no entry.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const KEYS_FILE: &str = "keys.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Anthropic,
    Ollama,
    OpenAi,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Anthropic, Provider::Ollama, Provider::OpenAi];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
        }
    }

    pub fn env_var(self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::Ollama => "OLLAMA_HOST",
            Self::OpenAi => "OPENAI_API_KEY",
        }
    }

    /// Case-insensitive.
    pub fn parse(name: &str) -> Result<Self, KeyStoreError> {
        let lower = name.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == lower)
            .ok_or_else(|| KeyStoreError::InvalidProvider(name.to_string()))
    }

    fn env_value(self) -> Option<String> {
        std::env::var(self.env_var()).ok().filter(|v| !v.is_empty())
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = KeyStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[derive(Debug, Error)]
pub enum KeyStoreError {
    #[error("Invalid provider: {0}. Must be one of: anthropic, ollama, openai")]
    InvalidProvider(String),
    #[error("API key cannot be empty")]
    EmptyKey,
    #[error("No key found for provider: {0}")]
    NotFound(Provider),
    #[error("Invalid keys file format: {message}. Please fix or delete the file at {}", path.display())]
    InvalidFile { path: PathBuf, message: String },
    #[error("{action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct KeyStore {
    dir: PathBuf,
}

impl KeyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn default_location() -> Self {
        Self::new(crate::specify_dir())
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(KEYS_FILE)
    }

    pub fn store_key(&self, provider: &str, key: &str) -> Result<(), KeyStoreError> {
        let provider = Provider::parse(provider)?;
        let key = key.trim();
        if key.is_empty() {
            return Err(KeyStoreError::EmptyKey);
        }
        fs::create_dir_all(&self.dir).map_err(|source| KeyStoreError::Io {
            action: "creating",
            path: self.dir.clone(),
            source,
        })?;
        let mut keys = self.load()?;
        keys.insert(provider.as_str().to_string(), key.to_string());
        self.save(&keys)?;
        debug!(%provider, "stored API key");
        Ok(())
    }

    /// The stored key, else the provider's environment variable.
    pub fn get_key(&self, provider: &str) -> Result<String, KeyStoreError> {
        let provider = Provider::parse(provider)?;
        if let Some(key) = self.load()?.remove(provider.as_str()) {
            return Ok(key);
        }
        provider.env_value().ok_or(KeyStoreError::NotFound(provider))
    }

    /// Masked keys from the file, plus environment keys for providers the file lacks.
    pub fn list_keys(&self) -> Result<BTreeMap<String, String>, KeyStoreError> {
        let mut keys = self.load()?;
        for provider in Provider::ALL {
            if keys.contains_key(provider.as_str()) {
                continue;
            }
            if let Some(value) = provider.env_value() {
                keys.insert(provider.as_str().to_string(), value);
            }
        }
        Ok(keys.into_iter().map(|(p, k)| (p, mask_key(&k))).collect())
    }

    /// Only the file is touched; environment variables are left alone.
    pub fn delete_key(&self, provider: &str) -> Result<(), KeyStoreError> {
        let provider = Provider::parse(provider)?;
        let mut keys = self.load()?;
        if keys.remove(provider.as_str()).is_none() {
            return Err(KeyStoreError::NotFound(provider));
        }
        self.save(&keys)?;
        debug!(%provider, "deleted API key");
        Ok(())
    }

    pub fn key_exists(&self, provider: &str) -> Result<bool, KeyStoreError> {
        let provider = Provider::parse(provider)?;
        if self.load()?.contains_key(provider.as_str()) {
            return Ok(true);
        }
        Ok(std::env::var_os(provider.env_var()).is_some())
    }

    fn load(&self) -> Result<BTreeMap<String, String>, KeyStoreError> {
        let path = self.path();
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = fs::read_to_string(&path).map_err(|source| KeyStoreError::Io {
            action: "reading",
            path: path.clone(),
            source,
        })?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        let value: serde_json::Value =
            serde_json::from_str(&raw).map_err(|e| KeyStoreError::InvalidFile {
                path: path.clone(),
                message: e.to_string(),
            })?;
        let serde_json::Value::Object(map) = value else {
            return Ok(BTreeMap::new());
        };
        Ok(map
            .into_iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
            .collect())
    }

    fn save(&self, keys: &BTreeMap<String, String>) -> Result<(), KeyStoreError> {
        let path = self.path();
        let io_err = |source| KeyStoreError::Io {
            action: "writing",
            path: path.clone(),
            source,
        };
        let mut json = serde_json::to_string_pretty(keys).map_err(|e| KeyStoreError::InvalidFile {
            path: path.clone(),
            message: e.to_string(),
        })?;
        json.push('\n');
        fs::write(&path, json).map_err(io_err)?;
        restrict_permissions(&path).map_err(io_err)
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// `sk-...123` for keys of six or more characters, `***` otherwise.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() < 6 {
        return "***".to_string();
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 3..].iter().collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for provider in Provider::ALL {
            std::env::remove_var(provider.env_var());
        }
    }

    #[test]
    fn masking() {
        assert_eq!(mask_key("sk-proj-abc123"), "sk-...123");
        assert_eq!(mask_key("abcdef"), "abc...def");
        assert_eq!(mask_key("abc"), "***");
    }

    #[test]
    fn provider_names_are_case_insensitive() {
        assert_eq!(Provider::parse("OpenAI").unwrap(), Provider::OpenAi);
        let err = Provider::parse("gemini").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid provider: gemini. Must be one of: anthropic, ollama, openai"
        );
    }

    #[test]
    #[serial]
    fn store_get_delete() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let store = KeyStore::new(dir.path().join("nested"));

        store.store_key("OpenAI", "  sk-proj-abc123  ").unwrap();
        assert_eq!(store.get_key("openai").unwrap(), "sk-proj-abc123");
        assert!(store.key_exists("openai").unwrap());

        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"openai\": \"sk-proj-abc123\""));

        store.delete_key("openai").unwrap();
        assert!(matches!(
            store.get_key("openai"),
            Err(KeyStoreError::NotFound(Provider::OpenAi))
        ));
        assert!(matches!(
            store.delete_key("openai"),
            Err(KeyStoreError::NotFound(Provider::OpenAi))
        ));
    }

    #[test]
    fn rejects_empty_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyStore::new(dir.path());
        assert!(matches!(store.store_key("anthropic", "   "), Err(KeyStoreError::EmptyKey)));
        assert!(!store.path().exists());
    }

    #[cfg(unix)]
    #[test]
    fn keys_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let store = KeyStore::new(dir.path());
        store.store_key("anthropic", "sk-ant-123456").unwrap();
        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    #[serial]
    fn environment_is_a_fallback() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let store = KeyStore::new(dir.path());
        std::env::set_var("ANTHROPIC_API_KEY", "sk-ant-from-env");
        store.store_key("openai", "sk-file-key-999").unwrap();

        assert_eq!(store.get_key("anthropic").unwrap(), "sk-ant-from-env");
        let listed = store.list_keys().unwrap();
        assert_eq!(listed.get("anthropic").map(String::as_str), Some("sk-...env"));
        assert_eq!(listed.get("openai").map(String::as_str), Some("sk-...999"));
        assert!(store.delete_key("anthropic").is_err());
        clear_env();
    }

    #[test]
    fn file_keys_take_precedence_over_environment() {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyStore::new(dir.path());
        store.store_key("ollama", "http://gpu-box:11434").unwrap();
        assert_eq!(store.get_key("ollama").unwrap(), "http://gpu-box:11434");
    }

    #[test]
    fn malformed_file_names_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyStore::new(dir.path());
        fs::write(store.path(), "{not json").unwrap();
        let err = store.list_keys().unwrap_err();
        assert!(matches!(err, KeyStoreError::InvalidFile { .. }));
        assert!(err.to_string().contains(&store.path().display().to_string()));

        fs::write(store.path(), "[1, 2]").unwrap();
        assert!(store.list_keys().unwrap().is_empty());
    }
}
