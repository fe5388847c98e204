use specify_core::keys::{KeyStore, KeyStoreError, Provider};
use specify_core::{Settings, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_SECS};

use crate::error::ProviderError;

pub const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

/// Model used when neither the command line nor the settings name one.
pub fn default_model(provider: Provider) -> &'static str {
    match provider {
        Provider::Anthropic => "claude-3-5-haiku-latest",
        Provider::Ollama => "llama3.1",
        Provider::OpenAi => "gpt-4o-mini",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl ProviderConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: None,
            base_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Trims the model and checks the timeout (1–300s) and retry (0–10) ranges.
    pub fn validate(mut self) -> Result<Self, ProviderError> {
        self.model = self.model.trim().to_string();
        if self.model.is_empty() {
            return Err(ProviderError::Config("model cannot be empty".to_string()));
        }
        if !(1..=300).contains(&self.timeout_secs) {
            return Err(ProviderError::Config(format!(
                "timeout must be between 1 and 300 seconds, got {}",
                self.timeout_secs
            )));
        }
        if self.max_retries > 10 {
            return Err(ProviderError::Config(format!(
                "max retries must be between 0 and 10, got {}",
                self.max_retries
            )));
        }
        Ok(self)
    }

    /// Ollama reads its base URL from `OLLAMA_HOST`; the hosted providers need their key variable set.
    pub fn from_env(provider: Provider, model: &str) -> Result<Self, ProviderError> {
        let mut config = Self::new(model);
        let value = std::env::var(provider.env_var()).ok();
        match provider {
            Provider::Ollama => {
                config.base_url = Some(value.unwrap_or_else(|| OLLAMA_DEFAULT_URL.to_string()));
            }
            Provider::OpenAi | Provider::Anthropic => {
                let Some(key) = value else {
                    return Err(ProviderError::Config(format!(
                        "environment variable {} is not set",
                        provider.env_var()
                    )));
                };
                config.api_key = Some(key);
            }
        }
        config.validate()
    }

    /// Stored key (or its environment fallback) plus the timeout and retry settings.
    pub fn from_store(
        provider: Provider,
        model: &str,
        keys: &KeyStore,
        settings: &Settings,
    ) -> Result<Self, ProviderError> {
        let mut config = Self::new(model);
        config.timeout_secs = settings.timeout_secs;
        config.max_retries = settings.max_retries;
        config.base_url = settings.base_url.clone();

        match (provider, keys.get_key(provider.as_str())) {
            (Provider::Ollama, Ok(url)) => {
                config.base_url.get_or_insert(url);
            }
            (Provider::Ollama, Err(KeyStoreError::NotFound(_))) => {
                config.base_url.get_or_insert_with(|| OLLAMA_DEFAULT_URL.to_string());
            }
            (_, Ok(key)) => config.api_key = Some(key),
            (_, Err(KeyStoreError::NotFound(_))) => {
                return Err(ProviderError::Config(format!(
                    "no API key for {provider}; run `specify config set-key --provider {provider}` or set {}",
                    provider.env_var()
                )));
            }
            (_, Err(e)) => return Err(ProviderError::Config(e.to_string())),
        }
        config.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn validate_trims_and_checks_ranges() {
        let config = ProviderConfig::new("  gpt-4o  ").validate().unwrap();
        assert_eq!(config.model, "gpt-4o");
        assert!(ProviderConfig::new("   ").validate().is_err());

        let mut slow = ProviderConfig::new("m");
        slow.timeout_secs = 301;
        assert!(matches!(slow.validate(), Err(ProviderError::Config(_))));
        let mut eager = ProviderConfig::new("m");
        eager.max_retries = 11;
        assert!(eager.validate().is_err());
    }

    #[test]
    #[serial]
    fn from_env_per_provider() {
        std::env::remove_var("OLLAMA_HOST");
        std::env::remove_var("OPENAI_API_KEY");

        let ollama = ProviderConfig::from_env(Provider::Ollama, "llama3.1").unwrap();
        assert_eq!(ollama.base_url.as_deref(), Some(OLLAMA_DEFAULT_URL));
        assert!(ollama.api_key.is_none());

        assert!(matches!(
            ProviderConfig::from_env(Provider::OpenAi, "gpt-4o"),
            Err(ProviderError::Config(_))
        ));
        std::env::set_var("OPENAI_API_KEY", "sk-env");
        let openai = ProviderConfig::from_env(Provider::OpenAi, "gpt-4o").unwrap();
        assert_eq!(openai.api_key.as_deref(), Some("sk-env"));
        std::env::remove_var("OPENAI_API_KEY");
    }

    #[test]
    #[serial]
    fn from_store_uses_saved_keys_and_settings() {
        std::env::remove_var("ANTHROPIC_API_KEY");
        std::env::remove_var("OLLAMA_HOST");
        let dir = tempfile::tempdir().unwrap();
        let keys = KeyStore::new(dir.path());
        let settings = Settings {
            timeout_secs: 30,
            max_retries: 1,
            ..Settings::default()
        };

        assert!(ProviderConfig::from_store(Provider::Anthropic, "claude", &keys, &settings).is_err());
        keys.store_key("anthropic", "sk-ant-stored").unwrap();
        let config = ProviderConfig::from_store(Provider::Anthropic, "claude", &keys, &settings).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("sk-ant-stored"));
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.max_retries, 1);

        let ollama = ProviderConfig::from_store(Provider::Ollama, "llama3.1", &keys, &settings).unwrap();
        assert_eq!(ollama.base_url.as_deref(), Some(OLLAMA_DEFAULT_URL));
    }
}
