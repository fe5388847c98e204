use std::time::Duration;

use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::ChatMessage;
use specify_core::keys::Provider;
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::error::ProviderError;

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const OPENAI_URL: &str = "https://api.openai.com";
const ANTHROPIC_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

fn map_backend(provider: Provider) -> LLMBackend {
    match provider {
        Provider::OpenAi => LLMBackend::OpenAI,
        Provider::Anthropic => LLMBackend::Anthropic,
        Provider::Ollama => LLMBackend::Ollama,
    }
}

/// One chat exchange, retried with exponential backoff on transient failures.
pub async fn generate(
    provider: Provider,
    config: &ProviderConfig,
    system: &str,
    user_msg: &str,
) -> Result<String, ProviderError> {
    let config = config.clone().validate()?;
    let mut backoff = INITIAL_BACKOFF;
    let mut attempt = 0;
    loop {
        attempt += 1;
        match attempt_once(provider, &config, system, user_msg).await {
            Ok(text) => return Ok(text),
            Err(e) if e.is_transient() && attempt <= config.max_retries => {
                warn!(%provider, attempt, error = %e, ?backoff, "LLM call failed; retrying");
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn attempt_once(
    provider: Provider,
    config: &ProviderConfig,
    system: &str,
    user_msg: &str,
) -> Result<String, ProviderError> {
    let mut builder = LLMBuilder::new()
        .backend(map_backend(provider))
        .model(&config.model)
        .system(system);

    if let Some(key) = config.api_key.as_deref().filter(|k| !k.is_empty()) {
        builder = builder.api_key(key);
    }
    if let Some(url) = &config.base_url {
        builder = builder.base_url(url);
    }

    let llm = builder
        .build()
        .map_err(|e| ProviderError::Config(format!("build LLM: {e}")))?;

    let messages = vec![ChatMessage::user().content(user_msg).build()];

    let limit = Duration::from_secs(config.timeout_secs);
    let response = tokio::time::timeout(limit, llm.chat(&messages))
        .await
        .map_err(|_| ProviderError::Connection(format!("no response within {}s", config.timeout_secs)))?
        .map_err(|e| ProviderError::classify(&e.to_string()))?;

    match response.text() {
        Some(text) if !text.trim().is_empty() => {
            debug!(%provider, chars = text.len(), "LLM responded");
            Ok(text)
        }
        Some(_) => Err(ProviderError::Response("LLM returned empty text".to_string())),
        None => Err(ProviderError::Response("LLM returned no text".to_string())),
    }
}

/// Cheap authenticated request that lists models; succeeds when the provider is reachable.
pub async fn validate_connection(provider: Provider, config: &ProviderConfig) -> Result<(), ProviderError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs.clamp(1, 300)))
        .build()
        .map_err(|e| ProviderError::Config(e.to_string()))?;

    let request = match provider {
        Provider::Ollama => {
            let base = config
                .base_url
                .as_deref()
                .unwrap_or(crate::config::OLLAMA_DEFAULT_URL);
            client.get(format!("{}/api/tags", base.trim_end_matches('/')))
        }
        Provider::OpenAi => {
            let base = config.base_url.as_deref().unwrap_or(OPENAI_URL);
            client
                .get(format!("{}/v1/models", base.trim_end_matches('/')))
                .bearer_auth(config.api_key.as_deref().unwrap_or_default())
        }
        Provider::Anthropic => {
            let base = config.base_url.as_deref().unwrap_or(ANTHROPIC_URL);
            client
                .get(format!("{}/v1/models", base.trim_end_matches('/')))
                .header("x-api-key", config.api_key.as_deref().unwrap_or_default())
                .header("anthropic-version", ANTHROPIC_VERSION)
        }
    };

    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::Connection(e.to_string()))?;
    let status = response.status();
    debug!(%provider, %status, "connection check");
    match status.as_u16() {
        200..=299 => Ok(()),
        401 | 403 => Err(ProviderError::Auth(format!("{provider} rejected the credentials ({status})"))),
        429 => Err(ProviderError::RateLimit(format!("{provider} returned {status}"))),
        _ => Err(ProviderError::Response(format!("{provider} returned {status}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_ollama() -> ProviderConfig {
        let mut config = ProviderConfig::new("llama3.1");
        config.base_url = Some("http://127.0.0.1:9".to_string());
        config.timeout_secs = 2;
        config.max_retries = 0;
        config
    }

    #[tokio::test]
    async fn invalid_config_fails_before_any_request() {
        let config = ProviderConfig::new("  ");
        let err = generate(Provider::Ollama, &config, "s", "u").await.unwrap_err();
        assert!(matches!(err, ProviderError::Config(_)));
    }

    #[tokio::test]
    async fn unreachable_host_is_an_error() {
        assert!(generate(Provider::Ollama, &unreachable_ollama(), "s", "u").await.is_err());
        let err = validate_connection(Provider::Ollama, &unreachable_ollama())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Connection(_)));
    }
}
