pub mod config;
pub mod engine;
pub mod error;
mod parse;
mod prompt;

pub use config::{default_model, ProviderConfig};
pub use error::ProviderError;
pub use parse::parse_profile;

use async_trait::async_trait;
use specify_core::extract::{ExtractError, KeywordExtractor, ProfileExtractor};
use specify_core::keys::Provider;
use specify_core::profile::{InputProfile, ProfileField};
use tracing::{debug, info, warn};

/// Profile extraction through an LLM, falling back to keyword matching when the model fails.
#[derive(Debug, Clone)]
pub struct LlmExtractor {
    provider: Provider,
    config: ProviderConfig,
    fallback: KeywordExtractor,
}

impl LlmExtractor {
    pub fn new(provider: Provider, config: ProviderConfig) -> Self {
        Self {
            provider,
            config,
            fallback: KeywordExtractor,
        }
    }

    async fn ask(&self, text: &str) -> Result<InputProfile, ProviderError> {
        let system = prompt::system_prompt();
        let user_msg = prompt::user_message(text);
        let raw = engine::generate(self.provider, &self.config, &system, &user_msg).await?;
        debug!(raw = %raw, "raw LLM output");
        parse_profile(&raw, text)
    }
}

#[async_trait]
impl ProfileExtractor for LlmExtractor {
    async fn extract(&self, text: &str) -> Result<InputProfile, ExtractError> {
        if text.trim().is_empty() {
            return Err(ExtractError::Empty);
        }
        info!(provider = %self.provider, model = %self.config.model, "extracting profile");
        match self.ask(text).await {
            Ok(profile) => Ok(fill_gaps(profile, self.fallback.profile(text))),
            Err(e) => {
                warn!(error = %e, "LLM extraction failed; falling back to keyword extraction");
                self.fallback.extract(text).await
            }
        }
    }
}

/// Fields the model left empty are taken from the keyword pass; the model's answers win.
fn fill_gaps(mut profile: InputProfile, keywords: InputProfile) -> InputProfile {
    if profile.project_name.is_none() {
        profile.project_name = keywords.project_name;
    }
    if profile.domain.is_none() && !keywords.contradictions.contains(&ProfileField::Domain) {
        profile.domain = keywords.domain;
    }
    if profile.scale.is_none() {
        profile.scale = keywords.scale;
    }
    if profile.entities.is_empty() {
        profile.entities = keywords.entities;
    }
    if profile.primary_action.is_none() {
        profile.primary_action = keywords.primary_action;
    }
    if profile.real_time.is_none() {
        profile.real_time = keywords.real_time;
        if keywords.contradictions.contains(&ProfileField::RealTime) {
            profile.contradictions.insert(ProfileField::RealTime);
        }
    }
    if profile.sensitive_data.is_none() {
        profile.sensitive_data = keywords.sensitive_data;
        if keywords.contradictions.contains(&ProfileField::SensitiveData) {
            profile.contradictions.insert(ProfileField::SensitiveData);
        }
    }
    profile.tech_preferences.extend(keywords.tech_preferences);
    profile
}

#[cfg(test)]
mod tests {
    use super::*;
    use specify_core::profile::{Domain, ScaleHint};

    #[tokio::test]
    async fn falls_back_to_keywords_when_the_model_is_unreachable() {
        let mut config = ProviderConfig::new("llama3.1");
        config.base_url = Some("http://127.0.0.1:9".to_string());
        config.timeout_secs = 2;
        config.max_retries = 0;
        let extractor = LlmExtractor::new(Provider::Ollama, config);

        let profile = extractor
            .extract("A personal blog with 50 readers.")
            .await
            .unwrap();
        assert_eq!(profile, KeywordExtractor.profile("A personal blog with 50 readers."));
        assert!(matches!(extractor.extract("  ").await, Err(ExtractError::Empty)));
    }

    #[test]
    fn model_answers_win_over_keywords() {
        let llm = InputProfile::new("d")
            .with_domain(Domain::Healthcare)
            .with_preference("postgresql");
        let keywords = InputProfile::new("d")
            .with_domain(Domain::Content)
            .with_scale(ScaleHint::Users(50))
            .with_preference("kafka");
        let merged = fill_gaps(llm, keywords);
        assert_eq!(merged.domain, Some(Domain::Healthcare));
        assert_eq!(merged.scale, Some(ScaleHint::Users(50)));
        assert_eq!(merged.tech_preferences.len(), 2);
    }

    #[test]
    fn flags_the_model_left_out_come_from_keywords() {
        let llm = InputProfile::new("d").with_real_time(false);
        let keywords = InputProfile::new("d")
            .with_primary_action("share photos")
            .with_real_time(true)
            .with_sensitive_data(true);
        let merged = fill_gaps(llm, keywords);
        assert_eq!(merged.real_time, Some(false));
        assert_eq!(merged.sensitive_data, Some(true));
        assert_eq!(merged.primary_action.as_deref(), Some("share photos"));
    }
}
