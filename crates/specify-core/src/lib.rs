pub mod assemble;
pub mod checklist;
pub mod defaults;
pub mod document;
pub mod extract;
pub mod gate;
pub mod keys;
pub mod naming;
pub mod pipeline;
pub mod profile;
pub mod rules;
pub mod text;
pub mod tier;

pub use assemble::{AssemblyError, SectionAssembler};
pub use checklist::{Criterion, ValidationChecklist, ValidationReport};
pub use defaults::{AssumptionsLog, ConfigProfile, DefaultsResolver, DefaultsTable, Origin};
pub use document::{Document, DocumentError, SectionId};
pub use extract::{ExtractError, KeywordExtractor, ProfileExtractor};
pub use gate::{ClarificationGate, GateDecision};
pub use keys::{KeyStore, KeyStoreError, Provider};
pub use pipeline::{Generation, GenerationRecord, Outcome, Pipeline, RunOptions};
pub use profile::{Domain, InputProfile, ScaleHint};
pub use tier::{ArchitectureStyle, ThroughputTier};

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

// --- Storage ---

pub const HOME_ENV: &str = "SPECIFY_HOME";
pub const SETTINGS_FILE: &str = "settings.json";

/// Resolve the configuration directory (`$SPECIFY_HOME`, else ~/.specify/).
pub fn specify_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(HOME_ENV).filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".specify")
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("malformed {}: {source}", path.display())]
    Document {
        path: PathBuf,
        #[source]
        source: DocumentError,
    },
    #[error("{0}")]
    Invalid(String),
}

// --- Generated documents ---

/// Write the document atomically (temp file + rename) into `dir`.
pub fn write_document(dir: &Path, document: &Document) -> Result<PathBuf, StorageError> {
    fs::create_dir_all(dir).map_err(|source| StorageError::Io {
        action: "creating",
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(pipeline::DOCUMENT_FILE);
    let tmp = dir.join(format!(".{}.tmp", pipeline::DOCUMENT_FILE));
    fs::write(&tmp, document.to_markdown()).map_err(|source| StorageError::Io {
        action: "writing",
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, &path).map_err(|source| StorageError::Io {
        action: "replacing",
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

/// Write the document and its profile sidecar; returns the document path.
pub fn save_generation(dir: &Path, generation: &Generation) -> Result<PathBuf, StorageError> {
    let path = write_document(dir, &generation.document)?;
    let record_path = dir.join(pipeline::RECORD_FILE);
    let json = serde_json::to_string_pretty(&generation.record).map_err(|source| StorageError::Json {
        path: record_path.clone(),
        source,
    })?;
    fs::write(&record_path, json).map_err(|source| StorageError::Io {
        action: "writing",
        path: record_path,
        source,
    })?;
    Ok(path)
}

/// Read back a document and the sidecar it was generated from.
pub fn load_generation(dir: &Path) -> Result<(Document, GenerationRecord), StorageError> {
    let doc_path = dir.join(pipeline::DOCUMENT_FILE);
    let markdown = fs::read_to_string(&doc_path).map_err(|source| StorageError::Io {
        action: "reading",
        path: doc_path.clone(),
        source,
    })?;
    let document = Document::parse(&markdown).map_err(|source| StorageError::Document {
        path: doc_path,
        source,
    })?;

    let record_path = dir.join(pipeline::RECORD_FILE);
    let raw = fs::read_to_string(&record_path).map_err(|source| StorageError::Io {
        action: "reading",
        path: record_path.clone(),
        source,
    })?;
    let record = serde_json::from_str(&raw).map_err(|source| StorageError::Json {
        path: record_path,
        source,
    })?;
    Ok((document, record))
}

// --- LLM settings ---

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Seconds per request, 1 to 300.
    pub timeout_secs: u64,
    /// Attempts after the first, 0 to 10.
    pub max_retries: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: None,
            model: None,
            base_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), StorageError> {
        if !(1..=300).contains(&self.timeout_secs) {
            return Err(StorageError::Invalid(format!(
                "timeoutSecs must be between 1 and 300, got {}",
                self.timeout_secs
            )));
        }
        if self.max_retries > 10 {
            return Err(StorageError::Invalid(format!(
                "maxRetries must be between 0 and 10, got {}",
                self.max_retries
            )));
        }
        if self.model.as_deref().is_some_and(|m| m.trim().is_empty()) {
            return Err(StorageError::Invalid("model cannot be empty".to_string()));
        }
        Ok(())
    }

    /// The model recorded for `provider`, if that provider is the configured one.
    pub fn model_for(&self, provider: Provider) -> Option<&str> {
        (self.provider == Some(provider))
            .then_some(self.model.as_deref())
            .flatten()
    }
}

fn settings_path(dir: &Path) -> PathBuf {
    dir.join(SETTINGS_FILE)
}

pub fn read_settings() -> Settings {
    read_settings_in(&specify_dir())
}

/// Missing or unreadable settings fall back to the defaults.
pub fn read_settings_in(dir: &Path) -> Settings {
    let path = settings_path(dir);
    if !path.exists() {
        return Settings::default();
    }
    let parsed = fs::read_to_string(&path)
        .map_err(|e| e.to_string())
        .and_then(|s| serde_json::from_str::<Settings>(&s).map_err(|e| e.to_string()));
    match parsed {
        Ok(settings) if settings.validate().is_ok() => settings,
        Ok(_) => {
            warn!(path = %path.display(), "settings out of range; using defaults");
            Settings::default()
        }
        Err(error) => {
            warn!(path = %path.display(), %error, "unreadable settings; using defaults");
            Settings::default()
        }
    }
}

pub fn write_settings(settings: &Settings) -> Result<(), StorageError> {
    write_settings_in(&specify_dir(), settings)
}

pub fn write_settings_in(dir: &Path, settings: &Settings) -> Result<(), StorageError> {
    settings.validate()?;
    fs::create_dir_all(dir).map_err(|source| StorageError::Io {
        action: "creating",
        path: dir.to_path_buf(),
        source,
    })?;
    let path = settings_path(dir);
    let json = serde_json::to_string_pretty(settings).map_err(|source| StorageError::Json {
        path: path.clone(),
        source,
    })?;
    fs::write(&path, json).map_err(|source| StorageError::Io {
        action: "writing",
        path,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn specify_home_overrides_the_home_directory() {
        std::env::set_var(HOME_ENV, "/tmp/specify-test-home");
        assert_eq!(specify_dir(), PathBuf::from("/tmp/specify-test-home"));
        std::env::remove_var(HOME_ENV);
        assert!(specify_dir().ends_with(".specify"));
    }

    #[test]
    fn settings_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_settings_in(dir.path()), Settings::default());

        let settings = Settings {
            provider: Some(Provider::Anthropic),
            model: Some("claude-sonnet-4-5".to_string()),
            max_retries: 5,
            ..Settings::default()
        };
        write_settings_in(dir.path(), &settings).unwrap();
        let raw = fs::read_to_string(dir.path().join(SETTINGS_FILE)).unwrap();
        assert!(raw.contains("\"maxRetries\": 5"));
        assert!(raw.contains("\"provider\": \"anthropic\""));
        assert_eq!(read_settings_in(dir.path()), settings);
        assert_eq!(settings.model_for(Provider::Anthropic), Some("claude-sonnet-4-5"));
        assert_eq!(settings.model_for(Provider::OpenAi), None);
    }

    #[test]
    fn out_of_range_settings_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            timeout_secs: 0,
            ..Settings::default()
        };
        assert!(matches!(
            write_settings_in(dir.path(), &settings),
            Err(StorageError::Invalid(_))
        ));

        fs::write(dir.path().join(SETTINGS_FILE), r#"{"maxRetries": 99}"#).unwrap();
        assert_eq!(read_settings_in(dir.path()), Settings::default());
        fs::write(dir.path().join(SETTINGS_FILE), "not json").unwrap();
        assert_eq!(read_settings_in(dir.path()), Settings::default());
    }

    #[test]
    fn generation_survives_a_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let profile = InputProfile::new("a shop").with_domain(Domain::Ecommerce);
        let Outcome::Complete(generation) = Pipeline::default().run(&profile, RunOptions::default()).unwrap()
        else {
            panic!("expected a document");
        };
        let path = save_generation(dir.path(), &generation).unwrap();
        assert!(path.ends_with(pipeline::DOCUMENT_FILE));

        let (document, record) = load_generation(dir.path()).unwrap();
        assert_eq!(record, generation.record);
        assert!(ValidationChecklist::run(&document, &record.config).passed());
    }

    #[test]
    fn missing_sidecar_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(pipeline::DOCUMENT_FILE), "# Backend Design Document: X\n").unwrap();
        assert!(matches!(
            load_generation(dir.path()),
            Err(StorageError::Io { action: "reading", .. })
        ));
    }

    #[test]
    fn partial_settings_fill_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(SETTINGS_FILE), r#"{"provider": "ollama"}"#).unwrap();
        let settings = read_settings_in(dir.path());
        assert_eq!(settings.provider, Some(Provider::Ollama));
        assert_eq!(settings.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }
}
