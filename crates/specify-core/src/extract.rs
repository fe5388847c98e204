//! Turning a free-text description into an [`InputProfile`].
//!
//! [`KeywordExtractor`] is the deterministic baseline. Richer extractors
//! (an LLM, or a calling model passing tags over MCP) implement the same trait.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::defaults::catalog_keywords;
use crate::profile::{Domain, InputProfile, ProfileField, ScaleHint};
use crate::text::{contains_word, find_word};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("description is empty")]
    Empty,
}

#[async_trait]
pub trait ProfileExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> Result<InputProfile, ExtractError>;
}

// --- Vocabularies ---

const ACTION_VERBS: &str = "buy|sell|book|share|post|publish|track|manage|chat|stream|pay|send|\
transfer|learn|monitor|order|schedule|rent|review|write|read|trade|invest|collaborate|discover|find|\
upload|listen|watch|play|plan|hire|donate|subscribe";

const ACTION_STOPWORDS: &[&str] = &[
    "and", "or", "to", "with", "for", "in", "on", "of", "from", "it", "them", "things", "stuff",
    "about", "their", "each", "other", "together", "online", "via",
];

/// (mention, entity) pairs; entities are ordered by first mention.
const ENTITY_CATALOG: &[(&str, &str)] = &[
    ("blog", "Post"),
    ("post", "Post"),
    ("article", "Article"),
    ("comment", "Comment"),
    ("product", "Product"),
    ("order", "Order"),
    ("cart", "Cart"),
    ("payment", "Payment"),
    ("invoice", "Invoice"),
    ("bank account", "Account"),
    ("wallet", "Wallet"),
    ("transaction", "Transaction"),
    ("subscription", "Subscription"),
    ("patient", "Patient"),
    ("appointment", "Appointment"),
    ("prescription", "Prescription"),
    ("device", "Device"),
    ("sensor", "Device"),
    ("telemetry", "Reading"),
    ("message", "Message"),
    ("project", "Project"),
    ("task", "Task"),
    ("course", "Course"),
    ("lesson", "Lesson"),
    ("shipment", "Shipment"),
    ("vehicle", "Vehicle"),
    ("review", "Review"),
    ("photo", "Photo"),
    ("video", "Video"),
    ("booking", "Booking"),
    ("reservation", "Booking"),
    ("listing", "Listing"),
];

const REALTIME_POSITIVE: &[&str] = &[
    "real-time",
    "realtime",
    "real time",
    "live chat",
    "live updates",
    "live streaming",
    "chat",
    "notifications",
    "collaborative editing",
    "websocket",
    "instant messaging",
];
const REALTIME_NEGATIVE: &[&str] = &[
    "no real-time",
    "no realtime",
    "no real time",
    "not real-time",
    "without real-time",
    "doesn't need real-time",
    "does not need real-time",
    "no live chat",
    "no chat",
    "no notifications",
];

const SENSITIVE_POSITIVE: &[&str] = &[
    "payment",
    "credit card",
    "bank details",
    "bank account",
    "health record",
    "medical record",
    "financial data",
    "medical data",
    "personal data",
    "pii",
    "ssn",
    "social security",
    "hipaa",
    "pci",
    "sensitive",
];
const SENSITIVE_NEGATIVE: &[&str] = &[
    "no payment",
    "without payment",
    "no sensitive",
    "not sensitive",
    "nothing sensitive",
    "no personal data",
    "no pii",
    "no financial",
    "no medical",
    "doesn't store sensitive",
    "does not store sensitive",
    "won't store sensitive",
];

static ACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b({ACTION_VERBS})\s+(?:(?:a|an|the|their|our|my|your|some|new|other|local)\s+)?([a-z][a-z-]*)"
    ))
    .expect("action pattern is valid")
});

static SCALE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(\d[\d,]*(?:\.\d+)?)\s*(k|m|thousand|million|mil)?\s*\+?\s*(?:(?:daily|monthly|active|concurrent|registered|paying|expected)\s+)*(users|readers|customers|subscribers|visitors|players|members|patients|students|devices|people|followers|listeners|viewers|drivers|merchants|sellers|buyers|clients)\b",
    )
    .expect("scale pattern is valid")
});

static SCALE_VAGUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(hundreds|thousands|millions)\s+of\b").expect("pattern is valid"));

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\b(?i:called|named)\s+["']?([A-Za-z0-9][\w-]*(?:\s+[A-Z][\w-]*)*)"#)
        .expect("name pattern is valid")
});

// --- Keyword extractor ---

#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordExtractor;

impl KeywordExtractor {
    /// Synchronous extraction; the same text always yields the same profile.
    pub fn profile(&self, text: &str) -> InputProfile {
        let lower = text.to_lowercase();
        let mut profile = InputProfile::new(text.trim());

        let (domain, tied) = detect_domain(&lower);
        profile.domain = domain;
        if tied {
            profile.contradictions.insert(ProfileField::Domain);
        }

        profile.primary_action = detect_action(&lower);
        profile.entities = detect_entities(&lower);
        profile.scale = detect_scale(&lower);
        profile.project_name = detect_name(text);

        let (real_time, rt_conflict) = detect_flag(&lower, REALTIME_POSITIVE, REALTIME_NEGATIVE);
        profile.real_time = real_time;
        if rt_conflict {
            profile.contradictions.insert(ProfileField::RealTime);
        }
        let (sensitive, s_conflict) = detect_flag(&lower, SENSITIVE_POSITIVE, SENSITIVE_NEGATIVE);
        profile.sensitive_data = sensitive;
        if s_conflict {
            profile.contradictions.insert(ProfileField::SensitiveData);
        }

        profile.tech_preferences = catalog_keywords()
            .filter(|k| contains_word(&lower, k))
            .map(str::to_string)
            .collect();

        debug!(
            domain = ?profile.domain,
            action = ?profile.primary_action,
            entities = profile.entities.len(),
            preferences = profile.tech_preferences.len(),
            "keyword extraction finished"
        );
        profile
    }
}

#[async_trait]
impl ProfileExtractor for KeywordExtractor {
    async fn extract(&self, text: &str) -> Result<InputProfile, ExtractError> {
        if text.trim().is_empty() {
            return Err(ExtractError::Empty);
        }
        Ok(self.profile(text))
    }
}

/// Highest keyword hit count wins; a tie at the top is reported.
fn detect_domain(lower: &str) -> (Option<Domain>, bool) {
    let scores: Vec<(Domain, usize)> = Domain::ALL
        .into_iter()
        .map(|d| (d, d.keywords().iter().filter(|k| contains_word(lower, k)).count()))
        .filter(|(_, n)| *n > 0)
        .collect();
    let Some(best) = scores.iter().map(|(_, n)| *n).max() else {
        return (None, false);
    };
    let mut top = scores.iter().filter(|(_, n)| *n == best).map(|(d, _)| *d);
    let first = top.next();
    (first, top.next().is_some())
}

fn detect_action(lower: &str) -> Option<String> {
    ACTION_RE.captures_iter(lower).find_map(|caps| {
        let verb = caps.get(1)?.as_str();
        let object = caps.get(2)?.as_str();
        if ACTION_STOPWORDS.contains(&object) {
            return None;
        }
        Some(format!("{verb} {object}"))
    })
}

fn detect_entities(lower: &str) -> Vec<String> {
    let mut hits: Vec<(usize, &str)> = ENTITY_CATALOG
        .iter()
        .filter_map(|(mention, entity)| find_word(lower, mention).map(|pos| (pos, *entity)))
        .collect();
    hits.sort_by_key(|(pos, _)| *pos);
    let mut out: Vec<String> = Vec::new();
    for (_, entity) in hits {
        if !out.iter().any(|e| e == entity) {
            out.push(entity.to_string());
        }
    }
    out
}

fn detect_scale(lower: &str) -> Option<ScaleHint> {
    if let Some(caps) = SCALE_RE.captures(lower) {
        let number: f64 = caps.get(1)?.as_str().replace(',', "").parse().ok()?;
        let multiplier = match caps.get(2).map(|m| m.as_str()) {
            Some("k" | "thousand") => 1_000.0,
            Some("m" | "million" | "mil") => 1_000_000.0,
            _ => 1.0,
        };
        return Some(ScaleHint::Users((number * multiplier).round() as u64));
    }
    let caps = SCALE_VAGUE_RE.captures(lower)?;
    let users = match caps.get(1)?.as_str() {
        "hundreds" => 100,
        "thousands" => 1_000,
        _ => 1_000_000,
    };
    Some(ScaleHint::Users(users))
}

fn detect_name(text: &str) -> Option<String> {
    let caps = NAME_RE.captures(text)?;
    let name = caps.get(1)?.as_str().trim_end_matches(['.', ',']).trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Returns the flag value and whether both polarities were stated.
fn detect_flag(lower: &str, positive: &[&str], negative: &[&str]) -> (Option<bool>, bool) {
    let mut rest = lower.to_string();
    let mut negated = false;
    for phrase in negative {
        if contains_word(&rest, phrase) {
            negated = true;
            rest = rest.replace(phrase, " ");
        }
    }
    let affirmed = positive.iter().any(|p| contains_word(&rest, p));
    match (affirmed, negated) {
        (true, true) => (Some(true), true),
        (true, false) => (Some(true), false),
        (false, true) => (Some(false), false),
        (false, false) => (None, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::{ClarificationGate, GateDecision};

    fn profile(text: &str) -> InputProfile {
        KeywordExtractor.profile(text)
    }

    #[test]
    fn blog_with_readers_and_gated_stack() {
        let p = profile("A personal blog with 50 readers. Use Kubernetes, Kafka and microservices.");
        assert_eq!(p.domain, Some(Domain::Content));
        assert_eq!(p.scale, Some(ScaleHint::Users(50)));
        assert!(p.tech_preferences.contains("kubernetes"));
        assert!(p.tech_preferences.contains("kafka"));
        assert!(p.tech_preferences.contains("microservices"));
        assert_eq!(p.entities, vec!["Post".to_string()]);
    }

    #[test]
    fn vague_prompt_knows_nothing() {
        let p = profile("I want to build an app");
        assert!(matches!(
            ClarificationGate::evaluate(&p),
            GateDecision::NeedsClarification { .. }
        ));
    }

    #[test]
    fn action_skips_stopword_objects() {
        let p = profile("A place where people share and share photos with friends");
        assert_eq!(p.primary_action.as_deref(), Some("share photos"));
    }

    #[test]
    fn scale_suffixes() {
        assert_eq!(profile("for 10k users").scale, Some(ScaleHint::Users(10_000)));
        assert_eq!(
            profile("about 2.5 million monthly active users").scale,
            Some(ScaleHint::Users(2_500_000))
        );
        assert_eq!(profile("1,200 customers").scale, Some(ScaleHint::Users(1_200)));
        assert_eq!(profile("millions of gamers").scale, Some(ScaleHint::Users(1_000_000)));
        assert_eq!(profile("a todo list").scale, None);
    }

    #[test]
    fn real_time_polarity() {
        assert_eq!(profile("with live chat").real_time, Some(true));
        assert_eq!(profile("no real-time needed").real_time, Some(false));
        let both = profile("needs live chat but no real-time");
        assert!(both.contradictions.contains(&ProfileField::RealTime));
        assert!(!both.is_known(ProfileField::RealTime));
    }

    #[test]
    fn sensitive_polarity() {
        assert_eq!(profile("stores credit card numbers").sensitive_data, Some(true));
        assert_eq!(profile("no payments, nothing sensitive").sensitive_data, Some(false));
    }

    #[test]
    fn tied_domains_are_contradictory() {
        let p = profile("a blog for a clinic");
        assert!(p.contradictions.contains(&ProfileField::Domain));
    }

    #[test]
    fn entities_follow_mention_order() {
        let p = profile("customers order products and leave a review on each order");
        assert_eq!(p.entities, vec!["Order", "Product", "Review"]);
    }

    #[test]
    fn project_name_after_called() {
        assert_eq!(profile("A marketplace called Tradewind.").project_name.as_deref(), Some("Tradewind"));
        assert_eq!(profile("a marketplace").project_name, None);
    }

    #[tokio::test]
    async fn empty_text_is_rejected() {
        let err = KeywordExtractor.extract("   ").await.unwrap_err();
        assert!(matches!(err, ExtractError::Empty));
    }
}
