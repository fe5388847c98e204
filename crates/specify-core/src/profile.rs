use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::tier::ThroughputTier;

// --- Domains ---

pub const FINTECH_KEYWORDS: &[&str] = &[
    "fintech", "bank", "banking", "payment", "wallet", "trading", "loan", "invoice", "finance",
    "financial", "budget",
];
pub const HEALTHCARE_KEYWORDS: &[&str] = &[
    "healthcare", "health", "medical", "patient", "clinic", "hospital", "telemedicine", "ehr",
    "doctor",
];
pub const ECOMMERCE_KEYWORDS: &[&str] = &[
    "ecommerce", "e-commerce", "shop", "online store", "storefront", "marketplace", "cart",
    "checkout", "retail",
];
pub const SOCIAL_KEYWORDS: &[&str] = &[
    "social", "community", "friends", "followers", "feed", "dating", "network",
];
pub const CONTENT_KEYWORDS: &[&str] = &[
    "content", "blog", "cms", "article", "news", "publishing", "podcast", "magazine",
];
pub const IOT_KEYWORDS: &[&str] = &["iot", "sensor", "telemetry", "smart home", "firmware"];
pub const SAAS_KEYWORDS: &[&str] = &[
    "saas", "b2b", "crm", "dashboard", "project management", "workspace", "tenant",
];
pub const EDUCATION_KEYWORDS: &[&str] = &[
    "education", "course", "learning", "school", "student", "lms", "tutor",
];
pub const LOGISTICS_KEYWORDS: &[&str] = &[
    "logistics", "delivery", "shipment", "fleet", "warehouse", "courier",
];
pub const GAMING_KEYWORDS: &[&str] = &["game", "gaming", "leaderboard", "multiplayer", "esports"];

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, schemars::JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Fintech,
    Healthcare,
    Ecommerce,
    Social,
    Content,
    Iot,
    Saas,
    Education,
    Logistics,
    Gaming,
}

impl Domain {
    pub const ALL: [Domain; 10] = [
        Self::Fintech,
        Self::Healthcare,
        Self::Ecommerce,
        Self::Social,
        Self::Content,
        Self::Iot,
        Self::Saas,
        Self::Education,
        Self::Logistics,
        Self::Gaming,
    ];

    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::Fintech => FINTECH_KEYWORDS,
            Self::Healthcare => HEALTHCARE_KEYWORDS,
            Self::Ecommerce => ECOMMERCE_KEYWORDS,
            Self::Social => SOCIAL_KEYWORDS,
            Self::Content => CONTENT_KEYWORDS,
            Self::Iot => IOT_KEYWORDS,
            Self::Saas => SAAS_KEYWORDS,
            Self::Education => EDUCATION_KEYWORDS,
            Self::Logistics => LOGISTICS_KEYWORDS,
            Self::Gaming => GAMING_KEYWORDS,
        }
    }

    /// Lowercase tag, also used as a match token in the defaults table.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Fintech => "fintech",
            Self::Healthcare => "healthcare",
            Self::Ecommerce => "ecommerce",
            Self::Social => "social",
            Self::Content => "content",
            Self::Iot => "iot",
            Self::Saas => "saas",
            Self::Education => "education",
            Self::Logistics => "logistics",
            Self::Gaming => "gaming",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Fintech => "fintech",
            Self::Healthcare => "healthcare",
            Self::Ecommerce => "e-commerce",
            Self::Social => "social",
            Self::Content => "content publishing",
            Self::Iot => "IoT",
            Self::Saas => "B2B SaaS",
            Self::Education => "education",
            Self::Logistics => "logistics",
            Self::Gaming => "gaming",
        }
    }

    /// Entities assumed when the description names none.
    pub fn default_entities(self) -> &'static [&'static str] {
        match self {
            Self::Fintech => &["Account", "Transaction"],
            Self::Healthcare => &["Patient", "Appointment"],
            Self::Ecommerce => &["Product", "Order", "Payment"],
            Self::Social => &["Post", "Comment"],
            Self::Content => &["Post", "Comment"],
            Self::Iot => &["Device", "Reading"],
            Self::Saas => &["Project", "Task"],
            Self::Education => &["Course", "Lesson"],
            Self::Logistics => &["Shipment", "Vehicle"],
            Self::Gaming => &["Match", "Score"],
        }
    }

    /// Whether records in this domain are regulated by default.
    pub fn regulated(self) -> bool {
        matches!(self, Self::Fintech | Self::Healthcare)
    }

    /// Resolve a free-form tag ("FinTech", "e-commerce", "health") to a domain.
    pub fn parse(raw: &str) -> Option<Self> {
        let needle = raw.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|d| d.tag() == needle)
            .or_else(|| {
                Self::ALL
                    .into_iter()
                    .find(|d| d.keywords().iter().any(|k| *k == needle))
            })
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// --- Input profile ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ScaleHint {
    Users(u64),
    Tier(ThroughputTier),
}

impl ScaleHint {
    pub fn tier(self) -> ThroughputTier {
        match self {
            Self::Users(n) => ThroughputTier::from_users(n),
            Self::Tier(t) => t,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ProfileField {
    Domain,
    PrimaryAction,
    Scale,
    RealTime,
    SensitiveData,
}

/// Structured tags extracted from a free-text application description.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InputProfile {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<Domain>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_action: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tech_preferences: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<ScaleHint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_time: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensitive_data: Option<bool>,
    /// Fields for which the description gave conflicting signals.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub contradictions: BTreeSet<ProfileField>,
}

impl InputProfile {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn with_domain(mut self, domain: Domain) -> Self {
        self.domain = Some(domain);
        self
    }

    pub fn with_primary_action(mut self, action: impl Into<String>) -> Self {
        self.primary_action = Some(action.into());
        self
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        let entity = entity.into();
        if !self.entities.contains(&entity) {
            self.entities.push(entity);
        }
        self
    }

    pub fn with_preference(mut self, preference: impl Into<String>) -> Self {
        self.tech_preferences.insert(preference.into());
        self
    }

    pub fn with_scale(mut self, scale: ScaleHint) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn with_real_time(mut self, real_time: bool) -> Self {
        self.real_time = Some(real_time);
        self
    }

    pub fn with_sensitive_data(mut self, sensitive: bool) -> Self {
        self.sensitive_data = Some(sensitive);
        self
    }

    pub fn with_contradiction(mut self, field: ProfileField) -> Self {
        self.contradictions.insert(field);
        self
    }

    /// A field is known when it carries a value that is not contradicted.
    pub fn is_known(&self, field: ProfileField) -> bool {
        if self.contradictions.contains(&field) {
            return false;
        }
        match field {
            ProfileField::Domain => self.domain.is_some(),
            ProfileField::PrimaryAction => self
                .primary_action
                .as_deref()
                .is_some_and(|a| !a.trim().is_empty()),
            ProfileField::Scale => self.scale.is_some(),
            ProfileField::RealTime => self.real_time.is_some(),
            ProfileField::SensitiveData => self.sensitive_data.is_some(),
        }
    }

    /// Value of a boolean flag, treating contradicted signals as unset.
    pub fn flag(&self, field: ProfileField) -> Option<bool> {
        if self.contradictions.contains(&field) {
            return None;
        }
        match field {
            ProfileField::RealTime => self.real_time,
            ProfileField::SensitiveData => self.sensitive_data,
            _ => None,
        }
    }
}
