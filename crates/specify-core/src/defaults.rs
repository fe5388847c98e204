//! Defaults matrix and the resolver that turns an [`InputProfile`] into a
//! fully populated [`ConfigProfile`], logging every inferred value.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::assemble::blueprint::table_name;
use crate::profile::{
    Domain, InputProfile, ProfileField, CONTENT_KEYWORDS, ECOMMERCE_KEYWORDS, FINTECH_KEYWORDS,
    GAMING_KEYWORDS, HEALTHCARE_KEYWORDS, IOT_KEYWORDS, SAAS_KEYWORDS, SOCIAL_KEYWORDS,
};
use crate::text::{contains_word, fold_ascii, singularize, to_pascal_case};
use crate::tier::{ArchitectureStyle, ThroughputTier};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    ProjectName,
    Domain,
    PrimaryAction,
    Entities,
    Scale,
    Architecture,
    Database,
    ApiProtocol,
    Auth,
    Hosting,
    Language,
    Messaging,
    RealTime,
    SensitiveData,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Self::ProjectName => "Project name",
            Self::Domain => "Domain",
            Self::PrimaryAction => "Primary action",
            Self::Entities => "Entities",
            Self::Scale => "Scale",
            Self::Architecture => "Architecture",
            Self::Database => "Database",
            Self::ApiProtocol => "API protocol",
            Self::Auth => "Authentication",
            Self::Hosting => "Hosting",
            Self::Language => "Language",
            Self::Messaging => "Messaging",
            Self::RealTime => "Real-time",
            Self::SensitiveData => "Sensitive data",
        }
    }
}

// --- Defaults table ---

const REALTIME_TOKENS: &[&str] = &["real-time", "realtime", "real time", "chat", "live updates"];
const REACH_TOKENS: &[&str] = &["enterprise", "global", "nationwide"];

/// One row of the defaults matrix: when any keyword matches, `value` is used.
#[derive(Debug, Clone, Copy)]
pub struct DefaultRule {
    pub category: Category,
    pub keywords: &'static [&'static str],
    pub value: &'static str,
    pub reason: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct GlobalDefault {
    pub category: Category,
    pub value: &'static str,
    pub reason: &'static str,
}

#[derive(Debug)]
pub struct DefaultsTable {
    pub rules: &'static [DefaultRule],
    pub globals: &'static [GlobalDefault],
}

/// Process-wide defaults matrix.
pub static BUILTIN: DefaultsTable = DefaultsTable {
    rules: BUILTIN_RULES,
    globals: BUILTIN_GLOBALS,
};

impl DefaultsTable {
    /// First rule of `category` whose keywords match the haystack.
    pub fn lookup(&self, category: Category, haystack: &str) -> Option<(&DefaultRule, &'static str)> {
        self.rules
            .iter()
            .filter(|r| r.category == category)
            .find_map(|r| {
                r.keywords
                    .iter()
                    .find(|k| contains_word(haystack, k))
                    .map(|k| (r, *k))
            })
    }

    pub fn global(&self, category: Category) -> Option<&GlobalDefault> {
        self.globals.iter().find(|g| g.category == category)
    }
}

const BUILTIN_RULES: &[DefaultRule] = &[
    DefaultRule {
        category: Category::Scale,
        keywords: REACH_TOKENS,
        value: "3",
        reason: "Enterprise or global reach implies at least 100K users",
    },
    DefaultRule {
        category: Category::Database,
        keywords: FINTECH_KEYWORDS,
        value: "PostgreSQL",
        reason: "ACID transactions and strict constraints for monetary records",
    },
    DefaultRule {
        category: Category::Database,
        keywords: HEALTHCARE_KEYWORDS,
        value: "PostgreSQL",
        reason: "Relational integrity and row-level security for clinical records",
    },
    DefaultRule {
        category: Category::Database,
        keywords: ECOMMERCE_KEYWORDS,
        value: "PostgreSQL",
        reason: "Transactional consistency across orders, payments and inventory",
    },
    DefaultRule {
        category: Category::Database,
        keywords: IOT_KEYWORDS,
        value: "TimescaleDB (PostgreSQL)",
        reason: "Time-series partitioning and retention policies for telemetry",
    },
    DefaultRule {
        category: Category::Database,
        keywords: SOCIAL_KEYWORDS,
        value: "MongoDB",
        reason: "Flexible documents for feeds and user-generated content",
    },
    DefaultRule {
        category: Category::Database,
        keywords: CONTENT_KEYWORDS,
        value: "MongoDB",
        reason: "Document model fits articles with varied structure",
    },
    DefaultRule {
        category: Category::ApiProtocol,
        keywords: IOT_KEYWORDS,
        value: "MQTT + REST",
        reason: "MQTT for constrained devices; REST for management endpoints",
    },
    DefaultRule {
        category: Category::ApiProtocol,
        keywords: REALTIME_TOKENS,
        value: "REST + WebSocket",
        reason: "WebSocket push channel for live updates next to resource endpoints",
    },
    DefaultRule {
        category: Category::Auth,
        keywords: FINTECH_KEYWORDS,
        value: "JWT + OAuth2 with MFA",
        reason: "Money movement requires step-up authentication",
    },
    DefaultRule {
        category: Category::Auth,
        keywords: HEALTHCARE_KEYWORDS,
        value: "JWT + OAuth2 with MFA",
        reason: "Access to health records requires strong authentication",
    },
    DefaultRule {
        category: Category::Auth,
        keywords: SAAS_KEYWORDS,
        value: "JWT + OAuth2 with SAML SSO",
        reason: "Business customers expect single sign-on",
    },
    DefaultRule {
        category: Category::Hosting,
        keywords: HEALTHCARE_KEYWORDS,
        value: "AWS (HIPAA-eligible services)",
        reason: "Business Associate Agreement covers the managed services used",
    },
    DefaultRule {
        category: Category::Hosting,
        keywords: FINTECH_KEYWORDS,
        value: "AWS (PCI-DSS compliant services)",
        reason: "Cardholder data stays within compliant managed services",
    },
    DefaultRule {
        category: Category::Language,
        keywords: FINTECH_KEYWORDS,
        value: "Java (Spring Boot)",
        reason: "Mature transactional ecosystem and precise decimal arithmetic",
    },
    DefaultRule {
        category: Category::Language,
        keywords: IOT_KEYWORDS,
        value: "Go",
        reason: "Small footprint and cheap concurrency for many device connections",
    },
    DefaultRule {
        category: Category::Language,
        keywords: GAMING_KEYWORDS,
        value: "Go",
        reason: "Low-latency networking for session and leaderboard traffic",
    },
];

const BUILTIN_GLOBALS: &[GlobalDefault] = &[
    GlobalDefault {
        category: Category::Scale,
        value: "1",
        reason: "No scale stated; sized as an MVP",
    },
    GlobalDefault {
        category: Category::Database,
        value: "PostgreSQL",
        reason: "General-purpose relational store with strong consistency",
    },
    GlobalDefault {
        category: Category::ApiProtocol,
        value: "REST",
        reason: "Broad client support and simple caching semantics",
    },
    GlobalDefault {
        category: Category::Auth,
        value: "JWT + OAuth2",
        reason: "Stateless access tokens with standard third-party login",
    },
    GlobalDefault {
        category: Category::Hosting,
        value: "AWS",
        reason: "Widest managed-service coverage",
    },
    GlobalDefault {
        category: Category::Language,
        value: "TypeScript (Node.js)",
        reason: "Large hiring pool and shared types with web clients",
    },
];

// --- Technology catalog ---

/// A recognizable technology preference.
#[derive(Debug, Clone, Copy)]
pub struct TechEntry {
    pub keywords: &'static [&'static str],
    pub category: Category,
    pub value: &'static str,
    /// Scale-gated infrastructure is not adopted below this tier.
    pub minimum_tier: Option<ThroughputTier>,
    pub adopt_when: &'static str,
}

const fn tech(category: Category, keywords: &'static [&'static str], value: &'static str) -> TechEntry {
    TechEntry {
        keywords,
        category,
        value,
        minimum_tier: None,
        adopt_when: "",
    }
}

const fn gated(
    category: Category,
    keywords: &'static [&'static str],
    value: &'static str,
    minimum_tier: ThroughputTier,
    adopt_when: &'static str,
) -> TechEntry {
    TechEntry {
        keywords,
        category,
        value,
        minimum_tier: Some(minimum_tier),
        adopt_when,
    }
}

pub const TECH_CATALOG: &[TechEntry] = &[
    tech(Category::Database, &["postgres", "postgresql"], "PostgreSQL"),
    tech(Category::Database, &["mysql"], "MySQL"),
    tech(Category::Database, &["mongodb", "mongo"], "MongoDB"),
    tech(Category::Database, &["dynamodb"], "DynamoDB"),
    tech(Category::Database, &["sqlite"], "SQLite"),
    tech(Category::Database, &["timescaledb", "timescale"], "TimescaleDB (PostgreSQL)"),
    gated(
        Category::Database,
        &["cassandra"],
        "Apache Cassandra",
        ThroughputTier::Tier4,
        "Write volume exceeds what a partitioned relational primary can absorb",
    ),
    tech(Category::ApiProtocol, &["graphql"], "GraphQL"),
    tech(Category::ApiProtocol, &["grpc"], "gRPC"),
    tech(Category::ApiProtocol, &["websocket", "websockets"], "REST + WebSocket"),
    tech(Category::Auth, &["auth0"], "Auth0 (OIDC)"),
    tech(Category::Auth, &["cognito"], "Amazon Cognito"),
    tech(Category::Auth, &["firebase auth"], "Firebase Authentication"),
    tech(Category::Auth, &["saml", "sso"], "JWT + OAuth2 with SAML SSO"),
    tech(Category::Hosting, &["aws", "amazon web services"], "AWS"),
    tech(Category::Hosting, &["gcp", "google cloud"], "Google Cloud"),
    tech(Category::Hosting, &["azure"], "Azure"),
    tech(Category::Hosting, &["vercel"], "Vercel"),
    tech(Category::Hosting, &["heroku"], "Heroku"),
    gated(
        Category::Hosting,
        &["kubernetes", "k8s"],
        "Kubernetes (managed, e.g. EKS)",
        ThroughputTier::Tier3,
        "More than a handful of independently deployed services need scheduling",
    ),
    gated(
        Category::Hosting,
        &["istio", "service mesh"],
        "Kubernetes with a service mesh",
        ThroughputTier::Tier4,
        "Dozens of services need uniform mTLS, retries and traffic shaping",
    ),
    tech(Category::Language, &["typescript", "node", "nodejs", "node.js", "nestjs"], "TypeScript (Node.js)"),
    tech(Category::Language, &["django"], "Python (Django)"),
    tech(Category::Language, &["python", "fastapi", "flask"], "Python (FastAPI)"),
    tech(Category::Language, &["golang"], "Go"),
    tech(Category::Language, &["rust"], "Rust (Axum)"),
    tech(Category::Language, &["java", "spring"], "Java (Spring Boot)"),
    tech(Category::Language, &["kotlin"], "Kotlin (Ktor)"),
    tech(Category::Language, &["ruby", "rails"], "Ruby on Rails"),
    tech(Category::Language, &["php", "laravel"], "PHP (Laravel)"),
    tech(Category::Language, &["elixir", "phoenix"], "Elixir (Phoenix)"),
    tech(Category::Language, &["dotnet", ".net", "c#"], "C# (.NET)"),
    tech(Category::Messaging, &["rabbitmq"], "RabbitMQ"),
    tech(Category::Messaging, &["sqs"], "Amazon SQS"),
    gated(
        Category::Messaging,
        &["kafka"],
        "Apache Kafka",
        ThroughputTier::Tier3,
        "Event volume or fan-out outgrows a managed queue",
    ),
    gated(
        Category::Architecture,
        &["microservices", "microservice"],
        "Microservices",
        ThroughputTier::Tier3,
        "Team and traffic growth make independent deployment worth the operational cost",
    ),
    gated(
        Category::Architecture,
        &["event sourcing", "cqrs"],
        "Event sourcing / CQRS",
        ThroughputTier::Tier4,
        "Read and write workloads diverge enough to justify separate models",
    ),
];

/// Keywords the extractor scans for; every catalog keyword.
pub fn catalog_keywords() -> impl Iterator<Item = &'static str> {
    TECH_CATALOG.iter().flat_map(|e| e.keywords.iter().copied())
}

/// Catalog entry for a free-form preference ("Kafka", "PostgreSQL 16").
pub fn catalog_entry(preference: &str) -> Option<&'static TechEntry> {
    let needle = preference.trim().to_lowercase();
    TECH_CATALOG.iter().find(|e| {
        e.keywords
            .iter()
            .any(|k| needle == *k || contains_word(&needle, k))
    })
}

// --- Resolved configuration ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Origin {
    Explicit,
    Inferred,
    Default,
}

impl Origin {
    pub fn label(self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::Inferred => "inferred",
            Self::Default => "default",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    pub value: String,
    pub origin: Origin,
    pub justification: String,
}

impl Choice {
    pub fn new(value: impl Into<String>, origin: Origin, justification: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            origin,
            justification: justification.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EntityDef {
    pub name: String,
    /// Written by the system only (audit trails); users never mutate it.
    #[serde(default)]
    pub read_only: bool,
}

impl EntityDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            read_only: false,
        }
    }

    pub fn is_user(&self) -> bool {
        self.name == USER_ENTITY
    }
}

pub const USER_ENTITY: &str = "User";
pub const AUDIT_ENTITY: &str = "AuditEvent";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeferredTech {
    pub technology: String,
    pub category: Category,
    pub minimum_tier: ThroughputTier,
    pub adopt_when: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TechStack {
    pub database: Choice,
    pub api_protocol: Choice,
    pub auth: Choice,
    pub hosting: Choice,
    pub language: Choice,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messaging: Option<Choice>,
}

/// Fully populated configuration; every field resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigProfile {
    pub project_name: String,
    pub description: String,
    pub domain: Option<Domain>,
    pub primary_action: String,
    pub entities: Vec<EntityDef>,
    pub tier: ThroughputTier,
    pub scale: Choice,
    pub style: ArchitectureStyle,
    pub architecture: Choice,
    pub stack: TechStack,
    pub real_time: bool,
    pub sensitive_data: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compliance: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deferred: Vec<DeferredTech>,
}

impl ConfigProfile {
    /// Every categorized choice, in rendering order.
    pub fn choices(&self) -> Vec<(Category, &Choice)> {
        let mut out = vec![
            (Category::Scale, &self.scale),
            (Category::Architecture, &self.architecture),
            (Category::Language, &self.stack.language),
            (Category::Database, &self.stack.database),
            (Category::ApiProtocol, &self.stack.api_protocol),
            (Category::Auth, &self.stack.auth),
            (Category::Hosting, &self.stack.hosting),
        ];
        if let Some(m) = &self.stack.messaging {
            out.push((Category::Messaging, m));
        }
        out
    }

    pub fn domain_label(&self) -> &'static str {
        self.domain.map_or("general-purpose", Domain::label)
    }

    pub fn has_entity(&self, name: &str) -> bool {
        self.entities.iter().any(|e| e.name == name)
    }
}

// --- Assumptions ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Assumption {
    pub category: Category,
    pub value: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct AssumptionsLog(Vec<Assumption>);

impl AssumptionsLog {
    pub fn record(&mut self, category: Category, value: impl Into<String>, reason: impl Into<String>) {
        let entry = Assumption {
            category,
            value: value.into(),
            reason: reason.into(),
        };
        debug!(category = category.label(), value = %entry.value, "assumption recorded");
        self.0.push(entry);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Assumption> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn find(&self, category: Category) -> Option<&Assumption> {
        self.0.iter().find(|a| a.category == category)
    }
}

impl<'a> IntoIterator for &'a AssumptionsLog {
    type Item = &'a Assumption;
    type IntoIter = std::slice::Iter<'a, Assumption>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// --- Resolver ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub config: ConfigProfile,
    pub assumptions: AssumptionsLog,
}

#[derive(Debug, Clone, Copy)]
pub struct DefaultsResolver {
    table: &'static DefaultsTable,
}

impl Default for DefaultsResolver {
    fn default() -> Self {
        Self::new(&BUILTIN)
    }
}

impl DefaultsResolver {
    pub fn new(table: &'static DefaultsTable) -> Self {
        Self { table }
    }

    /// Resolve every unset field. Pure: the same profile yields the same resolution.
    pub fn resolve(&self, profile: &InputProfile) -> Resolution {
        let mut log = AssumptionsLog::default();
        let haystack = haystack(profile);
        let domain = profile
            .is_known(ProfileField::Domain)
            .then_some(profile.domain)
            .flatten();

        if domain.is_none() {
            log.record(
                Category::Domain,
                "general-purpose",
                "No recognizable domain keywords",
            );
        }

        // Scale first: gated preferences depend on the tier.
        let (tier, scale) = self.resolve_scale(profile, &haystack, &mut log);

        let mut explicit: Vec<(Category, &'static TechEntry)> = Vec::new();
        let mut deferred: Vec<DeferredTech> = Vec::new();
        for pref in &profile.tech_preferences {
            let Some(entry) = catalog_entry(pref) else {
                debug!(preference = %pref, "unrecognized technology preference ignored");
                continue;
            };
            // An adopted architecture request means the event-driven style, so it waits for that tier.
            let minimum = match entry.category {
                Category::Architecture => entry
                    .minimum_tier
                    .max(Some(ArchitectureStyle::EventDrivenMicroservices.minimum_tier())),
                _ => entry.minimum_tier,
            };
            match minimum {
                Some(min) if tier < min => {
                    if !deferred.iter().any(|d| d.technology == entry.value) {
                        deferred.push(DeferredTech {
                            technology: entry.value.to_string(),
                            category: entry.category,
                            minimum_tier: min,
                            adopt_when: entry.adopt_when.to_string(),
                        });
                    }
                }
                _ => {
                    if !explicit.iter().any(|(c, _)| *c == entry.category) {
                        explicit.push((entry.category, entry));
                    }
                }
            }
        }
        deferred.sort_by(|a, b| {
            (a.minimum_tier, &a.technology).cmp(&(b.minimum_tier, &b.technology))
        });
        let explicit_for = |category: Category| {
            explicit
                .iter()
                .find(|(c, _)| *c == category)
                .map(|(_, e)| *e)
        };
        let deferred_note = |category: Category| {
            deferred
                .iter()
                .find(|d| d.category == category)
                .map(|d| {
                    format!(
                        "; requested {} deferred until Tier {}",
                        d.technology,
                        d.minimum_tier.number()
                    )
                })
                .unwrap_or_default()
        };

        // Architecture
        let (style, architecture) = match explicit_for(Category::Architecture) {
            // Only reachable at Tier 4; smaller tiers defer the request.
            Some(entry) => {
                let style = ArchitectureStyle::EventDrivenMicroservices;
                (
                    style,
                    Choice::new(
                        style.label(),
                        Origin::Explicit,
                        format!("Requested {} in the description; {}", entry.value, style.rationale()),
                    ),
                )
            }
            None => {
                let style = tier.architecture();
                let reason = format!(
                    "{} recommends {}{}",
                    tier,
                    style.label().to_lowercase(),
                    deferred_note(Category::Architecture)
                );
                log.record(Category::Architecture, style.label(), reason);
                let origin = if profile.is_known(ProfileField::Scale) {
                    Origin::Inferred
                } else {
                    Origin::Default
                };
                (style, Choice::new(style.label(), origin, style.rationale()))
            }
        };

        let mut resolve_choice = |category: Category| -> Choice {
            if let Some(entry) = explicit_for(category) {
                return Choice::new(entry.value, Origin::Explicit, "Requested in the description");
            }
            let note = deferred_note(category);
            if let Some((rule, keyword)) = self.table.lookup(category, &haystack) {
                log.record(
                    category,
                    rule.value,
                    format!("Matched \"{keyword}\": {}{note}", rule.reason),
                );
                return Choice::new(rule.value, Origin::Inferred, rule.reason);
            }
            let global = self
                .table
                .global(category)
                .copied()
                .unwrap_or(GlobalDefault {
                    category,
                    value: "To be decided",
                    reason: "No default configured",
                });
            log.record(category, global.value, format!("Global default{note}"));
            Choice::new(global.value, Origin::Default, global.reason)
        };

        let language = resolve_choice(Category::Language);
        let database = resolve_choice(Category::Database);
        let api_protocol = resolve_choice(Category::ApiProtocol);
        let auth = resolve_choice(Category::Auth);
        let hosting = resolve_choice(Category::Hosting);

        let messaging = match explicit_for(Category::Messaging) {
            Some(entry) => Some(Choice::new(entry.value, Origin::Explicit, "Requested in the description")),
            None => {
                let value = match tier {
                    ThroughputTier::Tier4 => Some("Apache Kafka"),
                    ThroughputTier::Tier3 => Some("Amazon SQS"),
                    _ => None,
                };
                value.map(|v| {
                    log.record(
                        Category::Messaging,
                        v,
                        format!("{tier} offloads slow work to asynchronous consumers"),
                    );
                    Choice::new(
                        v,
                        Origin::Inferred,
                        "Decouples request handling from background processing",
                    )
                })
            }
        };

        // Flags
        let real_time = match profile.flag(ProfileField::RealTime) {
            Some(v) => v,
            None => {
                let inferred = api_protocol.value.contains("WebSocket");
                log.record(
                    Category::RealTime,
                    yes_no(inferred),
                    if profile.contradictions.contains(&ProfileField::RealTime) {
                        "Conflicting real-time signals; following the API protocol"
                    } else {
                        "No real-time need stated; following the API protocol"
                    },
                );
                inferred
            }
        };
        let sensitive_data = match profile.flag(ProfileField::SensitiveData) {
            Some(v) => v,
            None => {
                let inferred = domain.is_some_and(Domain::regulated);
                log.record(
                    Category::SensitiveData,
                    yes_no(inferred),
                    format!("Not stated; {} domain default", domain.map_or("general-purpose", Domain::label)),
                );
                inferred
            }
        };

        let entities = resolve_entities(profile, domain, sensitive_data, &mut log);

        let primary_action = match profile.primary_action.as_deref().map(str::trim) {
            Some(a) if profile.is_known(ProfileField::PrimaryAction) => a.to_string(),
            _ => {
                let action = entities
                    .iter()
                    .find(|e| !e.is_user() && !e.read_only)
                    .map(|e| format!("manage {}", crate::text::pluralize(&e.name.to_lowercase())))
                    .unwrap_or_else(|| "manage their account".to_string());
                log.record(Category::PrimaryAction, action.clone(), "Derived from the primary entity");
                action
            }
        };

        let project_name = match profile.project_name.as_deref().map(str::trim) {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => {
                let name = match domain {
                    Some(d) => format!("{} Platform", title_case(d.label())),
                    None => "Application".to_string(),
                };
                log.record(Category::ProjectName, name.clone(), "No product name given");
                name
            }
        };

        let compliance = compliance_for(domain, sensitive_data, &haystack);

        let config = ConfigProfile {
            project_name,
            description: profile.description.trim().to_string(),
            domain,
            primary_action,
            entities,
            tier,
            scale,
            style,
            architecture,
            stack: TechStack {
                database,
                api_protocol,
                auth,
                hosting,
                language,
                messaging,
            },
            real_time,
            sensitive_data,
            compliance,
            deferred,
        };

        Resolution {
            config,
            assumptions: log,
        }
    }

    fn resolve_scale(
        &self,
        profile: &InputProfile,
        haystack: &str,
        log: &mut AssumptionsLog,
    ) -> (ThroughputTier, Choice) {
        if let (true, Some(hint)) = (profile.is_known(ProfileField::Scale), profile.scale) {
            let tier = hint.tier();
            let justification = match hint {
                crate::profile::ScaleHint::Users(n) => format!("Stated scale of {n} users"),
                crate::profile::ScaleHint::Tier(_) => "Stated tier".to_string(),
            };
            return (tier, Choice::new(tier.to_string(), Origin::Explicit, justification));
        }
        let from_rule = self.table.lookup(Category::Scale, haystack).and_then(|(rule, kw)| {
            parse_tier(rule.value).map(|t| (t, rule.reason, kw))
        });
        if let Some((tier, reason, keyword)) = from_rule {
            log.record(Category::Scale, tier.to_string(), format!("Matched \"{keyword}\": {reason}"));
            return (tier, Choice::new(tier.to_string(), Origin::Inferred, reason));
        }
        let (tier, reason) = self
            .table
            .global(Category::Scale)
            .and_then(|g| parse_tier(g.value).map(|t| (t, g.reason)))
            .unwrap_or((ThroughputTier::Tier1, "No scale stated"));
        log.record(Category::Scale, tier.to_string(), reason);
        (tier, Choice::new(tier.to_string(), Origin::Default, reason))
    }
}

fn parse_tier(value: &str) -> Option<ThroughputTier> {
    value.parse::<u8>().ok().and_then(ThroughputTier::from_number)
}

fn yes_no(v: bool) -> &'static str {
    if v {
        "yes"
    } else {
        "no"
    }
}

fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|w| {
            let mut c = w.chars();
            match c.next() {
                Some(f) if f.is_lowercase() => f.to_uppercase().chain(c).collect(),
                Some(f) => std::iter::once(f).chain(c).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercased description plus domain tag and synthetic flag tokens.
/// A stated "no real-time" strips the real-time tokens.
fn haystack(profile: &InputProfile) -> String {
    let mut hay = profile.description.to_lowercase();
    if profile.flag(ProfileField::RealTime) == Some(false) {
        for token in REALTIME_TOKENS {
            hay = hay.replace(token, " ");
        }
    }
    if let Some(d) = profile.domain.filter(|_| profile.is_known(ProfileField::Domain)) {
        hay.push(' ');
        hay.push_str(d.tag());
    }
    if profile.flag(ProfileField::RealTime) == Some(true) {
        hay.push_str(" real-time");
    }
    if profile.flag(ProfileField::SensitiveData) == Some(true) {
        hay.push_str(" sensitive-data");
    }
    hay
}

/// PascalCase singular for a raw entity mention, or `None` when no ASCII identifier survives.
fn entity_name(raw: &str) -> Option<String> {
    let name = to_pascal_case(&fold_ascii(raw));
    let valid = name.starts_with(|c: char| c.is_ascii_alphabetic())
        && name.chars().all(|c| c.is_ascii_alphanumeric());
    if !valid {
        return None;
    }
    let singular = singularize(&name);
    if !singular.is_empty() && table_name(&singular) == table_name(&name) {
        Some(singular)
    } else {
        Some(name)
    }
}

fn resolve_entities(
    profile: &InputProfile,
    domain: Option<Domain>,
    sensitive: bool,
    log: &mut AssumptionsLog,
) -> Vec<EntityDef> {
    let mut names: Vec<String> = Vec::new();
    let mut tables: Vec<String> = vec![table_name(USER_ENTITY), table_name(AUDIT_ENTITY)];
    for raw in &profile.entities {
        let Some(name) = entity_name(raw) else {
            if !raw.trim().is_empty() {
                log.record(
                    Category::Entities,
                    format!("{} (dropped)", raw.trim()),
                    "Name cannot be spelled as a snake_case table",
                );
            }
            continue;
        };
        // "Order" and "Orders" share a table; so do "Users" and the built-in User.
        let table = table_name(&name);
        if tables.contains(&table) {
            debug!(entity = %name, %table, "entity folded into an existing table");
            continue;
        }
        tables.push(table);
        names.push(name);
    }
    if names.iter().all(|n| n == USER_ENTITY) {
        if let Some(d) = domain {
            let defaults: Vec<String> = d.default_entities().iter().map(|s| s.to_string()).collect();
            log.record(
                Category::Entities,
                defaults.join(", "),
                format!("No entities named; typical {} entities", d.label()),
            );
            names.extend(defaults);
        }
    }

    let mut entities = vec![EntityDef::new(USER_ENTITY)];
    entities.extend(
        names
            .into_iter()
            .filter(|n| n != USER_ENTITY && n != AUDIT_ENTITY)
            .map(EntityDef::new),
    );
    if sensitive {
        log.record(
            Category::Entities,
            AUDIT_ENTITY,
            "Sensitive data requires an immutable access trail",
        );
        entities.push(EntityDef {
            name: AUDIT_ENTITY.to_string(),
            read_only: true,
        });
    }
    entities
}

fn compliance_for(domain: Option<Domain>, sensitive: bool, haystack: &str) -> Vec<String> {
    let mut out = Vec::new();
    let payments = ["payment", "credit card", "card", "checkout"]
        .iter()
        .any(|k| contains_word(haystack, k));
    match domain {
        Some(Domain::Healthcare) => out.push("HIPAA".to_string()),
        Some(Domain::Fintech) => {
            out.push("PCI-DSS".to_string());
            out.push("SOC 2".to_string());
        }
        Some(Domain::Ecommerce) if payments => out.push("PCI-DSS".to_string()),
        _ => {}
    }
    if sensitive {
        out.push("GDPR".to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ScaleHint;

    fn resolve(profile: &InputProfile) -> Resolution {
        DefaultsResolver::default().resolve(profile)
    }

    #[test]
    fn fintech_defaults_to_postgres() {
        let r = resolve(&InputProfile::new("A fintech app for budgeting").with_domain(Domain::Fintech));
        assert_eq!(r.config.stack.database.value, "PostgreSQL");
        assert_eq!(r.config.stack.database.origin, Origin::Inferred);
    }

    #[test]
    fn social_and_content_default_to_mongodb() {
        let social = resolve(&InputProfile::new("A social network for climbers").with_domain(Domain::Social));
        assert_eq!(social.config.stack.database.value, "MongoDB");
        let content = resolve(&InputProfile::new("A blog").with_domain(Domain::Content));
        assert_eq!(content.config.stack.database.value, "MongoDB");
    }

    #[test]
    fn unmatched_profile_falls_back_to_globals() {
        let r = resolve(&InputProfile::new("something"));
        let c = &r.config;
        assert_eq!(c.tier, ThroughputTier::Tier1);
        assert_eq!(c.style, ArchitectureStyle::ModularMonolith);
        assert_eq!(c.stack.database.value, "PostgreSQL");
        assert_eq!(c.stack.api_protocol.value, "REST");
        assert_eq!(c.stack.auth.value, "JWT + OAuth2");
        assert_eq!(c.stack.hosting.value, "AWS");
        assert_eq!(c.stack.database.origin, Origin::Default);
    }

    #[test]
    fn explicit_preferences_win_and_are_not_logged() {
        let r = resolve(
            &InputProfile::new("fintech on mysql")
                .with_domain(Domain::Fintech)
                .with_preference("mysql"),
        );
        assert_eq!(r.config.stack.database.value, "MySQL");
        assert_eq!(r.config.stack.database.origin, Origin::Explicit);
        assert!(r.assumptions.find(Category::Database).is_none());
    }

    #[test]
    fn gated_preferences_are_deferred_below_their_tier() {
        let r = resolve(
            &InputProfile::new("blog")
                .with_scale(ScaleHint::Users(50))
                .with_preference("kafka")
                .with_preference("kubernetes")
                .with_preference("microservices"),
        );
        let c = &r.config;
        assert_eq!(c.tier, ThroughputTier::Tier1);
        assert_eq!(c.style, ArchitectureStyle::ModularMonolith);
        assert!(c.stack.messaging.is_none());
        assert_eq!(c.stack.hosting.value, "AWS");
        let deferred: Vec<&str> = c.deferred.iter().map(|d| d.technology.as_str()).collect();
        assert!(deferred.contains(&"Apache Kafka"));
        assert!(deferred.contains(&"Microservices"));
        assert!(deferred.contains(&"Kubernetes (managed, e.g. EKS)"));
        let arch = r.assumptions.find(Category::Architecture).unwrap();
        assert!(arch.reason.contains("Microservices deferred"));
    }

    #[test]
    fn gated_preferences_are_adopted_at_scale() {
        let r = resolve(
            &InputProfile::new("marketplace")
                .with_scale(ScaleHint::Users(2_000_000))
                .with_preference("Kafka"),
        );
        assert_eq!(r.config.stack.messaging.as_ref().unwrap().value, "Apache Kafka");
        assert_eq!(r.config.stack.messaging.as_ref().unwrap().origin, Origin::Explicit);
        assert!(r.config.deferred.is_empty());
    }

    #[test]
    fn every_inferred_choice_is_logged() {
        let r = resolve(&InputProfile::new("an iot fleet of sensors").with_domain(Domain::Iot));
        for (category, choice) in r.config.choices() {
            if choice.origin != Origin::Explicit {
                let logged = r
                    .assumptions
                    .iter()
                    .any(|a| a.category == category && a.value == choice.value);
                assert!(logged, "{category:?} not logged");
            }
        }
    }

    #[test]
    fn sensitive_profiles_gain_an_audit_trail() {
        let r = resolve(&InputProfile::new("clinic records").with_domain(Domain::Healthcare));
        assert!(r.config.sensitive_data);
        let audit = r.config.entities.iter().find(|e| e.name == AUDIT_ENTITY).unwrap();
        assert!(audit.read_only);
        assert!(r.config.compliance.contains(&"HIPAA".to_string()));
    }

    #[test]
    fn user_entity_is_always_first() {
        let r = resolve(&InputProfile::new("tasks").with_entity("task").with_entity("user"));
        let names: Vec<&str> = r.config.entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["User", "Task"]);
    }

    #[test]
    fn entities_sharing_a_table_collapse() {
        let r = resolve(
            &InputProfile::new("shop")
                .with_domain(Domain::Ecommerce)
                .with_entity("Users")
                .with_entity("Orders")
                .with_entity("Order")
                .with_entity("order item"),
        );
        let names: Vec<&str> = r.config.entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["User", "Order", "OrderItem"]);
    }

    #[test]
    fn accented_entities_are_folded_and_unspellable_ones_dropped() {
        let r = resolve(&InputProfile::new("menus").with_entity("Café").with_entity("日本"));
        let names: Vec<&str> = r.config.entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["User", "Cafe"]);
        assert!(r
            .assumptions
            .iter()
            .any(|a| a.category == Category::Entities && a.value == "日本 (dropped)"));
    }

    #[test]
    fn architecture_request_waits_for_its_tier() {
        let r = resolve(
            &InputProfile::new("marketplace")
                .with_scale(ScaleHint::Users(250_000))
                .with_preference("microservices"),
        );
        let c = &r.config;
        assert_eq!(c.tier, ThroughputTier::Tier3);
        assert_eq!(c.style, ArchitectureStyle::ServiceOriented);
        assert_ne!(c.architecture.origin, Origin::Explicit);
        let deferred = c.deferred.iter().find(|d| d.technology == "Microservices").unwrap();
        assert_eq!(deferred.minimum_tier, ThroughputTier::Tier4);

        let big = resolve(
            &InputProfile::new("marketplace")
                .with_scale(ScaleHint::Users(2_000_000))
                .with_preference("microservices"),
        );
        assert_eq!(big.config.style, ArchitectureStyle::EventDrivenMicroservices);
        assert_eq!(big.config.architecture.origin, Origin::Explicit);
    }

    #[test]
    fn resolution_is_deterministic() {
        let profile = InputProfile::new("A real-time chat for gamers, 20k users")
            .with_domain(Domain::Gaming)
            .with_scale(ScaleHint::Users(20_000))
            .with_real_time(true);
        assert_eq!(resolve(&profile), resolve(&profile));
    }

    #[test]
    fn catalog_matches_free_form_preferences() {
        assert_eq!(catalog_entry("PostgreSQL 16").unwrap().value, "PostgreSQL");
        assert_eq!(catalog_entry("Kafka").unwrap().category, Category::Messaging);
        assert!(catalog_entry("javascript").is_none());
    }
}
