//! Renders the eleven sections of a backend design document.
//!
//! Every renderer is a pure function of the resolved [`ConfigProfile`] and the
//! [`AssumptionsLog`]; regenerating one section never disturbs the others.

pub mod blueprint;

use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::defaults::{AssumptionsLog, ConfigProfile, USER_ENTITY};
use crate::document::{Block, Document, Section, SectionId, Table};
use crate::naming::{self, NamingViolation};
use crate::tier::ThroughputTier;

use blueprint::{
    erd_type, is_public, Blueprint, TableSpec, API_PREFIX, ROLE_ADMIN, ROLE_AUDITOR, ROLE_GUEST,
    ROLE_MEMBER,
};

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("{} naming violation(s): {}", .0.len(), summarize(.0))]
    Naming(Vec<NamingViolation>),
}

fn summarize(violations: &[NamingViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub struct SectionAssembler;

impl SectionAssembler {
    /// Render all eleven sections and validate naming conventions.
    pub fn assemble(config: &ConfigProfile, assumptions: &AssumptionsLog) -> Result<Document, AssemblyError> {
        let blueprint = Blueprint::new(config);
        let doc = Document {
            title: config.project_name.clone(),
            sections: SectionId::ALL
                .into_iter()
                .map(|id| render_with(&blueprint, id, config, assumptions))
                .collect(),
        };
        let violations = naming::validate(&doc);
        if !violations.is_empty() {
            return Err(AssemblyError::Naming(violations));
        }
        debug!(title = %doc.title, sections = doc.sections.len(), "document assembled");
        Ok(doc)
    }

    pub fn render(id: SectionId, config: &ConfigProfile, assumptions: &AssumptionsLog) -> Section {
        render_with(&Blueprint::new(config), id, config, assumptions)
    }
}

fn render_with(bp: &Blueprint, id: SectionId, config: &ConfigProfile, log: &AssumptionsLog) -> Section {
    let blocks = match id {
        SectionId::ExecutiveSummary => executive_summary(bp, config),
        SectionId::Assumptions => assumptions(log),
        SectionId::UserStories => user_stories(bp),
        SectionId::TechStack => tech_stack(config),
        SectionId::SystemArchitecture => system_architecture(config),
        SectionId::DataModel => data_model(bp, config),
        SectionId::ApiEndpoints => api_endpoints(bp),
        SectionId::ErrorHandling => error_handling(bp),
        SectionId::AuthenticationAuthorization => authentication(bp, config),
        SectionId::FailureModes => failure_modes(bp, config),
        SectionId::ScalabilityRoadmap => scalability_roadmap(config),
    };
    Section::new(id, blocks)
}

fn yes_no(v: bool) -> &'static str {
    if v {
        "yes"
    } else {
        "no"
    }
}

fn code_ticks(s: &str) -> String {
    format!("`{s}`")
}

// --- 1. Executive Summary ---

fn executive_summary(bp: &Blueprint, config: &ConfigProfile) -> Vec<Block> {
    let entities: Vec<&str> = config.entities.iter().map(|e| e.name.as_str()).collect();
    let mut facts = vec![
        format!("Scale: {}", config.tier),
        format!("Architecture: {}", config.architecture.value),
        format!("Core entities: {}", entities.join(", ")),
        format!("Endpoints: {} under `{API_PREFIX}`", bp.endpoints.len()),
        format!("Real-time: {}", yes_no(config.real_time)),
        format!("Sensitive data: {}", yes_no(config.sensitive_data)),
    ];
    if !config.compliance.is_empty() {
        facts.push(format!("Compliance: {}", config.compliance.join(", ")));
    }
    vec![
        Block::paragraph(format!(
            "{} is a {} backend where users {}.",
            config.project_name,
            config.domain_label(),
            config.primary_action
        )),
        Block::paragraph(format!(
            "It starts as a {} on {} with {}, exposing a versioned {} API. Choices marked \
             inferred or default are listed under Assumptions and can be revisited.",
            config.architecture.value.to_lowercase(),
            config.stack.language.value,
            config.stack.database.value,
            config.stack.api_protocol.value
        )),
        Block::List(facts),
    ]
}

// --- 2. Assumptions ---

fn assumptions(log: &AssumptionsLog) -> Vec<Block> {
    if log.is_empty() {
        return vec![Block::placeholder("every value was stated in the description")];
    }
    let mut table = Table::new(["Category", "Assumed Value", "Reason"]);
    for a in log {
        table.push([a.category.label().to_string(), a.value.clone(), a.reason.clone()]);
    }
    vec![
        Block::paragraph("Values below were not stated in the description and were filled from defaults."),
        Block::Table(table),
    ]
}

// --- 3. User Stories ---

fn user_stories(bp: &Blueprint) -> Vec<Block> {
    let mut table = Table::new(["ID", "Priority", "Story", "Endpoints"]);
    for (idx, story) in bp.stories.iter().enumerate() {
        table.push([
            format!("US-{:02}", idx + 1),
            story.priority.as_str().to_string(),
            story.text.clone(),
            story.endpoints.join(", "),
        ]);
    }
    vec![
        Block::paragraph("P0 stories are required for launch, P1 follow in the first iteration, P2 are nice to have."),
        Block::Table(table),
    ]
}

// --- 4. Tech Stack ---

fn tech_stack(config: &ConfigProfile) -> Vec<Block> {
    let mut table = Table::new(["Layer", "Choice", "Justification", "Source"]);
    for (category, choice) in config.choices() {
        table.push([
            category.label().to_string(),
            choice.value.clone(),
            choice.justification.clone(),
            choice.origin.label().to_string(),
        ]);
    }
    if config.tier >= ThroughputTier::Tier2 {
        table.push([
            "Cache",
            "Redis",
            "Keeps hot reads and rate-limit counters off the primary database",
            "baseline",
        ]);
    }
    table.push([
        "Observability",
        "OpenTelemetry + structured JSON logs",
        "Traces and logs correlated by request id from day one",
        "baseline",
    ]);
    vec![Block::Table(table)]
}

// --- 5. System Architecture ---

fn system_architecture(config: &ConfigProfile) -> Vec<Block> {
    let mut blocks = vec![Block::paragraph(format!(
        "{}. {}.",
        config.architecture.value, config.architecture.justification
    ))];

    let mut flow = vec![
        "flowchart LR".to_string(),
        "    client[Clients] --> lb[Load balancer]".to_string(),
        "    lb --> api[API service]".to_string(),
        "    api --> db[(Primary database)]".to_string(),
    ];
    if config.tier >= ThroughputTier::Tier2 {
        flow.push("    api --> cache[(Redis)]".to_string());
    }
    if config.real_time {
        flow.push("    client <-.-> ws[Realtime gateway]".to_string());
        flow.push("    ws --> api".to_string());
    }
    if let Some(messaging) = &config.stack.messaging {
        flow.push(format!("    api --> queue[[{}]]", messaging.value));
        flow.push("    queue --> worker[Background workers]".to_string());
        flow.push("    worker --> db".to_string());
    }
    blocks.push(Block::code("mermaid", flow.join("\n")));

    let mut components = vec![
        format!("API service: {} behind a load balancer, stateless", config.stack.language.value),
        format!("Primary database: {}", config.stack.database.value),
        format!("Identity: {}", config.stack.auth.value),
        format!("Hosting: {}", config.stack.hosting.value),
    ];
    if config.tier >= ThroughputTier::Tier2 {
        components.push("Cache: Redis for sessions, hot reads and rate limiting".to_string());
    }
    blocks.push(Block::List(components));

    blocks.push(Block::subheading("Real-time channel"));
    if config.real_time {
        blocks.push(Block::paragraph(format!(
            "Clients hold an authenticated WebSocket at `{API_PREFIX}/realtime`. The API publishes \
             change events; the gateway fans them out to subscribed connections. Clients resync \
             through the REST endpoints after a reconnect."
        )));
    } else {
        blocks.push(Block::placeholder("no real-time requirement; clients poll REST endpoints"));
    }

    blocks.push(Block::subheading("Asynchronous processing"));
    match &config.stack.messaging {
        Some(messaging) => blocks.push(Block::paragraph(format!(
            "Slow or retryable work (emails, exports, webhooks) goes through {}. Consumers are \
             idempotent and failed messages land in a dead-letter queue.",
            messaging.value
        ))),
        None => blocks.push(Block::placeholder(format!(
            "{} load is served synchronously; background jobs run in-process",
            config.tier
        ))),
    }
    blocks
}

// --- 6. Data Model ---

fn data_model(bp: &Blueprint, config: &ConfigProfile) -> Vec<Block> {
    let mut blocks = vec![Block::paragraph(format!(
        "Stored in {}. Tables and columns use snake_case; every table carries `id`, `created_at` \
         and `updated_at`.",
        config.stack.database.value
    ))];

    let mut erd = vec!["erDiagram".to_string()];
    for table in &bp.tables {
        erd.push(format!("    {} {{", table.table));
        for c in &table.columns {
            let key = if c.name == "id" {
                " PK"
            } else if c.references.is_some() {
                " FK"
            } else {
                ""
            };
            erd.push(format!("        {} {}{key}", erd_type(c.sql_type), c.name));
        }
        erd.push("    }".to_string());
    }
    for table in &bp.tables {
        for (column, parent) in table.foreign_keys() {
            erd.push(format!("    {parent} ||--o{{ {} : {column}", table.table));
        }
    }
    blocks.push(Block::code("mermaid", erd.join("\n")));

    for table in &bp.tables {
        blocks.push(Block::subheading(table.table.clone()));
        let mut schema = Table::new(["Column", "Type", "Constraints"]);
        for c in &table.columns {
            schema.push([c.name.clone(), c.sql_type.to_string(), c.constraints.clone()]);
        }
        blocks.push(Block::Table(schema));
    }

    if bp.tables.iter().all(|t| t.entity == USER_ENTITY || t.read_only) {
        blocks.push(Block::subheading("Domain entities"));
        blocks.push(Block::placeholder("no domain entities identified beyond users"));
    }

    let mut indexes: Vec<String> = Vec::new();
    for table in &bp.tables {
        for (column, _) in table.foreign_keys() {
            indexes.push(format!("{}: btree on {}", table.table, code_ticks(column)));
        }
    }
    if !indexes.is_empty() {
        blocks.push(Block::subheading("Indexes"));
        blocks.push(Block::List(indexes));
    }
    blocks
}

// --- 7. API Endpoints ---

fn api_endpoints(bp: &Blueprint) -> Vec<Block> {
    let mut blocks = vec![Block::paragraph(format!(
        "All resources live under `{API_PREFIX}`. Bodies are JSON with camelCase fields; path \
         segments are kebab-case. Lists use cursor pagination (`?cursor=&limit=`, max 100)."
    ))];
    let mut table = Table::new(["Method", "Path", "Description", "Auth", "Success", "Errors"]);
    for e in &bp.endpoints {
        table.push([
            e.method.to_string(),
            e.path.clone(),
            e.summary.clone(),
            e.access.clone(),
            e.success.to_string(),
            e.errors.join(", "),
        ]);
    }
    blocks.push(Block::Table(table));

    for e in bp.endpoints.iter().filter(|e| e.method.has_body()) {
        blocks.push(Block::subheading(e.reference()));
        if let Some(request) = &e.request {
            blocks.push(Block::paragraph("Request:"));
            blocks.push(Block::code("json", pretty(request)));
        }
        if let Some(response) = &e.response {
            blocks.push(Block::paragraph(format!("Response `{}`:", e.success)));
            blocks.push(Block::code("json", pretty(response)));
        }
    }
    blocks
}

fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

// --- 8. Error Handling ---

fn error_handling(bp: &Blueprint) -> Vec<Block> {
    let envelope = json!({
        "error": {
            "code": "VALIDATION_FAILED",
            "message": "email must be a valid address",
            "details": [{ "field": "email", "issue": "format" }],
            "requestId": "req_01HZX3K9Q2"
        }
    });
    let mut table = Table::new(["Code", "HTTP Status", "Meaning", "Client Action"]);
    for e in &bp.errors {
        table.push([
            e.code.to_string(),
            e.status.to_string(),
            e.meaning.to_string(),
            e.client_action.to_string(),
        ]);
    }
    vec![
        Block::paragraph("Every error uses one envelope. Endpoint rows reference only the codes below."),
        Block::code("json", pretty(&envelope)),
        Block::Table(table),
        Block::List(vec![
            "Validation runs at the edge; all field errors are reported together".to_string(),
            "POST requests accept an `Idempotency-Key` header; replays return the first response".to_string(),
            "5xx responses never leak stack traces; the `requestId` links to server logs".to_string(),
        ]),
    ]
}

// --- 9. Authentication & Authorization ---

fn permission(role: &str, table: &TableSpec) -> &'static str {
    let user = table.entity == USER_ENTITY;
    match role {
        ROLE_ADMIN if table.read_only => "read",
        ROLE_ADMIN => "full access",
        ROLE_MEMBER if user => "read, update self",
        ROLE_MEMBER if table.read_only => "none",
        ROLE_MEMBER => "create, read, update/delete own",
        ROLE_GUEST if user => "create (register)",
        ROLE_GUEST if !table.read_only && is_public(&table.entity) => "read",
        ROLE_AUDITOR if table.read_only || user => "read",
        _ => "none",
    }
}

fn authentication(bp: &Blueprint, config: &ConfigProfile) -> Vec<Block> {
    let auth = &config.stack.auth.value;
    let mut policies = vec![
        "Access tokens: signed JWT, 15 minute lifetime, audience-restricted".to_string(),
        "Refresh tokens: opaque, 30 day lifetime, rotated on every use and revocable".to_string(),
        "Passwords: argon2id hashes; login is rate limited per account and per IP".to_string(),
    ];
    if auth.contains("MFA") {
        policies.push("MFA: TOTP or WebAuthn required for sign-in and sensitive actions".to_string());
    }
    if auth.contains("SSO") {
        policies.push("SSO: SAML or OIDC per organization; just-in-time provisioning".to_string());
    }
    if config.sensitive_data {
        policies.push("Sensitive fields are encrypted at rest; every read and write is written to audit_events".to_string());
    }

    let mut roles = vec![
        format!("{ROLE_ADMIN}: operates the platform and manages users"),
        format!("{ROLE_MEMBER}: signed-in user acting on their own records"),
        format!("{ROLE_GUEST}: unauthenticated visitor"),
    ];
    if bp.roles.contains(&ROLE_AUDITOR) {
        roles.push(format!("{ROLE_AUDITOR}: read-only access to the audit trail"));
    }

    let mut headers = vec!["Role".to_string()];
    headers.extend(bp.tables.iter().map(|t| t.table.clone()));
    let mut rbac = Table::new(headers);
    for role in &bp.roles {
        let mut row = vec![role.to_string()];
        row.extend(bp.tables.iter().map(|t| permission(role, t).to_string()));
        rbac.push(row);
    }

    vec![
        Block::paragraph(format!("Authentication uses {auth}. Authorization is role-based and checked in the API service.")),
        Block::List(policies),
        Block::subheading("Roles"),
        Block::List(roles),
        Block::subheading("Permissions"),
        Block::Table(rbac),
    ]
}

// --- 10. Failure Modes & Resilience ---

fn failure_modes(bp: &Blueprint, config: &ConfigProfile) -> Vec<Block> {
    let db = &config.stack.database.value;
    let mut table = Table::new(["Failure", "Impact", "Detection", "Mitigation"]);
    table.push([
        format!("{db} primary unavailable"),
        "Writes fail; reads fail without replicas".to_string(),
        "Health checks, connection error rate".to_string(),
        "Managed failover to a standby; API returns SERVICE_UNAVAILABLE with Retry-After".to_string(),
    ]);
    table.push([
        "API instance crash or bad deploy",
        "Elevated 5xx on a subset of requests",
        "Error-rate and latency alerts per release",
        "Rolling deploys with health gates; one-click rollback",
    ]);
    table.push([
        "Traffic spike beyond capacity",
        "Latency rises, requests time out",
        "p95 latency and saturation alarms",
        "Autoscaling, per-client rate limits returning RATE_LIMITED",
    ]);
    table.push([
        "Identity provider or token signing key outage",
        "Users cannot sign in",
        "Login failure rate alert",
        "Cached JWKS, existing sessions continue until expiry",
    ]);
    let third_party = if bp.errors.iter().any(|e| e.code == blueprint::PAYMENT_DECLINED) {
        "Payment provider timeout"
    } else {
        "Third-party API timeout"
    };
    table.push([
        third_party,
        "Dependent requests stall",
        "Dependency latency and timeout counters",
        "Timeouts, retries with jitter, circuit breaker, idempotency keys",
    ]);
    table.push([
        "Data corruption or accidental deletion",
        "Lost or wrong records",
        "Integrity checks, user reports",
        "Point-in-time recovery; daily restore drills",
    ]);
    if config.tier >= ThroughputTier::Tier2 {
        table.push([
            "Cache outage",
            "Higher database load and latency",
            "Cache hit-rate and error alarms",
            "Fall through to the database with tighter rate limits",
        ]);
    }
    if config.real_time {
        table.push([
            "Realtime gateway disconnects",
            "Clients miss live updates",
            "Connection churn metrics",
            "Client reconnect with backoff and REST resync",
        ]);
    }
    if let Some(messaging) = &config.stack.messaging {
        table.push([
            format!("{} backlog", messaging.value),
            "Background work is delayed".to_string(),
            "Queue depth and consumer lag alarms".to_string(),
            "Scale consumers; dead-letter poison messages".to_string(),
        ]);
    }
    vec![Block::Table(table)]
}

// --- 11. Scalability Roadmap ---

fn tier_changes(tier: ThroughputTier) -> (&'static str, &'static str) {
    match tier {
        ThroughputTier::Tier1 => (
            "Sustained load above a single instance or 1K users",
            "Single region, one API service, managed database with daily backups",
        ),
        ThroughputTier::Tier2 => (
            "p95 latency above target or 100K users",
            "Horizontal API scaling, read replica, Redis cache, CDN for static assets",
        ),
        ThroughputTier::Tier3 => (
            "Hot modules need independent release cadence or 1M users",
            "Extract hot paths into services, managed queue, partition large tables",
        ),
        ThroughputTier::Tier4 => (
            "Regional latency or data residency requirements",
            "Event bus between services, multi-region deployment, sharded storage",
        ),
    }
}

fn scalability_roadmap(config: &ConfigProfile) -> Vec<Block> {
    let mut table = Table::new(["Tier", "Users", "Architecture", "Move on when", "Changes"]);
    for tier in ThroughputTier::ALL.into_iter().filter(|t| *t >= config.tier) {
        let (trigger, changes) = tier_changes(tier);
        let label = if tier == config.tier {
            format!("Tier {} (current)", tier.number())
        } else {
            format!("Tier {}", tier.number())
        };
        table.push([
            label,
            tier.range_label().to_string(),
            tier.architecture().label().to_string(),
            trigger.to_string(),
            changes.to_string(),
        ]);
    }

    let mut blocks = vec![
        Block::paragraph(format!(
            "The design targets {}. Each step below is taken only when its trigger is observed.",
            config.tier
        )),
        Block::Table(table),
        Block::subheading("Deferred technology"),
    ];
    if config.deferred.is_empty() {
        blocks.push(Block::placeholder("no requested technology exceeds the current tier"));
    } else {
        let mut deferred = Table::new(["Technology", "Layer", "Adopt at", "Trigger"]);
        for d in &config.deferred {
            deferred.push([
                d.technology.clone(),
                d.category.label().to_string(),
                format!("Tier {}", d.minimum_tier.number()),
                d.adopt_when.clone(),
            ]);
        }
        blocks.push(Block::paragraph(
            "Requested in the description but not justified at the current scale:",
        ));
        blocks.push(Block::Table(deferred));
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::DefaultsResolver;
    use crate::profile::{Domain, InputProfile, ScaleHint};

    fn doc(profile: InputProfile) -> Document {
        let r = DefaultsResolver::default().resolve(&profile);
        SectionAssembler::assemble(&r.config, &r.assumptions).unwrap()
    }

    #[test]
    fn renders_eleven_sections_in_order() {
        let d = doc(InputProfile::new("a blog").with_domain(Domain::Content));
        let ids: Vec<_> = d.sections.iter().filter_map(|s| s.id).collect();
        assert_eq!(ids, SectionId::ALL.to_vec());
        assert!(d.sections.iter().all(|s| !s.is_empty()));
    }

    #[test]
    fn missing_facts_render_placeholders() {
        let d = doc(InputProfile::new("x").with_real_time(false));
        let md = d.to_markdown();
        assert!(md.contains("_N/A for current scope — no real-time requirement"));
        assert!(md.contains("_N/A for current scope — no domain entities identified beyond users_"));
    }

    #[test]
    fn real_time_adds_channel_endpoint() {
        let d = doc(InputProfile::new("chat").with_real_time(true).with_entity("Message"));
        let api = d.section(SectionId::ApiEndpoints).unwrap();
        let table = api.table_with("Method").unwrap();
        assert!(table.cells("Path").any(|p| p == "/api/v1/realtime"));
    }

    #[test]
    fn every_url_is_versioned() {
        let d = doc(InputProfile::new("shop").with_domain(Domain::Ecommerce));
        let api = d.section(SectionId::ApiEndpoints).unwrap();
        let table = api.table_with("Path").unwrap();
        assert!(table.cells("Path").all(|p| p.starts_with("/api/v1/")));
    }

    #[test]
    fn rbac_has_a_column_per_table() {
        let d = doc(InputProfile::new("clinic").with_domain(Domain::Healthcare));
        let auth = d.section(SectionId::AuthenticationAuthorization).unwrap();
        let rbac = auth.table_with("Role").unwrap();
        for t in ["users", "patients", "appointments", "audit_events"] {
            assert!(rbac.column(t).is_some(), "{t}");
        }
        assert!(rbac.cells("Role").any(|r| r == "Auditor"));
    }

    #[test]
    fn roadmap_starts_at_current_tier() {
        let d = doc(InputProfile::new("x").with_scale(ScaleHint::Users(250_000)));
        let roadmap = d.section(SectionId::ScalabilityRoadmap).unwrap();
        let tiers: Vec<_> = roadmap.tables().next().unwrap().cells("Tier").map(String::from).collect();
        assert_eq!(tiers, vec!["Tier 3 (current)", "Tier 4"]);
    }

    #[test]
    fn single_section_render_matches_full_assembly() {
        let profile = InputProfile::new("a blog").with_domain(Domain::Content);
        let r = DefaultsResolver::default().resolve(&profile);
        let full = SectionAssembler::assemble(&r.config, &r.assumptions).unwrap();
        let one = SectionAssembler::render(SectionId::DataModel, &r.config, &r.assumptions);
        assert_eq!(full.section(SectionId::DataModel), Some(&one));
    }
}
