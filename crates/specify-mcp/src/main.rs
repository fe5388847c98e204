mod init;

use std::path::PathBuf;

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::Deserialize;
use specify_core::checklist::ValidationChecklist;
use specify_core::defaults::ConfigProfile;
use specify_core::document::Document;
use specify_core::pipeline::{GenerationRecord, Outcome, Pipeline, RunOptions};
use specify_core::profile::{Domain, InputProfile, ProfileField, ScaleHint};
use specify_core::{ClarificationGate, DefaultsResolver, GateDecision, KeywordExtractor, ThroughputTier};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// --- Request types ---

/// Structured tags the calling model extracted from the description. Each one overrides keyword detection.
#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
struct ProfileTags {
    /// Product name, if the user gave one
    #[serde(default)]
    project_name: Option<String>,
    /// Industry domain
    #[serde(default)]
    domain: Option<Domain>,
    /// Main thing users do, as a verb phrase (e.g. "book appointments")
    #[serde(default)]
    primary_action: Option<String>,
    /// Nouns the system stores, singular PascalCase (e.g. ["Appointment", "Doctor"])
    #[serde(default)]
    entities: Vec<String>,
    /// Technologies the user asked for by name (e.g. ["PostgreSQL", "Kafka"])
    #[serde(default)]
    tech_preferences: Vec<String>,
    /// Expected number of users
    #[serde(default)]
    scale_users: Option<u64>,
    /// Throughput tier (1-4) when the user gave a tier instead of a user count
    #[serde(default)]
    tier: Option<u8>,
    /// Whether live updates, chat or notifications are required
    #[serde(default)]
    real_time: Option<bool>,
    /// Whether payments, bank details or health records are stored
    #[serde(default)]
    sensitive_data: Option<bool>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
struct AssessRequest {
    /// The user's description of the application, verbatim
    prompt: String,
    #[serde(flatten)]
    tags: ProfileTags,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    /// The user's description of the application, verbatim
    prompt: String,
    #[serde(flatten)]
    tags: ProfileTags,
    /// Proceed on defaults instead of returning clarification questions
    #[serde(default)]
    skip_clarification: bool,
    /// Directory to write backend-design.md and its profile sidecar into. Omit to only return the markdown.
    #[serde(default)]
    output_dir: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
struct CheckRequest {
    /// Full markdown of a backend design document
    markdown: String,
    /// The profile the document was generated from: the contents of backend-design.profile.json, or just its `config` object
    profile: String,
}

fn build_profile(prompt: &str, tags: ProfileTags) -> Result<InputProfile, String> {
    let mut profile = KeywordExtractor.profile(prompt);
    if let Some(name) = tags.project_name.filter(|n| !n.trim().is_empty()) {
        profile.project_name = Some(name.trim().to_string());
    }
    if let Some(domain) = tags.domain {
        profile.domain = Some(domain);
        profile.contradictions.remove(&ProfileField::Domain);
    }
    if let Some(action) = tags.primary_action.filter(|a| !a.trim().is_empty()) {
        profile.primary_action = Some(action.trim().to_string());
    }
    if !tags.entities.is_empty() {
        profile.entities = tags.entities;
    }
    profile
        .tech_preferences
        .extend(tags.tech_preferences.into_iter().map(|t| t.trim().to_lowercase()));
    match (tags.scale_users, tags.tier) {
        (Some(users), _) => profile.scale = Some(ScaleHint::Users(users)),
        (None, Some(n)) => {
            let tier = ThroughputTier::from_number(n).ok_or_else(|| format!("tier must be 1-4, got {n}"))?;
            profile.scale = Some(ScaleHint::Tier(tier));
        }
        (None, None) => {}
    }
    if let Some(real_time) = tags.real_time {
        profile.real_time = Some(real_time);
        profile.contradictions.remove(&ProfileField::RealTime);
    }
    if let Some(sensitive) = tags.sensitive_data {
        profile.sensitive_data = Some(sensitive);
        profile.contradictions.remove(&ProfileField::SensitiveData);
    }
    Ok(profile)
}

fn questions_text(questions: &[String]) -> String {
    let mut out = String::from(
        "The description is too thin to design from. Ask the user these questions, then call again with their answers as tags:\n",
    );
    for (i, q) in questions.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, q));
    }
    out
}

/// Accepts a full sidecar record or a bare config object.
fn parse_config(raw: &str) -> Result<ConfigProfile, String> {
    if let Ok(record) = serde_json::from_str::<GenerationRecord>(raw) {
        return Ok(record.config);
    }
    serde_json::from_str::<ConfigProfile>(raw).map_err(|e| format!("profile is not a valid profile record: {e}"))
}

#[derive(Clone)]
pub struct SpecifyServer {
    tool_router: ToolRouter<Self>,
    pipeline: Pipeline,
}

#[tool_router]
impl SpecifyServer {
    pub fn new() -> Self {
        Self {
            tool_router: Self::tool_router(),
            pipeline: Pipeline::default(),
        }
    }

    #[tool(
        description = "Decide whether a description is specific enough to design from. Returns {decision: \"needsClarification\", questions} or {decision: \"proceed\", config, assumptions} where config is the fully resolved profile (tier, architecture, stack with justifications, deferred technology) and assumptions lists every default applied."
    )]
    fn assess_prompt(
        &self,
        Parameters(req): Parameters<AssessRequest>,
    ) -> Result<CallToolResult, McpError> {
        let profile = match build_profile(&req.prompt, req.tags) {
            Ok(p) => p,
            Err(e) => return Ok(CallToolResult::error(vec![Content::text(e)])),
        };
        let value = match ClarificationGate::evaluate(&profile) {
            decision @ GateDecision::NeedsClarification { .. } => serde_json::to_value(&decision),
            GateDecision::Proceed => {
                let resolution = DefaultsResolver::default().resolve(&profile);
                Ok(serde_json::json!({
                    "decision": "proceed",
                    "config": resolution.config,
                    "assumptions": resolution.assumptions,
                }))
            }
        };
        match value.and_then(|v| serde_json::to_string_pretty(&v)) {
            Ok(json) => Ok(CallToolResult::success(vec![Content::text(json)])),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(format!(
                "Serialization error: {e}"
            ))])),
        }
    }

    #[tool(
        description = "Generate the Backend Design Document for a description. Returns the markdown, or the clarification questions to put to the user when the description is too thin. Pass any tags you can infer from the conversation; they override keyword detection."
    )]
    fn generate_document(
        &self,
        Parameters(req): Parameters<GenerateRequest>,
    ) -> Result<CallToolResult, McpError> {
        let profile = match build_profile(&req.prompt, req.tags) {
            Ok(p) => p,
            Err(e) => return Ok(CallToolResult::error(vec![Content::text(e)])),
        };
        let options = RunOptions {
            skip_clarification: req.skip_clarification,
        };
        let outcome = match self.pipeline.run(&profile, options) {
            Ok(o) => o,
            Err(e) => return Ok(CallToolResult::error(vec![Content::text(e.to_string())])),
        };

        match outcome {
            Outcome::NeedsClarification { questions } => {
                Ok(CallToolResult::success(vec![Content::text(questions_text(&questions))]))
            }
            Outcome::Rejected { generation, report } => {
                let mut text = String::from("Generated document failed validation:\n");
                for failure in report.failures() {
                    text.push_str(&format!(
                        "- {}: {}\n",
                        failure.criterion.label(),
                        failure.detail.as_deref().unwrap_or("failed")
                    ));
                }
                text.push('\n');
                text.push_str(&generation.markdown());
                Ok(CallToolResult::error(vec![Content::text(text)]))
            }
            Outcome::Complete(generation) => {
                let mut text = generation.markdown();
                if let Some(dir) = req.output_dir {
                    match specify_core::save_generation(&PathBuf::from(&dir), &generation) {
                        Ok(path) => {
                            info!(path = %path.display(), "document written");
                            text = format!("Wrote {}\n\n{}", path.display(), text);
                        }
                        Err(e) => {
                            return Ok(CallToolResult::error(vec![Content::text(format!(
                                "Failed to write document to '{dir}': {e}"
                            ))]))
                        }
                    }
                }
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
        }
    }

    #[tool(
        description = "Run the validation checklist over a Backend Design Document. Returns {passed, results: [{criterion, passed, detail?, sections?}]}; failing results name the sections to regenerate."
    )]
    fn check_document(
        &self,
        Parameters(req): Parameters<CheckRequest>,
    ) -> Result<CallToolResult, McpError> {
        let config = match parse_config(&req.profile) {
            Ok(c) => c,
            Err(e) => return Ok(CallToolResult::error(vec![Content::text(e)])),
        };
        let document = match Document::parse(&req.markdown) {
            Ok(d) => d,
            Err(e) => {
                return Ok(CallToolResult::error(vec![Content::text(format!(
                    "Failed to parse markdown: {e}"
                ))]))
            }
        };
        let report = ValidationChecklist::run(&document, &config);
        if !report.passed() {
            warn!(failures = report.failures().count(), "checked document has failures");
        }
        let body = serde_json::json!({
            "passed": report.passed(),
            "results": report.results,
        });
        let json = serde_json::to_string_pretty(&body)
            .unwrap_or_else(|e| format!("Serialization error: {e}"));
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Get the rules every Backend Design Document follows")]
    fn get_rules(&self) -> Result<CallToolResult, McpError> {
        Ok(CallToolResult::success(vec![Content::text(
            specify_core::rules::RULES,
        )]))
    }
}

#[tool_handler]
impl ServerHandler for SpecifyServer {
    fn get_info(&self) -> ServerInfo {
        let instructions = format!(
            "{}\n\n## Document Rules\n{}",
            INSTRUCTIONS,
            specify_core::rules::RULES
        );
        ServerInfo {
            instructions: Some(instructions.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

const INSTRUCTIONS: &str = r#"specify turns a one-paragraph application description into a Backend Design Document: tech stack, architecture, data model, API, error handling, auth, failure modes and a scalability roadmap, sized to the expected load.

## Workflow
1. Call `assess_prompt` with the user's description and any tags you can infer (domain, primaryAction, scaleUsers, realTime, sensitiveData, entities, techPreferences). You are the language understanding here; tags you pass override keyword detection.
2. If the decision is `needsClarification`, ask the user the returned questions verbatim and call again with their answers as tags. Do not guess answers.
3. Call `generate_document` with the same inputs. Pass `outputDir` to write `backend-design.md` and `backend-design.profile.json`.
4. After editing a document by hand, call `check_document` with the markdown and the profile JSON to confirm it still satisfies the checklist.

Technology the user requests beyond what the load justifies (Kubernetes for 50 users) is deferred to the scalability roadmap, not adopted. Explain this to the user rather than overriding it."#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the MCP transport; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    if std::env::args().nth(1).as_deref() == Some("init") {
        return init::init_project(&std::env::current_dir()?);
    }

    info!(version = env!("CARGO_PKG_VERSION"), "starting specify MCP server");
    let service = SpecifyServer::new()
        .serve(rmcp::transport::io::stdio())
        .await
        .inspect_err(|e| tracing::error!(error = %e, "MCP server error"))?;
    service.waiting().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_override_keyword_detection() {
        let tags = ProfileTags {
            domain: Some(Domain::Healthcare),
            scale_users: Some(250_000),
            real_time: Some(false),
            tech_preferences: vec![" Kafka ".to_string()],
            ..ProfileTags::default()
        };
        let profile = build_profile("a blog for a clinic with live chat", tags).unwrap();
        assert_eq!(profile.domain, Some(Domain::Healthcare));
        assert!(!profile.contradictions.contains(&ProfileField::Domain));
        assert_eq!(profile.scale, Some(ScaleHint::Users(250_000)));
        assert_eq!(profile.real_time, Some(false));
        assert!(profile.tech_preferences.contains("kafka"));
    }

    #[test]
    fn tier_tag_is_range_checked() {
        let tags = ProfileTags {
            tier: Some(7),
            ..ProfileTags::default()
        };
        assert!(build_profile("x", tags).is_err());
        let tags = ProfileTags {
            tier: Some(3),
            ..ProfileTags::default()
        };
        assert_eq!(
            build_profile("x", tags).unwrap().scale,
            Some(ScaleHint::Tier(ThroughputTier::Tier3))
        );
    }

    #[test]
    fn config_parses_from_record_or_bare_object() {
        let profile = InputProfile::new("shop").with_domain(Domain::Ecommerce);
        let Outcome::Complete(generation) = Pipeline::default().run(&profile, RunOptions::default()).unwrap()
        else {
            panic!("expected a document");
        };
        let record = serde_json::to_string(&generation.record).unwrap();
        let bare = serde_json::to_string(&generation.record.config).unwrap();
        assert_eq!(parse_config(&record).unwrap(), generation.record.config);
        assert_eq!(parse_config(&bare).unwrap(), generation.record.config);
        assert!(parse_config("{}").is_err());
    }

    #[test]
    fn questions_are_numbered() {
        let text = questions_text(&["First?".to_string(), "Second?".to_string()]);
        assert!(text.contains("1. First?\n2. Second?\n"));
    }
}
