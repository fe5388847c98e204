use serde::Deserialize;
use serde_json::Value;
use specify_core::profile::{Domain, InputProfile, ScaleHint};
use specify_core::text::to_pascal_case;

use crate::error::ProviderError;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LlmProfile {
    project_name: Option<String>,
    domain: Option<String>,
    primary_action: Option<String>,
    entities: Vec<String>,
    tech_preferences: Vec<String>,
    scale_users: Option<Value>,
    real_time: Option<bool>,
    sensitive_data: Option<bool>,
}

/// Parse raw LLM output into a profile for `description`.
pub fn parse_profile(raw: &str, description: &str) -> Result<InputProfile, ProviderError> {
    let json = extract_json_object(raw)
        .ok_or_else(|| ProviderError::Response("no JSON object in LLM output".to_string()))?;
    let parsed: LlmProfile = serde_json::from_str(json)
        .map_err(|e| ProviderError::Response(format!("malformed LLM JSON: {e}")))?;

    let mut profile = InputProfile::new(description.trim());
    profile.project_name = non_blank(parsed.project_name);
    profile.domain = parsed.domain.as_deref().and_then(Domain::parse);
    profile.primary_action = non_blank(parsed.primary_action);
    for entity in parsed.entities {
        let name = to_pascal_case(entity.trim());
        if !name.is_empty() && !profile.entities.contains(&name) {
            profile.entities.push(name);
        }
    }
    profile.tech_preferences = parsed
        .tech_preferences
        .into_iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    profile.scale = parsed.scale_users.as_ref().and_then(user_count).map(ScaleHint::Users);
    profile.real_time = parsed.real_time;
    profile.sensitive_data = parsed.sensitive_data;
    Ok(profile)
}

/// The outermost `{ ... }` span, skipping any prose or code fences around it.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&raw[start..=end])
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("null"))
}

/// Models return counts as integers, floats or strings like "10,000".
fn user_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.replace([',', '_', ' '], "").parse().ok(),
        _ => None,
    }
}
