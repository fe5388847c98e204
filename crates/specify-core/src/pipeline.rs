//! Gate → resolve → assemble → validate, with bounded regeneration.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::assemble::{AssemblyError, SectionAssembler};
use crate::checklist::{ValidationChecklist, ValidationReport};
use crate::defaults::{AssumptionsLog, ConfigProfile, DefaultsResolver};
use crate::document::{Document, SectionId};
use crate::gate::{ClarificationGate, GateDecision};
use crate::profile::InputProfile;

pub const MAX_REGENERATION_ROUNDS: usize = 2;
pub const DOCUMENT_FILE: &str = "backend-design.md";
pub const RECORD_FILE: &str = "backend-design.profile.json";
pub const GENERATOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Proceed on defaults even when the gate would ask questions.
    pub skip_clarification: bool,
}

/// Sidecar written next to the document so it can be re-validated later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRecord {
    pub config: ConfigProfile,
    pub assumptions: AssumptionsLog,
    pub generator_version: String,
}

#[derive(Debug, Clone)]
pub struct Generation {
    pub document: Document,
    pub record: GenerationRecord,
    pub report: ValidationReport,
    pub rounds: usize,
}

impl Generation {
    pub fn markdown(&self) -> String {
        self.document.to_markdown()
    }
}

#[derive(Debug, Clone)]
pub enum Outcome {
    NeedsClarification { questions: Vec<String> },
    Complete(Generation),
    Rejected { generation: Generation, report: ValidationReport },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Pipeline {
    resolver: DefaultsResolver,
}

impl Pipeline {
    pub fn new(resolver: DefaultsResolver) -> Self {
        Self { resolver }
    }

    pub fn run(&self, profile: &InputProfile, options: RunOptions) -> Result<Outcome, AssemblyError> {
        if let GateDecision::NeedsClarification { questions } = ClarificationGate::evaluate(profile) {
            if !options.skip_clarification {
                info!("description too thin; asking clarification questions");
                return Ok(Outcome::NeedsClarification { questions });
            }
            info!("clarification skipped; proceeding on defaults");
        }

        let resolution = self.resolver.resolve(profile);
        let config = resolution.config;
        let assumptions = resolution.assumptions;
        info!(
            project = %config.project_name,
            tier = config.tier.number(),
            assumptions = assumptions.len(),
            "profile resolved"
        );

        let mut document = SectionAssembler::assemble(&config, &assumptions)?;
        let mut report = ValidationChecklist::run(&document, &config);
        let mut rounds = 0;
        while !report.passed() && rounds < MAX_REGENERATION_ROUNDS {
            rounds += 1;
            let sections = report.failing_sections();
            warn!(round = rounds, ?sections, "regenerating failing sections");
            regenerate(&mut document, &config, &assumptions, &sections);
            report = ValidationChecklist::run(&document, &config);
        }

        let generation = Generation {
            document,
            record: GenerationRecord {
                config,
                assumptions,
                generator_version: GENERATOR_VERSION.to_string(),
            },
            report: report.clone(),
            rounds,
        };
        if report.passed() {
            Ok(Outcome::Complete(generation))
        } else {
            warn!(failures = report.failures().count(), "document rejected");
            Ok(Outcome::Rejected { generation, report })
        }
    }
}

/// Re-render the given sections in place and restore canonical section order.
pub fn regenerate(
    document: &mut Document,
    config: &ConfigProfile,
    assumptions: &AssumptionsLog,
    sections: &[SectionId],
) {
    document.title = config.project_name.clone();
    for id in sections {
        document.put_section(SectionAssembler::render(*id, config, assumptions));
    }
    // Unrecognized or duplicated headings cannot be repaired; drop them.
    let mut seen = Vec::new();
    document.sections.retain(|s| match s.id {
        Some(id) if !seen.contains(&id) => {
            seen.push(id);
            true
        }
        _ => false,
    });
    document.sections.sort_by_key(|s| s.id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Block, Section};
    use crate::profile::Domain;

    #[test]
    fn vague_profile_stops_at_the_gate() {
        let outcome = Pipeline::default()
            .run(&InputProfile::new("I want to build an app"), RunOptions::default())
            .unwrap();
        assert!(matches!(outcome, Outcome::NeedsClarification { .. }));
    }

    #[test]
    fn skip_clarification_generates_on_defaults() {
        let outcome = Pipeline::default()
            .run(
                &InputProfile::new("I want to build an app"),
                RunOptions {
                    skip_clarification: true,
                },
            )
            .unwrap();
        let Outcome::Complete(generation) = outcome else {
            panic!("expected a document");
        };
        assert_eq!(generation.rounds, 0);
        assert!(generation.report.passed());
    }

    #[test]
    fn regenerate_repairs_a_damaged_document() {
        let profile = InputProfile::new("shop").with_domain(Domain::Ecommerce);
        let Outcome::Complete(generation) = Pipeline::default().run(&profile, RunOptions::default()).unwrap()
        else {
            panic!("expected a document");
        };
        let record = generation.record;
        let mut doc = generation.document;
        doc.sections.retain(|s| s.id != Some(SectionId::DataModel));
        doc.sections.push(Section {
            id: None,
            heading: "Notes".to_string(),
            blocks: vec![Block::paragraph("scratch")],
        });
        let report = ValidationChecklist::run(&doc, &record.config);
        assert!(!report.passed());

        regenerate(&mut doc, &record.config, &record.assumptions, &report.failing_sections());
        assert!(ValidationChecklist::run(&doc, &record.config).passed());
        assert_eq!(doc.sections.len(), 11);
    }

    #[test]
    fn record_serializes_camel_case() {
        let profile = InputProfile::new("a blog").with_domain(Domain::Content);
        let Outcome::Complete(generation) = Pipeline::default().run(&profile, RunOptions::default()).unwrap()
        else {
            panic!("expected a document");
        };
        let json = serde_json::to_value(&generation.record).unwrap();
        assert!(json.get("generatorVersion").is_some());
        assert_eq!(json["config"]["stack"]["database"]["value"], "MongoDB");
        let back: GenerationRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, generation.record);
    }
}
