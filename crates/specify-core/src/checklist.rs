//! The ten acceptance criteria a document must meet before it is returned.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::warn;

use crate::assemble::blueprint::{table_name, Method};
use crate::defaults::{ConfigProfile, Origin};
use crate::document::{Block, Document, Section, SectionId};

pub const MIN_FAILURE_ROWS: usize = 5;
const PRIORITIES: [&str; 3] = ["P0", "P1", "P2"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Criterion {
    StructuralPresence,
    PriorityTagging,
    ErdPresent,
    SchemaCompleteness,
    StoryEndpointCoverage,
    PayloadSamples,
    RbacPopulated,
    FailureTable,
    StackJustified,
    AssumptionsComplete,
}

impl Criterion {
    pub const ALL: [Criterion; 10] = [
        Self::StructuralPresence,
        Self::PriorityTagging,
        Self::ErdPresent,
        Self::SchemaCompleteness,
        Self::StoryEndpointCoverage,
        Self::PayloadSamples,
        Self::RbacPopulated,
        Self::FailureTable,
        Self::StackJustified,
        Self::AssumptionsComplete,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::StructuralPresence => "All 11 sections present, in order, non-empty",
            Self::PriorityTagging => "Every user story tagged P0/P1/P2",
            Self::ErdPresent => "Mermaid ERD in the data model",
            Self::SchemaCompleteness => "Every entity has a table with id, created_at, updated_at",
            Self::StoryEndpointCoverage => "P0 stories map to endpoints; endpoints use shared error codes",
            Self::PayloadSamples => "Every POST/PUT/PATCH endpoint has a JSON sample",
            Self::RbacPopulated => "RBAC matrix covers every role and resource",
            Self::FailureTable => "Failure-mode table has at least 5 rows",
            Self::StackJustified => "Every tech-stack row is justified",
            Self::AssumptionsComplete => "Every inferred choice is listed as an assumption",
        }
    }

    /// Sections regenerated when this criterion fails.
    pub fn sections(self) -> &'static [SectionId] {
        match self {
            Self::StructuralPresence => &[],
            Self::PriorityTagging => &[SectionId::UserStories],
            Self::ErdPresent | Self::SchemaCompleteness => &[SectionId::DataModel],
            Self::StoryEndpointCoverage => &[
                SectionId::UserStories,
                SectionId::ApiEndpoints,
                SectionId::ErrorHandling,
            ],
            Self::PayloadSamples => &[SectionId::ApiEndpoints],
            Self::RbacPopulated => &[SectionId::AuthenticationAuthorization],
            Self::FailureTable => &[SectionId::FailureModes],
            Self::StackJustified => &[SectionId::TechStack],
            Self::AssumptionsComplete => &[SectionId::Assumptions],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CriterionResult {
    pub criterion: Criterion,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sections: Vec<SectionId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub results: Vec<CriterionResult>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CriterionResult> {
        self.results.iter().filter(|r| !r.passed)
    }

    pub fn failing_sections(&self) -> Vec<SectionId> {
        self.failures()
            .flat_map(|r| r.sections.iter().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn result(&self, criterion: Criterion) -> Option<&CriterionResult> {
        self.results.iter().find(|r| r.criterion == criterion)
    }
}

type Outcome = Result<(), (String, Vec<SectionId>)>;

fn fail(detail: impl Into<String>, criterion: Criterion) -> Outcome {
    Err((detail.into(), criterion.sections().to_vec()))
}

fn require(doc: &Document, id: SectionId) -> Result<&Section, (String, Vec<SectionId>)> {
    doc.section(id)
        .ok_or_else(|| (format!("section \"{}\" is missing", id.title()), vec![id]))
}

pub struct ValidationChecklist;

impl ValidationChecklist {
    pub fn run(doc: &Document, config: &ConfigProfile) -> ValidationReport {
        let results: Vec<CriterionResult> = Criterion::ALL
            .into_iter()
            .map(|criterion| {
                let outcome = match criterion {
                    Criterion::StructuralPresence => structural(doc),
                    Criterion::PriorityTagging => priority_tagging(doc),
                    Criterion::ErdPresent => erd_present(doc),
                    Criterion::SchemaCompleteness => schema_complete(doc, config),
                    Criterion::StoryEndpointCoverage => coverage(doc),
                    Criterion::PayloadSamples => payload_samples(doc),
                    Criterion::RbacPopulated => rbac(doc, config),
                    Criterion::FailureTable => failure_table(doc),
                    Criterion::StackJustified => stack_justified(doc),
                    Criterion::AssumptionsComplete => assumptions_complete(doc, config),
                };
                match outcome {
                    Ok(()) => CriterionResult {
                        criterion,
                        passed: true,
                        detail: None,
                        sections: Vec::new(),
                    },
                    Err((detail, sections)) => {
                        warn!(criterion = criterion.label(), %detail, "validation criterion failed");
                        CriterionResult {
                            criterion,
                            passed: false,
                            detail: Some(detail),
                            sections,
                        }
                    }
                }
            })
            .collect();
        ValidationReport { results }
    }
}

// 1
fn structural(doc: &Document) -> Outcome {
    let mut problems = Vec::new();
    let mut sections = Vec::new();
    for id in SectionId::ALL {
        match doc.section(id) {
            None => {
                problems.push(format!("missing \"{}\"", id.title()));
                sections.push(id);
            }
            Some(s) if s.is_empty() => {
                problems.push(format!("empty \"{}\"", id.title()));
                sections.push(id);
            }
            Some(_) => {}
        }
    }
    for s in doc.sections.iter().filter(|s| s.id.is_none()) {
        problems.push(format!("unrecognized section \"{}\"", s.heading));
    }
    let order: Vec<SectionId> = doc.sections.iter().filter_map(|s| s.id).collect();
    if order.len() != SectionId::ALL.len() && sections.is_empty() {
        problems.push("duplicate sections".to_string());
    } else if order.windows(2).any(|w| w[0] >= w[1]) {
        problems.push("sections out of order".to_string());
    }
    if problems.is_empty() {
        Ok(())
    } else {
        Err((problems.join("; "), sections))
    }
}

// 2
fn priority_tagging(doc: &Document) -> Outcome {
    let section = require(doc, SectionId::UserStories)?;
    let Some(table) = section.table_with("Priority") else {
        return fail("no story table with a Priority column", Criterion::PriorityTagging);
    };
    if table.rows.is_empty() {
        return fail("story table is empty", Criterion::PriorityTagging);
    }
    let untagged: Vec<&str> = table
        .cells("ID")
        .zip(table.cells("Priority"))
        .filter(|(_, p)| !PRIORITIES.contains(p))
        .map(|(id, _)| id)
        .collect();
    if untagged.is_empty() {
        Ok(())
    } else {
        fail(format!("untagged stories: {}", untagged.join(", ")), Criterion::PriorityTagging)
    }
}

// 3
fn erd_present(doc: &Document) -> Outcome {
    let section = require(doc, SectionId::DataModel)?;
    let found = section.blocks.iter().any(|b| {
        matches!(b, Block::Code { lang, body } if lang == "mermaid" && body.trim_start().starts_with("erDiagram"))
    });
    if found {
        Ok(())
    } else {
        fail("no mermaid erDiagram block", Criterion::ErdPresent)
    }
}

// 4
fn schema_complete(doc: &Document, config: &ConfigProfile) -> Outcome {
    let section = require(doc, SectionId::DataModel)?;
    let tables = section.titled_tables();
    let mut problems = Vec::new();
    let mut seen = BTreeSet::new();
    for title in tables.iter().filter_map(|(title, _)| *title) {
        if !seen.insert(title) {
            problems.push(format!("table {title} defined twice"));
        }
    }
    for entity in &config.entities {
        let name = table_name(&entity.name);
        let Some((_, table)) = tables.iter().find(|(title, _)| *title == Some(name.as_str())) else {
            problems.push(format!("no table for {}", entity.name));
            continue;
        };
        let columns: Vec<&str> = table.cells("Column").collect();
        for required in ["id", "created_at", "updated_at"] {
            if !columns.contains(&required) {
                problems.push(format!("{name} lacks {required}"));
            }
        }
    }
    if problems.is_empty() {
        Ok(())
    } else {
        fail(problems.join("; "), Criterion::SchemaCompleteness)
    }
}

fn endpoint_refs(doc: &Document) -> Option<Vec<String>> {
    let table = doc.section(SectionId::ApiEndpoints)?.table_with("Path")?;
    let methods = table.cells("Method");
    let paths = table.cells("Path");
    Some(methods.zip(paths).map(|(m, p)| format!("{m} {p}")).collect())
}

// 5
fn coverage(doc: &Document) -> Outcome {
    let stories = require(doc, SectionId::UserStories)?;
    require(doc, SectionId::ApiEndpoints)?;
    let errors_section = require(doc, SectionId::ErrorHandling)?;

    let Some(refs) = endpoint_refs(doc) else {
        return fail("no endpoint table", Criterion::StoryEndpointCoverage);
    };
    let Some(story_table) = stories.table_with("Priority") else {
        return fail("no story table", Criterion::StoryEndpointCoverage);
    };
    let mut problems = Vec::new();
    let mut seen = BTreeSet::new();
    for reference in &refs {
        if !seen.insert(reference.as_str()) {
            problems.push(format!("endpoint {reference} listed twice"));
        }
    }
    let priorities: Vec<&str> = story_table.cells("Priority").collect();
    let ids: Vec<&str> = story_table.cells("ID").collect();
    let mut p0 = 0;
    for (i, cell) in story_table.cells("Endpoints").enumerate() {
        if priorities.get(i) != Some(&"P0") {
            continue;
        }
        p0 += 1;
        let id = ids.get(i).copied().unwrap_or("?");
        let named: Vec<&str> = cell.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
        if named.is_empty() {
            problems.push(format!("{id} names no endpoint"));
        }
        for reference in named {
            if !refs.iter().any(|r| r == reference) {
                problems.push(format!("{id} references missing endpoint {reference}"));
            }
        }
    }
    if p0 == 0 {
        problems.push("no P0 stories".to_string());
    }

    let shared: BTreeSet<&str> = errors_section
        .table_with("Code")
        .map(|t| t.cells("Code").collect())
        .unwrap_or_default();
    if shared.is_empty() {
        problems.push("no shared error-code table".to_string());
    }
    if let Some(api) = doc.section(SectionId::ApiEndpoints).and_then(|s| s.table_with("Path")) {
        let rows = api.cells("Method").zip(api.cells("Path")).zip(api.cells("Errors"));
        for ((method, path), errors) in rows {
            for code in errors.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                if !shared.contains(code) {
                    problems.push(format!("{method} {path} uses unknown code {code}"));
                }
            }
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        fail(problems.join("; "), Criterion::StoryEndpointCoverage)
    }
}

// 6
fn payload_samples(doc: &Document) -> Outcome {
    let section = require(doc, SectionId::ApiEndpoints)?;
    let Some(refs) = endpoint_refs(doc) else {
        return fail("no endpoint table", Criterion::PayloadSamples);
    };
    let samples = section.titled_code("json");
    let missing: Vec<&String> = refs
        .iter()
        .filter(|r| {
            r.split_once(' ')
                .and_then(|(m, _)| Method::parse(m))
                .is_some_and(Method::has_body)
        })
        .filter(|r| !samples.iter().any(|(title, _)| *title == Some(r.as_str())))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        let list: Vec<&str> = missing.iter().map(|s| s.as_str()).collect();
        fail(format!("no JSON sample for {}", list.join(", ")), Criterion::PayloadSamples)
    }
}

// 7
fn rbac(doc: &Document, config: &ConfigProfile) -> Outcome {
    let section = require(doc, SectionId::AuthenticationAuthorization)?;
    let Some(table) = section.table_with("Role") else {
        return fail("no RBAC matrix", Criterion::RbacPopulated);
    };
    if table.rows.is_empty() {
        return fail("RBAC matrix has no roles", Criterion::RbacPopulated);
    }
    let mut problems = Vec::new();
    for entity in &config.entities {
        let name = table_name(&entity.name);
        if table.column(&name).is_none() {
            problems.push(format!("no column for {name}"));
        }
    }
    for row in &table.rows {
        let role = row.first().map_or("?", String::as_str);
        if row.len() < table.headers.len() || row.iter().any(|c| c.trim().is_empty()) {
            problems.push(format!("empty cell for {role}"));
        }
    }
    if problems.is_empty() {
        Ok(())
    } else {
        fail(problems.join("; "), Criterion::RbacPopulated)
    }
}

// 8
fn failure_table(doc: &Document) -> Outcome {
    let section = require(doc, SectionId::FailureModes)?;
    let rows = section.table_with("Failure").map_or(0, |t| t.rows.len());
    if rows >= MIN_FAILURE_ROWS {
        Ok(())
    } else {
        fail(
            format!("{rows} failure rows, need {MIN_FAILURE_ROWS}"),
            Criterion::FailureTable,
        )
    }
}

// 9
fn stack_justified(doc: &Document) -> Outcome {
    let section = require(doc, SectionId::TechStack)?;
    let Some(table) = section.table_with("Justification") else {
        return fail("no tech-stack table", Criterion::StackJustified);
    };
    let layers: Vec<&str> = table.cells("Layer").collect();
    let bare: Vec<&str> = table
        .cells("Justification")
        .enumerate()
        .filter(|(_, j)| j.trim().is_empty())
        .map(|(i, _)| layers.get(i).copied().unwrap_or("?"))
        .collect();
    if table.rows.is_empty() {
        fail("tech-stack table is empty", Criterion::StackJustified)
    } else if bare.is_empty() {
        Ok(())
    } else {
        fail(format!("unjustified: {}", bare.join(", ")), Criterion::StackJustified)
    }
}

// 10
fn assumptions_complete(doc: &Document, config: &ConfigProfile) -> Outcome {
    let section = require(doc, SectionId::Assumptions)?;
    let listed: Vec<(&str, &str)> = section
        .table_with("Assumed Value")
        .map(|t| t.cells("Category").zip(t.cells("Assumed Value")).collect())
        .unwrap_or_default();
    let missing: Vec<String> = config
        .choices()
        .into_iter()
        .filter(|(_, c)| c.origin != Origin::Explicit)
        .filter(|(cat, c)| !listed.iter().any(|(l, v)| *l == cat.label() && *v == c.value))
        .map(|(cat, c)| format!("{} = {}", cat.label(), c.value))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        fail(format!("not listed: {}", missing.join(", ")), Criterion::AssumptionsComplete)
    }
}
