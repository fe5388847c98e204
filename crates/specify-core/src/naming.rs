//! Naming-convention checks run over a rendered document.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::document::{Block, Document, SectionId};

static SNAKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9]*(_[a-z0-9]+)*$").expect("snake pattern is valid"));
static CAMEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-zA-Z0-9]*$").expect("camel pattern is valid"));
static KEBAB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9]*(-[a-z0-9]+)*$").expect("kebab pattern is valid"));
static PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\{[a-z][a-zA-Z0-9]*\}$").expect("param pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Table,
    Column,
    JsonField,
    PathSegment,
}

impl NameKind {
    fn expected(self) -> &'static str {
        match self {
            Self::Table | Self::Column => "snake_case",
            Self::JsonField => "camelCase",
            Self::PathSegment => "kebab-case or {param}",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingViolation {
    pub kind: NameKind,
    pub name: String,
    pub location: String,
}

impl std::fmt::Display for NamingViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "`{}` in {} is not {}",
            self.name,
            self.location,
            self.kind.expected()
        )
    }
}

pub fn is_snake_case(name: &str) -> bool {
    SNAKE.is_match(name)
}

pub fn is_camel_case(name: &str) -> bool {
    CAMEL.is_match(name)
}

pub fn is_path_segment(segment: &str) -> bool {
    KEBAB.is_match(segment) || PARAM.is_match(segment)
}

pub fn validate(doc: &Document) -> Vec<NamingViolation> {
    let mut out = Vec::new();

    if let Some(data) = doc.section(SectionId::DataModel) {
        for (title, table) in data.titled_tables() {
            if table.column("Column").is_none() {
                continue;
            }
            let name = title.unwrap_or_default();
            if !is_snake_case(name) {
                out.push(NamingViolation {
                    kind: NameKind::Table,
                    name: name.to_string(),
                    location: "Data Model".to_string(),
                });
            }
            for column in table.cells("Column").filter(|c| !is_snake_case(c)) {
                out.push(NamingViolation {
                    kind: NameKind::Column,
                    name: column.to_string(),
                    location: format!("table {name}"),
                });
            }
        }
    }

    if let Some(api) = doc.section(SectionId::ApiEndpoints) {
        if let Some(table) = api.table_with("Path") {
            for path in table.cells("Path") {
                for segment in path.split('/').filter(|s| !s.is_empty()) {
                    if !is_path_segment(segment) {
                        out.push(NamingViolation {
                            kind: NameKind::PathSegment,
                            name: segment.to_string(),
                            location: path.to_string(),
                        });
                    }
                }
            }
        }
    }

    for section in &doc.sections {
        for block in &section.blocks {
            let Block::Code { lang, body } = block else {
                continue;
            };
            if lang != "json" {
                continue;
            }
            match serde_json::from_str::<Value>(body) {
                Ok(value) => json_keys(&value, &section.heading, &mut out),
                Err(_) => out.push(NamingViolation {
                    kind: NameKind::JsonField,
                    name: "<unparseable JSON>".to_string(),
                    location: section.heading.clone(),
                }),
            }
        }
    }
    out
}

fn json_keys(value: &Value, location: &str, out: &mut Vec<NamingViolation>) {
    match value {
        Value::Object(map) => {
            for (key, inner) in map {
                if !is_camel_case(key) {
                    out.push(NamingViolation {
                        kind: NameKind::JsonField,
                        name: key.clone(),
                        location: location.to_string(),
                    });
                }
                json_keys(inner, location, out);
            }
        }
        Value::Array(items) => items.iter().for_each(|v| json_keys(v, location, out)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Section, Table};

    fn doc(blocks: Vec<(SectionId, Vec<Block>)>) -> Document {
        Document {
            title: "T".to_string(),
            sections: blocks.into_iter().map(|(id, b)| Section::new(id, b)).collect(),
        }
    }

    #[test]
    fn conventions() {
        assert!(is_snake_case("created_at"));
        assert!(!is_snake_case("createdAt"));
        assert!(is_camel_case("createdAt"));
        assert!(!is_camel_case("created_at"));
        assert!(is_path_segment("audit-events"));
        assert!(is_path_segment("{id}"));
        assert!(!is_path_segment("auditEvents"));
    }

    #[test]
    fn reports_each_offending_name() {
        let d = doc(vec![
            (
                SectionId::DataModel,
                vec![
                    Block::subheading("BlogPosts"),
                    Block::Table(Table::new(["Column", "Type", "Constraints"]).row(["authorId", "UUID", ""])),
                ],
            ),
            (
                SectionId::ApiEndpoints,
                vec![
                    Block::Table(Table::new(["Method", "Path"]).row(["GET", "/api/v1/blog_posts"])),
                    Block::code("json", r#"{"post_title": "x", "ok": [{"Nested": 1}]}"#),
                ],
            ),
        ]);
        let names: Vec<String> = validate(&d).into_iter().map(|v| v.name).collect();
        assert_eq!(names, vec!["BlogPosts", "authorId", "blog_posts", "Nested", "post_title"]);
    }

    #[test]
    fn clean_document_passes() {
        let d = doc(vec![(
            SectionId::DataModel,
            vec![
                Block::subheading("users"),
                Block::Table(Table::new(["Column", "Type", "Constraints"]).row(["created_at", "TIMESTAMPTZ", ""])),
            ],
        )]);
        assert!(validate(&d).is_empty());
    }
}
