//! Backend design document model and its markdown codec.
//!
//! The assembler builds a [`Document`]; the checklist reads one back, either
//! straight from the assembler or parsed from a file on disk.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const TITLE_PREFIX: &str = "Backend Design Document: ";
pub const PLACEHOLDER_PREFIX: &str = "N/A for current scope — ";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("document has no `# {TITLE_PREFIX}<name>` title")]
    MissingTitle,
    #[error("code block opened on line {0} is never closed")]
    UnterminatedCode(usize),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SectionId {
    ExecutiveSummary,
    Assumptions,
    UserStories,
    TechStack,
    SystemArchitecture,
    DataModel,
    ApiEndpoints,
    ErrorHandling,
    AuthenticationAuthorization,
    FailureModes,
    ScalabilityRoadmap,
}

impl SectionId {
    pub const ALL: [SectionId; 11] = [
        Self::ExecutiveSummary,
        Self::Assumptions,
        Self::UserStories,
        Self::TechStack,
        Self::SystemArchitecture,
        Self::DataModel,
        Self::ApiEndpoints,
        Self::ErrorHandling,
        Self::AuthenticationAuthorization,
        Self::FailureModes,
        Self::ScalabilityRoadmap,
    ];

    pub fn number(self) -> usize {
        Self::ALL.iter().position(|s| *s == self).map_or(0, |i| i + 1)
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::ExecutiveSummary => "Executive Summary",
            Self::Assumptions => "Assumptions",
            Self::UserStories => "User Stories",
            Self::TechStack => "Tech Stack",
            Self::SystemArchitecture => "System Architecture",
            Self::DataModel => "Data Model",
            Self::ApiEndpoints => "API Endpoints",
            Self::ErrorHandling => "Error Handling",
            Self::AuthenticationAuthorization => "Authentication & Authorization",
            Self::FailureModes => "Failure Modes & Resilience",
            Self::ScalabilityRoadmap => "Scalability Roadmap",
        }
    }

    pub fn heading(self) -> String {
        format!("{}. {}", self.number(), self.title())
    }

    pub fn from_title(title: &str) -> Option<Self> {
        let title = title.trim();
        Self::ALL
            .into_iter()
            .find(|s| s.title().eq_ignore_ascii_case(title))
    }
}

impl std::fmt::Display for SectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<S: Into<String>>(headers: impl IntoIterator<Item = S>) -> Self {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn row<S: Into<String>>(mut self, cells: impl IntoIterator<Item = S>) -> Self {
        self.push(cells);
        self
    }

    pub fn push<S: Into<String>>(&mut self, cells: impl IntoIterator<Item = S>) {
        self.rows.push(cells.into_iter().map(Into::into).collect());
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.eq_ignore_ascii_case(name))
    }

    /// Cells of one column, empty strings where a row is short.
    pub fn cells<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> + 'a {
        let idx = self.column(name);
        self.rows
            .iter()
            .map(move |r| idx.and_then(|i| r.get(i)).map_or("", String::as_str))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph(String),
    Subheading(String),
    Table(Table),
    Code { lang: String, body: String },
    List(Vec<String>),
    Placeholder { reason: String },
}

impl Block {
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::Paragraph(text.into())
    }

    pub fn subheading(text: impl Into<String>) -> Self {
        Self::Subheading(text.into())
    }

    pub fn code(lang: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Code {
            lang: lang.into(),
            body: body.into(),
        }
    }

    pub fn placeholder(reason: impl Into<String>) -> Self {
        Self::Placeholder {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// `None` for headings that are not one of the eleven known sections.
    pub id: Option<SectionId>,
    pub heading: String,
    pub blocks: Vec<Block>,
}

impl Section {
    pub fn new(id: SectionId, blocks: Vec<Block>) -> Self {
        Self {
            id: Some(id),
            heading: id.heading(),
            blocks,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|b| match b {
            Block::Paragraph(t) | Block::Subheading(t) => t.trim().is_empty(),
            Block::Table(t) => t.headers.is_empty(),
            Block::Code { body, .. } => body.trim().is_empty(),
            Block::List(items) => items.is_empty(),
            Block::Placeholder { reason } => reason.trim().is_empty(),
        })
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.blocks.as_slice(), [Block::Placeholder { .. }])
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Table(t) => Some(t),
            _ => None,
        })
    }

    /// First table whose header row contains `column`.
    pub fn table_with(&self, column: &str) -> Option<&Table> {
        self.tables().find(|t| t.column(column).is_some())
    }

    /// Tables paired with the nearest preceding subheading.
    pub fn titled_tables(&self) -> Vec<(Option<&str>, &Table)> {
        let mut current = None;
        let mut out = Vec::new();
        for block in &self.blocks {
            match block {
                Block::Subheading(h) => current = Some(h.as_str()),
                Block::Table(t) => out.push((current, t)),
                _ => {}
            }
        }
        out
    }

    /// Code blocks paired with the nearest preceding subheading.
    pub fn titled_code(&self, lang: &str) -> Vec<(Option<&str>, &str)> {
        let mut current = None;
        let mut out = Vec::new();
        for block in &self.blocks {
            match block {
                Block::Subheading(h) => current = Some(h.as_str()),
                Block::Code { lang: l, body } if l == lang => out.push((current, body.as_str())),
                _ => {}
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub title: String,
    pub sections: Vec<Section>,
}

impl Document {
    pub fn section(&self, id: SectionId) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == Some(id))
    }

    /// Replace the section with the same id, or insert it in canonical order.
    pub fn put_section(&mut self, section: Section) {
        let Some(id) = section.id else {
            self.sections.push(section);
            return;
        };
        if let Some(slot) = self.sections.iter_mut().find(|s| s.id == Some(id)) {
            *slot = section;
            return;
        }
        let at = self
            .sections
            .iter()
            .position(|s| s.id.is_some_and(|other| other > id))
            .unwrap_or(self.sections.len());
        self.sections.insert(at, section);
    }

    pub fn to_markdown(&self) -> String {
        let mut out = format!("# {TITLE_PREFIX}{}\n", self.title);
        for section in &self.sections {
            out.push_str(&format!("\n## {}\n", section.heading));
            for block in &section.blocks {
                out.push('\n');
                render_block(&mut out, block);
            }
        }
        out
    }

    pub fn parse(markdown: &str) -> Result<Self, DocumentError> {
        Parser::default().run(markdown)
    }
}

fn escape_cell(cell: &str) -> String {
    cell.replace('|', "\\|")
}

fn render_row(out: &mut String, cells: &[String]) {
    out.push('|');
    for cell in cells {
        out.push(' ');
        out.push_str(&escape_cell(cell));
        out.push_str(" |");
    }
    out.push('\n');
}

fn render_block(out: &mut String, block: &Block) {
    match block {
        Block::Paragraph(text) => {
            out.push_str(text.trim_end());
            out.push('\n');
        }
        Block::Subheading(text) => {
            out.push_str("### ");
            out.push_str(text);
            out.push('\n');
        }
        Block::Table(table) => {
            render_row(out, &table.headers);
            let sep: Vec<String> = table.headers.iter().map(|_| "---".to_string()).collect();
            render_row(out, &sep);
            for row in &table.rows {
                render_row(out, row);
            }
        }
        Block::Code { lang, body } => {
            out.push_str("```");
            out.push_str(lang);
            out.push('\n');
            out.push_str(body.trim_end_matches('\n'));
            out.push_str("\n```\n");
        }
        Block::List(items) => {
            for item in items {
                out.push_str("- ");
                out.push_str(item);
                out.push('\n');
            }
        }
        Block::Placeholder { reason } => {
            out.push('_');
            out.push_str(PLACEHOLDER_PREFIX);
            out.push_str(reason);
            out.push_str("_\n");
        }
    }
}

// --- Parsing ---

fn split_row(line: &str) -> Vec<String> {
    let inner = line.trim().trim_start_matches('|');
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                current.push('|');
                chars.next();
            }
            '|' => cells.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    cells.push(current.trim().to_string());
    cells
}

fn is_separator(cells: &[String]) -> bool {
    !cells.is_empty()
        && cells
            .iter()
            .all(|c| !c.is_empty() && c.chars().all(|ch| matches!(ch, '-' | ':' | ' ')))
}

fn parse_placeholder(line: &str) -> Option<String> {
    let inner = line.strip_prefix('_')?.strip_suffix('_')?;
    inner
        .strip_prefix(PLACEHOLDER_PREFIX)
        .or_else(|| inner.strip_prefix("N/A for current scope - "))
        .map(|r| r.trim().to_string())
}

#[derive(Default)]
struct Parser {
    title: Option<String>,
    sections: Vec<Section>,
    paragraph: Vec<String>,
    list: Vec<String>,
    table: Option<Table>,
}

impl Parser {
    fn push_block(&mut self, block: Block) {
        if let Some(section) = self.sections.last_mut() {
            section.blocks.push(block);
        }
    }

    fn flush(&mut self) {
        if !self.paragraph.is_empty() {
            let text = std::mem::take(&mut self.paragraph).join("\n");
            self.push_block(Block::Paragraph(text));
        }
        if !self.list.is_empty() {
            let items = std::mem::take(&mut self.list);
            self.push_block(Block::List(items));
        }
        if let Some(table) = self.table.take() {
            self.push_block(Block::Table(table));
        }
    }

    fn run(mut self, markdown: &str) -> Result<Document, DocumentError> {
        let mut lines = markdown.lines().enumerate();
        while let Some((idx, raw)) = lines.next() {
            let line = raw.trim_end();

            if let Some(fence) = line.trim_start().strip_prefix("```") {
                self.flush();
                let lang = fence.trim().to_string();
                let mut body = Vec::new();
                let mut closed = false;
                for (_, code_line) in lines.by_ref() {
                    if code_line.trim_start().starts_with("```") {
                        closed = true;
                        break;
                    }
                    body.push(code_line);
                }
                if !closed {
                    return Err(DocumentError::UnterminatedCode(idx + 1));
                }
                self.push_block(Block::Code {
                    lang,
                    body: body.join("\n"),
                });
                continue;
            }

            if line.trim().is_empty() {
                self.flush();
                continue;
            }

            if let Some(h) = line.strip_prefix("### ") {
                self.flush();
                self.push_block(Block::Subheading(h.trim().to_string()));
            } else if let Some(h) = line.strip_prefix("## ") {
                self.flush();
                let heading = h.trim().to_string();
                let title = heading
                    .split_once(". ")
                    .filter(|(n, _)| n.chars().all(|c| c.is_ascii_digit()))
                    .map_or(heading.as_str(), |(_, t)| t);
                self.sections.push(Section {
                    id: SectionId::from_title(title),
                    heading,
                    blocks: Vec::new(),
                });
            } else if let Some(h) = line.strip_prefix("# ") {
                self.flush();
                let h = h.trim();
                self.title = Some(h.strip_prefix(TITLE_PREFIX).unwrap_or(h).to_string());
            } else if line.trim_start().starts_with('|') {
                if !self.paragraph.is_empty() || !self.list.is_empty() {
                    self.flush();
                }
                let cells = split_row(line);
                match self.table.as_mut() {
                    None => self.table = Some(Table::new(cells)),
                    Some(t) if t.rows.is_empty() && is_separator(&cells) => {}
                    Some(t) => t.rows.push(cells),
                }
            } else if let Some(item) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
                if !self.paragraph.is_empty() || self.table.is_some() {
                    self.flush();
                }
                self.list.push(item.trim().to_string());
            } else if let Some(reason) = parse_placeholder(line.trim()) {
                self.flush();
                self.push_block(Block::Placeholder { reason });
            } else {
                if !self.list.is_empty() || self.table.is_some() {
                    self.flush();
                }
                self.paragraph.push(line.to_string());
            }
        }
        self.flush();

        let title = self.title.ok_or(DocumentError::MissingTitle)?;
        Ok(Document {
            title,
            sections: self.sections,
        })
    }
}
