use specify_core::checklist::ValidationChecklist;
use specify_core::document::{Block, Document, SectionId};
use specify_core::gate::CLARIFICATION_QUESTIONS;
use specify_core::pipeline::{Generation, Outcome, Pipeline, RunOptions};
use specify_core::{ArchitectureStyle, Domain, InputProfile, KeywordExtractor, ThroughputTier};

fn generate(profile: &InputProfile) -> Generation {
    match Pipeline::default().run(profile, RunOptions::default()).unwrap() {
        Outcome::Complete(generation) => generation,
        Outcome::NeedsClarification { questions } => panic!("unexpected questions: {questions:?}"),
        Outcome::Rejected { report, .. } => {
            let failures: Vec<_> = report.failures().map(|r| r.detail.clone()).collect();
            panic!("document rejected: {failures:?}")
        }
    }
}

fn from_text(text: &str) -> Generation {
    generate(&KeywordExtractor.profile(text))
}

fn section_text(doc: &Document, id: SectionId) -> String {
    let section = doc.section(id).expect("section present");
    let mut out = String::new();
    for block in &section.blocks {
        match block {
            Block::Table(t) => t.rows.iter().flatten().for_each(|c| {
                out.push_str(c);
                out.push('\n');
            }),
            Block::Paragraph(p) | Block::Subheading(p) => out.push_str(p),
            Block::Code { body, .. } => out.push_str(body),
            Block::List(items) => items.iter().for_each(|i| out.push_str(i)),
            Block::Placeholder { reason } => out.push_str(reason),
        }
        out.push('\n');
    }
    out
}

#[test]
fn small_blog_defers_heavyweight_technology() {
    let generation = from_text("A personal blog with 50 readers. Use Kubernetes, Kafka and microservices.");
    let config = &generation.record.config;

    assert_eq!(config.tier, ThroughputTier::Tier1);
    assert_eq!(config.style, ArchitectureStyle::ModularMonolith);
    assert!(config.stack.messaging.is_none());

    let deferred: Vec<&str> = config.deferred.iter().map(|d| d.technology.as_str()).collect();
    assert!(deferred.contains(&"Apache Kafka"));
    assert!(deferred.contains(&"Microservices"));
    assert!(deferred.iter().any(|d| d.starts_with("Kubernetes")));

    let roadmap = section_text(&generation.document, SectionId::ScalabilityRoadmap);
    assert!(roadmap.contains("Apache Kafka"));
    assert!(roadmap.contains("Microservices"));
    let stack = section_text(&generation.document, SectionId::TechStack);
    assert!(!stack.contains("Apache Kafka"));
}

#[test]
fn thin_description_asks_the_three_questions() {
    let profile = KeywordExtractor.profile("I want to build an app");
    let outcome = Pipeline::default().run(&profile, RunOptions::default()).unwrap();
    let Outcome::NeedsClarification { questions } = outcome else {
        panic!("expected clarification");
    };
    assert_eq!(questions, CLARIFICATION_QUESTIONS.map(String::from).to_vec());
}

#[test]
fn domain_drives_the_database_default() {
    let fintech = generate(&InputProfile::new("payments").with_domain(Domain::Fintech));
    assert_eq!(fintech.record.config.stack.database.value, "PostgreSQL");
    assert!(fintech.record.config.sensitive_data);

    let social = generate(&InputProfile::new("community").with_domain(Domain::Social));
    assert_eq!(social.record.config.stack.database.value, "MongoDB");
    let content = generate(&InputProfile::new("magazine").with_domain(Domain::Content));
    assert_eq!(content.record.config.stack.database.value, "MongoDB");
}

#[test]
fn every_domain_yields_eleven_sections() {
    for domain in Domain::ALL {
        let generation = generate(&InputProfile::new(domain.label()).with_domain(domain));
        let ids: Vec<SectionId> = generation.document.sections.iter().filter_map(|s| s.id).collect();
        assert_eq!(ids, SectionId::ALL.to_vec(), "{domain:?}");
        assert!(generation.report.passed(), "{domain:?}");
        assert_eq!(generation.rounds, 0);
    }
}

#[test]
fn million_user_marketplace_goes_event_driven() {
    let generation =
        from_text("An online marketplace where merchants sell products to 5 million users with live chat.");
    let config = &generation.record.config;
    assert_eq!(config.tier, ThroughputTier::Tier4);
    assert_eq!(config.style, ArchitectureStyle::EventDrivenMicroservices);
    assert!(config.real_time);
    assert!(config.deferred.is_empty());
}

#[test]
fn written_markdown_still_validates() {
    let generation = from_text("A clinic app where patients book appointments, about 20k users.");
    let markdown = generation.markdown();

    let parsed = Document::parse(&markdown).unwrap();
    assert_eq!(parsed.title, generation.record.config.project_name);
    assert_eq!(parsed.to_markdown(), markdown);
    assert!(ValidationChecklist::run(&parsed, &generation.record.config).passed());
}

#[test]
fn tampered_markdown_fails_validation() {
    let generation = from_text("A task tracker for small teams to manage projects.");
    let markdown = generation
        .markdown()
        .replace("## 9. Authentication & Authorization", "## 9. Security Notes");
    let parsed = Document::parse(&markdown).unwrap();
    let report = ValidationChecklist::run(&parsed, &generation.record.config);
    assert!(!report.passed());
    assert!(report
        .failing_sections()
        .contains(&SectionId::AuthenticationAuthorization));
}

#[test]
fn colliding_entity_names_render_once() {
    let generation = generate(
        &InputProfile::new("shop")
            .with_domain(Domain::Ecommerce)
            .with_entity("Users")
            .with_entity("Order")
            .with_entity("Orders"),
    );
    let markdown = generation.markdown();
    assert_eq!(markdown.matches("### users\n").count(), 1);
    assert_eq!(markdown.matches("### orders\n").count(), 1);
    assert!(markdown.contains("Create an order"));
    assert!(!markdown.contains("Create a orders"));

    let api = generation.document.section(SectionId::ApiEndpoints).unwrap();
    let table = api.table_with("Path").unwrap();
    let refs: Vec<String> = table
        .cells("Method")
        .zip(table.cells("Path"))
        .map(|(m, p)| format!("{m} {p}"))
        .collect();
    let mut unique = refs.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), refs.len());
}

#[test]
fn accented_entity_names_still_generate() {
    let generation = generate(
        &InputProfile::new("a menu app")
            .with_primary_action("browse menus")
            .with_entity("Café"),
    );
    let data = section_text(&generation.document, SectionId::DataModel);
    assert!(data.contains("cafes"));
    assert!(!data.contains("cafés"));
}

#[test]
fn inflected_domain_keywords_are_recognized() {
    let generation = from_text("A blogging platform for writers");
    let config = &generation.record.config;
    assert_eq!(config.domain, Some(Domain::Content));
    assert_eq!(config.stack.database.value, "MongoDB");
}
