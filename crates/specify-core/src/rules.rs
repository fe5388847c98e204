/// Backend Design Document contract. Single source of truth for MCP instructions and LLM prompts.
pub const RULES: &str = "\
1. Eleven sections, always, in this order: Executive Summary, Assumptions, User Stories, \
Tech Stack, System Architecture, Data Model, API Endpoints, Error Handling, \
Authentication & Authorization, Failure Modes & Resilience, Scalability Roadmap. A section \
that does not apply keeps its heading and states \
\"N/A for current scope — <reason>\".\n\
2. Size the architecture to the load. Tier 1 (under 1K users) and Tier 2 (1K-100K) are a \
modular monolith. Tier 3 (100K-1M) is service-oriented. Tier 4 (1M+) is event-driven microservices. \
Kubernetes, Kafka, service meshes and similar technology named below its minimum tier is deferred \
to the scalability roadmap, never adopted.\n\
3. Every stack choice carries a justification and a source: explicit (the user asked for it), \
inferred (from the domain or a keyword) or default (the built-in table). Every default appears in \
the Assumptions section.\n\
4. Naming: tables and columns are snake_case (plural tables), JSON fields are camelCase, URL path \
segments are kebab-case under /api/v1 with {id} parameters.\n\
5. Every data-model table lists columns with types and constraints and appears in the ER diagram. \
Foreign keys point at tables that exist.\n\
6. Every P0 user story maps to at least one endpoint. Every endpoint that takes or returns a body \
has a JSON request and response sample.\n\
7. Errors share one envelope { error: { code, message, details, requestId } }. Every error code an \
endpoint lists is defined in the error table.\n\
8. Authorization is role-based. The permission matrix covers every resource the API exposes.\n\
9. The failure modes table has at least five rows with detection and mitigation.\n\
10. Never invent requirements the description does not support. When something is unknown, \
apply a default and log it.";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::SectionId;

    #[test]
    fn names_every_section() {
        for id in SectionId::ALL {
            assert!(RULES.contains(id.title()), "missing {}", id.title());
        }
    }
}
