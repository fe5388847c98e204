//! The facts every section renders from: tables, endpoints, stories, roles and
//! error codes, all derived from one [`ConfigProfile`].

use serde_json::{json, Map, Value};

use crate::defaults::{ConfigProfile, EntityDef, AUDIT_ENTITY, USER_ENTITY};
use crate::profile::Domain;
use crate::text::{pluralize, to_camel_case, to_kebab_case, to_snake_case, with_article};

pub const API_PREFIX: &str = "/api/v1";

// --- Error codes ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode {
    pub code: &'static str,
    pub status: u16,
    pub meaning: &'static str,
    pub client_action: &'static str,
}

pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
pub const FORBIDDEN: &str = "FORBIDDEN";
pub const NOT_FOUND: &str = "NOT_FOUND";
pub const CONFLICT: &str = "CONFLICT";
pub const RATE_LIMITED: &str = "RATE_LIMITED";
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
pub const SERVICE_UNAVAILABLE: &str = "SERVICE_UNAVAILABLE";
pub const PAYMENT_DECLINED: &str = "PAYMENT_DECLINED";

const BASE_ERROR_CODES: &[ErrorCode] = &[
    ErrorCode {
        code: VALIDATION_FAILED,
        status: 400,
        meaning: "Request body or parameters failed validation",
        client_action: "Fix the fields listed in `details` and resend",
    },
    ErrorCode {
        code: UNAUTHORIZED,
        status: 401,
        meaning: "Missing, expired or invalid access token",
        client_action: "Refresh the token or sign in again",
    },
    ErrorCode {
        code: FORBIDDEN,
        status: 403,
        meaning: "Authenticated but not allowed to act on this resource",
        client_action: "Do not retry; request access",
    },
    ErrorCode {
        code: NOT_FOUND,
        status: 404,
        meaning: "Resource does not exist or is not visible to the caller",
        client_action: "Do not retry",
    },
    ErrorCode {
        code: CONFLICT,
        status: 409,
        meaning: "Unique constraint or version conflict",
        client_action: "Reload the resource and retry the change",
    },
    ErrorCode {
        code: RATE_LIMITED,
        status: 429,
        meaning: "Too many requests for this client",
        client_action: "Back off for the `Retry-After` interval",
    },
    ErrorCode {
        code: INTERNAL_ERROR,
        status: 500,
        meaning: "Unexpected server failure",
        client_action: "Retry with exponential backoff; report the `requestId`",
    },
    ErrorCode {
        code: SERVICE_UNAVAILABLE,
        status: 503,
        meaning: "A dependency is down or the service is shedding load",
        client_action: "Retry with exponential backoff",
    },
];

const PAYMENT_ERROR: ErrorCode = ErrorCode {
    code: PAYMENT_DECLINED,
    status: 402,
    meaning: "The payment provider declined the charge",
    client_action: "Ask the user for another payment method",
};

/// Payments show up as an entity or are implied by the domain.
pub fn payments_enabled(config: &ConfigProfile) -> bool {
    config.has_entity("Payment")
        || config.has_entity("Transaction")
        || matches!(config.domain, Some(Domain::Fintech | Domain::Ecommerce))
}

/// The shared error-code table; endpoint rows may only reference these.
pub fn error_codes(config: &ConfigProfile) -> Vec<ErrorCode> {
    let mut codes = BASE_ERROR_CODES.to_vec();
    if payments_enabled(config) {
        codes.insert(2, PAYMENT_ERROR);
    }
    codes
}

// --- Schema ---

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub sql_type: &'static str,
    pub constraints: String,
    pub sample: Value,
    /// Never exposed in API payloads.
    pub internal: bool,
    /// Filled by the server, not accepted in request bodies.
    pub server_set: bool,
    pub references: Option<String>,
}

fn col(name: &str, sql_type: &'static str, constraints: &str, sample: Value) -> Column {
    Column {
        name: name.to_string(),
        sql_type,
        constraints: constraints.to_string(),
        sample,
        internal: false,
        server_set: false,
        references: None,
    }
}

const SAMPLE_ID: &str = "7c9e6679-7425-40de-944b-e07fc1f90ae7";
const SAMPLE_REF: &str = "9b2f1c4e-3a8d-4f6b-8e21-5d7a0c3b6f94";
const SAMPLE_TIME: &str = "2025-01-15T09:30:00Z";

fn fk(name: &str, table: &str, nullable: bool) -> Column {
    let constraints = if nullable {
        format!("NULL REFERENCES {table}(id) ON DELETE SET NULL")
    } else {
        format!("NOT NULL REFERENCES {table}(id) ON DELETE CASCADE")
    };
    Column {
        references: Some(table.to_string()),
        ..col(name, "UUID", &constraints, json!(SAMPLE_REF))
    }
}

/// Foreign key to the caller's own user row, taken from the access token.
fn owner(name: &str) -> Column {
    Column {
        server_set: true,
        ..fk(name, "users", false)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableSpec {
    pub entity: String,
    pub table: String,
    pub resource: String,
    pub columns: Vec<Column>,
    pub read_only: bool,
}

impl TableSpec {
    fn new(entity: &EntityDef, domain_columns: Vec<Column>) -> Self {
        let table = table_name(&entity.name);
        let mut columns = vec![Column {
            server_set: true,
            ..col("id", "UUID", "PRIMARY KEY DEFAULT gen_random_uuid()", json!(SAMPLE_ID))
        }];
        columns.extend(domain_columns);
        for stamp in ["created_at", "updated_at"] {
            columns.push(Column {
                server_set: true,
                ..col(stamp, "TIMESTAMPTZ", "NOT NULL DEFAULT now()", json!(SAMPLE_TIME))
            });
        }
        Self {
            entity: entity.name.clone(),
            resource: to_kebab_case(&pluralize(&entity.name)),
            table,
            columns,
            read_only: entity.read_only,
        }
    }

    pub fn collection_path(&self) -> String {
        format!("{API_PREFIX}/{}", self.resource)
    }

    pub fn item_path(&self) -> String {
        format!("{API_PREFIX}/{}/{{id}}", self.resource)
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns
            .iter()
            .filter_map(|c| c.references.as_deref().map(|t| (c.name.as_str(), t)))
    }

    /// Response representation: every non-internal column, camelCase keys.
    pub fn representation(&self) -> Value {
        let mut map = Map::new();
        for c in self.columns.iter().filter(|c| !c.internal) {
            map.insert(to_camel_case(&c.name), c.sample.clone());
        }
        Value::Object(map)
    }

    /// Request body for create and update: client-writable columns only.
    pub fn writable(&self) -> Value {
        let mut map = Map::new();
        for c in self.columns.iter().filter(|c| !c.internal && !c.server_set) {
            map.insert(to_camel_case(&c.name), c.sample.clone());
        }
        Value::Object(map)
    }
}

pub fn table_name(entity: &str) -> String {
    to_snake_case(&pluralize(entity))
}

/// Entity-specific columns; parents that are not in the model fall back to the owner.
fn domain_columns(entity: &str, has: &dyn Fn(&str) -> bool) -> Vec<Column> {
    let parent = |column: &str, parent: &str, fallback: &str| -> Column {
        if has(parent) {
            fk(column, &table_name(parent), false)
        } else {
            owner(fallback)
        }
    };
    match entity {
        USER_ENTITY => vec![
            col("email", "TEXT", "NOT NULL UNIQUE", json!("ada@example.com")),
            Column {
                internal: true,
                ..col("password_hash", "TEXT", "NOT NULL", json!(null))
            },
            col("display_name", "TEXT", "NOT NULL", json!("Ada Lovelace")),
            Column {
                server_set: true,
                ..col("role", "TEXT", "NOT NULL DEFAULT 'member'", json!("member"))
            },
        ],
        AUDIT_ENTITY => vec![
            Column {
                server_set: true,
                ..fk("actor_id", "users", true)
            },
            col("action", "TEXT", "NOT NULL", json!("record.updated")),
            col("resource_type", "TEXT", "NOT NULL", json!("users")),
            col("resource_id", "UUID", "NOT NULL", json!(SAMPLE_REF)),
            col("ip_address", "INET", "NULL", json!("203.0.113.7")),
        ],
        "Post" | "Article" => vec![
            owner("author_id"),
            col("title", "TEXT", "NOT NULL", json!("Shipping our first release")),
            col("body", "TEXT", "NOT NULL", json!("Long-form markdown content")),
            col("status", "TEXT", "NOT NULL DEFAULT 'draft'", json!("draft")),
            col("published_at", "TIMESTAMPTZ", "NULL", json!(null)),
        ],
        "Comment" => {
            let mut cols = vec![owner("author_id")];
            if has("Post") {
                cols.push(fk("post_id", "posts", false));
            }
            cols.push(col("body", "TEXT", "NOT NULL", json!("Great write-up!")));
            cols
        }
        "Product" => vec![
            col("name", "TEXT", "NOT NULL", json!("Trail Runner 2")),
            col("description", "TEXT", "NULL", json!("Lightweight running shoe")),
            col("price_cents", "BIGINT", "NOT NULL CHECK (price_cents >= 0)", json!(12900)),
            col("currency", "CHAR(3)", "NOT NULL", json!("USD")),
            col("stock", "INTEGER", "NOT NULL DEFAULT 0", json!(42)),
        ],
        "Order" => vec![
            owner("customer_id"),
            col("status", "TEXT", "NOT NULL DEFAULT 'pending'", json!("pending")),
            col("total_cents", "BIGINT", "NOT NULL CHECK (total_cents >= 0)", json!(25800)),
            col("currency", "CHAR(3)", "NOT NULL", json!("USD")),
        ],
        "Payment" => vec![
            parent("order_id", "Order", "payer_id"),
            col("amount_cents", "BIGINT", "NOT NULL CHECK (amount_cents > 0)", json!(25800)),
            col("currency", "CHAR(3)", "NOT NULL", json!("USD")),
            Column {
                server_set: true,
                ..col("status", "TEXT", "NOT NULL DEFAULT 'pending'", json!("pending"))
            },
            Column {
                server_set: true,
                ..col("provider_reference", "TEXT", "NULL UNIQUE", json!(null))
            },
        ],
        "Account" => vec![
            owner("owner_id"),
            col("name", "TEXT", "NOT NULL", json!("Everyday checking")),
            col("currency", "CHAR(3)", "NOT NULL", json!("USD")),
            Column {
                server_set: true,
                ..col("balance_cents", "BIGINT", "NOT NULL DEFAULT 0", json!(0))
            },
        ],
        "Transaction" => vec![
            parent("account_id", "Account", "owner_id"),
            col("amount_cents", "BIGINT", "NOT NULL", json!(-4599)),
            col("currency", "CHAR(3)", "NOT NULL", json!("USD")),
            col("description", "TEXT", "NULL", json!("Groceries")),
            col("occurred_at", "TIMESTAMPTZ", "NOT NULL", json!(SAMPLE_TIME)),
        ],
        "Patient" => vec![
            Column {
                constraints: "NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE".to_string(),
                ..owner("user_id")
            },
            col("date_of_birth", "DATE", "NOT NULL", json!("1985-04-12")),
            Column {
                server_set: true,
                ..col("medical_record_number", "TEXT", "NOT NULL UNIQUE", json!("MRN-004211"))
            },
        ],
        "Appointment" => vec![
            parent("patient_id", "Patient", "user_id"),
            fk("clinician_id", "users", false),
            col("scheduled_at", "TIMESTAMPTZ", "NOT NULL", json!(SAMPLE_TIME)),
            col("status", "TEXT", "NOT NULL DEFAULT 'booked'", json!("booked")),
            col("notes", "TEXT", "NULL", json!(null)),
        ],
        "Device" => vec![
            owner("owner_id"),
            col("serial_number", "TEXT", "NOT NULL UNIQUE", json!("SN-88213")),
            col("name", "TEXT", "NOT NULL", json!("Greenhouse sensor")),
            col("firmware_version", "TEXT", "NULL", json!("1.4.2")),
            Column {
                server_set: true,
                ..col("last_seen_at", "TIMESTAMPTZ", "NULL", json!(null))
            },
        ],
        "Reading" => vec![
            parent("device_id", "Device", "owner_id"),
            col("metric", "TEXT", "NOT NULL", json!("temperature_c")),
            col("value", "DOUBLE PRECISION", "NOT NULL", json!(21.5)),
            col("recorded_at", "TIMESTAMPTZ", "NOT NULL", json!(SAMPLE_TIME)),
        ],
        "Project" => vec![
            owner("owner_id"),
            col("name", "TEXT", "NOT NULL", json!("Website relaunch")),
            col("description", "TEXT", "NULL", json!(null)),
        ],
        "Task" => vec![
            parent("project_id", "Project", "owner_id"),
            fk("assignee_id", "users", true),
            col("title", "TEXT", "NOT NULL", json!("Draft landing copy")),
            col("status", "TEXT", "NOT NULL DEFAULT 'todo'", json!("todo")),
            col("due_date", "DATE", "NULL", json!("2025-02-01")),
        ],
        "Course" => vec![
            owner("instructor_id"),
            col("title", "TEXT", "NOT NULL", json!("Intro to Statistics")),
            col("description", "TEXT", "NULL", json!(null)),
        ],
        "Lesson" => vec![
            parent("course_id", "Course", "author_id"),
            col("title", "TEXT", "NOT NULL", json!("Sampling")),
            col("position", "INTEGER", "NOT NULL", json!(1)),
            col("content", "TEXT", "NOT NULL", json!("Lesson body")),
        ],
        "Shipment" => vec![
            owner("sender_id"),
            Column {
                server_set: true,
                ..col("tracking_number", "TEXT", "NOT NULL UNIQUE", json!("TRK-55120"))
            },
            col("origin", "TEXT", "NOT NULL", json!("Rotterdam")),
            col("destination", "TEXT", "NOT NULL", json!("Berlin")),
            col("status", "TEXT", "NOT NULL DEFAULT 'created'", json!("created")),
        ],
        "Vehicle" => vec![
            col("plate_number", "TEXT", "NOT NULL UNIQUE", json!("B-XY 1234")),
            col("capacity_kg", "INTEGER", "NOT NULL", json!(3500)),
        ],
        "Match" => vec![
            col("mode", "TEXT", "NOT NULL", json!("ranked")),
            col("started_at", "TIMESTAMPTZ", "NULL", json!(null)),
            col("ended_at", "TIMESTAMPTZ", "NULL", json!(null)),
        ],
        "Score" => {
            let mut cols = vec![owner("player_id")];
            if has("Match") {
                cols.push(fk("match_id", "matches", false));
            }
            cols.push(col("points", "INTEGER", "NOT NULL", json!(1200)));
            cols
        }
        "Message" => vec![
            owner("sender_id"),
            fk("recipient_id", "users", false),
            col("body", "TEXT", "NOT NULL", json!("See you at 6?")),
            Column {
                server_set: true,
                ..col("read_at", "TIMESTAMPTZ", "NULL", json!(null))
            },
        ],
        "Review" => vec![
            owner("author_id"),
            col("rating", "SMALLINT", "NOT NULL CHECK (rating BETWEEN 1 AND 5)", json!(5)),
            col("body", "TEXT", "NULL", json!("Would order again")),
        ],
        _ => vec![
            owner("owner_id"),
            col("name", "TEXT", "NOT NULL", json!("Example")),
            col("description", "TEXT", "NULL", json!(null)),
        ],
    }
}

/// Resources guests may read without signing in.
const PUBLIC_ENTITIES: &[&str] = &["Post", "Article", "Comment", "Product", "Course", "Review", "Listing"];

pub fn is_public(entity: &str) -> bool {
    PUBLIC_ENTITIES.contains(&entity)
}

// --- Endpoints ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "PATCH" => Some(Self::Patch),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn has_body(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub method: Method,
    pub path: String,
    pub summary: String,
    pub access: String,
    pub success: u16,
    pub errors: Vec<&'static str>,
    pub request: Option<Value>,
    pub response: Option<Value>,
}

impl Endpoint {
    /// "METHOD /path", the form stories use to reference endpoints.
    pub fn reference(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

// --- Stories ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    P0,
    P1,
    P2,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::P0 => "P0",
            Self::P1 => "P1",
            Self::P2 => "P2",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Story {
    pub priority: Priority,
    pub text: String,
    pub endpoints: Vec<String>,
}

// --- Roles ---

pub const ROLE_ADMIN: &str = "Admin";
pub const ROLE_MEMBER: &str = "Member";
pub const ROLE_GUEST: &str = "Guest";
pub const ROLE_AUDITOR: &str = "Auditor";

#[derive(Debug, Clone, PartialEq)]
pub struct Blueprint {
    pub tables: Vec<TableSpec>,
    pub endpoints: Vec<Endpoint>,
    pub stories: Vec<Story>,
    pub roles: Vec<&'static str>,
    pub errors: Vec<ErrorCode>,
}

impl Blueprint {
    pub fn new(config: &ConfigProfile) -> Self {
        let has = |name: &str| config.has_entity(name);
        let tables: Vec<TableSpec> = config
            .entities
            .iter()
            .map(|e| TableSpec::new(e, domain_columns(&e.name, &has)))
            .collect();

        let mut roles = vec![ROLE_ADMIN, ROLE_MEMBER, ROLE_GUEST];
        if config.sensitive_data {
            roles.push(ROLE_AUDITOR);
        }

        let mut bp = Self {
            tables,
            endpoints: Vec::new(),
            stories: Vec::new(),
            roles,
            errors: error_codes(config),
        };
        bp.build_endpoints(config);
        bp
    }

    pub fn table(&self, entity: &str) -> Option<&TableSpec> {
        self.tables.iter().find(|t| t.entity == entity)
    }

    pub fn endpoint(&self, reference: &str) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.reference() == reference)
    }

    fn push(&mut self, endpoint: Endpoint) -> String {
        let reference = endpoint.reference();
        self.endpoints.push(endpoint);
        reference
    }

    fn story(&mut self, priority: Priority, text: String, endpoints: Vec<String>) {
        self.stories.push(Story {
            priority,
            text,
            endpoints,
        });
    }

    fn build_endpoints(&mut self, config: &ConfigProfile) {
        let name = config.project_name.clone();
        let user = self.table(USER_ENTITY).cloned();
        let me = user.as_ref().map_or(Value::Null, TableSpec::representation);

        let register = self.push(Endpoint {
            method: Method::Post,
            path: format!("{API_PREFIX}/auth/register"),
            summary: "Create an account".to_string(),
            access: "Public".to_string(),
            success: 201,
            errors: vec![VALIDATION_FAILED, CONFLICT, RATE_LIMITED, INTERNAL_ERROR],
            request: Some(json!({
                "email": "ada@example.com",
                "password": "correct-horse-battery-staple",
                "displayName": "Ada Lovelace"
            })),
            response: Some(me.clone()),
        });
        let login = self.push(Endpoint {
            method: Method::Post,
            path: format!("{API_PREFIX}/auth/login"),
            summary: "Exchange credentials for tokens".to_string(),
            access: "Public".to_string(),
            success: 200,
            errors: vec![VALIDATION_FAILED, UNAUTHORIZED, RATE_LIMITED, INTERNAL_ERROR],
            request: Some(json!({ "email": "ada@example.com", "password": "correct-horse-battery-staple" })),
            response: Some(json!({
                "accessToken": "eyJhbGciOiJSUzI1NiJ9...",
                "refreshToken": "def50200a1...",
                "expiresIn": 900
            })),
        });
        let refresh = self.push(Endpoint {
            method: Method::Post,
            path: format!("{API_PREFIX}/auth/refresh"),
            summary: "Rotate the refresh token".to_string(),
            access: "Public".to_string(),
            success: 200,
            errors: vec![VALIDATION_FAILED, UNAUTHORIZED, RATE_LIMITED, INTERNAL_ERROR],
            request: Some(json!({ "refreshToken": "def50200a1..." })),
            response: Some(json!({
                "accessToken": "eyJhbGciOiJSUzI1NiJ9...",
                "refreshToken": "def50200b7...",
                "expiresIn": 900
            })),
        });
        self.story(
            Priority::P0,
            format!("As a visitor, I want to create an account so that I can use {name}"),
            vec![register],
        );
        self.story(
            Priority::P0,
            "As a user, I want to sign in so that my data is private to me".to_string(),
            vec![login],
        );
        self.story(
            Priority::P1,
            "As a user, I want to stay signed in without re-entering my password".to_string(),
            vec![refresh],
        );

        let get_me = self.push(Endpoint {
            method: Method::Get,
            path: format!("{API_PREFIX}/users/me"),
            summary: "Current user's profile".to_string(),
            access: "Member, Admin".to_string(),
            success: 200,
            errors: vec![UNAUTHORIZED, RATE_LIMITED, INTERNAL_ERROR],
            request: None,
            response: Some(me.clone()),
        });
        let patch_me = self.push(Endpoint {
            method: Method::Patch,
            path: format!("{API_PREFIX}/users/me"),
            summary: "Update the current user's profile".to_string(),
            access: "Member, Admin".to_string(),
            success: 200,
            errors: vec![VALIDATION_FAILED, UNAUTHORIZED, CONFLICT, RATE_LIMITED, INTERNAL_ERROR],
            request: Some(json!({ "displayName": "Ada King" })),
            response: Some(me),
        });
        self.story(
            Priority::P1,
            "As a user, I want to view and edit my profile".to_string(),
            vec![get_me, patch_me],
        );

        let payments = payments_enabled(config);
        let managed: Vec<TableSpec> = self
            .tables
            .iter()
            .filter(|t| t.entity != USER_ENTITY && !t.read_only)
            .cloned()
            .collect();
        for (idx, table) in managed.iter().enumerate() {
            self.resource_endpoints(config, table, idx == 0, payments);
        }

        if config.real_time {
            let channel = self.push(Endpoint {
                method: Method::Get,
                path: format!("{API_PREFIX}/realtime"),
                summary: "Upgrade to a WebSocket for live events".to_string(),
                access: "Member, Admin".to_string(),
                success: 101,
                errors: vec![UNAUTHORIZED, RATE_LIMITED, SERVICE_UNAVAILABLE],
                request: None,
                response: None,
            });
            self.story(
                Priority::P1,
                "As a user, I want changes from others to appear without refreshing".to_string(),
                vec![channel],
            );
        }

        if let Some(audit) = self.table(AUDIT_ENTITY).cloned() {
            let list = self.push(Endpoint {
                method: Method::Get,
                path: audit.collection_path(),
                summary: "Search the access trail".to_string(),
                access: "Auditor, Admin".to_string(),
                success: 200,
                errors: vec![UNAUTHORIZED, FORBIDDEN, RATE_LIMITED, INTERNAL_ERROR],
                request: None,
                response: Some(json!({ "data": [audit.representation()], "nextCursor": null })),
            });
            self.story(
                Priority::P1,
                "As an auditor, I want to see who accessed or changed sensitive records".to_string(),
                vec![list],
            );
        }

        let users = self.push(Endpoint {
            method: Method::Get,
            path: format!("{API_PREFIX}/users"),
            summary: "List users".to_string(),
            access: "Admin".to_string(),
            success: 200,
            errors: vec![UNAUTHORIZED, FORBIDDEN, RATE_LIMITED, INTERNAL_ERROR],
            request: None,
            response: None,
        });
        self.story(
            Priority::P2,
            "As an admin, I want to list users so that I can handle support requests".to_string(),
            vec![users],
        );
    }

    fn resource_endpoints(&mut self, config: &ConfigProfile, table: &TableSpec, primary: bool, payments: bool) {
        let singular = to_snake_case(&table.entity).replace('_', " ");
        let plural = pluralize(&singular);
        let public = is_public(&table.entity);
        let read_access = if public { "Public" } else { "Member, Admin" };
        let charge = payments && matches!(table.entity.as_str(), "Payment" | "Order" | "Transaction");
        let item = table.representation();

        let list = self.push(Endpoint {
            method: Method::Get,
            path: table.collection_path(),
            summary: format!("List {plural} (cursor paginated)"),
            access: read_access.to_string(),
            success: 200,
            errors: vec![VALIDATION_FAILED, UNAUTHORIZED, RATE_LIMITED, INTERNAL_ERROR],
            request: None,
            response: Some(json!({ "data": [item.clone()], "nextCursor": null })),
        });
        let mut create_errors = vec![VALIDATION_FAILED, UNAUTHORIZED, FORBIDDEN, CONFLICT];
        if charge {
            create_errors.push(PAYMENT_DECLINED);
        }
        create_errors.extend([RATE_LIMITED, INTERNAL_ERROR]);
        let create = self.push(Endpoint {
            method: Method::Post,
            path: table.collection_path(),
            summary: format!("Create {}", with_article(&singular)),
            access: "Member, Admin".to_string(),
            success: 201,
            errors: create_errors,
            request: Some(table.writable()),
            response: Some(item.clone()),
        });
        let get = self.push(Endpoint {
            method: Method::Get,
            path: table.item_path(),
            summary: format!("Fetch one {singular}"),
            access: read_access.to_string(),
            success: 200,
            errors: vec![UNAUTHORIZED, NOT_FOUND, RATE_LIMITED, INTERNAL_ERROR],
            request: None,
            response: Some(item.clone()),
        });
        let update = self.push(Endpoint {
            method: Method::Patch,
            path: table.item_path(),
            summary: format!("Update {} (owner or admin)", with_article(&singular)),
            access: "Member, Admin".to_string(),
            success: 200,
            errors: vec![VALIDATION_FAILED, UNAUTHORIZED, FORBIDDEN, NOT_FOUND, CONFLICT, RATE_LIMITED, INTERNAL_ERROR],
            request: Some(table.writable()),
            response: Some(item),
        });
        let delete = self.push(Endpoint {
            method: Method::Delete,
            path: table.item_path(),
            summary: format!("Delete {} (owner or admin)", with_article(&singular)),
            access: "Member, Admin".to_string(),
            success: 204,
            errors: vec![UNAUTHORIZED, FORBIDDEN, NOT_FOUND, RATE_LIMITED, INTERNAL_ERROR],
            request: None,
            response: None,
        });

        let headline = if primary {
            format!("As a member, I want to {} so that {} delivers its core value", config.primary_action, config.project_name)
        } else {
            format!("As a member, I want to create and browse {plural}")
        };
        self.story(Priority::P0, headline, vec![create, list]);
        self.story(
            Priority::P1,
            format!("As a member, I want to open and edit {}", with_article(&singular)),
            vec![get, update],
        );
        self.story(
            Priority::P2,
            format!("As a member, I want to delete {} I no longer need", with_article(&singular)),
            vec![delete],
        );
    }
}

/// Mermaid-safe column type ("DOUBLE PRECISION" -> "double", "CHAR(3)" -> "char").
pub fn erd_type(sql_type: &str) -> String {
    sql_type
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::DefaultsResolver;
    use crate::profile::InputProfile;

    fn blueprint(profile: InputProfile) -> Blueprint {
        let r = DefaultsResolver::default().resolve(&profile);
        Blueprint::new(&r.config)
    }

    #[test]
    fn every_table_has_identity_and_timestamps() {
        let bp = blueprint(InputProfile::new("shop").with_domain(Domain::Ecommerce));
        for t in &bp.tables {
            let names: Vec<&str> = t.columns.iter().map(|c| c.name.as_str()).collect();
            assert!(names.contains(&"id"), "{}", t.table);
            assert!(names.contains(&"created_at"));
            assert!(names.contains(&"updated_at"));
        }
        assert!(bp.table("Order").is_some());
    }

    #[test]
    fn payments_add_the_declined_code() {
        let bp = blueprint(InputProfile::new("shop").with_domain(Domain::Ecommerce));
        assert!(bp.errors.iter().any(|e| e.code == PAYMENT_DECLINED));
        let create_order = bp.endpoint("POST /api/v1/orders").unwrap();
        assert!(create_order.errors.contains(&PAYMENT_DECLINED));

        let bp = blueprint(InputProfile::new("notes").with_entity("Note"));
        assert!(bp.errors.iter().all(|e| e.code != PAYMENT_DECLINED));
    }

    #[test]
    fn p0_stories_reference_real_endpoints() {
        let bp = blueprint(InputProfile::new("a blog").with_domain(Domain::Content));
        for story in bp.stories.iter().filter(|s| s.priority == Priority::P0) {
            for reference in &story.endpoints {
                assert!(bp.endpoint(reference).is_some(), "{reference}");
            }
        }
    }

    #[test]
    fn parent_keys_fall_back_to_owner() {
        let bp = blueprint(InputProfile::new("x").with_entity("Reading"));
        let readings = bp.table("Reading").unwrap();
        assert!(readings.columns.iter().any(|c| c.name == "owner_id"));
        let bp = blueprint(InputProfile::new("x").with_entity("Device").with_entity("Reading"));
        let readings = bp.table("Reading").unwrap();
        assert!(readings.foreign_keys().any(|(c, t)| c == "device_id" && t == "devices"));
    }

    #[test]
    fn internal_columns_stay_out_of_payloads() {
        let bp = blueprint(InputProfile::new("x"));
        let users = bp.table(USER_ENTITY).unwrap();
        assert!(users.representation().get("passwordHash").is_none());
        assert!(users.representation().get("displayName").is_some());
    }

    #[test]
    fn erd_types_are_identifiers() {
        assert_eq!(erd_type("DOUBLE PRECISION"), "double");
        assert_eq!(erd_type("CHAR(3)"), "char");
    }
}
