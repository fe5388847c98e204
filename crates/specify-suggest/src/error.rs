use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("bad response: {0}")]
    Response(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("rate limited: {0}")]
    RateLimit(String),
    #[error("content filtered: {0}")]
    ContentFilter(String),
}

const RATE_LIMIT: &[&str] = &["rate limit", "rate_limit", "too many requests", "429", "quota"];
const AUTH: &[&str] = &[
    "401",
    "403",
    "unauthorized",
    "forbidden",
    "invalid api key",
    "invalid x-api-key",
    "incorrect api key",
    "authentication",
];
const CONTENT_FILTER: &[&str] = &["content policy", "content_filter", "content filter", "safety system"];
const CONNECTION: &[&str] = &[
    "connection",
    "refused",
    "timeout",
    "timed out",
    "unreachable",
    "network",
    "dns",
    "host not found",
    "name or service not known",
    "502",
    "503",
    "504",
    "bad gateway",
    "service unavailable",
    "overloaded",
];

impl ProviderError {
    /// Map a backend error message to a variant by keyword; anything unrecognized is a response error.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));
        let message = message.to_string();
        if has(RATE_LIMIT) {
            Self::RateLimit(message)
        } else if has(AUTH) {
            Self::Auth(message)
        } else if has(CONTENT_FILTER) {
            Self::ContentFilter(message)
        } else if has(CONNECTION) {
            Self::Connection(message)
        } else {
            Self::Response(message)
        }
    }

    /// Worth another attempt after a backoff. A malformed or empty reply is not.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::RateLimit(_))
    }
}
