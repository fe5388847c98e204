use serde::{Deserialize, Serialize};

/// Throughput classification driving the architecture-style default.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, schemars::JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub enum ThroughputTier {
    Tier1,
    Tier2,
    Tier3,
    Tier4,
}

impl ThroughputTier {
    pub const ALL: [ThroughputTier; 4] = [Self::Tier1, Self::Tier2, Self::Tier3, Self::Tier4];

    /// Classify a user count: <1K, 1K–100K, 100K–1M, 1M+.
    pub fn from_users(users: u64) -> Self {
        match users {
            0..=999 => Self::Tier1,
            1_000..=99_999 => Self::Tier2,
            100_000..=999_999 => Self::Tier3,
            _ => Self::Tier4,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            Self::Tier1 => 1,
            Self::Tier2 => 2,
            Self::Tier3 => 3,
            Self::Tier4 => 4,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::Tier1),
            2 => Some(Self::Tier2),
            3 => Some(Self::Tier3),
            4 => Some(Self::Tier4),
            _ => None,
        }
    }

    pub fn range_label(self) -> &'static str {
        match self {
            Self::Tier1 => "<1K users",
            Self::Tier2 => "1K–100K users",
            Self::Tier3 => "100K–1M users",
            Self::Tier4 => "1M+ users",
        }
    }

    pub fn next(self) -> Option<Self> {
        Self::from_number(self.number() + 1)
    }

    pub fn architecture(self) -> ArchitectureStyle {
        match self {
            Self::Tier1 | Self::Tier2 => ArchitectureStyle::ModularMonolith,
            Self::Tier3 => ArchitectureStyle::ServiceOriented,
            Self::Tier4 => ArchitectureStyle::EventDrivenMicroservices,
        }
    }
}

impl std::fmt::Display for ThroughputTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Tier {} ({})", self.number(), self.range_label())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ArchitectureStyle {
    ModularMonolith,
    ServiceOriented,
    EventDrivenMicroservices,
}

impl ArchitectureStyle {
    pub fn label(self) -> &'static str {
        match self {
            Self::ModularMonolith => "Modular monolith",
            Self::ServiceOriented => "Modular monolith with extracted services",
            Self::EventDrivenMicroservices => "Event-driven microservices",
        }
    }

    pub fn rationale(self) -> &'static str {
        match self {
            Self::ModularMonolith => {
                "One deployable with strict module boundaries keeps operations cheap while load is modest"
            }
            Self::ServiceOriented => {
                "Hot paths are extracted into independently scaled services; the rest stays in the monolith"
            }
            Self::EventDrivenMicroservices => {
                "Independent services communicating over an event bus scale and fail in isolation"
            }
        }
    }

    /// Lowest tier at which this style is recommended.
    pub fn minimum_tier(self) -> ThroughputTier {
        match self {
            Self::ModularMonolith => ThroughputTier::Tier1,
            Self::ServiceOriented => ThroughputTier::Tier3,
            Self::EventDrivenMicroservices => ThroughputTier::Tier4,
        }
    }
}
