use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Deposit bucket a player qualifies for. Each tier owns its own prize odds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tier {
    #[serde(rename = "1000")]
    T1000,
    #[serde(rename = "5000")]
    T5000,
    #[serde(rename = "10000")]
    T10000,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::T1000, Tier::T5000, Tier::T10000];

    /// Where unknown tier identifiers land.
    pub const DEFAULT: Tier = Tier::T10000;

    pub fn amount(self) -> u32 {
        match self {
            Tier::T1000 => 1000,
            Tier::T5000 => 5000,
            Tier::T10000 => 10000,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::T1000 => "1000",
            Tier::T5000 => "5000",
            Tier::T10000 => "10000",
        }
    }

    /// Lenient lookup used at the edges: anything unrecognised maps to
    /// [`Tier::DEFAULT`].
    pub fn resolve(raw: &str) -> Tier {
        raw.parse().unwrap_or_else(|_| {
            tracing::debug!(raw, fallback = Tier::DEFAULT.as_str(), "unknown tier");
            Tier::DEFAULT
        })
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tier {0:?}")]
pub struct UnknownTier(pub String);

impl FromStr for Tier {
    type Err = UnknownTier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1000" => Ok(Tier::T1000),
            "5000" => Ok(Tier::T5000),
            "10000" => Ok(Tier::T10000),
            other => Err(UnknownTier(other.to_string())),
        }
    }
}
