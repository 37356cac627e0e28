use crate::tier::Tier;

/// Raised while building or loading a prize table. Never raised at draw time.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("tier {tier} has no prize options")]
    EmptyTier { tier: Tier },

    #[error("tier {tier} option {label:?} has probability {probability}, expected (0, 1]")]
    ProbabilityOutOfRange {
        tier: Tier,
        label: String,
        probability: f64,
    },

    #[error("tier {tier} probabilities sum to {sum}, expected 1.0")]
    ProbabilitySum { tier: Tier, sum: f64 },

    #[error("prize table is missing tier {0}")]
    MissingTier(Tier),

    #[error("invalid prize table: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("cannot read prize table: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure reported by an entry store. Draw results are kept regardless.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PersistenceError {
    #[error("entry store unreachable: {0}")]
    Connection(String),

    #[error("entry store query failed: {0}")]
    Query(String),
}
