use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::tier::Tier;

/// Allowed deviation of a tier's probability sum from 1.0.
pub const PROBABILITY_EPSILON: f64 = 1e-6;

/// Opaque display hints carried alongside each option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DisplayMeta {
    pub emoji: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrizeOption {
    pub label: String,
    pub probability: f64,
    #[serde(default)]
    pub meta: DisplayMeta,
}

impl PrizeOption {
    pub fn new(label: impl Into<String>, probability: f64, emoji: &str, color: &str) -> Self {
        Self {
            label: label.into(),
            probability,
            meta: DisplayMeta {
                emoji: emoji.to_string(),
                color: color.to_string(),
            },
        }
    }
}

/// Ordered options of one tier. Order defines the cumulative buckets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrizeTier {
    tier: Tier,
    options: Vec<PrizeOption>,
}

impl PrizeTier {
    pub fn new(tier: Tier, options: Vec<PrizeOption>) -> Result<Self, ConfigError> {
        if options.is_empty() {
            return Err(ConfigError::EmptyTier { tier });
        }
        for o in &options {
            if !(o.probability > 0.0 && o.probability <= 1.0) {
                return Err(ConfigError::ProbabilityOutOfRange {
                    tier,
                    label: o.label.clone(),
                    probability: o.probability,
                });
            }
        }
        let sum: f64 = options.iter().map(|o| o.probability).sum();
        if (sum - 1.0).abs() > PROBABILITY_EPSILON {
            return Err(ConfigError::ProbabilitySum { tier, sum });
        }
        Ok(Self { tier, options })
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn options(&self) -> &[PrizeOption] {
        &self.options
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.options.iter().map(|o| o.label.as_str())
    }

    pub fn find(&self, label: &str) -> Option<&PrizeOption> {
        self.options.iter().find(|o| o.label == label)
    }
}

/// Every tier's odds, kept in one place so display and draw never diverge.
#[derive(Debug, Clone, PartialEq)]
pub struct PrizeTable(BTreeMap<Tier, PrizeTier>);

impl PrizeTable {
    pub fn from_tiers(tiers: impl IntoIterator<Item = PrizeTier>) -> Result<Self, ConfigError> {
        let map: BTreeMap<Tier, PrizeTier> = tiers.into_iter().map(|t| (t.tier, t)).collect();
        if let Some(missing) = Tier::ALL.into_iter().find(|t| !map.contains_key(t)) {
            return Err(ConfigError::MissingTier(missing));
        }
        Ok(Self(map))
    }

    /// Parse `{"1000": [{"label": .., "probability": ..}, ..], ..}` and
    /// validate every tier.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let parsed: BTreeMap<Tier, Vec<PrizeOption>> = serde_json::from_str(raw)?;
        let tiers = parsed
            .into_iter()
            .map(|(tier, options)| PrizeTier::new(tier, options))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_tiers(tiers)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn builtin() -> Self {
        fn tier(tier: Tier, labels: [&str; 4]) -> PrizeTier {
            let odds = [0.80, 0.10, 0.095, 0.005];
            let meta = [
                ("💰", "#00f5ff"),
                ("💎", "#ff5ef8"),
                ("✍️", "#a78bfa"),
                ("🎰", "#7cff84"),
            ];
            let options = labels
                .iter()
                .zip(odds)
                .zip(meta)
                .map(|((label, p), (emoji, color))| PrizeOption::new(*label, p, emoji, color))
                .collect();
            PrizeTier { tier, options }
        }

        let tiers = [
            tier(Tier::T1000, ["58獎金", "168獎金", "馬逼簽名", "666獎金"]),
            tier(Tier::T5000, ["188獎金", "388獎金", "馬逼簽名", "1688獎金"]),
            tier(Tier::T10000, ["388獎金", "666獎金", "馬逼簽名", "2888獎金"]),
        ];
        Self(tiers.into_iter().map(|t| (t.tier, t)).collect())
    }

    pub fn tier(&self, tier: Tier) -> &PrizeTier {
        // construction guarantees all tiers are present
        &self.0[&tier]
    }

    /// Lookup by raw identifier with the default-tier fallback.
    pub fn resolve(&self, raw: &str) -> &PrizeTier {
        self.tier(Tier::resolve(raw))
    }

    pub fn tiers(&self) -> impl Iterator<Item = &PrizeTier> {
        self.0.values()
    }
}

impl Default for PrizeTable {
    fn default() -> Self {
        Self::builtin()
    }
}
