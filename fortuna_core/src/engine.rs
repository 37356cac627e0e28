use serde::{Deserialize, Serialize};

use crate::{
    prize_table::{PrizeOption, PrizeTier},
    rng::{ProvablyFairRng, RandomSource},
};

/// Label of the signature-only prize.
pub const SIGNATURE_PRIZE: &str = "馬逼簽名";
const CASH_SUFFIX: &str = "獎金";

/// Payouts at or above this fire the big celebration.
pub const BIG_THRESHOLD: u32 = 666;
/// Payouts at or above this (and below big) fire the medium celebration.
pub const MEDIUM_THRESHOLD: u32 = 168;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawResult {
    pub label: String,
    /// Payout marker; 0 means a non-cash prize.
    pub value: u32,
}

impl DrawResult {
    pub fn from_option(option: &PrizeOption) -> Self {
        Self {
            label: option.label.clone(),
            value: payout_marker(&option.label),
        }
    }

    pub fn celebration(&self) -> Option<Celebration> {
        Celebration::classify(self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Celebration {
    Big,
    Medium,
}

impl Celebration {
    pub fn classify(value: u32) -> Option<Self> {
        if value >= BIG_THRESHOLD {
            Some(Celebration::Big)
        } else if value >= MEDIUM_THRESHOLD {
            Some(Celebration::Medium)
        } else {
            None
        }
    }
}

/// `"666獎金"` -> 666. Labels without a leading amount (the signature prize)
/// map to 0.
pub fn payout_marker(label: &str) -> u32 {
    label
        .strip_suffix(CASH_SUFFIX)
        .and_then(|digits| digits.trim().parse().ok())
        .unwrap_or(0)
}

/// Cumulative bucket lookup for one draw value.
///
/// Buckets are inclusive at their upper edge. When float drift leaves `draw`
/// above the final cumulative sum the last option is returned. `None` only for
/// an empty slice.
pub fn pick(options: &[PrizeOption], draw: f64) -> Option<&PrizeOption> {
    let mut cumulative = 0.0;
    for option in options {
        cumulative += option.probability;
        if draw <= cumulative {
            return Some(option);
        }
    }
    options.last()
}

/// Draw one prize from a tier, consuming exactly one value from `rng`.
pub fn select<'a, R: RandomSource + ?Sized>(tier: &'a PrizeTier, rng: &mut R) -> &'a PrizeOption {
    let draw = rng.next_unit();
    // validated tiers are never empty
    pick(tier.options(), draw).expect("prize tier has options")
}

/// Recompute the prize a seed pair and nonce produced for `tier`.
pub fn verify_draw(
    server_seed: &str,
    client_seed: &str,
    nonce: u64,
    tier: &PrizeTier,
) -> DrawResult {
    let rng = ProvablyFairRng::new(server_seed, client_seed, nonce);
    let mut stream = rng.stream();
    DrawResult::from_option(select(tier, &mut stream))
}
