use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{engine::DrawResult, tier::Tier};

/// One completed draw as persisted by an entry store. Never mutated once
/// created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub username: String,
    pub tier_amount: String,
    /// Receipt image as a data URI, empty when none was uploaded.
    pub proof_image: String,
    pub awarded_prize: u32,
}

impl Entry {
    pub fn new(ticket: &Ticket, result: &DrawResult, now: DateTime<Utc>) -> Self {
        Self {
            id: entry_id(now),
            timestamp: now,
            username: ticket.username.clone(),
            tier_amount: ticket.tier.as_str().to_string(),
            proof_image: ticket.proof_image.clone(),
            awarded_prize: result.value,
        }
    }

    pub fn has_image(&self) -> bool {
        !self.proof_image.is_empty()
    }

    pub fn tier(&self) -> Tier {
        Tier::resolve(&self.tier_amount)
    }
}

/// What a player submits before spinning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub username: String,
    pub tier: Tier,
    #[serde(default)]
    pub proof_image: String,
}

impl Ticket {
    pub fn new(username: impl Into<String>, tier: Tier, proof_image: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            tier,
            proof_image: proof_image.into(),
        }
    }
}

/// `entry_<unix millis>_<9 base36 chars>`
pub fn entry_id(now: DateTime<Utc>) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::rng();
    let suffix: String = (0..9)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect();
    format!("entry_{}_{}", now.timestamp_millis(), suffix)
}
