use chrono::{DateTime, Utc};
use fortuna_core::{
    mask_username, prize_text, Celebration, Entry, EntryFilter, PersistenceError, PrizeTier,
    SpinEvent, TimedEvent, Tier, Unauthorized, REELS,
};
use serde::{Deserialize, Serialize};

pub mod db;

pub use db::{Database, FairnessParams, DEFAULT_DATABASE_URL};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DrawRequest {
    pub username: String,
    /// Tier amount as chosen by the player; unknown values fall back to the
    /// default tier.
    pub amount: String,
    /// Receipt image data URI.
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub client_seed: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RevealFrame {
    pub at_ms: u64,
    pub reels: [String; REELS],
}

impl RevealFrame {
    /// Reel snapshots out of a sequencer trace, in timeline order.
    pub fn from_trace(trace: &[TimedEvent]) -> Vec<RevealFrame> {
        trace
            .iter()
            .filter_map(|t| match &t.event {
                SpinEvent::Frame { reels } => Some(RevealFrame {
                    at_ms: t.at.as_millis() as u64,
                    reels: reels.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DrawResponse {
    pub server_seed_hash: String,
    pub nonce: u64,
    pub tier: Tier,
    pub label: String,
    pub value: u32,
    pub celebration: Option<Celebration>,
    /// Milliseconds from trigger to announcement.
    pub reveal_ms: u64,
    pub frames: Vec<RevealFrame>,
    pub entry_id: String,
    /// False when the draw stands but the entry could not be stored.
    pub saved: bool,
    pub save_error: Option<String>,
    /// Ready-made message for sharing the result.
    pub share_text: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VerifyResponse {
    pub server_seed_hash: String,
    pub nonce: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PrizeView {
    pub label: String,
    /// Probability in percent, e.g. 9.5
    pub percent: f64,
    pub emoji: String,
    pub color: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TierView {
    pub tier: Tier,
    pub prizes: Vec<PrizeView>,
}

impl From<&PrizeTier> for TierView {
    fn from(t: &PrizeTier) -> Self {
        Self {
            tier: t.tier(),
            prizes: t
                .options()
                .iter()
                .map(|o| PrizeView {
                    label: o.label.clone(),
                    percent: (o.probability * 1000.0).round() / 10.0,
                    emoji: o.meta.emoji.clone(),
                    color: o.meta.color.clone(),
                })
                .collect(),
        }
    }
}

/// Public board row: the username is masked.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TodayRecord {
    pub username: String,
    pub prize: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&Entry> for TodayRecord {
    fn from(e: &Entry) -> Self {
        Self {
            username: mask_username(&e.username),
            prize: prize_text(e.awarded_prize),
            timestamp: e.timestamp,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct EntryQuery {
    pub search: Option<String>,
    /// Tier amount, or `all`.
    pub amount: Option<String>,
}

impl EntryQuery {
    pub fn to_filter(&self) -> Result<EntryFilter, ApiError> {
        let tier = match self.amount.as_deref().map(str::trim) {
            None | Some("") | Some("all") => None,
            Some(raw) => Some(
                raw.parse::<Tier>()
                    .map_err(|e| ApiError::Invalid(e.to_string()))?,
            ),
        };
        Ok(EntryFilter {
            search: self.search.clone().unwrap_or_default(),
            tier,
        })
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    Invalid(String),
    #[error("admin login required")]
    Unauthorized,
    #[error("internal server error")]
    Internal,
}

impl From<Unauthorized> for ApiError {
    fn from(_: Unauthorized) -> Self {
        ApiError::Unauthorized
    }
}

impl From<PersistenceError> for ApiError {
    fn from(e: PersistenceError) -> Self {
        tracing::error!(error = %e, "entry store failure");
        ApiError::Internal
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
