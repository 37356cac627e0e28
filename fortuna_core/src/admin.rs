//! Helpers behind the admin dashboard and the public "today" board.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{engine::SIGNATURE_PRIZE, entry::Entry, tier::Tier};

/// Admin access as an explicit value handed to admin operations.
///
/// This is a plain flag set by comparing a shared key. There is no expiry and
/// no server-side session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AdminSession {
    authenticated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("admin login required")]
pub struct Unauthorized;

impl AdminSession {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn from_bearer(token: Option<&str>, admin_key: &str) -> Self {
        let authenticated = !admin_key.is_empty() && token == Some(admin_key);
        Self { authenticated }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn require(&self) -> Result<(), Unauthorized> {
        if self.authenticated {
            Ok(())
        } else {
            Err(Unauthorized)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFilter {
    /// Case-insensitive username substring.
    #[serde(default)]
    pub search: String,
    /// Exact tier; `None` keeps every tier.
    #[serde(default)]
    pub tier: Option<Tier>,
}

impl EntryFilter {
    pub fn matches(&self, entry: &Entry) -> bool {
        let needle = self.search.to_lowercase();
        let name_ok = needle.is_empty() || entry.username.to_lowercase().contains(&needle);
        let tier_ok = self
            .tier
            .map_or(true, |t| entry.tier_amount == t.as_str());
        name_ok && tier_ok
    }

    pub fn apply<'a>(&self, entries: &'a [Entry]) -> Vec<&'a Entry> {
        entries.iter().filter(|e| self.matches(e)).collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryStats {
    pub total: usize,
    pub today: usize,
    /// Sum of tier amounts over all entries.
    pub total_deposit: u64,
}

impl EntryStats {
    pub fn compute<Tz: TimeZone>(entries: &[Entry], now: &DateTime<Tz>) -> Self {
        Self {
            total: entries.len(),
            today: entries.iter().filter(|e| same_day(&e.timestamp, now)).count(),
            total_deposit: entries
                .iter()
                .filter_map(|e| e.tier_amount.trim().parse::<u64>().ok())
                .sum(),
        }
    }
}

/// Whether `ts` falls on the same calendar date as `now`, in `now`'s zone.
pub fn same_day<Tz: TimeZone>(ts: &DateTime<Utc>, now: &DateTime<Tz>) -> bool {
    ts.with_timezone(&now.timezone()).date_naive() == now.date_naive()
}

pub fn todays_entries<'a, Tz: TimeZone>(entries: &'a [Entry], now: &DateTime<Tz>) -> Vec<&'a Entry> {
    entries.iter().filter(|e| same_day(&e.timestamp, now)).collect()
}

/// First character followed by `***`.
pub fn mask_username(name: &str) -> String {
    match name.chars().next() {
        Some(c) => format!("{c}***"),
        None => "***".to_string(),
    }
}

pub fn prize_text(value: u32) -> String {
    if value == 0 {
        SIGNATURE_PRIZE.to_string()
    } else {
        format!("{value}獎金")
    }
}

/// Message a winner posts when sharing a result.
pub fn share_text(username: &str, value: u32) -> String {
    format!("{username}在抽獎中獲得了{}！隔天統一派彩喔~", prize_text(value))
}

/// Link back to the draw page carrying `username` and `prize` as query
/// parameters.
pub fn share_link(base: &str, username: &str, value: u32) -> Result<Url, url::ParseError> {
    Url::parse_with_params(base, [("username", username), ("prize", value.to_string().as_str())])
}
