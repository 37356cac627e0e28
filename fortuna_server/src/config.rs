use anyhow::Context;
use fortuna_core::{PrizeTable, SpinTiming};
use fortuna_shared::DEFAULT_DATABASE_URL;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub api_key: String,
    pub bind: String,
    pub prizes: PrizeTable,
    pub timing: SpinTiming,
}

impl Config {
    /// Read the environment once at startup. A broken `PRIZE_TABLE` aborts
    /// startup instead of surfacing at draw time.
    pub fn from_env() -> anyhow::Result<Self> {
        let prizes = match std::env::var("PRIZE_TABLE") {
            Ok(path) => PrizeTable::load(&path)
                .with_context(|| format!("loading prize table from {path}"))?,
            Err(_) => PrizeTable::builtin(),
        };
        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            api_key: std::env::var("API_KEY").unwrap_or_else(|_| "dev-key".into()),
            bind: std::env::var("BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            prizes,
            timing: SpinTiming::normal(),
        })
    }
}
