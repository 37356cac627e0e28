pub mod admin;
pub mod engine;
pub mod entry;
pub mod error;
pub mod prize_table;
pub mod rng;
pub mod sequencer;
pub mod store;
pub mod tier;
pub mod timeline;

pub use crate::admin::{
    mask_username, prize_text, share_link, share_text, todays_entries, AdminSession, EntryFilter,
    EntryStats, Unauthorized,
};
pub use crate::engine::{pick, select, verify_draw, payout_marker, Celebration, DrawResult, SIGNATURE_PRIZE};
pub use crate::entry::{entry_id, Entry, Ticket};
pub use crate::error::{ConfigError, PersistenceError};
pub use crate::prize_table::{DisplayMeta, PrizeOption, PrizeTable, PrizeTier};
pub use crate::rng::{derive_floats, derive_hash_hex, FairStream, ProvablyFairRng, RandomSource};
pub use crate::sequencer::{
    Cue, Phase, SpinEvent, SpinSequencer, SpinTiming, TimedEvent, Trigger, HISTORY_LEN, REELS,
};
pub use crate::store::{settle, EntryStore, MemoryEntryStore, Settlement};
pub use crate::tier::Tier;
pub use crate::timeline::{Scheduler, Timeline, TimerId};
