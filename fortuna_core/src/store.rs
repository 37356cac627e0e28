use std::future::Future;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::{
    engine::DrawResult,
    entry::{Entry, Ticket},
    error::PersistenceError,
};

/// Where completed draws are kept. Implementations own the records; callers
/// only ever hold copies.
pub trait EntryStore {
    fn insert(&self, entry: &Entry) -> impl Future<Output = Result<(), PersistenceError>> + Send;

    /// Every entry, newest first.
    fn list_all(&self) -> impl Future<Output = Result<Vec<Entry>, PersistenceError>> + Send;

    /// Deleting an unknown id is not an error.
    fn delete_by_id(&self, id: &str)
        -> impl Future<Output = Result<(), PersistenceError>> + Send;

    fn delete_all(&self) -> impl Future<Output = Result<(), PersistenceError>> + Send;
}

/// Process-local store, handy for tests and demos.
#[derive(Debug, Default)]
pub struct MemoryEntryStore {
    entries: Mutex<Vec<Entry>>,
}

impl MemoryEntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut Vec<Entry>) -> T) -> Result<T, PersistenceError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| PersistenceError::Connection("entry store lock poisoned".into()))?;
        Ok(f(&mut guard))
    }
}

impl EntryStore for MemoryEntryStore {
    async fn insert(&self, entry: &Entry) -> Result<(), PersistenceError> {
        self.with(|entries| {
            if entries.iter().any(|e| e.id == entry.id) {
                return Err(PersistenceError::Query(format!("duplicate id {}", entry.id)));
            }
            entries.push(entry.clone());
            Ok(())
        })?
    }

    async fn list_all(&self) -> Result<Vec<Entry>, PersistenceError> {
        self.with(|entries| {
            let mut out = entries.clone();
            out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            out
        })
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), PersistenceError> {
        self.with(|entries| entries.retain(|e| e.id != id))
    }

    async fn delete_all(&self) -> Result<(), PersistenceError> {
        self.with(|entries| entries.clear())
    }
}

/// A finished draw and what happened when it was saved.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub result: DrawResult,
    pub entry: Entry,
    pub persisted: Result<(), PersistenceError>,
}

impl Settlement {
    pub fn saved(&self) -> bool {
        self.persisted.is_ok()
    }
}

/// Record a finished draw. Saving is best effort: a store failure is logged
/// and reported in the settlement, the result itself stands.
pub async fn settle<S: EntryStore>(
    store: &S,
    ticket: &Ticket,
    result: DrawResult,
    now: DateTime<Utc>,
) -> Settlement {
    let entry = Entry::new(ticket, &result, now);
    let persisted = store.insert(&entry).await;
    match &persisted {
        Ok(()) => tracing::info!(
            id = %entry.id,
            username = %entry.username,
            tier = %entry.tier_amount,
            prize = entry.awarded_prize,
            "entry saved"
        ),
        Err(e) => tracing::warn!(id = %entry.id, error = %e, "draw result kept but entry not saved"),
    }
    Settlement {
        result,
        entry,
        persisted,
    }
}
