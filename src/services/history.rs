/// Persisted recommendation history and search-term history
///
/// Each store is the single owner of its storage key. Every mutation is
/// written through to [`LocalStorage`] before the call returns; a failed write
/// is logged and the in-memory state stays authoritative.
use tokio::sync::RwLock;

use crate::{db::LocalStorage, models::HistoryEntry};

/// Maximum entries kept by each history
pub const HISTORY_LIMIT: usize = 10;

const RECOMMENDATIONS_KEY: &str = "recommendations";
const SEARCH_TERMS_KEY: &str = "search_history";

/// Most recent generations, newest first
pub struct RecommendationStore {
    storage: LocalStorage,
    entries: RwLock<Vec<HistoryEntry>>,
}

impl RecommendationStore {
    /// Loads previously persisted entries; unreadable state starts empty
    pub fn load(storage: LocalStorage) -> Self {
        let mut entries: Vec<HistoryEntry> = match storage.load(RECOMMENDATIONS_KEY) {
            Ok(entries) => entries.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable recommendation history");
                Vec::new()
            }
        };
        entries.truncate(HISTORY_LIMIT);

        Self {
            storage,
            entries: RwLock::new(entries),
        }
    }

    /// Inserts an entry at the front, replacing any entry with the same
    /// prompt and media type, then trims to [`HISTORY_LIMIT`]
    pub async fn add(&self, entry: HistoryEntry) {
        let mut entries = self.entries.write().await;
        entries.retain(|existing| !existing.same_key(&entry));
        entries.insert(0, entry);
        entries.truncate(HISTORY_LIMIT);
        self.persist(&entries);
    }

    /// Removes one entry, returning whether it existed
    pub async fn remove(&self, id: &str) -> bool {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        let removed = entries.len() != before;
        if removed {
            self.persist(&entries);
        }
        removed
    }

    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.clear();
        self.persist(&entries);
    }

    pub async fn list(&self) -> Vec<HistoryEntry> {
        self.entries.read().await.clone()
    }

    pub async fn get(&self, id: &str) -> Option<HistoryEntry> {
        self.entries
            .read()
            .await
            .iter()
            .find(|entry| entry.id == id)
            .cloned()
    }

    fn persist(&self, entries: &[HistoryEntry]) {
        if let Err(e) = self.storage.save(RECOMMENDATIONS_KEY, &entries) {
            tracing::error!(error = %e, "Failed to persist recommendation history");
        }
    }
}

/// Recent browse-search terms, newest first
pub struct SearchHistory {
    storage: LocalStorage,
    terms: RwLock<Vec<String>>,
}

impl SearchHistory {
    pub fn load(storage: LocalStorage) -> Self {
        let mut terms: Vec<String> = match storage.load(SEARCH_TERMS_KEY) {
            Ok(terms) => terms.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable search history");
                Vec::new()
            }
        };
        terms.truncate(HISTORY_LIMIT);

        Self {
            storage,
            terms: RwLock::new(terms),
        }
    }

    /// Moves `term` to the front, ignoring case when deduplicating
    pub async fn record(&self, term: &str) {
        let term = term.trim();
        if term.is_empty() {
            return;
        }

        let mut terms = self.terms.write().await;
        let lowered = term.to_lowercase();
        terms.retain(|existing| existing.to_lowercase() != lowered);
        terms.insert(0, term.to_string());
        terms.truncate(HISTORY_LIMIT);

        if let Err(e) = self.storage.save(SEARCH_TERMS_KEY, &*terms) {
            tracing::error!(error = %e, "Failed to persist search history");
        }
    }

    pub async fn list(&self) -> Vec<String> {
        self.terms.read().await.clone()
    }

    pub async fn clear(&self) {
        let mut terms = self.terms.write().await;
        terms.clear();
        if let Err(e) = self.storage.remove(SEARCH_TERMS_KEY) {
            tracing::error!(error = %e, "Failed to clear search history");
        }
    }
}
