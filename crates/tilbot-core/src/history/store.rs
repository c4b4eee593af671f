use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use super::snapshot::{LoadSource, SnapshotData, SnapshotFile};
use super::Exchange;
use crate::config::HistorySettings;
use crate::constants;
use crate::error::TilbotError;

/// Flush to disk after every `every`-th append for a user, counted from
/// process start. Independent of the periodic background flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushPolicy {
    pub every: u64,
}

impl FlushPolicy {
    pub fn every(every: u64) -> Self {
        Self { every: every.max(1) }
    }

    fn is_due(&self, appended: u64) -> bool {
        appended > 0 && appended % self.every == 0
    }

    /// Whether a boundary lies in `(flushed_at, appended]`.
    fn crossed(&self, flushed_at: u64, appended: u64) -> bool {
        appended / self.every > flushed_at / self.every
    }
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self::every(constants::history::FLUSH_EVERY)
    }
}

/// Result of a single append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Length of the user's history after capping.
    pub len: usize,
    /// Exchanges evicted from the front to honour the cap.
    pub evicted: usize,
    /// Whether this append crossed a flush-policy boundary.
    pub flush_due: bool,
}

/// Aggregate counters for the stats command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryStats {
    pub user_exchanges: usize,
    pub total_exchanges: usize,
    pub total_users: usize,
    /// Exchange counts per model id, largest first, ties by id.
    pub by_model: Vec<(String, usize)>,
}

#[derive(Debug, Default)]
struct UserHistory {
    exchanges: VecDeque<Exchange>,
    appended: u64,
    flushed_at: u64,
}

/// Per-user capped exchange logs with snapshot persistence.
///
/// Lock order is always map then user. Appends for different users run in
/// parallel under the shared map lock; an append for one user is atomic.
/// Snapshot writes are serialized by `writer`.
pub struct HistoryStore {
    users: RwLock<HashMap<String, Arc<Mutex<UserHistory>>>>,
    max_exchanges: usize,
    policy: FlushPolicy,
    snapshot: Option<SnapshotFile>,
    writer: Mutex<()>,
    flushes: AtomicU64,
}

impl HistoryStore {
    /// A store that never touches disk.
    pub fn in_memory(max_exchanges: usize, policy: FlushPolicy) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            max_exchanges: max_exchanges.max(1),
            policy,
            snapshot: None,
            writer: Mutex::new(()),
            flushes: AtomicU64::new(0),
        }
    }

    /// Load from `snapshot` (recovering from its backup if needed) and keep
    /// flushing back to it. Loaded sequences longer than the cap are trimmed
    /// from the front.
    pub fn open(snapshot: SnapshotFile, max_exchanges: usize, policy: FlushPolicy) -> Self {
        let (data, source) = snapshot.load();
        let mut store = Self::in_memory(max_exchanges, policy);

        let mut users = HashMap::with_capacity(data.len());
        for (key, exchanges) in data {
            let mut exchanges: VecDeque<Exchange> = exchanges.into();
            while exchanges.len() > store.max_exchanges {
                exchanges.pop_front();
            }
            users.insert(
                key,
                Arc::new(Mutex::new(UserHistory {
                    exchanges,
                    ..UserHistory::default()
                })),
            );
        }
        store.users = RwLock::new(users);
        store.snapshot = Some(snapshot);

        tracing::info!(
            "Loaded {} exchanges from {} users ({:?})",
            store.total_exchanges(),
            store.user_count(),
            source
        );
        if source == LoadSource::Backup {
            // Put the recovered state back in the primary slot.
            if let Err(e) = store.flush_all() {
                tracing::error!("Failed to rewrite recovered history: {}", e);
            }
        }
        store
    }

    pub fn from_settings(settings: &HistorySettings) -> Self {
        Self::open(
            SnapshotFile::new(&settings.path),
            settings.max_exchanges,
            FlushPolicy::every(settings.flush_every),
        )
    }

    pub fn max_exchanges(&self) -> usize {
        self.max_exchanges
    }

    pub fn flush_policy(&self) -> FlushPolicy {
        self.policy
    }

    pub fn snapshot(&self) -> Option<&SnapshotFile> {
        self.snapshot.as_ref()
    }

    /// Append one exchange, evicting the oldest entries beyond the cap.
    /// Memory only; see [`HistoryStore::maybe_flush`] for persistence.
    pub fn append(&self, user_key: &str, exchange: Exchange) -> AppendOutcome {
        {
            let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = users.get(user_key) {
                let mut user = entry.lock().unwrap_or_else(PoisonError::into_inner);
                return self.push_capped(&mut user, exchange);
            }
        }

        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        let entry = users.entry(user_key.to_string()).or_default();
        let mut user = entry.lock().unwrap_or_else(PoisonError::into_inner);
        self.push_capped(&mut user, exchange)
    }

    fn push_capped(&self, user: &mut UserHistory, exchange: Exchange) -> AppendOutcome {
        user.exchanges.push_back(exchange);
        user.appended += 1;

        let mut evicted = 0;
        while user.exchanges.len() > self.max_exchanges {
            user.exchanges.pop_front();
            evicted += 1;
        }

        AppendOutcome {
            len: user.exchanges.len(),
            evicted,
            flush_due: self.policy.is_due(user.appended),
        }
    }

    /// Flush if the user's append count has passed a policy boundary since
    /// the last batch flush.
    /// Returns whether a snapshot was written.
    pub fn maybe_flush(&self, user_key: &str) -> Result<bool, TilbotError> {
        let due = {
            let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
            match users.get(user_key) {
                Some(entry) => {
                    let mut user = entry.lock().unwrap_or_else(PoisonError::into_inner);
                    if self.policy.crossed(user.flushed_at, user.appended) {
                        user.flushed_at = user.appended;
                        true
                    } else {
                        false
                    }
                }
                None => false,
            }
        };

        if due {
            self.flush_all()?;
        }
        Ok(due)
    }

    /// Write the whole store to its snapshot file. No-op for in-memory stores.
    pub fn flush_all(&self) -> Result<(), TilbotError> {
        let Some(snapshot) = &self.snapshot else {
            return Ok(());
        };

        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let data = self.to_snapshot();
        snapshot.write(&data)?;
        self.flushes.fetch_add(1, Ordering::Relaxed);

        tracing::debug!("Flushed history for {} users to {}", data.len(), snapshot.path().display());
        Ok(())
    }

    /// Number of snapshot writes since the store was created.
    pub fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    /// Copy of the full state in snapshot form.
    pub fn to_snapshot(&self) -> SnapshotData {
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        users
            .iter()
            .map(|(key, entry)| {
                let user = entry.lock().unwrap_or_else(PoisonError::into_inner);
                (key.clone(), user.exchanges.iter().cloned().collect())
            })
            .filter(|(_, exchanges): &(String, Vec<Exchange>)| !exchanges.is_empty())
            .collect()
    }

    /// Up to `limit` most recent exchanges, oldest first.
    pub fn history(&self, user_key: &str, limit: usize) -> Vec<Exchange> {
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = users.get(user_key) else {
            return Vec::new();
        };
        let user = entry.lock().unwrap_or_else(PoisonError::into_inner);
        let skip = user.exchanges.len().saturating_sub(limit);
        user.exchanges.iter().skip(skip).cloned().collect()
    }

    pub fn len_for(&self, user_key: &str) -> usize {
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        users
            .get(user_key)
            .map(|entry| entry.lock().unwrap_or_else(PoisonError::into_inner).exchanges.len())
            .unwrap_or(0)
    }

    /// Remove a user's history and flush immediately. Returns how many
    /// exchanges were removed. A failed flush is logged, not returned.
    pub fn clear(&self, user_key: &str) -> usize {
        let removed = {
            let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
            users
                .remove(user_key)
                .map(|entry| entry.lock().unwrap_or_else(PoisonError::into_inner).exchanges.len())
                .unwrap_or(0)
        };

        if removed > 0 {
            if let Err(e) = self.flush_all() {
                tracing::error!("Failed to flush after clearing {}: {}", user_key, e);
            }
        }
        removed
    }

    pub fn user_count(&self) -> usize {
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        users
            .values()
            .filter(|entry| !entry.lock().unwrap_or_else(PoisonError::into_inner).exchanges.is_empty())
            .count()
    }

    pub fn total_exchanges(&self) -> usize {
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        users
            .values()
            .map(|entry| entry.lock().unwrap_or_else(PoisonError::into_inner).exchanges.len())
            .sum()
    }

    pub fn stats(&self, user_key: &str) -> HistoryStats {
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        let mut stats = HistoryStats::default();
        let mut by_model: HashMap<String, usize> = HashMap::new();

        for (key, entry) in users.iter() {
            let user = entry.lock().unwrap_or_else(PoisonError::into_inner);
            if user.exchanges.is_empty() {
                continue;
            }
            stats.total_users += 1;
            stats.total_exchanges += user.exchanges.len();
            if key == user_key {
                stats.user_exchanges = user.exchanges.len();
            }
            for exchange in &user.exchanges {
                *by_model.entry(exchange.model().to_string()).or_insert(0) += 1;
            }
        }

        let mut by_model: Vec<(String, usize)> = by_model.into_iter().collect();
        by_model.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        stats.by_model = by_model;
        stats
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::in_memory(constants::history::MAX_EXCHANGES, FlushPolicy::default())
    }
}

/// Flush the store on a fixed interval until the task is aborted. Writes run
/// on the blocking pool so a slow disk never stalls message handling.
pub fn spawn_periodic_flush(
    store: Arc<HistoryStore>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let store = Arc::clone(&store);
            match tokio::task::spawn_blocking(move || {
                store.flush_all().map(|_| store.user_count())
            })
            .await
            {
                Ok(Ok(users)) => tracing::info!("Autosaved history for {} users", users),
                Ok(Err(e)) => tracing::error!("Autosave failed: {}", e),
                Err(e) => tracing::error!("Autosave task panicked: {}", e),
            }
        }
    })
}
