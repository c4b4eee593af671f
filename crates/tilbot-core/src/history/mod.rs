mod exchange;
mod snapshot;
mod store;

pub use exchange::{Exchange, ExchangeCaps};
pub use snapshot::{backup_path_for, LoadSource, SnapshotData, SnapshotFile};
pub use store::{spawn_periodic_flush, AppendOutcome, FlushPolicy, HistoryStats, HistoryStore};
