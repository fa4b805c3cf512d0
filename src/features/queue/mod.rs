//! Durable queue of writes made while offline.
//!
//! - [`QueuedOperation`]: the self-describing record of one deferred write
//! - [`OperationStore`]: append / enumerate / remove, FIFO by id
//! - [`QueueReplayer`]: sends queued writes once the API is reachable

pub mod operation;
pub mod replay;
pub mod store;

pub use operation::{QueuedOperation, IMAGE_FILENAME_KEY};
pub use replay::{
    format_replay_report, QueueReplayer, ReplayConfig, ReplayReport, ReplayResult, ReplayStatus,
};
pub use store::{MemoryOperationStore, OperationStore, QueueStats, SqliteOperationStore};
