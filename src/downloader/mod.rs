pub mod cleanup;
pub mod error;
pub mod format;
pub mod manager;
pub mod progress;
pub mod runner;
pub mod slot_pool;
pub mod store;
pub mod task;

pub use error::{DownloadError, DownloadResult};
pub use format::VideoQuality;
pub use manager::{DownloadManager, RetentionPolicy, SubmitRequest};
pub use runner::JobRunner;
pub use slot_pool::{JobSlot, JobSlotPool};
pub use store::JobStore;
pub use task::{JobSnapshot, JobStatus, MediaType, SnapshotPatch};
