//! Run state persistence.
//!
//! Every run gets a directory under the work directory holding its record,
//! console log and archived artifacts. The record is what `resume`,
//! `approve`, `history` and `show` read.

pub mod lock;
pub mod record;
pub mod run_id;
pub mod store;

pub use lock::RunLock;
pub use record::{ApprovalState, RunRecord, RunStatus, StageCounts};
pub use run_id::RunId;
pub use store::RunStore;
