//! Stage definitions and results.

pub mod result;
pub mod stage;

pub use result::{StageRecorder, StageResult, StageStatus};
pub use stage::{plan, PlannedStage, Stage};
