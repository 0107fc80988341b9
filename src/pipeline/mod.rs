//! # Pipeline
//!
//! Drives a run from two clips to a finished video: the synchronous frame
//! loop in [`driver`], the cancel seam in [`cancel`] and the async
//! orchestration in [`engine`].

pub mod cancel;
pub mod driver;
pub mod engine;

pub use cancel::{CancelSignal, CancelTrigger, InterruptSignal, NeverCancel};
pub use driver::{drive, DriveReport, PipelineState};
pub use engine::{default_muxed_path, ChromaKeyEngine, RunOutcome, RunRequest};
