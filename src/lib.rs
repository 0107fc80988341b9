//! # Greenscreen Compositor
//!
//! Replace the greenscreen in a filmed clip with the frames of a reference
//! clip, then attach the reference audio to the result.
//!
//! Each frame pair is normalized to a common resolution, the green backdrop
//! is segmented and dilated, and the remaining subject is merged over the
//! reference frame. Composited frames are staged as numbered images and
//! assembled into a video at the reference frame rate.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use greenscreen_compositor::{
//!     config::Config,
//!     pipeline::{ChromaKeyEngine, InterruptSignal, RunRequest},
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let engine = ChromaKeyEngine::new(Config::default());
//! let request = RunRequest::new("reference.mp4", "filmed.mp4", "output.avi");
//!
//! let outcome = engine.run(&request, Box::new(InterruptSignal::ctrl_c())).await?;
//! println!("{} frames staged", outcome.frames_staged);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`keying`] - Per-frame chroma key
//! - [`video`] - Clip decoding, frame staging and the media backend
//! - [`pipeline`] - Frame loop, cancellation and run orchestration
//! - [`config`] - Configuration management
//!
//! ## Custom Backends
//!
//! Decoding and container work go through the
//! [`MediaBackend`](video::MediaBackend) trait. The default
//! [`FfmpegBackend`](video::FfmpegBackend) shells out to `ffmpeg` and
//! `ffprobe`; other toolkits can be plugged in with
//! [`ChromaKeyEngine::with_backend`](pipeline::ChromaKeyEngine::with_backend).

pub mod config;
pub mod error;
pub mod keying;
pub mod pipeline;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    config::Config,
    error::{CompositorError, Result},
    keying::{ChromaKeyCompositor, KeyParams},
    pipeline::{ChromaKeyEngine, PipelineState, RunOutcome, RunRequest},
    video::{Frame, MediaBackend},
};
