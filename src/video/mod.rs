//! # Video Module
//!
//! Clip decoding, frame staging and final assembly. Container work is done
//! by external ffmpeg processes behind the [`MediaBackend`] seam.

pub mod backend;
pub mod ffmpeg;
pub mod source;
pub mod staging;
pub mod types;

pub use backend::{FfmpegBackend, MediaBackend};
pub use source::{open_clip, FrameSource, MemoryClip};
pub use staging::{FrameSink, StagedFrames, StagingDir};
pub use types::{ClipMetadata, Frame};
