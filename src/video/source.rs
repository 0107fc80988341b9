use std::collections::VecDeque;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{Result, VideoError};
use crate::video::ffmpeg::FfmpegClip;
use crate::video::types::{ClipMetadata, Frame};

/// A finite, lazily decoded sequence of frames
///
/// Each open yields a fresh sequence from the first frame. Dropping the
/// source releases its decoder, so early exits never leak one.
pub trait FrameSource: Send {
    /// Frame count and frame rate of the clip
    fn metadata(&self) -> &ClipMetadata;

    /// Decode the next frame, `None` once the clip is exhausted
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Release decoder resources. Safe to call more than once.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Clip backed by frames already in memory
pub struct MemoryClip {
    frames: VecDeque<Frame>,
    metadata: ClipMetadata,
}

impl MemoryClip {
    /// Build a clip from frames; dimensions are taken from the first frame
    pub fn new(frames: Vec<Frame>, frame_rate: f64) -> Self {
        let (width, height) = frames.first().map(Frame::dimensions).unwrap_or((0, 0));
        let metadata = ClipMetadata {
            frame_count: frames.len() as u64,
            frame_rate,
            width,
            height,
            has_audio: false,
        };
        Self {
            frames: frames.into(),
            metadata,
        }
    }

    /// Load a still image as a one-frame clip
    pub fn from_image<P: AsRef<Path>>(path: P, frame_rate: f64) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path).map_err(|e| VideoError::SourceUnavailable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self::new(vec![Frame::new(image.to_rgb8())], frame_rate))
    }

    /// Mark the clip as carrying an audio track
    pub fn with_audio(mut self, has_audio: bool) -> Self {
        self.metadata.has_audio = has_audio;
        self
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for MemoryClip {
    fn metadata(&self) -> &ClipMetadata {
        &self.metadata
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.frames.pop_front())
    }

    fn close(&mut self) -> Result<()> {
        self.frames.clear();
        Ok(())
    }
}

/// Open a clip for decoding
///
/// Still images open as one-frame clips at `default_fps`; everything else
/// goes through ffmpeg. Fails with `SourceUnavailable` when the path cannot
/// be decoded.
pub fn open_clip<P: AsRef<Path>>(path: P, default_fps: f64) -> Result<Box<dyn FrameSource>> {
    let path = path.as_ref();

    if !path.is_file() {
        return Err(VideoError::SourceUnavailable {
            path: path.display().to_string(),
            reason: "file does not exist".to_string(),
        }
        .into());
    }

    if is_image_file(path) {
        debug!("Opening still image {:?} as a single-frame clip", path);
        return Ok(Box::new(MemoryClip::from_image(path, default_fps)?));
    }

    let clip = FfmpegClip::open(path)?;
    let meta = clip.metadata();
    info!(
        "Opened {:?}: {}x{} @ {:.2} fps, {} frames{}",
        path,
        meta.width,
        meta.height,
        meta.frame_rate,
        meta.frame_count,
        if meta.has_audio { ", with audio" } else { "" }
    );
    Ok(Box::new(clip))
}

pub fn is_image_file<P: AsRef<Path>>(path: P) -> bool {
    match path.as_ref().extension().and_then(|ext| ext.to_str()) {
        Some(ext) => matches!(ext.to_lowercase().as_str(), "jpg" | "jpeg" | "png" | "bmp"),
        None => false,
    }
}
