use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, StagingError};
use crate::video::types::Frame;

/// Ordered destination for composited frames
pub trait FrameSink: Send {
    /// Persist frame `index`; indices arrive in order starting at 0
    fn write_frame(&mut self, index: u64, frame: &Frame) -> Result<()>;

    /// Number of frames written so far
    fn frames_written(&self) -> u64;
}

/// Frames staged on disk for final assembly
#[derive(Debug, Clone, PartialEq)]
pub struct StagedFrames {
    /// printf-style pattern ffmpeg reads the sequence with, e.g. `img_stream/%03d.png`
    pub pattern: PathBuf,

    /// Frames `0..count` belong to the current run
    pub count: u64,
}

/// Directory of zero-padded, sequentially numbered frame images
///
/// Created if absent and never cleaned up, so a cancelled run leaves its
/// partial output behind for inspection.
#[derive(Debug)]
pub struct StagingDir {
    dir: PathBuf,
    index_width: usize,
    extension: String,
    written: u64,
}

impl StagingDir {
    pub fn create<P: AsRef<Path>>(dir: P, index_width: usize, extension: &str) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| StagingError::CreateDirFailed {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;
        debug!("Staging frames in {:?}", dir);

        Ok(Self {
            dir: dir.to_path_buf(),
            index_width: index_width.max(1),
            extension: extension.trim_start_matches('.').to_string(),
            written: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of frame `index`, e.g. `img_stream/007.png`
    pub fn frame_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!(
            "{:0width$}.{}",
            index,
            self.extension,
            width = self.index_width
        ))
    }

    pub fn staged(&self) -> StagedFrames {
        StagedFrames {
            pattern: self
                .dir
                .join(format!("%0{}d.{}", self.index_width, self.extension)),
            count: self.written,
        }
    }
}

impl FrameSink for StagingDir {
    fn write_frame(&mut self, index: u64, frame: &Frame) -> Result<()> {
        let path = self.frame_path(index);
        frame.save(&path).map_err(|e| StagingError::WriteFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        info!("Saving frame {}", path.display());
        self.written += 1;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompositorError;
    use tempfile::tempdir;

    #[test]
    fn test_frame_names_are_zero_padded() {
        let dir = tempdir().unwrap();
        let staging = StagingDir::create(dir.path().join("img_stream"), 3, "png").unwrap();

        assert_eq!(staging.frame_path(7), dir.path().join("img_stream/007.png"));
        assert_eq!(staging.frame_path(123), dir.path().join("img_stream/123.png"));
        assert_eq!(staging.staged().pattern, dir.path().join("img_stream/%03d.png"));
    }

    #[test]
    fn test_write_creates_png_and_counts() {
        let dir = tempdir().unwrap();
        let mut staging = StagingDir::create(dir.path().join("frames"), 2, ".png").unwrap();

        let frame = Frame::new_filled(3, 2, [40, 50, 60]);
        staging.write_frame(0, &frame).unwrap();
        staging.write_frame(1, &frame).unwrap();

        assert_eq!(staging.frames_written(), 2);
        assert_eq!(staging.staged().count, 2);

        let loaded = image::open(dir.path().join("frames/01.png")).unwrap().to_rgb8();
        assert_eq!(Frame::new(loaded), frame);
    }

    #[test]
    fn test_existing_directory_is_reused() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("img_stream");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("keep.txt"), b"old run").unwrap();

        StagingDir::create(&target, 1, "png").unwrap();
        assert!(target.join("keep.txt").exists());
    }

    #[test]
    fn test_write_failure_is_staging_error() {
        let dir = tempdir().unwrap();
        let mut staging = StagingDir::create(dir.path().join("gone"), 1, "png").unwrap();
        std::fs::remove_dir(dir.path().join("gone")).unwrap();

        let err = staging.write_frame(0, &Frame::new_black(1, 1)).unwrap_err();
        assert!(matches!(
            err,
            CompositorError::Staging(StagingError::WriteFailed { .. })
        ));
        assert_eq!(staging.frames_written(), 0);
    }
}
