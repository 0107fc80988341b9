use std::path::Path;

use tracing::{debug, info};

use crate::config::{AudioConfig, VideoConfig};
use crate::error::{AudioError, Result, VideoError};
use crate::video::ffmpeg::{check_ffmpeg_available, run_ffmpeg};
use crate::video::source::{open_clip, FrameSource};
use crate::video::staging::StagedFrames;

/// Container-level operations the pipeline delegates to a media toolkit
///
/// Decoding, encoding and audio muxing all live behind this seam so the
/// frame loop never depends on a particular toolkit being installed.
pub trait MediaBackend: Send + Sync {
    /// Backend name
    fn name(&self) -> &str;

    /// Fail early when the toolkit cannot be used
    fn check_available(&self) -> Result<()>;

    /// Open a clip for sequential decoding
    fn open_clip(&self, path: &Path) -> Result<Box<dyn FrameSource>>;

    /// Copy the first audio stream of `source` into `artifact`
    fn extract_audio(&self, source: &Path, artifact: &Path) -> Result<()>;

    /// Assemble staged frames into a video at `frame_rate`
    fn encode(&self, frames: &StagedFrames, frame_rate: f64, output: &Path) -> Result<()>;

    /// Write `muxed`: the frames of `video` with the audio of `audio`
    fn attach_audio(&self, video: &Path, audio: &Path, muxed: &Path) -> Result<()>;
}

/// Backend driving the external `ffmpeg` and `ffprobe` executables
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    video: VideoConfig,
    audio: AudioConfig,
}

impl FfmpegBackend {
    pub fn new(video: VideoConfig, audio: AudioConfig) -> Self {
        Self { video, audio }
    }

    fn encode_args(&self, frames: &StagedFrames, frame_rate: f64, output: &Path) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-v".to_string(),
            "error".to_string(),
            "-framerate".to_string(),
            frame_rate.to_string(),
            "-start_number".to_string(),
            "0".to_string(),
            "-i".to_string(),
            frames.pattern.display().to_string(),
            "-frames:v".to_string(),
            frames.count.to_string(),
            "-c:v".to_string(),
            self.video.codec.clone(),
        ];

        if uses_crf(&self.video.codec) {
            args.push("-crf".to_string());
            args.push(quality_to_crf(self.video.quality).to_string());
        } else {
            args.push("-q:v".to_string());
            args.push(quality_to_qscale(self.video.quality).to_string());
        }

        args.extend([
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-r".to_string(),
            frame_rate.to_string(),
            output.display().to_string(),
        ]);
        args
    }

    fn mux_args(&self, video: &Path, audio: &Path, muxed: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-v".to_string(),
            "error".to_string(),
            "-i".to_string(),
            video.display().to_string(),
            "-i".to_string(),
            audio.display().to_string(),
            "-map".to_string(),
            "0:v:0".to_string(),
            "-map".to_string(),
            "1:a:0".to_string(),
            "-c:v".to_string(),
            "copy".to_string(),
            "-c:a".to_string(),
            self.audio.codec.clone(),
            "-shortest".to_string(),
            muxed.display().to_string(),
        ]
    }
}

impl MediaBackend for FfmpegBackend {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn check_available(&self) -> Result<()> {
        if !check_ffmpeg_available() {
            return Err(VideoError::FfmpegMissing.into());
        }
        Ok(())
    }

    fn open_clip(&self, path: &Path) -> Result<Box<dyn FrameSource>> {
        open_clip(path, self.video.default_fps)
    }

    fn extract_audio(&self, source: &Path, artifact: &Path) -> Result<()> {
        info!("Extracting reference audio to {:?}", artifact);
        let args = vec![
            "-y".to_string(),
            "-v".to_string(),
            "error".to_string(),
            "-i".to_string(),
            source.display().to_string(),
            "-vn".to_string(),
            "-map".to_string(),
            "0:a:0".to_string(),
            artifact.display().to_string(),
        ];

        run_ffmpeg(&args).map_err(|reason| AudioError::ExtractFailed {
            path: source.display().to_string(),
            reason,
        })?;
        Ok(())
    }

    fn encode(&self, frames: &StagedFrames, frame_rate: f64, output: &Path) -> Result<()> {
        info!(
            "Compiling {} frames into {:?} at {:.3} fps",
            frames.count, output, frame_rate
        );
        let args = self.encode_args(frames, frame_rate, output);
        run_ffmpeg(&args).map_err(|reason| VideoError::EncodingFailed { reason })?;
        debug!("Encoded {:?}", output);
        Ok(())
    }

    fn attach_audio(&self, video: &Path, audio: &Path, muxed: &Path) -> Result<()> {
        info!("Attaching audio {:?} to {:?} -> {:?}", audio, video, muxed);
        let args = self.mux_args(video, audio, muxed);
        run_ffmpeg(&args).map_err(|reason| AudioError::MuxFailed { reason })?;
        Ok(())
    }
}

fn uses_crf(codec: &str) -> bool {
    matches!(
        codec,
        "h264" | "libx264" | "hevc" | "h265" | "libx265" | "libvpx-vp9" | "libaom-av1" | "libsvtav1"
    )
}

fn quality_to_crf(quality: u8) -> u8 {
    51 - ((quality.min(100) as f32 / 100.0) * 51.0) as u8
}

/// mpeg4-style qscale: 2 is best, 31 worst
fn quality_to_qscale(quality: u8) -> u8 {
    (31 - ((quality.min(100) as f32 / 100.0) * 29.0) as u8).clamp(2, 31)
}
