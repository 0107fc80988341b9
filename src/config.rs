use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigError, Result},
    keying::KeyParams,
};

/// Main configuration for the greenscreen compositor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chroma key parameters
    pub keying: KeyParams,

    /// Output encoding settings
    pub video: VideoConfig,

    /// Frame staging settings
    pub staging: StagingConfig,

    /// Reference audio handling
    pub audio: AudioConfig,

    /// Frame loop settings
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidValue {
            key: "config".to_string(),
            value: e.to_string(),
        })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.keying.validate()?;
        self.video.validate()?;
        self.staging.validate()?;
        self.audio.validate()?;
        Ok(())
    }
}

/// Output encoding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// ffmpeg video codec for the assembled output
    pub codec: String,

    /// Quality setting (0-100, higher is better)
    pub quality: u8,

    /// Frame rate given to still-image clips
    pub default_fps: f64,

    /// Threads used for per-frame pixel work
    pub processing_threads: usize,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            // DivX-compatible, plays in an .avi like the historical output
            codec: "mpeg4".to_string(),
            quality: 85,
            default_fps: 30.0,
            processing_threads: num_cpus::get(),
        }
    }
}

impl VideoConfig {
    fn validate(&self) -> Result<()> {
        if self.codec.trim().is_empty() {
            return Err(invalid("video.codec", &self.codec));
        }

        if self.quality > 100 {
            return Err(invalid("video.quality", self.quality));
        }

        if !(self.default_fps > 0.0 && self.default_fps.is_finite()) {
            return Err(invalid("video.default_fps", self.default_fps));
        }

        if self.processing_threads == 0 {
            return Err(invalid("video.processing_threads", self.processing_threads));
        }

        Ok(())
    }
}

/// Frame staging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Directory the numbered frame images are written to
    pub directory: PathBuf,

    /// Image format extension for staged frames
    pub extension: String,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("img_stream"),
            extension: "png".to_string(),
        }
    }
}

impl StagingConfig {
    fn validate(&self) -> Result<()> {
        if self.directory.as_os_str().is_empty() {
            return Err(invalid("staging.directory", ""));
        }

        let ext = self.extension.trim_start_matches('.').to_lowercase();
        if !matches!(ext.as_str(), "png" | "bmp") {
            // Lossy formats would smear the hard mask edges.
            return Err(invalid("staging.extension", &self.extension));
        }

        Ok(())
    }
}

/// Reference audio configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Temporary file the reference audio is extracted to
    pub artifact: PathBuf,

    /// ffmpeg audio codec used when attaching the audio
    pub codec: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            artifact: PathBuf::from("ref_audio.mp3"),
            codec: "aac".to_string(),
        }
    }
}

impl AudioConfig {
    fn validate(&self) -> Result<()> {
        if self.artifact.as_os_str().is_empty() {
            return Err(invalid("audio.artifact", ""));
        }
        if self.codec.trim().is_empty() {
            return Err(invalid("audio.codec", &self.codec));
        }
        Ok(())
    }
}

/// Frame loop configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// How long each iteration waits for a cancel request, in milliseconds.
    /// Unset means one millisecond per frame-per-second of the reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_wait_ms: Option<u64>,
}

impl PipelineConfig {
    pub fn poll_wait(&self, frame_rate: f64) -> Duration {
        let millis = match self.poll_wait_ms {
            Some(ms) => ms,
            None if frame_rate.is_finite() && frame_rate > 0.0 => frame_rate as u64,
            None => 0,
        };
        Duration::from_millis(millis)
    }
}

fn invalid<V: ToString>(key: &str, value: V) -> crate::error::CompositorError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
    .into()
}
