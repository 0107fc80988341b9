use thiserror::Error;

/// Main error type for the greenscreen compositor
#[derive(Error, Debug)]
pub enum CompositorError {
    #[error("Video processing error: {0}")]
    Video(#[from] VideoError),

    #[error("Staging error: {0}")]
    Staging(#[from] StagingError),

    #[error("Keying error: {0}")]
    Key(#[from] KeyError),

    #[error("Audio processing error: {0}")]
    Audio(#[from] AudioError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Decoder and encoder errors
#[derive(Error, Debug)]
pub enum VideoError {
    #[error("Source unavailable: {path} ({reason})")]
    SourceUnavailable { path: String, reason: String },

    #[error("Video decoding failed: {reason}")]
    DecodingFailed { reason: String },

    #[error("Video encoding failed: {reason}")]
    EncodingFailed { reason: String },

    #[error("FFmpeg not found on PATH")]
    FfmpegMissing,
}

/// Failures persisting staged frames
#[derive(Error, Debug)]
pub enum StagingError {
    #[error("Failed to create staging directory: {path} - {reason}")]
    CreateDirFailed { path: String, reason: String },

    #[error("Failed to write staged frame: {path} - {reason}")]
    WriteFailed { path: String, reason: String },
}

/// Compositor input errors
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Frame has no pixels")]
    EmptyFrame,

    #[error("Dimension mismatch: {expected:?} vs {actual:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

/// Audio extraction and mux errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to extract audio from {path}: {reason}")]
    ExtractFailed { path: String, reason: String },

    #[error("Failed to attach audio: {reason}")]
    MuxFailed { reason: String },
}

/// Run orchestration errors
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No frames were staged, nothing to finalize")]
    NothingToFinalize,

    #[error("Frame loop task failed: {reason}")]
    Join { reason: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path} - {reason}")]
    ParseFailed { path: String, reason: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using CompositorError
pub type Result<T> = std::result::Result<T, CompositorError>;

impl CompositorError {
    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Video(VideoError::SourceUnavailable { path, .. }) => {
                format!("Could not open video '{}'. Please check the file exists and is a supported format.", path)
            }
            Self::Video(VideoError::FfmpegMissing) => {
                "FFmpeg and ffprobe are required. Please install FFmpeg and make sure it is on PATH.".to_string()
            }
            Self::Staging(StagingError::WriteFailed { path, .. }) => {
                format!("Could not write frame '{}'. Check free disk space and permissions.", path)
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_errors_convert() {
        let err: CompositorError = VideoError::SourceUnavailable {
            path: "missing.mp4".to_string(),
            reason: "no such file".to_string(),
        }
        .into();

        assert!(matches!(err, CompositorError::Video(_)));
        assert!(err.user_message().contains("missing.mp4"));
    }

    #[test]
    fn test_staging_message_names_path() {
        let err: CompositorError = StagingError::WriteFailed {
            path: "img_stream/07.png".to_string(),
            reason: "disk full".to_string(),
        }
        .into();

        assert!(err.to_string().contains("disk full"));
        assert!(err.user_message().contains("img_stream/07.png"));
    }
}
