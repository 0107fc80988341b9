use image::{imageops::FilterType, ImageBuffer, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

/// Represents a single decoded video frame
///
/// Thin wrapper around an RGB image buffer. The compositor treats frames
/// as immutable inputs and always produces new frames.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    buffer: RgbImage,
}

impl Frame {
    /// Create a new frame from an RGB image buffer
    pub fn new(buffer: RgbImage) -> Self {
        Self { buffer }
    }

    /// Create a new frame with the given dimensions filled with black
    pub fn new_black(width: u32, height: u32) -> Self {
        Self {
            buffer: ImageBuffer::new(width, height),
        }
    }

    /// Create a new frame with the given dimensions filled with an RGB color
    pub fn new_filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        let buffer = ImageBuffer::from_pixel(width, height, Rgb(color));
        Self { buffer }
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.buffer.dimensions()
    }

    /// True when the frame holds no pixels
    pub fn is_empty(&self) -> bool {
        self.buffer.width() == 0 || self.buffer.height() == 0
    }

    /// Get a pixel at the given coordinates (returns RGB array)
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.buffer.get_pixel(x, y).0
    }

    /// Set a pixel at the given coordinates
    pub fn set_pixel(&mut self, x: u32, y: u32, color: [u8; 3]) {
        self.buffer.put_pixel(x, y, Rgb(color));
    }

    /// Raw interleaved RGB samples, row-major
    pub fn as_rgb_bytes(&self) -> &[u8] {
        self.buffer.as_raw()
    }

    /// Create a frame from raw RGB bytes
    pub fn from_rgb_bytes(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        ImageBuffer::from_raw(width, height, data).map(|buffer| Self { buffer })
    }

    /// Return a copy resized to exactly `size`
    ///
    /// Frames already at the target size are cloned without resampling.
    pub fn resized(&self, size: (u32, u32), filter: FilterType) -> Frame {
        if self.dimensions() == size {
            return self.clone();
        }
        Frame::new(image::imageops::resize(&self.buffer, size.0, size.1, filter))
    }

    /// Save the frame as an image; format follows the path extension
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), image::ImageError> {
        self.buffer.save(path)
    }
}

/// Metadata of an opened clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipMetadata {
    /// Number of frames; estimated when the container does not report it
    pub frame_count: u64,

    /// Frames per second
    pub frame_rate: f64,

    /// Native width before normalization
    pub width: u32,

    /// Native height before normalization
    pub height: u32,

    /// Whether the container carries an audio stream
    pub has_audio: bool,
}

impl ClipMetadata {
    /// Zero-padding width for staged frame names
    pub fn index_width(&self) -> usize {
        self.frame_count.to_string().len()
    }
}
