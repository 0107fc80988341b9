use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Channel order the decoder historically delivered samples in.
///
/// Frames are always held as RGB in memory. Color bounds are written in the
/// native order, so the segmentation step maps each pixel into that order
/// before testing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    #[default]
    Bgr,
    Rgb,
}

impl ChannelOrder {
    /// Reorder an RGB pixel into this native order
    #[inline]
    pub fn from_rgb(self, [r, g, b]: [u8; 3]) -> [u8; 3] {
        match self {
            ChannelOrder::Bgr => [b, g, r],
            ChannelOrder::Rgb => [r, g, b],
        }
    }
}

/// Interpolation used when normalizing frame dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    Nearest,
    /// Bilinear
    #[default]
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl ResizeFilter {
    pub fn filter_type(self) -> FilterType {
        match self {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Inclusive per-channel range, in native channel order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorBounds {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl ColorBounds {
    pub fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    /// True iff every channel lies within `[lower_c, upper_c]`
    #[inline]
    pub fn contains(&self, native: [u8; 3]) -> bool {
        (0..3).all(|c| self.lower[c] <= native[c] && native[c] <= self.upper[c])
    }
}

/// Tunable parameters of the chroma key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyParams {
    /// Target resolution (width, height) both frames are resized to
    pub resolution: (u32, u32),

    /// Lower greenscreen bound, native channel order
    pub lower: [u8; 3],

    /// Upper greenscreen bound, native channel order
    pub upper: [u8; 3],

    /// Rectangular structuring element size (width, height)
    pub kernel_size: (u32, u32),

    /// Decoder-native channel order the bounds are written in
    pub channel_order: ChannelOrder,

    /// Interpolation for dimension normalization
    pub resize_filter: ResizeFilter,
}

impl Default for KeyParams {
    fn default() -> Self {
        Self {
            resolution: (1280, 720),
            lower: [0, 170, 0],
            upper: [170, 255, 255],
            kernel_size: (3, 3),
            channel_order: ChannelOrder::Bgr,
            resize_filter: ResizeFilter::Triangle,
        }
    }
}

impl KeyParams {
    pub fn bounds(&self) -> ColorBounds {
        ColorBounds::new(self.lower, self.upper)
    }

    pub fn validate(&self) -> Result<()> {
        if self.resolution.0 == 0 || self.resolution.1 == 0 {
            return Err(ConfigError::InvalidValue {
                key: "keying.resolution".to_string(),
                value: format!("{}x{}", self.resolution.0, self.resolution.1),
            }
            .into());
        }

        if self.kernel_size.0 == 0 || self.kernel_size.1 == 0 {
            return Err(ConfigError::InvalidValue {
                key: "keying.kernel_size".to_string(),
                value: format!("{}x{}", self.kernel_size.0, self.kernel_size.1),
            }
            .into());
        }

        if (0..3).any(|c| self.lower[c] > self.upper[c]) {
            return Err(ConfigError::InvalidValue {
                key: "keying.bounds".to_string(),
                value: format!("{:?}-{:?}", self.lower, self.upper),
            }
            .into());
        }

        Ok(())
    }
}
