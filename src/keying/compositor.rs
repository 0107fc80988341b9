use image::{ImageBuffer, RgbImage};
use rayon::prelude::*;
use tracing::trace;

use crate::error::{KeyError, Result};
use crate::keying::mask::{segment, Mask, SELECTED};
use crate::keying::types::KeyParams;
use crate::video::types::Frame;

/// Replaces the greenscreen of a foreground frame with a background frame
///
/// Stateless between calls: every `composite` works only on the pair it is
/// given. Steps:
///
/// 1. Resize both frames to the target resolution
/// 2. Segment greenscreen pixels by inclusive color range
/// 3. Dilate the mask with a rectangular element
/// 4. Invert it into a keep mask
/// 5. Masked copy of the foreground
/// 6. Fill zero-colored pixels from the background
///
/// Known limitation: step 6 cannot tell a pure black subject pixel from a
/// masked-out one, so true black in the foreground shows the background.
#[derive(Debug, Clone)]
pub struct ChromaKeyCompositor {
    params: KeyParams,
}

impl ChromaKeyCompositor {
    pub fn new(params: KeyParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &KeyParams {
        &self.params
    }

    /// Composite one foreground frame over one background frame
    pub fn composite(&self, foreground: &Frame, background: &Frame) -> Result<Frame> {
        if foreground.is_empty() || background.is_empty() {
            return Err(KeyError::EmptyFrame.into());
        }

        let filter = self.params.resize_filter.filter_type();
        let foreground = foreground.resized(self.params.resolution, filter);
        let background = background.resized(self.params.resolution, filter);

        let mask = self.greenscreen_mask(&foreground);
        let keep = mask.invert();
        let subject = extract_foreground(&foreground, &keep)?;

        trace!(
            greenscreen_pixels = mask.selected_count(),
            "Composited {}x{} frame",
            foreground.width(),
            foreground.height()
        );

        merge_over(&subject, &background)
    }

    /// Segmented and dilated greenscreen mask of an already normalized frame
    pub fn greenscreen_mask(&self, frame: &Frame) -> Mask {
        segment(frame, &self.params.bounds(), self.params.channel_order)
            .dilate(self.params.kernel_size)
    }
}

impl Default for ChromaKeyCompositor {
    fn default() -> Self {
        Self::new(KeyParams::default())
    }
}

/// Masked copy: keep the frame color where `keep` is selected, zero elsewhere
pub fn extract_foreground(frame: &Frame, keep: &Mask) -> Result<Frame> {
    check_dimensions(frame.dimensions(), keep.dimensions())?;

    let mut data = frame.as_rgb_bytes().to_vec();
    data.par_chunks_exact_mut(3)
        .zip(keep.as_raw().par_iter())
        .for_each(|(pixel, &value)| {
            if value != SELECTED {
                pixel.fill(0);
            }
        });

    Ok(Frame::new(to_image(frame.dimensions(), data)))
}

/// Take the background color wherever the subject pixel is exactly zero
pub fn merge_over(subject: &Frame, background: &Frame) -> Result<Frame> {
    check_dimensions(subject.dimensions(), background.dimensions())?;

    let mut data = subject.as_rgb_bytes().to_vec();
    data.par_chunks_exact_mut(3)
        .zip(background.as_rgb_bytes().par_chunks_exact(3))
        .for_each(|(pixel, bg)| {
            if pixel.iter().all(|&c| c == 0) {
                pixel.copy_from_slice(bg);
            }
        });

    Ok(Frame::new(to_image(subject.dimensions(), data)))
}

fn check_dimensions(expected: (u32, u32), actual: (u32, u32)) -> Result<()> {
    if expected != actual {
        return Err(KeyError::DimensionMismatch { expected, actual }.into());
    }
    Ok(())
}

fn to_image((width, height): (u32, u32), data: Vec<u8>) -> RgbImage {
    ImageBuffer::from_raw(width, height, data).unwrap_or_else(|| ImageBuffer::new(width, height))
}
