use image::{GrayImage, ImageBuffer, Luma};
use rayon::prelude::*;

use crate::keying::types::{ChannelOrder, ColorBounds};
use crate::video::types::Frame;

/// Value of a selected mask pixel
pub const SELECTED: u8 = 255;

/// Value of an unselected mask pixel
pub const NOT_SELECTED: u8 = 0;

/// Binary per-pixel selection map, same dimensions as its frame
#[derive(Clone, Debug, PartialEq)]
pub struct Mask {
    buffer: GrayImage,
}

impl Mask {
    /// Mask with nothing selected
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            buffer: ImageBuffer::new(width, height),
        }
    }

    /// Mask with every pixel selected
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            buffer: ImageBuffer::from_pixel(width, height, Luma([SELECTED])),
        }
    }

    /// Build a mask from raw values; anything non-zero counts as selected
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        let data = data
            .into_iter()
            .map(|v| if v == NOT_SELECTED { NOT_SELECTED } else { SELECTED })
            .collect();
        ImageBuffer::from_raw(width, height, data).map(|buffer| Self { buffer })
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

    pub fn is_selected(&self, x: u32, y: u32) -> bool {
        self.buffer.get_pixel(x, y).0[0] == SELECTED
    }

    pub fn set(&mut self, x: u32, y: u32, selected: bool) {
        let value = if selected { SELECTED } else { NOT_SELECTED };
        self.buffer.put_pixel(x, y, Luma([value]));
    }

    /// Number of selected pixels
    pub fn selected_count(&self) -> usize {
        self.buffer.as_raw().iter().filter(|&&v| v == SELECTED).count()
    }

    pub fn as_raw(&self) -> &[u8] {
        self.buffer.as_raw()
    }

    /// `255 - value` for every pixel
    pub fn invert(&self) -> Mask {
        let mut buffer = self.buffer.clone();
        for value in buffer.iter_mut() {
            *value = SELECTED - *value;
        }
        Mask { buffer }
    }

    /// Grayscale dilation with a `kernel.0 x kernel.1` rectangle
    ///
    /// The anchor sits at `(kw / 2, kh / 2)` and samples falling outside the
    /// image are ignored. A rectangle is separable, so this runs as a
    /// horizontal max pass followed by a vertical one.
    pub fn dilate(&self, kernel: (u32, u32)) -> Mask {
        let (width, height) = self.dimensions();
        if width == 0 || height == 0 {
            return self.clone();
        }
        let (w, h) = (width as usize, height as usize);
        let (kw, kh) = (kernel.0.max(1) as usize, kernel.1.max(1) as usize);
        let (ax, ay) = (kw / 2, kh / 2);

        let src = self.buffer.as_raw();

        let mut rows = vec![NOT_SELECTED; w * h];
        rows.par_chunks_mut(w).enumerate().for_each(|(y, out)| {
            let line = &src[y * w..(y + 1) * w];
            for (x, value) in out.iter_mut().enumerate() {
                let start = x.saturating_sub(ax);
                let end = (x + kw - ax).min(w);
                *value = line[start..end].iter().copied().max().unwrap_or(NOT_SELECTED);
            }
        });

        let mut dilated = vec![NOT_SELECTED; w * h];
        dilated.par_chunks_mut(w).enumerate().for_each(|(y, out)| {
            let start = y.saturating_sub(ay);
            let end = (y + kh - ay).min(h);
            for (x, value) in out.iter_mut().enumerate() {
                *value = (start..end)
                    .map(|yy| rows[yy * w + x])
                    .max()
                    .unwrap_or(NOT_SELECTED);
            }
        });

        Mask {
            buffer: ImageBuffer::from_raw(width, height, dilated)
                .unwrap_or_else(|| ImageBuffer::new(width, height)),
        }
    }
}

/// Mark every pixel whose native-order color lies within `bounds`
pub fn segment(frame: &Frame, bounds: &ColorBounds, order: ChannelOrder) -> Mask {
    let (width, height) = frame.dimensions();
    let pixels = frame.as_rgb_bytes();

    let mut values = vec![NOT_SELECTED; pixels.len() / 3];
    values
        .par_iter_mut()
        .zip(pixels.par_chunks_exact(3))
        .for_each(|(value, rgb)| {
            if bounds.contains(order.from_rgb([rgb[0], rgb[1], rgb[2]])) {
                *value = SELECTED;
            }
        });

    Mask {
        buffer: ImageBuffer::from_raw(width, height, values)
            .unwrap_or_else(|| ImageBuffer::new(width, height)),
    }
}
