//! # Chroma Keying
//!
//! Per-frame greenscreen removal: color-range segmentation, morphological
//! cleanup of the mask, masked foreground extraction and the merge with the
//! background frame.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use greenscreen_compositor::keying::{ChromaKeyCompositor, KeyParams};
//! use greenscreen_compositor::video::Frame;
//!
//! let compositor = ChromaKeyCompositor::new(KeyParams::default());
//! let filmed = Frame::new_filled(1920, 1080, [0, 255, 0]);
//! let reference = Frame::new_filled(1280, 720, [0, 0, 255]);
//!
//! let result = compositor.composite(&filmed, &reference)?;
//! assert_eq!(result.dimensions(), (1280, 720));
//! # Ok::<(), greenscreen_compositor::CompositorError>(())
//! ```

pub mod compositor;
pub mod mask;
pub mod types;

pub use compositor::{extract_foreground, merge_over, ChromaKeyCompositor};
pub use mask::{segment, Mask};
pub use types::{ChannelOrder, ColorBounds, KeyParams, ResizeFilter};
