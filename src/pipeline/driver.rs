use std::time::Duration;

use tracing::{debug, info};

use crate::error::Result;
use crate::keying::ChromaKeyCompositor;
use crate::pipeline::cancel::CancelSignal;
use crate::video::{FrameSink, FrameSource};

/// Lifecycle of a compositing run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Pulling and compositing frame pairs
    Running,
    /// A source ran out; staged frames are ready to finalize
    Exhausted,
    /// Stopped by the user; nothing gets finalized
    Cancelled,
    /// Output assembled
    Complete,
}

impl PipelineState {
    /// Only a normal end of input leads to output assembly
    pub fn needs_finalize(self) -> bool {
        self == PipelineState::Exhausted
    }
}

/// Result of the frame loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveReport {
    /// `Exhausted` or `Cancelled`
    pub state: PipelineState,

    /// Frames composited and handed to the sink
    pub frames: u64,
}

/// Composite paired frames from `filmed` and `reference` into `sink` in order
///
/// Stops as soon as either source is exhausted or `cancel` fires. The
/// cancel signal is polled once per iteration after the frame is staged.
pub fn drive(
    compositor: &ChromaKeyCompositor,
    filmed: &mut dyn FrameSource,
    reference: &mut dyn FrameSource,
    sink: &mut dyn FrameSink,
    cancel: &mut dyn CancelSignal,
    poll_wait: Duration,
) -> Result<DriveReport> {
    let mut state = PipelineState::Running;
    let mut index = 0u64;

    while state == PipelineState::Running {
        let foreground = filmed.next_frame()?;
        let background = reference.next_frame()?;

        let (foreground, background) = match (foreground, background) {
            (Some(fg), Some(bg)) => (fg, bg),
            (fg, bg) => {
                debug!(
                    filmed_done = fg.is_none(),
                    reference_done = bg.is_none(),
                    "Source exhausted after {} frames",
                    index
                );
                state = PipelineState::Exhausted;
                continue;
            }
        };

        let composited = compositor.composite(&foreground, &background)?;
        sink.write_frame(index, &composited)?;
        index += 1;

        if cancel.poll(poll_wait) {
            info!("Cancelled after {} frames", index);
            state = PipelineState::Cancelled;
        }
    }

    Ok(DriveReport {
        state,
        frames: index,
    })
}
