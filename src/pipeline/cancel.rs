use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

use tracing::{debug, warn};

/// User stop request, polled once between frames
pub trait CancelSignal: Send {
    /// Wait up to `wait` for a stop request; true once one has arrived
    fn poll(&mut self, wait: Duration) -> bool;
}

/// Signal that never fires
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverCancel;

impl CancelSignal for NeverCancel {
    fn poll(&mut self, _wait: Duration) -> bool {
        false
    }
}

/// Handle that requests a stop from another thread or task
#[derive(Debug, Clone)]
pub struct CancelTrigger {
    tx: Sender<()>,
}

impl CancelTrigger {
    pub fn cancel(&self) {
        // A dropped receiver means the run is already over.
        let _ = self.tx.send(());
    }
}

/// Channel-backed signal; latches once triggered
#[derive(Debug)]
pub struct InterruptSignal {
    rx: Receiver<()>,
    tripped: bool,
}

impl InterruptSignal {
    pub fn channel() -> (CancelTrigger, InterruptSignal) {
        let (tx, rx) = mpsc::channel();
        (CancelTrigger { tx }, InterruptSignal { rx, tripped: false })
    }

    /// Fire on Ctrl-C. Must be called from within a tokio runtime.
    pub fn ctrl_c() -> InterruptSignal {
        let (trigger, signal) = Self::channel();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    warn!("Interrupt received, stopping after the current frame");
                    trigger.cancel();
                }
                Err(e) => warn!("Could not listen for Ctrl-C: {}", e),
            }
        });
        signal
    }
}

impl CancelSignal for InterruptSignal {
    fn poll(&mut self, wait: Duration) -> bool {
        if self.tripped {
            return true;
        }

        let received = if wait.is_zero() {
            match self.rx.try_recv() {
                Ok(()) => true,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => false,
            }
        } else {
            match self.rx.recv_timeout(wait) {
                Ok(()) => true,
                Err(RecvTimeoutError::Timeout) => false,
                // Nobody can trigger any more; don't keep sleeping.
                Err(RecvTimeoutError::Disconnected) => false,
            }
        };

        if received {
            debug!("Cancel signal observed");
            self.tripped = true;
        }
        self.tripped
    }
}
