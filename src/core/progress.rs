//! Progress event delivery with cancellation.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::ProgressEvent;

/// Sends progress events to the observer.
///
/// Once the run is cancelled, or a terminal event has been sent, every
/// further event is dropped.
pub struct ProgressEmitter {
    tx: mpsc::UnboundedSender<ProgressEvent>,
    cancel: CancellationToken,
    finished: AtomicBool,
}

impl ProgressEmitter {
    pub fn new(tx: mpsc::UnboundedSender<ProgressEvent>, cancel: CancellationToken) -> Self {
        Self {
            tx,
            cancel,
            finished: AtomicBool::new(false),
        }
    }

    /// Emitter plus the receiving end of its event stream
    pub fn channel(cancel: CancellationToken) -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx, cancel), rx)
    }

    /// Deliver an event; returns false if it was dropped
    pub fn emit(&self, event: ProgressEvent) -> bool {
        if self.cancel.is_cancelled() || self.finished.load(Ordering::SeqCst) {
            return false;
        }
        if event.is_terminal() && self.finished.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.tx.send(event).is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}
