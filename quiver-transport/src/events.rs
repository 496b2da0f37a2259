// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// The interfaces a send stream uses to talk to the rest of the
// connection, and the one-shot cancel signal handed to applications.

use std::sync::Mutex;

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};

use crate::{frame::Frame, stream_id::StreamId};

/// Callbacks from a stream up into the connection.  Implementations are
/// invoked without any stream lock held, possibly from several threads
/// at once.
pub trait StreamEvents: Send + Sync {
    /// Edge-triggered and possibly redundant: the stream has frames or
    /// data the assembler should come and collect.
    fn on_has_stream_data(&self, stream_id: StreamId);

    /// Hand a control frame (`RESET_STREAM`, `STREAM_DATA_BLOCKED`) to
    /// the packet assembler.
    fn queue_control_frame(&self, frame: Frame);

    /// The stream has finished its work.  Called at most once per
    /// stream.
    fn on_stream_completed(&self, stream_id: StreamId);
}

/// A one-shot broadcast event marking the logical end of a stream's
/// lifecycle.  Fired on close, cancel, peer `STOP_SENDING`, and
/// shutdown; clones observe the same event.
#[derive(Clone, Debug)]
pub struct CancelSignal {
    rx: Receiver<()>,
}

impl CancelSignal {
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Block until the signal fires.  Returns immediately if it already
    /// has.
    pub fn wait(&self) {
        // Nothing is ever sent; recv returns once the sender is gone.
        let _ = self.rx.recv();
    }
}

/// The firing side of a [`CancelSignal`].
#[derive(Debug)]
pub(crate) struct CancelHandle {
    tx: Mutex<Option<Sender<()>>>,
}

impl CancelHandle {
    pub fn new() -> (Self, CancelSignal) {
        let (tx, rx) = bounded(0);
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            CancelSignal { rx },
        )
    }

    /// Fire the signal.  Idempotent.
    pub fn fire(&self) {
        self.tx.lock().expect("cancel handle poisoned").take();
    }
}

#[cfg(test)]
mod tests {
    use std::{thread, time::Duration};

    use super::CancelHandle;

    #[test]
    fn fires_once_and_stays_fired() {
        let (handle, signal) = CancelHandle::new();
        assert!(!signal.is_canceled());
        handle.fire();
        assert!(signal.is_canceled());
        handle.fire();
        assert!(signal.is_canceled());
        signal.wait();
    }

    #[test]
    fn clones_observe_the_event() {
        let (handle, signal) = CancelHandle::new();
        let other = signal.clone();
        let waiter = thread::spawn(move || other.wait());
        thread::sleep(Duration::from_millis(10));
        handle.fire();
        waiter.join().expect("waiter exits");
        assert!(signal.is_canceled());
    }
}
