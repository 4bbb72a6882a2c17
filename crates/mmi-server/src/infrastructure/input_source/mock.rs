//! Mock input source for unit and integration testing.
//!
//! Allows tests to inject synthetic [`RawInputEvent`]s without any device
//! node or kernel input layer.

use std::sync::{
    mpsc::{self, Sender},
    Mutex, PoisonError,
};

use super::{CaptureError, InputSource, RawInputEvent};

/// A mock implementation of [`InputSource`] that lets tests inject events.
#[derive(Default)]
pub struct MockInputSource {
    sender: Mutex<Option<Sender<RawInputEvent>>>,
}

impl MockInputSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Injects a synthetic event, as if read from a device.
    ///
    /// Returns `false` if the source is not started or the receiver is gone.
    pub fn inject_event(&self, event: RawInputEvent) -> bool {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(sender) => sender.send(event).is_ok(),
            None => false,
        }
    }
}

impl InputSource for MockInputSource {
    fn start(&self) -> Result<mpsc::Receiver<RawInputEvent>, CaptureError> {
        let mut guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_some() {
            return Err(CaptureError::AlreadyStarted);
        }
        let (tx, rx) = mpsc::channel();
        *guard = Some(tx);
        Ok(rx)
    }

    fn stop(&self) {
        // Dropping the sender closes the channel.
        *self.sender.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
