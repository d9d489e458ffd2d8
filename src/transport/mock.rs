//! Recording transport for testing
//!
//! Captures every notification in memory instead of sending it anywhere.

use super::{HostTransport, Notification};
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// In-memory transport that records notifications
///
/// Clones share the same log, so a test can keep one clone and hand the
/// other to the store.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<Notification>>>,
    fail_sends: Arc<AtomicBool>,
}

impl RecordingTransport {
    /// Create a new recording transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail (nothing is recorded while failing)
    pub fn set_failing(&self, failing: bool) {
        self.fail_sends.store(failing, Ordering::SeqCst);
    }

    /// Notifications recorded so far, oldest first
    pub fn notifications(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    /// Remove and return everything recorded so far
    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.sent.lock())
    }

    /// Get the number of notifications recorded
    pub fn len(&self) -> usize {
        self.sent.lock().len()
    }

    /// Check if nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.sent.lock().is_empty()
    }

    fn record(&self, notification: Notification) -> Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(Error::Transport("host link down".to_string()));
        }
        self.sent.lock().push(notification);
        Ok(())
    }
}

impl HostTransport for RecordingTransport {
    fn notify_write(&self, key: u16, payload: &[u8]) -> Result<()> {
        self.record(Notification::Write {
            key,
            payload: payload.to_vec(),
        })
    }

    fn notify_delete(&self, key: u16) -> Result<()> {
        self.record(Notification::Delete { key })
    }
}
