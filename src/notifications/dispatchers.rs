use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{Notification, NotificationCategory, NotificationDispatcher, NotificationError};

/// drops every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDispatcher;

impl NotificationDispatcher for NoopDispatcher {
    fn notify(&self, _notification: Notification) -> Result<(), NotificationError> {
        Ok(())
    }
}

/// keeps delivered notifications in memory
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<Notification>>,
    failing: AtomicBool,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// reject every notification until switched back
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    pub fn sent_in(&self, category: NotificationCategory) -> Vec<Notification> {
        self.sent()
            .into_iter()
            .filter(|n| n.category == category)
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.clear();
        }
    }
}

impl NotificationDispatcher for RecordingDispatcher {
    fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotificationError::Unavailable("recording dispatcher set to fail".to_string()));
        }
        self.sent
            .lock()
            .map_err(|_| NotificationError::Unavailable("recording dispatcher poisoned".to_string()))?
            .push(notification);
        Ok(())
    }
}
