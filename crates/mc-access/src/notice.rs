//! User-visible notices
//!
//! Broadcast of credential-action outcomes. A UI renders these as toasts.

use tokio::sync::broadcast;
use tracing::debug;

use mc_common::Notice;

const NOTICE_CAPACITY: usize = 32;

#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notice>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(NOTICE_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, notice: Notice) {
        debug!(level = ?notice.level, message = %notice.message, "Notice");
        // No listeners is fine
        let _ = self.tx.send(notice);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.publish(Notice::success(message));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.publish(Notice::error(message));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }
}
