//! User-facing outcome notifications.
//!
//! The manager and the fetcher publish a [`Notice`] for every completed
//! operation; the presentation layer subscribes and decides how to show it.

use tokio::sync::broadcast;
use tracing::debug;

use crate::error::{ErrorCategory, FeedError, SettingsError};

const NOTICE_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
    /// Set for error notices.
    pub category: Option<ErrorCategory>,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            title: "Success".to_string(),
            message: message.into(),
            category: None,
        }
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            title: title.into(),
            message: message.into(),
            category: None,
        }
    }

    pub fn error(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: "Error".to_string(),
            message: message.into(),
            category: Some(category),
        }
    }
}

impl From<&SettingsError> for Notice {
    fn from(err: &SettingsError) -> Self {
        let message = match err.category() {
            ErrorCategory::AuthenticationCancelled | ErrorCategory::AuthenticationFailed => {
                "Failed to retrieve seed phrase. Authentication may have been cancelled."
                    .to_string()
            }
            _ => err.to_string(),
        };
        let mut notice = Notice::error(err.category(), message);
        if err.category() == ErrorCategory::NotFound {
            notice.title = "No Seed Phrase".to_string();
        }
        notice
    }
}

impl From<&FeedError> for Notice {
    fn from(err: &FeedError) -> Self {
        let message = match err {
            FeedError::ClientUnready => err.to_string(),
            other => format!("{other}\n\nPlease try again."),
        };
        Notice::error(err.category(), message)
    }
}

/// Fan-out for notices. Cloning shares the same channel.
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
        let (tx, _) = broadcast::channel(NOTICE_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    /// Publish a notice. Nobody listening is fine.
    pub fn emit(&self, notice: Notice) {
        debug!("Notice [{:?}] {}", notice.level, notice.title);
        let _ = self.tx.send(notice);
    }
}
