use tokio::sync::broadcast;
use tracing::{info, warn};

pub const TITLE_SUCCESS: &str = "Success";
pub const TITLE_ERROR: &str = "Error";
pub const TITLE_INFO: &str = "Info";

pub const MSG_CREATED: &str = "Appointment created successfully";
pub const MSG_CANCELLED: &str = "Appointment cancelled";
pub const MSG_MISSING_FIELDS: &str = "Please fill in all required fields";
pub const MSG_CANCEL_FAILED: &str = "Error cancelling appointment";
pub const MSG_SEARCH_FAILED: &str = "Error searching patients";
pub const MSG_NEW_PATIENT: &str = "New Patient creation coming soon!";

const NOTIFICATION_BUFFER: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
    Info,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Success => "success",
            Severity::Error => "error",
            Severity::Info => "info",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub severity: Severity,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            title: TITLE_SUCCESS.to_string(),
            message: message.into(),
            severity: Severity::Success,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            title: TITLE_ERROR.to_string(),
            message: message.into(),
            severity: Severity::Error,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            title: TITLE_INFO.to_string(),
            message: message.into(),
            severity: Severity::Info,
        }
    }
}

#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notification>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(NOTIFICATION_BUFFER);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn publish(&self, notification: Notification) {
        match notification.severity {
            Severity::Error => warn!(
                title = %notification.title,
                message = %notification.message,
                "notification"
            ),
            Severity::Success | Severity::Info => info!(
                title = %notification.title,
                message = %notification.message,
                severity = notification.severity.as_str(),
                "notification"
            ),
        }
        // No subscribers is fine: nobody is rendering toasts right now.
        let _ = self.tx.send(notification);
    }
}
