use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a notification is about; drives the icon in the dropdown.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationCategory {
    Quote,
    Booking,
    Message,
    Payment,
    System,
}

/// Optional call to action attached to a notification.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NotificationAction {
    pub href: String,
    pub label: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: u64,
    pub category: NotificationCategory,
    pub title: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
    pub action: Option<NotificationAction>,
}
