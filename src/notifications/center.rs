use std::collections::BTreeMap;

use chrono::{Duration, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::NotificationConfig;
use crate::models::{Notification, NotificationAction, NotificationCategory};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotificationError {
    #[error("Notification {0} not found")]
    NotFound(u64),
}

/// A new notification before it is given an id and timestamp.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub category: NotificationCategory,
    pub title: String,
    pub body: String,
    pub action: Option<NotificationAction>,
}

struct Inbox {
    entries: BTreeMap<u64, Notification>,
    next_id: u64,
}

/// In-memory inbox for the signed-in user's notifications.
///
/// Ids increase monotonically, so the map order is arrival order and the
/// oldest entry is evicted once `capacity` is exceeded.
pub struct NotificationCenter {
    inbox: RwLock<Inbox>,
    capacity: usize,
}

impl NotificationCenter {
    pub fn new(capacity: usize) -> Self {
        NotificationCenter {
            inbox: RwLock::new(Inbox {
                entries: BTreeMap::new(),
                next_id: 1,
            }),
            capacity: capacity.max(1),
        }
    }

    pub async fn from_config(config: &NotificationConfig) -> Self {
        let center = Self::new(config.capacity);
        if config.seed_samples {
            center.seed_samples().await;
        }
        center
    }

    /// All notifications, newest first.
    pub async fn list(&self) -> Vec<Notification> {
        let inbox = self.inbox.read().await;
        inbox.entries.values().rev().cloned().collect()
    }

    pub async fn unread_count(&self) -> usize {
        let inbox = self.inbox.read().await;
        inbox.entries.values().filter(|n| !n.read).count()
    }

    pub async fn mark_read(&self, id: u64) -> Result<Notification, NotificationError> {
        let mut inbox = self.inbox.write().await;
        let notification = inbox
            .entries
            .get_mut(&id)
            .ok_or(NotificationError::NotFound(id))?;
        notification.read = true;
        Ok(notification.clone())
    }

    /// Marks everything read and returns how many were unread.
    pub async fn mark_all_read(&self) -> usize {
        let mut inbox = self.inbox.write().await;
        let mut changed = 0;
        for notification in inbox.entries.values_mut().filter(|n| !n.read) {
            notification.read = true;
            changed += 1;
        }
        changed
    }

    pub async fn push(&self, new: NewNotification) -> Notification {
        self.insert(new, Utc::now(), false).await
    }

    async fn insert(
        &self,
        new: NewNotification,
        timestamp: chrono::DateTime<Utc>,
        read: bool,
    ) -> Notification {
        let mut inbox = self.inbox.write().await;
        let id = inbox.next_id;
        inbox.next_id += 1;

        let notification = Notification {
            id,
            category: new.category,
            title: new.title,
            body: new.body,
            timestamp,
            read,
            action: new.action,
        };
        inbox.entries.insert(id, notification.clone());

        while inbox.entries.len() > self.capacity {
            if let Some((evicted, _)) = inbox.entries.pop_first() {
                debug!("Evicted notification {}", evicted);
            }
        }
        notification
    }

    /// Fills the inbox with a fixed set of marketplace notifications.
    pub async fn seed_samples(&self) {
        let now = Utc::now();
        let samples = [
            (
                NotificationCategory::System,
                "Welcome to the marketplace",
                "Complete your profile to start receiving quotes.",
                Some(("/dashboard/profile", "Complete profile")),
                Duration::days(3),
                true,
            ),
            (
                NotificationCategory::Payment,
                "Deposit received",
                "The deposit for booking #1042 has cleared.",
                None,
                Duration::days(1),
                true,
            ),
            (
                NotificationCategory::Message,
                "New message from Ridgeline Rentals",
                "We can deliver the excavator on Monday morning.",
                Some(("/dashboard/messages", "Reply")),
                Duration::hours(5),
                false,
            ),
            (
                NotificationCategory::Booking,
                "Booking confirmed",
                "Your 20-ton crane rental starts on the 14th.",
                Some(("/dashboard/bookings", "View booking")),
                Duration::hours(2),
                false,
            ),
            (
                NotificationCategory::Quote,
                "New quote received",
                "A provider sent a quote for your drilling rig request.",
                Some(("/dashboard/quotes", "View quote")),
                Duration::minutes(15),
                false,
            ),
        ];

        for (category, title, body, action, age, read) in samples {
            let new = NewNotification {
                category,
                title: title.to_string(),
                body: body.to_string(),
                action: action.map(|(href, label)| NotificationAction {
                    href: href.to_string(),
                    label: label.to_string(),
                }),
            };
            self.insert(new, now - age, read).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(title: &str) -> NewNotification {
        NewNotification {
            category: NotificationCategory::Message,
            title: title.to_string(),
            body: "body".to_string(),
            action: None,
        }
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let center = NotificationCenter::new(10);
        center.push(message("first")).await;
        center.push(message("second")).await;

        let titles: Vec<_> = center.list().await.into_iter().map(|n| n.title).collect();
        assert_eq!(titles, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn test_oldest_is_evicted_beyond_capacity() {
        let center = NotificationCenter::new(2);
        let first = center.push(message("a")).await;
        center.push(message("b")).await;
        center.push(message("c")).await;

        let list = center.list().await;
        assert_eq!(list.len(), 2);
        assert!(list.iter().all(|n| n.id != first.id));
        assert_eq!(
            center.mark_read(first.id).await,
            Err(NotificationError::NotFound(first.id))
        );
    }

    #[tokio::test]
    async fn test_mark_read_updates_unread_count() {
        let center = NotificationCenter::new(10);
        let a = center.push(message("a")).await;
        center.push(message("b")).await;
        assert_eq!(center.unread_count().await, 2);

        let marked = center.mark_read(a.id).await.unwrap();
        assert!(marked.read);
        assert_eq!(center.unread_count().await, 1);

        // Marking twice is harmless.
        center.mark_read(a.id).await.unwrap();
        assert_eq!(center.unread_count().await, 1);
    }

    #[tokio::test]
    async fn test_mark_all_read() {
        let center = NotificationCenter::new(10);
        center.seed_samples().await;
        let unread = center.unread_count().await;
        assert_eq!(unread, 3);

        assert_eq!(center.mark_all_read().await, unread);
        assert_eq!(center.unread_count().await, 0);
        assert_eq!(center.mark_all_read().await, 0);
    }

    #[tokio::test]
    async fn test_seeded_samples_are_ordered_by_time() {
        let center = NotificationCenter::from_config(&NotificationConfig::default()).await;

        let list = center.list().await;
        assert_eq!(list.len(), 5);
        assert_eq!(list[0].category, NotificationCategory::Quote);
        assert!(list.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    }

    #[tokio::test]
    async fn test_seeding_can_be_disabled() {
        let config = NotificationConfig {
            capacity: 5,
            seed_samples: false,
        };
        let center = NotificationCenter::from_config(&config).await;
        assert!(center.list().await.is_empty());
    }
}
