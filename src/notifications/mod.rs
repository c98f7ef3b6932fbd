pub mod center;

pub use center::{NewNotification, NotificationCenter, NotificationError};
