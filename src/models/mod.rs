pub mod notification;
pub mod session;

pub use notification::{Notification, NotificationAction, NotificationCategory};
pub use session::{AuthEvent, ResendStatus, Role, Session};
