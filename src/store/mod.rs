mod models;
mod store;

pub use models::{Notification, NotificationFilter, NotificationStats, NotificationType};
pub use store::NotificationStore;
