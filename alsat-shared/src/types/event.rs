use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// RabbitMQ Event envelope wrapping all domain events.
///
/// Routing key format: `alsat.{domain}.{entity}.{action}`
/// Example: `alsat.notifications.job.completed`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event<T: Serialize> {
    pub id: Uuid,
    pub source: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Option<Uuid>,
    pub user_id: Option<i32>,
    pub data: T,
}

impl<T: Serialize> Event<T> {
    pub fn new(source: impl Into<String>, event_type: impl Into<String>, data: T) -> Self {
        Self {
            id: Uuid::now_v7(),
            source: source.into(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            correlation_id: None,
            user_id: None,
            data,
        }
    }

    pub fn with_user(mut self, user_id: i32) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

/// RabbitMQ routing keys
pub mod routing_keys {
    // Notification job events
    pub const NOTIFICATIONS_JOB_COMPLETED: &str = "alsat.notifications.job.completed";
    pub const NOTIFICATIONS_JOB_FAILED: &str = "alsat.notifications.job.failed";
}

/// Common event data payloads
pub mod payloads {
    use serde::{Deserialize, Serialize};

    /// Message addressed to the site owner (title plus free-form body).
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct OwnerNotice {
        pub title: String,
        pub message: String,
    }
}
