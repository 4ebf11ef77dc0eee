pub mod candidates;
pub mod dispatcher;
pub mod mailer;
pub mod matcher;
pub mod owner;
pub mod report;
pub mod saved_search_notifications;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

pub use report::{NotificationRun, OutcomeStatus, SearchOutcome};
pub use saved_search_notifications::{JobError, SavedSearchNotifier};
pub use scheduler::{DailySchedule, NotificationScheduler};
