use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use alsat_shared::types::event::payloads::OwnerNotice;

pub const SUMMARY_TITLE: &str = "Saved Search Notifications Job Completed";
pub const FAILED_TITLE: &str = "Saved Search Notifications Job Failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Error,
}

/// What happened to one saved search during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub search_id: i32,
    pub search_name: String,
    pub user_id: i32,
    pub user_email: Option<String>,
    pub matching_listings: usize,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchOutcome {
    pub fn is_error(&self) -> bool {
        self.status == OutcomeStatus::Error
    }
}

/// Aggregate result of one notification run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRun {
    pub total_searches: usize,
    pub notifications_sent: usize,
    pub errors: usize,
    pub details: Vec<SearchOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl NotificationRun {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            total_searches: 0,
            notifications_sent: 0,
            errors: 0,
            details: Vec::new(),
            started_at,
            finished_at: None,
        }
    }

    /// Record a success. `notified` is true when a notification went out.
    pub fn record_success(
        &mut self,
        search_id: i32,
        search_name: &str,
        user_id: i32,
        user_email: &str,
        matching_listings: usize,
        notified: bool,
    ) {
        if notified {
            self.notifications_sent += 1;
        }
        self.details.push(SearchOutcome {
            search_id,
            search_name: search_name.to_string(),
            user_id,
            user_email: Some(user_email.to_string()),
            matching_listings,
            status: OutcomeStatus::Success,
            error: None,
        });
    }

    pub fn record_error(
        &mut self,
        search_id: i32,
        search_name: &str,
        user_id: i32,
        user_email: Option<&str>,
        matching_listings: usize,
        reason: impl Into<String>,
    ) {
        self.errors += 1;
        self.details.push(SearchOutcome {
            search_id,
            search_name: search_name.to_string(),
            user_id,
            user_email: user_email.map(String::from),
            matching_listings,
            status: OutcomeStatus::Error,
            error: Some(reason.into()),
        });
    }

    pub fn finish(&mut self, at: DateTime<Utc>) {
        self.finished_at = Some(at);
    }

    pub fn owner_summary(&self) -> OwnerNotice {
        let mut message = format!(
            "Total searches processed: {}\nNotifications sent: {}\nErrors: {}",
            self.total_searches, self.notifications_sent, self.errors
        );
        if !self.details.is_empty() {
            message.push_str("\n\nDetails:");
            for d in &self.details {
                let email = d.user_email.as_deref().unwrap_or("no email");
                let _ = write!(message, "\n- {} ({}): {} listings ", d.search_name, email, d.matching_listings);
                match &d.error {
                    Some(reason) if d.is_error() => {
                        let _ = write!(message, "❌ {reason}");
                    }
                    _ => message.push('✅'),
                }
            }
        }
        OwnerNotice { title: SUMMARY_TITLE.to_string(), message }
    }
}

pub fn failure_notice(error: &dyn std::error::Error) -> OwnerNotice {
    OwnerNotice {
        title: FAILED_TITLE.to_string(),
        message: format!("Error: {error}"),
    }
}
