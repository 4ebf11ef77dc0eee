//! Fixtures and recording doubles shared by the job tests.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Notify;

use alsat_shared::types::event::payloads::OwnerNotice;

use crate::jobs::dispatcher::{DispatchError, NotificationDispatcher};
use crate::jobs::mailer::{MailError, Mailer};
use crate::jobs::owner::{OwnerNotifier, OwnerNotifyError};
use crate::models::{Listing, SavedSearch, User};

/// Active listing in category 1, created an hour ago.
pub fn listing(id: i32, city: &str, price: i64) -> Listing {
    Listing {
        id,
        user_id: 500,
        category_id: 1,
        title: format!("listing {id}"),
        price,
        currency: "TRY".into(),
        city: city.into(),
        district: None,
        status: "active".into(),
        created_at: Utc::now() - Duration::hours(1),
    }
}

pub fn user(id: i32, email: Option<&str>) -> User {
    User {
        id,
        name: Some(format!("user {id}")),
        email: email.map(String::from),
        role: "user".into(),
    }
}

/// Eligible search with no watermark.
pub fn saved_search(id: i32, user_id: i32, filters: &str) -> SavedSearch {
    let created = Utc::now() - Duration::days(2);
    SavedSearch {
        id,
        user_id,
        name: format!("search {id}"),
        filters: filters.into(),
        email_notifications: true,
        is_active: true,
        last_notified_at: None,
        created_at: created,
        updated_at: created,
    }
}

#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
    failing: HashSet<String>,
}

impl RecordingMailer {
    pub fn failing_for(address: &str) -> Self {
        Self { failing: HashSet::from([address.to_string()]), ..Default::default() }
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), MailError> {
        if self.failing.contains(to) {
            return Err(MailError::Rejected(format!("mailbox {to} unavailable")));
        }
        self.sent.lock().unwrap().push(SentMail {
            to: to.into(),
            subject: subject.into(),
            html: html.into(),
        });
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DispatchCall {
    pub email: String,
    pub search_name: String,
    pub listing_ids: Vec<i32>,
}

#[derive(Default)]
pub struct RecordingDispatcher {
    calls: Mutex<Vec<DispatchCall>>,
    failing: HashSet<String>,
}

impl RecordingDispatcher {
    pub fn failing_for(address: &str) -> Self {
        Self { failing: HashSet::from([address.to_string()]), ..Default::default() }
    }

    pub fn calls(&self) -> Vec<DispatchCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn dispatch(
        &self,
        recipient_email: &str,
        _recipient_name: Option<&str>,
        search_name: &str,
        listings: &[Listing],
    ) -> Result<(), DispatchError> {
        self.calls.lock().unwrap().push(DispatchCall {
            email: recipient_email.into(),
            search_name: search_name.into(),
            listing_ids: listings.iter().map(|l| l.id).collect(),
        });
        if self.failing.contains(recipient_email) {
            return Err(MailError::Rejected(format!("mailbox {recipient_email} unavailable")).into());
        }
        Ok(())
    }
}

/// Dispatcher that parks until released, to hold a run open.
#[derive(Default)]
pub struct GatedDispatcher {
    pub entered: Notify,
    pub release: Notify,
}

#[async_trait]
impl NotificationDispatcher for GatedDispatcher {
    async fn dispatch(
        &self,
        _recipient_email: &str,
        _recipient_name: Option<&str>,
        _search_name: &str,
        _listings: &[Listing],
    ) -> Result<(), DispatchError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OwnerMode {
    #[default]
    Delivered,
    NotDelivered,
    Broken,
}

#[derive(Default)]
pub struct RecordingOwner {
    mode: OwnerMode,
    notices: Mutex<Vec<OwnerNotice>>,
}

impl RecordingOwner {
    pub fn new(mode: OwnerMode) -> Self {
        Self { mode, ..Default::default() }
    }

    pub fn notices(&self) -> Vec<OwnerNotice> {
        self.notices.lock().unwrap().clone()
    }
}

#[async_trait]
impl OwnerNotifier for RecordingOwner {
    async fn notify(&self, notice: &OwnerNotice) -> Result<bool, OwnerNotifyError> {
        self.notices.lock().unwrap().push(notice.clone());
        match self.mode {
            OwnerMode::Delivered => Ok(true),
            OwnerMode::NotDelivered => Ok(false),
            OwnerMode::Broken => Err(OwnerNotifyError::Other("owner channel misconfigured".into())),
        }
    }
}
