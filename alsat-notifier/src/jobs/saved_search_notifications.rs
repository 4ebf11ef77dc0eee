use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration, Utc};
use metrics::{counter, histogram};

use crate::jobs::candidates::find_candidates;
use crate::jobs::dispatcher::{DispatchError, NotificationDispatcher};
use crate::jobs::owner::{OwnerNotifier, OwnerNotifyError};
use crate::jobs::report::{failure_notice, NotificationRun};
use crate::models::{SavedSearch, SavedSearchFilters, User};
use crate::store::{NotificationStore, StoreError};

pub const DEFAULT_LOOKBACK_HOURS: i64 = 12;

/// Failures that abort a whole run.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("a saved search notification run is already in progress")]
    AlreadyRunning,

    #[error("could not load saved searches")]
    LoadSearches(#[source] StoreError),

    #[error("could not deliver the run summary to the owner")]
    OwnerSummary(#[source] OwnerNotifyError),
}

/// Failures confined to a single saved search.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("user not found or has no email")]
    UserMissing,

    #[error("user lookup failed: {0}")]
    UserLookup(StoreError),

    #[error("invalid filters: {0}")]
    InvalidFilters(String),

    #[error("candidate lookup failed: {0}")]
    Candidates(StoreError),

    #[error("notification dispatch failed: {error}")]
    Dispatch { matched: usize, error: DispatchError },

    #[error("notification sent but watermark update failed: {error}")]
    Watermark { matched: usize, error: StoreError },
}

impl SearchError {
    pub fn matching_listings(&self) -> usize {
        match self {
            SearchError::Dispatch { matched, .. } | SearchError::Watermark { matched, .. } => *matched,
            _ => 0,
        }
    }
}

/// Clears the in-progress flag when dropped.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Finds new listings for every eligible saved search and notifies the owners.
pub struct SavedSearchNotifier {
    store: Arc<dyn NotificationStore>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    owner: Arc<dyn OwnerNotifier>,
    lookback: Duration,
    running: AtomicBool,
}

impl SavedSearchNotifier {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        owner: Arc<dyn OwnerNotifier>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            owner,
            lookback: Duration::hours(DEFAULT_LOOKBACK_HOURS),
            running: AtomicBool::new(false),
        }
    }

    pub fn with_lookback(mut self, lookback: Duration) -> Self {
        self.lookback = lookback;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run the job once. Overlapping calls fail with [`JobError::AlreadyRunning`].
    pub async fn run(&self) -> Result<NotificationRun, JobError> {
        let _guard = RunGuard::acquire(&self.running).ok_or(JobError::AlreadyRunning)?;
        counter!("saved_search_runs_total").increment(1);
        let timer = Instant::now();

        let result = self.process().await;
        histogram!("saved_search_run_duration_seconds").record(timer.elapsed().as_secs_f64());

        if let Err(e) = &result {
            tracing::error!(error = %e, "saved search notification job failed");
            if let Err(notify_err) = self.owner.notify(&failure_notice(e)).await {
                tracing::warn!(error = %notify_err, "failed to send job failure notice");
            }
        }
        result
    }

    async fn process(&self) -> Result<NotificationRun, JobError> {
        let mut run = NotificationRun::new(Utc::now());
        tracing::info!("saved search notification job starting");

        let searches = self.store.eligible_searches().await.map_err(JobError::LoadSearches)?;
        run.total_searches = searches.len();
        tracing::info!(count = searches.len(), "eligible saved searches loaded");

        for search in &searches {
            self.process_search(search, &mut run).await;
        }

        run.finish(Utc::now());
        tracing::info!(
            total = run.total_searches,
            sent = run.notifications_sent,
            errors = run.errors,
            "saved search notification job completed"
        );

        match self.owner.notify(&run.owner_summary()).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!("owner summary was not delivered"),
            Err(e) => return Err(JobError::OwnerSummary(e)),
        }

        Ok(run)
    }

    async fn process_search(&self, search: &SavedSearch, run: &mut NotificationRun) {
        let user = match self.store.find_user(search.user_id).await {
            Ok(user) => user,
            Err(e) => {
                self.record_failure(run, search, None, SearchError::UserLookup(e));
                return;
            }
        };

        let Some(email) = user.as_ref().and_then(User::deliverable_email) else {
            tracing::warn!(search_id = search.id, user_id = search.user_id, "user not found or has no email");
            self.record_failure(run, search, None, SearchError::UserMissing);
            return;
        };
        let name = user.as_ref().and_then(|u| u.name.as_deref());

        match self.notify_search(search, email, name).await {
            Ok((matched, notified)) => {
                if notified {
                    counter!("saved_search_notifications_sent_total").increment(1);
                }
                run.record_success(search.id, &search.name, search.user_id, email, matched, notified);
            }
            Err(e) => self.record_failure(run, search, Some(email), e),
        }
    }

    /// Returns the match count and whether a notification went out.
    async fn notify_search(
        &self,
        search: &SavedSearch,
        email: &str,
        name: Option<&str>,
    ) -> Result<(usize, bool), SearchError> {
        let filters = SavedSearchFilters::parse(&search.filters)
            .map_err(|e| SearchError::InvalidFilters(e.to_string()))?;

        let scanned_at = Utc::now();
        let listings = find_candidates(
            self.store.as_ref(),
            &filters,
            search.last_notified_at,
            scanned_at,
            self.lookback,
        )
        .await
        .map_err(SearchError::Candidates)?;

        let matched = listings.len();
        tracing::debug!(search_id = search.id, matched, "saved search matched listings");
        if matched == 0 {
            return Ok((0, false));
        }

        self.dispatcher
            .dispatch(email, name, &search.name, &listings)
            .await
            .map_err(|error| SearchError::Dispatch { matched, error })?;

        let advanced = self
            .store
            .mark_notified(search.id, scanned_at)
            .await
            .map_err(|error| SearchError::Watermark { matched, error })?;
        if !advanced {
            tracing::debug!(search_id = search.id, "watermark already at or past scan time");
        }

        Ok((matched, true))
    }

    fn record_failure(
        &self,
        run: &mut NotificationRun,
        search: &SavedSearch,
        email: Option<&str>,
        error: SearchError,
    ) {
        tracing::error!(search_id = search.id, error = %error, "saved search notification failed");
        counter!("saved_search_notification_errors_total").increment(1);
        run.record_error(
            search.id,
            &search.name,
            search.user_id,
            email,
            error.matching_listings(),
            error.to_string(),
        );
    }
}
