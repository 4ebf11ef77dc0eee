//! Wall-clock scheduling of the saved search notification job.
//!
//! [`NotificationScheduler`] owns one background task that sleeps until the
//! next configured time of day, runs the job, and repeats until stopped.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, FixedOffset, NaiveTime, TimeZone, Utc};
use tokio::sync::watch;

use crate::jobs::saved_search_notifications::SavedSearchNotifier;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("invalid time of day '{0}', expected HH:MM")]
    InvalidTime(String),

    #[error("invalid UTC offset '{0}', expected +HH:MM or -HH:MM")]
    InvalidOffset(String),

    #[error("schedule has no times")]
    Empty,
}

/// A set of times of day in a fixed UTC offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailySchedule {
    times: Vec<NaiveTime>,
    offset: FixedOffset,
}

impl DailySchedule {
    pub fn new(mut times: Vec<NaiveTime>, offset: FixedOffset) -> Result<Self, ScheduleError> {
        if times.is_empty() {
            return Err(ScheduleError::Empty);
        }
        times.sort();
        times.dedup();
        Ok(Self { times, offset })
    }

    /// Parse `"08:00,20:00"` and `"+03:00"`.
    pub fn parse(times: &str, offset: &str) -> Result<Self, ScheduleError> {
        let times = times
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| {
                NaiveTime::parse_from_str(t, "%H:%M")
                    .map_err(|_| ScheduleError::InvalidTime(t.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(times, parse_offset(offset)?)
    }

    pub fn times(&self) -> &[NaiveTime] {
        &self.times
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Next instant to fire at. Never returns `last_fired` again, even if
    /// the wall clock reads slightly earlier than it.
    pub fn next_run(
        &self,
        now: DateTime<Utc>,
        last_fired: Option<DateTime<Utc>>,
    ) -> Option<DateTime<Utc>> {
        self.next_after(last_fired.map_or(now, |fired| fired.max(now)))
    }

    /// First scheduled instant strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let today = now.with_timezone(&self.offset).date_naive();
        [today, today.succ_opt()?]
            .into_iter()
            .flat_map(|date| self.times.iter().map(move |t| date.and_time(*t)))
            .filter_map(|local| self.offset.from_local_datetime(&local).single())
            .map(|at| at.with_timezone(&Utc))
            .find(|at| *at > now)
    }
}

fn parse_offset(raw: &str) -> Result<FixedOffset, ScheduleError> {
    let invalid = || ScheduleError::InvalidOffset(raw.to_string());
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(invalid);
    }

    let (sign, rest) = if let Some(rest) = raw.strip_prefix('+') {
        (1, rest)
    } else if let Some(rest) = raw.strip_prefix('-') {
        (-1, rest)
    } else {
        return Err(invalid());
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 14 || minutes > 59 {
        return Err(invalid());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

struct RunningTask {
    stop: watch::Sender<bool>,
}

/// Handle over the background trigger loop.
pub struct NotificationScheduler {
    notifier: Arc<SavedSearchNotifier>,
    schedule: DailySchedule,
    running: Mutex<Option<RunningTask>>,
}

impl NotificationScheduler {
    pub fn new(notifier: Arc<SavedSearchNotifier>, schedule: DailySchedule) -> Self {
        Self {
            notifier,
            schedule,
            running: Mutex::new(None),
        }
    }

    pub fn is_started(&self) -> bool {
        self.running.lock().map(|r| r.is_some()).unwrap_or(false)
    }

    /// Spawn the trigger loop. Returns `false` if it was already running.
    pub fn start(&self) -> bool {
        let Ok(mut running) = self.running.lock() else {
            tracing::error!("scheduler state lock poisoned");
            return false;
        };
        if running.is_some() {
            tracing::info!("notification scheduler already started, skipping");
            return false;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        tokio::spawn(trigger_loop(self.notifier.clone(), self.schedule.clone(), stop_rx));
        *running = Some(RunningTask { stop: stop_tx });

        let times: Vec<String> = self.schedule.times.iter().map(|t| t.format("%H:%M").to_string()).collect();
        tracing::info!(
            times = %times.join(","),
            offset = %self.schedule.offset,
            "notification scheduler started"
        );
        true
    }

    /// Stop future triggers. A run already in progress finishes on its own.
    pub fn stop(&self) -> bool {
        let task = self.running.lock().ok().and_then(|mut r| r.take());
        match task {
            Some(task) => {
                let _ = task.stop.send(true);
                tracing::info!("notification scheduler stopped");
                true
            }
            None => false,
        }
    }
}

impl Drop for NotificationScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn trigger_loop(
    notifier: Arc<SavedSearchNotifier>,
    schedule: DailySchedule,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut last_fired = None;
    loop {
        let now = Utc::now();
        let Some(next) = schedule.next_run(now, last_fired) else {
            tracing::error!("could not compute next notification run, scheduler exiting");
            return;
        };
        let wait = (next - now).to_std().unwrap_or_default();
        tracing::debug!(next_run = %next, "next saved search notification run");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = stop_rx.changed() => return,
        }
        if *stop_rx.borrow() {
            return;
        }

        last_fired = Some(next);
        run_once(&notifier).await;
    }
}

/// Run the job and log the outcome. Never fails.
pub async fn run_once(notifier: &SavedSearchNotifier) {
    tracing::info!("triggering saved search notifications");
    match notifier.run().await {
        Ok(run) => tracing::info!(
            total = run.total_searches,
            sent = run.notifications_sent,
            errors = run.errors,
            "scheduled notification job completed"
        ),
        Err(e) => tracing::error!(error = %e, "scheduled notification job failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::report::{FAILED_TITLE, SUMMARY_TITLE};
    use crate::jobs::testing::{listing, saved_search, user, RecordingDispatcher, RecordingOwner};
    use crate::store::MemoryStore;

    fn istanbul() -> DailySchedule {
        DailySchedule::parse("20:00, 08:00", "+03:00").unwrap()
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn parse_sorts_times_and_reads_offset() {
        let schedule = istanbul();
        assert_eq!(
            schedule.times(),
            &[NaiveTime::from_hms_opt(8, 0, 0).unwrap(), NaiveTime::from_hms_opt(20, 0, 0).unwrap()]
        );
        assert_eq!(schedule.offset().local_minus_utc(), 3 * 3600);
        assert_eq!(DailySchedule::parse("06:30", "-04:30").unwrap().offset().local_minus_utc(), -(4 * 3600 + 1800));
        assert_eq!(DailySchedule::parse("06:30", "UTC").unwrap().offset().local_minus_utc(), 0);
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert_eq!(DailySchedule::parse("", "+03:00"), Err(ScheduleError::Empty));
        assert_eq!(
            DailySchedule::parse("8am", "+03:00"),
            Err(ScheduleError::InvalidTime("8am".into()))
        );
        assert_eq!(
            DailySchedule::parse("08:00", "Europe/Istanbul"),
            Err(ScheduleError::InvalidOffset("Europe/Istanbul".into()))
        );
        assert!(DailySchedule::parse("08:00", "+15:00").is_err());
    }

    #[test]
    fn next_run_is_the_following_slot_in_local_time() {
        let schedule = istanbul();
        // 07:59 Istanbul
        assert_eq!(schedule.next_after(utc("2024-03-10T04:59:00Z")), Some(utc("2024-03-10T05:00:00Z")));
        // exactly 08:00 Istanbul, next is 20:00
        assert_eq!(schedule.next_after(utc("2024-03-10T05:00:00Z")), Some(utc("2024-03-10T17:00:00Z")));
        // 22:00 Istanbul, next is 08:00 tomorrow
        assert_eq!(schedule.next_after(utc("2024-03-10T19:00:00Z")), Some(utc("2024-03-11T05:00:00Z")));
        // 22:30 UTC is 01:30 the next local day
        assert_eq!(schedule.next_after(utc("2024-03-10T22:30:00Z")), Some(utc("2024-03-11T05:00:00Z")));
    }

    #[test]
    fn next_run_never_repeats_the_slot_that_fired() {
        let schedule = istanbul();
        let fired = utc("2024-03-10T05:00:00Z");
        // clock reads just before the 08:00 slot that already ran
        let early = utc("2024-03-10T04:59:59Z");
        assert_eq!(schedule.next_run(early, Some(fired)), Some(utc("2024-03-10T17:00:00Z")));
        assert_eq!(schedule.next_run(early, None), Some(fired));
        // a clock past the fired slot wins
        assert_eq!(
            schedule.next_run(utc("2024-03-10T18:00:00Z"), Some(fired)),
            Some(utc("2024-03-11T05:00:00Z"))
        );
    }

    fn notifier_with(store: Arc<MemoryStore>, owner: Arc<RecordingOwner>) -> Arc<SavedSearchNotifier> {
        Arc::new(SavedSearchNotifier::new(store, Arc::new(RecordingDispatcher::default()), owner))
    }

    fn notifier() -> Arc<SavedSearchNotifier> {
        let store = Arc::new(MemoryStore::new());
        store.insert_user(user(1, Some("ayse@example.com")));
        store.insert_search(saved_search(1, 1, "{}"));
        store.insert_listing(listing(1, "Ankara", 100));
        notifier_with(store, Arc::new(RecordingOwner::default()))
    }

    /// Sleep on the paused clock until `owner` holds `count` notices.
    async fn wait_for_notices(owner: &RecordingOwner, count: usize) {
        for _ in 0..200 {
            if owner.notices().len() >= count {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        }
        panic!("expected {count} notices, got {}", owner.notices().len());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_runs_do_not_stop_the_loop() {
        let store = Arc::new(MemoryStore::new());
        store.set_offline(true);
        let owner = Arc::new(RecordingOwner::default());
        let scheduler = NotificationScheduler::new(notifier_with(store, owner.clone()), istanbul());

        assert!(scheduler.start());
        wait_for_notices(&owner, 2).await;

        assert!(scheduler.is_started());
        assert!(owner.notices().iter().all(|n| n.title == FAILED_TITLE));
        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn triggers_run_the_job() {
        let store = Arc::new(MemoryStore::new());
        store.insert_user(user(1, Some("ayse@example.com")));
        store.insert_search(saved_search(1, 1, "{}"));
        store.insert_listing(listing(1, "Ankara", 100));
        let owner = Arc::new(RecordingOwner::default());
        let scheduler = NotificationScheduler::new(notifier_with(store.clone(), owner.clone()), istanbul());

        scheduler.start();
        wait_for_notices(&owner, 1).await;
        scheduler.stop();

        assert_eq!(owner.notices()[0].title, SUMMARY_TITLE);
        assert!(store.search(1).unwrap().last_notified_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_prevents_further_triggers() {
        let store = Arc::new(MemoryStore::new());
        store.set_offline(true);
        let owner = Arc::new(RecordingOwner::default());
        let scheduler = NotificationScheduler::new(notifier_with(store, owner.clone()), istanbul());

        scheduler.start();
        wait_for_notices(&owner, 1).await;
        assert!(scheduler.stop());
        let fired = owner.notices().len();

        tokio::time::sleep(std::time::Duration::from_secs(3 * 86_400)).await;
        assert_eq!(owner.notices().len(), fired);

        let idle = NotificationScheduler::new(notifier(), istanbul());
        idle.start();
        idle.stop();
        tokio::time::sleep(std::time::Duration::from_secs(3 * 86_400)).await;
        assert!(!idle.is_started());
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_resets() {
        let scheduler = NotificationScheduler::new(notifier(), istanbul());

        assert!(scheduler.start());
        assert!(!scheduler.start());
        assert!(scheduler.is_started());

        assert!(scheduler.stop());
        assert!(!scheduler.is_started());
        assert!(!scheduler.stop());

        assert!(scheduler.start());
        scheduler.stop();
    }

    #[tokio::test]
    async fn run_once_swallows_job_errors() {
        let store = Arc::new(MemoryStore::new());
        store.set_offline(true);
        let owner = Arc::new(RecordingOwner::default());
        let notifier = notifier_with(store, owner.clone());

        run_once(&notifier).await;

        assert_eq!(owner.notices().len(), 1);
        assert_eq!(owner.notices()[0].title, FAILED_TITLE);
        assert!(!notifier.is_running());
    }
}
