//! Daily wall-clock jobs owned by the process lifecycle.
//!
//! A job fires once per day at a fixed local time in a named timezone. Missed
//! firings (process down, or a previous run overrunning) are not replayed: after
//! each run the next firing is computed from the current time. Failures and
//! panics inside a job are logged and never stop the schedule.

use std::future::Future;

use chrono::{DateTime, Days, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::PulseError;

/// A fixed time of day in a named timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    time: NaiveTime,
    timezone: Tz,
}

impl DailySchedule {
    /// # Errors
    ///
    /// [`PulseError::Config`] if `hour` or `minute` is out of range.
    pub fn new(hour: u32, minute: u32, timezone: Tz) -> Result<Self, PulseError> {
        let time = NaiveTime::from_hms_opt(hour, minute, 0)
            .ok_or_else(|| PulseError::Config(format!("invalid time of day {hour}:{minute:02}")))?;
        Ok(Self { time, timezone })
    }

    pub fn time(&self) -> NaiveTime {
        self.time
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// The first firing strictly after `now`.
    ///
    /// When the local time does not exist that day (DST gap) the day is skipped;
    /// when it exists twice (DST overlap) the earlier instant is used.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.with_timezone(&self.timezone).date_naive();
        let mut day = today;
        loop {
            let candidate = self
                .timezone
                .from_local_datetime(&day.and_time(self.time))
                .earliest()
                .map(|dt| dt.with_timezone(&Utc));
            if let Some(at) = candidate {
                if at > now {
                    return at;
                }
            }
            day = match day.checked_add_days(Days::new(1)) {
                Some(d) => d,
                None => return now,
            };
        }
    }
}

/// Owns the background jobs and stops them at shutdown.
#[derive(Debug, Default)]
pub struct Scheduler {
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token cancelled by [`Scheduler::shutdown`]; jobs may watch it too.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn job_count(&self) -> usize {
        self.handles.len()
    }

    /// Registers `job` to run every day per `schedule`.
    ///
    /// Each run executes on its own task so a panic is contained to that run.
    pub fn add_daily<F, Fut>(&mut self, name: &'static str, schedule: DailySchedule, job: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), PulseError>> + Send + 'static,
    {
        let token = self.token.clone();
        let handle = tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let next = schedule.next_after(now);
                let wait = (next - now).to_std().unwrap_or_default();
                tracing::info!(job = name, next = %next.with_timezone(&schedule.timezone), "job scheduled");

                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(wait) => {}
                }

                tracing::info!(job = name, "job starting");
                match tokio::spawn(job()).await {
                    Ok(Ok(())) => tracing::info!(job = name, "job finished"),
                    Ok(Err(e)) => tracing::error!(job = name, error = %e, "job failed"),
                    Err(e) => tracing::error!(job = name, error = %e, "job panicked"),
                }
            }
            tracing::debug!(job = name, "job stopped");
        });
        self.handles.push(handle);
    }

    /// Cancels every job and waits for the loops to exit.
    ///
    /// A run that is already executing is not interrupted; its loop exits once it returns.
    pub async fn shutdown(self) {
        self.token.cancel();
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "scheduler task ended abnormally");
            }
        }
    }
}
