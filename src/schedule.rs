//! Fixed-interval job scheduler driven by a short polling ticker.
//!
//! The job runs once at startup. After that, every poll tick performs one due
//! check (`now - last_run >= interval`) and, when due, awaits the job on the
//! same task. Runs therefore never overlap and are never queued.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::ScheduleConfig;

pub const POLL_PERIOD: Duration = Duration::from_secs(60);

/// A unit of work the scheduler can trigger. Failures are the job's business.
#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self);
}

pub struct Scheduler {
    interval: Duration,
    poll: Duration,
    /// Completion time of the previous run.
    last_run: Option<Instant>,
    runs: u64,
}

impl Scheduler {
    pub fn new(schedule: ScheduleConfig, poll: Duration) -> Self {
        Self {
            interval: schedule.interval(),
            poll,
            last_run: None,
            runs: 0,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_run {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        }
    }

    /// One due check. Returns whether the job ran.
    pub async fn check_due<J: Job + ?Sized>(&mut self, job: &J) -> bool {
        if !self.is_due(Instant::now()) {
            return false;
        }
        self.run_job(job).await;
        true
    }

    /// Runs the job now, then polls forever.
    pub async fn run<J: Job + ?Sized>(mut self, job: &J) {
        info!(
            job = job.name(),
            interval_secs = self.interval.as_secs(),
            poll_secs = self.poll.as_secs(),
            "scheduler started"
        );
        self.run_job(job).await;

        let mut ticker = time::interval_at(Instant::now() + self.poll, self.poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if !self.check_due(job).await {
                debug!(job = job.name(), "not due");
            }
        }
    }

    async fn run_job<J: Job + ?Sized>(&mut self, job: &J) {
        self.runs += 1;
        let started = Instant::now();
        info!(job = job.name(), run = self.runs, "job starting");

        job.run().await;

        let finished = Instant::now();
        self.last_run = Some(finished);
        info!(
            job = job.name(),
            run = self.runs,
            elapsed = ?finished.duration_since(started),
            "job finished"
        );
    }
}
