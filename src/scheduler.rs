use crate::pipeline::CycleOutcome;
use async_trait::async_trait;
use chrono::{Days, Local, NaiveDateTime, NaiveTime};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Local wall-clock time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// One full pipeline run.
#[async_trait]
pub trait CycleRunner: Send + Sync {
    async fn run_cycle(&self) -> CycleOutcome;
}

/// Fires once per calendar day at a fixed local time.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyTrigger {
    at: NaiveTime,
    next_run: NaiveDateTime,
}

impl DailyTrigger {
    pub fn new(at: NaiveTime, now: NaiveDateTime) -> Self {
        Self {
            at,
            next_run: Self::next_after(at, now),
        }
    }

    /// First occurrence of `at` strictly after `now`.
    fn next_after(at: NaiveTime, now: NaiveDateTime) -> NaiveDateTime {
        let today = now.date().and_time(at);
        if today > now {
            today
        } else {
            now.date()
                .checked_add_days(Days::new(1))
                .unwrap_or(now.date())
                .and_time(at)
        }
    }

    pub fn next_run(&self) -> NaiveDateTime {
        self.next_run
    }

    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        now >= self.next_run
    }

    /// Re-arm after a run that finished at `now`. Missed days are not replayed.
    pub fn mark_ran(&mut self, now: NaiveDateTime) {
        self.next_run = Self::next_after(self.at, now);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    RunningCycle,
    IdleWaiting,
}

/// Runs a cycle at startup, then polls the daily trigger until shutdown.
/// Cycles run inline, so two can never overlap.
pub struct Scheduler<R: CycleRunner> {
    runner: R,
    at: NaiveTime,
    trigger: DailyTrigger,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    run_on_startup: bool,
    state: DriverState,
}

impl<R: CycleRunner> Scheduler<R> {
    pub fn new(
        runner: R,
        clock: Arc<dyn Clock>,
        at: NaiveTime,
        poll_interval: Duration,
        run_on_startup: bool,
    ) -> Self {
        let trigger = DailyTrigger::new(at, clock.now());
        Self {
            runner,
            at,
            trigger,
            clock,
            poll_interval,
            run_on_startup,
            state: DriverState::IdleWaiting,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn trigger(&self) -> &DailyTrigger {
        &self.trigger
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    async fn run_cycle(&mut self) -> CycleOutcome {
        self.state = DriverState::RunningCycle;
        let outcome = self.runner.run_cycle().await;
        self.state = DriverState::IdleWaiting;
        tracing::debug!(?outcome, "cycle outcome");
        outcome
    }

    /// Returns the number of cycles run. Stops when `shutdown` turns true or
    /// its sender is dropped; an in-flight cycle always completes first.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> u64 {
        let mut cycles = 0;

        if self.run_on_startup {
            self.run_cycle().await;
            cycles += 1;
        }
        // Armed from the time the startup cycle finished.
        self.trigger = DailyTrigger::new(self.at, self.clock.now());
        tracing::info!(next_run = %self.trigger.next_run(), "daily trigger registered");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let now = self.clock.now();
            if self.trigger.is_due(now) {
                self.run_cycle().await;
                cycles += 1;
                self.trigger.mark_ran(self.clock.now());
                tracing::info!(next_run = %self.trigger.next_run(), "waiting for next run");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!(cycles, "scheduler stopped");
        cycles
    }
}
