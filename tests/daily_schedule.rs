//! Scheduler driven on paused tokio time, simulating several days.

use async_trait::async_trait;
use blog_autopilot::fakes::VirtualClock;
use blog_autopilot::pipeline::CycleOutcome;
use blog_autopilot::scheduler::{Clock, CycleRunner, DriverState, Scheduler};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

struct CountingRunner {
    clock: Arc<dyn Clock>,
    runs: Arc<Mutex<Vec<NaiveDateTime>>>,
    cycle_time: Duration,
}

#[async_trait]
impl CycleRunner for CountingRunner {
    async fn run_cycle(&self) -> CycleOutcome {
        self.runs.lock().unwrap().push(self.clock.now());
        tokio::time::sleep(self.cycle_time).await;
        CycleOutcome::NoArticle {
            topic: "test".to_string(),
        }
    }
}

fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 1)
        .unwrap()
        .and_hms_opt(8, 0, 30)
        .unwrap()
}

fn scheduler(
    run_on_startup: bool,
    cycle_time: Duration,
) -> (Scheduler<CountingRunner>, Arc<Mutex<Vec<NaiveDateTime>>>) {
    scheduler_from(start(), run_on_startup, cycle_time)
}

fn scheduler_from(
    origin: NaiveDateTime,
    run_on_startup: bool,
    cycle_time: Duration,
) -> (Scheduler<CountingRunner>, Arc<Mutex<Vec<NaiveDateTime>>>) {
    let clock: Arc<dyn Clock> = Arc::new(VirtualClock::new(origin));
    let runs = Arc::new(Mutex::new(Vec::new()));
    let runner = CountingRunner {
        clock: clock.clone(),
        runs: runs.clone(),
        cycle_time,
    };
    let s = Scheduler::new(
        runner,
        clock,
        NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        Duration::from_secs(60),
        run_on_startup,
    );
    (s, runs)
}

fn stop_after(after: Duration) -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        let _ = tx.send(true);
        // Keep the sender alive until the scheduler has observed the flag.
        tokio::time::sleep(Duration::from_secs(3600)).await;
    });
    rx
}

#[tokio::test(start_paused = true)]
async fn test_startup_cycle_then_once_per_day() {
    let (mut s, runs) = scheduler(true, Duration::from_secs(300));

    // Runs until 2024-05-04 06:00:30: triggers on May 1, 2 and 3.
    let cycles = s.run(stop_after(Duration::from_secs(3 * 86_400 - 2 * 3600))).await;

    let runs = runs.lock().unwrap().clone();
    assert_eq!(cycles, 4);
    assert_eq!(runs.len(), 4);
    assert_eq!(runs[0], start());
    for (i, run) in runs[1..].iter().enumerate() {
        assert_eq!(run.date(), NaiveDate::from_ymd_opt(2024, 5, 1 + i as u32).unwrap());
        assert_eq!(run.hour(), 9);
        assert_eq!(run.minute(), 0);
    }
    assert_eq!(s.state(), DriverState::IdleWaiting);
}

#[tokio::test(start_paused = true)]
async fn test_without_startup_run() {
    let (mut s, runs) = scheduler(false, Duration::ZERO);

    // 2024-05-01 08:00:30 -> 2024-05-02 08:00:30: exactly one 09:00 passes.
    let cycles = s.run(stop_after(Duration::from_secs(86_400))).await;

    assert_eq!(cycles, 1);
    let runs = runs.lock().unwrap().clone();
    assert_eq!(runs[0].date(), NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
    assert_eq!(
        s.trigger().next_run(),
        NaiveDate::from_ymd_opt(2024, 5, 2)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    );
}

#[tokio::test(start_paused = true)]
async fn test_startup_cycle_overrunning_trigger_time_is_not_repeated() {
    let origin = NaiveDate::from_ymd_opt(2024, 5, 1)
        .unwrap()
        .and_hms_opt(8, 58, 0)
        .unwrap();
    // Startup cycle runs 08:58 -> 09:03, across the daily trigger time.
    let (mut s, runs) = scheduler_from(origin, true, Duration::from_secs(300));

    let cycles = s.run(stop_after(Duration::from_secs(3600))).await;

    assert_eq!(cycles, 1);
    assert_eq!(runs.lock().unwrap().clone(), vec![origin]);
    assert_eq!(
        s.trigger().next_run(),
        NaiveDate::from_ymd_opt(2024, 5, 2)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    );
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_before_first_trigger() {
    let (mut s, runs) = scheduler(true, Duration::ZERO);

    let cycles = s.run(stop_after(Duration::from_secs(600))).await;

    assert_eq!(cycles, 1);
    assert_eq!(runs.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_sender_stops_loop() {
    let (mut s, _runs) = scheduler(false, Duration::ZERO);
    let (tx, rx) = watch::channel(false);
    drop(tx);

    assert_eq!(s.run(rx).await, 0);
}
