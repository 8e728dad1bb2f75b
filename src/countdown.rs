//! Countdown for links whose availability window has not opened yet
//!
//! While a link is pending the scheduler ticks once per second (configurable),
//! recomputes the remaining time against an injected [`Clock`] and reports it in
//! display form. When the remaining time reaches zero it stops itself and emits a
//! single [`CountdownEvent::Elapsed`]. That event is a request to re-fetch
//! metadata, not permission to access the file: only the server can flip a link to
//! active.
//!
//! The tick task is cancelled through a [`CancellationToken`] owned by the
//! returned [`CountdownHandle`]; dropping the handle cancels as well.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Source of wall-clock time
pub trait Clock: Send + Sync {
    /// Current time
    fn now(&self) -> DateTime<Utc>;
}

/// [`Clock`] backed by the system clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Event emitted by a running countdown
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CountdownEvent {
    /// Remaining time was recomputed
    Tick {
        /// Time left until the window opens
        remaining: Duration,
        /// `remaining` formatted for display
        display: String,
    },
    /// The window should have opened; metadata must be re-fetched
    Elapsed,
}

/// Scheduler state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountdownState {
    /// No tick is scheduled
    Idle,
    /// Ticking
    Running,
}

/// Time left from `now` until `target`, saturating at zero
pub fn remaining_until(target: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (target - now).to_std().unwrap_or(Duration::ZERO)
}

/// Format a remaining duration as `Dd Hh Mm Ss`, omitting days when zero
///
/// # Examples
///
/// ```
/// use sharelink::countdown::format_remaining;
/// use std::time::Duration;
///
/// assert_eq!(format_remaining(Duration::from_secs(3_725)), "1h 2m 5s");
/// assert_eq!(format_remaining(Duration::from_secs(90_061)), "1d 1h 1m 1s");
/// ```
pub fn format_remaining(remaining: Duration) -> String {
    let total = remaining.as_secs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m {seconds}s")
    } else {
        format!("{hours}h {minutes}m {seconds}s")
    }
}

/// Starts countdown tasks for pending links
#[derive(Clone)]
pub struct CountdownScheduler {
    clock: Arc<dyn Clock>,
    tick: Duration,
}

impl CountdownScheduler {
    /// Create a scheduler reading time from `clock` and ticking every `tick`
    pub fn new(clock: Arc<dyn Clock>, tick: Duration) -> Self {
        Self { clock, tick }
    }

    /// Start counting down to `available_from`
    ///
    /// Ticks are phased on `available_from`, so the last one lands on the
    /// boundary; with a whole number of intervals left the first tick fires one
    /// interval after the call. Events are sent to `events`; the task also stops
    /// if the receiver goes away.
    pub fn start(
        &self,
        available_from: DateTime<Utc>,
        events: mpsc::UnboundedSender<CountdownEvent>,
    ) -> CountdownHandle {
        let cancel = CancellationToken::new();
        let running = Arc::new(AtomicBool::new(true));
        let initial = remaining_until(available_from, self.clock.now());

        info!(
            %available_from,
            remaining = %format_remaining(initial),
            "starting countdown"
        );

        let task = tokio::spawn(run_countdown(
            Arc::clone(&self.clock),
            first_tick_delay(initial, self.tick),
            self.tick,
            available_from,
            events,
            cancel.clone(),
            Arc::clone(&running),
        ));

        CountdownHandle {
            cancel,
            running,
            initial,
            task: Some(task),
        }
    }
}

/// Delay before the first tick: the part of `remaining` that is not a whole
/// number of ticks, or a full tick when it divides evenly
fn first_tick_delay(remaining: Duration, tick: Duration) -> Duration {
    if tick.is_zero() {
        return tick;
    }
    let offset = remaining.as_nanos() % tick.as_nanos();
    match u64::try_from(offset) {
        Ok(0) | Err(_) => tick,
        Ok(nanos) => Duration::from_nanos(nanos),
    }
}

async fn run_countdown(
    clock: Arc<dyn Clock>,
    first_tick: Duration,
    tick: Duration,
    available_from: DateTime<Utc>,
    events: mpsc::UnboundedSender<CountdownEvent>,
    cancel: CancellationToken,
    running: Arc<AtomicBool>,
) {
    let mut interval = tokio::time::interval_at(Instant::now() + first_tick, tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("countdown cancelled");
                break;
            }
            _ = interval.tick() => {
                let remaining = remaining_until(available_from, clock.now());
                if remaining.is_zero() {
                    info!("countdown elapsed, requesting metadata refresh");
                    events.send(CountdownEvent::Elapsed).ok();
                    break;
                }
                let display = format_remaining(remaining);
                if events.send(CountdownEvent::Tick { remaining, display }).is_err() {
                    debug!("countdown receiver dropped, stopping");
                    break;
                }
            }
        }
    }

    running.store(false, Ordering::SeqCst);
}

/// Owner of a running countdown
///
/// Dropping the handle cancels the countdown.
pub struct CountdownHandle {
    cancel: CancellationToken,
    running: Arc<AtomicBool>,
    initial: Duration,
    task: Option<JoinHandle<()>>,
}

impl CountdownHandle {
    /// Remaining time at the moment the countdown started
    pub fn initial_remaining(&self) -> Duration {
        self.initial
    }

    /// Current scheduler state
    pub fn state(&self) -> CountdownState {
        if self.running.load(Ordering::SeqCst) {
            CountdownState::Running
        } else {
            CountdownState::Idle
        }
    }

    /// Request cancellation; the tick task exits at its next poll
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel and wait until the tick task has exited
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.await.ok();
        }
    }
}

impl Drop for CountdownHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
