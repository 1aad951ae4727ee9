//! Wall-clock access and interval alignment for the replay and scoring loops.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

/// Source of the current wall-clock time.
///
/// The loops only read the time to compute how long to sleep; the sleep
/// itself always goes through tokio, so a paused tokio runtime plus
/// [`ManualClock`] gives fully deterministic timing in tests.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// The real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock anchored at a fixed instant that follows tokio's time source.
///
/// Under `#[tokio::test(start_paused = true)]` tokio time only moves when the
/// runtime sleeps, so `now()` advances exactly by the sleeps the loop asked
/// for, plus anything added with [`ManualClock::advance`] to simulate
/// processing time.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use chrono::{TimeZone, Utc};
/// use renewable_annotator::sim::clock::{Clock, ManualClock};
///
/// # tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(async {
/// let base = Utc.with_ymd_and_hms(2021, 7, 1, 12, 0, 7).unwrap();
/// let clock = ManualClock::starting_at(base);
/// clock.advance(Duration::from_secs(3));
/// assert!(clock.now() >= base + chrono::Duration::seconds(3));
/// # });
/// ```
#[derive(Debug)]
pub struct ManualClock {
    base: DateTime<Utc>,
    started: tokio::time::Instant,
    offset: Cell<Duration>,
}

impl ManualClock {
    /// Creates a clock that reads `base` right now.
    ///
    /// Must be called inside a tokio runtime with the time driver enabled.
    pub fn starting_at(base: DateTime<Utc>) -> Self {
        Self {
            base,
            started: tokio::time::Instant::now(),
            offset: Cell::new(Duration::ZERO),
        }
    }

    /// Moves the clock forward without sleeping.
    pub fn advance(&self, by: Duration) {
        self.offset.set(self.offset.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = self.started.elapsed() + self.offset.get();
        self.base + chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero())
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

impl<C: Clock + ?Sized> Clock for Rc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// Time left until the next multiple of `interval` since the Unix epoch.
///
/// `interval - (now mod interval)`: landing exactly on a boundary waits a
/// whole interval, and an overrun tick simply waits for the following
/// boundary, so missed boundaries are never caught up.
pub fn until_next_boundary(now: DateTime<Utc>, interval: Duration) -> Duration {
    let interval_ms = interval.as_millis().clamp(1, i64::MAX as u128) as i64;
    let rem = now.timestamp_millis().rem_euclid(interval_ms);
    Duration::from_millis((interval_ms - rem) as u64)
}

/// Sleeps until the next `interval` boundary unless `stop` turns true first.
///
/// Returns `true` when the caller should stop. A dropped sender never stops
/// the loop; the remaining sleep is simply awaited.
pub async fn wait_for_boundary<K: Clock + ?Sized>(
    clock: &K,
    interval: Duration,
    stop: &mut watch::Receiver<bool>,
) -> bool {
    if *stop.borrow() {
        return true;
    }
    let sleep = tokio::time::sleep(until_next_boundary(clock.now(), interval));
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            () = &mut sleep => return *stop.borrow(),
            changed = stop.changed() => match changed {
                Ok(()) if *stop.borrow_and_update() => return true,
                Ok(()) => {}
                Err(_) => {
                    (&mut sleep).await;
                    return false;
                }
            },
        }
    }
}
