/// Wall-clock access and hour-boundary arithmetic.
///
/// All boundary math is done against the configured civil timezone:
/// "the top of the hour" means local minute 0, second 0, nanosecond 0.
/// Instants are carried as UTC everywhere else.

use chrono::{DateTime, Duration, Timelike, Utc};
use chrono_tz::Tz;
use std::sync::{Mutex, PoisonError};

/// Truncates `now` to the start of its local hour in `tz`.
///
/// Subtracting the local minute/second/nanosecond keeps this correct for
/// zones whose offset is not a whole number of hours.
pub fn floor_to_hour(now: DateTime<Utc>, tz: &Tz) -> DateTime<Utc> {
    now - into_hour(now, tz)
}

/// The next exact hour boundary strictly after the current hour's start.
///
/// Normally `floor(now, 1h) + 1h`. When a half-hour offset change falls
/// inside that hour the step lands on local minute 30, so it is pushed
/// forward to the following top of the hour.
pub fn next_hour_boundary(now: DateTime<Utc>, tz: &Tz) -> DateTime<Utc> {
    let mut next = floor_to_hour(now, tz) + Duration::hours(1);
    for _ in 0..4 {
        let off = into_hour(next, tz);
        if off.is_zero() {
            break;
        }
        next += Duration::hours(1) - off;
    }
    next
}

fn into_hour(instant: DateTime<Utc>, tz: &Tz) -> Duration {
    let local = instant.with_timezone(tz);
    Duration::minutes(local.minute() as i64)
        + Duration::seconds(local.second() as i64)
        + Duration::nanoseconds(local.nanosecond() as i64)
}

/// Renders an instant as RFC 3339 in `tz`, e.g. `2026-10-14T15:00:00-03:00`.
pub fn to_local_rfc3339(instant: DateTime<Utc>, tz: &Tz) -> String {
    instant.with_timezone(tz).to_rfc3339()
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of "now" and the ability to wait for a future instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Blocks until `target` has been reached. Returning early is allowed;
    /// callers re-check `now()`.
    fn sleep_until(&self, target: DateTime<Utc>);
}

/// The real system clock, sleeping the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep_until(&self, target: DateTime<Utc>) {
        if let Ok(wait) = (target - Utc::now()).to_std() {
            std::thread::sleep(wait);
        }
    }
}

/// Hand-driven clock for deterministic runs of the daemon.
///
/// `sleep_until` jumps straight to the target and records it, so a test
/// can assert exactly which boundaries the daemon waited for.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    sleeps: Mutex<Vec<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }

    /// Every target passed to `sleep_until`, in call order.
    pub fn sleeps(&self) -> Vec<DateTime<Utc>> {
        self.sleeps.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sleep_until(&self, target: DateTime<Utc>) {
        self.sleeps.lock().unwrap_or_else(PoisonError::into_inner).push(target);
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        if *now < target {
            *now = target;
        }
    }
}

/// Waits until `clock` reports an instant at or after `target`.
pub fn wait_for(clock: &dyn Clock, target: DateTime<Utc>) {
    while clock.now() < target {
        clock.sleep_until(target);
    }
}
