//! Time source and the gate's local calendar.

use std::sync::Mutex;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Utc};

/// Single canonical time source (UTC).
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Gate-local calendar and timestamp tolerances.
#[derive(Debug, Clone, Copy)]
pub struct GatePolicy {
    /// Fixed offset of the gate's local calendar from UTC.
    pub utc_offset: FixedOffset,
    /// How far a scheduled or recorded time may run ahead of the clock.
    pub max_clock_skew: Duration,
    /// How far back security may backdate an arrival or departure.
    pub max_backdate: Duration,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            utc_offset: Utc.fix(),
            max_clock_skew: Duration::minutes(5),
            max_backdate: Duration::hours(12),
        }
    }
}

impl GatePolicy {
    /// Builds a policy from an offset in minutes east of UTC.
    ///
    /// Returns `None` when the offset is outside +-14 hours.
    pub fn with_offset_minutes(minutes: i32) -> Option<Self> {
        if minutes.abs() > 14 * 60 {
            return None;
        }
        let utc_offset = FixedOffset::east_opt(minutes * 60)?;
        Some(Self {
            utc_offset,
            ..Self::default()
        })
    }

    /// Calendar date of `at` at the gate.
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.utc_offset).date_naive()
    }
}
