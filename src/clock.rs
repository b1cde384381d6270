// Time source for the sampler and accumulators.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Supplies the current UTC time. Swapped for `ManualClock` in tests.
pub trait TimeProvider: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl TimeProvider for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock. With `auto_advance` set, every `now()` call returns the
/// current time and then moves it forward by that amount.
#[derive(Debug)]
pub struct ManualClock {
    inner: Mutex<ManualClockState>,
}

#[derive(Debug)]
struct ManualClockState {
    now: DateTime<Utc>,
    auto_advance: Duration,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            inner: Mutex::new(ManualClockState {
                now: start,
                auto_advance: Duration::ZERO,
            }),
        }
    }

    pub fn with_auto_advance(start: DateTime<Utc>, step: Duration) -> Self {
        let clock = Self::new(start);
        clock.set_auto_advance(step);
        clock
    }

    pub fn set_auto_advance(&self, step: Duration) {
        if let Ok(mut state) = self.inner.lock() {
            state.auto_advance = step;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut state) = self.inner.lock() {
            state.now += chrono::Duration::from_std(by).unwrap_or(chrono::Duration::zero());
        }
    }
}

impl TimeProvider for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let Ok(mut state) = self.inner.lock() else {
            return Utc::now();
        };
        let now = state.now;
        let step = chrono::Duration::from_std(state.auto_advance).unwrap_or(chrono::Duration::zero());
        state.now += step;
        now
    }
}

/// Seconds between two instants; a clock that stepped backwards yields zero.
pub fn elapsed_secs(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let ms = (to - from).num_milliseconds();
    if ms <= 0 { 0.0 } else { ms as f64 / 1000.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn auto_advance_moves_after_read() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::with_auto_advance(start, Duration::from_secs(30));
        assert_eq!(clock.now(), start);
        assert_eq!(elapsed_secs(start, clock.now()), 30.0);
    }

    #[test]
    fn backwards_step_is_zero_elapsed() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 1, 0).unwrap();
        let earlier = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(elapsed_secs(start, earlier), 0.0);
    }
}
