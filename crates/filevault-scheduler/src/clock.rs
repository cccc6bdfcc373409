//! Wall-clock time anchored to the tokio timer.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::Instant;

/// Maps between UTC wall time and `tokio::time::Instant`.
///
/// The system clock reads the wall clock on every call, so a suspend or an
/// NTP step is seen immediately. A clock built with
/// [`starting_at`](Self::starting_at) captures the wall time once and
/// advances it by the tokio clock, so a runtime with paused time moves
/// schedules forward deterministically.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    anchor: Option<(DateTime<Utc>, Instant)>,
}

impl Clock {
    /// Clock that follows the system wall time.
    pub fn system() -> Self {
        Self { anchor: None }
    }

    /// Clock whose current time is `wall`.
    pub fn starting_at(wall: DateTime<Utc>) -> Self {
        Self {
            anchor: Some((wall, Instant::now())),
        }
    }

    /// Current wall time.
    pub fn now(&self) -> DateTime<Utc> {
        match self.anchor {
            Some((wall, instant)) => {
                wall + TimeDelta::from_std(instant.elapsed()).unwrap_or_default()
            }
            None => Utc::now(),
        }
    }

    /// The instant at which the clock is expected to read `at`.
    ///
    /// Times in the past map to now.
    pub fn instant_at(&self, at: DateTime<Utc>) -> Instant {
        let now = Instant::now();
        match (at - self.now()).to_std() {
            Ok(offset) => now + offset,
            Err(_) => now,
        }
    }

    /// Sleep until the clock reads `at`.
    ///
    /// The wall clock is re-read at least every `max_slice`, so a step in
    /// system time shifts the wake-up by at most one slice.
    pub async fn sleep_until(&self, at: DateTime<Utc>, max_slice: Duration) {
        let max_slice = max_slice.max(Duration::from_secs(1));
        loop {
            let remaining = match (at - self.now()).to_std() {
                Ok(remaining) if !remaining.is_zero() => remaining,
                _ => return,
            };
            tokio::time::sleep(remaining.min(max_slice)).await;
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::system()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test(start_paused = true)]
    async fn test_now_follows_tokio_time() {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        let clock = Clock::starting_at(start);

        tokio::time::advance(Duration::from_secs(90)).await;
        assert_eq!(clock.now(), start + TimeDelta::seconds(90));
    }

    #[tokio::test(start_paused = true)]
    async fn test_instant_at_round_trips() {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        let clock = Clock::starting_at(start);
        let target = start + TimeDelta::minutes(5);

        tokio::time::sleep_until(clock.instant_at(target)).await;
        assert_eq!(clock.now(), target);

        let past = start - TimeDelta::hours(1);
        assert!(clock.instant_at(past) <= Instant::now());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_until_wakes_on_time_across_slices() {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        let clock = Clock::starting_at(start);
        let target = start + TimeDelta::seconds(215);

        clock.sleep_until(target, Duration::from_secs(30)).await;
        assert_eq!(clock.now(), target);

        // Already past: returns without sleeping.
        clock.sleep_until(start, Duration::from_secs(30)).await;
        assert_eq!(clock.now(), target);
    }

    #[test]
    fn test_system_clock_reads_wall_time() {
        let clock = Clock::system();
        let before = Utc::now();
        let now = clock.now();
        let after = Utc::now();
        assert!(before <= now && now <= after);
    }
}
