use std::{
    sync::{Mutex, PoisonError},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

const DEFAULT_RESOLUTION: Duration = Duration::from_micros(1);

/// Wall clock nudged forward so that successive readings are strictly increasing.
///
/// Every store instance owns one; `created_at`/`updated_at` are taken from it.
/// Readings are truncated to the clock's resolution, which must match what the
/// backend can persist, otherwise the nudge is lost on the way to disk.
#[derive(Debug)]
pub struct MonotonicClock {
    resolution: Duration,
    last: Mutex<Option<SystemTime>>,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::with_resolution(DEFAULT_RESOLUTION)
    }
}

impl MonotonicClock {
    /// Clock with microsecond resolution.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock whose readings are multiples of `resolution` since the Unix epoch.
    pub fn with_resolution(resolution: Duration) -> Self {
        Self {
            resolution: resolution.max(Duration::from_nanos(1)),
            last: Mutex::new(None),
        }
    }

    /// Current time, or one resolution step past the previous reading if the clock did not advance.
    pub fn now(&self) -> SystemTime {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let now = self.truncate(SystemTime::now());
        let next = match *last {
            Some(previous) if now <= previous => previous + self.resolution,
            _ => now,
        };
        *last = Some(next);
        next
    }

    fn truncate(&self, time: SystemTime) -> SystemTime {
        let Ok(elapsed) = time.duration_since(UNIX_EPOCH) else {
            return time;
        };
        let step = self.resolution.as_nanos();
        let kept = elapsed.as_nanos() - elapsed.as_nanos() % step;
        match u64::try_from(kept) {
            Ok(nanos) => UNIX_EPOCH + Duration::from_nanos(nanos),
            Err(_) => time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readings_strictly_increase() {
        let clock = MonotonicClock::new();
        let mut previous = clock.now();
        for _ in 0..1000 {
            let next = clock.now();
            assert!(next > previous);
            previous = next;
        }
    }

    #[test]
    fn millisecond_clock_steps_whole_milliseconds() {
        let clock = MonotonicClock::with_resolution(Duration::from_millis(1));
        let mut previous = clock.now();
        for _ in 0..100 {
            let next = clock.now();
            let since_epoch = next.duration_since(UNIX_EPOCH).unwrap();
            assert_eq!(since_epoch.subsec_nanos() % 1_000_000, 0);
            assert!(next.duration_since(previous).unwrap() >= Duration::from_millis(1));
            previous = next;
        }
    }
}
