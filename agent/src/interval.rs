use crate::metrics::TELEMETRY_INTERVAL_SECONDS;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Seconds between telemetry publications, shared by the sender (reader) and
/// the method listener (writer). Last writer wins; the sender picks up a new
/// value on its next cycle.
#[derive(Debug, Clone)]
pub struct SharedInterval(Arc<AtomicU64>);

impl SharedInterval {
    pub fn new(secs: u64) -> Self {
        TELEMETRY_INTERVAL_SECONDS.set(gauge_value(secs));
        Self(Arc::new(AtomicU64::new(secs)))
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    pub fn set(&self, secs: u64) {
        self.0.store(secs, Ordering::Release);
        TELEMETRY_INTERVAL_SECONDS.set(gauge_value(secs));
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.get())
    }
}

// Gauges are signed; huge intervals saturate instead of wrapping negative
fn gauge_value(secs: u64) -> i64 {
    i64::try_from(secs).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let interval = SharedInterval::new(1);
        let writer = interval.clone();

        writer.set(10);

        assert_eq!(interval.get(), 10);
        assert_eq!(interval.duration(), Duration::from_secs(10));
    }

    #[test]
    fn test_gauge_saturates_for_huge_intervals() {
        assert_eq!(gauge_value(30), 30);
        assert_eq!(gauge_value(i64::MAX as u64), i64::MAX);
        assert_eq!(gauge_value(u64::MAX), i64::MAX);

        let interval = SharedInterval::new(1);
        interval.set(u64::MAX);
        assert_eq!(interval.get(), u64::MAX);
    }

    #[test]
    fn test_concurrent_writes_last_writer_wins() {
        let interval = SharedInterval::new(1);
        let handles: Vec<_> = (1..=8)
            .map(|n| {
                let interval = interval.clone();
                std::thread::spawn(move || interval.set(n))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Every write is a whole value; no torn reads are possible
        assert!((1..=8).contains(&interval.get()));
    }
}
