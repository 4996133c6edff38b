//! Metrics for observability
//!
//! Recorded through the `metrics` facade. Nothing is exported unless the embedding
//! application installs a recorder.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Instant;

/// Describe every metric the crate records. Call once after installing a recorder.
pub fn init_metrics() {
    describe_counter!("space.credentials.processed", "Credentials applied to a space log");
    describe_counter!("space.credentials.rejected", "Credentials rejected by verification or authorization");
    describe_counter!("space.credentials.duplicate", "Credentials skipped because they were already applied");
    describe_gauge!("space.credentials.log_size", "Length of the most recently updated space log");
    describe_histogram!("space.process.duration_ms", "Time to process one credential in milliseconds");

    describe_gauge!("space.consumers.active", "Registered credential consumers");
    describe_counter!("space.consumers.failed", "Consumers closed after their processor failed");

    describe_counter!("halo.auth.accepted", "Device authentication credentials accepted");
    describe_counter!("halo.auth.rejected", "Device authentication credentials rejected");
}

pub fn record_counter(name: &'static str, value: u64) {
    counter!(name).increment(value);
}

pub fn record_gauge(name: &'static str, value: f64) {
    gauge!(name).set(value);
}

pub fn record_histogram(name: &'static str, value: f64) {
    histogram!(name).record(value);
}

/// Records its lifetime in milliseconds when stopped
pub struct Timer {
    name: &'static str,
    start: Instant,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self { name, start: Instant::now() }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    pub fn stop(self) {
        record_histogram(self.name, self.elapsed_ms());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_init() {
        // No recorder installed; describing and recording are no-ops.
        init_metrics();
        record_counter("space.credentials.processed", 1);
        record_gauge("space.consumers.active", 2.0);
    }

    #[test]
    fn test_timer() {
        let timer = Timer::new("space.process.duration_ms");
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(timer.elapsed_ms() >= 5.0);
        timer.stop();
    }
}
