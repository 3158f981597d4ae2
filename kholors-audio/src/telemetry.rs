//! FFT runner telemetry: pool pressure counters and batch latency.
//!
//! Counters are atomics so callers on any thread can bump them; batch
//! durations go into a fixed ring that never allocates after construction.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Ring buffer size for batch duration samples.
const BATCH_BUFFER_SIZE: usize = 256;

struct DurationRing {
    durations_us: [u32; BATCH_BUFFER_SIZE],
    idx: usize,
    max_us: u32,
    /// Saturates at BATCH_BUFFER_SIZE
    sample_count: usize,
}

impl DurationRing {
    fn new() -> Self {
        Self {
            durations_us: [0; BATCH_BUFFER_SIZE],
            idx: 0,
            max_us: 0,
            sample_count: 0,
        }
    }

    fn record(&mut self, duration: Duration) {
        let us = duration.as_micros().min(u32::MAX as u128) as u32;

        self.durations_us[self.idx] = us;
        self.idx = (self.idx + 1) % BATCH_BUFFER_SIZE;
        if self.sample_count < BATCH_BUFFER_SIZE {
            self.sample_count += 1;
        }
        self.max_us = self.max_us.max(us);
    }

    /// (avg, max, p95) in microseconds; resets the max for the next window.
    fn take_summary(&mut self) -> (u32, u32, u32) {
        if self.sample_count == 0 {
            return (0, 0, 0);
        }

        let samples = &self.durations_us[..self.sample_count];
        let sum: u64 = samples.iter().map(|&x| x as u64).sum();
        let avg = (sum / self.sample_count as u64) as u32;

        let mut sorted = self.durations_us;
        sorted[..self.sample_count].sort_unstable();
        let p95_idx = (self.sample_count * 95 / 100).max(1) - 1;
        let p95 = sorted[p95_idx.min(self.sample_count - 1)];

        let max = self.max_us;
        self.max_us = 0;
        (avg, max, p95)
    }
}

/// Point-in-time view of [`FftTelemetry`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TelemetrySummary {
    pub batches: u64,
    pub jobs: u64,
    /// Times a caller found the job pool empty and backed off.
    pub pool_retries: u64,
    pub avg_batch_us: u32,
    pub max_batch_us: u32,
    pub p95_batch_us: u32,
}

pub struct FftTelemetry {
    batches: AtomicU64,
    jobs: AtomicU64,
    pool_retries: AtomicU64,
    batch_durations: Mutex<DurationRing>,
}

impl Default for FftTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl FftTelemetry {
    pub fn new() -> Self {
        Self {
            batches: AtomicU64::new(0),
            jobs: AtomicU64::new(0),
            pool_retries: AtomicU64::new(0),
            batch_durations: Mutex::new(DurationRing::new()),
        }
    }

    /// Record one completed wave of `jobs` windows.
    pub fn record_batch(&self, jobs: usize, duration: Duration) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.jobs.fetch_add(jobs as u64, Ordering::Relaxed);
        self.batch_durations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(duration);
    }

    pub fn record_pool_retry(&self) {
        self.pool_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pool_retries(&self) -> u64 {
        self.pool_retries.load(Ordering::Relaxed)
    }

    /// Counters are cumulative; the max batch duration resets on every call.
    pub fn take_summary(&self) -> TelemetrySummary {
        let (avg, max, p95) = self
            .batch_durations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take_summary();
        TelemetrySummary {
            batches: self.batches.load(Ordering::Relaxed),
            jobs: self.jobs.load(Ordering::Relaxed),
            pool_retries: self.pool_retries.load(Ordering::Relaxed),
            avg_batch_us: avg,
            max_batch_us: max,
            p95_batch_us: p95,
        }
    }
}
