//! Engine tuning constants and the FFT analysis settings derived from them.

use serde::{Deserialize, Serialize};

/// Number of slots in the activity history ring.
pub const ACTIVITY_HISTORY_RING_BUFFER_SIZE: usize = 1024;

/// Analysis window length in samples.
pub const FFT_STORAGE_SIZE: usize = 2048;

/// Number of overlapping windows started per window length.
pub const FFT_OVERLAP_DIVISION: usize = 4;

/// Maximum number of jobs a single caller submits per wave.
pub const FFT_JOBS_BATCH_SIZE: usize = 32;

/// Size of the preallocated job pool shared by all callers.
pub const FFT_PREALLOCATED_JOB_STRUCTS: usize = 256;

/// Sleep between attempts when the job pool is exhausted.
pub const FFT_POOL_RETRY_BACKOFF_MS: u64 = 5;

/// Parameters of the short-time FFT performed by the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FftSettings {
    pub window_size: usize,
    pub overlap_divisions: usize,
    pub batch_size: usize,
    pub preallocated_jobs: usize,
    /// `None` means one worker per available hardware thread.
    pub worker_threads: Option<usize>,
    pub retry_backoff_ms: u64,
}

impl Default for FftSettings {
    fn default() -> Self {
        Self {
            window_size: FFT_STORAGE_SIZE,
            overlap_divisions: FFT_OVERLAP_DIVISION,
            batch_size: FFT_JOBS_BATCH_SIZE,
            preallocated_jobs: FFT_PREALLOCATED_JOB_STRUCTS,
            worker_threads: None,
            retry_backoff_ms: FFT_POOL_RETRY_BACKOFF_MS,
        }
    }
}

impl FftSettings {
    /// Frequency bins kept per analysis window (DC up to, excluding, Nyquist).
    pub fn output_bins(&self) -> usize {
        self.window_size / 2
    }

    /// Distance in samples between the starts of two consecutive windows.
    pub fn hop_size(&self) -> usize {
        (self.window_size / self.overlap_divisions.max(1)).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_match_constants() {
        let s = FftSettings::default();
        assert_eq!(s.window_size, FFT_STORAGE_SIZE);
        assert_eq!(s.output_bins(), FFT_STORAGE_SIZE / 2);
        assert_eq!(s.hop_size(), FFT_STORAGE_SIZE / FFT_OVERLAP_DIVISION);
    }

    #[test]
    fn hop_size_never_zero() {
        let s = FftSettings {
            window_size: 2,
            overlap_divisions: 8,
            ..FftSettings::default()
        };
        assert_eq!(s.hop_size(), 1);
    }
}
