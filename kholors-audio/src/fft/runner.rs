//! Fixed-size FFT worker pool.
//!
//! Callers cut each channel into windows, draw jobs from the shared
//! [`JobPool`] in waves of at most `batch_size`, push them onto a crossbeam
//! channel drained by the workers, and block on a [`WaitGroup`] until the
//! wave is done. Dropping the runner disconnects the channel, which wakes
//! every idle worker, and joins them before the pool goes away.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use kholors_types::FftSettings;

use super::job::{lock_job, JobPool, SharedJob};
use super::{hann_window, num_fft_from_num_samples, FftError, SampleBuffer};
use crate::telemetry::{FftTelemetry, TelemetrySummary};
use crate::wait_group::WaitGroup;

pub struct FftRunner {
    settings: FftSettings,
    pool: JobPool,
    sender: Option<Sender<SharedJob>>,
    workers: Vec<JoinHandle<()>>,
    telemetry: FftTelemetry,
}

impl FftRunner {
    /// Build the job pool and spawn the workers.
    ///
    /// One worker per hardware thread unless `settings.worker_threads` says
    /// otherwise. Fails only if the settings are unusable or no worker thread
    /// could be started at all.
    pub fn new(settings: FftSettings) -> Result<Self, FftError> {
        validate(&settings)?;

        let num_workers = settings.worker_threads.unwrap_or_else(|| {
            thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });

        let fft = FftPlanner::<f32>::new().plan_fft_forward(settings.window_size);
        let window: Arc<[f32]> = hann_window(settings.window_size).into();
        let (tx, rx) = crossbeam_channel::unbounded::<SharedJob>();

        let mut workers = Vec::with_capacity(num_workers);
        for idx in 0..num_workers {
            let rx = rx.clone();
            let fft = fft.clone();
            let window = window.clone();
            match thread::Builder::new()
                .name(format!("fft-worker-{}", idx))
                .spawn(move || worker_loop(rx, fft, window))
            {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    log::error!(target: "fft", "failed to spawn fft-worker-{}: {}", idx, e);
                }
            }
        }
        if workers.is_empty() {
            return Err(FftError::NoWorkers);
        }

        log::info!(
            target: "fft",
            "FFT runner ready: {} workers, {} jobs, window {} / {}",
            workers.len(),
            settings.preallocated_jobs,
            settings.window_size,
            settings.overlap_divisions
        );

        Ok(Self {
            pool: JobPool::new(
                settings.preallocated_jobs,
                settings.window_size,
                settings.output_bins(),
            ),
            settings,
            sender: Some(tx),
            workers,
            telemetry: FftTelemetry::new(),
        })
    }

    pub fn settings(&self) -> &FftSettings {
        &self.settings
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    pub fn pool(&self) -> &JobPool {
        &self.pool
    }

    /// Magnitude spectra of every window of every channel, laid out
    /// `[channel][window][bin]`. Blocks until all windows are computed.
    pub fn perform_fft(&self, buffer: &SampleBuffer) -> Vec<f32> {
        let bins = self.settings.output_bins();
        let hop = self.settings.hop_size();
        let window_size = self.settings.window_size;
        let windows = num_fft_from_num_samples(buffer.num_samples(), &self.settings);
        let per_channel = windows * bins;

        let mut result = vec![0.0; buffer.num_channels() * per_channel];
        let Some(sender) = self.sender.as_ref() else {
            return result;
        };
        if windows == 0 {
            return result;
        }

        let batch = self.settings.batch_size.clamp(1, self.pool.capacity());
        let wait_group = Arc::new(WaitGroup::new());
        let mut jobs = Vec::with_capacity(batch);

        for (channel, out) in buffer.channels().zip(result.chunks_mut(per_channel)) {
            let mut next = 0;
            while next < windows {
                self.acquire_jobs((windows - next).min(batch), &mut jobs);
                let started = Instant::now();

                wait_group.add(jobs.len());
                for (offset, job) in jobs.iter().enumerate() {
                    let start = (next + offset) * hop;
                    let end = (start + window_size).min(channel.len());
                    lock_job(job).load(&channel[start..end], wait_group.clone());
                    if sender.send(job.clone()).is_err() {
                        log::error!(target: "fft", "FFT workers are gone, window {} left empty", next + offset);
                        lock_job(job).take_wait_group();
                        wait_group.done();
                    }
                }
                wait_group.wait();

                for (offset, job) in jobs.iter().enumerate() {
                    let w = next + offset;
                    lock_job(job).fetch_into(&mut out[w * bins..(w + 1) * bins]);
                }
                next += jobs.len();
                self.telemetry.record_batch(jobs.len(), started.elapsed());
                self.pool.release(&mut jobs);
            }
        }

        result
    }

    /// Draw up to `wanted` jobs, backing off while the pool is empty.
    fn acquire_jobs(&self, wanted: usize, jobs: &mut Vec<SharedJob>) {
        while self.pool.acquire_batch(wanted, jobs) == 0 {
            self.telemetry.record_pool_retry();
            log::warn!(
                target: "fft",
                "FFT job pool exhausted ({} jobs), retrying in {} ms",
                self.pool.capacity(),
                self.settings.retry_backoff_ms
            );
            thread::sleep(Duration::from_millis(self.settings.retry_backoff_ms));
        }
    }

    /// Telemetry since construction. Resets the max batch duration.
    pub fn take_telemetry(&self) -> TelemetrySummary {
        self.telemetry.take_summary()
    }
}

impl Drop for FftRunner {
    fn drop(&mut self) {
        // Disconnecting the channel wakes every worker blocked in recv().
        self.sender.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!(target: "fft", "FFT worker panicked");
            }
        }
        log::debug!(target: "fft", "FFT runner shut down");
    }
}

fn validate(settings: &FftSettings) -> Result<(), FftError> {
    if settings.window_size < 2 {
        return Err(FftError::InvalidSettings(format!(
            "window_size {} is too small",
            settings.window_size
        )));
    }
    // Windows only tile the buffer to its end when the hop is exact.
    if settings.overlap_divisions == 0 || settings.window_size % settings.overlap_divisions != 0 {
        return Err(FftError::InvalidSettings(format!(
            "overlap_divisions {} must divide window_size {}",
            settings.overlap_divisions, settings.window_size
        )));
    }
    if settings.preallocated_jobs == 0 {
        return Err(FftError::InvalidSettings(
            "preallocated_jobs must be at least 1".to_string(),
        ));
    }
    if settings.worker_threads == Some(0) {
        return Err(FftError::InvalidSettings(
            "worker_threads must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn worker_loop(rx: Receiver<SharedJob>, fft: Arc<dyn Fft<f32>>, window: Arc<[f32]>) {
    let mut buffer = vec![Complex::new(0.0, 0.0); window.len()];
    let mut scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

    while let Ok(job) = rx.recv() {
        let wait_group = {
            let mut job = lock_job(&job);
            job.compute(&*fft, &window, &mut buffer, &mut scratch);
            job.take_wait_group()
        };
        if let Some(wait_group) = wait_group {
            wait_group.done();
        }
    }
}
