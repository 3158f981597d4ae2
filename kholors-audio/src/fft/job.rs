//! Reusable FFT jobs and the fixed pool they are drawn from.
//!
//! Every job owns an input buffer with capacity for one window and an
//! output buffer of exactly one window's bins, both allocated when the pool
//! is built. Steady-state analysis only moves `Arc` handles around.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rustfft::num_complex::Complex;
use rustfft::Fft;

use crate::wait_group::WaitGroup;

pub type SharedJob = Arc<Mutex<FftJob>>;

pub(crate) fn lock_job(job: &SharedJob) -> MutexGuard<'_, FftJob> {
    job.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct FftJob {
    window_size: usize,
    input: Vec<f32>,
    output: Vec<f32>,
    wait_group: Option<Arc<WaitGroup>>,
    /// False while the output holds a result nobody has copied out yet.
    result_fetched: bool,
}

impl FftJob {
    fn new(window_size: usize, bins: usize) -> Self {
        Self {
            window_size,
            input: Vec::with_capacity(window_size),
            output: vec![0.0; bins],
            wait_group: None,
            result_fetched: true,
        }
    }

    /// Copy one window of input (possibly shorter than a full window).
    pub fn load(&mut self, samples: &[f32], wait_group: Arc<WaitGroup>) {
        self.input.clear();
        let take = samples.len().min(self.window_size);
        self.input.extend_from_slice(&samples[..take]);
        self.wait_group = Some(wait_group);
    }

    pub fn input_len(&self) -> usize {
        self.input.len()
    }

    /// Window, transform and keep the magnitudes of the first bins.
    ///
    /// `buffer` must hold `window.len()` points and `scratch` the plan's
    /// in-place scratch length; both belong to the calling worker.
    pub fn compute(
        &mut self,
        fft: &dyn Fft<f32>,
        window: &[f32],
        buffer: &mut [Complex<f32>],
        scratch: &mut [Complex<f32>],
    ) {
        for (i, (point, coeff)) in buffer.iter_mut().zip(window).enumerate() {
            let sample = self.input.get(i).copied().unwrap_or(0.0);
            *point = Complex::new(sample * coeff, 0.0);
        }
        fft.process_with_scratch(buffer, scratch);

        for (bin, point) in self.output.iter_mut().zip(buffer.iter()) {
            *bin = point.norm();
        }
        self.result_fetched = false;
    }

    /// Hand the wait group to the worker so it can signal outside the job lock.
    pub fn take_wait_group(&mut self) -> Option<Arc<WaitGroup>> {
        self.wait_group.take()
    }

    /// Copy the result out and mark the job free for reuse.
    pub fn fetch_into(&mut self, out: &mut [f32]) {
        let n = out.len().min(self.output.len());
        out[..n].copy_from_slice(&self.output[..n]);
        self.result_fetched = true;
    }

    pub fn is_result_fetched(&self) -> bool {
        self.result_fetched
    }

    pub fn output(&self) -> &[f32] {
        &self.output
    }
}

/// Fixed set of jobs shared by every caller of one runner.
pub struct JobPool {
    free: Mutex<Vec<SharedJob>>,
    capacity: usize,
}

impl JobPool {
    pub fn new(capacity: usize, window_size: usize, bins: usize) -> Self {
        let free = (0..capacity)
            .map(|_| Arc::new(Mutex::new(FftJob::new(window_size, bins))))
            .collect();
        Self {
            free: Mutex::new(free),
            capacity,
        }
    }

    fn lock_free(&self) -> MutexGuard<'_, Vec<SharedJob>> {
        self.free.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.lock_free().len()
    }

    /// Move up to `max` free jobs into `out`. Returns how many were taken;
    /// 0 means the pool is exhausted right now.
    pub fn acquire_batch(&self, max: usize, out: &mut Vec<SharedJob>) -> usize {
        let mut free = self.lock_free();
        let take = max.min(free.len());
        let start = free.len() - take;
        out.extend(free.drain(start..));
        take
    }

    /// Return jobs to the pool, draining `jobs`. A job whose result was never
    /// fetched is still owned by its consumer and stays out of the pool.
    pub fn release(&self, jobs: &mut Vec<SharedJob>) {
        let mut free = self.lock_free();
        for job in jobs.drain(..) {
            if lock_job(&job).is_result_fetched() {
                free.push(job);
            } else {
                log::error!(target: "fft", "job released before its result was fetched");
            }
        }
    }
}
