//! # kholors-audio
//!
//! Spectral analysis services of the Kholors editor: a fixed-size FFT worker
//! pool with a preallocated job pool, the wait group it synchronises batches
//! with, and its telemetry.
//!
//! ```rust,ignore
//! use kholors_audio::fft::{FftRunner, SampleBuffer};
//! use kholors_types::FftSettings;
//!
//! let runner = FftRunner::new(FftSettings::default())?;
//! let buffer = SampleBuffer::new(vec![left, right])?;
//! let bins = runner.perform_fft(&buffer); // [channel][window][bin]
//! ```

pub mod fft;
pub mod telemetry;
pub mod wait_group;

pub use fft::{num_fft_from_num_samples, FftError, FftRunner, SampleBuffer};
pub use telemetry::{FftTelemetry, TelemetrySummary};
pub use wait_group::WaitGroup;
