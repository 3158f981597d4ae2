//! Short-time FFT over multi-channel sample buffers.
//!
//! A channel of `n` samples is cut into overlapping windows of
//! `window_size` samples, one every `hop_size` samples. The final window of
//! a channel is truncated at the end of the buffer and zero-padded. Each
//! window yields `window_size / 2` magnitude bins.

mod job;
mod runner;

pub use job::{FftJob, JobPool, SharedJob};
pub use runner::FftRunner;

use std::f32::consts::PI;

use thiserror::Error;

use kholors_types::FftSettings;

#[derive(Debug, Error)]
pub enum FftError {
    #[error("sample buffer has no channels")]
    NoChannels,
    #[error("channel {channel} has {found} samples, expected {expected}")]
    ChannelLengthMismatch {
        channel: usize,
        expected: usize,
        found: usize,
    },
    #[error("invalid FFT settings: {0}")]
    InvalidSettings(String),
    #[error("could not start any FFT worker thread")]
    NoWorkers,
}

/// Number of analysis windows needed to cover `num_samples`.
///
/// `ceil(num_samples / window) * overlap - (overlap - 1)`, so a buffer of
/// exactly one window gives 1 and one sample more gives `overlap + 1`.
pub fn num_fft_from_num_samples(num_samples: usize, settings: &FftSettings) -> usize {
    if num_samples == 0 || settings.window_size == 0 {
        return 0;
    }
    let overlap = settings.overlap_divisions.max(1);
    num_samples.div_ceil(settings.window_size) * overlap - (overlap - 1)
}

/// Periodic Hann window coefficients.
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / size as f32).cos()))
        .collect()
}

/// Multi-channel audio, every channel the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    channels: Vec<Vec<f32>>,
}

impl SampleBuffer {
    pub fn new(channels: Vec<Vec<f32>>) -> Result<Self, FftError> {
        let expected = channels.first().ok_or(FftError::NoChannels)?.len();
        if let Some((channel, found)) = channels
            .iter()
            .map(Vec::len)
            .enumerate()
            .find(|(_, len)| *len != expected)
        {
            return Err(FftError::ChannelLengthMismatch {
                channel,
                expected,
                found,
            });
        }
        Ok(Self { channels })
    }

    pub fn mono(samples: Vec<f32>) -> Self {
        Self {
            channels: vec![samples],
        }
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn num_samples(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn channel(&self, idx: usize) -> Option<&[f32]> {
        self.channels.get(idx).map(Vec::as_slice)
    }

    pub fn channels(&self) -> impl Iterator<Item = &[f32]> {
        self.channels.iter().map(Vec::as_slice)
    }
}
