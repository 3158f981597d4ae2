//! # kholors-types
//!
//! Shared type definitions for the Kholors editor core.
//! This crate holds the task model consumed by the activity manager in
//! kholors-core and the analysis settings consumed by kholors-audio.

mod settings;
pub mod task;

pub use settings::{
    FftSettings, ACTIVITY_HISTORY_RING_BUFFER_SIZE, FFT_JOBS_BATCH_SIZE, FFT_OVERLAP_DIVISION,
    FFT_POOL_RETRY_BACKOFF_MS, FFT_PREALLOCATED_JOB_STRUCTS, FFT_STORAGE_SIZE,
};
pub use task::*;

/// Unique identifier for a sample placed on the timeline.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct SampleId(u32);

impl SampleId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
    pub fn get(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for SampleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier shared by tasks that must be undone and redone as one unit.
///
/// Group ids are allocated by the activity manager; a task without a group
/// never chains with its neighbours in the history.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct TaskGroupId(u64);

impl TaskGroupId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TaskGroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "g{}", self.0)
    }
}
