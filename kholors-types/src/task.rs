//! Task model for the activity system.
//!
//! A task is a command or event that flows through the activity manager.
//! Producers construct a pending task, listeners claim it by marking it
//! completed (or failed), and completed undoable tasks land in the history
//! where their opposite tasks are used to revert them.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{SampleId, TaskGroupId};

/// Default upper bound of the kept spectral band (Hz).
pub const FULL_BAND_HIGH_CUT_HZ: f32 = 22_050.0;

/// Shared handle to a task. The history ring, the redo stack, an in-flight
/// delivery and the producer may all hold the same task.
pub type SharedTask = Arc<Mutex<Task>>;

/// Errors raised while converting tasks to and from their string form.
#[derive(Debug, Error)]
pub enum TaskCodecError {
    #[error("malformed task: {0}")]
    Json(#[from] serde_json::Error),
}

/// Spectral band kept by a sample: everything below `low_cut_hz` and above
/// `high_cut_hz` is filtered out.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterParams {
    pub low_cut_hz: f32,
    pub high_cut_hz: f32,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            low_cut_hz: 0.0,
            high_cut_hz: FULL_BAND_HIGH_CUT_HZ,
        }
    }
}

impl FilterParams {
    pub fn new(low_cut_hz: f32, high_cut_hz: f32) -> Self {
        Self {
            low_cut_hz,
            high_cut_hz,
        }
    }

    /// A band is valid when it is non-empty and starts at or above 0 Hz.
    pub fn is_valid(&self) -> bool {
        self.low_cut_hz >= 0.0 && self.low_cut_hz < self.high_cut_hz
    }
}

/// Everything needed to put a deleted sample back on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSnapshot {
    pub id: SampleId,
    pub file_path: PathBuf,
    pub position_beats: f32,
    pub filter: FilterParams,
    pub gain_db: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// The closed set of commands and events exchanged through the activity bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskKind {
    /// Place a sample on the timeline. The listener that performs the
    /// creation fills in `sample_id`; a task that already carries an id
    /// (redo) asks for that id to be reused.
    SampleCreate {
        file_path: PathBuf,
        position_beats: f32,
        sample_id: Option<SampleId>,
        duplicate_of: Option<SampleId>,
    },
    /// Remove a sample. The listener captures the removed state in `deleted`
    /// so that the deletion can be reverted.
    SampleDeletion {
        sample_id: SampleId,
        deleted: Option<SampleSnapshot>,
    },
    /// Put a previously deleted sample back.
    SampleRestore { snapshot: SampleSnapshot },
    SampleMove {
        sample_id: SampleId,
        from_beats: f32,
        to_beats: f32,
    },
    /// Low/high pass change on a sample.
    SampleFilter {
        sample_id: SampleId,
        before: FilterParams,
        after: FilterParams,
    },
    SampleGain {
        sample_id: SampleId,
        before_db: f32,
        after_db: f32,
    },
    /// A value typed into a numeric field (bpm box, gain box, ...).
    NumericInputUpdate {
        input_id: String,
        old_value: f64,
        new_value: f64,
        min: f64,
        max: f64,
    },
    TempoChange { old_bpm: f32, new_bpm: f32 },
    PlaybackState { playing: bool, position_beats: f32 },
    /// User-facing message routed to the notification display.
    Notification {
        message: String,
        level: NotificationLevel,
    },
}

impl TaskKind {
    /// Stable short name, used in logs and the task journal.
    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::SampleCreate { .. } => "sample_create",
            TaskKind::SampleDeletion { .. } => "sample_deletion",
            TaskKind::SampleRestore { .. } => "sample_restore",
            TaskKind::SampleMove { .. } => "sample_move",
            TaskKind::SampleFilter { .. } => "sample_filter",
            TaskKind::SampleGain { .. } => "sample_gain",
            TaskKind::NumericInputUpdate { .. } => "numeric_input_update",
            TaskKind::TempoChange { .. } => "tempo_change",
            TaskKind::PlaybackState { .. } => "playback_state",
            TaskKind::Notification { .. } => "notification",
        }
    }

    /// Whether tasks of this kind are recorded in the activity history at all.
    fn records_in_history(&self) -> bool {
        !matches!(
            self,
            TaskKind::PlaybackState { .. } | TaskKind::Notification { .. }
        )
    }
}

/// A command or event plus its delivery lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub kind: TaskKind,
    completed: bool,
    failed: bool,
    group: Option<TaskGroupId>,
    #[serde(default)]
    history_excluded: bool,
    #[serde(default)]
    reversion: bool,
}

impl Task {
    pub fn new(kind: TaskKind) -> Self {
        Self {
            kind,
            completed: false,
            failed: false,
            group: None,
            history_excluded: false,
            reversion: false,
        }
    }

    pub fn notification(message: impl Into<String>, level: NotificationLevel) -> Self {
        Self::new(TaskKind::Notification {
            message: message.into(),
            level,
        })
    }

    pub fn with_group(mut self, group: TaskGroupId) -> Self {
        self.group = Some(group);
        self
    }

    /// Wrap the task for sharing between the producer and the activity manager.
    pub fn shared(self) -> SharedTask {
        Arc::new(Mutex::new(self))
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn group(&self) -> Option<TaskGroupId> {
        self.group
    }

    pub fn set_group(&mut self, group: Option<TaskGroupId>) {
        self.group = group;
    }

    /// True when both tasks belong to the same (existing) group.
    pub fn shares_group_with(&self, other: &Task) -> bool {
        self.group.is_some() && self.group == other.group
    }

    pub fn complete(&mut self) {
        self.completed = true;
    }

    pub fn fail(&mut self) {
        self.completed = true;
        self.failed = true;
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Whether this task may be recorded once it completes successfully.
    pub fn goes_in_task_history(&self) -> bool {
        !self.history_excluded && self.kind.records_in_history()
    }

    pub fn exclude_from_history(&mut self) {
        self.history_excluded = true;
    }

    pub fn include_in_history(&mut self) {
        self.history_excluded = false;
    }

    pub fn mark_reversion(&mut self) {
        self.reversion = true;
    }

    pub fn clear_reversion(&mut self) {
        self.reversion = false;
    }

    /// Reversions are tasks broadcast by undo/redo rather than by a user action.
    pub fn is_reversion(&self) -> bool {
        self.reversion
    }

    /// Recorded tasks are completed, successful and history-eligible.
    pub fn is_recordable(&self) -> bool {
        self.completed && !self.failed && self.goes_in_task_history()
    }

    /// Return the task to the pending state so it can be delivered again.
    pub fn reset_for_repost(&mut self) {
        self.completed = false;
        self.failed = false;
    }

    /// Reject a numeric input whose new value lies outside its range.
    /// Returns whether the value was accepted; other kinds are always accepted.
    pub fn validate_numeric_input(&mut self) -> bool {
        if let TaskKind::NumericInputUpdate {
            new_value, min, max, ..
        } = &self.kind
        {
            if new_value.is_nan() || *new_value < *min || *new_value > *max {
                self.fail();
                return false;
            }
        }
        true
    }

    /// Tasks that, once broadcast, revert this one. Empty means not undoable.
    ///
    /// Creation and deletion can only be reverted after a listener filled in
    /// the allocated id or the deleted state.
    pub fn opposite_tasks(&self) -> Vec<Task> {
        let opposite = match &self.kind {
            TaskKind::SampleCreate {
                sample_id: Some(id),
                ..
            } => Some(TaskKind::SampleDeletion {
                sample_id: *id,
                deleted: None,
            }),
            TaskKind::SampleCreate { sample_id: None, .. } => None,
            TaskKind::SampleDeletion {
                deleted: Some(snapshot),
                ..
            } => Some(TaskKind::SampleRestore {
                snapshot: snapshot.clone(),
            }),
            TaskKind::SampleDeletion { deleted: None, .. } => None,
            TaskKind::SampleRestore { snapshot } => Some(TaskKind::SampleDeletion {
                sample_id: snapshot.id,
                deleted: None,
            }),
            TaskKind::SampleMove {
                sample_id,
                from_beats,
                to_beats,
            } => Some(TaskKind::SampleMove {
                sample_id: *sample_id,
                from_beats: *to_beats,
                to_beats: *from_beats,
            }),
            TaskKind::SampleFilter {
                sample_id,
                before,
                after,
            } => Some(TaskKind::SampleFilter {
                sample_id: *sample_id,
                before: *after,
                after: *before,
            }),
            TaskKind::SampleGain {
                sample_id,
                before_db,
                after_db,
            } => Some(TaskKind::SampleGain {
                sample_id: *sample_id,
                before_db: *after_db,
                after_db: *before_db,
            }),
            TaskKind::NumericInputUpdate {
                input_id,
                old_value,
                new_value,
                min,
                max,
            } => Some(TaskKind::NumericInputUpdate {
                input_id: input_id.clone(),
                old_value: *new_value,
                new_value: *old_value,
                min: *min,
                max: *max,
            }),
            TaskKind::TempoChange { old_bpm, new_bpm } => Some(TaskKind::TempoChange {
                old_bpm: *new_bpm,
                new_bpm: *old_bpm,
            }),
            TaskKind::PlaybackState { .. } | TaskKind::Notification { .. } => None,
        };

        opposite
            .map(|kind| {
                let mut task = Task::new(kind);
                task.group = self.group;
                vec![task]
            })
            .unwrap_or_default()
    }

    /// Serialize the task, lifecycle flags included.
    pub fn marshal(&self) -> Result<String, TaskCodecError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn unmarshal(input: &str) -> Result<Task, TaskCodecError> {
        Ok(serde_json::from_str(input)?)
    }
}
