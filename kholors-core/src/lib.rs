//! # kholors-core
//!
//! Task broadcast bus of the Kholors editor: delivery of tasks to listeners,
//! the activity history, and group-aware undo/redo. Independent of any UI.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kholors_core::activity::{ActivityManager, NestedTasks};
//! use kholors_core::config::Config;
//! use kholors_types::{Task, TaskKind};
//!
//! // 1. One manager per application, shared with every producer
//! let config = Config::load();
//! let activity = Arc::new(ActivityManager::from_config(&config));
//!
//! // 2. Infrastructure listeners first, UI listeners after
//! activity.register_task_listener(Box::new(|task: &mut Task, _: &mut NestedTasks| {
//!     if let TaskKind::TempoChange { new_bpm, .. } = task.kind {
//!         // apply new_bpm ...
//!         task.complete();
//!     }
//!     false
//! }));
//!
//! // 3. Broadcast, then undo/redo
//! activity.broadcast_task(Task::new(TaskKind::TempoChange { old_bpm: 120.0, new_bpm: 90.0 }).shared());
//! activity.undo_last_activity();
//! activity.redo_last_activity();
//! ```
//!
//! ## Module Overview
//!
//! - [`activity`]: `ActivityManager`, the history ring and the listener protocol
//! - [`journal`]: JSONL journal of delivered tasks and its reader
//! - [`config`]: TOML configuration (embedded defaults + user override)

pub mod activity;
pub mod config;
pub mod journal;

pub use activity::{ActivityManager, NestedTasks, TaskListener};
pub use config::Config;
pub use journal::TaskJournal;
