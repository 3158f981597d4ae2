//! Activity manager: the task broadcast bus with undo/redo.
//!
//! Any thread may call [`ActivityManager::broadcast_task`]. Submitted tasks go
//! into a FIFO queue; the first caller that wins the broadcast lock becomes
//! the delivery thread and drains the queue, so listeners never run
//! concurrently and no submission is lost to contention. Completed,
//! successful, history-eligible tasks are recorded in a fixed ring from
//! which [`ActivityManager::undo_last_activity`] reverts them by
//! broadcasting their opposite tasks.

mod history;
mod listener;

pub use history::ActivityHistory;
pub use listener::{NestedTasks, TaskListener};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

use kholors_types::{SharedTask, Task, TaskGroupId, ACTIVITY_HISTORY_RING_BUFFER_SIZE};

use crate::config::Config;
use crate::journal::TaskJournal;

pub(crate) fn lock_task(task: &SharedTask) -> MutexGuard<'_, Task> {
    task.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State only touched by the thread holding the broadcast lock.
struct BroadcastState {
    listeners: Vec<Box<dyn TaskListener>>,
    history: ActivityHistory,
    journal: Option<TaskJournal>,
}

impl BroadcastState {
    /// Offer a task to every listener until one of them halts delivery.
    /// The journal sees the task afterwards whether or not delivery halted.
    fn offer(&mut self, task: &mut Task, nested: &mut NestedTasks) {
        for (idx, listener) in self.listeners.iter_mut().enumerate() {
            if listener.handle_task(task, nested) {
                log::trace!(target: "activity", "{} stopped at listener {}", task.name(), idx);
                break;
            }
        }
        if let Some(journal) = self.journal.as_mut() {
            journal.log_task(task);
        }
    }

    /// Deliver nested follow-ups until none are left. They are never recorded.
    fn deliver_nested(&mut self, mut nested: NestedTasks) {
        while let Some(mut task) = nested.pop() {
            task.exclude_from_history();
            log::debug!(target: "activity", "delivering nested {}", task.name());
            self.offer(&mut task, &mut nested);
        }
    }

    /// Deliver a task that is not part of the history (undo opposites).
    fn deliver_owned(&mut self, task: &mut Task) {
        let mut nested = NestedTasks::new();
        self.offer(task, &mut nested);
        self.deliver_nested(nested);
    }

    /// Deliver a shared task, holding its lock for the listener pass only.
    fn deliver_shared(&mut self, task: &SharedTask) {
        let mut nested = NestedTasks::new();
        {
            let mut guard = lock_task(task);
            self.offer(&mut guard, &mut nested);
        }
        self.deliver_nested(nested);
    }

    fn deliver_and_record(&mut self, task: SharedTask) {
        self.deliver_shared(&task);

        let (recordable, name, completed, failed) = {
            let t = lock_task(&task);
            (t.is_recordable(), t.name(), t.is_completed(), t.is_failed())
        };
        if recordable {
            log::debug!(target: "activity", "recording {} in history", name);
            self.history.record(task);
        } else {
            log::debug!(
                target: "activity",
                "{} not recorded (completed: {}, failed: {})",
                name, completed, failed
            );
        }
    }
}

/// Central task bus. Construct once and share it (`Arc<ActivityManager>`)
/// with every producer.
pub struct ActivityManager {
    broadcast: Mutex<BroadcastState>,
    queue: Mutex<VecDeque<SharedTask>>,
    stopped: AtomicBool,
    next_group: AtomicU64,
}

impl Default for ActivityManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityManager {
    pub fn new() -> Self {
        Self::with_history_capacity(ACTIVITY_HISTORY_RING_BUFFER_SIZE)
    }

    pub fn with_history_capacity(capacity: usize) -> Self {
        Self {
            broadcast: Mutex::new(BroadcastState {
                listeners: Vec::new(),
                history: ActivityHistory::new(capacity),
                journal: None,
            }),
            queue: Mutex::new(VecDeque::new()),
            stopped: AtomicBool::new(false),
            next_group: AtomicU64::new(1),
        }
    }

    /// Manager sized from the config, with the task journal attached when
    /// `[activity] journal` is on. A journal that cannot be opened is logged
    /// and skipped.
    pub fn from_config(config: &Config) -> Self {
        let manager = Self::with_history_capacity(config.history_size());
        if config.journal_enabled() {
            match config.journal_path() {
                Some(path) => match TaskJournal::open(&path) {
                    Ok(journal) => manager.attach_journal(journal),
                    Err(e) => {
                        log::warn!(target: "journal", "task journal disabled, {}: {}", path.display(), e)
                    }
                },
                None => log::warn!(target: "journal", "task journal disabled, no data directory"),
            }
        }
        manager
    }

    fn lock_broadcast(&self) -> MutexGuard<'_, BroadcastState> {
        self.broadcast.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_lock_broadcast(&self) -> Option<MutexGuard<'_, BroadcastState>> {
        match self.broadcast.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::WouldBlock) => None,
            Err(TryLockError::Poisoned(p)) => Some(p.into_inner()),
        }
    }

    fn lock_queue(&self) -> MutexGuard<'_, VecDeque<SharedTask>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pop_queued(&self) -> Option<SharedTask> {
        self.lock_queue().pop_front()
    }

    /// Drain the queue while holding the broadcast lock, then release it.
    ///
    /// A producer may enqueue between our last empty pop and the unlock while
    /// failing to take the lock; re-check after unlocking so its task is
    /// not stranded.
    fn finish_episode<'a>(&'a self, mut state: MutexGuard<'a, BroadcastState>) {
        loop {
            while let Some(task) = self.pop_queued() {
                state.deliver_and_record(task);
            }
            drop(state);

            if self.lock_queue().is_empty() {
                return;
            }
            state = match self.try_lock_broadcast() {
                Some(guard) => guard,
                None => return,
            };
        }
    }

    /// Read broadcast state, then drain anything producers queued while the
    /// lock was held.
    fn with_state<R>(&self, read: impl FnOnce(&BroadcastState) -> R) -> R {
        let state = self.lock_broadcast();
        let result = read(&state);
        self.finish_episode(state);
        result
    }

    /// Append a listener. Registration order is delivery order.
    pub fn register_task_listener(&self, listener: Box<dyn TaskListener>) {
        let mut state = self.lock_broadcast();
        state.listeners.push(listener);
        self.finish_episode(state);
    }

    /// Log every delivered task, including those a listener halted and
    /// undo/redo reversions. Replaces any journal attached before.
    pub fn attach_journal(&self, journal: TaskJournal) {
        let mut state = self.lock_broadcast();
        state.journal = Some(journal);
        self.finish_episode(state);
    }

    pub fn has_journal(&self) -> bool {
        self.with_state(|state| state.journal.is_some())
    }

    /// Allocate a fresh id for tasks that must undo/redo together.
    pub fn new_task_group(&self) -> TaskGroupId {
        TaskGroupId::new(self.next_group.fetch_add(1, Ordering::Relaxed))
    }

    /// Submit a task. If another thread is currently delivering, the task is
    /// delivered by that thread within its current episode.
    pub fn broadcast_task(&self, task: SharedTask) {
        if self.stopped.load(Ordering::Acquire) {
            log::debug!(
                target: "activity",
                "broadcast stopped, dropping {}",
                lock_task(&task).name()
            );
            return;
        }

        self.lock_queue().push_back(task);

        if let Some(state) = self.try_lock_broadcast() {
            self.finish_episode(state);
        }
    }

    /// Drop every task submitted from now on (used at shutdown). Tasks
    /// already queued are still delivered.
    pub fn stop_task_broadcast(&self) {
        log::info!(target: "activity", "task broadcast stopped");
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_broadcast_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Revert the most recent activity, including every older entry of the
    /// same task group. Returns the number of tasks undone.
    ///
    /// Must not be called from inside a listener.
    pub fn undo_last_activity(&self) -> usize {
        let mut state = self.lock_broadcast();
        let mut undone = 0;

        loop {
            let Some(task) = state.history.peek_last().cloned() else {
                log::info!(target: "activity::undo", "nothing to undo");
                break;
            };
            let (group, opposites, name) = {
                let t = lock_task(&task);
                (t.group(), t.opposite_tasks(), t.name())
            };
            if opposites.is_empty() {
                log::info!(target: "activity::undo", "{} cannot be undone", name);
                break;
            }

            for mut opposite in opposites {
                opposite.mark_reversion();
                opposite.exclude_from_history();
                log::debug!(
                    target: "activity::undo",
                    "reverting {} with {}",
                    name,
                    opposite.name()
                );
                state.deliver_owned(&mut opposite);
            }

            state.history.take_last();
            state.history.push_canceled(task);
            undone += 1;

            let chained = group.is_some() && state.history.last_group() == group;
            if !chained {
                break;
            }
        }

        self.finish_episode(state);
        undone
    }

    /// Replay the most recently undone activity and its group. Returns the
    /// number of tasks redone.
    ///
    /// Must not be called from inside a listener.
    pub fn redo_last_activity(&self) -> usize {
        let mut state = self.lock_broadcast();
        let mut redone = 0;

        loop {
            let Some(task) = state.history.pop_canceled() else {
                log::info!(target: "activity::undo", "nothing to redo");
                break;
            };
            let (group, was_reversion) = {
                let mut t = lock_task(&task);
                let was_reversion = t.is_reversion();
                t.reset_for_repost();
                t.exclude_from_history();
                t.mark_reversion();
                (t.group(), was_reversion)
            };

            state.deliver_shared(&task);

            // The exclusion and reversion marks only apply to this delivery.
            let (failed, name) = {
                let mut t = lock_task(&task);
                t.include_in_history();
                if !was_reversion {
                    t.clear_reversion();
                }
                (t.is_failed(), t.name())
            };
            if failed {
                log::warn!(target: "activity::undo", "redo of {} failed, dropping it", name);
                break;
            }
            state.history.write(task);
            redone += 1;

            let chained = group.is_some() && state.history.next_canceled_group() == group;
            if !chained {
                break;
            }
        }

        self.finish_episode(state);
        redone
    }

    /// Forget all recorded and undone tasks.
    pub fn clear_task_history(&self) {
        let mut state = self.lock_broadcast();
        state.history.clear();
        log::debug!(target: "activity", "task history cleared");
        self.finish_episode(state);
    }

    pub fn can_undo(&self) -> bool {
        self.with_state(|state| {
            state
                .history
                .peek_last()
                .is_some_and(|t| !lock_task(t).opposite_tasks().is_empty())
        })
    }

    pub fn can_redo(&self) -> bool {
        self.with_state(|state| state.history.canceled_len() > 0)
    }

    pub fn history_len(&self) -> usize {
        self.with_state(|state| state.history.len())
    }

    pub fn history_capacity(&self) -> usize {
        self.with_state(|state| state.history.capacity())
    }

    /// Recorded tasks, oldest first.
    pub fn history_snapshot(&self) -> Vec<SharedTask> {
        self.with_state(|state| state.history.snapshot())
    }

    pub fn canceled_len(&self) -> usize {
        self.with_state(|state| state.history.canceled_len())
    }

    /// Number of submitted tasks still waiting for delivery.
    pub fn pending_len(&self) -> usize {
        self.lock_queue().len()
    }
}
