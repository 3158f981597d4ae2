use kholors_types::{SharedTask, TaskGroupId};

use super::lock_task;

/// Fixed-capacity ring of recorded tasks plus the stack of undone tasks.
///
/// Recording a new forward task invalidates the redo stack. Once the ring is
/// full, recording overwrites the oldest slot.
pub struct ActivityHistory {
    slots: Vec<Option<SharedTask>>,
    next_index: usize,
    canceled: Vec<SharedTask>,
}

impl ActivityHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: vec![None; capacity],
            next_index: 0,
            canceled: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Record a completed forward task. Clears the redo stack.
    pub fn record(&mut self, task: SharedTask) {
        self.canceled.clear();
        self.write(task);
    }

    /// Write at the cursor without touching the redo stack (used by redo).
    pub fn write(&mut self, task: SharedTask) {
        self.slots[self.next_index] = Some(task);
        self.next_index = (self.next_index + 1) % self.slots.len();
    }

    fn last_index(&self) -> usize {
        (self.next_index + self.slots.len() - 1) % self.slots.len()
    }

    /// Most recently written task, if its slot is still populated.
    pub fn peek_last(&self) -> Option<&SharedTask> {
        self.slots[self.last_index()].as_ref()
    }

    /// Clear the most recent slot and rewind the cursor onto it.
    pub fn take_last(&mut self) -> Option<SharedTask> {
        let idx = self.last_index();
        let task = self.slots[idx].take()?;
        self.next_index = idx;
        Some(task)
    }

    /// Group of the most recent task, if any.
    pub fn last_group(&self) -> Option<TaskGroupId> {
        self.peek_last().and_then(|t| lock_task(t).group())
    }

    pub fn push_canceled(&mut self, task: SharedTask) {
        self.canceled.push(task);
    }

    pub fn pop_canceled(&mut self) -> Option<SharedTask> {
        self.canceled.pop()
    }

    /// Group of the task the next redo would replay.
    pub fn next_canceled_group(&self) -> Option<TaskGroupId> {
        self.canceled.last().and_then(|t| lock_task(t).group())
    }

    pub fn canceled_len(&self) -> usize {
        self.canceled.len()
    }

    /// Number of populated slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.is_none())
    }

    /// Recorded tasks ordered from oldest to newest.
    pub fn snapshot(&self) -> Vec<SharedTask> {
        let cap = self.slots.len();
        (0..cap)
            .filter_map(|offset| self.slots[(self.next_index + offset) % cap].clone())
            .collect()
    }

    pub fn clear(&mut self) {
        self.canceled.clear();
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.next_index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kholors_types::{Task, TaskKind};
    use std::sync::Arc;

    fn tempo(bpm: f32) -> SharedTask {
        Task::new(TaskKind::TempoChange {
            old_bpm: 120.0,
            new_bpm: bpm,
        })
        .shared()
    }

    fn bpm_of(task: &SharedTask) -> f32 {
        match lock_task(task).kind {
            TaskKind::TempoChange { new_bpm, .. } => new_bpm,
            _ => unreachable!(),
        }
    }

    #[test]
    fn record_and_take_last() {
        let mut history = ActivityHistory::new(4);
        assert!(history.peek_last().is_none());

        history.record(tempo(100.0));
        history.record(tempo(110.0));
        assert_eq!(history.len(), 2);

        let last = history.take_last().unwrap();
        assert_eq!(bpm_of(&last), 110.0);
        assert_eq!(bpm_of(history.peek_last().unwrap()), 100.0);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn ring_overwrites_oldest() {
        let mut history = ActivityHistory::new(3);
        for bpm in [1.0, 2.0, 3.0, 4.0, 5.0] {
            history.record(tempo(bpm));
        }
        let kept: Vec<f32> = history.snapshot().iter().map(bpm_of).collect();
        assert_eq!(kept, vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn undo_past_oldest_finds_empty_slot() {
        let mut history = ActivityHistory::new(3);
        for bpm in [1.0, 2.0, 3.0, 4.0] {
            history.record(tempo(bpm));
        }
        assert!(history.take_last().is_some());
        assert!(history.take_last().is_some());
        assert!(history.take_last().is_some());
        // slot of the overwritten first entry
        assert!(history.take_last().is_none());
    }

    #[test]
    fn record_clears_canceled_but_write_does_not() {
        let mut history = ActivityHistory::new(4);
        history.record(tempo(1.0));
        let undone = history.take_last().unwrap();
        history.push_canceled(undone);
        assert_eq!(history.canceled_len(), 1);

        let redone = history.pop_canceled().unwrap();
        history.push_canceled(Arc::clone(&redone));
        history.write(tempo(2.0));
        assert_eq!(history.canceled_len(), 1);

        history.record(tempo(3.0));
        assert_eq!(history.canceled_len(), 0);
    }

    #[test]
    fn clear_resets_everything() {
        let mut history = ActivityHistory::new(2);
        history.record(tempo(1.0));
        history.record(tempo(2.0));
        let t = history.take_last().unwrap();
        history.push_canceled(t);

        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.canceled_len(), 0);
        assert!(history.peek_last().is_none());

        history.record(tempo(9.0));
        assert_eq!(history.snapshot().len(), 1);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut history = ActivityHistory::new(0);
        assert_eq!(history.capacity(), 1);
        history.record(tempo(1.0));
        history.record(tempo(2.0));
        assert_eq!(bpm_of(history.peek_last().unwrap()), 2.0);
    }
}
