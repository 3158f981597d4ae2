//! Listener protocol of the activity bus.

use std::collections::VecDeque;

use kholors_types::Task;

/// A collaborator that reacts to tasks broadcast through the activity manager.
///
/// Listeners are invoked one at a time, in registration order, on whichever
/// thread is currently delivering. Returning `true` stops delivery of this
/// task to the listeners registered after this one.
pub trait TaskListener: Send {
    fn handle_task(&mut self, task: &mut Task, nested: &mut NestedTasks) -> bool;
}

impl<F> TaskListener for F
where
    F: FnMut(&mut Task, &mut NestedTasks) -> bool + Send,
{
    fn handle_task(&mut self, task: &mut Task, nested: &mut NestedTasks) -> bool {
        self(task, nested)
    }
}

/// Follow-up tasks emitted by listeners while they handle a task.
///
/// Nested tasks are delivered to every listener within the same delivery
/// episode, right after the current task has been offered to all listeners,
/// in emission order. They bypass the broadcast queue and are never recorded
/// in the history.
#[derive(Debug, Default)]
pub struct NestedTasks {
    pending: VecDeque<Task>,
}

impl NestedTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn broadcast_nested_task_now(&mut self, task: Task) {
        self.pending.push_back(task);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub(crate) fn pop(&mut self) -> Option<Task> {
        self.pending.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kholors_types::NotificationLevel;

    #[test]
    fn nested_tasks_pop_in_emission_order() {
        let mut nested = NestedTasks::new();
        nested.broadcast_nested_task_now(Task::notification("first", NotificationLevel::Info));
        nested.broadcast_nested_task_now(Task::notification("second", NotificationLevel::Info));
        assert_eq!(nested.len(), 2);

        let first = nested.pop().unwrap();
        assert_eq!(
            first.kind,
            kholors_types::TaskKind::Notification {
                message: "first".to_string(),
                level: NotificationLevel::Info
            }
        );
        assert!(nested.pop().is_some());
        assert!(nested.is_empty());
    }

    #[test]
    fn closures_are_listeners() {
        let mut seen = 0;
        {
            let mut listener = |_: &mut Task, _: &mut NestedTasks| {
                seen += 1;
                false
            };
            let mut task = Task::notification("hi", NotificationLevel::Info);
            let mut nested = NestedTasks::new();
            assert!(!listener.handle_task(&mut task, &mut nested));
        }
        assert_eq!(seen, 1);
    }
}
