use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use kholors_core::activity::{ActivityManager, NestedTasks};
use kholors_types::{SampleId, Task, TaskKind};

const PRODUCERS: u32 = 8;
const TASKS_PER_PRODUCER: u32 = 200;

/// Producer index in the sample id, sequence number in the target position.
fn tagged(producer: u32, seq: u32) -> Task {
    Task::new(TaskKind::SampleMove {
        sample_id: SampleId::new(producer),
        from_beats: 0.0,
        to_beats: seq as f32,
    })
}

#[test]
fn concurrent_producers_are_delivered_once_in_order() {
    let manager = Arc::new(ActivityManager::with_history_capacity(64));
    let in_listener = Arc::new(AtomicBool::new(false));
    let overlaps = Arc::new(AtomicUsize::new(0));
    let seen: Arc<Mutex<HashMap<u32, Vec<u32>>>> = Arc::new(Mutex::new(HashMap::new()));

    {
        let in_listener = in_listener.clone();
        let overlaps = overlaps.clone();
        let seen = seen.clone();
        manager.register_task_listener(Box::new(move |task: &mut Task, _: &mut NestedTasks| {
            if in_listener.swap(true, Ordering::SeqCst) {
                overlaps.fetch_add(1, Ordering::SeqCst);
            }
            if let TaskKind::SampleMove {
                sample_id,
                to_beats,
                ..
            } = task.kind
            {
                seen.lock()
                    .unwrap()
                    .entry(sample_id.get())
                    .or_default()
                    .push(to_beats as u32);
                task.complete();
            }
            in_listener.store(false, Ordering::SeqCst);
            false
        }));
    }

    let barrier = Arc::new(Barrier::new(PRODUCERS as usize));
    let handles: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let manager = manager.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for seq in 0..TASKS_PER_PRODUCER {
                    manager.broadcast_task(tagged(producer, seq).shared());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(overlaps.load(Ordering::SeqCst), 0, "listener ran concurrently");
    assert_eq!(manager.pending_len(), 0);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), PRODUCERS as usize);
    let expected: Vec<u32> = (0..TASKS_PER_PRODUCER).collect();
    for producer in 0..PRODUCERS {
        assert_eq!(seen[&producer], expected, "producer {} out of order", producer);
    }
    assert_eq!(manager.history_len(), 64);
}

#[test]
fn tasks_submitted_by_a_listener_join_the_current_episode() {
    let manager = Arc::new(ActivityManager::with_history_capacity(16));
    let delivered = Arc::new(Mutex::new(Vec::new()));

    {
        // A listener holding the manager re-submits once; the submission must
        // neither deadlock nor be lost.
        let inner = manager.clone();
        let delivered = delivered.clone();
        manager.register_task_listener(Box::new(move |task: &mut Task, _: &mut NestedTasks| {
            if let TaskKind::TempoChange { new_bpm, .. } = task.kind {
                delivered.lock().unwrap().push(new_bpm);
                task.complete();
                if new_bpm < 100.0 {
                    inner.broadcast_task(
                        Task::new(TaskKind::TempoChange {
                            old_bpm: new_bpm,
                            new_bpm: new_bpm + 100.0,
                        })
                        .shared(),
                    );
                }
            }
            false
        }));
    }

    manager.broadcast_task(
        Task::new(TaskKind::TempoChange {
            old_bpm: 120.0,
            new_bpm: 60.0,
        })
        .shared(),
    );

    assert_eq!(*delivered.lock().unwrap(), vec![60.0, 160.0]);
    assert_eq!(manager.pending_len(), 0);
    // queued submissions are ordinary broadcasts and are recorded
    assert_eq!(manager.history_len(), 2);
}
