#![allow(dead_code)]
//! Test listeners for kholors-core integration tests.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use kholors_core::activity::{NestedTasks, TaskListener};
use kholors_types::{FilterParams, SampleId, SampleSnapshot, Task, TaskKind};

/// In-memory stand-in for the mixer's sample list.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SampleStore {
    pub samples: BTreeMap<SampleId, SampleSnapshot>,
    next_id: u32,
}

impl SampleStore {
    fn allocate(&mut self) -> SampleId {
        self.next_id += 1;
        SampleId::new(self.next_id)
    }

    pub fn count(&self) -> usize {
        self.samples.len()
    }

    pub fn position(&self, id: SampleId) -> Option<f32> {
        self.samples.get(&id).map(|s| s.position_beats)
    }
}

pub type SharedStore = Arc<Mutex<SampleStore>>;

pub fn new_store() -> SharedStore {
    Arc::new(Mutex::new(SampleStore::default()))
}

/// Claims every sample task and applies it to the store.
pub fn store_listener(store: SharedStore) -> Box<dyn TaskListener> {
    Box::new(move |task: &mut Task, _: &mut NestedTasks| {
        let mut store = store.lock().unwrap();
        let outcome = match &mut task.kind {
            TaskKind::SampleCreate {
                file_path,
                position_beats,
                sample_id,
                ..
            } => {
                let id = match *sample_id {
                    Some(id) => id,
                    None => store.allocate(),
                };
                store.samples.insert(
                    id,
                    SampleSnapshot {
                        id,
                        file_path: file_path.clone(),
                        position_beats: *position_beats,
                        filter: FilterParams::default(),
                        gain_db: 0.0,
                    },
                );
                *sample_id = Some(id);
                Some(true)
            }
            TaskKind::SampleDeletion { sample_id, deleted } => {
                match store.samples.remove(&*sample_id) {
                    Some(snapshot) => {
                        *deleted = Some(snapshot);
                        Some(true)
                    }
                    None => Some(false),
                }
            }
            TaskKind::SampleRestore { snapshot } => {
                store.samples.insert(snapshot.id, snapshot.clone());
                Some(true)
            }
            TaskKind::SampleMove {
                sample_id,
                to_beats,
                ..
            } => match store.samples.get_mut(&*sample_id) {
                Some(sample) => {
                    sample.position_beats = *to_beats;
                    Some(true)
                }
                None => Some(false),
            },
            _ => None,
        };
        match outcome {
            Some(true) => task.complete(),
            Some(false) => task.fail(),
            None => {}
        }
        false
    })
}

pub fn create(path: &str, position_beats: f32) -> Task {
    Task::new(TaskKind::SampleCreate {
        file_path: PathBuf::from(path),
        position_beats,
        sample_id: None,
        duplicate_of: None,
    })
}

pub fn delete(id: SampleId) -> Task {
    Task::new(TaskKind::SampleDeletion {
        sample_id: id,
        deleted: None,
    })
}

pub fn move_sample(id: SampleId, from_beats: f32, to_beats: f32) -> Task {
    Task::new(TaskKind::SampleMove {
        sample_id: id,
        from_beats,
        to_beats,
    })
}
