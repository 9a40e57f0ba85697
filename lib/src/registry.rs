//! Name-keyed bookkeeping of every process ever created, consumed only by
//! the reporting side through `ProcessView` snapshots.
use std::sync::Mutex;

use crate::process::{ProcessView, SharedProcess};

/// Insertion-ordered so listings come out in creation order.
#[derive(Default)]
pub struct ProcessRegistry {
    entries: Mutex<Vec<(String, SharedProcess)>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a process under its own name. Re-registering a name
    /// replaces the previous entry in place.
    pub fn register(&self, process: SharedProcess) {
        let name = process.lock().unwrap().name().clone();
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.iter_mut().find(|(existing, _)| *existing == name) {
            entry.1 = process;
        } else {
            entries.push((name, process));
        }
    }

    /// Unknown names are an ordinary user-level miss, not an error.
    pub fn get(&self, name: &str) -> Option<SharedProcess> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, process)| process.clone())
    }

    pub fn views(&self) -> Vec<ProcessView> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|(_, process)| process.lock().unwrap().view())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}
