//! This module contains the definition of the simulated process and its
//! creation contract.
use std::sync::{Arc, Mutex};

use getset::{CopyGetters, Getters};
use rand::Rng;
use serde_derive::{Deserialize, Serialize};

use crate::util::current_timestamp;

/// Handle shared between the ready queue, the lane running the process and
/// the display side. A process sits in at most one queue or one lane at any
/// instant; the lock makes the single-writer rule mechanical.
pub type SharedProcess = Arc<Mutex<Process>>;

/// The unit of schedulable work: a named program counted in abstract
/// instructions, with a fixed memory requirement.
#[derive(Clone, Debug, Getters, CopyGetters)]
pub struct Process {
    #[getset(get = "pub")]
    name: String,
    #[getset(get_copy = "pub")]
    current_instruction: i32,
    #[getset(get_copy = "pub")]
    total_instructions: i32,
    #[getset(get_copy = "pub")]
    memory_required: usize,
    #[getset(get_copy = "pub")]
    assigned_core: Option<usize>,
    #[getset(get = "pub")]
    created_at: String,
    finished_at: Option<String>,
}

impl Process {
    pub fn new(
        name: &str,
        total_instructions: i32,
        memory_required: usize,
        created_at: String,
    ) -> Self {
        Self {
            name: name.to_string(),
            current_instruction: 0,
            total_instructions,
            memory_required,
            assigned_core: None,
            created_at,
            finished_at: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.current_instruction >= self.total_instructions
    }

    /// Advance one instruction. Finished processes stay put.
    pub fn advance(&mut self) {
        if !self.is_finished() {
            self.current_instruction += 1;
        }
    }

    /// Associate the process with a core on its first dispatch; later calls
    /// keep the original id. Returns the effective core id.
    pub fn pin_core(&mut self, core_id: usize) -> usize {
        *self.assigned_core.get_or_insert(core_id)
    }

    pub fn finished_at(&self) -> Option<&str> {
        self.finished_at.as_deref()
    }

    /// Record the completion timestamp. Only the first call takes effect.
    pub fn mark_finished(&mut self, timestamp: String) {
        if self.finished_at.is_none() {
            self.finished_at = Some(timestamp);
        }
    }

    pub fn view(&self) -> ProcessView {
        ProcessView {
            name: self.name.clone(),
            current_instruction: self.current_instruction,
            total_instructions: self.total_instructions,
            memory_required: self.memory_required,
            assigned_core: self.assigned_core,
            is_finished: self.is_finished(),
            created_at: self.created_at.clone(),
            finished_at: self.finished_at.clone(),
        }
    }
}

/// Read-only snapshot consumed by the display and reporting side, so that
/// nothing outside the scheduler ever touches a live `Process`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessView {
    pub name: String,
    pub current_instruction: i32,
    pub total_instructions: i32,
    pub memory_required: usize,
    pub assigned_core: Option<usize>,
    pub is_finished: bool,
    pub created_at: String,
    pub finished_at: Option<String>,
}

/// Creation contract for processes: draws `total_instructions` uniformly
/// from the configured bounds and stamps the creation time.
#[derive(Clone, Debug, CopyGetters)]
pub struct ProcessFactory {
    #[getset(get_copy = "pub")]
    min_ins: i32,
    #[getset(get_copy = "pub")]
    max_ins: i32,
}

impl ProcessFactory {
    /// Bounds are validated by `SimulationConfig::validate` before a factory
    /// is built.
    pub fn new(min_ins: i32, max_ins: i32) -> Self {
        Self { min_ins, max_ins }
    }

    pub fn create(&self, name: &str, memory_required: usize) -> SharedProcess {
        let total_instructions = rand::thread_rng().gen_range(self.min_ins..=self.max_ins);
        Arc::new(Mutex::new(Process::new(
            name,
            total_instructions,
            memory_required,
            current_timestamp(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_process(total_instructions: i32) -> Process {
        Process::new("P1", total_instructions, 256, "01/01/2026, 12:00:00 AM".to_string())
    }

    #[test]
    fn test_process_default_state() {
        let process = create_process(10);
        assert_eq!(process.name(), "P1");
        assert_eq!(process.current_instruction(), 0);
        assert_eq!(process.total_instructions(), 10);
        assert_eq!(process.memory_required(), 256);
        assert_eq!(process.assigned_core(), None);
        assert!(!process.is_finished());
        assert_eq!(process.finished_at(), None);
    }

    #[test]
    fn test_process_advance_until_finished() {
        let mut process = create_process(3);
        process.advance();
        process.advance();
        assert!(!process.is_finished());
        process.advance();
        assert!(process.is_finished());
        assert_eq!(process.current_instruction(), 3);
    }

    #[test]
    fn test_process_advance_saturates_when_finished() {
        let mut process = create_process(1);
        process.advance();
        process.advance();
        assert_eq!(process.current_instruction(), 1);
    }

    #[test]
    fn test_process_pin_core_only_once() {
        let mut process = create_process(5);
        assert_eq!(process.pin_core(2), 2);
        assert_eq!(process.pin_core(0), 2);
        assert_eq!(process.assigned_core(), Some(2));
    }

    #[test]
    fn test_process_mark_finished_keeps_first_timestamp() {
        let mut process = create_process(1);
        process.advance();
        process.mark_finished("first".to_string());
        process.mark_finished("second".to_string());
        assert_eq!(process.finished_at(), Some("first"));
    }

    #[test]
    fn test_process_view_reflects_state() {
        let mut process = create_process(2);
        process.advance();
        process.pin_core(1);
        let view = process.view();
        assert_eq!(view.name, "P1");
        assert_eq!(view.current_instruction, 1);
        assert_eq!(view.total_instructions, 2);
        assert_eq!(view.assigned_core, Some(1));
        assert!(!view.is_finished);
    }

    #[test]
    fn test_factory_draws_within_bounds() {
        let factory = ProcessFactory::new(5, 8);
        for i in 0..50 {
            let process = factory.create(&format!("P{}", i), 64);
            let process = process.lock().unwrap();
            assert!(process.total_instructions() >= 5);
            assert!(process.total_instructions() <= 8);
            assert_eq!(process.current_instruction(), 0);
        }
    }

    #[test]
    fn test_factory_degenerate_bounds() {
        let factory = ProcessFactory::new(4, 4);
        let process = factory.create("P1", 64);
        assert_eq!(process.lock().unwrap().total_instructions(), 4);
    }
}
