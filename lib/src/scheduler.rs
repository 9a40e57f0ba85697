//! Multi-core dispatcher: a shared FIFO ready queue drained by one lane
//! thread per core, with memory-gated dispatch and selectable disciplines.
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};
use serde_derive::{Deserialize, Serialize};

use crate::memory::FlatMemoryAllocator;
use crate::output_log::write_memory_snapshot;
use crate::process::SharedProcess;
use crate::sim_config::ConfigError;
use crate::util::current_timestamp;

/// One `delay_per_exec` unit of per-instruction pacing.
const EXEC_DELAY_UNIT: Duration = Duration::from_millis(100);
/// Pause used when the configured delay is zero, so a slice still yields
/// the CPU between instructions.
const MIN_EXEC_PAUSE: Duration = Duration::from_millis(1);

/// Dispatch discipline, fixed for the lifetime of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Discipline {
    #[serde(rename = "fcfs")]
    Fcfs,
    #[serde(rename = "rr")]
    RoundRobin,
}

impl FromStr for Discipline {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fcfs" => Ok(Discipline::Fcfs),
            "rr" => Ok(Discipline::RoundRobin),
            other => Err(ConfigError::UnknownDiscipline(other.to_string())),
        }
    }
}

impl fmt::Display for Discipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discipline::Fcfs => write!(f, "fcfs"),
            Discipline::RoundRobin => write!(f, "rr"),
        }
    }
}

/// Everything the scheduler needs from the configuration surface.
#[derive(Clone, Debug)]
pub struct SchedulerParams {
    pub num_cores: usize,
    pub discipline: Discipline,
    pub quantum_cycles: i32,
    pub delay_per_exec: u64,
    pub snapshot_dir: String,
}

/// Instruction budget of one execution slice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SliceBudget {
    ToCompletion,
    Quantum(i32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SliceOutcome {
    Finished,
    Preempted,
}

struct DispatchState {
    queue: VecDeque<SharedProcess>,
    running: bool,
    cores_used: usize,
    cores_available: usize,
}

struct LaneShared {
    state: Mutex<DispatchState>,
    work_available: Condvar,
    allocator: Arc<FlatMemoryAllocator>,
    discipline: Discipline,
    quantum_cycles: i32,
    pacing: Duration,
    snapshot_dir: String,
    quantum_counter: AtomicUsize,
}

pub struct Scheduler {
    shared: Arc<LaneShared>,
    num_cores: usize,
    lanes: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    /// Configuration defects are rejected here, before any lane exists.
    pub fn new(
        params: SchedulerParams,
        allocator: Arc<FlatMemoryAllocator>,
    ) -> Result<Self, ConfigError> {
        if params.num_cores == 0 {
            return Err(ConfigError::NonPositiveCores);
        }
        if params.discipline == Discipline::RoundRobin && params.quantum_cycles <= 0 {
            return Err(ConfigError::NonPositiveQuantum(params.quantum_cycles));
        }
        let pacing = if params.delay_per_exec == 0 {
            MIN_EXEC_PAUSE
        } else {
            EXEC_DELAY_UNIT * params.delay_per_exec as u32
        };
        Ok(Self {
            shared: Arc::new(LaneShared {
                state: Mutex::new(DispatchState {
                    queue: VecDeque::new(),
                    running: false,
                    cores_used: 0,
                    cores_available: params.num_cores,
                }),
                work_available: Condvar::new(),
                allocator,
                discipline: params.discipline,
                quantum_cycles: params.quantum_cycles,
                pacing,
                snapshot_dir: params.snapshot_dir,
                quantum_counter: AtomicUsize::new(0),
            }),
            num_cores: params.num_cores,
            lanes: Mutex::new(Vec::new()),
        })
    }

    /// Launch one lane per core. Lanes block on the ready queue until work
    /// arrives or `stop` is called.
    pub fn start(&self) {
        let mut lanes = self.lanes.lock().unwrap();
        if !lanes.is_empty() {
            warn!("scheduler already started");
            return;
        }
        self.shared.state.lock().unwrap().running = true;
        for lane_id in 0..self.num_cores {
            let shared = Arc::clone(&self.shared);
            lanes.push(thread::spawn(move || lane_loop(shared, lane_id)));
        }
        info!(
            "scheduler started: {} cores, {} discipline",
            self.num_cores, self.shared.discipline
        );
    }

    /// Append to the tail of the ready queue and wake one idle lane.
    pub fn enqueue(&self, process: SharedProcess) {
        {
            let mut state = self.shared.state.lock().unwrap();
            state.queue.push_back(process);
        }
        self.shared.work_available.notify_one();
    }

    /// Flag the scheduler as stopping, wake every blocked lane and join
    /// them. Idempotent; an in-flight slice runs to its own end first.
    pub fn stop(&self) {
        {
            let mut state = self.shared.state.lock().unwrap();
            state.running = false;
        }
        self.shared.work_available.notify_all();
        for lane in self.lanes.lock().unwrap().drain(..) {
            let _ = lane.join();
        }
        info!("scheduler stopped");
    }

    pub fn cores_used(&self) -> usize {
        self.shared.state.lock().unwrap().cores_used
    }

    pub fn cores_available(&self) -> usize {
        self.shared.state.lock().unwrap().cores_available
    }

    pub fn queue_len(&self) -> usize {
        self.shared.state.lock().unwrap().queue.len()
    }
}

fn lane_loop(shared: Arc<LaneShared>, lane_id: usize) {
    debug!("lane {} up", lane_id);
    loop {
        let process = {
            let mut state = shared.state.lock().unwrap();
            while state.queue.is_empty() && state.running {
                state = shared.work_available.wait(state).unwrap();
            }
            if !state.running {
                break;
            }
            let process = state.queue.pop_front().expect("woken with work queued");
            state.cores_used += 1;
            state.cores_available -= 1;
            process
        };

        let (name, memory_required) = {
            let process = process.lock().unwrap();
            (process.name().clone(), process.memory_required())
        };

        let offset = match shared.allocator.allocate(memory_required, &name) {
            Some(offset) => offset,
            None => {
                // No run fits right now. Put the process back unchanged and
                // let the arena drain; yield so other lanes keep moving.
                release_core(&shared);
                requeue(&shared, process);
                thread::yield_now();
                continue;
            }
        };

        let core_id = process.lock().unwrap().pin_core(lane_id);
        debug!("lane {}: dispatching {} on core {}", lane_id, name, core_id);

        let outcome = match shared.discipline {
            Discipline::Fcfs => execute_slice(&process, SliceBudget::ToCompletion, shared.pacing),
            Discipline::RoundRobin => {
                let outcome = execute_slice(
                    &process,
                    SliceBudget::Quantum(shared.quantum_cycles),
                    shared.pacing,
                );
                shared.write_quantum_snapshot();
                outcome
            }
        };

        if let Err(defect) = shared.allocator.deallocate(offset) {
            warn!("lane {}: deallocation contract violated: {}", lane_id, defect);
        }

        match outcome {
            SliceOutcome::Finished => {
                process.lock().unwrap().mark_finished(current_timestamp());
                debug!("lane {}: {} finished", lane_id, name);
            }
            SliceOutcome::Preempted => requeue(&shared, process),
        }
        release_core(&shared);
    }
    debug!("lane {} down", lane_id);
}

fn requeue(shared: &LaneShared, process: SharedProcess) {
    {
        let mut state = shared.state.lock().unwrap();
        state.queue.push_back(process);
    }
    shared.work_available.notify_one();
}

fn release_core(shared: &LaneShared) {
    let mut state = shared.state.lock().unwrap();
    state.cores_used -= 1;
    state.cores_available += 1;
}

/// Advance a process one instruction at a time until the budget runs out
/// or it finishes. The pacing sleep holds no lock; the process lock is
/// taken per instruction so status reads stay fresh.
pub fn execute_slice(
    process: &SharedProcess,
    budget: SliceBudget,
    pacing: Duration,
) -> SliceOutcome {
    let mut executed = 0;
    loop {
        {
            let process = process.lock().unwrap();
            if process.is_finished() {
                return SliceOutcome::Finished;
            }
            if let SliceBudget::Quantum(quantum) = budget {
                if executed >= quantum {
                    return SliceOutcome::Preempted;
                }
            }
        }
        thread::sleep(pacing);
        process.lock().unwrap().advance();
        executed += 1;
    }
}

impl LaneShared {
    /// One memory stamp per round-robin slice, named by the accumulated
    /// quantum cycle count, written before the slice's memory is returned.
    fn write_quantum_snapshot(&self) {
        let quantum = self.quantum_cycles as usize;
        let cycle = self.quantum_counter.fetch_add(quantum, Ordering::SeqCst) + quantum;
        let contents = self.allocator.snapshot(&current_timestamp());
        if let Err(err) = write_memory_snapshot(&self.snapshot_dir, cycle, &contents) {
            warn!("failed to write memory stamp {}: {}", cycle, err);
        }
    }
}
