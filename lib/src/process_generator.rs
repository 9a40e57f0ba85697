//! Background producer that feeds the scheduler with batches of generated
//! processes at a fixed cadence.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{info, warn};

use crate::process::ProcessFactory;
use crate::registry::ProcessRegistry;
use crate::scheduler::Scheduler;

#[derive(Clone, Debug)]
pub struct GeneratorParams {
    /// Processes created per generation cycle.
    pub batch_process_freq: usize,
    /// Memory requirement given to every generated process.
    pub mem_per_proc: usize,
    /// Pause between generation cycles.
    pub period: Duration,
}

pub struct ProcessGenerator {
    scheduler: Arc<Scheduler>,
    registry: Arc<ProcessRegistry>,
    factory: Arc<ProcessFactory>,
    params: GeneratorParams,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ProcessGenerator {
    pub fn new(
        scheduler: Arc<Scheduler>,
        registry: Arc<ProcessRegistry>,
        factory: Arc<ProcessFactory>,
        params: GeneratorParams,
    ) -> Self {
        Self {
            scheduler,
            registry,
            factory,
            params,
            running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    /// Launch the generation thread. Names are `P<n>` with a monotonically
    /// increasing counter, one batch per period.
    pub fn start(&self) {
        let mut worker = self.worker.lock().unwrap();
        if worker.is_some() {
            warn!("process generator already running");
            return;
        }
        self.running.store(true, Ordering::SeqCst);

        let scheduler = Arc::clone(&self.scheduler);
        let registry = Arc::clone(&self.registry);
        let factory = Arc::clone(&self.factory);
        let running = Arc::clone(&self.running);
        let params = self.params.clone();

        *worker = Some(thread::spawn(move || {
            let mut counter = 0usize;
            while running.load(Ordering::SeqCst) {
                for _ in 0..params.batch_process_freq {
                    counter += 1;
                    let name = format!("P{}", counter);
                    let process = factory.create(&name, params.mem_per_proc);
                    registry.register(process.clone());
                    scheduler.enqueue(process);
                }
                thread::sleep(params.period);
            }
            info!("process generator stopped after {} processes", counter);
        }));
    }

    /// Stop generating and wait for the thread to wind down. Idempotent.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.lock().unwrap().take() {
            let _ = worker.join();
        }
    }
}
