//! Typed simulation configuration loaded from a YAML file, mirroring the
//! key set of the original `config.txt`.
use std::fs;
use std::path::Path;

use serde_derive::{Deserialize, Serialize};
use thiserror::Error;

use crate::scheduler::{Discipline, SchedulerParams};

/// Defects in the configuration surface. All of these are surfaced before
/// the scheduler starts; none can appear mid-run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("unknown dispatch discipline: {0}")]
    UnknownDiscipline(String),
    #[error("number of cores must be positive")]
    NonPositiveCores,
    #[error("round-robin quantum must be positive, got {0}")]
    NonPositiveQuantum(i32),
    #[error("memory sizes must be positive: max_overall_mem {max_overall_mem}, mem_per_frame {mem_per_frame}, mem_per_proc {mem_per_proc}")]
    NonPositiveMemory {
        max_overall_mem: usize,
        mem_per_frame: usize,
        mem_per_proc: usize,
    },
    #[error("instruction bounds invalid: min_ins {min_ins}, max_ins {max_ins}")]
    InvalidInstructionBounds { min_ins: i32, max_ins: i32 },
    #[error("mem_per_proc ({mem_per_proc}) exceeds max_overall_mem ({max_overall_mem})")]
    ProcessMemoryExceedsArena {
        mem_per_proc: usize,
        max_overall_mem: usize,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub num_cpu: usize,
    pub scheduler: Discipline,
    pub quantum_cycles: i32,
    pub min_ins: i32,
    pub max_ins: i32,
    pub delay_per_exec: u64,
    pub batch_process_freq: usize,
    pub max_overall_mem: usize,
    pub mem_per_frame: usize,
    pub mem_per_proc: usize,
}

impl SimulationConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: SimulationConfig = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_cpu == 0 {
            return Err(ConfigError::NonPositiveCores);
        }
        if self.scheduler == Discipline::RoundRobin && self.quantum_cycles <= 0 {
            return Err(ConfigError::NonPositiveQuantum(self.quantum_cycles));
        }
        if self.min_ins <= 0 || self.max_ins < self.min_ins {
            return Err(ConfigError::InvalidInstructionBounds {
                min_ins: self.min_ins,
                max_ins: self.max_ins,
            });
        }
        if self.max_overall_mem == 0 || self.mem_per_frame == 0 || self.mem_per_proc == 0 {
            return Err(ConfigError::NonPositiveMemory {
                max_overall_mem: self.max_overall_mem,
                mem_per_frame: self.mem_per_frame,
                mem_per_proc: self.mem_per_proc,
            });
        }
        if self.mem_per_proc > self.max_overall_mem {
            return Err(ConfigError::ProcessMemoryExceedsArena {
                mem_per_proc: self.mem_per_proc,
                max_overall_mem: self.max_overall_mem,
            });
        }
        Ok(())
    }

    pub fn scheduler_params(&self, snapshot_dir: &str) -> SchedulerParams {
        SchedulerParams {
            num_cores: self.num_cpu,
            discipline: self.scheduler,
            quantum_cycles: self.quantum_cycles,
            delay_per_exec: self.delay_per_exec,
            snapshot_dir: snapshot_dir.to_string(),
        }
    }
}
