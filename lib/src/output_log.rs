//! Diagnostic artifacts: memory stamps, the CPU utilization report and
//! YAML dumps of the process table.
use std::fmt::Write as FmtWrite;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::process::ProcessView;
use crate::registry::ProcessRegistry;
use crate::scheduler::Scheduler;

fn ensure_output_dir(folder_path: &str) {
    if fs::metadata(folder_path).is_err() {
        let _ = fs::create_dir_all(folder_path);
        info!("Created folder: {}", folder_path);
    }
}

pub fn create_yaml_file(folder_path: &str, file_name: &str) -> String {
    ensure_output_dir(folder_path);
    let file_path = format!("{}/{}.yaml", folder_path, file_name);
    if let Err(err) = fs::File::create(&file_path) {
        warn!("Failed to create file: {}", err);
    }
    file_path
}

pub fn append_info_to_yaml(file_path: &str, info: &str) {
    if let Ok(mut file) = OpenOptions::new().append(true).create(true).open(file_path) {
        if let Err(err) = file.write_all(info.as_bytes()) {
            warn!("Failed to write to file: {}", err);
        }
    } else {
        warn!("Failed to open file: {}", file_path);
    }
}

/// Persist one memory stamp, uniquely named by the accumulated quantum
/// cycle count at the time of the slice.
pub fn write_memory_snapshot(
    folder_path: &str,
    quantum_cycle: usize,
    contents: &str,
) -> std::io::Result<PathBuf> {
    ensure_output_dir(folder_path);
    let file_path = Path::new(folder_path).join(format!("memory_stamp_{}.txt", quantum_cycle));
    fs::write(&file_path, contents)?;
    Ok(file_path)
}

/// CPU utilization plus running/finished listings, in the layout of the
/// original report file.
pub fn build_utilization_report(scheduler: &Scheduler, registry: &ProcessRegistry) -> String {
    let cores_used = scheduler.cores_used();
    let cores_available = scheduler.cores_available();
    let total_cores = cores_used + cores_available;
    let cpu_utilization = if total_cores == 0 {
        0.0
    } else {
        cores_used as f32 / total_cores as f32 * 100.0
    };

    let views = registry.views();
    let mut report = String::new();
    let _ = writeln!(report, "CPU utilization: {:.2}%", cpu_utilization);
    let _ = writeln!(report, "Cores used: {}", cores_used);
    let _ = writeln!(report, "Cores available: {}", cores_available);
    let _ = writeln!(report, "-----------------------------------");
    let _ = writeln!(report, "Running processes:");
    for view in views.iter().filter(|view| !view.is_finished) {
        let core = view
            .assigned_core
            .map(|core| core.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let _ = writeln!(
            report,
            "Name: {} | {} | Core: {} | {}/{} |",
            view.name, view.created_at, core, view.current_instruction, view.total_instructions
        );
    }
    let _ = writeln!(report);
    let _ = writeln!(report, "Finished processes:");
    for view in views.iter().filter(|view| view.is_finished) {
        let finished_at = view.finished_at.as_deref().unwrap_or("N/A");
        let _ = writeln!(
            report,
            "Name: {} | {} | Finished | {}/{} |",
            view.name, finished_at, view.current_instruction, view.total_instructions
        );
    }
    let _ = writeln!(report, "-----------------------------------");
    report
}

pub fn write_utilization_report(
    folder_path: &str,
    file_name: &str,
    scheduler: &Scheduler,
    registry: &ProcessRegistry,
) -> std::io::Result<PathBuf> {
    ensure_output_dir(folder_path);
    let file_path = Path::new(folder_path).join(file_name);
    fs::write(&file_path, build_utilization_report(scheduler, registry))?;
    info!("Report generated at {}", file_path.display());
    Ok(file_path)
}

pub fn dump_process_views_to_yaml(file_path: &str, views: &[ProcessView]) {
    let yaml = serde_yaml::to_string(views).expect("Failed to serialize process views to YAML");
    append_info_to_yaml(file_path, &yaml);
}
