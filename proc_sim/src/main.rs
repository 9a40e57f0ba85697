use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::Parser;
use lib::memory::FlatMemoryAllocator;
use lib::output_log::{create_yaml_file, dump_process_views_to_yaml, write_utilization_report};
use lib::process::ProcessFactory;
use lib::process_generator::{GeneratorParams, ProcessGenerator};
use lib::registry::ProcessRegistry;
use lib::scheduler::Scheduler;
use lib::sim_config::SimulationConfig;
use log::{error, info};

/// Application description and arguments definition using clap crate
#[derive(Parser)]
#[clap(
    name = "proc_sim",
    version = "v1.0.0",
    about = "Multi-core process scheduling and flat memory simulation."
)]

/// Application arguments definition using clap crate
struct AppArg {
    #[clap(short = 'c', long = "config_file_path", default_value = "config.yaml")]
    config_file_path: String,
    #[clap(short = 'o', long = "output_dir_path", default_value = "outputs")]
    output_dir_path: String,
    #[clap(short = 't', long = "run_duration_secs", default_value = "10")]
    run_duration_secs: u64,
}

/// Application main function
fn main() {
    env_logger::init();
    let arg: AppArg = AppArg::parse();

    let config = match SimulationConfig::load(&arg.config_file_path) {
        Ok(config) => config,
        Err(err) => {
            error!("configuration defect: {}", err);
            std::process::exit(1);
        }
    };
    info!(
        "loaded configuration: {} cores, {} discipline, {} bytes of memory",
        config.num_cpu, config.scheduler, config.max_overall_mem
    );

    let allocator = Arc::new(FlatMemoryAllocator::new(config.max_overall_mem));
    let registry = Arc::new(ProcessRegistry::new());
    let factory = Arc::new(ProcessFactory::new(config.min_ins, config.max_ins));
    let scheduler = match Scheduler::new(
        config.scheduler_params(&arg.output_dir_path),
        Arc::clone(&allocator),
    ) {
        Ok(scheduler) => Arc::new(scheduler),
        Err(err) => {
            error!("configuration defect: {}", err);
            std::process::exit(1);
        }
    };

    scheduler.start();
    let generator = ProcessGenerator::new(
        Arc::clone(&scheduler),
        Arc::clone(&registry),
        factory,
        GeneratorParams {
            batch_process_freq: config.batch_process_freq,
            mem_per_proc: config.mem_per_proc,
            period: Duration::from_secs(1),
        },
    );
    generator.start();

    thread::sleep(Duration::from_secs(arg.run_duration_secs));
    generator.stop();

    // Report while lanes are still live so utilization is meaningful.
    match write_utilization_report(&arg.output_dir_path, "utilization-report.txt", &scheduler, &registry) {
        Ok(path) => info!("utilization report written to {}", path.display()),
        Err(err) => error!("failed to write utilization report: {}", err),
    }

    scheduler.stop();

    let now: DateTime<Utc> = Utc::now();
    let date = now.format("%Y-%m-%d-%H-%M-%S").to_string();
    let file_name = format!("{}-processes", date);
    let file_path = create_yaml_file(&arg.output_dir_path, &file_name);
    dump_process_views_to_yaml(&file_path, &registry.views());
    info!("process dump written to {}", file_path);
}
