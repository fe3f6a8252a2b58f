use std::fs;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;

use vm_consolidation_simulator::simulation::ConsolidationSimulation;
use vm_consolidation_simulator::simulation_config::SimulationConfig;
use vm_consolidation_simulator::simulation_metrics::{
    CsvMetricsLogger, FileMetricsLogger, MetricsLogger, StdoutMetricsLogger,
};
use vm_consolidation_simulator::workload::{SyntheticWorkload, TraceWorkload, WorkloadSource};

fn init_logger() {
    use env_logger::Builder;
    use std::io::Write;
    Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();
}

#[derive(Parser, Debug)]
#[command(name = "consolidation-sim")]
#[command(about = "Simulate energy-aware VM consolidation", long_about = None)]
struct Args {
    /// YAML config file, defaults are used for absent fields
    #[arg(short, long)]
    config: Option<String>,

    /// Seed of the workload random stream
    #[arg(long)]
    seed: Option<u64>,

    /// Number of cycles
    #[arg(long)]
    cycles: Option<u32>,

    /// Number of hosts
    #[arg(long)]
    hosts: Option<u32>,

    /// Number of VMs
    #[arg(long)]
    vms: Option<u32>,

    /// CSV trace with cycle,vm_id,usage rows to replay instead of the synthetic workload
    #[arg(long)]
    trace: Option<String>,

    /// Output JSON file for the result
    #[arg(short, long)]
    output: Option<String>,

    /// Output file for per-cycle metrics, CSV unless it ends with .json
    #[arg(short, long)]
    metrics: Option<String>,
}

fn main() -> anyhow::Result<()> {
    init_logger();
    let args = Args::parse();
    let simulation_start = Instant::now();

    let mut sim_config = match &args.config {
        Some(path) => SimulationConfig::from_file(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(seed) = args.seed {
        sim_config.seed = seed;
    }
    if let Some(cycles) = args.cycles {
        sim_config.cycles = cycles;
    }
    if let Some(hosts) = args.hosts {
        sim_config.n_hosts = hosts;
    }
    if let Some(vms) = args.vms {
        sim_config.n_vms = vms;
    }
    sim_config.validate()?;

    let workload: Box<dyn WorkloadSource> = match &args.trace {
        Some(path) => Box::new(TraceWorkload::from_file(path, sim_config.n_vms)?),
        None => Box::new(SyntheticWorkload::from_config(&sim_config)),
    };
    let metrics_logger: Box<dyn MetricsLogger> = match &args.metrics {
        Some(path) if path.ends_with(".json") => Box::new(FileMetricsLogger::new()),
        Some(_) => Box::new(CsvMetricsLogger::new()),
        None => Box::new(StdoutMetricsLogger::new()),
    };

    let mut sim = ConsolidationSimulation::new(sim_config, workload, metrics_logger)?;
    let result = sim.run();
    println!("{}", serde_json::to_string_pretty(&result)?);

    if let Some(path) = &args.metrics {
        sim.finish_simulation(path)
            .with_context(|| format!("can't write metrics to {}", path))?;
    }
    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&result)?;
        fs::write(path, json).with_context(|| format!("can't write result to {}", path))?;
    }

    eprintln!("Simulation process time {:.2?}", simulation_start.elapsed());
    Ok(())
}
