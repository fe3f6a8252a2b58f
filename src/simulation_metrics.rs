use std::fs::File;
use std::io::{BufWriter, Error, Write};

use log::info;
use serde::Serialize;

/// Snapshot of the fleet at the end of a cycle.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CycleMetrics {
    pub cycle: u32,
    pub target_util: f64,
    pub migrations: u32,
    pub degradations: u32,
    pub hosts_on: u32,
    pub hosts_off: u32,
    pub util_mean: f64,
    pub util_p95: f64,
    pub breached: bool,
    pub energy_saved_kwh: f64,
    pub energy_consumed_kwh: f64,
}

pub trait MetricsLogger {
    fn log_metrics(&mut self, metrics: &CycleMetrics);
    fn save_log(&mut self, path: &str) -> Result<(), std::io::Error>;
}

pub struct EmptyMetricsLogger {}

impl MetricsLogger for EmptyMetricsLogger {
    fn log_metrics(&mut self, _metrics: &CycleMetrics) {}

    fn save_log(&mut self, _path: &str) -> Result<(), Error> {
        Ok(())
    }
}

/// Writes a line per cycle to the `log` facade.
#[derive(Default)]
pub struct StdoutMetricsLogger {}

impl StdoutMetricsLogger {
    pub fn new() -> Self {
        Default::default()
    }
}

impl MetricsLogger for StdoutMetricsLogger {
    fn log_metrics(&mut self, metrics: &CycleMetrics) {
        info!(
            "Cycle: {}, target: {:.3}, migrations: {}, hosts on/off: {}/{}, util mean: {:.4}, \
             util p95: {:.4}, breached: {}, saved: {:.3} kWh",
            metrics.cycle,
            metrics.target_util,
            metrics.migrations,
            metrics.hosts_on,
            metrics.hosts_off,
            metrics.util_mean,
            metrics.util_p95,
            metrics.breached,
            metrics.energy_saved_kwh
        )
    }

    fn save_log(&mut self, _path: &str) -> Result<(), Error> {
        Ok(())
    }
}

/// Keeps the history in memory and saves it as a JSON array.
#[derive(Default)]
pub struct FileMetricsLogger {
    metrics_history: Vec<CycleMetrics>,
}

impl FileMetricsLogger {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn history(&self) -> &[CycleMetrics] {
        &self.metrics_history
    }
}

impl MetricsLogger for FileMetricsLogger {
    fn log_metrics(&mut self, metrics: &CycleMetrics) {
        self.metrics_history.push(metrics.clone());
    }

    fn save_log(&mut self, path: &str) -> Result<(), Error> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, &self.metrics_history)?;
        writer.flush()
    }
}

/// Keeps the history in memory and saves it as CSV, one row per cycle.
#[derive(Default)]
pub struct CsvMetricsLogger {
    metrics_history: Vec<CycleMetrics>,
}

impl CsvMetricsLogger {
    pub fn new() -> Self {
        Default::default()
    }
}

impl MetricsLogger for CsvMetricsLogger {
    fn log_metrics(&mut self, metrics: &CycleMetrics) {
        self.metrics_history.push(metrics.clone());
    }

    fn save_log(&mut self, path: &str) -> Result<(), Error> {
        let mut wtr = csv::Writer::from_path(path)?;
        for entry in &self.metrics_history {
            wtr.serialize(entry)?;
        }
        wtr.flush()
    }
}

/// Arithmetic mean, 0 for an empty set.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// 95th percentile, 0 for an empty set. Fewer than 20 values give the maximum,
/// otherwise the 19th of 20 exclusive quantile cut points, interpolated between
/// neighbouring order statistics.
pub fn percentile_95(values: &[f64]) -> f64 {
    const PARTS: usize = 20;
    if values.is_empty() {
        return 0.0;
    }
    if values.len() < PARTS {
        return values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    }
    let mut sorted = values.to_vec();
    let position = (values.len() + 1) * (PARTS - 1);
    let j = position / PARTS;
    let delta = (position % PARTS) as f64;
    let lower = *order_stat::kth_by(&mut sorted, j - 1, |a, b| a.total_cmp(b));
    let upper = *order_stat::kth_by(&mut sorted, j, |a, b| a.total_cmp(b));
    (lower * (PARTS as f64 - delta) + upper * delta) / PARTS as f64
}
