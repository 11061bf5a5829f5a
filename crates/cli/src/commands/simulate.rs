//! Synthetic metric generation

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use triage_lib::ingest::{write_records, MetricsSimulator, SimulationConfig};

use crate::output::print_success;

/// Write a simulated metric series to a CSV file
pub fn run_simulate(output: &Path, config: SimulationConfig) -> Result<()> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let records = MetricsSimulator::new(config)?.generate();
    let file = File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    write_records(BufWriter::new(file), &records)?;

    print_success(&format!(
        "Wrote {} records to {}",
        records.len(),
        output.display()
    ));
    Ok(())
}
