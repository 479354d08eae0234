//! Statistics command.

use std::path::Path;

use anyhow::{Context, Result};
use t2i_eval::eval::ResultsTable;
use t2i_eval::stats::Summary;

pub fn run(input: &Path) -> Result<()> {
    let table = ResultsTable::read_json(input)
        .with_context(|| format!("Failed to read results from {}", input.display()))?;

    println!("Total rows: {}", table.len());
    println!();

    let Some(summary) = Summary::compute(&table.clip_scores()) else {
        println!("No scored rows");
        return Ok(());
    };

    println!("CLIP score:");
    println!("{:-<40}", "");
    println!("  Mean:   {:.4}", summary.mean);
    println!("  Median: {:.4}", summary.median);
    println!("  StdDev: {:.4}", summary.std_dev);
    println!("  Min:    {:.4}", summary.min);
    println!("  Max:    {:.4}", summary.max);
    println!("  P5/P95: {:.4} / {:.4}", summary.p5, summary.p95);

    Ok(())
}
