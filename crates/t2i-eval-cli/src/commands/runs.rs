//! Tracked run listing.

use std::path::Path;

use anyhow::{Context, Result};
use t2i_eval::tracking::{list_runs, read_history};

pub fn run(root: &Path, project: &str, verbose: bool) -> Result<()> {
    let runs = list_runs(root, project)
        .with_context(|| format!("Failed to list runs in {}", root.display()))?;

    if runs.is_empty() {
        println!("No runs for project {project}");
        return Ok(());
    }

    println!("{:<32} {:<26} {:>8}", "Run", "Started", "Logs");
    println!("{:-<68}", "");
    for info in &runs {
        let history = read_history(&info.dir)
            .with_context(|| format!("Failed to read history of {}", info.id))?;
        println!(
            "{:<32} {:<26} {:>8}",
            info.id,
            info.started_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            history.len()
        );

        if verbose {
            for entry in &history {
                println!(
                    "    step {} {} ({} rows) -> {}",
                    entry.step, entry.key, entry.rows, entry.file
                );
            }
        }
    }

    Ok(())
}
