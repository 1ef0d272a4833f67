//! History command: list recorded runs

use crate::config::HistoryArgs;
use crate::ledger::{self, Ledger};
use crate::types::{BackupError, RunRecord};

/// Print the most recent runs for a destination. Never takes the run lock.
pub fn run(args: &HistoryArgs) -> Result<i32, BackupError> {
    if !ledger::db_path(&args.dest).is_file() {
        return Err(BackupError::Config(format!(
            "No backup ledger found in {}",
            args.dest.display()
        )));
    }

    let ledger = Ledger::open_read_only(&args.dest)?;
    let runs = ledger.recent_runs(args.limit)?;

    if args.json {
        let text = serde_json::to_string_pretty(&runs)
            .map_err(|e| BackupError::Validation(format!("Cannot encode runs: {}", e)))?;
        println!("{}", text);
    } else {
        println!("{}", format_runs(&runs, ledger.count_synced()?));
    }
    Ok(0)
}

fn format_runs(runs: &[RunRecord], synced: u64) -> String {
    let mut lines = vec![format!("{} files in ledger", synced)];
    if runs.is_empty() {
        lines.push("(no runs recorded)".to_string());
        return lines.join("\n");
    }
    for run in runs {
        lines.push(format!(
            "{}  {:<12}  +{} ({})  total {}  {}",
            run.start.format("%Y-%m-%d %H:%M"),
            outcome_label(run.outcome),
            run.new_sync,
            run.dest_size_increment,
            run.dest_size,
            run.elapsed_time
        ));
    }
    lines.join("\n")
}

fn outcome_label(code: i32) -> &'static str {
    match code {
        0 => "completed",
        1 => "stopped",
        2 => "disconnected",
        _ => "failed",
    }
}
