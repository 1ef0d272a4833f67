use anyhow::Context;
use clap::Parser;
use shoebox::commands::{self, backup, history};
use shoebox::config::{Cli, Invocation};
use shoebox::logging::init_logging;
use shoebox::CancelFlag;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Convert CLI args to a validated invocation before touching the destination
    let invocation = match Invocation::try_from(cli) {
        Ok(invocation) => invocation,
        Err(e) => {
            eprintln!("{}", commands::format_error(&e));
            std::process::exit(3);
        }
    };
    init_logging(invocation.verbose());

    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            eprintln!("[shoebox] interrupted, finishing current file...");
            cancel.cancel();
        })
        .context("Failed to install Ctrl-C handler")?;
    }

    let result = match &invocation {
        Invocation::Backup(config) => backup::run(config, &cancel),
        Invocation::History(args) => history::run(args),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}", commands::format_error(&e));
            std::process::exit(3);
        }
    }
}
