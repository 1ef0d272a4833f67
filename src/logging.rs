//! tracing subscriber setup for the binary

use tracing_subscriber::EnvFilter;

/// Environment variable holding a full filter directive, e.g. `shoebox=trace`.
pub const LOG_ENV: &str = "SHOEBOX_LOG";

/// Install the global fmt subscriber, writing to stderr.
///
/// `SHOEBOX_LOG` wins when set; otherwise `verbose` picks debug over warn.
pub fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| default_filter(verbose));

    // A subscriber may already be installed (tests); keep it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn default_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("shoebox=debug")
    } else {
        EnvFilter::new("shoebox=warn")
    }
}
