//! Terminal output

pub mod format;
pub mod progress;

pub use format::{format_elapsed, human_size};
pub use progress::ProgressReporter;
