//! Source tree traversal

mod exclude;
mod walker;

pub use exclude::ExcludeMatcher;
pub use walker::{DirBatch, Walk};
