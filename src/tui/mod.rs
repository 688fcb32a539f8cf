//! Terminal output for validation runs

mod progress;

pub use progress::{format_duration, ProgressMode, ProgressRenderer};
