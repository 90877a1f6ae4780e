//! Grouped statistics over stored match rows

pub mod aggregate;
pub mod format;

pub use aggregate::{aggregate, Filter, GroupStats};
pub use format::{format_group, format_table};
