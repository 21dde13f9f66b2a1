//! Progress extraction from engine output
//!
//! The external engines report progress in heterogeneous textual forms:
//! - The transcoder emits `key=value` progress records and percent markers
//! - The recognizer emits bracketed `[start --> end]` timestamp ranges
//!
//! This module normalizes both into a monotonic `(elapsed, total, percent)`
//! view. Everything here is pure and synchronous except `for_each_line`,
//! which drives the line assembly over an async reader.

mod lines;
mod parser;
mod tracker;

pub use lines::{for_each_line, split_lines, LineBuffer};
pub use parser::{format_clock, parse_clock, parse_percent, parse_timestamp_range};
pub use tracker::ProgressTracker;
