//! Utility functions for string formatting.

pub mod format;

pub use format::{format_duration, token_preview, truncate_string};
