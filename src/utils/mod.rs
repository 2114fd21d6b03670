//! Utility functions and helpers

mod logger;

pub use logger::{filter_directive, init_logger, LogLevel};
