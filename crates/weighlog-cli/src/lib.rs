//! weighlog CLI library
//!
//! Command-line front end for the weight store: scan for scales, stream
//! readings and produce food log entries.

pub mod cli;
pub mod commands;
pub mod config;
pub mod entry;
pub mod error;

pub use cli::{Cli, Commands};
pub use config::AppConfig;
pub use entry::FoodLogEntry;
pub use error::{CliError, Result};
