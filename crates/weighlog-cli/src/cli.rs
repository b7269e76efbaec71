//! Command-line interface definitions and parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List nearby scales
    Scan {
        /// Seconds to scan before printing the list
        #[arg(short, long, default_value_t = 5)]
        duration: u64,
    },
    /// Connect to a scale and print its weight as it changes
    Weigh {
        /// Identifier printed by `scan`
        device_id: String,
        /// Stop after this many readings; runs until Ctrl+C when omitted
        #[arg(short, long)]
        samples: Option<usize>,
    },
    /// Weigh once and print a food log entry as JSON
    Log {
        /// Identifier printed by `scan`
        device_id: String,
        /// Name of the food on the scale
        #[arg(short, long)]
        food: String,
        /// Seconds the reading must stay unchanged before it is taken
        #[arg(short, long, default_value_t = 2)]
        settle: u64,
    },
    /// Print the effective configuration
    Config {
        /// Also write it to the default configuration file
        #[arg(short, long)]
        write: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_log_command_parses() {
        let cli = Cli::parse_from(["weighlog", "-v", "log", "AA:BB", "--food", "rice"]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Log {
                device_id,
                food,
                settle,
            } => {
                assert_eq!(device_id, "AA:BB");
                assert_eq!(food, "rice");
                assert_eq!(settle, 2);
            }
            _ => panic!("expected log command"),
        }
    }

    #[test]
    fn test_weigh_samples_are_optional() {
        let cli = Cli::parse_from(["weighlog", "weigh", "AA:BB"]);
        assert!(matches!(cli.command, Commands::Weigh { samples: None, .. }));
    }
}
