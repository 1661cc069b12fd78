use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

#[derive(Parser)]
#[command(name = "qc-checklist")]
#[command(about = "Timed quality-checklist execution for the production floor")]
#[command(long_about = "qc-checklist guides an operator through the inspection steps defined for a \
                       product model, enforcing a minimum dwell time per step, capturing \
                       non-conformances and recording a final pass/fail result. Start with \
                       'qc-checklist exec --serial <SN>'.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the checklist for a unit on the bench (interactive)
    Exec {
        /// Serial number of the unit under test
        #[arg(long, short = 's', help = "Serial number of the unit under test")]
        serial: String,
        /// Operator name recorded with the result
        #[arg(long, short = 'o', help = "Operator name recorded with the result")]
        operator: Option<String>,
        /// Load the checklist from a JSON file instead of looking it up
        #[arg(long, short = 'f', help = "Checklist JSON file (envelope or bare {modelo, items})")]
        file: Option<PathBuf>,
        /// Resolve the checklist from the local template directory only
        #[arg(long, help = "Use templates.directory instead of the backend")]
        offline: bool,
    },
    /// Show the checklist that applies to a serial number
    Lookup {
        /// Serial number to look up
        serial: String,
        /// Resolve from the local template directory only
        #[arg(long, help = "Use templates.directory instead of the backend")]
        offline: bool,
    },
    /// Inspect, validate and store checklist templates
    Template {
        #[command(subcommand)]
        action: TemplateAction,
    },
    /// Print the effective configuration, or write it to a file
    Config {
        /// Write the configuration as TOML to this path
        #[arg(long, help = "Write the effective configuration to this TOML file")]
        write: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum TemplateAction {
    /// List models with a stored template
    List,
    /// Print the stored template for a model
    Show {
        /// Product model, e.g. PM2100
        model: String,
    },
    /// Validate a template file and store it on the backend
    Push {
        /// Template JSON file
        file: PathBuf,
    },
    /// Validate a template file without storing it
    Check {
        /// Template JSON file
        file: PathBuf,
    },
}
