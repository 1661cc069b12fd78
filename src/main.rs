use anyhow::Result;
use clap::Parser;

use qc_checklist::cli::commands::config::ConfigCommand;
use qc_checklist::cli::commands::exec::ExecCommand;
use qc_checklist::cli::commands::lookup::LookupCommand;
use qc_checklist::cli::commands::show_how_to_start;
use qc_checklist::cli::commands::template::TemplateCommand;
use qc_checklist::cli::{Cli, Commands};
use qc_checklist::{config, init_config, init_telemetry};

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_config()?;
    let config = config()?;
    if let Err(e) = init_telemetry(&config.observability) {
        eprintln!("⚠️  Logging not initialized: {}", e);
    }

    match cli.command {
        // Default behavior: no subcommand - explain how to start
        None => show_how_to_start(),
        Some(Commands::Exec {
            serial,
            operator,
            file,
            offline,
        }) => tokio::runtime::Runtime::new()?.block_on(async {
            ExecCommand::new(serial)
                .with_operator(operator)
                .with_file(file)
                .with_offline(offline)
                .execute(config)
                .await
        }),
        Some(Commands::Lookup { serial, offline }) => {
            tokio::runtime::Runtime::new()?.block_on(async {
                LookupCommand::new(serial)
                    .with_offline(offline)
                    .execute(config)
                    .await
            })
        }
        Some(Commands::Template { action }) => tokio::runtime::Runtime::new()?
            .block_on(async { TemplateCommand::new(&action).execute(config).await }),
        Some(Commands::Config { write }) => ConfigCommand::new(write).execute(config),
    }
}
