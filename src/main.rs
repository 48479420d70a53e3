use anyhow::Result;
use clap::Parser;

mod cli;

use cli::commands::{CheckConfigCommand, ReplayCommand, ShowConfigCommand, WatchCommand};
use cli::{Cli, Commands};
use tutor_guard::config::{ObservabilityConfig, TutorConfig};
use tutor_guard::telemetry::init_telemetry;

fn main() -> Result<()> {
    let cli = Cli::parse();

    TutorConfig::load_env_file()?;
    let config = TutorConfig::load(cli.config.as_deref());

    // Logging comes up even when the configuration is bad so the error is reported.
    let observability = match &config {
        Ok(config) => config.observability.clone(),
        Err(_) => ObservabilityConfig::default(),
    };
    init_telemetry(&observability)?;
    let config = config?;

    match cli.command {
        Commands::Replay { file, json } => ReplayCommand::new(file).with_json(json).execute(&config),
        Commands::Watch { input, queue } => tokio::runtime::Runtime::new()?
            .block_on(async { WatchCommand::new(input, queue).execute(&config).await }),
        Commands::ShowConfig => ShowConfigCommand.execute(&config),
        Commands::CheckConfig => CheckConfigCommand.execute(&config),
    }
}
