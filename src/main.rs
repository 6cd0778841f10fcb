use anyhow::Context;
use backtester::backtest::BacktestError;
use backtester::cli::{Cli, Commands};
use backtester::config::Config;
use clap::Parser;
use std::path::Path;

/// Exit status after a user interrupt
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = Path::new(&cli.config);

    // Load configuration
    let config = Config::load(config_path)
        .with_context(|| format!("Could not load config from {}", cli.config))?;

    // Initialize telemetry
    let _telemetry = backtester::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Backtest(args) => {
            if let Err(e) = args.execute(config, config_path).await {
                if let Some(BacktestError::Interrupted { completed }) = e.downcast_ref::<BacktestError>() {
                    eprintln!("Interrupted after {completed} completed runs");
                    std::process::exit(EXIT_INTERRUPTED);
                }
                return Err(e);
            }
        }
        Commands::Generate(args) => {
            tracing::info!("Generating synthetic data");
            args.execute(&config, config_path).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
