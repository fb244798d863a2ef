use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use geocode_sheet::app;
use geocode_sheet::config::Cli;
use geocode_sheet::config::ConfigError;
use geocode_sheet::GeocodeSheetError;
use std::process::ExitCode;

fn run(cli: Cli) -> Result<()> {
    let config = cli.validate()?;
    app::run(&config).with_context(|| format!("Geocoding '{}' failed", config.input.display()))?;
    Ok(())
}

/// Bad arguments, as opposed to an unreadable workbook or a failed save.
fn is_usage_error(error: &anyhow::Error) -> bool {
    error.downcast_ref::<ConfigError>().is_some()
        || error
            .downcast_ref::<GeocodeSheetError>()
            .map(GeocodeSheetError::is_config_error)
            .unwrap_or(false)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) if is_usage_error(&error) => {
            log::error!("Invalid arguments: {}", error.root_cause());
            log::error!("Run with --help for usage");
            ExitCode::FAILURE
        }
        Err(error) => {
            log::error!("{error:#}");
            ExitCode::FAILURE
        }
    }
}
