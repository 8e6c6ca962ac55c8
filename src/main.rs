use std::process::ExitCode;

use anyhow::{anyhow, Context};
use clap::Parser;
use tracing::error;

use dinner_notifier::app::AppContext;
use dinner_notifier::cli::{commands, Cli, Commands};
use dinner_notifier::config::Config;
use dinner_notifier::daemon::WatchConfig;
use dinner_notifier::logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _guard = match logging::init(cli.log_dir.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to set up logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let command = cli.command();

    if let Commands::Init { force } = command {
        Config::write_template(&cli.config, force)?;
        println!("Wrote configuration template to {}", cli.config.display());
        return Ok(());
    }

    let mut config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    config.apply_overrides(&cli.overrides())?;
    if matches!(command, Commands::Run | Commands::Watch { .. }) {
        config.ensure_valid()?;
    }

    let watch = match command {
        Commands::Watch {
            ref interval,
            no_initial_run,
        } => Some(WatchConfig {
            interval_secs: WatchConfig::parse_interval(interval).map_err(|e| anyhow!(e))?,
            run_on_start: !no_initial_run,
        }),
        _ => None,
    };

    let ctx = AppContext::new(config);
    let result = match (command, watch) {
        (Commands::Watch { .. }, Some(watch)) => commands::watch(&ctx, &watch).await,
        (Commands::Login, _) => commands::login(&ctx).await,
        (Commands::Status, _) => commands::status(&ctx),
        _ => commands::run(&ctx).await,
    };
    ctx.shutdown().await;

    Ok(result?)
}
