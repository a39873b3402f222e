#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

use anyhow::{Context, Result, bail};
use clap::Parser;
use stepgate::Config;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod cli;

use cli::{Cli, Commands, handlers};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load_or_init()?,
    };

    let level: Level = config
        .log_level
        .parse()
        .with_context(|| format!("invalid log level '{}'", config.log_level))?;
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    match cli.command {
        Commands::Check {
            action,
            params,
            confirmed,
        } => handlers::check(&config, &action, &params, confirmed),
        Commands::Plan { goal, output } => handlers::plan(&goal, output.as_deref()).await,
        Commands::Validate { path } => handlers::validate(&path),
        Commands::Run {
            path: Some(path),
            yes,
            ..
        } => handlers::run(&config, &path, yes),
        Commands::Run {
            resume: Some(plan_id),
            yes,
            ..
        } => handlers::resume(&config, &plan_id, yes),
        Commands::Run { .. } => bail!("run needs a plan file or --resume <PLAN_ID>"),
        Commands::Snapshots => handlers::snapshots(&config),
    }
}
