use clap::Parser;

use courier_rs::cli::{Cli, CommandHandler, Commands, ConfigurationMerger};
use courier_rs::logger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = ConfigurationMerger::load(cli.config.as_ref())?;
    let settings = ConfigurationMerger::merge_cli_args(&cli, settings)?;

    logger::init(&settings.logger)?;

    match cli.command {
        Some(Commands::Migrate { dry_run }) => CommandHandler::handle_migrate(settings, dry_run).await,
        Some(Commands::Serve { dry_run, .. }) => CommandHandler::handle_serve(settings, dry_run).await,
        None => CommandHandler::handle_serve(settings, false).await,
    }
}
