#![forbid(unsafe_code)]

pub mod adapters;
pub mod app;
pub mod cli;
pub mod commands;
pub mod domain;
pub mod infrastructure;
pub mod ports;

use anyhow::Context;
use clap::Parser;

use app::AppController;
use cli::Cli;

/// Parse the command line, start the controller and run the command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let controller =
        AppController::new(&cli.overrides()).context("Failed to initialize application")?;

    commands::dispatch(&controller, cli.command).await
}
