//! spotifyctl - observe and control the Spotify player.
//!
//! `info` renders the current player state (live via the local state
//! server, or one-shot against the player), `info --observe` runs the
//! observer and republishes every state change, `control` sends playback
//! and volume commands.

mod cli;
mod commands;
mod format;
mod title;

use clap::Parser;
use cli::{Cli, Command};
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut builder = env_logger::Builder::from_default_env();
    if cli.debug {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();

    match cli.command {
        Command::Info(args) => commands::info::run(args).await,
        Command::Control(args) => commands::control::run(args).await,
    }
}
