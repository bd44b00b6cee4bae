//! Command-line argument parsing for spotifyctl.

use clap::{Args, Parser, Subcommand};

/// Default output template for the info subcommand.
pub const DEFAULT_FORMAT: &str = "$icon $artist — $clean_title{ // ${volume}%| @IfNotNone 'volume'}";

/// Observe and control the Spotify player.
#[derive(Parser, Debug)]
#[command(name = "spotifyctl")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Show internal diagnostics on stderr.
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show metadata, volume and playback status.
    Info(InfoArgs),
    /// Control playback and volume.
    Control(ControlArgs),
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Truncate output after it reaches N characters.
    #[arg(short = 't', long, value_name = "N", default_value_t = 72)]
    pub truncation_length: usize,

    /// Icon to show while playing.
    #[arg(long, value_name = "ICON", default_value_t = String::from("\u{e099}"))]
    pub play_indicator: String,

    /// Icon to show when paused.
    #[arg(long, value_name = "ICON", default_value_t = String::from("\u{e058}"))]
    pub pause_indicator: String,

    /// Output template: literal text, $variables, and {groups| @Func 'arg'}.
    #[arg(short = 'f', long, value_name = "FORMAT", default_value = DEFAULT_FORMAT)]
    pub format: String,

    /// Observe the player and republish every state change locally.
    #[arg(short = 'O', long)]
    pub observe: bool,
}

#[derive(Args, Debug)]
#[command(group = clap::ArgGroup::new("volumectl").multiple(false))]
#[command(group = clap::ArgGroup::new("playerctl").multiple(false))]
pub struct ControlArgs {
    /// Set volume to VOLUME (integer percent, 0 to 100).
    #[arg(
        short = 's', long, value_name = "VOLUME", group = "volumectl",
        value_parser = clap::value_parser!(i32).range(0..=100)
    )]
    pub set_volume: Option<i32>,

    /// Mute spotify.
    #[arg(short = 'm', long, group = "volumectl")]
    pub mute: bool,

    /// Unmute spotify.
    #[arg(short = 'u', long, group = "volumectl")]
    pub unmute: bool,

    /// Mute or unmute spotify.
    #[arg(short = 't', long, group = "volumectl")]
    pub toggle_volume: bool,

    /// Increase volume by INCREMENT percent.
    #[arg(
        short = 'i', long, value_name = "INCREMENT", group = "volumectl",
        num_args = 0..=1, default_missing_value = "5",
        value_parser = clap::value_parser!(i32).range(0..=100)
    )]
    pub increase_volume: Option<i32>,

    /// Decrease volume by DECREMENT percent.
    #[arg(
        short = 'd', long, value_name = "DECREMENT", group = "volumectl",
        num_args = 0..=1, default_missing_value = "5",
        value_parser = clap::value_parser!(i32).range(0..=100)
    )]
    pub decrease_volume: Option<i32>,

    /// Start or resume playback.
    #[arg(short = 'l', long, group = "playerctl")]
    pub play: bool,

    /// Pause playback.
    #[arg(short = 'a', long, group = "playerctl")]
    pub pause: bool,

    /// Resume playback if paused, pause it otherwise.
    #[arg(short = 'P', long, group = "playerctl")]
    pub play_pause: bool,

    /// Skip to the next track in the tracklist.
    #[arg(short = 'n', long, group = "playerctl")]
    pub next: bool,

    /// Skip to the previous track in the tracklist.
    #[arg(short = 'p', long, group = "playerctl")]
    pub previous: bool,

    /// Stop playback.
    #[arg(long, group = "playerctl")]
    pub stop: bool,

    /// Ask the player to open URI (track, album, playlist...).
    #[arg(long, value_name = "URI", group = "playerctl")]
    pub open_uri: Option<String>,
}
