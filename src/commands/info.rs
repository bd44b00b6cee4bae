//! The info subcommand.
//!
//! Three modes, picked automatically:
//! - `--observe`: run the observer, print every state change and
//!   republish it through the local state server,
//! - a state server is running: subscribe and print every snapshot,
//! - otherwise: one-shot query against the player.

use crate::cli::InfoArgs;
use crate::format::{FormatError, Template, Variables};
use crate::title;
use log::{debug, warn};
use sctl_ipc::{IpcError, StateReceiver, StateServer};
use sctl_mpris::{PlayerClient, PlayerError, PlayerObserver, PlayerState};
use std::process::ExitCode;
use tokio::sync::mpsc;

pub async fn run(args: InfoArgs) -> ExitCode {
    let printer = match Printer::new(&args) {
        Ok(printer) => printer,
        Err(err) => {
            eprintln!("error: {}", err);
            return ExitCode::FAILURE;
        }
    };

    if args.observe {
        observe(printer).await
    } else {
        follow(printer).await
    }
}

/// Renders snapshots to stdout through the user's template.
struct Printer {
    template: Template,
    play_indicator: String,
    pause_indicator: String,
    truncation_length: usize,
    format_is_empty: bool,
}

impl Printer {
    fn new(args: &InfoArgs) -> Result<Self, FormatError> {
        Ok(Self {
            template: Template::parse(&args.format)?,
            play_indicator: args.play_indicator.clone(),
            pause_indicator: args.pause_indicator.clone(),
            truncation_length: args.truncation_length,
            format_is_empty: args.format.is_empty(),
        })
    }

    fn print(&self, state: &PlayerState) {
        if self.format_is_empty {
            return;
        }
        match self.render(state) {
            Ok(line) => println!("{}", line),
            Err(err) => warn!("format failed: {}", err),
        }
    }

    /// A detached snapshot renders as an empty line, which lets status
    /// bars clear their widget.
    fn render(&self, state: &PlayerState) -> Result<String, FormatError> {
        if !state.is_attached() {
            return Ok(String::new());
        }
        let line = self.template.render(&self.variables(state))?;
        Ok(line.chars().take(self.truncation_length).collect())
    }

    fn variables(&self, state: &PlayerState) -> Variables {
        let m = &state.metadata;
        let icon = match state.status.as_str() {
            "Playing" => self.play_indicator.clone(),
            "Paused" => self.pause_indicator.clone(),
            _ => String::new(),
        };

        Variables::from([
            ("trackid", Some(m.track_id.clone())),
            ("length", Some(m.length_us.to_string())),
            ("art_url", Some(m.art_url.clone())),
            ("album", Some(m.album.clone())),
            (
                "album_artist",
                Some(m.album_artists.first().cloned().unwrap_or_default()),
            ),
            ("artist", Some(m.artists.first().cloned().unwrap_or_default())),
            ("auto_rating", Some(m.auto_rating.to_string())),
            ("disc_number", Some(m.disc_number.to_string())),
            ("title", Some(m.title.clone())),
            ("clean_title", Some(title::clean(&m.title))),
            ("track_number", Some(m.track_number.to_string())),
            ("url", Some(m.url.clone())),
            ("status", Some(state.status.clone())),
            ("volume", state.volume.map(|v| v.to_string())),
            ("icon", Some(icon)),
        ])
    }
}

/// Observe the player, print and republish every state change.
async fn observe(printer: Printer) -> ExitCode {
    let mut server = match StateServer::bind().await {
        Ok(server) => server,
        Err(err) => {
            eprintln!("error: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let mut observer = match PlayerObserver::connect().await {
        Ok(observer) => observer,
        Err(err) => {
            eprintln!("error: {}", err);
            let _ = server.shutdown().await;
            return ExitCode::FAILURE;
        }
    };

    // The observer callback is synchronous; bridge snapshots over a
    // channel so the broadcast write can await.
    let (tx, mut rx) = mpsc::unbounded_channel::<PlayerState>();
    observer.set_callback(move |state| {
        let _ = tx.send(state.clone());
    });

    let code = tokio::select! {
        result = observer.start() => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("error: {}", err);
                ExitCode::FAILURE
            }
        },
        _ = publish(&mut rx, &printer, &server) => ExitCode::SUCCESS,
        _ = tokio::signal::ctrl_c() => {
            debug!("interrupted");
            ExitCode::SUCCESS
        }
    };

    if let Err(err) = server.shutdown().await {
        warn!("server shutdown failed: {}", err);
    }
    code
}

async fn publish(
    rx: &mut mpsc::UnboundedReceiver<PlayerState>,
    printer: &Printer,
    server: &StateServer,
) {
    while let Some(state) = rx.recv().await {
        printer.print(&state);
        if let Err(err) = server.send(&state).await {
            warn!("broadcast failed: {}", err);
        }
    }
}

/// Print the live stream from a running state server, or fall back to a
/// one-shot query when there is none.
async fn follow(printer: Printer) -> ExitCode {
    match StateReceiver::connect().await {
        Ok(receiver) => {
            let result = tokio::select! {
                result = receiver.start(|state| printer.print(&state)) => result,
                _ = tokio::signal::ctrl_c() => {
                    debug!("interrupted");
                    Ok(())
                }
            };
            match result {
                Ok(()) => ExitCode::SUCCESS,
                Err(IpcError::NotRunning) => {
                    debug!("state server went away");
                    ExitCode::SUCCESS
                }
                Err(err) => {
                    eprintln!("error: {}", err);
                    ExitCode::FAILURE
                }
            }
        }
        Err(IpcError::NotRunning) => one_shot(&printer).await,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}

async fn one_shot(printer: &Printer) -> ExitCode {
    debug!("no state server, querying the player directly");

    let state = async {
        let client = PlayerClient::connect().await?;
        client.current_state().await
    }
    .await;

    match state {
        Ok(state) => {
            printer.print(&state);
            ExitCode::SUCCESS
        }
        Err(PlayerError::NotRunning) => {
            debug!("spotify is not running");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}
