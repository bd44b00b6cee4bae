//! The control subcommand: one-shot volume and playback commands.

use crate::cli::ControlArgs;
use log::error;
use sctl_audio::AudioError;
use sctl_mpris::PlayerClient;
use std::error::Error;
use std::process::ExitCode;

pub async fn run(args: ControlArgs) -> ExitCode {
    match dispatch(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(args: ControlArgs) -> Result<(), Box<dyn Error>> {
    if args.mute {
        audio(|| sctl_audio::set_muted(true)).await?;
    } else if args.unmute {
        audio(|| sctl_audio::set_muted(false)).await?;
    } else if args.toggle_volume {
        audio(sctl_audio::toggle_muted).await?;
    } else if let Some(volume) = args.set_volume {
        audio(move || sctl_audio::set_volume(volume)).await?;
    } else if let Some(delta) = args.increase_volume {
        audio(move || sctl_audio::increase_volume(delta)).await?;
    } else if let Some(delta) = args.decrease_volume {
        audio(move || sctl_audio::decrease_volume(delta)).await?;
    } else if args.play {
        PlayerClient::connect().await?.play().await?;
    } else if args.pause {
        PlayerClient::connect().await?.pause().await?;
    } else if args.play_pause {
        PlayerClient::connect().await?.play_pause().await?;
    } else if args.next {
        PlayerClient::connect().await?.next().await?;
    } else if args.previous {
        PlayerClient::connect().await?.previous().await?;
    } else if args.stop {
        PlayerClient::connect().await?.stop().await?;
    } else if let Some(uri) = args.open_uri {
        PlayerClient::connect().await?.open_uri(&uri).await?;
    } else {
        return Err("no control action given, see --help".into());
    }
    Ok(())
}

/// Run a blocking PulseAudio roundtrip off the async runtime.
async fn audio<F>(op: F) -> Result<(), AudioError>
where
    F: FnOnce() -> Result<(), AudioError> + Send + 'static,
{
    match tokio::task::spawn_blocking(op).await {
        Ok(result) => result,
        Err(err) => {
            error!("audio worker failed: {}", err);
            Err(AudioError::OperationFailed)
        }
    }
}
