//! `waveplay` — play an audio file from the command line.
//!
//! Drives a [`PlaybackSession`] over the event channel the same way a UI
//! would: send `Play`, log notifications as they arrive, and quit when the
//! track clears. Ctrl-C stops playback and shuts the worker down.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use waveplay_engine::channel::event_channel;
use waveplay_engine::config::EngineConfig;
use waveplay_engine::decoder::SymphoniaDecoder;
use waveplay_engine::session::PlaybackSession;
use waveplay_engine::sink::{AudioSink, CpalSink, list_output_devices};
use waveplay_types::{PlaybackCommand, PlaybackNotification, PlayerState};

#[derive(Parser, Debug)]
#[command(name = "waveplay")]
struct Args {
    /// Audio file to play (flac, mp3, ogg, wav, ...)
    file: Option<PathBuf>,

    /// Output device name substring; defaults to the system default device
    #[arg(long)]
    device: Option<String>,

    /// List output devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Initial volume in percent, 0..=100
    #[arg(long, default_value_t = 100)]
    volume: u8,

    /// Start position in seconds
    #[arg(long, default_value_t = 0)]
    start: u64,

    /// Output sample rate in Hz
    #[arg(long, default_value_t = 44_100)]
    rate: u32,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if args.list_devices {
        return list_output_devices();
    }
    let Some(file) = args.file else {
        bail!("no input file (see --help)");
    };

    let config = EngineConfig {
        output_rate: args.rate,
        ..EngineConfig::default()
    };

    let (consumer, engine) = event_channel(config.lane_capacity);
    let decoder = Box::new(SymphoniaDecoder::new(config.output_rate));
    let device = args.device.clone();
    let session = PlaybackSession::spawn(
        config,
        engine,
        decoder,
        Box::new(move |cfg: &EngineConfig| {
            Ok(Box::new(CpalSink::open(cfg, device.as_deref())?) as Box<dyn AudioSink>)
        }),
    );

    let interrupt = consumer.clone();
    ctrlc::set_handler(move || {
        let _ = interrupt.send(PlaybackCommand::Stop);
        let _ = interrupt.send(PlaybackCommand::Quit);
    })?;

    if args.volume != 100 {
        consumer.send(PlaybackCommand::SetVolume {
            percent: args.volume,
        })?;
    }
    consumer.send(PlaybackCommand::Play { path: file })?;
    if args.start > 0 {
        consumer.send(PlaybackCommand::Seek {
            seconds: args.start,
        })?;
    }

    let mut exit = Ok(());
    while let Ok(note) = consumer.recv() {
        match note {
            PlaybackNotification::TrackLoaded(info) => {
                tracing::info!(
                    title = info.title.as_deref().unwrap_or("?"),
                    artist = info.artist.as_deref().unwrap_or("?"),
                    channels = info.channels,
                    sample_rate = info.sample_rate,
                    duration_secs = info.duration_secs,
                    "track loaded"
                );
            }
            PlaybackNotification::TrackCleared => {
                let _ = consumer.send(PlaybackCommand::Quit);
            }
            PlaybackNotification::StateChanged { state } => {
                tracing::info!(?state, "state");
                if state == PlayerState::Error || state == PlayerState::Idle {
                    let _ = consumer.send(PlaybackCommand::Quit);
                }
            }
            PlaybackNotification::VolumeChanged { percent } => {
                tracing::info!(percent, "volume");
            }
            PlaybackNotification::Progress { seconds } => {
                tracing::debug!(seconds, "progress");
            }
            PlaybackNotification::Spectrum { .. } => {}
            PlaybackNotification::Failed { code } => {
                tracing::error!("playback failed: {code}");
                exit = Err(anyhow::Error::new(code));
            }
        }
    }

    session.join();
    exit
}
