/// Tempest - headless music player
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tempest_audio_desktop::{backend, CpalDevices, DesktopEngine};
use tempest_cli::{format_position, load_settings, Playlist, PlaylistAction, ENV_PREFIX};
use tempest_playback::{DeviceManager, EngineCommand, EngineEvent, EngineSettings};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tempest")]
#[command(about = "Tempest headless music player", long_about = None)]
struct Cli {
    /// Configuration file path (TOML)
    #[arg(short, long, global = true, env = "TEMPEST_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List output devices per output mode
    Devices,
    /// Play files in order
    Play {
        /// Audio files
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Volume (0.0 - 1.0)
        #[arg(short, long)]
        volume: Option<f32>,
        /// Crossfade into the next file over this many seconds
        #[arg(long)]
        crossfade: Option<u32>,
    },
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref(), ENV_PREFIX)?;

    match cli.command {
        Commands::Devices => list_devices(),
        Commands::Play {
            files,
            volume,
            crossfade,
        } => play(settings, files, volume, crossfade),
    }
}

fn list_devices() -> anyhow::Result<()> {
    let manager = DeviceManager::new(Box::new(CpalDevices::new()));
    let groups = manager.sound_out_list();
    if groups.is_empty() {
        println!("No output devices available");
        return Ok(());
    }

    for group in groups {
        println!(
            "{} ({}, {})",
            group.name,
            backend::host_name(),
            backend::mode_description(group.mode)
        );
        for device in group.devices {
            let marker = if device.is_default { "*" } else { " " };
            println!("  {} {:<4} {}", marker, device.id, device.name);
        }
    }
    Ok(())
}

fn play(
    mut settings: EngineSettings,
    files: Vec<PathBuf>,
    volume: Option<f32>,
    crossfade: Option<u32>,
) -> anyhow::Result<()> {
    if let Some(secs) = crossfade {
        settings.crossfade_enabled = secs > 0;
        settings.crossfade_duration_secs = secs;
    }

    let engine = DesktopEngine::spawn(settings).context("Failed to start playback engine")?;
    if let Some(volume) = volume {
        engine.send(EngineCommand::SetVolume(volume))?;
    }

    let mut playlist = Playlist::new(files);
    let mut action = Some(playlist.start());
    let mut last_position = None;

    loop {
        match action.take() {
            Some(PlaylistAction::Open(path)) => {
                tracing::info!("Opening {}", path.display());
                engine.open_file(path)?;
            }
            Some(PlaylistAction::Play) => engine.send(EngineCommand::Play)?,
            Some(PlaylistAction::Finish { tail }) => {
                if let Some(tail) = tail {
                    std::thread::sleep(tail);
                }
                break;
            }
            None => {}
        }

        let event = engine
            .events()
            .recv()
            .context("Playback engine stopped unexpectedly")?;

        match &event {
            EngineEvent::TrackChanged { path } => {
                println!();
                println!("Playing {}", path.display());
                last_position = None;
            }
            EngineEvent::PositionChanged {
                elapsed_secs,
                total_secs,
            } => {
                if last_position != Some(*elapsed_secs) {
                    last_position = Some(*elapsed_secs);
                    print!("\r{}", format_position(*elapsed_secs, *total_secs));
                    std::io::stdout().flush()?;
                }
            }
            EngineEvent::SettingsChanged { settings } => {
                tracing::info!(
                    "Output device reset to {}",
                    settings.sound_out_device_id
                );
            }
            EngineEvent::OutputFailed { message } => {
                tracing::error!("Audio output unavailable: {}", message);
            }
            _ => {}
        }

        action = playlist.on_event(&event);
    }

    println!();
    if !playlist.failed().is_empty() {
        tracing::warn!("{} file(s) could not be played", playlist.failed().len());
    }

    engine.shutdown();
    Ok(())
}
