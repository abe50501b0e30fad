use anyhow::{Context, Result};
use chime_engine::{EffectOptions, PassthroughOptions, RuntimeMode, SoundConfig, SoundService, VoiceClipOptions};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "chime", version, about = "Sound effects and voice clip playback")]
struct Cli {
    /// TOML config file
    #[arg(short, long, env = "CHIME_CONFIG")]
    config: Option<PathBuf>,

    /// Directory that effect ids are resolved against
    #[arg(long, env = "CHIME_ASSETS")]
    assets: Option<PathBuf>,

    /// Output device for effects (substring match)
    #[arg(long)]
    output: Option<String>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Play a sound effect by id
    Effect {
        file_id: String,
        #[command(flatten)]
        fx: FxArgs,
        /// Number of overlapping plays
        #[arg(long, default_value_t = 1)]
        repeat: u32,
    },
    /// Queue audio files as voice clips and play them back to back
    Clips {
        files: Vec<PathBuf>,
        #[arg(short, long)]
        device: String,
        #[arg(long, default_value_t = 1.0)]
        volume: f32,
        #[arg(long, default_value_t = 1.0)]
        rate: f32,
    },
    /// Play one file directly on a device, bypassing the clip queue
    Say {
        file: PathBuf,
        #[arg(short, long)]
        device: String,
        #[arg(long)]
        volume: Option<f32>,
    },
}

#[derive(Args)]
struct FxArgs {
    #[arg(long)]
    volume: Option<f32>,
    #[arg(long, allow_hyphen_values = true)]
    detune_min: Option<f32>,
    #[arg(long, allow_hyphen_values = true)]
    detune_max: Option<f32>,
    #[arg(long)]
    playback_min: Option<f32>,
    #[arg(long)]
    playback_max: Option<f32>,
}

impl From<FxArgs> for EffectOptions {
    fn from(a: FxArgs) -> Self {
        Self {
            volume: a.volume,
            detune_min: a.detune_min,
            detune_max: a.detune_max,
            playback_min: a.playback_min,
            playback_max: a.playback_max,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chime=info,chime_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut cfg = match &cli.config {
        Some(path) => SoundConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => SoundConfig::default(),
    };
    if let Some(dir) = cli.assets {
        cfg.assets_dir = dir;
    }
    if let Some(dev) = cli.output {
        cfg.output.device = Some(dev);
    }

    match cli.cmd {
        Command::Effect { file_id, fx, repeat } => {
            let svc = SoundService::from_config(&cfg).context("opening audio output")?;
            let opts = EffectOptions::from(fx);
            for _ in 0..repeat {
                svc.play_file(&file_id, Some(&opts)).await;
            }
            // Fire-and-forget: hold the stream open until the voices end.
            tokio::time::sleep(Duration::from_millis(20)).await;
            while svc.effects().active_voices() > 0 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            if !svc.effects().is_cached(&file_id) {
                info!("{file_id}: nothing played (muted, missing or undecodable)");
            }
        }
        Command::Clips { files, device, volume, rate } => {
            let svc = SoundService::from_config(&cfg).context("opening audio output")?;
            for file in &files {
                let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
                svc.enqueue_voice_clip(bytes, VoiceClipOptions { device_name: device.clone(), volume, rate });
            }
            info!("queued {} clip(s) on {device}", files.len());
            svc.clips().wait_idle().await;
        }
        Command::Say { file, device, volume } => {
            cfg.mode = RuntimeMode::Host;
            let svc = SoundService::from_config(&cfg).context("opening audio output")?;
            let bytes = std::fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
            svc.play_sound_async(bytes, &device, Some(PassthroughOptions { volume })).await;
        }
    }
    Ok(())
}
