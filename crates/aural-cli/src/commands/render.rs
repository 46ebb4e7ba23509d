//! Offline scene rendering command.

use crate::commands::common;
use crate::scene::LoadedScene;
use aural_config::SampleFormat;
use aural_io::{Backend, WavFileBackend, pcm};
use aural_mixer::Mixer;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

#[derive(Args)]
pub struct RenderArgs {
    /// Scene file or name
    scene: String,

    /// Output WAV file
    #[arg(short, long)]
    output: PathBuf,

    /// Length in seconds (default: longest source plus --tail)
    #[arg(short, long)]
    duration: Option<f64>,

    /// Seconds rendered after the longest source ends
    #[arg(long, default_value = "1.0")]
    tail: f64,

    /// Output sample rate (overrides the scene)
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Output tracks (overrides the scene)
    #[arg(long)]
    tracks: Option<u16>,

    /// Output bit depth: 16 or 24 (overrides the scene)
    #[arg(long)]
    bit_depth: Option<u16>,

    /// Master gain (overrides the scene)
    #[arg(long)]
    gain: Option<f32>,

    /// Hide the progress bar
    #[arg(short, long)]
    quiet: bool,
}

pub fn run(args: RenderArgs) -> anyhow::Result<()> {
    let mut scene = common::load_scene(&args.scene)?;
    let mixer_config = &mut scene.mixer;
    if let Some(rate) = args.sample_rate {
        mixer_config.sample_rate = rate;
    }
    if let Some(tracks) = args.tracks {
        mixer_config.tracks = tracks;
    }
    if let Some(bits) = args.bit_depth {
        mixer_config.format = match bits {
            16 => SampleFormat::Pcm16,
            24 => SampleFormat::Pcm24,
            _ => anyhow::bail!("Unsupported bit depth {} (expected 16 or 24)", bits),
        };
    }
    if let Some(gain) = args.gain {
        mixer_config.gain = gain;
    }
    mixer_config
        .validate()
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    let output = args
        .output
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Output path is not valid UTF-8"))?;
    let mut backend = WavFileBackend::writer();
    backend.connect(Some(output))?;
    let mut config = common::backend_config(&scene.mixer);
    backend.setup(&mut config)?;

    let mut mixer = Mixer::new(common::negotiated_settings(&scene.mixer, &config));
    mixer.play()?;
    let mut loaded = LoadedScene::build(&scene, &mixer.handle(), mixer.settings())?;

    let seconds = match args.duration {
        Some(seconds) => seconds,
        None => loaded
            .duration_secs()
            .map(|d| d + args.tail.max(0.0))
            .ok_or_else(|| anyhow::anyhow!("Scene has looped sources; pass --duration"))?,
    };
    if !seconds.is_finite() || seconds <= 0.0 {
        anyhow::bail!("Duration must be positive, got {}", seconds);
    }

    let settings = *mixer.settings();
    let periods = (seconds * f64::from(settings.sample_rate) / settings.period_frames as f64)
        .ceil() as u64;

    println!("Rendering: {}", args.scene);
    println!("Output: {}", args.output.display());
    println!(
        "Format: {} Hz, {} track(s), {}-bit, {} frames per period",
        config.sample_rate,
        config.tracks,
        config.format.bits(),
        config.period_frames
    );
    println!("Duration: {:.2}s ({} periods)", seconds, periods);

    let pb = if args.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(periods)
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("##-"),
    );

    let gain = scene.mixer.gain;
    let mut samples = vec![0.0f32; settings.period_samples()];
    let mut bytes = Vec::with_capacity(config.period_bytes());
    let mut peak = 0.0f32;
    for _ in 0..periods {
        loaded.pump();
        mixer.render(&mut samples);
        peak = peak.max(common::peak(&samples).min(1.0) * gain);
        pcm::encode_into(config.format, &samples, &mut bytes);
        backend.playback(&bytes, gain)?;
        pb.inc(1);
    }
    pb.finish();
    backend.close()?;

    println!(
        "Wrote {} frames, peak {:.1} dBFS",
        backend.frames(),
        common::to_db(peak)
    );
    Ok(())
}
