//! Real-time scene playback command.

use crate::commands::common;
use crate::scene::LoadedScene;
use aural_io::MixerThread;
use aural_mixer::Mixer;
use clap::Args;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

#[derive(Args)]
pub struct PlayArgs {
    /// Scene file or name
    scene: String,

    /// Backend: cpal, wav or null (overrides the scene)
    #[arg(short, long)]
    backend: Option<String>,

    /// Output device (partial name) or, for the wav backend, a file path
    #[arg(long)]
    device: Option<String>,

    /// Stop after this many seconds (default: when all sources end)
    #[arg(short, long)]
    duration: Option<f64>,

    /// Master gain (overrides the scene)
    #[arg(long)]
    gain: Option<f32>,

    /// Render periods per second (overrides the scene)
    #[arg(long)]
    refresh_rate: Option<f32>,
}

pub fn run(args: PlayArgs) -> anyhow::Result<()> {
    let mut scene = common::load_scene(&args.scene)?;
    if let Some(backend) = args.backend {
        scene.mixer.backend = backend;
    }
    if args.device.is_some() {
        scene.mixer.device = args.device;
    }
    if let Some(gain) = args.gain {
        scene.mixer.gain = gain;
    }
    if let Some(refresh_rate) = args.refresh_rate {
        scene.mixer.refresh_rate = refresh_rate;
    }
    if let Some(seconds) = args.duration
        && (!seconds.is_finite() || seconds <= 0.0)
    {
        anyhow::bail!("Duration must be positive, got {}", seconds);
    }
    scene
        .mixer
        .validate()
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    let mut backend = common::live_backend(&scene.mixer.backend)?;
    backend.connect(scene.mixer.device.as_deref())?;
    let mut config = common::backend_config(&scene.mixer);
    backend.setup(&mut config)?;
    if config.sample_rate != scene.mixer.sample_rate || config.tracks != scene.mixer.tracks {
        tracing::info!(
            requested_rate = scene.mixer.sample_rate,
            rate = config.sample_rate,
            requested_tracks = scene.mixer.tracks,
            tracks = config.tracks,
            "backend negotiated a different format"
        );
    }

    let mixer = Mixer::new(common::negotiated_settings(&scene.mixer, &config));
    mixer.play()?;
    let mut loaded = LoadedScene::build(&scene, &mixer.handle(), mixer.settings())?;
    loaded.pump();

    println!("Playing: {}", args.scene);
    println!("  Backend: {}", backend.name());
    if let Some(device) = &scene.mixer.device {
        println!("  Device: {}", device);
    }
    println!(
        "  Format: {} Hz, {} track(s), {}-bit",
        config.sample_rate,
        config.tracks,
        config.format.bits()
    );
    println!(
        "  Period: {} frames ({:.1} ms)",
        config.period_frames,
        config.period_duration().as_secs_f64() * 1000.0
    );
    println!("\nPress Ctrl+C to stop...\n");

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        println!("\nStopping...");
        r.store(false, Ordering::SeqCst);
    })?;

    let period = config.period_duration();
    let thread = MixerThread::spawn(mixer, backend, config)?;
    thread.set_gain(scene.mixer.gain);

    let started = Instant::now();
    let limit = args.duration.map(Duration::from_secs_f64);
    while running.load(Ordering::SeqCst) && thread.is_running() {
        std::thread::sleep(period / 2);
        loaded.pump();

        let elapsed = started.elapsed();
        let done = match limit {
            Some(limit) => elapsed >= limit,
            None => loaded.is_drained(),
        };
        if done {
            break;
        }
    }

    let stats = thread.stop()?;
    println!(
        "Done: {} periods in {:.1}s, {} device underrun(s), {} sensor underrun(s)",
        stats.periods,
        started.elapsed().as_secs_f64(),
        stats.underruns,
        loaded.underruns()
    );
    for source in loaded.sources() {
        let dry = source.feed().underruns();
        if dry > 0 {
            tracing::debug!(sensor = source.name(), underruns = dry, "sensor ran dry");
        }
    }
    Ok(())
}
