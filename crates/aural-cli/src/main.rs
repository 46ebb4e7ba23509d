//! Aural CLI - render and play spatial audio scenes.

mod commands;
mod scene;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "aural")]
#[command(author, version, about = "Aural spatial audio mixer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a scene offline into a WAV file
    Render(commands::render::RenderArgs),

    /// Play a scene through an output backend
    Play(commands::play::PlayArgs),

    /// List output devices of a backend
    Devices(commands::devices::DevicesArgs),

    /// Describe a scene, or the available effects and backends
    Info(commands::info::InfoArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
    tracing_log::LogTracer::init().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render(args) => commands::render::run(args),
        Commands::Play(args) => commands::play::run(args),
        Commands::Devices(args) => commands::devices::run(args),
        Commands::Info(args) => commands::info::run(args),
    }
}
