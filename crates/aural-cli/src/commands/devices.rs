//! Output device listing command.

use aural_io::backend_by_name;
use clap::Args;

#[derive(Args)]
pub struct DevicesArgs {
    /// Backend to enumerate: cpal, wav or null
    #[arg(short, long, default_value = "cpal")]
    backend: String,

    /// Print the list as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: DevicesArgs) -> anyhow::Result<()> {
    let backend = backend_by_name(&args.backend)?;
    let devices: Vec<_> = backend.devices()?.collect();

    if args.json {
        let list: Vec<_> = devices
            .iter()
            .map(|d| {
                serde_json::json!({
                    "name": d.name,
                    "input": d.is_input,
                    "output": d.is_output,
                    "default_sample_rate": d.default_sample_rate,
                })
            })
            .collect();
        let report = serde_json::json!({ "backend": backend.name(), "devices": list });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if devices.is_empty() {
        println!("No devices found for backend '{}'.", backend.name());
        return Ok(());
    }

    println!("Devices ({})", backend.name());
    println!("{}", "=".repeat(10 + backend.name().len()));
    println!();

    let outputs: Vec<_> = devices.iter().filter(|d| d.is_output).collect();
    for (idx, device) in outputs.iter().enumerate() {
        let also_input = if device.is_input { " (also input)" } else { "" };
        println!(
            "  [{}] {} ({} Hz){}",
            idx, device.name, device.default_sample_rate, also_input
        );
    }
    let inputs_only = devices.iter().filter(|d| !d.is_output).count();
    println!();
    println!("Total: {} output(s), {} input-only", outputs.len(), inputs_only);
    println!();
    println!("Tip: select a device by partial name:");
    println!("  aural play scene.toml --device \"USB\"");
    Ok(())
}
