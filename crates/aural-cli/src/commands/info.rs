//! Scene description, effect and backend listing command.

#![allow(clippy::print_literal)]

use crate::commands::common;
use aural_config::{EffectConfig, MixerConfig, Placement, SceneConfig};
use aural_effects::{DspKind, MAX_SLOTS, ParamRange, SLOT_PARAMS};
use aural_io::BACKEND_NAMES;
use clap::Args;

#[derive(Args)]
pub struct InfoArgs {
    /// Scene file or name; without one, lists effects and backends
    scene: Option<String>,

    /// Show the parameters of one effect
    #[arg(short, long)]
    effect: Option<String>,

    /// Print as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: InfoArgs) -> anyhow::Result<()> {
    if let Some(name) = &args.effect {
        let kind = DspKind::from_name(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown effect: {}", name))?;
        return print_effect(kind, args.json);
    }

    match &args.scene {
        Some(name) => {
            let scene = common::load_scene(name)?;
            if args.json {
                let report = serde_json::json!({
                    "period_frames": scene.mixer.period_frames(),
                    "nodes": scene.node_count(),
                    "scene": scene,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_scene(name, &scene)?;
            }
        }
        None => {
            let mixer = common::default_mixer_config()?;
            if args.json {
                let kinds: Vec<_> = DspKind::ALL.iter().map(|k| k.name()).collect();
                let report = serde_json::json!({
                    "effects": kinds,
                    "backends": BACKEND_NAMES,
                    "mixer": mixer,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_overview(&mixer);
            }
        }
    }
    Ok(())
}

fn params(kind: DspKind) -> impl Iterator<Item = ParamRange> {
    (0..MAX_SLOTS)
        .flat_map(|s| (0..SLOT_PARAMS).map(move |i| (s, i)))
        .filter_map(move |(s, i)| kind.param(s, i))
}

fn format_value(value: f32) -> String {
    if value >= f32::MAX {
        "inf".to_string()
    } else {
        format!("{value}")
    }
}

fn print_effect(kind: DspKind, json: bool) -> anyhow::Result<()> {
    if json {
        let list: Vec<_> = params(kind)
            .map(|p| {
                serde_json::json!({
                    "name": p.name,
                    "min": p.min,
                    "max": p.max,
                    "default": p.default,
                })
            })
            .collect();
        let report = serde_json::json!({ "effect": kind.name(), "params": list });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", kind.name());
    println!("{}", "=".repeat(kind.name().len()));
    println!();
    println!("  {:16}  {:10}  {}", "Name", "Default", "Range");
    println!("  {:16}  {:10}  {}", "----", "-------", "-----");
    for p in params(kind) {
        println!(
            "  {:16}  {:10}  {} - {}",
            p.name,
            format_value(p.default),
            format_value(p.min),
            format_value(p.max)
        );
    }
    println!();
    println!("Example scene entry:");
    println!();
    let first = params(kind).next();
    match first {
        Some(p) => println!(
            "  effects = [{{ type = \"{}\", params = {{ {} = {} }} }}]",
            kind.name(),
            p.name,
            format_value(p.default)
        ),
        None => println!("  effects = [{{ type = \"{}\" }}]", kind.name()),
    }
    Ok(())
}

fn print_overview(mixer: &MixerConfig) {
    println!("Effects");
    println!("=======");
    println!();
    for kind in DspKind::ALL {
        let names: Vec<_> = params(kind).map(|p| p.name).collect();
        println!("  {:12}  {}", kind.name(), names.join(", "));
    }
    println!();
    println!("Backends: {}", BACKEND_NAMES.join(", "));
    println!();
    println!(
        "Default mixer: {} Hz, {} track(s), {}-bit, {} frames per period, backend {}",
        mixer.sample_rate,
        mixer.tracks,
        mixer.format.bits(),
        mixer.period_frames(),
        mixer.backend
    );
    println!("  from {}", aural_config::mixer_config_path().display());
}

fn print_scene(name: &str, scene: &SceneConfig) -> anyhow::Result<()> {
    let mixer = &scene.mixer;
    println!("Scene:       {}", name);
    println!(
        "Mixer:       {} Hz, {} track(s), {}-bit",
        mixer.sample_rate,
        mixer.tracks,
        mixer.format.bits()
    );
    println!(
        "Timing:      {} frames per period, matrices every {} period(s)",
        mixer.period_frames(),
        mixer.update_interval
    );
    println!(
        "Output:      {}{}",
        mixer.backend,
        mixer
            .device
            .as_deref()
            .map(|d| format!(" ({d})"))
            .unwrap_or_default()
    );
    println!();
    println!("mixer{}", effect_list(&scene.effects));
    print_children(scene, None, 1)?;
    Ok(())
}

fn print_children(scene: &SceneConfig, parent: Option<&str>, depth: usize) -> anyhow::Result<()> {
    let indent = "  ".repeat(depth);
    for index in scene.frame_order()? {
        let frame = &scene.frames[index];
        if frame.parent.as_deref() != parent {
            continue;
        }
        println!(
            "{indent}[frame] {}{}{}",
            frame.name,
            placement(&frame.placement),
            effect_list(&frame.effects)
        );
        print_children(scene, Some(&frame.name), depth + 1)?;
    }
    for sensor in &scene.sensors {
        if sensor.parent.as_deref() != parent {
            continue;
        }
        let pitch = if sensor.pitch != 1.0 {
            format!(" pitch {}", sensor.pitch)
        } else {
            String::new()
        };
        println!(
            "{indent}[sensor] {}{}{}{}",
            sensor.name,
            placement(&sensor.placement),
            pitch,
            effect_list(&sensor.effects)
        );
    }
    Ok(())
}

fn placement(p: &Placement) -> String {
    let mut out = format!(" at ({}, {}, {})", p.position[0], p.position[1], p.position[2]);
    if p.relative {
        out.push_str(" relative");
    }
    if p.gain != 1.0 {
        out.push_str(&format!(" gain {:.1} dB", common::to_db(p.gain)));
    }
    out
}

fn effect_list(effects: &[EffectConfig]) -> String {
    if effects.is_empty() {
        return String::new();
    }
    let names: Vec<_> = effects
        .iter()
        .map(|e| {
            if e.enabled {
                e.kind.clone()
            } else {
                format!("!{}", e.kind)
            }
        })
        .collect();
    format!(" [{}]", names.join(", "))
}
