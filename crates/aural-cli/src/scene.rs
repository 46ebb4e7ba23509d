//! Scene assembly: graph nodes from a [`SceneConfig`] plus the sources that
//! keep their sensors fed.

use std::collections::HashMap;
use std::f32::consts::TAU;
use std::sync::Arc;

use anyhow::Context;
use aural_config::{Placement, SceneConfig, SensorConfig, SourceConfig, to_dsps};
use aural_effects::Dsp;
use aural_mixer::{Graph, MixerHandle, MixerSettings, NodeId, SensorFeed, StateCommand};

/// Render periods of source audio each sensor queue holds.
const QUEUE_PERIODS: usize = 8;

/// Decoded audio of one sensor and the queue it is pushed into.
pub struct Source {
    name: String,
    samples: Vec<f32>,
    tracks: usize,
    sample_rate: u32,
    looped: bool,
    cursor: usize,
    tail: usize,
    feed: Arc<SensorFeed>,
}

impl Source {
    /// Sensor name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Length of the audio in seconds, without the silent tail.
    pub fn duration_secs(&self) -> f64 {
        (self.frames() - self.tail) as f64 / f64::from(self.sample_rate)
    }

    /// Restarts at the end.
    pub fn is_looped(&self) -> bool {
        self.looped
    }

    /// Queue shared with the render thread.
    pub fn feed(&self) -> &Arc<SensorFeed> {
        &self.feed
    }

    fn frames(&self) -> usize {
        self.samples.len() / self.tracks
    }

    /// Pushes as many frames as the queue accepts; returns the frame count.
    pub fn pump(&mut self) -> usize {
        let total = self.frames();
        if total == 0 {
            return 0;
        }
        let mut pushed = 0;
        loop {
            if self.cursor >= total {
                if !self.looped {
                    break;
                }
                self.cursor = 0;
            }
            let accepted = self.feed.push(&self.samples[self.cursor * self.tracks..]);
            self.cursor += accepted;
            pushed += accepted;
            if self.cursor < total {
                break;
            }
        }
        pushed
    }

    /// `true` once every audible frame has been rendered.
    pub fn is_drained(&self) -> bool {
        !self.looped && self.cursor >= self.frames() && self.feed.available() <= self.tail
    }
}

/// A scene's nodes inside a running mixer.
pub struct LoadedScene {
    nodes: Vec<(String, NodeId)>,
    sources: Vec<Source>,
}

impl LoadedScene {
    /// Decodes all sources, then creates, registers and starts every node.
    ///
    /// Frames are added parents first; anything without a parent hangs off
    /// the device mixer, which also receives the scene's root effects.
    pub fn build(
        scene: &SceneConfig,
        handle: &MixerHandle,
        settings: &MixerSettings,
    ) -> anyhow::Result<Self> {
        let clips = scene
            .sensors
            .iter()
            .map(|sensor| {
                decode(&sensor.source).with_context(|| format!("sensor '{}'", sensor.name))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let order = scene.frame_order()?;
        let root_effects = to_dsps("effects", &scene.effects)?;

        let root = handle.root();
        let mut graph = handle.lock();
        for dsp in root_effects {
            graph.set_dsp(root, dsp)?;
        }

        let mut nodes = Vec::with_capacity(scene.node_count());
        let mut frames: HashMap<&str, NodeId> = HashMap::new();
        for index in order {
            let frame = &scene.frames[index];
            let id = graph.add_frame(frame.name.as_str());
            let dsps = to_dsps(&format!("frames.{}", frame.name), &frame.effects)?;
            let parent = parent_id(&frames, frame.parent.as_deref(), root)?;
            attach(&mut graph, id, parent, &frame.placement, dsps)
                .with_context(|| format!("frame '{}'", frame.name))?;
            frames.insert(frame.name.as_str(), id);
            nodes.push((frame.name.clone(), id));
        }

        let mut sources = Vec::with_capacity(scene.sensors.len());
        for (sensor, clip) in scene.sensors.iter().zip(clips) {
            let (id, source) = add_sensor(&mut graph, sensor, clip, &frames, root, settings)
                .with_context(|| format!("sensor '{}'", sensor.name))?;
            nodes.push((sensor.name.clone(), id));
            sources.push(source);
        }
        drop(graph);

        tracing::info!(
            frames = scene.frames.len(),
            sensors = sources.len(),
            "scene loaded"
        );
        Ok(Self { nodes, sources })
    }

    /// Node ids by scene name, frames first.
    pub fn nodes(&self) -> &[(String, NodeId)] {
        &self.nodes
    }

    /// Sensor sources in scene order.
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Tops up every sensor queue.
    pub fn pump(&mut self) -> usize {
        self.sources.iter_mut().map(Source::pump).sum()
    }

    /// `true` when no source is looped and all have been rendered.
    pub fn is_drained(&self) -> bool {
        self.sources.iter().all(Source::is_drained)
    }

    /// Length of the longest non-looped source, or `None` if any source
    /// loops forever.
    pub fn duration_secs(&self) -> Option<f64> {
        if self.sources.iter().any(Source::is_looped) {
            return None;
        }
        Some(
            self.sources
                .iter()
                .map(Source::duration_secs)
                .fold(0.0, f64::max),
        )
    }

    /// Periods the sensors rendered as silence for lack of input.
    pub fn underruns(&self) -> u64 {
        self.sources.iter().map(|s| s.feed.underruns()).sum()
    }
}

struct Clip {
    samples: Vec<f32>,
    tracks: usize,
    sample_rate: u32,
}

fn decode(source: &SourceConfig) -> anyhow::Result<Clip> {
    match source {
        SourceConfig::Wav { path, .. } => {
            let clip = aural_io::read_wav(path)
                .with_context(|| format!("reading {}", path.display()))?;
            Ok(Clip {
                tracks: usize::from(clip.channels.max(1)),
                sample_rate: clip.sample_rate,
                samples: clip.samples,
            })
        }
        SourceConfig::Tone {
            frequency,
            amplitude,
            duration,
            sample_rate,
        } => Ok(Clip {
            samples: tone(*frequency, *amplitude, *duration, *sample_rate),
            tracks: 1,
            sample_rate: *sample_rate,
        }),
    }
}

/// Mono sine, starting at zero phase.
fn tone(frequency: f32, amplitude: f32, duration: f32, sample_rate: u32) -> Vec<f32> {
    let rate = sample_rate as f32;
    let frames = (duration * rate).round() as usize;
    let step = TAU * frequency / rate;
    (0..frames)
        .map(|n| amplitude * ((n as f32 * step) % TAU).sin())
        .collect()
}

fn parent_id(
    frames: &HashMap<&str, NodeId>,
    parent: Option<&str>,
    root: NodeId,
) -> anyhow::Result<NodeId> {
    match parent {
        None => Ok(root),
        Some(name) => frames
            .get(name)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("parent frame '{name}' was not created first")),
    }
}

fn attach(
    graph: &mut Graph,
    id: NodeId,
    parent: NodeId,
    placement: &Placement,
    dsps: Vec<Dsp>,
) -> anyhow::Result<()> {
    graph.set_matrix(id, placement.transform())?;
    graph.set_velocity(id, placement.velocity())?;
    graph.set_relative(id, placement.relative)?;
    graph.set_gain(id, placement.gain)?;
    for dsp in dsps {
        graph.set_dsp(id, dsp)?;
    }
    graph.register(parent, id)?;
    graph.set_state(id, StateCommand::Initialize)?;
    graph.set_state(id, StateCommand::Play)?;
    Ok(())
}

fn add_sensor(
    graph: &mut Graph,
    sensor: &SensorConfig,
    clip: Clip,
    frames: &HashMap<&str, NodeId>,
    root: NodeId,
    settings: &MixerSettings,
) -> anyhow::Result<(NodeId, Source)> {
    let dsps = SceneConfig::sensor_dsps(sensor)?;
    let parent = parent_id(frames, sensor.parent.as_deref(), root)?;

    // Source frames consumed per render period at the highest pitch.
    let ratio = clip.sample_rate as f32 / settings.sample_rate * sensor.pitch.max(1.0);
    let per_period = (settings.period_frames as f32 * ratio).ceil() as usize + 8;
    let capacity = (per_period * QUEUE_PERIODS).max(4096);

    let (id, feed) = graph.add_sensor(
        sensor.name.as_str(),
        clip.sample_rate as f32,
        clip.tracks,
        capacity,
    )?;
    attach(graph, id, parent, &sensor.placement, dsps)?;

    let looped = matches!(sensor.source, SourceConfig::Wav { looped: true, .. });
    let mut samples = clip.samples;
    // Silence after the last frame so a partial final period still renders.
    let tail = if looped { 0 } else { per_period };
    samples.resize(samples.len() + tail * clip.tracks, 0.0);

    tracing::debug!(
        sensor = %sensor.name,
        node = %id,
        rate = clip.sample_rate,
        tracks = clip.tracks,
        capacity,
        "sensor created"
    );

    let source = Source {
        name: sensor.name.clone(),
        samples,
        tracks: clip.tracks,
        sample_rate: clip.sample_rate,
        looped,
        cursor: 0,
        tail,
        feed,
    };
    Ok((id, source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aural_mixer::Mixer;

    const SCENE: &str = r#"
        [mixer]
        refresh_rate = 100.0
        tracks = 2

        [[frames]]
        name = "room"
        position = [0.0, 0.0, -2.0]

        [[frames]]
        name = "corner"
        parent = "room"
        position = [1.0, 0.0, 0.0]

        [[sensors]]
        name = "beep"
        parent = "corner"
        source = { type = "tone", frequency = 440.0, duration = 0.25 }
    "#;

    fn mixer(scene: &SceneConfig) -> Mixer {
        let mixer = Mixer::new(scene.mixer.settings());
        mixer.play().unwrap();
        mixer
    }

    #[test]
    fn nodes_are_registered_parents_first() {
        let scene = SceneConfig::from_toml(SCENE).unwrap();
        let mixer = mixer(&scene);
        let loaded = LoadedScene::build(&scene, &mixer.handle(), mixer.settings()).unwrap();

        let names: Vec<_> = loaded.nodes().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["room", "corner", "beep"]);

        let handle = mixer.handle();
        let graph = handle.lock();
        let (_, room) = loaded.nodes()[0];
        let (_, corner) = loaded.nodes()[1];
        let (_, beep) = loaded.nodes()[2];
        assert_eq!(graph.parent(room), Some(mixer.root()));
        assert_eq!(graph.parent(corner), Some(room));
        assert_eq!(graph.parent(beep), Some(corner));
        assert!(graph.state(beep).unwrap().is_playing());
    }

    #[test]
    fn tone_renders_then_drains() {
        let scene = SceneConfig::from_toml(SCENE).unwrap();
        let mut mixer = mixer(&scene);
        let mut loaded = LoadedScene::build(&scene, &mixer.handle(), mixer.settings()).unwrap();
        assert!((loaded.duration_secs().unwrap() - 0.25).abs() < 1e-6);

        let mut out = vec![0.0; mixer.settings().period_samples()];
        let mut peak = 0.0f32;
        for _ in 0..60 {
            loaded.pump();
            mixer.render(&mut out);
            peak = out.iter().fold(peak, |p, s| p.max(s.abs()));
            if loaded.is_drained() {
                break;
            }
        }
        assert!(peak > 0.01, "peak {peak}");
        assert!(loaded.is_drained());
    }

    #[test]
    fn looped_sources_have_no_length() {
        let mut scene = SceneConfig::from_toml(SCENE).unwrap();
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("click.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 48000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for n in 0..480 {
            writer.write_sample(if n % 48 == 0 { 16000i16 } else { 0 }).unwrap();
        }
        writer.finalize().unwrap();
        scene.sensors[0].source = SourceConfig::Wav { path, looped: true };

        let mixer = mixer(&scene);
        let mut loaded = LoadedScene::build(&scene, &mixer.handle(), mixer.settings()).unwrap();
        assert_eq!(loaded.duration_secs(), None);
        let pushed = loaded.pump();
        assert!(pushed > 480, "looping source fills the queue, got {pushed}");
        assert!(!loaded.is_drained());
    }

    #[test]
    fn missing_wav_names_the_sensor() {
        let mut scene = SceneConfig::from_toml(SCENE).unwrap();
        scene.sensors[0].source = SourceConfig::Wav {
            path: "/nonexistent/aural/beep.wav".into(),
            looped: false,
        };
        let mixer = mixer(&scene);
        let err = LoadedScene::build(&scene, &mixer.handle(), mixer.settings())
            .err()
            .unwrap();
        assert!(format!("{err:#}").contains("sensor 'beep'"));
    }

    #[test]
    fn tone_starts_at_zero_phase() {
        let samples = tone(1000.0, 0.5, 0.01, 48000);
        assert_eq!(samples.len(), 480);
        assert_eq!(samples[0], 0.0);
        assert!(samples.iter().all(|s| s.abs() <= 0.5));
    }
}
