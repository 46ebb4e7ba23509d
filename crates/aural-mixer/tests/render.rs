//! End-to-end render tests: sensors through frames into the device mixer.

use std::f32::consts::{FRAC_1_SQRT_2, PI};
use std::sync::Arc;

use aural_effects::{Dsp, EffectType, FilterType};
use aural_mixer::{Graph, Mixer, MixerSettings, NodeId, SensorFeed, StateCommand};
use glam::{Mat4, Vec3};

const RATE: f32 = 48000.0;
const PERIOD: usize = 256;

fn mixer(update_interval: u32) -> Mixer {
    let mixer = Mixer::new(MixerSettings {
        sample_rate: RATE,
        tracks: 2,
        period_frames: PERIOD,
        update_interval,
    });
    mixer.play().unwrap();
    mixer
}

fn start(graph: &mut Graph, id: NodeId) {
    graph.set_state(id, StateCommand::Initialize).unwrap();
    graph.set_state(id, StateCommand::Play).unwrap();
}

fn voice(graph: &mut Graph, parent: NodeId, rate: f32) -> (NodeId, Arc<SensorFeed>) {
    let (id, feed) = graph.add_sensor("voice", rate, 1, 1 << 14).unwrap();
    graph.register(parent, id).unwrap();
    start(graph, id);
    (id, feed)
}

fn render(mixer: &mut Mixer) -> Vec<f32> {
    let mut out = vec![0.0; PERIOD * 2];
    assert_eq!(mixer.render(&mut out), PERIOD);
    out
}

fn left(out: &[f32]) -> impl Iterator<Item = f32> + '_ {
    out.iter().step_by(2).copied()
}

#[test]
fn sine_passes_through_frame_unchanged_but_panned() {
    let mut mixer = mixer(4);
    let handle = mixer.handle();
    let feed = {
        let mut g = handle.lock();
        let frame = g.add_frame("room");
        g.register(handle.root(), frame).unwrap();
        start(&mut g, frame);
        voice(&mut g, frame, RATE).1
    };

    let sine: Vec<f32> = (0..4096)
        .map(|i| (2.0 * PI * 440.0 * i as f32 / RATE).sin() * 0.5)
        .collect();
    feed.push(&sine);

    let mut rendered = Vec::new();
    for _ in 0..4 {
        rendered.extend(render(&mut mixer));
    }
    for (n, pair) in rendered.chunks_exact(2).enumerate() {
        let expected = sine[n] * FRAC_1_SQRT_2;
        assert!((pair[0] - expected).abs() < 1e-5, "frame {n}: {} vs {expected}", pair[0]);
        assert_eq!(pair[0], pair[1]);
    }
}

#[test]
fn distance_attenuates_by_default_curve() {
    let mut mixer = mixer(4);
    let handle = mixer.handle();
    let feed = {
        let mut g = handle.lock();
        let (id, feed) = voice(&mut g, handle.root(), RATE);
        g.set_matrix(id, Mat4::from_translation(Vec3::new(0.0, 0.0, -2.0))).unwrap();
        feed
    };
    feed.push(&[0.5; 2048]);

    let out = render(&mut mixer);
    for s in left(&out) {
        assert!((s - 0.5 * 0.5 * FRAC_1_SQRT_2).abs() < 1e-5);
    }
}

#[test]
fn disabled_distance_filter_turns_attenuation_off() {
    let mut mixer = mixer(1);
    let handle = mixer.handle();
    let feed = {
        let mut g = handle.lock();
        let (id, feed) = voice(&mut g, handle.root(), RATE);
        g.set_matrix(id, Mat4::from_translation(Vec3::new(0.0, 0.0, -8.0))).unwrap();
        g.set_dsp(id, Dsp::filter(FilterType::Distance)).unwrap();
        feed
    };
    feed.push(&[0.5; 2048]);

    let out = render(&mut mixer);
    assert!(left(&out).all(|s| (s - 0.5 * FRAC_1_SQRT_2).abs() < 1e-5));
}

#[test]
fn source_facing_away_is_heard_through_its_cone() {
    let mut mixer = mixer(1);
    let handle = mixer.handle();
    let placed = Mat4::from_translation(Vec3::new(0.0, 0.0, -2.0));
    let (id, feed) = {
        let mut g = handle.lock();
        let (id, feed) = voice(&mut g, handle.root(), RATE);
        // Two units ahead of the listener, facing the same way it does.
        g.set_matrix(id, placed).unwrap();
        let mut cone = Dsp::filter(FilterType::Directional);
        cone.set_slot(0, [90.0, 180.0, 0.25, 1.0]);
        cone.set_enabled(true);
        g.set_dsp(id, cone).unwrap();
        (id, feed)
    };
    feed.push(&[0.5; 4096]);

    let open = 0.5 * 0.5 * FRAC_1_SQRT_2;
    let out = render(&mut mixer);
    assert!(left(&out).all(|s| (s - open * 0.25).abs() < 1e-5));

    handle
        .lock()
        .set_matrix(id, placed * Mat4::from_rotation_y(PI))
        .unwrap();
    let out = render(&mut mixer);
    assert!(left(&out).all(|s| (s - open).abs() < 1e-5));
}

#[test]
fn stopped_sensor_is_skipped_and_keeps_its_input() {
    let mut mixer = mixer(4);
    let handle = mixer.handle();
    let (id, feed) = {
        let mut g = handle.lock();
        voice(&mut g, handle.root(), RATE)
    };
    feed.push(&[0.5; 1024]);
    handle.lock().set_state(id, StateCommand::Stop).unwrap();

    let out = render(&mut mixer);
    assert!(out.iter().all(|&s| s == 0.0));
    assert_eq!(feed.available(), 1024);

    handle.lock().set_state(id, StateCommand::Play).unwrap();
    let out = render(&mut mixer);
    assert!(out.iter().any(|&s| s != 0.0));
    // One frame stays queued as interpolation lookback.
    assert_eq!(feed.available(), 1024 - PERIOD + 1);
}

#[test]
fn suspended_frame_silences_its_subtree() {
    let mut mixer = mixer(4);
    let handle = mixer.handle();
    let (frame, feed) = {
        let mut g = handle.lock();
        let frame = g.add_frame("room");
        g.register(handle.root(), frame).unwrap();
        start(&mut g, frame);
        (frame, voice(&mut g, frame, RATE).1)
    };
    feed.push(&[0.5; 1024]);
    handle.lock().set_state(frame, StateCommand::Suspend).unwrap();

    let out = render(&mut mixer);
    assert!(out.iter().all(|&s| s == 0.0));
    assert_eq!(feed.available(), 1024);
}

#[test]
fn matrix_changes_wait_for_update_pass() {
    let mut mixer = mixer(1000);
    let handle = mixer.handle();
    let (id, feed) = {
        let mut g = handle.lock();
        voice(&mut g, handle.root(), RATE)
    };
    feed.push(&[1.0; 4096]);
    let near = render(&mut mixer)[0];

    handle
        .lock()
        .set_matrix(id, Mat4::from_translation(Vec3::new(0.0, 0.0, -4.0)))
        .unwrap();
    assert_eq!(render(&mut mixer)[0], near, "no update pass yet");

    handle.lock().set_state(id, StateCommand::Update).unwrap();
    let far = render(&mut mixer)[0];
    assert!((far - near * 0.25).abs() < 1e-5);
}

#[test]
fn relative_sensor_is_heard_from_its_frame() {
    let mut mixer = mixer(1);
    let handle = mixer.handle();
    let feed = {
        let mut g = handle.lock();
        let frame = g.add_frame("far room");
        g.set_matrix(frame, Mat4::from_translation(Vec3::new(0.0, 0.0, -10.0))).unwrap();
        g.register(handle.root(), frame).unwrap();
        start(&mut g, frame);
        let (id, feed) = voice(&mut g, frame, RATE);
        g.set_relative(id, true).unwrap();
        feed
    };
    feed.push(&[1.0; 1024]);

    let out = render(&mut mixer);
    // Centred in its frame, the frame itself 10 units away.
    assert!(left(&out).all(|s| (s - FRAC_1_SQRT_2 * 0.1).abs() < 1e-5));
}

#[test]
fn half_rate_sensor_is_upsampled() {
    let mut mixer = mixer(4);
    let handle = mixer.handle();
    let feed = {
        let mut g = handle.lock();
        voice(&mut g, handle.root(), RATE / 2.0).1
    };
    feed.push(&[0.5; 1024]);

    let out = render(&mut mixer);
    assert!(left(&out).all(|s| (s - 0.5 * FRAC_1_SQRT_2).abs() < 1e-5));
    let consumed = 1024 - feed.available();
    assert!((PERIOD / 2 - 1..=PERIOD / 2 + 1).contains(&consumed), "consumed {consumed}");
}

#[test]
fn starved_sensor_renders_silence_and_counts_underrun() {
    let mut mixer = mixer(4);
    let handle = mixer.handle();
    let feed = {
        let mut g = handle.lock();
        voice(&mut g, handle.root(), RATE).1
    };
    feed.push(&[0.5; 16]);

    let out = render(&mut mixer);
    assert!(out.iter().all(|&s| s == 0.0));
    assert_eq!(feed.underruns(), 1);
}

#[test]
fn gain_and_volume_scale_the_mix() {
    let mut mixer = mixer(4);
    let handle = mixer.handle();
    let feed = {
        let mut g = handle.lock();
        let (id, feed) = voice(&mut g, handle.root(), RATE);
        g.set_gain(id, 0.5).unwrap();
        let mut volume = Dsp::filter(FilterType::Volume);
        volume.set_named("gain", 0.5);
        volume.set_enabled(true);
        g.set_dsp(handle.root(), volume).unwrap();
        feed
    };
    feed.push(&[1.0; 1024]);

    let out = render(&mut mixer);
    assert!(left(&out).all(|s| (s - 0.25 * FRAC_1_SQRT_2).abs() < 1e-5));
}

#[test]
fn echo_tail_survives_stop_and_restart() {
    let mut mixer = mixer(4);
    let handle = mixer.handle();
    let (id, feed) = {
        let mut g = handle.lock();
        let (id, feed) = voice(&mut g, handle.root(), RATE);
        let mut echo = Dsp::effect(EffectType::Echo);
        echo.set_named("offset", 0.001);
        echo.set_named("feedback", 0.5);
        echo.set_enabled(true);
        g.set_dsp(id, echo).unwrap();
        (id, feed)
    };
    feed.push(&[1.0; PERIOD]);
    feed.push(&[0.0; 4 * PERIOD]);
    render(&mut mixer);

    handle.lock().set_state(id, StateCommand::Stop).unwrap();
    render(&mut mixer);
    handle.lock().set_state(id, StateCommand::Play).unwrap();
    let retained = render(&mut mixer);
    assert!(retained.iter().any(|&s| s.abs() > 1e-6), "history kept across stop");

    {
        let mut g = handle.lock();
        g.set_state(id, StateCommand::Stop).unwrap();
        g.set_state(id, StateCommand::Initialize).unwrap();
        g.set_state(id, StateCommand::Play).unwrap();
    }
    let cleared = render(&mut mixer);
    assert!(cleared.iter().all(|&s| s.abs() < 1e-6), "initialize clears history");
}

#[test]
fn removed_nodes_stop_contributing() {
    let mut mixer = mixer(4);
    let handle = mixer.handle();
    let (id, feed) = {
        let mut g = handle.lock();
        voice(&mut g, handle.root(), RATE)
    };
    feed.push(&[0.5; 2048]);
    assert!(render(&mut mixer).iter().any(|&s| s != 0.0));

    {
        let mut g = handle.lock();
        g.deregister(handle.root(), id).unwrap();
        g.remove_node(id).unwrap();
    }
    assert!(render(&mut mixer).iter().all(|&s| s == 0.0));
}
