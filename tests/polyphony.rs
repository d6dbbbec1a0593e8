use crossbeam_channel::{unbounded, Receiver};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use keysynth::{
    audio::envelope::EnvelopeParam,
    dsp::Port,
    graph::Endpoint,
    input::router::{InputRouter, Instrument},
    types::events::{ChannelSink, SynthEvent},
    Synth, SynthError, Waveform,
};

fn synth_with_events(voices: usize) -> (Synth, Receiver<SynthEvent>) {
    let (tx, rx) = unbounded();
    let synth = Synth::with_options(44100.0, voices, Arc::new(ChannelSink::new(tx))).unwrap();
    (synth, rx)
}

fn drain(rx: &Receiver<SynthEvent>) -> Vec<SynthEvent> {
    rx.try_iter().collect()
}

fn oscillator_amplitude(synth: &Synth, voice: usize) -> f64 {
    let osc = synth.voice(voice).unwrap().oscillator();
    synth
        .graph()
        .lock()
        .get(Endpoint::new(osc, Port::Amplitude))
        .unwrap()
}

#[test]
fn fresh_pool_is_idle_with_voice_defaults() {
    let (synth, _rx) = synth_with_events(8);
    for voice in synth.voices() {
        assert!(!voice.is_active());
        assert_eq!(voice.current_note(), None);
        assert_eq!(voice.oscillator_type(), Waveform::Sine);
        let env = voice.envelope();
        assert_eq!([env.attack(), env.decay(), env.sustain(), env.release()], [0.05, 0.1, 0.7, 0.2]);
    }
}

#[test]
fn envelope_setters_round_trip_and_reject() {
    let (mut synth, _rx) = synth_with_events(1);
    let env = synth.voice_mut(0).unwrap().envelope_mut();

    for v in [0.0, 0.001, 2.5, 9.9999, 10.0] {
        env.set_attack(v).unwrap();
        env.set_sustain(v).unwrap();
        assert!((env.attack() - v).abs() < 1e-4);
        assert!((env.sustain() - v).abs() < 1e-4);
    }

    env.set_release(1.0).unwrap();
    for bad in [-0.1, 10.1, f64::NAN, f64::INFINITY] {
        assert!(matches!(
            env.set_release(bad),
            Err(SynthError::InvalidParameter { name: "release", .. })
        ));
        assert_eq!(env.release(), 1.0);
    }
}

#[test]
fn key_round_trip_frees_voice_before_silence() {
    let (synth, _rx) = synth_with_events(8);
    let mut instrument = Instrument::new(synth, InputRouter::default());

    let voice = instrument.key_pressed(b'J' as i32).unwrap().unwrap();
    assert_eq!(instrument.synth.voice(voice).unwrap().current_note(), Some(71));
    instrument.key_released(b'J' as i32).unwrap();

    assert!(!instrument.synth.voice(voice).unwrap().is_active());
    assert!(instrument.router.active_notes().is_empty());
    assert_eq!(instrument.synth.allocate(), Some(voice));
}

#[test]
fn release_silences_oscillator_later() {
    let (mut synth, rx) = synth_with_events(2);
    synth
        .voice_mut(0)
        .unwrap()
        .envelope_mut()
        .set_release(0.02)
        .unwrap();
    synth.note_on(0, 60, 0.7).unwrap();
    synth.note_off(0).unwrap();

    let silenced = std::iter::from_fn(|| rx.recv_timeout(Duration::from_secs(2)).ok())
        .find(|e| matches!(e, SynthEvent::VoiceSilenced { .. } | SynthEvent::SilenceSkipped { .. }));
    assert_eq!(silenced, Some(SynthEvent::VoiceSilenced { voice: 0 }));
    assert_eq!(oscillator_amplitude(&synth, 0), 0.0);
}

#[test]
fn reallocated_voice_is_not_silenced() {
    let (mut synth, rx) = synth_with_events(1);
    synth
        .voice_mut(0)
        .unwrap()
        .envelope_mut()
        .set_release(0.05)
        .unwrap();
    synth.note_on(0, 60, 0.7).unwrap();
    synth.note_off(0).unwrap();
    synth.note_on(0, 64, 0.7).unwrap();

    std::thread::sleep(Duration::from_millis(150));
    let events = drain(&rx);
    assert!(!events.contains(&SynthEvent::VoiceSilenced { voice: 0 }));
    assert_eq!(oscillator_amplitude(&synth, 0), 1.0);
    assert_eq!(synth.voice(0).unwrap().current_note(), Some(64));
}

#[test]
fn hot_swap_keeps_chain_connected() {
    let (mut synth, rx) = synth_with_events(2);
    synth.note_on(1, 72, 0.9).unwrap();
    drain(&rx);

    synth.voice_mut(1).unwrap().set_oscillator_type(Waveform::Sawtooth).unwrap();

    let voice = synth.voice(1).unwrap();
    {
        let g = synth.graph().lock();
        for edge in voice.chain_edges(false) {
            assert!(g.is_connected(edge.from, edge.to), "missing {:?}", edge);
        }
        let osc = voice.oscillator();
        assert_eq!(g.get(Endpoint::new(osc, Port::Frequency)).unwrap(), 440.0);
    }

    let events = drain(&rx);
    assert!(events.contains(&SynthEvent::OscillatorSwapped {
        voice: 1,
        from: Waveform::Sine,
        to: Waveform::Sawtooth,
    }));
    assert!(events.iter().all(|e| e.voice() == Some(1)));

    // Still audible after the swap
    let mut out = vec![0.0f32; 2048];
    synth.render(&mut out, 2);
    assert!(out.iter().any(|s| s.abs() > 1e-4));
}

#[test]
fn pressing_held_key_allocates_once() {
    let (synth, _rx) = synth_with_events(8);
    let mut instrument = Instrument::new(synth, InputRouter::default());
    instrument.key_pressed(b'A' as i32).unwrap();
    instrument.key_pressed(b'A' as i32).unwrap();
    instrument.key_pressed(b'A' as i32).unwrap();
    assert_eq!(instrument.synth.active_count(), 1);
    assert_eq!(instrument.key_pressed(b'Q' as i32), Ok(None));
    assert_eq!(instrument.synth.active_count(), 1);
}

#[test]
fn full_pool_drops_press_and_reports_it() {
    let (synth, rx) = synth_with_events(2);
    let mut instrument = Instrument::new(synth, InputRouter::default());
    instrument.key_pressed(b'A' as i32).unwrap();
    instrument.key_pressed(b'S' as i32).unwrap();
    assert_eq!(instrument.key_pressed(b'D' as i32), Ok(None));

    let events = drain(&rx);
    assert!(events.contains(&SynthEvent::NoteDropped {
        key: b'D' as i32,
        note: 64,
    }));
}

#[test]
fn bulk_envelope_edit_refreshes_and_retriggers() {
    let (mut synth, rx) = synth_with_events(3);
    synth.note_on(1, 60, 0.5).unwrap();
    drain(&rx);

    synth.set_envelope_param_all(EnvelopeParam::Decay, 0.3).unwrap();

    let events = drain(&rx);
    let refreshed = events
        .iter()
        .filter(|e| matches!(e, SynthEvent::ChainRefreshed { .. }))
        .count();
    assert_eq!(refreshed, 3);
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, SynthEvent::Retriggered { .. }))
            .collect::<Vec<_>>(),
        vec![&SynthEvent::Retriggered { voice: 1 }]
    );

    let voice = synth.voice(1).unwrap();
    let g = synth.graph().lock();
    for edge in voice.chain_edges(true) {
        assert!(g.is_connected(edge.from, edge.to));
    }
}

#[test]
fn rewiring_while_rendering_never_breaks_a_block() {
    let (mut synth, _rx) = synth_with_events(8);
    for voice in 0..4 {
        synth.note_on(voice, 60 + voice as i32, 0.8).unwrap();
    }

    let mut engine = synth.engine();
    let done = Arc::new(AtomicBool::new(false));
    let renderer = {
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut out = vec![0.0f32; 256 * 2];
            let (mut blocks, mut nonfinite) = (0usize, 0usize);
            while !done.load(Ordering::Acquire) || blocks == 0 {
                engine.process(&mut out, 2);
                nonfinite += out.iter().filter(|s| !s.is_finite()).count();
                blocks += 1;
            }
            (blocks, nonfinite)
        })
    };

    for i in 0..50 {
        let waveform = Waveform::ALL[i % Waveform::ALL.len()];
        synth.set_oscillator_type_all(waveform).unwrap();
        synth
            .set_envelope_param_all(EnvelopeParam::Decay, 0.1 + (i % 5) as f64 * 0.05)
            .unwrap();
    }
    done.store(true, Ordering::Release);

    let (blocks, nonfinite) = renderer.join().unwrap();
    assert!(blocks > 0);
    assert_eq!(nonfinite, 0);

    let g = synth.graph().lock();
    for voice in synth.voices() {
        for edge in voice.chain_edges(true) {
            assert!(g.is_connected(edge.from, edge.to), "voice {} missing {:?}", voice.id(), edge);
        }
    }
}
