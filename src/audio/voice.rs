use std::{sync::Arc, time::Duration};

use super::{
    envelope::EnvelopeControl,
    filter::FilterControl,
    scheduler::{SchedulerHandle, SilenceTarget},
};
use crate::dsp::{mix::Summer, oscillator::Oscillator, Port};
use crate::error::{check_range, Result};
use crate::graph::{Edge, Endpoint, SharedGraph, UnitGraph, UnitId};
use crate::types::{
    events::{EventSink, SynthEvent},
    note::{midi_note_to_frequency, MAX_NOTE},
    waveform::Waveform,
};

/// Stable index into the voice pool
pub type VoiceId = usize;

/// Voice state for tracking and allocation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VoiceState {
    Idle,
    Active { note: u8 },
}

/// Single synthesizer voice
/// Signal chain: Oscillator → Filter → Mixer → output bus (both channels),
/// with the envelope driving the oscillator amplitude
pub struct Voice {
    id: VoiceId,
    graph: SharedGraph,
    bus: UnitId,
    oscillator: UnitId,
    waveform: Waveform,
    envelope: EnvelopeControl,
    filter: FilterControl,
    mixer: UnitId,
    state: VoiceState,
    target: Arc<SilenceTarget>,
    scheduler: SchedulerHandle,
    events: Arc<dyn EventSink>,
}

impl Voice {
    pub const DEFAULT_ATTACK: f64 = 0.05;
    pub const DEFAULT_DECAY: f64 = 0.1;
    pub const DEFAULT_SUSTAIN: f64 = 0.7;
    pub const DEFAULT_RELEASE: f64 = 0.2;
    pub const DEFAULT_CUTOFF: f64 = 2000.0;
    pub const DEFAULT_RESONANCE: f64 = 0.5;
    /// Frequency a freshly swapped-in oscillator starts at
    pub const SWAP_FREQUENCY: f64 = 440.0;

    /// Build the voice's units in `graph` and wire them into `bus`
    pub fn new(
        id: VoiceId,
        graph: SharedGraph,
        bus: UnitId,
        scheduler: SchedulerHandle,
        events: Arc<dyn EventSink>,
    ) -> Result<Self> {
        let mut envelope = EnvelopeControl::new(graph.clone())?;
        envelope.set_attack(Self::DEFAULT_ATTACK)?;
        envelope.set_decay(Self::DEFAULT_DECAY)?;
        envelope.set_sustain(Self::DEFAULT_SUSTAIN)?;
        envelope.set_release(Self::DEFAULT_RELEASE)?;

        let mut filter = FilterControl::new(graph.clone())?;
        filter.set_filter_cutoff(Self::DEFAULT_CUTOFF)?;
        filter.set_filter_resonance(Self::DEFAULT_RESONANCE)?;

        let (oscillator, mixer) = {
            let mut g = graph.lock();
            let oscillator = g.add_unit(Box::new(Oscillator::new(Waveform::Sine)));
            // Silent until the chain is wired
            g.set(Endpoint::new(oscillator, Port::Amplitude), 0.0)?;
            let mixer = g.add_unit(Box::new(Summer));
            (oscillator, mixer)
        };
        filter.set_downstream(Endpoint::new(mixer, Port::InputA));

        let voice = Self {
            id,
            graph,
            bus,
            oscillator,
            waveform: Waveform::Sine,
            envelope,
            filter,
            mixer,
            state: VoiceState::Idle,
            target: Arc::new(SilenceTarget::new(id, oscillator)),
            scheduler,
            events,
        };

        let mut log = Vec::new();
        {
            let mut g = voice.graph.lock();
            voice.connect_chain(&mut g, oscillator, false, &mut log)?;
            g.set(Endpoint::new(oscillator, Port::Amplitude), 1.0)?;
            g.start(oscillator)?;
            g.start(mixer)?;
        }
        voice.emit_all(&log);

        Ok(voice)
    }

    /// Start a note. Fails with `OutOfRange` before touching anything if the
    /// note or velocity is invalid.
    pub fn note_on(&mut self, note: i32, velocity: f64) -> Result<()> {
        let note = check_range("note", f64::from(note), (0.0, f64::from(MAX_NOTE)))? as u8;
        let velocity = check_range("velocity", velocity, (0.0, 1.0))?;
        let frequency = midi_note_to_frequency(note);

        {
            let mut g = self.graph.lock();
            // Any silence still pending for the previous note is now stale
            self.target.advance();
            g.set(Endpoint::new(self.oscillator, Port::Frequency), frequency)?;
            g.set(Endpoint::new(self.oscillator, Port::Amplitude), 1.0)?;
        }
        self.scheduler.cancel(self.id);

        self.envelope.trigger(true)?;
        self.envelope.set_velocity(velocity)?;
        self.state = VoiceState::Active { note };

        self.events.emit(&SynthEvent::NoteOn {
            voice: self.id,
            note,
            velocity,
        });
        Ok(())
    }

    /// Release the note. The voice is available again immediately; the
    /// oscillator is silenced once the release time captured here has passed.
    /// Does nothing on an idle voice.
    pub fn note_off(&mut self) -> Result<()> {
        let VoiceState::Active { note } = self.state else {
            return Ok(());
        };

        self.envelope.trigger(false)?;
        let release = self.envelope.release();
        self.scheduler.schedule(
            self.target.clone(),
            self.target.generation(),
            Duration::from_secs_f64(release),
        );
        self.state = VoiceState::Idle;

        self.events.emit(&SynthEvent::NoteOff {
            voice: self.id,
            note,
            release,
        });
        Ok(())
    }

    /// Force a fresh attack on the sounding note
    pub fn retrigger(&mut self) -> Result<()> {
        if !self.is_active() {
            return Ok(());
        }
        self.envelope.trigger(false)?;
        self.envelope.trigger(true)?;
        self.events.emit(&SynthEvent::Retriggered { voice: self.id });
        Ok(())
    }

    /// Replace the oscillator with one of `waveform`, rewiring the chain in a
    /// single critical section on the graph
    pub fn set_oscillator_type(&mut self, waveform: Waveform) -> Result<()> {
        if waveform == self.waveform {
            return Ok(());
        }

        let old = self.oscillator;
        let mut log = Vec::new();
        let new = {
            let mut g = self.graph.lock();
            g.stop(old)?;
            let new = g.add_unit(Box::new(Oscillator::new(waveform)));

            self.disconnect_chain(&mut g, old, &mut log);
            self.connect_chain(&mut g, new, false, &mut log)?;

            g.set(Endpoint::new(new, Port::Frequency), Self::SWAP_FREQUENCY)?;
            g.set(Endpoint::new(new, Port::Amplitude), 1.0)?;
            g.start(new)?;
            g.remove_unit(old)?;
            self.target.set_oscillator(new);
            new
        };

        log.push(SynthEvent::OscillatorSwapped {
            voice: self.id,
            from: self.waveform,
            to: waveform,
        });
        self.oscillator = new;
        self.waveform = waveform;
        self.emit_all(&log);
        Ok(())
    }

    /// Tear down and re-apply the chain without replacing the oscillator.
    /// Also routes the envelope into the filter's amplitude.
    pub fn refresh_signal_chain(&mut self) -> Result<()> {
        let mut log = Vec::new();
        {
            let mut g = self.graph.lock();
            self.disconnect_chain(&mut g, self.oscillator, &mut log);
            self.connect_chain(&mut g, self.oscillator, true, &mut log)?;
        }
        log.push(SynthEvent::ChainRefreshed { voice: self.id });
        self.emit_all(&log);
        Ok(())
    }

    pub fn id(&self) -> VoiceId {
        self.id
    }

    pub fn oscillator_type(&self) -> Waveform {
        self.waveform
    }

    pub fn envelope(&self) -> &EnvelopeControl {
        &self.envelope
    }

    pub fn envelope_mut(&mut self) -> &mut EnvelopeControl {
        &mut self.envelope
    }

    pub fn filter(&self) -> &FilterControl {
        &self.filter
    }

    pub fn filter_mut(&mut self) -> &mut FilterControl {
        &mut self.filter
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    pub fn current_note(&self) -> Option<u8> {
        match self.state {
            VoiceState::Active { note } => Some(note),
            VoiceState::Idle => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, VoiceState::Active { .. })
    }

    /// Oscillator unit currently in the chain
    pub fn oscillator(&self) -> UnitId {
        self.oscillator
    }

    pub fn mixer(&self) -> UnitId {
        self.mixer
    }

    pub fn bus(&self) -> UnitId {
        self.bus
    }

    /// Every edge that makes up a fully wired chain, in connection order
    pub fn chain_edges(&self, with_filter_amplitude: bool) -> Vec<Edge> {
        self.edges_for(self.oscillator, with_filter_amplitude)
    }

    fn edges_for(&self, oscillator: UnitId, with_filter_amplitude: bool) -> Vec<Edge> {
        let env = self.envelope.output();
        let mixer_out = Endpoint::new(self.mixer, Port::Output);

        let mut edges = vec![
            Edge::new(Endpoint::new(oscillator, Port::Output), self.filter.input()),
            Edge::new(env, Endpoint::new(oscillator, Port::Amplitude)),
        ];
        if with_filter_amplitude {
            edges.push(Edge::new(env, self.filter.amplitude_input()));
        }
        edges.extend([
            Edge::new(self.filter.output(), Endpoint::new(self.mixer, Port::InputA)),
            Edge::new(mixer_out, Endpoint::new(self.bus, Port::Left)),
            Edge::new(mixer_out, Endpoint::new(self.bus, Port::Right)),
        ]);
        edges
    }

    /// Remove every chain junction touching `oscillator`. Absent edges are
    /// recorded, never treated as errors.
    fn disconnect_chain(&self, g: &mut UnitGraph, oscillator: UnitId, log: &mut Vec<SynthEvent>) {
        for edge in self.edges_for(oscillator, true) {
            let was_present = g.disconnect_if_present(edge.from, edge.to);
            log.push(SynthEvent::Disconnected {
                voice: self.id,
                edge,
                was_present,
            });
        }
    }

    fn connect_chain(
        &self,
        g: &mut UnitGraph,
        oscillator: UnitId,
        with_filter_amplitude: bool,
        log: &mut Vec<SynthEvent>,
    ) -> Result<()> {
        for edge in self.edges_for(oscillator, with_filter_amplitude) {
            g.connect(edge.from, edge.to)?;
            log.push(SynthEvent::Connected {
                voice: self.id,
                edge,
            });
        }
        Ok(())
    }

    fn emit_all(&self, log: &[SynthEvent]) {
        for event in log {
            self.events.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::scheduler::ReleaseScheduler;
    use crate::dsp::mix::StereoOutput;
    use crate::error::SynthError;
    use crate::types::events::NullSink;

    fn voice() -> (Voice, ReleaseScheduler) {
        let graph = UnitGraph::shared(44100.0);
        let bus = {
            let mut g = graph.lock();
            let bus = g.add_unit(Box::new(StereoOutput));
            g.start(bus).unwrap();
            bus
        };
        let events: Arc<dyn EventSink> = Arc::new(NullSink);
        let scheduler = ReleaseScheduler::new(graph.clone(), events.clone()).unwrap();
        let voice = Voice::new(0, graph, bus, scheduler.handle(), events).unwrap();
        (voice, scheduler)
    }

    fn fully_wired(voice: &Voice, with_filter_amplitude: bool) -> bool {
        let g = voice.graph.lock();
        voice
            .chain_edges(with_filter_amplitude)
            .iter()
            .all(|e| g.is_connected(e.from, e.to))
    }

    #[test]
    fn test_voice_defaults() {
        let (voice, _scheduler) = voice();
        assert!(!voice.is_active());
        assert_eq!(voice.current_note(), None);
        assert_eq!(voice.oscillator_type(), Waveform::Sine);
        assert_eq!(voice.envelope().attack(), 0.05);
        assert_eq!(voice.envelope().decay(), 0.1);
        assert_eq!(voice.envelope().sustain(), 0.7);
        assert_eq!(voice.envelope().release(), 0.2);
        assert_eq!(voice.filter().cutoff(), 2000.0);
        assert!((voice.filter().resonance_target() - 0.15).abs() < 1e-9);
        assert!(fully_wired(&voice, false));
    }

    #[test]
    fn test_note_on_sets_frequency_and_gate() {
        let (mut voice, _scheduler) = voice();
        voice.note_on(69, 0.7).unwrap();

        assert_eq!(voice.current_note(), Some(69));
        assert!(voice.envelope().is_gate_on());
        assert_eq!(voice.envelope().velocity(), 0.7);
        let g = voice.graph.lock();
        let freq = g.get(Endpoint::new(voice.oscillator(), Port::Frequency)).unwrap();
        assert!((freq - 440.0).abs() < 1e-6);
    }

    #[test]
    fn test_note_on_rejects_out_of_range() {
        let (mut voice, _scheduler) = voice();
        assert!(matches!(
            voice.note_on(128, 0.5),
            Err(SynthError::OutOfRange { what: "note", .. })
        ));
        assert!(matches!(
            voice.note_on(-1, 0.5),
            Err(SynthError::OutOfRange { what: "note", .. })
        ));
        assert!(matches!(
            voice.note_on(60, 1.5),
            Err(SynthError::OutOfRange { what: "velocity", .. })
        ));
        assert!(!voice.is_active());
        assert!(!voice.envelope().is_gate_on());
    }

    #[test]
    fn test_note_off_frees_voice_immediately() {
        let (mut voice, _scheduler) = voice();
        voice.note_on(60, 0.7).unwrap();
        voice.note_off().unwrap();
        assert!(!voice.is_active());
        assert_eq!(voice.current_note(), None);
        assert!(!voice.envelope().is_gate_on());
    }

    #[test]
    fn test_note_off_idle_is_noop() {
        let (mut voice, _scheduler) = voice();
        voice.note_off().unwrap();
        voice.note_off().unwrap();
        assert!(!voice.is_active());
    }

    #[test]
    fn test_retrigger_keeps_note() {
        let (mut voice, _scheduler) = voice();
        voice.note_on(64, 1.0).unwrap();
        voice.retrigger().unwrap();
        assert_eq!(voice.current_note(), Some(64));
        assert!(voice.envelope().is_gate_on());
    }

    #[test]
    fn test_hot_swap_rewires_new_oscillator() {
        let (mut voice, _scheduler) = voice();
        voice.note_on(60, 0.7).unwrap();
        let old = voice.oscillator();

        voice.set_oscillator_type(Waveform::Square).unwrap();

        assert_eq!(voice.oscillator_type(), Waveform::Square);
        assert_ne!(voice.oscillator(), old);
        assert!(fully_wired(&voice, false));
        let g = voice.graph.lock();
        assert!(!g.contains(old));
        assert!(g.is_running(voice.oscillator()));
        let freq = g.get(Endpoint::new(voice.oscillator(), Port::Frequency)).unwrap();
        assert_eq!(freq, 440.0);
        let amp = g.get(Endpoint::new(voice.oscillator(), Port::Amplitude)).unwrap();
        assert_eq!(amp, 1.0);
    }

    #[test]
    fn test_hot_swap_same_type_is_noop() {
        let (mut voice, _scheduler) = voice();
        let old = voice.oscillator();
        voice.set_oscillator_type(Waveform::Sine).unwrap();
        assert_eq!(voice.oscillator(), old);
    }

    #[test]
    fn test_refresh_is_idempotent() {
        let (mut voice, _scheduler) = voice();
        voice.refresh_signal_chain().unwrap();
        voice.refresh_signal_chain().unwrap();
        assert!(fully_wired(&voice, true));

        let g = voice.graph.lock();
        let into_left: Vec<_> = g
            .edges_into(Endpoint::new(voice.bus(), Port::Left))
            .collect();
        assert_eq!(into_left.len(), 1);
    }

    #[test]
    fn test_refresh_recovers_partial_teardown() {
        let (mut voice, _scheduler) = voice();
        {
            let mut g = voice.graph.lock();
            let edge = voice.chain_edges(false)[3];
            g.disconnect_if_present(edge.from, edge.to);
        }
        voice.refresh_signal_chain().unwrap();
        assert!(fully_wired(&voice, true));
    }
}
