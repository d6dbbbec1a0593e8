use std::sync::Arc;

use super::{
    engine::AudioEngine,
    envelope::EnvelopeParam,
    filter::{FilterType, FREQUENCY_RANGE, RESONANCE_RANGE},
    scheduler::ReleaseScheduler,
    voice::{Voice, VoiceId},
};
use crate::dsp::mix::StereoOutput;
use crate::error::{check_parameter, check_range, Result, SynthError};
use crate::graph::{SharedGraph, UnitGraph, UnitId};
use crate::types::{
    events::{EventSink, TracingSink},
    waveform::Waveform,
};

/// Default polyphony
pub const DEFAULT_VOICES: usize = 8;
/// Largest pool a synth may be built with
pub const MAX_VOICES: usize = 64;

/// Polyphonic voice allocator
/// Owns a fixed pool of voices, the shared output bus and the release scheduler.
/// Allocation is first-fit: the lowest-indexed idle voice wins, and nothing is
/// ever stolen.
pub struct Synth {
    graph: SharedGraph,
    bus: UnitId,
    voices: Vec<Voice>,
    engine: AudioEngine,
    events: Arc<dyn EventSink>,
    // Last, so the thread is joined after the voices are gone
    _scheduler: ReleaseScheduler,
}

impl Synth {
    /// Synth with the default pool size, logging through `tracing`
    pub fn new(sample_rate: f64) -> Result<Self> {
        Self::with_options(sample_rate, DEFAULT_VOICES, Arc::new(TracingSink))
    }

    pub fn with_options(
        sample_rate: f64,
        voice_count: usize,
        events: Arc<dyn EventSink>,
    ) -> Result<Self> {
        check_range("voice count", voice_count as f64, (1.0, MAX_VOICES as f64))?;

        let graph = UnitGraph::shared(sample_rate);
        let bus = {
            let mut g = graph.lock();
            let bus = g.add_unit(Box::new(StereoOutput));
            g.start(bus)?;
            bus
        };
        let scheduler = ReleaseScheduler::new(graph.clone(), events.clone())?;

        let voices = (0..voice_count)
            .map(|id| Voice::new(id, graph.clone(), bus, scheduler.handle(), events.clone()))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(voices = voice_count, sample_rate, "synth ready");

        Ok(Self {
            engine: AudioEngine::new(graph.clone(), voice_count),
            graph,
            bus,
            voices,
            events,
            _scheduler: scheduler,
        })
    }

    /// Index of the first idle voice, or `None` when every voice is sounding
    pub fn allocate(&self) -> Option<VoiceId> {
        self.voices.iter().position(|v| !v.is_active())
    }

    /// Same as [`Synth::allocate`]
    pub fn get_available_voice(&self) -> Option<VoiceId> {
        self.allocate()
    }

    pub fn note_on(&mut self, voice: VoiceId, note: i32, velocity: f64) -> Result<()> {
        self.checked_voice_mut(voice)?.note_on(note, velocity)
    }

    /// Release `voice`. Safe on an idle voice.
    pub fn note_off(&mut self, voice: VoiceId) -> Result<()> {
        self.checked_voice_mut(voice)?.note_off()
    }

    /// Release every sounding voice (panic)
    pub fn all_notes_off(&mut self) -> Result<()> {
        for voice in self.voices.iter_mut().filter(|v| v.is_active()) {
            voice.note_off()?;
        }
        Ok(())
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn voice(&self, id: VoiceId) -> Option<&Voice> {
        self.voices.get(id)
    }

    pub fn voice_mut(&mut self, id: VoiceId) -> Option<&mut Voice> {
        self.voices.get_mut(id)
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    pub fn active_count(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }

    /// The state of all voices (note number or None)
    pub fn voice_states(&self) -> Vec<Option<u8>> {
        self.voices.iter().map(Voice::current_note).collect()
    }

    pub fn set_oscillator_type_all(&mut self, waveform: Waveform) -> Result<()> {
        for voice in &mut self.voices {
            voice.set_oscillator_type(waveform)?;
        }
        Ok(())
    }

    /// Apply one envelope parameter to every voice, then refresh each chain
    /// and restart the envelope on sounding voices
    pub fn set_envelope_param_all(&mut self, param: EnvelopeParam, value: f64) -> Result<()> {
        check_parameter(param.name(), value, param.range())?;
        for voice in &mut self.voices {
            voice.envelope_mut().set(param, value)?;
            voice.refresh_signal_chain()?;
            if voice.is_active() {
                voice.retrigger()?;
            }
        }
        Ok(())
    }

    pub fn set_filter_cutoff_all(&mut self, hz: f64) -> Result<()> {
        check_parameter("cutoff", hz, FREQUENCY_RANGE)?;
        for voice in &mut self.voices {
            voice.filter_mut().set_filter_cutoff(hz)?;
        }
        Ok(())
    }

    pub fn set_filter_resonance_all(&mut self, level: f64) -> Result<()> {
        check_parameter("resonance", level, RESONANCE_RANGE)?;
        for voice in &mut self.voices {
            voice.filter_mut().set_filter_resonance(level)?;
        }
        Ok(())
    }

    pub fn set_filter_type_all(&mut self, filter_type: FilterType) -> Result<()> {
        for voice in &mut self.voices {
            voice.filter_mut().set_filter_type(filter_type)?;
        }
        Ok(())
    }

    /// A fresh render handle for an audio callback
    pub fn engine(&self) -> AudioEngine {
        AudioEngine::new(self.graph.clone(), self.voices.len())
    }

    /// Render one interleaved block of `channels` channels on the caller's thread
    pub fn render(&mut self, output: &mut [f32], channels: usize) {
        self.engine.process(output, channels);
    }

    pub fn graph(&self) -> &SharedGraph {
        &self.graph
    }

    /// The shared stereo output unit every voice feeds
    pub fn bus(&self) -> UnitId {
        self.bus
    }

    pub fn sample_rate(&self) -> f64 {
        self.graph.lock().sample_rate()
    }

    pub fn events(&self) -> &Arc<dyn EventSink> {
        &self.events
    }

    fn checked_voice_mut(&mut self, id: VoiceId) -> Result<&mut Voice> {
        let max = self.voices.len().saturating_sub(1);
        self.voices.get_mut(id).ok_or(SynthError::OutOfRange {
            what: "voice",
            value: id as f64,
            min: 0.0,
            max: max as f64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::events::NullSink;

    fn synth() -> Synth {
        Synth::with_options(44100.0, DEFAULT_VOICES, Arc::new(NullSink)).unwrap()
    }

    #[test]
    fn test_synth_creates_idle_pool() {
        let synth = synth();
        assert_eq!(synth.voice_count(), 8);
        assert!(synth.voice_states().iter().all(|s| s.is_none()));
        assert!(synth.voices().iter().all(|v| v.oscillator_type() == Waveform::Sine));
    }

    #[test]
    fn test_first_fit_allocation() {
        let mut synth = synth();
        assert_eq!(synth.allocate(), Some(0));

        for (voice, note) in [(0, 60), (1, 62), (2, 64)] {
            synth.note_on(voice, note, 0.7).unwrap();
        }
        assert_eq!(synth.allocate(), Some(3));

        synth.note_off(1).unwrap();
        assert_eq!(synth.allocate(), Some(1));
    }

    #[test]
    fn test_full_pool_is_unavailable() {
        let mut synth = synth();
        for voice in 0..8 {
            synth.note_on(voice, 60 + voice as i32, 0.5).unwrap();
        }
        assert_eq!(synth.allocate(), None);
        assert_eq!(synth.get_available_voice(), None);
    }

    #[test]
    fn test_bad_voice_index() {
        let mut synth = synth();
        assert!(matches!(
            synth.note_on(8, 60, 0.5),
            Err(SynthError::OutOfRange { what: "voice", .. })
        ));
        assert!(matches!(
            synth.note_off(99),
            Err(SynthError::OutOfRange { what: "voice", .. })
        ));
    }

    #[test]
    fn test_pool_size_bounds() {
        let events: Arc<dyn EventSink> = Arc::new(NullSink);
        assert!(Synth::with_options(44100.0, 0, events.clone()).is_err());
        assert!(Synth::with_options(44100.0, MAX_VOICES + 1, events).is_err());
    }

    #[test]
    fn test_all_notes_off() {
        let mut synth = synth();
        synth.note_on(0, 60, 0.5).unwrap();
        synth.note_on(4, 67, 0.5).unwrap();
        synth.all_notes_off().unwrap();
        assert_eq!(synth.active_count(), 0);
    }

    #[test]
    fn test_envelope_param_all_validates_first() {
        let mut synth = synth();
        assert!(synth.set_envelope_param_all(EnvelopeParam::Attack, 11.0).is_err());
        assert!(synth.voices().iter().all(|v| v.envelope().attack() == 0.05));

        synth.note_on(2, 60, 0.5).unwrap();
        synth.set_envelope_param_all(EnvelopeParam::Release, 1.5).unwrap();
        assert!(synth.voices().iter().all(|v| v.envelope().release() == 1.5));
        assert_eq!(synth.voice(2).and_then(Voice::current_note), Some(60));
        assert!(synth.voice(2).is_some_and(|v| v.envelope().is_gate_on()));
    }

    #[test]
    fn test_oscillator_type_all() {
        let mut synth = synth();
        synth.set_oscillator_type_all(Waveform::Triangle).unwrap();
        assert!(synth
            .voices()
            .iter()
            .all(|v| v.oscillator_type() == Waveform::Triangle));
    }

    #[test]
    fn test_filter_all_rejects_before_mutation() {
        let mut synth = synth();
        assert!(synth.set_filter_cutoff_all(10.0).is_err());
        assert!(synth.set_filter_resonance_all(1.5).is_err());
        assert!(synth.voices().iter().all(|v| v.filter().cutoff() == 2000.0));

        synth.set_filter_resonance_all(1.0).unwrap();
        assert!(synth
            .voices()
            .iter()
            .all(|v| (v.filter().resonance_target() - 0.3).abs() < 1e-9));
    }

    #[test]
    fn test_sounding_voice_renders_audio() {
        let mut synth = synth();
        synth.note_on(0, 69, 1.0).unwrap();
        let mut output = vec![0.0f32; 4410 * 2];
        synth.render(&mut output, 2);
        assert!(output.iter().any(|&s| s.abs() > 1e-4));
    }
}
