use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use keysynth::{
    audio::{envelope::EnvelopeParam, filter::FilterType},
    input::router::SharedInstrument,
    Result, Waveform,
};

/// How long a press sounds when the terminal cannot report key releases
pub const AUTO_RELEASE: Duration = Duration::from_millis(400);

/// UI application state
/// Mirrors what the screen shows; the instrument itself is the source of truth
pub struct App {
    instrument: SharedInstrument,
    /// Parameter the arrow keys adjust
    pub selected_param: EnvelopeParam,
    pub waveform: Waveform,
    pub envelope: [f64; 4],
    pub cutoff: f64,
    pub resonance: f64,
    pub filter_type: FilterType,
    /// Note per voice (None if idle)
    pub voice_states: Vec<Option<u8>>,
    /// Last rejected action, shown in the status line
    pub status: Option<String>,
    pub should_quit: bool,
    /// Whether the terminal delivers key release events
    pub key_releases: bool,
    /// Press time of each held key, used only without release events
    held: HashMap<i32, Instant>,
}

impl App {
    pub fn new(instrument: SharedInstrument, key_releases: bool) -> Self {
        let mut app = Self {
            instrument,
            selected_param: EnvelopeParam::Attack,
            waveform: Waveform::Sine,
            envelope: [0.0; 4],
            cutoff: 0.0,
            resonance: 0.0,
            filter_type: FilterType::LowPass,
            voice_states: Vec::new(),
            status: None,
            should_quit: false,
            key_releases,
            held: HashMap::new(),
        };
        app.refresh();
        app
    }

    /// Pull the displayed values from the instrument
    pub fn refresh(&mut self) {
        let instrument = self.instrument.lock();
        let synth = &instrument.synth;
        self.voice_states = synth.voice_states();
        if let Some(voice) = synth.voice(0) {
            self.waveform = voice.oscillator_type();
            for (slot, param) in self.envelope.iter_mut().zip(EnvelopeParam::ALL) {
                *slot = voice.envelope().get(param);
            }
            self.cutoff = voice.filter().cutoff();
            self.resonance = voice.filter().resonance();
            self.filter_type = voice.filter().filter_type();
        }
    }

    pub fn active_voices(&self) -> usize {
        self.voice_states.iter().filter(|s| s.is_some()).count()
    }

    pub fn press_key(&mut self, code: i32) {
        // Without release events the terminal repeats a held key as plain presses
        if let Some(pressed) = self.held.get_mut(&code) {
            *pressed = Instant::now();
            return;
        }
        let result = self.instrument.lock().key_pressed(code);
        if matches!(result, Ok(Some(_))) && !self.key_releases {
            self.held.insert(code, Instant::now());
        }
        self.report(result.map(|_| ()));
    }

    pub fn release_key(&mut self, code: i32) {
        self.held.remove(&code);
        let result = self.instrument.lock().key_released(code).map(|_| ());
        self.report(result);
    }

    /// Auto-repeat presses keep a held key alive in fallback mode
    pub fn repeat_key(&mut self, code: i32) {
        if let Some(pressed) = self.held.get_mut(&code) {
            *pressed = Instant::now();
        }
    }

    /// Release fallback-mode keys whose hold time ran out
    pub fn expire_held_keys(&mut self, now: Instant) {
        let expired: Vec<i32> = self
            .held
            .iter()
            .filter(|(_, pressed)| now.duration_since(**pressed) >= AUTO_RELEASE)
            .map(|(code, _)| *code)
            .collect();
        for code in expired {
            self.release_key(code);
        }
    }

    pub fn held_keys(&self) -> usize {
        self.held.len()
    }

    pub fn select_waveform(&mut self, waveform: Waveform) {
        let result = self
            .instrument
            .lock()
            .synth
            .set_oscillator_type_all(waveform);
        self.report(result);
    }

    pub fn next_filter_type(&mut self) {
        let next = match self.filter_type {
            FilterType::LowPass => FilterType::HighPass,
            FilterType::HighPass => FilterType::BandPass,
            FilterType::BandPass => FilterType::LowPass,
        };
        let result = self.instrument.lock().synth.set_filter_type_all(next);
        self.report(result);
    }

    /// Cycle to next parameter
    pub fn next_parameter(&mut self) {
        let idx = self.param_index();
        self.selected_param = EnvelopeParam::ALL[(idx + 1) % EnvelopeParam::ALL.len()];
    }

    /// Cycle to previous parameter
    pub fn prev_parameter(&mut self) {
        let len = EnvelopeParam::ALL.len();
        let idx = self.param_index();
        self.selected_param = EnvelopeParam::ALL[(idx + len - 1) % len];
    }

    pub fn increase_value(&mut self) {
        self.step_value(1.0);
    }

    pub fn decrease_value(&mut self) {
        self.step_value(-1.0);
    }

    /// Scale the cutoff by `factor`, kept inside the valid band
    pub fn scale_cutoff(&mut self, factor: f64) {
        let hz = (self.cutoff * factor).clamp(20.0, 20000.0);
        let result = self.instrument.lock().synth.set_filter_cutoff_all(hz);
        self.report(result);
    }

    pub fn step_resonance(&mut self, delta: f64) {
        let level = (self.resonance + delta).clamp(0.0, 1.0);
        let result = self.instrument.lock().synth.set_filter_resonance_all(level);
        self.report(result);
    }

    /// Panic: release every voice and forget held keys
    pub fn all_notes_off(&mut self) {
        self.held.clear();
        let result = self.instrument.lock().all_notes_off();
        self.report(result);
    }

    /// Mark app for quit
    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    fn param_index(&self) -> usize {
        EnvelopeParam::ALL
            .iter()
            .position(|p| *p == self.selected_param)
            .unwrap_or(0)
    }

    fn step_value(&mut self, direction: f64) {
        let param = self.selected_param;
        let step = match param {
            EnvelopeParam::Sustain => 0.05,
            _ => 0.01,
        };
        let (min, max) = param.range();
        let current = self.envelope[self.param_index()];
        let value = (current + direction * step).clamp(min, max);

        let result = self
            .instrument
            .lock()
            .synth
            .set_envelope_param_all(param, value);
        self.report(result);
    }

    fn report(&mut self, result: Result<()>) {
        match result {
            Ok(()) => self.status = None,
            Err(e) => {
                tracing::warn!(error = %e, "control action rejected");
                self.status = Some(e.to_string());
            }
        }
        self.refresh();
    }
}
