use super::{Port, Unit, UnitKind};
use crate::types::waveform::Waveform;

const FREQUENCY: usize = 0;
const AMPLITUDE: usize = 1;

/// Oscillator with phase accumulation
/// The waveform is fixed for the unit's lifetime; changing it means swapping units
pub struct Oscillator {
    /// Current phase position (0.0 to 1.0)
    phase: f64,
    waveform: Waveform,
}

impl Oscillator {
    pub fn new(waveform: Waveform) -> Self {
        Self {
            phase: 0.0,
            waveform,
        }
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }
}

impl Unit for Oscillator {
    fn kind(&self) -> UnitKind {
        UnitKind::Oscillator(self.waveform)
    }

    fn inputs(&self) -> &'static [(Port, f64)] {
        &[(Port::Frequency, 440.0), (Port::Amplitude, 1.0)]
    }

    fn outputs(&self) -> &'static [Port] {
        &[Port::Output]
    }

    fn tick(&mut self, sample_rate: f64, inputs: &[f64], outputs: &mut [f64]) {
        outputs[0] = self.waveform.generate(self.phase) * inputs[AMPLITUDE];

        // Advance phase and wrap around
        self.phase = (self.phase + inputs[FREQUENCY] / sample_rate).rem_euclid(1.0);
    }
}
