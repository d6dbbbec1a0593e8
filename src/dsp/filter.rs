use std::f64::consts::PI;

use super::{Port, Unit, UnitKind};

const INPUT: usize = 0;
const FREQUENCY: usize = 1;
const RESONANCE: usize = 2;
const AMPLITUDE: usize = 3;

/// State variable filter with simultaneous low/high/band outputs
///
/// Topology-preserving transform (Simper) form. Resonance in
/// `[0, 1)` maps to damping `k = 2 * (1 - resonance)`; cutoff is held inside
/// `[20 Hz, 0.49 * sample_rate]` to keep the integrators stable. Every tap is
/// scaled by the amplitude input.
pub struct StateVariableFilter {
    /// First integrator state
    ic1eq: f64,
    /// Second integrator state
    ic2eq: f64,
}

impl StateVariableFilter {
    pub fn new() -> Self {
        Self {
            ic1eq: 0.0,
            ic2eq: 0.0,
        }
    }
}

impl Default for StateVariableFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl Unit for StateVariableFilter {
    fn kind(&self) -> UnitKind {
        UnitKind::StateVariableFilter
    }

    fn inputs(&self) -> &'static [(Port, f64)] {
        &[
            (Port::Input, 0.0),
            (Port::Frequency, 1000.0),
            (Port::Resonance, 0.2),
            (Port::Amplitude, 1.0),
        ]
    }

    fn outputs(&self) -> &'static [Port] {
        &[Port::LowPass, Port::HighPass, Port::BandPass]
    }

    fn tick(&mut self, sample_rate: f64, inputs: &[f64], outputs: &mut [f64]) {
        let input = inputs[INPUT];
        let cutoff = inputs[FREQUENCY].clamp(20.0, sample_rate * 0.49);
        let k = (2.0 * (1.0 - inputs[RESONANCE])).clamp(0.05, 2.0);

        let g = (PI * cutoff / sample_rate).tan();
        let a1 = 1.0 / (1.0 + g * (g + k));
        let a2 = g * a1;
        let a3 = g * a2;

        let v3 = input - self.ic2eq;
        let v1 = a1 * self.ic1eq + a2 * v3;
        let v2 = self.ic2eq + a2 * self.ic1eq + a3 * v3;

        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;

        let amplitude = inputs[AMPLITUDE];
        outputs[0] = v2 * amplitude;
        outputs[1] = (input - k * v1 - v2) * amplitude;
        outputs[2] = v1 * amplitude;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settle(filter: &mut StateVariableFilter, input: f64, frames: usize) -> [f64; 3] {
        let mut out = [0.0; 3];
        for _ in 0..frames {
            filter.tick(44100.0, &[input, 1000.0, 0.0, 1.0], &mut out);
        }
        out
    }

    #[test]
    fn test_lowpass_passes_dc() {
        let mut filter = StateVariableFilter::new();
        let out = settle(&mut filter, 1.0, 2000);
        assert!((out[0] - 1.0).abs() < 0.01, "DC response should be ~1.0");
    }

    #[test]
    fn test_highpass_blocks_dc() {
        let mut filter = StateVariableFilter::new();
        let out = settle(&mut filter, 1.0, 2000);
        assert!(out[1].abs() < 0.01, "DC should be blocked: {}", out[1]);
    }

    #[test]
    fn test_amplitude_scales_taps() {
        let mut filter = StateVariableFilter::new();
        let mut out = [0.0; 3];
        for _ in 0..100 {
            filter.tick(44100.0, &[1.0, 1000.0, 0.0, 0.0], &mut out);
        }
        assert_eq!(out, [0.0; 3]);
    }
}
