use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SynthError;

/// Oscillator waveform selected per voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl Default for Waveform {
    fn default() -> Self {
        Waveform::Sine
    }
}

impl Waveform {
    /// All waveforms in control-panel order
    pub const ALL: [Waveform; 4] = [
        Waveform::Sine,
        Waveform::Square,
        Waveform::Sawtooth,
        Waveform::Triangle,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Waveform::Sine => "sine",
            Waveform::Square => "square",
            Waveform::Sawtooth => "sawtooth",
            Waveform::Triangle => "triangle",
        }
    }

    /// Generate sample for this waveform at given phase (0.0 to 1.0)
    pub fn generate(&self, phase: f64) -> f64 {
        use std::f64::consts::PI;

        match self {
            Waveform::Sine => (phase * 2.0 * PI).sin(),
            Waveform::Triangle => {
                // -1 to 1 over full cycle
                if phase < 0.5 {
                    4.0 * phase - 1.0
                } else {
                    3.0 - 4.0 * phase
                }
            }
            Waveform::Sawtooth => 2.0 * phase - 1.0,
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
        }
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Waveform {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|w| w.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SynthError::UnknownName {
                what: "waveform",
                name: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sine_at_zero() {
        let wf = Waveform::Sine;
        assert!((wf.generate(0.0) - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_triangle_range() {
        let wf = Waveform::Triangle;
        assert!((wf.generate(0.0) - (-1.0)).abs() < 0.001);
        assert!((wf.generate(0.25) - 0.0).abs() < 0.001);
        assert!((wf.generate(0.5) - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_square() {
        let wf = Waveform::Square;
        assert_eq!(wf.generate(0.0), 1.0);
        assert_eq!(wf.generate(0.49), 1.0);
        assert_eq!(wf.generate(0.5), -1.0);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("sawtooth".parse::<Waveform>(), Ok(Waveform::Sawtooth));
        assert_eq!("Triangle".parse::<Waveform>(), Ok(Waveform::Triangle));
        assert!("noise".parse::<Waveform>().is_err());
    }
}
