//! Audio unit primitives rendered by [`crate::graph::UnitGraph`].
//!
//! Each unit declares its input ports (with defaults) and output ports, and
//! computes one frame at a time from resolved input values.

pub mod envelope;
pub mod filter;
pub mod mix;
pub mod oscillator;
pub mod ramp;

use crate::types::waveform::Waveform;

/// Named unit port. Whether a port is an input or an output depends on the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Port {
    Input,
    Output,
    Frequency,
    Amplitude,
    Velocity,
    Attack,
    Decay,
    Sustain,
    Release,
    Resonance,
    Time,
    /// Ramp position; writing it jumps the ramp without gliding
    Current,
    InputA,
    InputB,
    LowPass,
    HighPass,
    BandPass,
    Left,
    Right,
}

/// Unit type tag, used for inspection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Oscillator(Waveform),
    EnvelopeGenerator,
    StateVariableFilter,
    LinearRamp,
    Summer,
    StereoOutput,
}

/// A single processing unit
pub trait Unit: Send {
    fn kind(&self) -> UnitKind;

    /// Input ports and their default values
    fn inputs(&self) -> &'static [(Port, f64)];

    /// Output ports
    fn outputs(&self) -> &'static [Port];

    /// React to a value written to input `index` at write time, before any
    /// frame is rendered. Gate-like inputs use this so that quick off/on
    /// sequences are never lost between render blocks.
    fn on_set(&mut self, _index: usize, _value: f64) {}

    /// Compute one frame. `inputs` is ordered like [`Unit::inputs`], `outputs`
    /// like [`Unit::outputs`].
    fn tick(&mut self, sample_rate: f64, inputs: &[f64], outputs: &mut [f64]);

    /// Position of `port` among the inputs
    fn input_index(&self, port: Port) -> Option<usize> {
        self.inputs().iter().position(|(p, _)| *p == port)
    }

    /// Position of `port` among the outputs
    fn output_index(&self, port: Port) -> Option<usize> {
        self.outputs().iter().position(|p| *p == port)
    }
}
