use super::{Port, Unit, UnitKind};

/// Two-input adder
pub struct Summer;

impl Unit for Summer {
    fn kind(&self) -> UnitKind {
        UnitKind::Summer
    }

    fn inputs(&self) -> &'static [(Port, f64)] {
        &[(Port::InputA, 0.0), (Port::InputB, 0.0)]
    }

    fn outputs(&self) -> &'static [Port] {
        &[Port::Output]
    }

    fn tick(&mut self, _sample_rate: f64, inputs: &[f64], outputs: &mut [f64]) {
        outputs[0] = inputs[0] + inputs[1];
    }
}

/// Stereo sink. The graph reads its resolved inputs as the rendered frame.
pub struct StereoOutput;

impl Unit for StereoOutput {
    fn kind(&self) -> UnitKind {
        UnitKind::StereoOutput
    }

    fn inputs(&self) -> &'static [(Port, f64)] {
        &[(Port::Left, 0.0), (Port::Right, 0.0)]
    }

    fn outputs(&self) -> &'static [Port] {
        &[]
    }

    fn tick(&mut self, _sample_rate: f64, _inputs: &[f64], _outputs: &mut [f64]) {}
}
