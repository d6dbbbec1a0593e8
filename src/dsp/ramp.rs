use super::{Port, Unit, UnitKind};

const INPUT: usize = 0;
const TIME: usize = 1;
const CURRENT: usize = 2;

/// Default glide time in seconds
pub const DEFAULT_RAMP_TIME: f64 = 0.05;

/// Linear ramp gliding its output toward the input value
///
/// Each new input value starts a fresh straight-line glide lasting `time`
/// seconds from wherever the output currently is. Writing `Current` jumps the
/// output immediately.
pub struct LinearRamp {
    current: f64,
    target: f64,
    step: f64,
    remaining: u64,
}

impl LinearRamp {
    pub fn new() -> Self {
        Self {
            current: 0.0,
            target: 0.0,
            step: 0.0,
            remaining: 0,
        }
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    fn jump(&mut self, value: f64) {
        self.current = value;
        self.target = value;
        self.remaining = 0;
    }
}

impl Default for LinearRamp {
    fn default() -> Self {
        Self::new()
    }
}

impl Unit for LinearRamp {
    fn kind(&self) -> UnitKind {
        UnitKind::LinearRamp
    }

    fn inputs(&self) -> &'static [(Port, f64)] {
        &[
            (Port::Input, 0.0),
            (Port::Time, DEFAULT_RAMP_TIME),
            (Port::Current, 0.0),
        ]
    }

    fn outputs(&self) -> &'static [Port] {
        &[Port::Output]
    }

    fn on_set(&mut self, index: usize, value: f64) {
        if index == CURRENT {
            self.jump(value);
        }
    }

    fn tick(&mut self, sample_rate: f64, inputs: &[f64], outputs: &mut [f64]) {
        let input = inputs[INPUT];
        if input != self.target {
            self.target = input;
            let frames = (inputs[TIME].max(0.0) * sample_rate).round() as u64;
            if frames == 0 {
                self.jump(input);
            } else {
                self.step = (input - self.current) / frames as f64;
                self.remaining = frames;
            }
        }

        if self.remaining > 0 {
            self.remaining -= 1;
            self.current = if self.remaining == 0 {
                self.target
            } else {
                self.current + self.step
            };
        }

        outputs[0] = self.current;
    }
}
