use super::{Port, Unit, UnitKind};

/// Gate inputs above this level count as "on"
pub const GATE_THRESHOLD: f64 = 0.01;

const INPUT: usize = 0;
const ATTACK: usize = 1;
const DECAY: usize = 2;
const SUSTAIN: usize = 3;
const RELEASE: usize = 4;
const AMPLITUDE: usize = 5;
const VELOCITY: usize = 6;

/// Envelope stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release { from_level: f64 },
}

/// ADSR envelope generator driven by a level-triggered gate
///
/// Rising the gate starts the attack from the current level, lowering it starts
/// the release. Segment times are read every frame so edits apply live.
/// Output is `level * amplitude * velocity`.
pub struct EnvelopeGenerator {
    stage: Stage,
    gate: bool,
    /// Current curve level before amplitude/velocity scaling
    level: f64,
}

impl EnvelopeGenerator {
    pub fn new() -> Self {
        Self {
            stage: Stage::Idle,
            gate: false,
            level: 0.0,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    fn apply_gate(&mut self, on: bool) {
        if on == self.gate {
            return;
        }
        self.gate = on;
        self.stage = if on {
            Stage::Attack
        } else if self.stage == Stage::Idle {
            Stage::Idle
        } else {
            Stage::Release {
                from_level: self.level,
            }
        };
    }
}

impl Default for EnvelopeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Unit for EnvelopeGenerator {
    fn kind(&self) -> UnitKind {
        UnitKind::EnvelopeGenerator
    }

    fn inputs(&self) -> &'static [(Port, f64)] {
        &[
            (Port::Input, 0.0),
            (Port::Attack, 0.1),
            (Port::Decay, 0.2),
            (Port::Sustain, 0.5),
            (Port::Release, 0.3),
            (Port::Amplitude, 1.0),
            (Port::Velocity, 1.0),
        ]
    }

    fn outputs(&self) -> &'static [Port] {
        &[Port::Output]
    }

    fn on_set(&mut self, index: usize, value: f64) {
        if index == INPUT {
            self.apply_gate(value > GATE_THRESHOLD);
        }
    }

    fn tick(&mut self, sample_rate: f64, inputs: &[f64], outputs: &mut [f64]) {
        // Connected gate sources only show up here
        self.apply_gate(inputs[INPUT] > GATE_THRESHOLD);

        let sustain = inputs[SUSTAIN];
        match self.stage {
            Stage::Idle => {
                self.level = 0.0;
            }

            Stage::Attack => {
                let attack = inputs[ATTACK];
                if attack <= 0.0 {
                    self.level = 1.0;
                } else {
                    self.level += 1.0 / (attack * sample_rate);
                }
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = Stage::Decay;
                }
            }

            Stage::Decay => {
                let decay = inputs[DECAY];
                let step = if decay <= 0.0 {
                    f64::INFINITY
                } else {
                    (1.0 - sustain).abs() / (decay * sample_rate)
                };
                if (self.level - sustain).abs() <= step {
                    self.level = sustain;
                    self.stage = Stage::Sustain;
                } else if self.level > sustain {
                    self.level -= step;
                } else {
                    self.level += step;
                }
            }

            Stage::Sustain => {
                self.level = sustain;
            }

            Stage::Release { from_level } => {
                let release = inputs[RELEASE];
                if release <= 0.0 {
                    self.level = 0.0;
                } else {
                    self.level -= from_level.max(f64::EPSILON) / (release * sample_rate);
                }
                if self.level <= 0.0 {
                    self.level = 0.0;
                    self.stage = Stage::Idle;
                }
            }
        }

        outputs[0] = self.level * inputs[AMPLITUDE] * inputs[VELOCITY];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // gate, attack, decay, sustain, release, amplitude, velocity
    fn params(gate: f64) -> [f64; 7] {
        [gate, 0.01, 0.01, 0.5, 0.01, 1.0, 1.0]
    }

    fn run(env: &mut EnvelopeGenerator, inputs: &[f64], frames: usize) -> f64 {
        let mut out = [0.0];
        for _ in 0..frames {
            env.tick(1000.0, inputs, &mut out);
        }
        out[0]
    }

    #[test]
    fn test_envelope_starts_idle() {
        let env = EnvelopeGenerator::new();
        assert_eq!(env.stage(), Stage::Idle);
    }

    #[test]
    fn test_attack_ramps_up() {
        let mut env = EnvelopeGenerator::new();
        env.on_set(INPUT, 1.0);
        let first = run(&mut env, &params(1.0), 1);
        let second = run(&mut env, &params(1.0), 1);
        assert!(second > first);
        assert!(first >= 0.0 && second <= 1.0);
    }

    #[test]
    fn test_reaches_sustain_then_releases_to_idle() {
        let mut env = EnvelopeGenerator::new();
        env.on_set(INPUT, 1.0);
        let held = run(&mut env, &params(1.0), 100);
        assert!((held - 0.5).abs() < 1e-9);
        assert_eq!(env.stage(), Stage::Sustain);

        env.on_set(INPUT, 0.0);
        let released = run(&mut env, &params(0.0), 100);
        assert_eq!(released, 0.0);
        assert_eq!(env.stage(), Stage::Idle);
    }

    #[test]
    fn test_off_on_without_render_restarts_attack() {
        let mut env = EnvelopeGenerator::new();
        env.on_set(INPUT, 1.0);
        run(&mut env, &params(1.0), 100);

        env.on_set(INPUT, 0.0);
        env.on_set(INPUT, 1.0);
        assert_eq!(env.stage(), Stage::Attack);
    }

    #[test]
    fn test_reasserting_gate_has_no_effect() {
        let mut env = EnvelopeGenerator::new();
        env.on_set(INPUT, 1.0);
        run(&mut env, &params(1.0), 100);
        env.on_set(INPUT, 0.7);
        assert_eq!(env.stage(), Stage::Sustain);
    }

    #[test]
    fn test_velocity_scales_output() {
        let mut env = EnvelopeGenerator::new();
        env.on_set(INPUT, 1.0);
        let mut inputs = params(1.0);
        inputs[VELOCITY] = 0.5;
        let out = run(&mut env, &inputs, 100);
        assert!((out - 0.25).abs() < 1e-9);
    }
}
