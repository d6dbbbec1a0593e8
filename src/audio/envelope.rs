use crate::dsp::{envelope::EnvelopeGenerator, Port};
use crate::error::{check_parameter, Result};
use crate::graph::{Endpoint, SharedGraph, UnitId};

/// Valid attack/decay/release times in seconds
pub const TIME_RANGE: (f64, f64) = (0.0, 10.0);
/// Valid sustain levels. Wider than the amplitude range on purpose.
pub const SUSTAIN_RANGE: (f64, f64) = (0.0, 10.0);
/// Valid amplitude and velocity scalars
pub const UNIT_RANGE: (f64, f64) = (0.0, 1.0);

/// Envelope segment parameters editable from the control surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeParam {
    Attack,
    Decay,
    Sustain,
    Release,
}

impl EnvelopeParam {
    pub const ALL: [EnvelopeParam; 4] = [
        EnvelopeParam::Attack,
        EnvelopeParam::Decay,
        EnvelopeParam::Sustain,
        EnvelopeParam::Release,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EnvelopeParam::Attack => "attack",
            EnvelopeParam::Decay => "decay",
            EnvelopeParam::Sustain => "sustain",
            EnvelopeParam::Release => "release",
        }
    }

    pub fn range(self) -> (f64, f64) {
        match self {
            EnvelopeParam::Sustain => SUSTAIN_RANGE,
            _ => TIME_RANGE,
        }
    }

    fn port(self) -> Port {
        match self {
            EnvelopeParam::Attack => Port::Attack,
            EnvelopeParam::Decay => Port::Decay,
            EnvelopeParam::Sustain => Port::Sustain,
            EnvelopeParam::Release => Port::Release,
        }
    }
}

/// Validated parameter store and gate for one envelope generator unit
///
/// Values are checked before anything is written; accepted values go to the
/// unit unchanged and are remembered here for the getters.
pub struct EnvelopeControl {
    graph: SharedGraph,
    unit: UnitId,
    attack: f64,
    decay: f64,
    sustain: f64,
    release: f64,
    amplitude: f64,
    velocity: f64,
    gate: bool,
}

impl EnvelopeControl {
    /// Defaults chosen so no segment is zero-length (avoids clicks)
    pub const DEFAULT_ATTACK: f64 = 0.01;
    pub const DEFAULT_DECAY: f64 = 0.1;
    pub const DEFAULT_SUSTAIN: f64 = 0.8;
    pub const DEFAULT_RELEASE: f64 = 0.2;

    /// Create the envelope unit in `graph`, start it and apply the defaults
    pub fn new(graph: SharedGraph) -> Result<Self> {
        let unit = {
            let mut g = graph.lock();
            let id = g.add_unit(Box::new(EnvelopeGenerator::new()));
            g.start(id)?;
            id
        };

        let mut envelope = Self {
            graph,
            unit,
            attack: 0.0,
            decay: 0.0,
            sustain: 0.0,
            release: 0.0,
            amplitude: 1.0,
            velocity: 1.0,
            gate: false,
        };
        envelope.set_attack(Self::DEFAULT_ATTACK)?;
        envelope.set_decay(Self::DEFAULT_DECAY)?;
        envelope.set_sustain(Self::DEFAULT_SUSTAIN)?;
        envelope.set_release(Self::DEFAULT_RELEASE)?;
        Ok(envelope)
    }

    /// Set one segment parameter
    pub fn set(&mut self, param: EnvelopeParam, value: f64) -> Result<()> {
        let value = check_parameter(param.name(), value, param.range())?;
        self.write(param.port(), value)?;
        match param {
            EnvelopeParam::Attack => self.attack = value,
            EnvelopeParam::Decay => self.decay = value,
            EnvelopeParam::Sustain => self.sustain = value,
            EnvelopeParam::Release => self.release = value,
        }
        Ok(())
    }

    pub fn get(&self, param: EnvelopeParam) -> f64 {
        match param {
            EnvelopeParam::Attack => self.attack,
            EnvelopeParam::Decay => self.decay,
            EnvelopeParam::Sustain => self.sustain,
            EnvelopeParam::Release => self.release,
        }
    }

    /// Attack time in seconds, 0 to 10
    pub fn set_attack(&mut self, secs: f64) -> Result<()> {
        self.set(EnvelopeParam::Attack, secs)
    }

    pub fn attack(&self) -> f64 {
        self.attack
    }

    /// Decay time in seconds, 0 to 10
    pub fn set_decay(&mut self, secs: f64) -> Result<()> {
        self.set(EnvelopeParam::Decay, secs)
    }

    pub fn decay(&self) -> f64 {
        self.decay
    }

    /// Sustain level, 0 to 10
    pub fn set_sustain(&mut self, level: f64) -> Result<()> {
        self.set(EnvelopeParam::Sustain, level)
    }

    pub fn sustain(&self) -> f64 {
        self.sustain
    }

    /// Release time in seconds, 0 to 10
    pub fn set_release(&mut self, secs: f64) -> Result<()> {
        self.set(EnvelopeParam::Release, secs)
    }

    pub fn release(&self) -> f64 {
        self.release
    }

    /// Peak amplitude, 0 to 1
    pub fn set_amplitude(&mut self, amplitude: f64) -> Result<()> {
        let amplitude = check_parameter("amplitude", amplitude, UNIT_RANGE)?;
        self.write(Port::Amplitude, amplitude)?;
        self.amplitude = amplitude;
        Ok(())
    }

    pub fn amplitude(&self) -> f64 {
        self.amplitude
    }

    /// Note velocity, 0 to 1
    pub fn set_velocity(&mut self, velocity: f64) -> Result<()> {
        let velocity = check_parameter("velocity", velocity, UNIT_RANGE)?;
        self.write(Port::Velocity, velocity)?;
        self.velocity = velocity;
        Ok(())
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    /// Drive the gate: 1.0 starts attack→decay→sustain, 0.0 starts release.
    /// Level-triggered, so re-asserting the current level changes nothing.
    pub fn trigger(&mut self, on: bool) -> Result<()> {
        self.write(Port::Input, if on { 1.0 } else { 0.0 })?;
        self.gate = on;
        Ok(())
    }

    pub fn is_gate_on(&self) -> bool {
        self.gate
    }

    pub fn unit(&self) -> UnitId {
        self.unit
    }

    /// Modulation output port
    pub fn output(&self) -> Endpoint {
        Endpoint::new(self.unit, Port::Output)
    }

    fn write(&self, port: Port, value: f64) -> Result<()> {
        self.graph
            .lock()
            .set(Endpoint::new(self.unit, port), value)?;
        Ok(())
    }
}
