use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::dsp::{filter::StateVariableFilter, ramp::LinearRamp, Port};
use crate::error::{check_parameter, Result, SynthError};
use crate::graph::{Edge, Endpoint, SharedGraph, UnitId};

/// Valid cutoff frequencies in Hz
pub const FREQUENCY_RANGE: (f64, f64) = (20.0, 60000.0);
/// Valid resonance control levels
pub const RESONANCE_RANGE: (f64, f64) = (0.0, 1.0);

/// Resonance levels scale by this before reaching the filter
pub const RESONANCE_SCALE: f64 = 0.3;
/// Hard cap on the scaled resonance; the filter self-oscillates near 1.0
pub const RESONANCE_CEILING: f64 = 0.9;

/// Which filter output tap feeds the downstream input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterType {
    #[serde(alias = "lowpass")]
    LowPass,
    #[serde(alias = "highpass")]
    HighPass,
    #[serde(alias = "bandpass")]
    BandPass,
}

impl Default for FilterType {
    fn default() -> Self {
        FilterType::LowPass
    }
}

impl FilterType {
    pub const ALL: [FilterType; 3] = [FilterType::LowPass, FilterType::HighPass, FilterType::BandPass];

    pub fn tap(self) -> Port {
        match self {
            FilterType::LowPass => Port::LowPass,
            FilterType::HighPass => Port::HighPass,
            FilterType::BandPass => Port::BandPass,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FilterType::LowPass => "Low Pass",
            FilterType::HighPass => "High Pass",
            FilterType::BandPass => "Band Pass",
        }
    }
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FilterType {
    type Err = SynthError;

    /// Accepts "Low Pass", "low-pass", "lowpass" and friends
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let squashed: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match squashed.as_str() {
            "lowpass" => Ok(FilterType::LowPass),
            "highpass" => Ok(FilterType::HighPass),
            "bandpass" => Ok(FilterType::BandPass),
            _ => Err(SynthError::UnknownName {
                what: "filter type",
                name: s.to_string(),
            }),
        }
    }
}

/// Scaled resonance actually sent to the filter
pub fn scaled_resonance(level: f64) -> f64 {
    (level * RESONANCE_SCALE).min(RESONANCE_CEILING)
}

/// Validated parameters for one state variable filter
///
/// Cutoff and resonance reach the filter through two linear ramps so live
/// edits glide instead of stepping. Only the control inputs are smoothed, never
/// the audio output.
pub struct FilterControl {
    graph: SharedGraph,
    filter: UnitId,
    cutoff_ramp: UnitId,
    resonance_ramp: UnitId,
    frequency: f64,
    cutoff: f64,
    resonance: f64,
    filter_type: FilterType,
    /// Input the selected tap feeds, once the owner has wired one
    downstream: Option<Endpoint>,
}

impl FilterControl {
    /// Create the filter and its two ramps in `graph`, wired and started
    pub fn new(graph: SharedGraph) -> Result<Self> {
        let (filter, cutoff_ramp, resonance_ramp) = {
            let mut g = graph.lock();
            let filter = g.add_unit(Box::new(StateVariableFilter::new()));
            let cutoff_ramp = g.add_unit(Box::new(LinearRamp::new()));
            let resonance_ramp = g.add_unit(Box::new(LinearRamp::new()));

            g.connect(
                Endpoint::new(cutoff_ramp, Port::Output),
                Endpoint::new(filter, Port::Frequency),
            )?;
            g.connect(
                Endpoint::new(resonance_ramp, Port::Output),
                Endpoint::new(filter, Port::Resonance),
            )?;
            for id in [filter, cutoff_ramp, resonance_ramp] {
                g.start(id)?;
            }
            (filter, cutoff_ramp, resonance_ramp)
        };

        Ok(Self {
            graph,
            filter,
            cutoff_ramp,
            resonance_ramp,
            frequency: 0.0,
            cutoff: 0.0,
            resonance: 0.0,
            filter_type: FilterType::LowPass,
            downstream: None,
        })
    }

    /// Set the cutoff immediately, bypassing the glide
    pub fn set_frequency(&mut self, hz: f64) -> Result<()> {
        let hz = check_parameter("frequency", hz, FREQUENCY_RANGE)?;
        let mut g = self.graph.lock();
        g.set(Endpoint::new(self.filter, Port::Frequency), hz)?;
        g.set(Endpoint::new(self.cutoff_ramp, Port::Input), hz)?;
        g.set(Endpoint::new(self.cutoff_ramp, Port::Current), hz)?;
        drop(g);

        self.frequency = hz;
        self.cutoff = hz;
        Ok(())
    }

    /// Last frequency set through [`FilterControl::set_frequency`]
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Glide the cutoff toward `hz`
    pub fn set_filter_cutoff(&mut self, hz: f64) -> Result<()> {
        let hz = check_parameter("cutoff", hz, FREQUENCY_RANGE)?;
        self.graph
            .lock()
            .set(Endpoint::new(self.cutoff_ramp, Port::Input), hz)?;
        self.cutoff = hz;
        Ok(())
    }

    /// Current cutoff target in Hz
    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    /// Glide resonance toward `min(0.9, level * 0.3)`
    pub fn set_filter_resonance(&mut self, level: f64) -> Result<()> {
        let level = check_parameter("resonance", level, RESONANCE_RANGE)?;
        self.graph.lock().set(
            Endpoint::new(self.resonance_ramp, Port::Input),
            scaled_resonance(level),
        )?;
        self.resonance = level;
        Ok(())
    }

    /// Resonance control level as last set, before scaling
    pub fn resonance(&self) -> f64 {
        self.resonance
    }

    /// Value the resonance ramp is gliding toward
    pub fn resonance_target(&self) -> f64 {
        scaled_resonance(self.resonance)
    }

    /// Select the active tap. All three taps are disconnected, then the
    /// selected one is reconnected to the downstream input if there is one.
    pub fn set_filter_type(&mut self, filter_type: FilterType) -> Result<Vec<Edge>> {
        let mut g = self.graph.lock();
        for ty in FilterType::ALL {
            g.disconnect_all(Endpoint::new(self.filter, ty.tap()));
        }
        let mut connected = Vec::new();
        if let Some(to) = self.downstream {
            let from = Endpoint::new(self.filter, filter_type.tap());
            g.connect(from, to)?;
            connected.push(Edge::new(from, to));
        }
        drop(g);

        self.filter_type = filter_type;
        Ok(connected)
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    /// Record which input the selected tap feeds. Wiring is the caller's job.
    pub fn set_downstream(&mut self, to: Endpoint) {
        self.downstream = Some(to);
    }

    pub fn unit(&self) -> UnitId {
        self.filter
    }

    pub fn cutoff_ramp(&self) -> UnitId {
        self.cutoff_ramp
    }

    pub fn resonance_ramp(&self) -> UnitId {
        self.resonance_ramp
    }

    /// Audio input port
    pub fn input(&self) -> Endpoint {
        Endpoint::new(self.filter, Port::Input)
    }

    /// Amplitude input port
    pub fn amplitude_input(&self) -> Endpoint {
        Endpoint::new(self.filter, Port::Amplitude)
    }

    /// Currently selected output tap
    pub fn output(&self) -> Endpoint {
        Endpoint::new(self.filter, self.filter_type.tap())
    }
}
