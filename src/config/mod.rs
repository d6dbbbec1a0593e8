use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::audio::envelope::{EnvelopeParam, SUSTAIN_RANGE, TIME_RANGE};
use crate::audio::filter::{FilterType, FREQUENCY_RANGE, RESONANCE_RANGE};
use crate::audio::synth::{Synth, DEFAULT_VOICES, MAX_VOICES};
use crate::audio::voice::Voice;
use crate::input::router::{InputRouter, DEFAULT_VELOCITY};
use crate::types::waveform::Waveform;

/// Top-level configuration structure
/// Every field is optional; an empty file gives the built-in defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SynthConfig {
    /// Output device name or index; the system default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audioout: Option<String>,

    #[serde(default = "default_voices")]
    pub voices: usize,

    #[serde(default = "default_velocity")]
    pub velocity: f64,

    #[serde(default)]
    pub wave: Waveform,

    #[serde(default)]
    pub envelope: EnvelopeConfig,

    #[serde(default)]
    pub filter: FilterConfig,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            audioout: None,
            voices: default_voices(),
            velocity: default_velocity(),
            wave: Waveform::default(),
            envelope: EnvelopeConfig::default(),
            filter: FilterConfig::default(),
        }
    }
}

impl SynthConfig {
    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::from_yaml(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty document deserializes as unit, not as an empty map
        let config: SynthConfig = if content.trim().is_empty() {
            SynthConfig::default()
        } else {
            serde_yaml::from_str(content).context("Failed to parse YAML config")?
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.voices < 1 || self.voices > MAX_VOICES {
            return Err(anyhow!("Voices must be between 1 and {}", MAX_VOICES));
        }
        if !(0.0..=1.0).contains(&self.velocity) {
            return Err(anyhow!("Velocity must be between 0.0 and 1.0"));
        }
        if self.audioout.as_deref().is_some_and(|d| d.trim().is_empty()) {
            return Err(anyhow!("Audio output device name must not be empty"));
        }

        self.envelope
            .validate()
            .context("Invalid envelope configuration")?;
        self.filter
            .validate()
            .context("Invalid filter configuration")?;
        Ok(())
    }

    /// Push every value through the synth's validated setters
    pub fn apply(&self, synth: &mut Synth) -> Result<()> {
        synth
            .set_oscillator_type_all(self.wave)
            .context("Failed to set waveform")?;

        for (param, value) in self.envelope.values() {
            synth
                .set_envelope_param_all(param, value)
                .with_context(|| format!("Failed to set envelope {}", param.name()))?;
        }

        synth
            .set_filter_cutoff_all(self.filter.cutoff)
            .context("Failed to set filter cutoff")?;
        synth
            .set_filter_resonance_all(self.filter.resonance)
            .context("Failed to set filter resonance")?;
        synth
            .set_filter_type_all(self.filter.filter_type)
            .context("Failed to set filter type")?;
        Ok(())
    }

    pub fn configure_router(&self, router: &mut InputRouter) -> Result<()> {
        router
            .set_velocity(self.velocity)
            .context("Failed to set key velocity")?;
        Ok(())
    }
}

/// Envelope settings applied to every voice
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnvelopeConfig {
    #[serde(default = "default_attack")]
    pub attack: f64,

    #[serde(default = "default_decay")]
    pub decay: f64,

    #[serde(default = "default_sustain")]
    pub sustain: f64,

    #[serde(default = "default_release")]
    pub release: f64,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            attack: default_attack(),
            decay: default_decay(),
            sustain: default_sustain(),
            release: default_release(),
        }
    }
}

impl EnvelopeConfig {
    pub fn validate(&self) -> Result<()> {
        let (min, max) = TIME_RANGE;
        if !(min..=max).contains(&self.attack) {
            return Err(anyhow!("Attack must be between {} and {} seconds", min, max));
        }
        if !(min..=max).contains(&self.decay) {
            return Err(anyhow!("Decay must be between {} and {} seconds", min, max));
        }
        if !(min..=max).contains(&self.release) {
            return Err(anyhow!("Release must be between {} and {} seconds", min, max));
        }

        let (min, max) = SUSTAIN_RANGE;
        if !(min..=max).contains(&self.sustain) {
            return Err(anyhow!("Sustain must be between {} and {}", min, max));
        }
        Ok(())
    }

    fn values(&self) -> [(EnvelopeParam, f64); 4] {
        [
            (EnvelopeParam::Attack, self.attack),
            (EnvelopeParam::Decay, self.decay),
            (EnvelopeParam::Sustain, self.sustain),
            (EnvelopeParam::Release, self.release),
        ]
    }
}

/// Filter settings applied to every voice
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilterConfig {
    #[serde(default = "default_cutoff")]
    pub cutoff: f64,

    #[serde(default = "default_resonance")]
    pub resonance: f64,

    #[serde(default, rename = "type")]
    pub filter_type: FilterType,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            cutoff: default_cutoff(),
            resonance: default_resonance(),
            filter_type: FilterType::default(),
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<()> {
        let (min, max) = FREQUENCY_RANGE;
        if !(min..=max).contains(&self.cutoff) {
            return Err(anyhow!("Cutoff must be between {} and {} Hz", min, max));
        }
        let (min, max) = RESONANCE_RANGE;
        if !(min..=max).contains(&self.resonance) {
            return Err(anyhow!("Resonance must be between {} and {}", min, max));
        }
        Ok(())
    }
}

// Default value functions for serde
fn default_voices() -> usize {
    DEFAULT_VOICES
}

fn default_velocity() -> f64 {
    DEFAULT_VELOCITY
}

fn default_attack() -> f64 {
    Voice::DEFAULT_ATTACK
}

fn default_decay() -> f64 {
    Voice::DEFAULT_DECAY
}

fn default_sustain() -> f64 {
    Voice::DEFAULT_SUSTAIN
}

fn default_release() -> f64 {
    Voice::DEFAULT_RELEASE
}

fn default_cutoff() -> f64 {
    Voice::DEFAULT_CUTOFF
}

fn default_resonance() -> f64 {
    Voice::DEFAULT_RESONANCE
}
