//! Polyphonic keyboard synthesizer engine.
//!
//! A fixed pool of voices, each wired as oscillator → filter → mixer → stereo
//! bus inside a shared [`graph::UnitGraph`]. Control-plane code allocates voices
//! and mutates the graph under the same lock the render callback takes, so a
//! render block never sees a half-rewired chain.

pub mod audio;
pub mod config;
pub mod dsp;
pub mod error;
pub mod graph;
pub mod input;
pub mod types;

pub use audio::synth::Synth;
pub use audio::voice::{Voice, VoiceId};
pub use error::{Result, SynthError};
pub use input::{keymap::KeyMap, router::InputRouter};
pub use types::waveform::Waveform;
