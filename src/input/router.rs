use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};

use super::keymap::{KeyMap, KEY_CODE_RANGE};
use crate::audio::{synth::Synth, voice::VoiceId};
use crate::error::{check_parameter, check_range, Result};
use crate::types::events::SynthEvent;

/// Velocity used for every key press unless configured otherwise
pub const DEFAULT_VELOCITY: f64 = 0.7;

/// Turns key press/release events into voice allocations
///
/// Tracks which voice each held key is sounding. A key maps to at most one
/// voice, so auto-repeat presses of a held key are ignored.
#[derive(Debug)]
pub struct InputRouter {
    keymap: KeyMap,
    active_notes: HashMap<i32, VoiceId>,
    velocity: f64,
}

impl Default for InputRouter {
    fn default() -> Self {
        Self::new(KeyMap::default())
    }
}

impl InputRouter {
    pub fn new(keymap: KeyMap) -> Self {
        Self {
            keymap,
            active_notes: HashMap::new(),
            velocity: DEFAULT_VELOCITY,
        }
    }

    pub fn set_velocity(&mut self, velocity: f64) -> Result<()> {
        self.velocity = check_parameter("velocity", velocity, (0.0, 1.0))?;
        Ok(())
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    pub fn keymap(&self) -> &KeyMap {
        &self.keymap
    }

    /// Keys currently sounding and the voice each one holds
    pub fn active_notes(&self) -> &HashMap<i32, VoiceId> {
        &self.active_notes
    }

    /// Handle a key press. Returns the voice that started, or `None` when the
    /// key is unmapped, already held, or no voice is free.
    pub fn key_pressed(&mut self, synth: &mut Synth, code: i32) -> Result<Option<VoiceId>> {
        let Some(note) = self.keymap.note_for_key(code)? else {
            return Ok(None);
        };
        if self.active_notes.contains_key(&code) {
            return Ok(None);
        }

        let Some(voice) = synth.allocate() else {
            synth.events().emit(&SynthEvent::NoteDropped { key: code, note });
            return Ok(None);
        };
        synth.note_on(voice, i32::from(note), self.velocity)?;
        self.active_notes.insert(code, voice);
        Ok(Some(voice))
    }

    /// Handle a key release. Returns the voice that was released, if the key
    /// was holding one.
    pub fn key_released(&mut self, synth: &mut Synth, code: i32) -> Result<Option<VoiceId>> {
        check_range("key code", f64::from(code), KEY_CODE_RANGE)?;
        let Some(voice) = self.active_notes.remove(&code) else {
            return Ok(None);
        };

        // The voice may have been released behind our back and handed to
        // another key since; leave it alone in that case
        let note = self.keymap.note_for_key(code)?;
        if synth.voice(voice).and_then(|v| v.current_note()) != note {
            return Ok(None);
        }
        synth.note_off(voice)?;
        Ok(Some(voice))
    }

    /// Forget every held key and release all voices
    pub fn release_all(&mut self, synth: &mut Synth) -> Result<()> {
        self.active_notes.clear();
        synth.all_notes_off()
    }
}

/// A synth together with the router that drives it
pub struct Instrument {
    pub synth: Synth,
    pub router: InputRouter,
}

/// Instrument shared between control threads. Allocation and the active key
/// map are only ever touched under this one lock.
pub type SharedInstrument = Arc<Mutex<Instrument>>;

impl Instrument {
    pub fn new(synth: Synth, router: InputRouter) -> Self {
        Self { synth, router }
    }

    pub fn shared(self) -> SharedInstrument {
        Arc::new(Mutex::new(self))
    }

    pub fn key_pressed(&mut self, code: i32) -> Result<Option<VoiceId>> {
        self.router.key_pressed(&mut self.synth, code)
    }

    pub fn key_released(&mut self, code: i32) -> Result<Option<VoiceId>> {
        self.router.key_released(&mut self.synth, code)
    }

    pub fn all_notes_off(&mut self) -> Result<()> {
        self.router.release_all(&mut self.synth)
    }
}
