use std::collections::HashMap;

use crate::error::{check_range, Result};

/// Accepted key codes, inclusive
pub const KEY_CODE_RANGE: (f64, f64) = (0.0, 255.0);

/// Two-row computer keyboard layout. Codes are the upper-case ASCII letter,
/// plus `;` 59, `'` 222, `[` 91 and `]` 93.
const DEFAULT_LAYOUT: [(i32, u8); 28] = [
    // Home row: white keys from middle C
    (b'A' as i32, 60),
    (b'S' as i32, 62),
    (b'D' as i32, 64),
    (b'F' as i32, 65),
    (b'G' as i32, 67),
    (b'H' as i32, 69),
    (b'J' as i32, 71),
    (b'K' as i32, 72),
    (b'L' as i32, 74),
    (59, 76),
    (222, 77),
    // Top row: black keys
    (b'W' as i32, 61),
    (b'E' as i32, 63),
    (b'R' as i32, 66),
    (b'T' as i32, 68),
    (b'Y' as i32, 70),
    (b'I' as i32, 73),
    (b'O' as i32, 75),
    (b'P' as i32, 78),
    (91, 80),
    (93, 82),
    // Bottom row: the octave below
    (b'Z' as i32, 48),
    (b'X' as i32, 50),
    (b'C' as i32, 52),
    (b'V' as i32, 53),
    (b'B' as i32, 55),
    (b'N' as i32, 57),
    (b'M' as i32, 59),
];

/// Immutable key code → MIDI note table
#[derive(Debug, Clone)]
pub struct KeyMap {
    notes: HashMap<i32, u8>,
}

impl Default for KeyMap {
    fn default() -> Self {
        Self::from_pairs(DEFAULT_LAYOUT)
    }
}

impl KeyMap {
    /// Build a table from (code, note) pairs. Later duplicates win.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (i32, u8)>) -> Self {
        Self {
            notes: pairs.into_iter().collect(),
        }
    }

    /// Note for `code`, or `None` if the key is unmapped.
    /// Fails with `OutOfRange` for codes outside 0-255.
    pub fn note_for_key(&self, code: i32) -> Result<Option<u8>> {
        check_range("key code", f64::from(code), KEY_CODE_RANGE)?;
        Ok(self.notes.get(&code).copied())
    }

    pub fn is_mapped(&self, code: i32) -> Result<bool> {
        Ok(self.note_for_key(code)?.is_some())
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, u8)> + '_ {
        self.notes.iter().map(|(&code, &note)| (code, note))
    }
}
