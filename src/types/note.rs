/// MIDI note to frequency conversion using equal temperament
/// A440 tuning: MIDI note 69 = 440 Hz

/// Highest MIDI note number
pub const MAX_NOTE: u8 = 127;

/// Convert MIDI note number to frequency in Hz
/// Uses equal temperament: f = 440 * 2^((n-69)/12)
pub fn midi_note_to_frequency(note: u8) -> f64 {
    const A4: f64 = 440.0;
    const A4_MIDI: i32 = 69;

    let semitones = note as i32 - A4_MIDI;
    A4 * 2.0_f64.powf(semitones as f64 / 12.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_a4_conversion() {
        let freq = midi_note_to_frequency(69);
        assert!((freq - 440.0).abs() < 1e-6);
    }

    #[test]
    fn test_c4_middle_c() {
        let freq = midi_note_to_frequency(60);
        assert!((freq - 261.63).abs() < 0.01);
    }

    #[test]
    fn test_octave_doubling() {
        let a3 = midi_note_to_frequency(57);
        let a4 = midi_note_to_frequency(69);
        let a5 = midi_note_to_frequency(81);

        assert!((a4 / a3 - 2.0).abs() < 1e-9);
        assert!((a5 / a4 - 2.0).abs() < 1e-9);
    }
}
