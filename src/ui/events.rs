use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::{Duration, Instant};

use keysynth::Waveform;

use super::app::App;

/// Handle keyboard events and update app state
pub fn handle_events(app: &mut App) -> anyhow::Result<()> {
    // Poll for events with timeout
    if event::poll(Duration::from_millis(16))? {
        if let Event::Key(key) = event::read()? {
            handle_key_event(app, key);
        }
    }
    if !app.key_releases {
        app.expire_held_keys(Instant::now());
    }
    Ok(())
}

/// Key code the router understands for a terminal key: the upper-case
/// ASCII letter, or the legacy code for the four punctuation keys
pub fn key_code(code: KeyCode) -> Option<i32> {
    match code {
        KeyCode::Char(c) if c.is_ascii_alphabetic() => Some(c.to_ascii_uppercase() as i32),
        KeyCode::Char(';') => Some(59),
        KeyCode::Char('\'') => Some(222),
        KeyCode::Char('[') => Some(91),
        KeyCode::Char(']') => Some(93),
        _ => None,
    }
}

/// Process individual key event
pub fn handle_key_event(app: &mut App, key: KeyEvent) {
    if key.modifiers.contains(KeyModifiers::CONTROL) && matches!(key.code, KeyCode::Char('c')) {
        app.quit();
        return;
    }

    if let Some(code) = key_code(key.code) {
        match key.kind {
            KeyEventKind::Press => app.press_key(code),
            KeyEventKind::Release => app.release_key(code),
            KeyEventKind::Repeat => app.repeat_key(code),
        }
        return;
    }

    // Control keys act on press only
    if key.kind == KeyEventKind::Release {
        return;
    }

    match key.code {
        KeyCode::Esc => {
            app.quit();
        }
        KeyCode::Char(' ') => {
            app.all_notes_off();
        }

        // Quick waveform selection
        KeyCode::Char(c @ '1'..='4') => {
            let idx = (c as usize) - ('1' as usize);
            app.select_waveform(Waveform::ALL[idx]);
        }

        KeyCode::Right => {
            app.next_parameter();
        }
        KeyCode::Left => {
            app.prev_parameter();
        }
        KeyCode::Up => {
            app.increase_value();
        }
        KeyCode::Down => {
            app.decrease_value();
        }

        KeyCode::Tab => {
            app.next_filter_type();
        }
        KeyCode::Char('=') => {
            app.scale_cutoff(1.1);
        }
        KeyCode::Char('-') => {
            app.scale_cutoff(1.0 / 1.1);
        }
        KeyCode::Char('.') => {
            app.step_resonance(0.05);
        }
        KeyCode::Char(',') => {
            app.step_resonance(-0.05);
        }

        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letters_map_to_uppercase_codes() {
        assert_eq!(key_code(KeyCode::Char('a')), Some(65));
        assert_eq!(key_code(KeyCode::Char('A')), Some(65));
        assert_eq!(key_code(KeyCode::Char('m')), Some(77));
    }

    #[test]
    fn test_punctuation_codes() {
        assert_eq!(key_code(KeyCode::Char(';')), Some(59));
        assert_eq!(key_code(KeyCode::Char('\'')), Some(222));
        assert_eq!(key_code(KeyCode::Char('[')), Some(91));
        assert_eq!(key_code(KeyCode::Char(']')), Some(93));
    }

    #[test]
    fn test_control_keys_are_not_notes() {
        assert_eq!(key_code(KeyCode::Char('1')), None);
        assert_eq!(key_code(KeyCode::Char(' ')), None);
        assert_eq!(key_code(KeyCode::Esc), None);
        assert_eq!(key_code(KeyCode::Up), None);
    }
}
