use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame,
};

use keysynth::audio::envelope::EnvelopeParam;

use super::app::App;

const NOTE_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

/// Render the TUI
pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),  // Title
            Constraint::Length(4),  // ADSR controls
            Constraint::Length(5),  // Waveform and filter
            Constraint::Length(11), // Waveform shape (9 lines + 2 borders)
            Constraint::Length(4),  // Voices
            Constraint::Length(5),  // Help and status
        ])
        .split(frame.size());

    render_title(frame, chunks[0], app);
    render_adsr_controls(frame, chunks[1], app);
    render_tone_panel(frame, chunks[2], app);
    render_waveform_shape(frame, chunks[3], app);
    render_voices(frame, chunks[4], app);
    render_help(frame, chunks[5], app);
}

/// Render title bar
fn render_title(frame: &mut Frame, area: Rect, app: &App) {
    let text = format!("keysynth - {}-Voice Polyphonic Synthesizer", app.voice_states.len());
    let title = Paragraph::new(text)
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));

    frame.render_widget(title, area);
}

/// Render ADSR parameter controls
fn render_adsr_controls(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .title("ADSR Envelope")
        .borders(Borders::ALL)
        .style(Style::default().fg(Color::White));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let param_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(25); 4])
        .split(inner);

    for (idx, param) in EnvelopeParam::ALL.into_iter().enumerate() {
        render_parameter(
            frame,
            param_chunks[idx],
            param,
            app.envelope[idx],
            app.selected_param == param,
        );
    }
}

/// Render a single parameter with gauge
fn render_parameter(frame: &mut Frame, area: Rect, param: EnvelopeParam, value: f64, selected: bool) {
    let (min, max) = param.range();
    // Times are shown against a 2s scale, the full range is rarely useful
    let max = if param == EnvelopeParam::Sustain { 1.0 } else { max.min(2.0) };
    let ratio = ((value - min) / (max - min)).clamp(0.0, 1.0);

    let color = if selected { Color::Yellow } else { Color::Green };
    let style = if selected {
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(color)
    };

    let label = match param {
        EnvelopeParam::Sustain => format!("Sustain: {:.2}", value),
        _ => format!("{}: {:.3}s", title_case(param.name()), value),
    };

    let gauge = Gauge::default()
        .block(Block::default())
        .gauge_style(style)
        .label(label)
        .ratio(ratio);

    frame.render_widget(gauge, area);
}

/// Render waveform and filter settings
fn render_tone_panel(frame: &mut Frame, area: Rect, app: &App) {
    let lines = vec![
        Line::from(Span::styled(
            format!("Waveform: {}", title_case(app.waveform.name())),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )),
        Line::from(format!(
            "Filter: {}  |  Cutoff: {:.0} Hz  |  Resonance: {:.2}",
            app.filter_type, app.cutoff, app.resonance
        )),
        Line::from("Quick select: 1=Sine 2=Square 3=Sawtooth 4=Triangle"),
    ];

    let paragraph = Paragraph::new(lines)
        .block(Block::default().title("Tone").borders(Borders::ALL))
        .alignment(Alignment::Center);

    frame.render_widget(paragraph, area);
}

/// Plot two cycles of the selected waveform
/// 9 lines: line 4 = 0, lines 0-3 positive, lines 5-8 negative
fn render_waveform_shape(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default().title("Waveform").borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let width = inner.width as usize;
    const HEIGHT: usize = 9;
    if width == 0 {
        return;
    }

    let mut grid = vec![vec![' '; width]; HEIGHT];
    for x in 0..width {
        let phase = (x as f64 * 2.0 / width as f64).fract();
        let sample = app.waveform.generate(phase);
        let line = ((1.0 - sample) * 4.0).clamp(0.0, 8.0).round() as usize;
        grid[line][x] = '.';
    }

    let lines: Vec<Line> = grid
        .iter()
        .map(|row| {
            let text: String = row.iter().collect();
            Line::from(Span::styled(text, Style::default().fg(Color::Green)))
        })
        .collect();

    frame.render_widget(Paragraph::new(lines), inner);
}

/// Render per-voice notes and the polyphony count
fn render_voices(frame: &mut Frame, area: Rect, app: &App) {
    let spans: Vec<Span> = app
        .voice_states
        .iter()
        .map(|state| match state {
            Some(note) => Span::styled(
                format!(" {:<4}", note_name(*note)),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
            None => Span::styled(" --  ", Style::default().fg(Color::DarkGray)),
        })
        .collect();

    let title = format!("Voices {}/{}", app.active_voices(), app.voice_states.len());
    let paragraph = Paragraph::new(Line::from(spans))
        .block(Block::default().title(title).borders(Borders::ALL));

    frame.render_widget(paragraph, area);
}

/// Render help text and the last error, if any
fn render_help(frame: &mut Frame, area: Rect, app: &App) {
    let mut help_text = vec![
        Line::from("Controls:"),
        Line::from("  Keys A-' / W-] / Z-M: Play  |  ←/→: Select  |  ↑/↓: Adjust  |  Space: All off  |  Esc: Quit"),
        Line::from("  Tab: Filter type  |  -/=: Cutoff  |  ,/.: Resonance"),
    ];
    if let Some(status) = &app.status {
        help_text.push(Line::from(Span::styled(
            status.clone(),
            Style::default().fg(Color::Red),
        )));
    } else if !app.key_releases {
        help_text.push(Line::from("Terminal reports no key releases: notes stop after a short hold"));
    }

    let paragraph = Paragraph::new(help_text)
        .block(Block::default().borders(Borders::ALL))
        .style(Style::default().fg(Color::Gray));

    frame.render_widget(paragraph, area);
}

/// Note name with octave, middle C = C4
fn note_name(note: u8) -> String {
    let octave = i32::from(note / 12) - 1;
    format!("{}{}", NOTE_NAMES[usize::from(note % 12)], octave)
}

fn title_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
