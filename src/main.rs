mod ui;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossterm::{
    cursor::Show,
    event::{KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags},
    execute,
    terminal::{
        disable_raw_mode, enable_raw_mode, supports_keyboard_enhancement, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{
    fs::File,
    io::{self, Write},
    path::PathBuf,
    sync::{Arc, Mutex},
};
use tracing::Level;

use keysynth::{
    audio::engine::AudioEngine,
    config::SynthConfig,
    input::router::{InputRouter, Instrument},
    types::events::TracingSink,
    Synth,
};
use ui::{app::App, events, render};

/// Polyphonic synthesizer played from the computer keyboard
#[derive(Parser, Debug)]
#[command(name = "keysynth")]
#[command(about = "Polyphonic keyboard synthesizer", long_about = None)]
struct Args {
    /// Configuration file (YAML)
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// List available devices and exit
    #[arg(short = 'l', long = "list")]
    list_devices: bool,

    /// Write logs to this file
    #[arg(long = "log")]
    log: Option<PathBuf>,

    /// Log at debug level
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

/// List available audio output devices
fn list_audio_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();

    let devices: Vec<String> = host
        .output_devices()?
        .filter_map(|device| {
            device.description()
                .ok()
                .map(|desc| desc.name().to_string())
        })
        .collect();

    if devices.is_empty() {
        return Err(anyhow!("No audio output devices found"));
    }

    Ok(devices)
}

/// Find audio device index by name or index string
fn find_audio_device(devices: &[String], search: &str) -> Result<usize> {
    // Try to parse as index first
    if let Ok(index) = search.parse::<usize>() {
        if index < devices.len() {
            return Ok(index);
        } else {
            return Err(anyhow!(
                "Audio device index {} out of range (0-{})",
                index,
                devices.len().saturating_sub(1)
            ));
        }
    }

    // Search by name (case-insensitive substring match)
    let search_lower = search.to_lowercase();
    devices
        .iter()
        .position(|device| device.to_lowercase().contains(&search_lower))
        .ok_or_else(|| anyhow!("Audio device '{}' not found", search))
}

/// Send logs to `path`; the terminal belongs to the TUI
fn init_logging(path: Option<&PathBuf>, verbose: bool) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let file = File::create(path)
        .with_context(|| format!("Failed to create log file: {}", path.display()))?;
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Handle --list flag
    if args.list_devices {
        println!("Available Audio Output Devices:");
        for (i, device) in list_audio_devices()?.iter().enumerate() {
            println!("  {}: {}", i, device);
        }
        return Ok(());
    }

    init_logging(args.log.as_ref(), args.verbose)?;

    let config = match &args.config {
        Some(path) => SynthConfig::load(path)?,
        None => SynthConfig::default(),
    };

    run(config)
}

fn run(config: SynthConfig) -> Result<()> {
    let host = cpal::default_host();
    let device = match &config.audioout {
        Some(search) => {
            let devices = list_audio_devices()?;
            let index = find_audio_device(&devices, search)?;
            host.output_devices()?
                .nth(index)
                .ok_or_else(|| anyhow!("Selected audio device not available"))?
        }
        None => host
            .default_output_device()
            .ok_or_else(|| anyhow!("No default audio output device"))?,
    };

    let audio_config = device.default_output_config()?;
    let sample_rate = audio_config.sample_rate() as f64;

    let mut synth = Synth::with_options(sample_rate, config.voices, Arc::new(TracingSink))
        .context("Failed to build synth")?;
    config.apply(&mut synth)?;
    let mut router = InputRouter::default();
    config.configure_router(&mut router)?;

    let engine = synth.engine();
    let instrument = Instrument::new(synth, router).shared();

    // Start audio stream
    let stream_config: cpal::StreamConfig = audio_config.config();
    let _stream = match audio_config.sample_format() {
        cpal::SampleFormat::F32 => start_audio_stream::<f32>(&device, &stream_config, engine)?,
        cpal::SampleFormat::I16 => start_audio_stream::<i16>(&device, &stream_config, engine)?,
        cpal::SampleFormat::U16 => start_audio_stream::<u16>(&device, &stream_config, engine)?,
        format => return Err(anyhow!("Unsupported sample format: {:?}", format)),
    };
    tracing::info!(sample_rate, voices = config.voices, "audio stream started");

    // Setup terminal; the guard restores it on every exit path
    enable_raw_mode()?;
    let mut guard = TerminalGuard::default();
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;

    // Release events need the kitty keyboard protocol
    let key_releases = supports_keyboard_enhancement().unwrap_or(false);
    if key_releases {
        execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        )?;
        guard.key_releases = true;
    }
    tracing::debug!(key_releases, "terminal ready");

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(instrument, key_releases);
    run_ui_loop(&mut terminal, &mut app)
}

/// Leaves raw mode and the alternate screen when dropped
#[derive(Default)]
struct TerminalGuard {
    /// Keyboard enhancement flags were pushed and must be popped
    key_releases: bool,
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            tracing::error!(error = %e, "failed to leave raw mode");
        }
        if let Err(e) = restore_terminal(&mut io::stdout(), self.key_releases) {
            tracing::error!(error = %e, "failed to restore terminal");
        }
    }
}

fn restore_terminal<W: Write>(out: &mut W, key_releases: bool) -> io::Result<()> {
    if key_releases {
        execute!(out, PopKeyboardEnhancementFlags)?;
    }
    execute!(out, LeaveAlternateScreen, Show)
}

/// Start audio stream rendering `engine`
fn start_audio_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut engine: AudioEngine,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels as usize;

    // Pre-allocate buffer for processing
    let mut temp_buffer = vec![0.0f32; 512 * channels];

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            // Ensure temp buffer is large enough
            if temp_buffer.len() < data.len() {
                temp_buffer.resize(data.len(), 0.0);
            }

            let block = &mut temp_buffer[..data.len()];
            engine.process(block, channels);

            // Convert to output sample format
            for (out, sample) in data.iter_mut().zip(block.iter()) {
                *out = T::from_sample(*sample);
            }
        },
        |err| tracing::error!(error = %err, "audio stream error"),
        None,
    )?;

    stream.play()?;

    Ok(stream)
}

/// Run UI loop
fn run_ui_loop(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        app.refresh();

        // Render UI
        terminal.draw(|f| render::render(f, app))?;

        // Handle events (polls with a short timeout)
        events::handle_events(app)?;

        if app.should_quit {
            break;
        }
    }

    // Let ringing voices go before the stream closes
    app.all_notes_off();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restore_leaves_alternate_screen() {
        let mut out = Vec::new();
        restore_terminal(&mut out, false).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\x1b[?1049l"));
        assert!(text.contains("\x1b[?25h"));
    }

    #[test]
    fn test_restore_pops_keyboard_flags_first() {
        let mut plain = Vec::new();
        restore_terminal(&mut plain, false).unwrap();
        let mut enhanced = Vec::new();
        restore_terminal(&mut enhanced, true).unwrap();
        assert!(enhanced.len() > plain.len());
        assert!(enhanced.ends_with(&plain));
    }

    #[test]
    fn test_find_audio_device() {
        let devices = vec!["Built-in Output".to_string(), "USB Audio".to_string()];
        assert_eq!(find_audio_device(&devices, "1").unwrap(), 1);
        assert_eq!(find_audio_device(&devices, "usb").unwrap(), 1);
        assert!(find_audio_device(&devices, "5").is_err());
        assert!(find_audio_device(&devices, "hdmi").is_err());
    }
}
