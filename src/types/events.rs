use crossbeam_channel::Sender;

use crate::audio::voice::VoiceId;
use crate::graph::Edge;
use crate::types::waveform::Waveform;

/// Structured diagnostics emitted by the engine
/// Purely observational - nothing in the engine reads these back
#[derive(Debug, Clone, PartialEq)]
pub enum SynthEvent {
    /// An edge was added to a voice's chain
    Connected { voice: VoiceId, edge: Edge },
    /// An edge was torn down (or was already absent) during a rewire
    Disconnected {
        voice: VoiceId,
        edge: Edge,
        was_present: bool,
    },
    /// A voice replaced its oscillator
    OscillatorSwapped {
        voice: VoiceId,
        from: Waveform,
        to: Waveform,
    },
    /// A voice re-applied its chain topology
    ChainRefreshed { voice: VoiceId },
    NoteOn {
        voice: VoiceId,
        note: u8,
        velocity: f64,
    },
    NoteOff {
        voice: VoiceId,
        note: u8,
        release: f64,
    },
    Retriggered { voice: VoiceId },
    /// The deferred post-release silence ran
    VoiceSilenced { voice: VoiceId },
    /// The deferred silence fired after the voice had been reallocated
    SilenceSkipped { voice: VoiceId },
    /// A key press found no free voice
    NoteDropped { key: i32, note: u8 },
}

impl SynthEvent {
    /// Voice this event concerns, if any
    pub fn voice(&self) -> Option<VoiceId> {
        match self {
            SynthEvent::Connected { voice, .. }
            | SynthEvent::Disconnected { voice, .. }
            | SynthEvent::OscillatorSwapped { voice, .. }
            | SynthEvent::ChainRefreshed { voice }
            | SynthEvent::NoteOn { voice, .. }
            | SynthEvent::NoteOff { voice, .. }
            | SynthEvent::Retriggered { voice }
            | SynthEvent::VoiceSilenced { voice }
            | SynthEvent::SilenceSkipped { voice } => Some(*voice),
            SynthEvent::NoteDropped { .. } => None,
        }
    }
}

/// Receiver of engine diagnostics
/// Implementations must not block: events are emitted from the control plane
/// and from the release scheduler thread
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &SynthEvent);
}

/// Default sink: forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &SynthEvent) {
        match event {
            SynthEvent::Connected { voice, edge } => {
                tracing::trace!(voice, from = ?edge.from, to = ?edge.to, "connected");
            }
            SynthEvent::Disconnected {
                voice,
                edge,
                was_present,
            } => {
                tracing::trace!(voice, from = ?edge.from, to = ?edge.to, was_present, "disconnected");
            }
            SynthEvent::OscillatorSwapped { voice, from, to } => {
                tracing::debug!(voice, %from, %to, "oscillator swapped");
            }
            SynthEvent::ChainRefreshed { voice } => {
                tracing::debug!(voice, "signal chain refreshed");
            }
            SynthEvent::NoteOn {
                voice,
                note,
                velocity,
            } => {
                tracing::debug!(voice, note, velocity, "note on");
            }
            SynthEvent::NoteOff {
                voice,
                note,
                release,
            } => {
                tracing::debug!(voice, note, release, "note off");
            }
            SynthEvent::Retriggered { voice } => {
                tracing::debug!(voice, "envelope retriggered");
            }
            SynthEvent::VoiceSilenced { voice } => {
                tracing::trace!(voice, "voice silenced after release");
            }
            SynthEvent::SilenceSkipped { voice } => {
                tracing::debug!(voice, "stale release silence skipped");
            }
            SynthEvent::NoteDropped { key, note } => {
                tracing::info!(key, note, "no free voice, note dropped");
            }
        }
    }
}

/// Sink that forwards every event over a channel
/// Events are dropped if the channel is full or disconnected
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<SynthEvent>,
}

impl ChannelSink {
    pub fn new(tx: Sender<SynthEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: &SynthEvent) {
        let _ = self.tx.try_send(event.clone());
    }
}

/// Sink that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &SynthEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sink_forwards() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let sink = ChannelSink::new(tx);
        sink.emit(&SynthEvent::Retriggered { voice: 3 });
        assert_eq!(rx.try_recv(), Ok(SynthEvent::Retriggered { voice: 3 }));
    }

    #[test]
    fn test_channel_sink_never_blocks_when_full() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let sink = ChannelSink::new(tx);
        sink.emit(&SynthEvent::ChainRefreshed { voice: 0 });
        sink.emit(&SynthEvent::ChainRefreshed { voice: 1 });
        assert_eq!(rx.len(), 1);
    }

    #[test]
    fn test_event_voice() {
        assert_eq!(SynthEvent::VoiceSilenced { voice: 2 }.voice(), Some(2));
        assert_eq!(SynthEvent::NoteDropped { key: 65, note: 60 }.voice(), None);
    }
}
