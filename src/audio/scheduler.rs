use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use super::voice::VoiceId;
use crate::dsp::Port;
use crate::error::{Result, SynthError};
use crate::graph::{Endpoint, SharedGraph, UnitId};
use crate::types::events::{EventSink, SynthEvent};

/// The part of a voice the release scheduler may touch from its own thread
///
/// `generation` is bumped on every note-on while the graph lock is held, and a
/// pending silence only runs if the generation it captured is still current.
pub struct SilenceTarget {
    voice: VoiceId,
    generation: AtomicU64,
    /// Oscillator currently wired into the voice; swapped under the graph lock
    oscillator: Mutex<UnitId>,
}

impl SilenceTarget {
    pub fn new(voice: VoiceId, oscillator: UnitId) -> Self {
        Self {
            voice,
            generation: AtomicU64::new(0),
            oscillator: Mutex::new(oscillator),
        }
    }

    pub fn voice(&self) -> VoiceId {
        self.voice
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Start a new generation. Call with the graph lock held.
    pub(crate) fn advance(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn oscillator(&self) -> UnitId {
        *self.oscillator.lock()
    }

    /// Call with the graph lock held
    pub(crate) fn set_oscillator(&self, id: UnitId) {
        *self.oscillator.lock() = id;
    }
}

enum Command {
    Schedule {
        target: Arc<SilenceTarget>,
        generation: u64,
        deadline: Instant,
    },
    Cancel {
        voice: VoiceId,
    },
    Shutdown,
}

struct Pending {
    target: Arc<SilenceTarget>,
    generation: u64,
    deadline: Instant,
}

/// Cheap sender side of the scheduler, held by every voice
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: Sender<Command>,
}

impl SchedulerHandle {
    /// Silence `target` after `delay` unless its generation moves on first.
    /// Replaces anything already pending for the same voice.
    pub fn schedule(&self, target: Arc<SilenceTarget>, generation: u64, delay: Duration) {
        let _ = self.tx.send(Command::Schedule {
            target,
            generation,
            deadline: Instant::now() + delay,
        });
    }

    /// Drop whatever is pending for `voice`
    pub fn cancel(&self, voice: VoiceId) {
        let _ = self.tx.send(Command::Cancel { voice });
    }
}

/// Single coordinating thread that runs deferred post-release silences
///
/// Scheduling never blocks the caller. Dropping the scheduler stops the thread
/// and discards pending work.
pub struct ReleaseScheduler {
    handle: SchedulerHandle,
    thread: Option<JoinHandle<()>>,
}

impl ReleaseScheduler {
    pub fn new(graph: SharedGraph, events: Arc<dyn EventSink>) -> Result<Self> {
        let (tx, rx) = unbounded();
        let thread = thread::Builder::new()
            .name("release-scheduler".into())
            .spawn(move || run(rx, graph, events))
            .map_err(|e| SynthError::Scheduler(e.to_string()))?;

        Ok(Self {
            handle: SchedulerHandle { tx },
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }
}

impl Drop for ReleaseScheduler {
    fn drop(&mut self) {
        let _ = self.handle.tx.send(Command::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn run(rx: Receiver<Command>, graph: SharedGraph, events: Arc<dyn EventSink>) {
    let mut pending: Vec<Pending> = Vec::new();

    loop {
        let next_deadline = pending.iter().map(|p| p.deadline).min();
        let received = match next_deadline {
            Some(deadline) => match rx.recv_deadline(deadline) {
                Ok(command) => Some(command),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => return,
            },
            None => match rx.recv() {
                Ok(command) => Some(command),
                Err(_) => return,
            },
        };

        match received {
            Some(Command::Schedule {
                target,
                generation,
                deadline,
            }) => {
                pending.retain(|p| p.target.voice != target.voice);
                pending.push(Pending {
                    target,
                    generation,
                    deadline,
                });
            }
            Some(Command::Cancel { voice }) => pending.retain(|p| p.target.voice != voice),
            Some(Command::Shutdown) => return,
            None => {}
        }

        let now = Instant::now();
        let (due, waiting): (Vec<Pending>, Vec<Pending>) =
            pending.into_iter().partition(|p| p.deadline <= now);
        pending = waiting;
        for job in due {
            silence(&graph, events.as_ref(), &job.target, job.generation);
        }
    }
}

/// Zero the target's oscillator amplitude if `generation` is still current.
/// Returns whether the silence was applied.
pub(crate) fn silence(
    graph: &SharedGraph,
    events: &dyn EventSink,
    target: &SilenceTarget,
    generation: u64,
) -> bool {
    let applied = {
        let mut g = graph.lock();
        target.generation() == generation
            && g
                .set(Endpoint::new(target.oscillator(), Port::Amplitude), 0.0)
                .is_ok()
    };

    let voice = target.voice;
    if applied {
        events.emit(&SynthEvent::VoiceSilenced { voice });
    } else {
        events.emit(&SynthEvent::SilenceSkipped { voice });
    }
    applied
}
