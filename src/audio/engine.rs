use crate::graph::SharedGraph;

/// Render side of the synth, owned by the audio callback
///
/// Holds only the shared graph, so rendering never touches the voice pool.
/// Each block takes the graph lock once, which keeps topology edits on the
/// control plane between blocks.
pub struct AudioEngine {
    graph: SharedGraph,
    stereo: Vec<f32>,
    gain: f32,
}

impl AudioEngine {
    /// `voices` sets the headroom scaling applied to the summed bus
    pub fn new(graph: SharedGraph, voices: usize) -> Self {
        Self {
            graph,
            stereo: Vec::new(),
            gain: 1.0 / (voices.max(1) as f32).sqrt(),
        }
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Fill an interleaved buffer of `channels` channels.
    /// Bus left/right land on channels 0 and 1, extra channels stay silent,
    /// and a mono device gets the average of both.
    pub fn process(&mut self, output: &mut [f32], channels: usize) {
        if channels == 0 {
            output.fill(0.0);
            return;
        }

        let frames = output.len().div_ceil(channels);
        self.stereo.resize(frames * 2, 0.0);
        self.graph.lock().render(&mut self.stereo);

        for (frame, bus) in output.chunks_mut(channels).zip(self.stereo.chunks_exact(2)) {
            let left = bus[0] * self.gain;
            let right = bus[1] * self.gain;
            match frame {
                [mono] => *mono = (left + right) * 0.5,
                [l, r, rest @ ..] => {
                    *l = left;
                    *r = right;
                    rest.fill(0.0);
                }
                [] => {}
            }
        }
    }
}
