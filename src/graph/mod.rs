//! Unit graph: owns every audio unit, the edges between their ports, and the
//! render loop that pulls frames through them.
//!
//! Topology edits and rendering are both `&mut self`, so sharing the graph
//! behind one lock ([`SharedGraph`]) is enough to keep every render block from
//! observing a half-applied rewire.

use parking_lot::Mutex;
use slotmap::{new_key_type, SecondaryMap, SlotMap};
use std::{collections::VecDeque, sync::Arc};
use thiserror::Error;

use crate::dsp::{Port, Unit, UnitKind};

new_key_type! {
    pub struct UnitId;
}

/// Graph handle shared by the control plane and the render callback
pub type SharedGraph = Arc<Mutex<UnitGraph>>;

/// One port on one unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub unit: UnitId,
    pub port: Port,
}

impl Endpoint {
    pub fn new(unit: UnitId, port: Port) -> Self {
        Self { unit, port }
    }
}

/// Directed connection from an output port to an input port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    pub from: Endpoint,
    pub to: Endpoint,
}

impl Edge {
    pub fn new(from: Endpoint, to: Endpoint) -> Self {
        Self { from, to }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("unit {0:?} does not exist")]
    UnknownUnit(UnitId),
    #[error("{kind:?} has no input port {port:?}")]
    NoSuchInput { kind: UnitKind, port: Port },
    #[error("{kind:?} has no output port {port:?}")]
    NoSuchOutput { kind: UnitKind, port: Port },
}

struct Node {
    unit: Box<dyn Unit>,
    /// Values written to each input, used while the input is unconnected
    values: Vec<f64>,
    /// Input values seen by the last rendered frame
    resolved: Vec<f64>,
    outputs: Vec<f64>,
    running: bool,
}

/// Source list for one input: (unit, output index)
type Sources = Vec<(UnitId, usize)>;

pub struct UnitGraph {
    sample_rate: f64,
    nodes: SlotMap<UnitId, Node>,
    edges: Vec<Edge>,
    /// Running units in dependency order
    order: Vec<UnitId>,
    sources: SecondaryMap<UnitId, Vec<Sources>>,
    scratch: Vec<f64>,
    dirty: bool,
}

impl UnitGraph {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            nodes: SlotMap::with_key(),
            edges: Vec::new(),
            order: Vec::new(),
            sources: SecondaryMap::new(),
            scratch: Vec::new(),
            dirty: false,
        }
    }

    /// Wrap a fresh graph in a [`SharedGraph`]
    pub fn shared(sample_rate: f64) -> SharedGraph {
        Arc::new(Mutex::new(Self::new(sample_rate)))
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Create a unit. It does not render until [`UnitGraph::start`] is called.
    pub fn add_unit(&mut self, unit: Box<dyn Unit>) -> UnitId {
        let values: Vec<f64> = unit.inputs().iter().map(|(_, default)| *default).collect();
        let outputs = vec![0.0; unit.outputs().len()];
        self.dirty = true;
        self.nodes.insert(Node {
            resolved: values.clone(),
            values,
            outputs,
            unit,
            running: false,
        })
    }

    /// Destroy a unit along with every edge touching it
    pub fn remove_unit(&mut self, id: UnitId) -> Result<(), GraphError> {
        self.nodes.remove(id).ok_or(GraphError::UnknownUnit(id))?;
        self.edges.retain(|e| e.from.unit != id && e.to.unit != id);
        self.sources.remove(id);
        self.dirty = true;
        Ok(())
    }

    /// Put a unit into the render set
    pub fn start(&mut self, id: UnitId) -> Result<(), GraphError> {
        let node = self.node_mut(id)?;
        if !node.running {
            node.running = true;
            self.dirty = true;
        }
        Ok(())
    }

    /// Take a unit out of the render set. Its outputs read as silence.
    pub fn stop(&mut self, id: UnitId) -> Result<(), GraphError> {
        let node = self.node_mut(id)?;
        if node.running {
            node.running = false;
            node.outputs.fill(0.0);
            self.dirty = true;
        }
        Ok(())
    }

    pub fn contains(&self, id: UnitId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn is_running(&self, id: UnitId) -> bool {
        self.nodes.get(id).is_some_and(|n| n.running)
    }

    pub fn kind(&self, id: UnitId) -> Option<UnitKind> {
        self.nodes.get(id).map(|n| n.unit.kind())
    }

    /// Connect an output port to an input port. Connecting an existing edge is a no-op.
    pub fn connect(&mut self, from: Endpoint, to: Endpoint) -> Result<(), GraphError> {
        self.output_index(from)?;
        self.input_index(to)?;
        let edge = Edge::new(from, to);
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
            self.dirty = true;
        }
        Ok(())
    }

    /// Remove an edge if it exists. Returns whether it was there.
    /// Absent edges and vanished units are not errors.
    pub fn disconnect_if_present(&mut self, from: Endpoint, to: Endpoint) -> bool {
        let edge = Edge::new(from, to);
        match self.edges.iter().position(|e| *e == edge) {
            Some(idx) => {
                self.edges.remove(idx);
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Remove every edge leaving `from`. Returns the removed edges.
    pub fn disconnect_all(&mut self, from: Endpoint) -> Vec<Edge> {
        let (removed, kept): (Vec<Edge>, Vec<Edge>) =
            self.edges.iter().copied().partition(|e| e.from == from);
        if !removed.is_empty() {
            self.edges = kept;
            self.dirty = true;
        }
        removed
    }

    pub fn is_connected(&self, from: Endpoint, to: Endpoint) -> bool {
        self.edges.contains(&Edge::new(from, to))
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Edges feeding `to`
    pub fn edges_into(&self, to: Endpoint) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.iter().filter(move |e| e.to == to)
    }

    /// Write an input port value. Connected inputs keep reading their sources
    /// but still remember the value for when they are disconnected.
    pub fn set(&mut self, to: Endpoint, value: f64) -> Result<(), GraphError> {
        let idx = self.input_index(to)?;
        let node = self.node_mut(to.unit)?;
        node.values[idx] = value;
        node.unit.on_set(idx, value);
        Ok(())
    }

    /// Value last written to an input port
    pub fn get(&self, at: Endpoint) -> Result<f64, GraphError> {
        let idx = self.input_index(at)?;
        Ok(self.node(at.unit)?.values[idx])
    }

    /// Output value computed by the last rendered frame
    pub fn output(&self, at: Endpoint) -> Result<f64, GraphError> {
        let idx = self.output_index(at)?;
        Ok(self.node(at.unit)?.outputs[idx])
    }

    /// Render interleaved stereo frames into `out` (`L R L R ...`).
    /// Every running [`UnitKind::StereoOutput`] contributes to the result.
    pub fn render(&mut self, out: &mut [f32]) {
        if self.dirty {
            self.compile();
        }

        let Self {
            sample_rate,
            nodes,
            order,
            sources,
            scratch,
            ..
        } = self;

        for frame in out.chunks_exact_mut(2) {
            let mut left = 0.0;
            let mut right = 0.0;

            for &id in order.iter() {
                scratch.clear();
                let Some(node) = nodes.get(id) else { continue };
                let Some(inputs) = sources.get(id) else { continue };
                for (idx, list) in inputs.iter().enumerate() {
                    let value = if list.is_empty() {
                        node.values[idx]
                    } else {
                        list.iter()
                            .map(|(src, out_idx)| {
                                nodes.get(*src).map_or(0.0, |n| n.outputs[*out_idx])
                            })
                            .sum()
                    };
                    scratch.push(value);
                }

                let Some(node) = nodes.get_mut(id) else { continue };
                node.resolved.copy_from_slice(scratch);
                node.unit.tick(*sample_rate, &node.resolved, &mut node.outputs);

                if node.unit.kind() == UnitKind::StereoOutput {
                    left += node.resolved[0];
                    right += node.resolved[1];
                }
            }

            frame[0] = left as f32;
            frame[1] = right as f32;
        }
    }

    /// Rebuild the render order and per-input source lists after a topology change
    fn compile(&mut self) {
        self.sources.clear();
        for (id, node) in &self.nodes {
            let mut inputs: Vec<Sources> = vec![Vec::new(); node.values.len()];
            for edge in self.edges.iter().filter(|e| e.to.unit == id) {
                let Some(src) = self.nodes.get(edge.from.unit) else { continue };
                let (Some(in_idx), Some(out_idx)) = (
                    node.unit.input_index(edge.to.port),
                    src.unit.output_index(edge.from.port),
                ) else {
                    continue;
                };
                inputs[in_idx].push((edge.from.unit, out_idx));
            }
            self.sources.insert(id, inputs);
        }

        // Kahn's algorithm over running units; anything left in a cycle is
        // appended and reads its sources one frame late
        let running: Vec<UnitId> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.running)
            .map(|(id, _)| id)
            .collect();
        let mut indegree: SecondaryMap<UnitId, usize> = SecondaryMap::new();
        for &id in &running {
            indegree.insert(id, 0);
        }
        for edge in &self.edges {
            if edge.from.unit != edge.to.unit
                && indegree.contains_key(edge.from.unit)
                && indegree.contains_key(edge.to.unit)
            {
                if let Some(d) = indegree.get_mut(edge.to.unit) {
                    *d += 1;
                }
            }
        }

        let mut queue: VecDeque<UnitId> = running
            .iter()
            .copied()
            .filter(|id| indegree.get(*id) == Some(&0))
            .collect();
        let mut order = Vec::with_capacity(running.len());
        while let Some(id) = queue.pop_front() {
            order.push(id);
            for edge in self.edges.iter().filter(|e| e.from.unit == id && e.to.unit != id) {
                if let Some(d) = indegree.get_mut(edge.to.unit) {
                    *d -= 1;
                    if *d == 0 {
                        queue.push_back(edge.to.unit);
                    }
                }
            }
        }
        for &id in &running {
            if !order.contains(&id) {
                order.push(id);
            }
        }

        self.order = order;
        self.dirty = false;
    }

    fn node(&self, id: UnitId) -> Result<&Node, GraphError> {
        self.nodes.get(id).ok_or(GraphError::UnknownUnit(id))
    }

    fn node_mut(&mut self, id: UnitId) -> Result<&mut Node, GraphError> {
        self.nodes.get_mut(id).ok_or(GraphError::UnknownUnit(id))
    }

    fn input_index(&self, at: Endpoint) -> Result<usize, GraphError> {
        let node = self.node(at.unit)?;
        node.unit
            .input_index(at.port)
            .ok_or(GraphError::NoSuchInput {
                kind: node.unit.kind(),
                port: at.port,
            })
    }

    fn output_index(&self, at: Endpoint) -> Result<usize, GraphError> {
        let node = self.node(at.unit)?;
        node.unit
            .output_index(at.port)
            .ok_or(GraphError::NoSuchOutput {
                kind: node.unit.kind(),
                port: at.port,
            })
    }
}
