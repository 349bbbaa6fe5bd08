//! Particle flow along drawn edges.
//!
//! Each selected edge carries a small set of particles whose phase (fractional
//! progress along the edge, `[0, 1)`) advances every animation tick. Phases
//! wrap instead of arriving, so an edge shows continuous flow rather than
//! discrete packets. Heavier edges get more particles and move them faster.

use std::collections::BTreeMap;

use crate::edges::{Edge, EdgeKey};

/// Laps per second of a particle on a zero-weight edge.
pub const BASE_FLOW_SPEED: f32 = 0.15;

/// Additional laps per second per unit of edge weight.
pub const WEIGHT_FLOW_SPEED: f32 = 0.6;

/// Laps per second for an edge of `weight`; strictly increasing in weight.
#[inline]
pub fn flow_speed(weight: f64) -> f32 {
    BASE_FLOW_SPEED + WEIGHT_FLOW_SPEED * weight.max(0.0) as f32
}

/// Particles shown on an edge of `weight`, between 1 and `max`.
pub fn particle_count(weight: f64, max: usize) -> usize {
    let max = max.max(1);
    let scaled = (weight.clamp(0.0, 1.0) * max as f64).ceil() as usize;
    scaled.clamp(1, max)
}

/// Particle state of one edge.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeFlow {
    pub weight: f64,
    pub phases: Vec<f32>,
}

impl EdgeFlow {
    /// Evenly spaced phases starting at `anchor`.
    fn spaced(weight: f64, count: usize, anchor: f32) -> Self {
        let phases = (0..count)
            .map(|k| (anchor + k as f32 / count as f32).fract())
            .collect();
        Self { weight, phases }
    }
}

/// Flow statistics.
#[derive(Default, Clone, Debug)]
pub struct FlowStats {
    /// Ticks that advanced at least one particle
    pub ticks: u64,
    /// Times a particle wrapped from the end of its edge to the start
    pub laps: u64,
}

/// Particle state for every drawn edge.
#[derive(Debug, Clone)]
pub struct ParticleField {
    flows: BTreeMap<EdgeKey, EdgeFlow>,
    enabled: bool,
    max_per_edge: usize,
    pub stats: FlowStats,
}

impl ParticleField {
    pub fn new(max_per_edge: usize, enabled: bool) -> Self {
        Self {
            flows: BTreeMap::new(),
            enabled,
            max_per_edge: max_per_edge.max(1),
            stats: FlowStats::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable. Disabling freezes and hides phases without
    /// discarding them.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Flip the enabled flag, returning the new value.
    pub fn toggle(&mut self) -> bool {
        self.enabled = !self.enabled;
        self.enabled
    }

    /// Match the particle set to the currently drawn edges.
    ///
    /// New edges start with evenly spaced particles, edges that are no longer
    /// drawn lose theirs, and an edge whose particle count changes is respaced
    /// around its first particle so the flow does not jump.
    pub fn sync(&mut self, edges: &[Edge]) {
        if !self.enabled {
            return;
        }
        self.flows
            .retain(|key, _| edges.iter().any(|e| e.key() == *key));

        for edge in edges {
            let count = particle_count(edge.weight, self.max_per_edge);
            match self.flows.get_mut(&edge.key()) {
                Some(flow) => {
                    flow.weight = edge.weight;
                    if flow.phases.len() != count {
                        let anchor = flow.phases.first().copied().unwrap_or(0.0);
                        *flow = EdgeFlow::spaced(edge.weight, count, anchor);
                    }
                }
                None => {
                    self.flows
                        .insert(edge.key(), EdgeFlow::spaced(edge.weight, count, 0.0));
                }
            }
        }
    }

    /// Advance every phase by `dt_secs × time_scale × flow_speed(weight)`.
    pub fn advance(&mut self, dt_secs: f32, time_scale: f32) {
        if !self.enabled || self.flows.is_empty() {
            return;
        }
        let step = dt_secs * time_scale;
        if !step.is_finite() || step <= 0.0 {
            return;
        }

        let mut laps = 0u64;
        for flow in self.flows.values_mut() {
            let delta = step * flow_speed(flow.weight);
            for phase in &mut flow.phases {
                let next = *phase + delta;
                if next >= 1.0 {
                    laps += next.floor() as u64;
                }
                *phase = next.fract();
            }
        }
        self.stats.ticks += 1;
        self.stats.laps += laps;
    }

    /// Drop every particle. Used on seeks so flow does not appear to teleport.
    pub fn clear(&mut self) {
        self.flows.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.flows.values().all(|f| f.phases.is_empty())
    }

    /// Phases of one edge, regardless of visibility.
    pub fn phases(&self, key: &EdgeKey) -> Option<&[f32]> {
        self.flows.get(key).map(|f| f.phases.as_slice())
    }

    /// Flows to draw; nothing while disabled.
    pub fn visible(&self) -> impl Iterator<Item = (&EdgeKey, &EdgeFlow)> + '_ {
        self.flows.iter().filter(move |_| self.enabled)
    }

    pub fn particle_total(&self) -> usize {
        self.flows.values().map(|f| f.phases.len()).sum()
    }
}
