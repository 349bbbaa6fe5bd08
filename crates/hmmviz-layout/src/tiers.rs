//! The 3-tier layout: initial node, hidden-state ring, observation tier.

use glam::Vec3;

use crate::ring::{ring_point, ring_radius, row_point};
use crate::TIER_GAP;

/// Which of the three node categories a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Tier {
    Initial,
    Hidden,
    Observation,
}

/// Identifies one node in the diagram.
///
/// Ordering is `Initial < State(_) < Observation(_)`, then by index, which
/// gives every consumer the same stable node order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "tier", content = "index", rename_all = "snake_case"))]
pub enum NodeId {
    /// The initial-state (`START`) node
    Initial,
    /// A hidden state
    State(usize),
    /// An observation symbol
    Observation(usize),
}

impl NodeId {
    /// The tier this node is drawn in.
    pub fn tier(&self) -> Tier {
        match self {
            NodeId::Initial => Tier::Initial,
            NodeId::State(_) => Tier::Hidden,
            NodeId::Observation(_) => Tier::Observation,
        }
    }

    /// Index within the tier (0 for the initial node).
    pub fn index(&self) -> usize {
        match self {
            NodeId::Initial => 0,
            NodeId::State(i) | NodeId::Observation(i) => *i,
        }
    }
}

/// 2D or 3D arrangement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LayoutMode {
    /// Everything in the `z = 0` plane.
    #[default]
    Flat,
    /// Rings lie in the `xz` plane, tiers are stacked along `y`.
    Volumetric,
}

impl LayoutMode {
    /// The other mode.
    pub fn toggled(self) -> Self {
        match self {
            LayoutMode::Flat => LayoutMode::Volumetric,
            LayoutMode::Volumetric => LayoutMode::Flat,
        }
    }
}

/// Node counts per tier. The only input a layout depends on besides the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TierCounts {
    pub states: usize,
    pub observations: usize,
    pub has_initial: bool,
}

impl TierCounts {
    pub const fn new(states: usize, observations: usize, has_initial: bool) -> Self {
        Self {
            states,
            observations,
            has_initial,
        }
    }

    /// Total number of nodes across all tiers.
    pub fn total(&self) -> usize {
        self.states + self.observations + usize::from(self.has_initial)
    }
}

/// Computed node positions for one `(TierCounts, LayoutMode)` pair.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Layout {
    pub mode: LayoutMode,
    pub counts: TierCounts,
    /// Radius of the hidden-state ring
    pub state_radius: f32,
    pub initial: Option<Vec3>,
    pub states: Vec<Vec3>,
    pub observations: Vec<Vec3>,
}

impl Layout {
    /// Position of a node, if it exists in this layout.
    pub fn position(&self, node: NodeId) -> Option<Vec3> {
        match node {
            NodeId::Initial => self.initial,
            NodeId::State(i) => self.states.get(i).copied(),
            NodeId::Observation(i) => self.observations.get(i).copied(),
        }
    }

    /// Every node with its position, in `NodeId` order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, Vec3)> + '_ {
        let initial = self.initial.map(|p| (NodeId::Initial, p));
        let states = self
            .states
            .iter()
            .enumerate()
            .map(|(i, p)| (NodeId::State(i), *p));
        let observations = self
            .observations
            .iter()
            .enumerate()
            .map(|(i, p)| (NodeId::Observation(i), *p));
        initial.into_iter().chain(states).chain(observations)
    }

    /// Axis-aligned bounds `(min, max)`; both zero for an empty layout.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        let mut points = self.nodes().map(|(_, p)| p);
        let Some(first) = points.next() else {
            return (Vec3::ZERO, Vec3::ZERO);
        };
        points.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)))
    }

    pub fn is_empty(&self) -> bool {
        self.counts.total() == 0
    }
}

/// Compute positions for every node.
///
/// Flat mode stacks the tiers vertically: `START` above the ring, the
/// hidden-state ring centred on the origin, observations on a row below.
/// Volumetric mode lays both rings in the `xz` plane and separates the tiers
/// along `y`; the observation ring is staggered half a slot so its nodes sit
/// between the states when seen from above.
pub fn compute_layout(counts: TierCounts, mode: LayoutMode) -> Layout {
    let state_radius = ring_radius(counts.states);

    let states = (0..counts.states)
        .map(|i| {
            let p = ring_point(i, counts.states, state_radius, 0.0);
            match mode {
                LayoutMode::Flat => Vec3::new(p.x, p.y, 0.0),
                LayoutMode::Volumetric => Vec3::new(p.x, 0.0, p.y),
            }
        })
        .collect();

    let initial = counts.has_initial.then(|| match mode {
        LayoutMode::Flat => Vec3::new(0.0, -(state_radius + TIER_GAP), 0.0),
        LayoutMode::Volumetric => Vec3::new(0.0, -TIER_GAP, 0.0),
    });

    let observations = match mode {
        LayoutMode::Flat => {
            let y = state_radius + TIER_GAP;
            (0..counts.observations)
                .map(|j| row_point(j, counts.observations, y))
                .collect()
        }
        LayoutMode::Volumetric => {
            let radius = ring_radius(counts.observations).max(state_radius);
            (0..counts.observations)
                .map(|j| {
                    let p = ring_point(j, counts.observations, radius, 0.5);
                    Vec3::new(p.x, TIER_GAP, p.y)
                })
                .collect()
        }
    };

    Layout {
        mode,
        counts,
        state_radius,
        initial,
        states,
        observations,
    }
}
