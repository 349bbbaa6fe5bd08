//! Edge selection and de-congestion.
//!
//! Decides which transition, emission and initial edges of a snapshot are
//! drawn. Output order is fixed: initial edges, then transitions, then
//! emissions; within a kind by source ascending, then target ascending.

use hmmviz_layout::NodeId;
use serde::Serialize;

use crate::settings::DiagramSettings;
use crate::snapshot::Snapshot;

/// Relative cutoff used when no settings are supplied.
pub const DEFAULT_DECONGESTION_RATIO: f64 = 0.2;

/// What an edge carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Initial,
    Transition,
    Emission,
}

/// Identity of an edge independent of its weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EdgeKey {
    pub source: NodeId,
    pub target: NodeId,
}

/// A drawn edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    pub weight: f64,
    pub kind: EdgeKind,
}

impl Edge {
    pub fn key(&self) -> EdgeKey {
        EdgeKey {
            source: self.source,
            target: self.target,
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

/// Threshold and de-congestion parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeSelector {
    pub threshold: f64,
    pub decongestion: bool,
    /// Edges below `ratio × strongest` of their source are dropped when
    /// de-congesting
    pub ratio: f64,
}

impl EdgeSelector {
    pub fn new(threshold: f64, decongestion: bool) -> Self {
        Self {
            threshold,
            decongestion,
            ratio: DEFAULT_DECONGESTION_RATIO,
        }
    }

    pub fn from_settings(settings: &DiagramSettings, decongestion: bool) -> Self {
        Self {
            threshold: settings.prob_threshold,
            decongestion,
            ratio: settings.decongestion_ratio,
        }
    }

    pub fn with_ratio(mut self, ratio: f64) -> Self {
        self.ratio = ratio;
        self
    }

    /// Select the drawn edges of `snapshot`.
    ///
    /// An edge passes the threshold when its weight is positive and at least
    /// `threshold`. De-congestion then applies per source state to
    /// transitions and emissions: self-loops that passed the threshold are
    /// kept, the source's strongest passing edge is kept, and any other edge
    /// is kept only if it reaches `ratio` of that strongest weight.
    pub fn select(&self, snapshot: &Snapshot) -> Vec<Edge> {
        let mut edges = Vec::new();

        self.select_row(
            &snapshot.initial,
            NodeId::Initial,
            EdgeKind::Initial,
            NodeId::State,
            &mut edges,
        );
        for (i, row) in snapshot.transition.iter_rows().enumerate() {
            self.select_row(
                row,
                NodeId::State(i),
                EdgeKind::Transition,
                NodeId::State,
                &mut edges,
            );
        }
        if !snapshot.emission.is_empty() {
            for (i, row) in snapshot.emission.iter_rows().enumerate() {
                self.select_row(
                    row,
                    NodeId::State(i),
                    EdgeKind::Emission,
                    NodeId::Observation,
                    &mut edges,
                );
            }
        }
        edges
    }

    fn passes(&self, weight: f64) -> bool {
        weight.is_finite() && weight > 0.0 && weight >= self.threshold
    }

    fn select_row(
        &self,
        row: &[f64],
        source: NodeId,
        kind: EdgeKind,
        target: fn(usize) -> NodeId,
        out: &mut Vec<Edge>,
    ) {
        // First maximum wins, so ties resolve to the lowest target index.
        let strongest = row
            .iter()
            .enumerate()
            .filter(|(_, w)| self.passes(**w))
            .fold(None, |best: Option<(usize, f64)>, (j, &w)| match best {
                Some((_, bw)) if bw >= w => best,
                _ => Some((j, w)),
            });

        let decongest = self.decongestion && kind != EdgeKind::Initial;

        for (j, &weight) in row.iter().enumerate() {
            if !self.passes(weight) {
                continue;
            }
            let edge = Edge {
                source,
                target: target(j),
                weight,
                kind,
            };
            if decongest {
                let Some((best_j, best_w)) = strongest else {
                    continue;
                };
                let keep = edge.is_self_loop() || j == best_j || weight >= self.ratio * best_w;
                if !keep {
                    continue;
                }
            }
            out.push(edge);
        }
    }
}

/// Convenience wrapper with the default de-congestion ratio.
pub fn select_edges(snapshot: &Snapshot, threshold: f64, decongestion_enabled: bool) -> Vec<Edge> {
    EdgeSelector::new(threshold, decongestion_enabled).select(snapshot)
}

/// Largest weight among `edges`, or 1 when there is nothing positive.
pub fn max_weight(edges: &[Edge]) -> f64 {
    let max = edges
        .iter()
        .map(|e| e.weight)
        .filter(|w| w.is_finite())
        .fold(0.0, f64::max);
    if max > 0.0 {
        max
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Matrix;
    use proptest::prelude::*;

    fn transitions(rows: Vec<Vec<f64>>) -> Snapshot {
        Snapshot::from_transition(1, Matrix::from_rows(rows).unwrap())
    }

    #[test]
    fn two_state_matrix_without_threshold_selects_every_edge() {
        let snap = transitions(vec![vec![0.7, 0.3], vec![0.4, 0.6]]);
        let edges = select_edges(&snap, 0.0, false);
        assert_eq!(edges.len(), 4);
        assert!(edges.iter().all(|e| e.kind == EdgeKind::Transition));
    }

    #[test]
    fn threshold_leaves_only_self_loops() {
        let snap = transitions(vec![vec![0.95, 0.05], vec![0.02, 0.98]]);
        let edges = select_edges(&snap, 0.1, false);
        assert_eq!(edges.len(), 2);
        assert!(edges.iter().all(Edge::is_self_loop));
    }

    #[test]
    fn identity_matrix_selects_only_self_loops() {
        let snap = Snapshot::from_transition(1, Matrix::identity(3));
        for threshold in [0.0, 0.01, 0.5, 1.0] {
            for decongestion in [false, true] {
                let edges = select_edges(&snap, threshold, decongestion);
                assert_eq!(edges.len(), 3, "threshold {threshold}, decongestion {decongestion}");
                assert!(edges.iter().all(Edge::is_self_loop));
            }
        }
    }

    #[test]
    fn order_is_source_then_target() {
        let snap = transitions(vec![vec![0.5, 0.5], vec![0.5, 0.5]]);
        let keys: Vec<_> = select_edges(&snap, 0.0, false)
            .iter()
            .map(|e| (e.source, e.target))
            .collect();
        assert_eq!(
            keys,
            vec![
                (NodeId::State(0), NodeId::State(0)),
                (NodeId::State(0), NodeId::State(1)),
                (NodeId::State(1), NodeId::State(0)),
                (NodeId::State(1), NodeId::State(1)),
            ]
        );
    }

    #[test]
    fn decongestion_drops_weak_edges_but_keeps_loops_and_strongest() {
        let snap = transitions(vec![
            vec![0.05, 0.80, 0.15],
            vec![0.30, 0.65, 0.05],
            vec![0.45, 0.50, 0.05],
        ]);
        let edges = EdgeSelector::new(0.01, true).with_ratio(0.2).select(&snap);
        let has = |s: usize, t: usize| {
            edges
                .iter()
                .any(|e| e.source == NodeId::State(s) && e.target == NodeId::State(t))
        };
        // Weak self-loop survives, weak cross edge does not.
        assert!(has(0, 0));
        assert!(has(0, 1));
        assert!(!has(0, 2));
        assert!(has(1, 0));
        assert!(has(2, 2));
        assert!(!has(1, 2));
        assert!(has(2, 0) && has(2, 1));
    }

    #[test]
    fn decongestion_still_honours_threshold_for_self_loops() {
        let snap = transitions(vec![vec![0.005, 0.995], vec![0.5, 0.5]]);
        let edges = select_edges(&snap, 0.01, true);
        assert!(!edges
            .iter()
            .any(|e| e.source == NodeId::State(0) && e.is_self_loop()));
    }

    #[test]
    fn emission_and_initial_edges_are_selected() {
        let snap = Snapshot::new(
            1,
            Matrix::identity(2),
            Matrix::from_rows(vec![vec![0.9, 0.1, 0.0], vec![0.2, 0.2, 0.6]]).unwrap(),
            vec![0.25, 0.75],
            0.0,
        );
        let edges = select_edges(&snap, 0.0, false);
        let count = |kind| edges.iter().filter(|e| e.kind == kind).count();
        assert_eq!(count(EdgeKind::Initial), 2);
        assert_eq!(count(EdgeKind::Transition), 2);
        assert_eq!(count(EdgeKind::Emission), 5);
        assert_eq!(edges[0].source, NodeId::Initial);
        assert_eq!(edges.last().unwrap().target, NodeId::Observation(2));
    }

    #[test]
    fn all_zero_matrix_selects_nothing() {
        let snap = transitions(vec![vec![0.0, 0.0], vec![0.0, 0.0]]);
        assert!(select_edges(&snap, 0.0, true).is_empty());
        assert_eq!(max_weight(&[]), 1.0);
    }

    fn square_matrix() -> impl Strategy<Value = Vec<Vec<f64>>> {
        (1usize..6).prop_flat_map(|n| {
            proptest::collection::vec(proptest::collection::vec(0.0f64..1.0, n), n)
        })
    }

    proptest! {
        #[test]
        fn selection_is_deterministic(
            rows in square_matrix(),
            threshold in 0.0f64..1.0,
            decongestion in any::<bool>(),
        ) {
            let snap = transitions(rows);
            prop_assert_eq!(
                select_edges(&snap, threshold, decongestion),
                select_edges(&snap, threshold, decongestion)
            );
        }

        #[test]
        fn strongest_outgoing_edge_is_never_dropped(
            rows in square_matrix(),
            threshold in 0.0f64..1.0,
            decongestion in any::<bool>(),
        ) {
            let snap = transitions(rows.clone());
            let edges = select_edges(&snap, threshold, decongestion);
            for (i, row) in rows.iter().enumerate() {
                let max = row.iter().copied().fold(0.0, f64::max);
                if max > 0.0 && max >= threshold {
                    let kept = edges.iter().any(|e| {
                        e.source == NodeId::State(i) && e.weight == max
                    });
                    prop_assert!(kept, "row {} lost its strongest edge", i);
                }
            }
        }
    }
}
