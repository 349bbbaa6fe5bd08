//! View renderer and inspector.
//!
//! [`render`] is a pure projection of the current frame inputs onto a
//! drawable [`Scene`]. It holds no state between frames and never fails:
//! degenerate input (no snapshot, all-zero matrices, a single state) yields a
//! sparse but valid scene.

use glam::Vec2;
use hmmviz_layout::{Layout, NodeId, Tier};
use serde::Serialize;

use crate::color::shade;
use crate::edges::{max_weight, Edge, EdgeKey, EdgeKind};
use crate::error::{Error, Result};
use crate::labels::Labels;
use crate::particles::ParticleField;
use crate::projection::{Fit, Projection};
use crate::settings::DiagramSettings;
use crate::snapshot::Snapshot;

/// Thinnest stroke an edge is drawn with.
pub const MIN_EDGE_WIDTH: f32 = 0.75;
/// Stroke of the heaviest edge in the frame.
pub const MAX_EDGE_WIDTH: f32 = 6.0;
/// Faintest opacity an edge is drawn with.
pub const MIN_EDGE_OPACITY: f32 = 0.25;

const TITLE_HEIGHT: f32 = 40.0;
const INSPECTOR_WIDTH: f32 = 280.0;
const MARGIN: f32 = 16.0;
/// Extra room around nodes for their captions.
const LABEL_PAD: f32 = 18.0;
/// Observation and START nodes are drawn smaller than hidden states.
const SECONDARY_NODE_SCALE: f32 = 0.7;
/// Opacity multiplier for edges not touching the current selection.
const DIMMED: f32 = 0.3;

/// The drawing target: a pixel size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Surface {
    pub width: u32,
    pub height: u32,
}

impl Default for Surface {
    fn default() -> Self {
        Self {
            width: 960,
            height: 720,
        }
    }
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::configuration(format!(
                "surface must have a positive size, got {width}x{height}"
            )));
        }
        Ok(Self { width, height })
    }

    fn size(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    /// Whether there is room for the inspector beside the diagram.
    fn has_side_panel(&self) -> bool {
        self.width as f32 >= INSPECTOR_WIDTH * 2.0
    }
}

/// Hover/click selection. Local view state, independent of playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Selection {
    #[default]
    None,
    Node { node: NodeId },
    Edge { edge: EdgeKey },
}

impl Selection {
    fn touches(&self, key: &EdgeKey) -> bool {
        match self {
            Selection::None => false,
            Selection::Node { node } => key.source == *node || key.target == *node,
            Selection::Edge { edge } => edge == key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneNode {
    pub id: NodeId,
    pub tier: Tier,
    pub label: String,
    pub center: Vec2,
    pub radius: f32,
    pub fill: String,
    pub stroke: String,
    pub text: String,
    pub selected: bool,
    /// Distance from the viewer; 0 in flat mode
    pub depth: f32,
}

/// Geometry of a drawn edge in surface coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EdgePath {
    Line { from: Vec2, to: Vec2 },
    /// Quadratic bezier
    Curve { from: Vec2, control: Vec2, to: Vec2 },
    /// Cubic bezier leaving and re-entering the same node
    Loop { from: Vec2, c1: Vec2, c2: Vec2, to: Vec2 },
}

impl EdgePath {
    /// Point at fractional progress `t ∈ [0, 1]` along the path.
    pub fn point_at(&self, t: f32) -> Vec2 {
        let t = t.clamp(0.0, 1.0);
        let u = 1.0 - t;
        match *self {
            EdgePath::Line { from, to } => from.lerp(to, t),
            EdgePath::Curve { from, control, to } => {
                from * (u * u) + control * (2.0 * u * t) + to * (t * t)
            }
            EdgePath::Loop { from, c1, c2, to } => {
                from * (u * u * u)
                    + c1 * (3.0 * u * u * t)
                    + c2 * (3.0 * u * t * t)
                    + to * (t * t * t)
            }
        }
    }

    pub fn end(&self) -> Vec2 {
        match *self {
            EdgePath::Line { to, .. } | EdgePath::Curve { to, .. } | EdgePath::Loop { to, .. } => to,
        }
    }

    /// Direction of travel at the end of the path, for arrowheads.
    pub fn end_direction(&self) -> Vec2 {
        let before = match *self {
            EdgePath::Line { from, .. } => from,
            EdgePath::Curve { control, .. } => control,
            EdgePath::Loop { c2, .. } => c2,
        };
        (self.end() - before).normalize_or_zero()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneEdge {
    pub key: EdgeKey,
    pub kind: EdgeKind,
    pub weight: f64,
    /// Weight with three decimals
    pub label: String,
    pub label_at: Vec2,
    pub width: f32,
    pub opacity: f32,
    pub color: String,
    pub path: EdgePath,
    pub highlighted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneParticle {
    pub edge: EdgeKey,
    pub position: Vec2,
    pub radius: f32,
    pub color: String,
}

/// What the inspector panel concentrates on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InspectorFocus {
    /// Nothing selected: the full model
    Overview {
        transition: Vec<Vec<f64>>,
        emission: Vec<Vec<f64>>,
        initial: Vec<f64>,
    },
    /// A hidden state: its outgoing and incoming transitions, emissions and
    /// initial probability
    State {
        index: usize,
        outgoing: Vec<f64>,
        incoming: Vec<f64>,
        emission: Vec<f64>,
        initial: Option<f64>,
    },
    /// An observation symbol: its emission column
    Observation { index: usize, emission: Vec<f64> },
    Initial { initial: Vec<f64> },
    Edge {
        key: EdgeKey,
        kind: EdgeKind,
        weight: f64,
    },
}

/// Exact numeric values of the current iteration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Inspector {
    pub iteration: u64,
    pub log_likelihood: f64,
    /// 0-based playback position
    pub position: usize,
    pub total: usize,
    pub focus: InspectorFocus,
    /// Human-readable rendering of the above, one line per entry
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scene {
    pub width: u32,
    pub height: u32,
    pub background: String,
    pub title: String,
    pub font_family: String,
    pub mono_font_family: String,
    pub nodes: Vec<SceneNode>,
    pub edges: Vec<SceneEdge>,
    pub particles: Vec<SceneParticle>,
    pub inspector: Option<Inspector>,
    /// Top-left corner of the inspector panel
    pub inspector_origin: Vec2,
}

impl Scene {
    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edge(&self, key: &EdgeKey) -> Option<&SceneEdge> {
        self.edges.iter().find(|e| e.key == *key)
    }
}

/// Everything one frame depends on.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub snapshot: Option<&'a Snapshot>,
    pub position: usize,
    pub total: usize,
    pub settings: &'a DiagramSettings,
    pub layout: &'a Layout,
    pub edges: &'a [Edge],
    pub particles: &'a ParticleField,
    pub selection: Selection,
    pub labels: &'a Labels,
}

/// Project one frame onto `surface`.
pub fn render(frame: &Frame<'_>, surface: Surface) -> Scene {
    let settings = frame.settings;
    let size = surface.size();
    let (area_origin, area_size, inspector_origin) = if surface.has_side_panel() {
        (
            Vec2::new(MARGIN, TITLE_HEIGHT),
            Vec2::new(size.x - INSPECTOR_WIDTH - 2.0 * MARGIN, size.y - TITLE_HEIGHT - MARGIN),
            Vec2::new(size.x - INSPECTOR_WIDTH, TITLE_HEIGHT),
        )
    } else {
        (
            Vec2::new(MARGIN, TITLE_HEIGHT),
            (size - Vec2::new(2.0 * MARGIN, TITLE_HEIGHT + MARGIN)).max(Vec2::ONE),
            Vec2::new(MARGIN, TITLE_HEIGHT),
        )
    };

    let projection = Projection::new(frame.layout);
    let projected: Vec<_> = frame
        .layout
        .nodes()
        .map(|(id, p)| {
            let (point, depth) = projection.project(p);
            (id, point, depth)
        })
        .collect();
    let base_radius = settings.node_radius;
    let fit = Fit::new(
        projected.iter().map(|(_, p, _)| *p),
        base_radius + LABEL_PAD,
        area_origin,
        area_size.max(Vec2::ONE),
    );

    let mut nodes: Vec<SceneNode> = projected
        .iter()
        .map(|&(id, point, depth)| scene_node(id, fit.apply(point), depth, base_radius * fit.scale, frame))
        .collect();

    let ring_center = centroid(
        nodes
            .iter()
            .filter(|n| n.tier == Tier::Hidden)
            .map(|n| n.center),
    )
    .unwrap_or_else(|| fit.apply(Vec2::ZERO));

    let max = max_weight(frame.edges) as f32;
    let selecting = frame.selection != Selection::None;
    let edges: Vec<SceneEdge> = frame
        .edges
        .iter()
        .filter_map(|edge| {
            let from = nodes.iter().find(|n| n.id == edge.source)?;
            let to = nodes.iter().find(|n| n.id == edge.target)?;
            let path = edge_path(edge, from, to, ring_center);
            let ratio = (edge.weight as f32 / max).clamp(0.0, 1.0);
            let highlighted = frame.selection.touches(&edge.key());
            let mut opacity = ratio.max(MIN_EDGE_OPACITY);
            if selecting && !highlighted {
                opacity *= DIMMED;
            }
            Some(SceneEdge {
                key: edge.key(),
                kind: edge.kind,
                weight: edge.weight,
                label: format!("{:.3}", edge.weight),
                label_at: path.point_at(0.5),
                width: MIN_EDGE_WIDTH + (MAX_EDGE_WIDTH - MIN_EDGE_WIDTH) * ratio,
                opacity,
                color: edge_color(edge, settings),
                path,
                highlighted,
            })
        })
        .collect();

    let particles = frame
        .particles
        .visible()
        .filter_map(|(key, flow)| {
            let edge = edges.iter().find(|e| e.key == *key)?;
            let radius = (1.5 + 2.0 * (flow.weight as f32 / max).clamp(0.0, 1.0)) * fit.scale.min(1.0);
            Some(flow.phases.iter().map(move |&phase| SceneParticle {
                edge: *key,
                position: edge.path.point_at(phase),
                radius,
                color: edge.color.clone(),
            }))
        })
        .flatten()
        .collect();

    // Painter's order: far nodes first.
    nodes.sort_by(|a, b| b.depth.total_cmp(&a.depth));

    Scene {
        width: surface.width,
        height: surface.height,
        background: settings.background_color.clone(),
        title: settings.title.clone(),
        font_family: settings.font_family.clone(),
        mono_font_family: settings.mono_font_family.clone(),
        nodes,
        edges,
        particles,
        inspector: frame.snapshot.map(|snapshot| inspect(snapshot, frame)),
        inspector_origin,
    }
}

fn scene_node(id: NodeId, center: Vec2, depth: f32, radius: f32, frame: &Frame<'_>) -> SceneNode {
    let settings = frame.settings;
    let (fill, stroke, text, radius) = match id {
        NodeId::State(i) => {
            let fill = settings.state_color(i).to_string();
            let stroke = shade(&fill, 0.3);
            (fill, stroke, "#FFFFFF".to_string(), radius)
        }
        NodeId::Observation(_) => (
            settings.observation.fill.clone(),
            settings.observation.stroke.clone(),
            settings.observation.text.clone(),
            radius * SECONDARY_NODE_SCALE,
        ),
        NodeId::Initial => (
            settings.initial.fill.clone(),
            settings.initial.stroke.clone(),
            settings.initial.text.clone(),
            radius * SECONDARY_NODE_SCALE,
        ),
    };
    SceneNode {
        id,
        tier: id.tier(),
        label: frame.labels.node(id),
        center,
        radius,
        fill,
        stroke,
        text,
        selected: frame.selection == Selection::Node { node: id },
        depth,
    }
}

fn edge_color(edge: &Edge, settings: &DiagramSettings) -> String {
    match (edge.kind, edge.source) {
        (EdgeKind::Transition, NodeId::State(i)) if edge.is_self_loop() => {
            settings.state_color(i).to_string()
        }
        (EdgeKind::Transition, _) => settings.edge_color.clone(),
        (EdgeKind::Emission, _) => settings.observation.stroke.clone(),
        (EdgeKind::Initial, _) => settings.initial.stroke.clone(),
    }
}

fn centroid(points: impl Iterator<Item = Vec2>) -> Option<Vec2> {
    let (sum, count) = points.fold((Vec2::ZERO, 0u32), |(s, c), p| (s + p, c + 1));
    (count > 0).then(|| sum / count as f32)
}

/// Path between two node boundaries.
///
/// Self-loops bulge away from the ring centre. Transitions between distinct
/// states bow to the right of travel so opposite directions do not overlap.
/// Emission and initial edges are straight.
fn edge_path(edge: &Edge, from: &SceneNode, to: &SceneNode, ring_center: Vec2) -> EdgePath {
    if edge.is_self_loop() {
        let outward = (from.center - ring_center).try_normalize().unwrap_or(Vec2::NEG_Y);
        let side = outward.perp();
        let r = from.radius;
        let start = from.center + (outward * 0.8 + side * 0.6).normalize() * r;
        let end = from.center + (outward * 0.8 - side * 0.6).normalize() * r;
        return EdgePath::Loop {
            from: start,
            c1: start + (outward + side * 0.9) * r * 1.6,
            c2: end + (outward - side * 0.9) * r * 1.6,
            to: end,
        };
    }

    let delta = to.center - from.center;
    let distance = delta.length();
    if distance <= from.radius + to.radius {
        return EdgePath::Line {
            from: from.center,
            to: to.center,
        };
    }
    let dir = delta / distance;
    let start = from.center + dir * from.radius;
    let end = to.center - dir * to.radius;

    if edge.kind == EdgeKind::Transition {
        // perp() is a counter-clockwise turn; negate for the right-hand side
        // in y-down screen space.
        let bow = -dir.perp() * distance * 0.12;
        EdgePath::Curve {
            from: start,
            control: (start + end) * 0.5 + bow,
            to: end,
        }
    } else {
        EdgePath::Line { from: start, to: end }
    }
}

fn inspect(snapshot: &Snapshot, frame: &Frame<'_>) -> Inspector {
    let labels = frame.labels;
    let focus = focus_for(snapshot, frame.selection);
    let mut lines = vec![
        format!("Iteration {} ({}/{})", snapshot.iteration, frame.position + 1, frame.total),
        format!("Log-likelihood {:.4}", snapshot.log_likelihood),
    ];

    let row = |values: &[f64]| {
        values
            .iter()
            .map(|v| format!("{v:.4}"))
            .collect::<Vec<_>>()
            .join("  ")
    };

    match &focus {
        InspectorFocus::Overview {
            transition,
            emission,
            initial,
        } => {
            lines.push("Transitions".into());
            for (i, r) in transition.iter().enumerate() {
                lines.push(format!("{}: {}", labels.state(i), row(r)));
            }
            if !emission.is_empty() {
                lines.push("Emissions".into());
                for (i, r) in emission.iter().enumerate() {
                    lines.push(format!("{}: {}", labels.state(i), row(r)));
                }
            }
            if !initial.is_empty() {
                lines.push(format!("Initial: {}", row(initial)));
            }
        }
        InspectorFocus::State {
            index,
            outgoing,
            incoming,
            emission,
            initial,
        } => {
            lines.push(format!("State {}", labels.state(*index)));
            lines.push(format!("Out: {}", row(outgoing)));
            lines.push(format!("In: {}", row(incoming)));
            if !emission.is_empty() {
                lines.push(format!("Emits: {}", row(emission)));
            }
            if let Some(p) = initial {
                lines.push(format!("Initial: {p:.4}"));
            }
        }
        InspectorFocus::Observation { index, emission } => {
            lines.push(format!("Observation {}", labels.observation(*index)));
            lines.push(format!("Emitted by: {}", row(emission)));
        }
        InspectorFocus::Initial { initial } => {
            lines.push(format!("Initial: {}", row(initial)));
        }
        InspectorFocus::Edge { key, weight, .. } => {
            lines.push(format!(
                "{} -> {}: {weight:.4}",
                labels.node(key.source),
                labels.node(key.target)
            ));
        }
    }

    Inspector {
        iteration: snapshot.iteration,
        log_likelihood: snapshot.log_likelihood,
        position: frame.position,
        total: frame.total,
        focus,
        lines,
    }
}

fn focus_for(snapshot: &Snapshot, selection: Selection) -> InspectorFocus {
    let n = snapshot.state_count();
    match selection {
        Selection::Node {
            node: NodeId::State(i),
        } if i < n => InspectorFocus::State {
            index: i,
            outgoing: snapshot.transition.row(i).map(<[f64]>::to_vec).unwrap_or_default(),
            incoming: snapshot.transition.column(i),
            emission: snapshot.emission.row(i).map(<[f64]>::to_vec).unwrap_or_default(),
            initial: snapshot.initial.get(i).copied(),
        },
        Selection::Node {
            node: NodeId::Observation(j),
        } if j < snapshot.observation_count() => InspectorFocus::Observation {
            index: j,
            emission: snapshot.emission.column(j),
        },
        Selection::Node {
            node: NodeId::Initial,
        } if snapshot.has_initial() => InspectorFocus::Initial {
            initial: snapshot.initial.clone(),
        },
        Selection::Edge { edge } => match edge_weight(snapshot, edge) {
            Some((kind, weight)) => InspectorFocus::Edge {
                key: edge,
                kind,
                weight,
            },
            None => overview(snapshot),
        },
        _ => overview(snapshot),
    }
}

fn overview(snapshot: &Snapshot) -> InspectorFocus {
    InspectorFocus::Overview {
        transition: snapshot.transition.clone().into(),
        emission: if snapshot.emission.is_empty() {
            Vec::new()
        } else {
            snapshot.emission.clone().into()
        },
        initial: snapshot.initial.clone(),
    }
}

/// Weight of an edge in the snapshot, drawn or not.
fn edge_weight(snapshot: &Snapshot, key: EdgeKey) -> Option<(EdgeKind, f64)> {
    match (key.source, key.target) {
        (NodeId::Initial, NodeId::State(j)) => {
            snapshot.initial.get(j).map(|w| (EdgeKind::Initial, *w))
        }
        (NodeId::State(i), NodeId::State(j)) => {
            snapshot.transition.get(i, j).map(|w| (EdgeKind::Transition, w))
        }
        (NodeId::State(i), NodeId::Observation(j)) => {
            snapshot.emission.get(i, j).map(|w| (EdgeKind::Emission, w))
        }
        _ => None,
    }
}
