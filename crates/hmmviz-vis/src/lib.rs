//! hmmviz Visualization
//!
//! Animated replay of per-iteration HMM training state with playback controls.
//!
//! # Architecture
//!
//! - **Buffer**: Ordered, append-only snapshots of one training run
//! - **Playback**: Play, pause, step and seek through the run at any speed
//! - **Edges / Particles**: Which edges to draw, and the flow along them
//! - **Scene**: Stateless projection of the current frame, exported as SVG or PNG
//! - **Static**: Graphviz description of a single transition matrix
//! - **Ticker**: Real-time (tokio) or manual tick sources
//!
//! # Usage
//!
//! ```ignore
//! let diagram = Diagram::new(Surface::default(), DiagramSettings::default())?;
//! diagram.load(TrainingSimulation::run(SimulationConfig::default()))?;
//! diagram.on_complete(|c| println!("done at iteration {}", c.iteration));
//! diagram.start()?;
//! diagram.play();
//! ```

mod buffer;
mod color;
mod diagram;
mod dot;
mod edges;
mod error;
mod export;
mod labels;
mod particles;
mod playback;
mod projection;
mod scene;
mod settings;
mod simulation;
mod snapshot;
mod ticker;

pub use buffer::SnapshotBuffer;
pub use color::{shade, Rgb};
pub use diagram::{Completion, Diagram, DiagramStatus};
pub use dot::{pen_width, render_static, Attrs, DotEdge, DotNode, GraphDescription, StaticOverrides};
pub use edges::{max_weight, select_edges, Edge, EdgeKey, EdgeKind, EdgeSelector, DEFAULT_DECONGESTION_RATIO};
pub use error::{Error, ErrorKind, Result};
#[cfg(feature = "png")]
pub use export::PngExporter;
pub use export::{SceneExporter, SvgExporter};
pub use labels::{Labels, INITIAL_LABEL};
pub use particles::{flow_speed, particle_count, EdgeFlow, FlowStats, ParticleField};
pub use playback::{Jump, Playback, PlaybackState, PlaybackStatus, TickOutcome};
pub use projection::{Fit, Projection};
pub use scene::{
    render, EdgePath, Frame, Inspector, InspectorFocus, Scene, SceneEdge, SceneNode,
    SceneParticle, Selection, Surface, MAX_EDGE_WIDTH, MIN_EDGE_OPACITY, MIN_EDGE_WIDTH,
};
pub use settings::{DiagramSettings, LayoutEngine, NodeColors, NodeShape, OutputFormat, PaletteEntry};
pub use simulation::{
    SimulationConfig, TrainingSimulation, ITERATION_RANGE, OBSERVATION_RANGE, STATE_RANGE,
};
pub use snapshot::{Distribution, Matrix, RowViolation, Snapshot, ROW_SUM_TOLERANCE};
pub use ticker::{ManualClock, TickSink, TokioTicker};

pub use hmmviz_layout::{LayoutMode, NodeId, Tier, TierCounts};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_run_replays_end_to_end() {
        let diagram = Diagram::new(Surface::default(), DiagramSettings::default()).unwrap();
        diagram
            .load(TrainingSimulation::run(SimulationConfig {
                iterations: 8,
                ..SimulationConfig::default()
            }))
            .unwrap();
        assert_eq!(diagram.len(), 8);

        diagram.play();
        let mut clock = ManualClock::new(&diagram, std::time::Duration::from_millis(16));
        assert!(clock.run_until(100_000, || diagram.state() == PlaybackState::Complete));
        assert_eq!(diagram.current_index(), 7);

        let scene = diagram.scene();
        assert_eq!(scene.nodes.len(), 1 + 3 + 4);
        assert!(!scene.edges.is_empty());
    }

    #[test]
    fn palette_cycles_past_its_length() {
        let settings = DiagramSettings {
            state_colors: vec!["#111111".into(), "#222222".into()],
            ..DiagramSettings::default()
        };
        assert_eq!(settings.state_color(0), "#111111");
        assert_eq!(settings.state_color(3), "#222222");
        assert_eq!(settings.state_color(4), "#111111");
    }
}
