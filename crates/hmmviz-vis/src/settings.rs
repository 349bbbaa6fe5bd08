//! Display settings shared by the static and interactive renderers.
//!
//! Every field has a documented default (see [`DiagramSettings::default`]) and
//! the struct is `#[serde(default)]`, so a partial JSON document overrides only
//! the fields it names. Settings are validated once at construction and never
//! change mid-render.

use std::path::Path;

use hmmviz_layout::LayoutMode;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::color::Rgb;
use crate::error::{Error, Result};

/// Fill, border and label colors for one node tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeColors {
    pub fill: String,
    pub stroke: String,
    pub text: String,
}

/// A richer palette entry used by the interactive diagram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteEntry {
    pub base: String,
    pub light: String,
    pub dark: String,
    pub grad: [String; 2],
}

impl PaletteEntry {
    fn new(base: &str, light: &str, dark: &str, grad: [&str; 2]) -> Self {
        Self {
            base: base.into(),
            light: light.into(),
            dark: dark.into(),
            grad: grad.map(String::from),
        }
    }
}

/// Graphviz node shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeShape {
    #[default]
    Circle,
    DoubleCircle,
    Ellipse,
    Box,
    Point,
}

impl NodeShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeShape::Circle => "circle",
            NodeShape::DoubleCircle => "doublecircle",
            NodeShape::Ellipse => "ellipse",
            NodeShape::Box => "box",
            NodeShape::Point => "point",
        }
    }
}

/// Graphviz layout engine used by the static renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutEngine {
    #[default]
    Circo,
    Dot,
    Neato,
    Fdp,
    Sfdp,
    Twopi,
}

impl LayoutEngine {
    /// Name of the engine, which is also the name of its executable.
    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutEngine::Circo => "circo",
            LayoutEngine::Dot => "dot",
            LayoutEngine::Neato => "neato",
            LayoutEngine::Fdp => "fdp",
            LayoutEngine::Sfdp => "sfdp",
            LayoutEngine::Twopi => "twopi",
        }
    }
}

/// Export format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Svg,
    Png,
    Pdf,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Svg => "svg",
            OutputFormat::Png => "png",
            OutputFormat::Pdf => "pdf",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Svg => "image/svg+xml",
            OutputFormat::Png => "image/png",
            OutputFormat::Pdf => "application/pdf",
        }
    }
}

/// Configuration for both the static and the interactive diagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagramSettings {
    /// Hidden-state colors, cycled by `index mod len`
    pub state_colors: Vec<String>,
    /// Richer hidden-state palette for the interactive diagram
    pub interactive_state_colors: Vec<PaletteEntry>,
    pub observation: NodeColors,
    /// Colors of the `START` node
    pub initial: NodeColors,
    pub background_color: String,
    pub font_family: String,
    /// Used for numeric labels
    pub mono_font_family: String,
    pub title: String,
    /// Edges lighter than this are never drawn
    pub prob_threshold: f64,
    /// Color of inter-state edges
    pub edge_color: String,
    pub node_shape: NodeShape,
    pub node_radius: f32,
    pub layout_engine: LayoutEngine,
    pub output_format: OutputFormat,
    pub layout_mode: LayoutMode,
    pub particles_enabled: bool,
    pub decongestion_enabled: bool,
    /// Global time scale; 0 freezes the animation
    pub animation_speed: f64,
    /// Relative cutoff against a node's strongest edge when de-congesting
    pub decongestion_ratio: f64,
    pub max_particles_per_edge: usize,
    /// Time spent on each iteration at 1x speed
    pub iteration_interval_ms: u64,
    /// Cadence of the real-time tick source
    pub frame_interval_ms: u64,
}

impl Default for DiagramSettings {
    fn default() -> Self {
        Self {
            state_colors: [
                "#2E86AB", "#A23B72", "#F18F01", "#2CA58D", "#E84855", "#6B4226", "#7768AE",
                "#1B998B",
            ]
            .map(String::from)
            .to_vec(),
            interactive_state_colors: vec![
                PaletteEntry::new("#F59E0B", "#FDE68A", "#92400E", ["#FBBF24", "#D97706"]),
                PaletteEntry::new("#3B82F6", "#93C5FD", "#1E3A8A", ["#60A5FA", "#2563EB"]),
                PaletteEntry::new("#10B981", "#6EE7B7", "#064E3B", ["#34D399", "#059669"]),
                PaletteEntry::new("#F43F5E", "#FDA4AF", "#881337", ["#FB7185", "#E11D48"]),
                PaletteEntry::new("#8B5CF6", "#C4B5FD", "#4C1D95", ["#A78BFA", "#7C3AED"]),
                PaletteEntry::new("#06B6D4", "#67E8F9", "#155E75", ["#22D3EE", "#0891B2"]),
                PaletteEntry::new("#EC4899", "#F9A8D4", "#831843", ["#F472B6", "#DB2777"]),
                PaletteEntry::new("#14B8A6", "#5EEAD4", "#134E4A", ["#2DD4BF", "#0D9488"]),
                PaletteEntry::new("#F97316", "#FDBA74", "#7C2D12", ["#FB923C", "#EA580C"]),
                PaletteEntry::new("#6366F1", "#A5B4FC", "#3730A3", ["#818CF8", "#4F46E5"]),
                PaletteEntry::new("#84CC16", "#BEF264", "#3F6212", ["#A3E635", "#65A30D"]),
                PaletteEntry::new("#E879F9", "#F0ABFC", "#701A75", ["#D946EF", "#C026D3"]),
            ],
            observation: NodeColors {
                fill: "#F1F5F9".into(),
                stroke: "#94A3B8".into(),
                text: "#334155".into(),
            },
            initial: NodeColors {
                fill: "#F5F3FF".into(),
                stroke: "#8B5CF6".into(),
                text: "#5B21B6".into(),
            },
            background_color: "#FAFAFA".into(),
            font_family: "Helvetica".into(),
            mono_font_family: "JetBrains Mono, monospace".into(),
            title: "State Transition Diagram".into(),
            prob_threshold: 0.01,
            edge_color: "#333333".into(),
            node_shape: NodeShape::Circle,
            node_radius: 40.0,
            layout_engine: LayoutEngine::Circo,
            output_format: OutputFormat::Svg,
            layout_mode: LayoutMode::Flat,
            particles_enabled: true,
            decongestion_enabled: false,
            animation_speed: 1.0,
            decongestion_ratio: 0.2,
            max_particles_per_edge: 6,
            iteration_interval_ms: 600,
            frame_interval_ms: 16,
        }
    }
}

impl DiagramSettings {
    /// Parse a (possibly partial) JSON document and validate it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validated()
    }

    /// Load settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Consume and return self if valid.
    pub fn validated(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.state_colors.is_empty() {
            return Err(Error::configuration("state_colors must not be empty"));
        }
        let colors = self
            .state_colors
            .iter()
            .map(|c| ("state_colors", c))
            .chain([
                ("observation.fill", &self.observation.fill),
                ("observation.stroke", &self.observation.stroke),
                ("observation.text", &self.observation.text),
                ("initial.fill", &self.initial.fill),
                ("initial.stroke", &self.initial.stroke),
                ("initial.text", &self.initial.text),
                ("background_color", &self.background_color),
                ("edge_color", &self.edge_color),
            ]);
        for (field, value) in colors {
            if Rgb::parse(value).is_none() {
                return Err(Error::configuration(format!(
                    "{field}: {value:?} is not a #RGB or #RRGGBB color"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.prob_threshold) {
            return Err(Error::configuration(format!(
                "prob_threshold {} outside [0, 1]",
                self.prob_threshold
            )));
        }
        if !(self.node_radius.is_finite() && self.node_radius > 0.0) {
            return Err(Error::configuration("node_radius must be positive"));
        }
        if !(self.animation_speed.is_finite() && self.animation_speed >= 0.0) {
            return Err(Error::configuration(format!(
                "animation_speed {} must be a finite value >= 0",
                self.animation_speed
            )));
        }
        if !(0.0..=1.0).contains(&self.decongestion_ratio) {
            return Err(Error::configuration("decongestion_ratio outside [0, 1]"));
        }
        if self.max_particles_per_edge == 0 {
            return Err(Error::configuration("max_particles_per_edge must be at least 1"));
        }
        if self.iteration_interval_ms == 0 || self.frame_interval_ms == 0 {
            return Err(Error::configuration("intervals must be positive"));
        }
        Ok(())
    }

    /// Color of hidden state `index`, cycling through the palette.
    pub fn state_color(&self, index: usize) -> &str {
        if self.state_colors.is_empty() {
            return "#888888";
        }
        &self.state_colors[index % self.state_colors.len()]
    }

    /// The subset of settings the interactive engine consumes, in its
    /// camelCase wire form.
    pub fn to_interactive_config(&self) -> serde_json::Value {
        json!({
            "stateColors": self.interactive_state_colors,
            "obsColor": {
                "fill": self.observation.fill,
                "stroke": self.observation.stroke,
                "dark": self.observation.text,
            },
            "piColor": {
                "fill": self.initial.fill,
                "stroke": self.initial.stroke,
                "dark": self.initial.text,
            },
            "particlesEnabled": self.particles_enabled,
            "decongestionEnabled": self.decongestion_enabled,
            "animationSpeed": self.animation_speed,
            "fontFamily": self.font_family,
            "monoFontFamily": self.mono_font_family,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn defaults_are_valid() {
        let settings = DiagramSettings::default();
        settings.validate().unwrap();
        assert_eq!(settings.prob_threshold, 0.01);
        assert_eq!(settings.state_colors.len(), 8);
        assert_eq!(settings.interactive_state_colors.len(), 12);
        assert_eq!(settings.layout_engine.as_str(), "circo");
    }

    #[test]
    fn palette_cycles() {
        let settings = DiagramSettings {
            state_colors: vec!["#111111".into(), "#222222".into(), "#333333".into()],
            ..Default::default()
        };
        for i in 0..10 {
            assert_eq!(settings.state_color(i), settings.state_colors[i % 3]);
        }
    }

    #[test]
    fn partial_json_overrides_named_fields() {
        let settings = DiagramSettings::from_json_str(
            r#"{"title": "Weather", "prob_threshold": 0.05, "layout_engine": "neato"}"#,
        )
        .unwrap();
        assert_eq!(settings.title, "Weather");
        assert_eq!(settings.prob_threshold, 0.05);
        assert_eq!(settings.layout_engine, LayoutEngine::Neato);
        assert_eq!(settings.font_family, "Helvetica");
    }

    #[test]
    fn threshold_outside_unit_interval_is_rejected() {
        let err = DiagramSettings::from_json_str(r#"{"prob_threshold": 1.5}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn bad_color_is_rejected() {
        let settings = DiagramSettings {
            edge_color: "black".into(),
            ..Default::default()
        };
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("edge_color"));
    }

    #[test]
    fn empty_palette_is_rejected() {
        let settings = DiagramSettings {
            state_colors: Vec::new(),
            ..Default::default()
        };
        assert_eq!(settings.validate().unwrap_err().kind(), ErrorKind::Configuration);
    }

    #[test]
    fn negative_animation_speed_is_rejected() {
        let settings = DiagramSettings {
            animation_speed: -1.0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());

        let frozen = DiagramSettings {
            animation_speed: 0.0,
            ..Default::default()
        };
        frozen.validate().unwrap();
    }

    #[test]
    fn shapes_use_graphviz_names() {
        let shape: NodeShape = serde_json::from_str("\"doublecircle\"").unwrap();
        assert_eq!(shape, NodeShape::DoubleCircle);
        assert_eq!(shape.as_str(), "doublecircle");
    }

    #[test]
    fn interactive_config_uses_camel_case() {
        let config = DiagramSettings::default().to_interactive_config();
        assert_eq!(config["particlesEnabled"], true);
        assert_eq!(config["decongestionEnabled"], false);
        assert_eq!(config["obsColor"]["dark"], "#334155");
        assert_eq!(config["piColor"]["stroke"], "#8B5CF6");
        assert_eq!(config["stateColors"][0]["base"], "#F59E0B");
        assert_eq!(config["stateColors"][0]["grad"][1], "#D97706");
    }

    #[test]
    fn load_reads_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"decongestion_enabled": true}"#).unwrap();
        let settings = DiagramSettings::load(&path).unwrap();
        assert!(settings.decongestion_enabled);
    }

    #[test]
    fn output_formats_know_their_mime_types() {
        assert_eq!(OutputFormat::Png.mime_type(), "image/png");
        assert_eq!(OutputFormat::Svg.extension(), "svg");
    }
}
