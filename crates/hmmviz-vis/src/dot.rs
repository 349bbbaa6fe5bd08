//! Static Graphviz rendering of a single transition matrix.
//!
//! [`render_static`] builds a [`GraphDescription`], a plain value that can be
//! turned into DOT source with [`GraphDescription::to_dot`] or handed to the
//! Graphviz engine binary with [`GraphDescription::render_with_graphviz`].

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::labels::Labels;
use crate::settings::{DiagramSettings, LayoutEngine, OutputFormat};
use crate::snapshot::Matrix;

/// Per-call replacements for settings values.
#[derive(Debug, Clone, Default)]
pub struct StaticOverrides {
    pub format: Option<OutputFormat>,
    pub title: Option<String>,
    pub threshold: Option<f64>,
}

/// A node or edge attribute list, in insertion order.
pub type Attrs = Vec<(&'static str, String)>;

#[derive(Debug, Clone, PartialEq)]
pub struct DotNode {
    pub id: String,
    pub attrs: Attrs,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DotEdge {
    pub source: String,
    pub target: String,
    pub weight: f64,
    pub attrs: Attrs,
}

/// A directed graph ready for Graphviz.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphDescription {
    pub name: String,
    pub engine: LayoutEngine,
    pub format: OutputFormat,
    pub title: String,
    pub graph_attrs: Attrs,
    pub nodes: Vec<DotNode>,
    pub edges: Vec<DotEdge>,
}

/// Graphviz `penwidth` for an edge of probability `p` when the heaviest
/// entry of the matrix is `max`.
pub fn pen_width(p: f64, max: f64) -> f64 {
    let max = if max > 0.0 { max } else { 1.0 };
    ((0.5 + 3.5 * (p / max)) * 100.0).round() / 100.0
}

/// Build the static diagram of `matrix`.
///
/// Every state becomes a filled node in its palette color. An edge `i → j`
/// is drawn when `p ≥ threshold`; self-loops take the state's color, other
/// edges the configured edge color.
pub fn render_static(
    matrix: &Matrix,
    labels: &Labels,
    settings: &DiagramSettings,
    overrides: &StaticOverrides,
) -> Result<GraphDescription> {
    let n = matrix.rows();
    if !matrix.is_square() {
        return Err(Error::validation(format!(
            "transition matrix is {}x{}, expected square",
            n,
            matrix.cols()
        )));
    }
    if let Some(states) = &labels.states {
        if states.len() != n {
            return Err(Error::validation(format!(
                "{} state labels for {n} states",
                states.len()
            )));
        }
    }

    let format = overrides.format.unwrap_or(settings.output_format);
    let title = overrides
        .title
        .clone()
        .unwrap_or_else(|| settings.title.clone());
    let threshold = overrides.threshold.unwrap_or(settings.prob_threshold);

    let graph_attrs: Attrs = vec![
        ("rankdir", "LR".into()),
        ("bgcolor", settings.background_color.clone()),
        ("label", title.clone()),
        ("labelloc", "t".into()),
        ("fontsize", "18".into()),
        ("fontname", settings.font_family.clone()),
        ("pad", "0.5".into()),
    ];

    let nodes = (0..n)
        .map(|i| DotNode {
            id: i.to_string(),
            attrs: vec![
                ("label", labels.state(i)),
                ("shape", settings.node_shape.as_str().into()),
                ("style", "filled".into()),
                ("fillcolor", settings.state_color(i).into()),
                ("fontcolor", "white".into()),
                ("fontsize", "14".into()),
                ("fontname", format!("{} Bold", settings.font_family)),
                ("width", "1.0".into()),
                ("height", "1.0".into()),
                ("fixedsize", "true".into()),
            ],
        })
        .collect();

    let max = matrix.max();
    let mut edges = Vec::new();
    for (i, row) in matrix.iter_rows().enumerate() {
        for (j, &p) in row.iter().enumerate() {
            if p < threshold {
                continue;
            }
            let color = if i == j {
                settings.state_color(i).to_string()
            } else {
                settings.edge_color.clone()
            };
            edges.push(DotEdge {
                source: i.to_string(),
                target: j.to_string(),
                weight: p,
                attrs: vec![
                    ("label", format!("{p:.3}")),
                    ("penwidth", format!("{:?}", pen_width(p, max))),
                    ("fontsize", "10".into()),
                    ("fontname", settings.font_family.clone()),
                    ("color", color.clone()),
                    ("fontcolor", color),
                ],
            });
        }
    }
    debug!(states = n, edges = edges.len(), threshold, "built static diagram");

    Ok(GraphDescription {
        name: "StateDiagram".into(),
        engine: settings.layout_engine,
        format,
        title,
        graph_attrs,
        nodes,
        edges,
    })
}

impl GraphDescription {
    /// DOT source.
    pub fn to_dot(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_dot(&mut out);
        out
    }

    fn write_dot(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, "// {}", self.title.replace('\n', " "))?;
        writeln!(out, "digraph {} {{", quote(&self.name))?;
        writeln!(out, "\tgraph [{}]", attr_list(&self.graph_attrs))?;
        for node in &self.nodes {
            writeln!(out, "\t{} [{}]", quote(&node.id), attr_list(&node.attrs))?;
        }
        for edge in &self.edges {
            writeln!(
                out,
                "\t{} -> {} [{}]",
                quote(&edge.source),
                quote(&edge.target),
                attr_list(&edge.attrs)
            )?;
        }
        writeln!(out, "}}")
    }

    /// Run the layout engine binary to write the rendered diagram to `path`.
    pub fn render_with_graphviz(&self, path: &Path) -> Result<()> {
        let engine = self.engine.as_str();
        let mut child = Command::new(engine)
            .arg(format!("-T{}", self.format.extension()))
            .arg("-o")
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    Error::export(format!("graphviz engine `{engine}` not found on PATH"))
                }
                _ => Error::Io(e),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(self.to_dot().as_bytes())?;
        }
        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(Error::export(format!(
                "{engine} exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        info!(path = %path.display(), engine, "rendered static diagram");
        Ok(())
    }
}

fn attr_list(attrs: &Attrs) -> String {
    attrs
        .iter()
        .map(|(k, v)| format!("{k}={}", quote(v)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}
