//! Scene exporters.
//!
//! [`SvgExporter`] writes a standalone SVG document. [`PngExporter`] (feature
//! `png`) rasterizes that document with resvg and encodes it with `image`.

use std::fmt::Write as _;

use glam::Vec2;

use crate::error::Result;
use crate::scene::{EdgePath, Scene};
use crate::settings::OutputFormat;

/// Serializes a [`Scene`] into an encoded document.
pub trait SceneExporter {
    fn format(&self) -> OutputFormat;

    fn export(&self, scene: &Scene) -> Result<Vec<u8>>;
}

/// Standalone SVG output.
#[derive(Debug, Clone, Copy, Default)]
pub struct SvgExporter;

impl SvgExporter {
    pub fn new() -> Self {
        Self
    }

    /// The SVG document as text.
    pub fn to_svg_string(&self, scene: &Scene) -> String {
        let mut out = String::with_capacity(8 * 1024);
        // Writing into a String cannot fail.
        let _ = write_svg(&mut out, scene);
        out
    }
}

impl SceneExporter for SvgExporter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Svg
    }

    fn export(&self, scene: &Scene) -> Result<Vec<u8>> {
        Ok(self.to_svg_string(scene).into_bytes())
    }
}

const TITLE_SIZE: f32 = 18.0;
const EDGE_LABEL_SIZE: f32 = 10.0;
const NODE_LABEL_SIZE: f32 = 13.0;
const INSPECTOR_SIZE: f32 = 11.0;
const INSPECTOR_LINE: f32 = 15.0;

fn write_svg(out: &mut String, scene: &Scene) -> std::fmt::Result {
    let (w, h) = (scene.width, scene.height);
    writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#
    )?;
    writeln!(
        out,
        r#"<rect width="{w}" height="{h}" fill="{}"/>"#,
        escape(&scene.background)
    )?;
    writeln!(
        out,
        r#"<text x="{:.2}" y="26" text-anchor="middle" font-family="{}" font-size="{TITLE_SIZE}" font-weight="bold" fill="{}">{}</text>"#,
        w as f32 / 2.0,
        escape(&scene.font_family),
        "#1F2937",
        escape(&scene.title)
    )?;

    writeln!(out, r#"<g class="edges">"#)?;
    for edge in &scene.edges {
        writeln!(
            out,
            r#"<path d="{}" fill="none" stroke="{}" stroke-width="{:.2}" stroke-opacity="{:.3}"/>"#,
            path_data(&edge.path),
            escape(&edge.color),
            edge.width,
            edge.opacity
        )?;
        if let Some([a, b, c]) = arrowhead(&edge.path, edge.width) {
            writeln!(
                out,
                r#"<polygon points="{:.2},{:.2} {:.2},{:.2} {:.2},{:.2}" fill="{}" fill-opacity="{:.3}"/>"#,
                a.x,
                a.y,
                b.x,
                b.y,
                c.x,
                c.y,
                escape(&edge.color),
                edge.opacity
            )?;
        }
        writeln!(
            out,
            r#"<text x="{:.2}" y="{:.2}" text-anchor="middle" font-family="{}" font-size="{EDGE_LABEL_SIZE}" fill="{}">{}</text>"#,
            edge.label_at.x,
            edge.label_at.y,
            escape(&scene.mono_font_family),
            "#374151",
            escape(&edge.label)
        )?;
    }
    writeln!(out, "</g>")?;

    writeln!(out, r#"<g class="particles">"#)?;
    for particle in &scene.particles {
        writeln!(
            out,
            r#"<circle cx="{:.2}" cy="{:.2}" r="{:.2}" fill="{}"/>"#,
            particle.position.x,
            particle.position.y,
            particle.radius,
            escape(&particle.color)
        )?;
    }
    writeln!(out, "</g>")?;

    writeln!(out, r#"<g class="nodes">"#)?;
    for node in &scene.nodes {
        let stroke_width = if node.selected { 3.5 } else { 1.5 };
        writeln!(
            out,
            r#"<circle cx="{:.2}" cy="{:.2}" r="{:.2}" fill="{}" stroke="{}" stroke-width="{stroke_width}"/>"#,
            node.center.x,
            node.center.y,
            node.radius,
            escape(&node.fill),
            escape(&node.stroke)
        )?;
        writeln!(
            out,
            r#"<text x="{:.2}" y="{:.2}" text-anchor="middle" dominant-baseline="central" font-family="{}" font-size="{NODE_LABEL_SIZE}" font-weight="bold" fill="{}">{}</text>"#,
            node.center.x,
            node.center.y,
            escape(&scene.font_family),
            escape(&node.text),
            escape(&node.label)
        )?;
    }
    writeln!(out, "</g>")?;

    if let Some(inspector) = &scene.inspector {
        let origin = scene.inspector_origin;
        writeln!(out, r#"<g class="inspector">"#)?;
        for (i, line) in inspector.lines.iter().enumerate() {
            writeln!(
                out,
                r#"<text x="{:.2}" y="{:.2}" font-family="{}" font-size="{INSPECTOR_SIZE}" fill="{}">{}</text>"#,
                origin.x,
                origin.y + INSPECTOR_LINE * (i + 1) as f32,
                escape(&scene.mono_font_family),
                "#111827",
                escape(line)
            )?;
        }
        writeln!(out, "</g>")?;
    }

    writeln!(out, "</svg>")
}

fn path_data(path: &EdgePath) -> String {
    match *path {
        EdgePath::Line { from, to } => {
            format!("M {:.2} {:.2} L {:.2} {:.2}", from.x, from.y, to.x, to.y)
        }
        EdgePath::Curve { from, control, to } => format!(
            "M {:.2} {:.2} Q {:.2} {:.2} {:.2} {:.2}",
            from.x, from.y, control.x, control.y, to.x, to.y
        ),
        EdgePath::Loop { from, c1, c2, to } => format!(
            "M {:.2} {:.2} C {:.2} {:.2} {:.2} {:.2} {:.2} {:.2}",
            from.x, from.y, c1.x, c1.y, c2.x, c2.y, to.x, to.y
        ),
    }
}

/// Triangle at the end of `path`, or `None` when the path has no direction.
fn arrowhead(path: &EdgePath, width: f32) -> Option<[Vec2; 3]> {
    let dir = path.end_direction();
    if dir == Vec2::ZERO {
        return None;
    }
    let size = 6.0 + width * 1.5;
    let tip = path.end();
    let base = tip - dir * size;
    let side = dir.perp() * size * 0.5;
    Some([tip, base + side, base - side])
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(feature = "png")]
pub use raster::PngExporter;

#[cfg(feature = "png")]
mod raster {
    use std::io::Cursor;
    use std::sync::Arc;

    use tracing::debug;

    use super::{SceneExporter, SvgExporter};
    use crate::error::{Error, Result};
    use crate::scene::Scene;
    use crate::settings::OutputFormat;

    /// Largest raster edge, in pixels.
    const MAX_DIM: u32 = 16_384;

    /// PNG output by rasterizing the SVG document.
    #[derive(Clone)]
    pub struct PngExporter {
        /// Pixels per scene unit
        scale: f32,
        fontdb: Arc<usvg::fontdb::Database>,
    }

    impl std::fmt::Debug for PngExporter {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("PngExporter")
                .field("scale", &self.scale)
                .field("fonts", &self.fontdb.len())
                .finish()
        }
    }

    impl Default for PngExporter {
        fn default() -> Self {
            Self::new()
        }
    }

    impl PngExporter {
        /// Exporter at 1 pixel per unit using the system fonts.
        pub fn new() -> Self {
            let mut db = usvg::fontdb::Database::new();
            db.load_system_fonts();
            debug!(fonts = db.len(), "loaded system fonts for PNG export");
            Self {
                scale: 1.0,
                fontdb: Arc::new(db),
            }
        }

        /// Render at `scale` pixels per scene unit (e.g. 2.0 for high-DPI).
        pub fn with_scale(mut self, scale: f32) -> Self {
            self.scale = scale;
            self
        }

        fn rasterize(&self, scene: &Scene) -> Result<image::RgbaImage> {
            if !(self.scale.is_finite() && self.scale > 0.0) {
                return Err(Error::export(format!("invalid raster scale {}", self.scale)));
            }
            let svg = SvgExporter.to_svg_string(scene);
            let opts = usvg::Options {
                fontdb: Arc::clone(&self.fontdb),
                ..Default::default()
            };
            let tree = usvg::Tree::from_str(&svg, &opts)
                .map_err(|e| Error::export(format!("parse svg: {e}")))?;

            let width = (scene.width as f32 * self.scale).ceil() as u32;
            let height = (scene.height as f32 * self.scale).ceil() as u32;
            if width > MAX_DIM || height > MAX_DIM {
                return Err(Error::export(format!(
                    "raster size too large: {width}x{height} (max {MAX_DIM}x{MAX_DIM})"
                )));
            }
            let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
                .ok_or_else(|| Error::export("failed to allocate pixmap"))?;
            let transform = resvg::tiny_skia::Transform::from_scale(self.scale, self.scale);
            resvg::render(&tree, transform, &mut pixmap.as_mut());

            let mut rgba = Vec::with_capacity(pixmap.pixels().len() * 4);
            for px in pixmap.pixels() {
                let c = px.demultiply();
                rgba.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
            }
            image::RgbaImage::from_raw(width, height, rgba)
                .ok_or_else(|| Error::export("pixel buffer does not match raster size"))
        }
    }

    impl SceneExporter for PngExporter {
        fn format(&self) -> OutputFormat {
            OutputFormat::Png
        }

        fn export(&self, scene: &Scene) -> Result<Vec<u8>> {
            let img = self.rasterize(scene)?;
            let mut buf = Vec::new();
            image::DynamicImage::ImageRgba8(img)
                .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
                .map_err(|e| Error::export(format!("encode png: {e}")))?;
            Ok(buf)
        }
    }
}
