//! Character outlines for row-indicator prisms.
//!
//! Outlines come from a host-supplied font (installed once at worker init,
//! read-only afterwards). The builder is font agnostic: it takes a glyph
//! string and an em height and returns flattened polygon loops in chart
//! millimeters. When no font is installed or the glyph has no outline, the
//! caller falls back to a rectangular footprint; that path is logged, never
//! fatal.

use lyon_path::math::Point;
use lyon_path::path::Builder as PathBuilder;
use lyon_path::{Path, PathEvent};
use ttf_parser::{Face, OutlineBuilder};

use crate::console;

/// Flattening tolerance relative to the em height
const FLATTEN_TOLERANCE_EM: f32 = 0.01;

/// Read-only font table shared by every job of a worker
#[derive(Debug, Default)]
pub struct FontStore {
    data: Option<Vec<u8>>,
}

impl FontStore {
    pub fn empty() -> Self {
        FontStore { data: None }
    }

    pub fn install(&mut self, data: Vec<u8>) -> bool {
        if Face::parse(&data, 0).is_err() {
            console::warn("font data failed to parse; character markers will use rectangles");
            return false;
        }
        self.data = Some(data);
        true
    }

    pub fn has_font(&self) -> bool {
        self.data.is_some()
    }

    /// Flattened outline loops of `glyph`, scaled to `em_height` mm and
    /// centered on `center`. Returns `None` (with a console warning) when
    /// the outline cannot be produced.
    pub fn glyph_loops(
        &self,
        glyph: &str,
        em_height: f32,
        center: [f32; 2],
    ) -> Option<Vec<Vec<[f32; 2]>>> {
        let Some(data) = &self.data else {
            console::warn(&format!(
                "no font installed; marker '{}' falls back to a rectangle",
                glyph
            ));
            return None;
        };
        let Ok(face) = Face::parse(data, 0) else {
            console::warn("installed font no longer parses; falling back to a rectangle");
            return None;
        };
        let ch = glyph.chars().next()?;
        let Some(gid) = face.glyph_index(ch) else {
            console::warn(&format!(
                "glyph '{}' missing from font; falling back to a rectangle",
                ch
            ));
            return None;
        };

        let scale = em_height / face.units_per_em() as f32;
        let mut adapter = LyonOutlineBuilder {
            builder: Path::builder(),
            scale,
        };
        let bbox = face.outline_glyph(gid, &mut adapter)?;
        let path = adapter.builder.build();

        // Center the outline bounding box on the marker anchor
        let cx = (bbox.x_min as f32 + bbox.x_max as f32) / 2.0 * scale;
        let cy = (bbox.y_min as f32 + bbox.y_max as f32) / 2.0 * scale;
        let offset = [center[0] - cx, center[1] - cy];

        let loops = flatten_path(&path, em_height * FLATTEN_TOLERANCE_EM, offset);
        if loops.is_empty() {
            console::warn(&format!(
                "glyph '{}' produced an empty outline; falling back to a rectangle",
                ch
            ));
            return None;
        }
        Some(loops)
    }
}

/// Adapter: ttf-parser outline callbacks → lyon path builder
struct LyonOutlineBuilder {
    builder: PathBuilder,
    scale: f32,
}

impl LyonOutlineBuilder {
    fn pt(&self, x: f32, y: f32) -> Point {
        Point::new(x * self.scale, y * self.scale)
    }
}

impl OutlineBuilder for LyonOutlineBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        let p = self.pt(x, y);
        self.builder.begin(p);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let p = self.pt(x, y);
        self.builder.line_to(p);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let c = self.pt(x1, y1);
        let p = self.pt(x, y);
        self.builder.quadratic_bezier_to(c, p);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let c1 = self.pt(x1, y1);
        let c2 = self.pt(x2, y2);
        let p = self.pt(x, y);
        self.builder.cubic_bezier_to(c1, c2, p);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

/// Flatten a path into closed polygon loops, preserving contour winding
fn flatten_path(path: &Path, tolerance: f32, offset: [f32; 2]) -> Vec<Vec<[f32; 2]>> {
    use lyon_path::iterator::PathIterator;

    let mut loops: Vec<Vec<[f32; 2]>> = Vec::new();
    let mut current: Vec<[f32; 2]> = Vec::new();
    for event in path.iter().flattened(tolerance) {
        match event {
            PathEvent::Begin { at } => {
                current = vec![[at.x + offset[0], at.y + offset[1]]];
            }
            PathEvent::Line { to, .. } => {
                current.push([to.x + offset[0], to.y + offset[1]]);
            }
            PathEvent::End { .. } => {
                // Drop the duplicated closing point if present
                if current.len() > 1 {
                    let first = current[0];
                    let last = *current.last().unwrap();
                    if (first[0] - last[0]).abs() < 1e-6 && (first[1] - last[1]).abs() < 1e-6 {
                        current.pop();
                    }
                }
                if current.len() >= 3 {
                    loops.push(std::mem::take(&mut current));
                }
            }
            _ => {}
        }
    }
    loops
}
