//! Layout math shared by the flat and cylindrical extractors.
//!
//! Everything here is pure: cell anchors, dot-in-cell offsets and marker
//! placement are computed from the settings alone. Positions on the flat
//! plate live in (x, y) on the top surface; positions on the cylinder are
//! parameterized by (θ, z) and projected to world space by the callers.

use crate::settings::{CardSettings, IndicatorShapes};
use crate::spec::Vec3;

/// Margin framing the usable area on each side of the plate
pub const USABLE_MARGIN_MM: f64 = 4.0;
/// Clearance kept between any feature footprint and the face boundary
pub const FIT_CLEARANCE_MM: f64 = 0.5;
/// Width of the row-indicator gutter, in cell pitches. With indicators on,
/// the grid shifts by this much toward the row end so the row-start marker
/// stays on the plate.
pub const INDICATOR_GUTTER_CELLS: f64 = 2.0;

/// Dot positions within one braille cell, indexed by dot number − 1.
///
/// Offsets are relative to the cell anchor (cell center): dots 1,2,3 run
/// down the left column, 4,5,6 down the right. Column separation and row
/// pitch both equal `dot_spacing`.
pub fn dot_offsets(dot_spacing: f64) -> [(f64, f64); 6] {
    let half = dot_spacing / 2.0;
    [
        (-half, dot_spacing),  // dot 1: top-left
        (-half, 0.0),          // dot 2: middle-left
        (-half, -dot_spacing), // dot 3: bottom-left
        (half, dot_spacing),   // dot 4: top-right
        (half, 0.0),           // dot 5: middle-right
        (half, -dot_spacing),  // dot 6: bottom-right
    ]
}

/// Six dot flags from a braille code point (bit i ↔ dot i+1)
pub fn dot_flags(ch: char) -> [bool; 6] {
    let bits = (ch as u32).wrapping_sub(0x2800);
    let mut flags = [false; 6];
    for (i, flag) in flags.iter_mut().enumerate() {
        *flag = bits & (1 << i) != 0;
    }
    flags
}

/// Span of non-blank cells in one line, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowSpan {
    pub first: usize,
    pub last: usize,
}

pub fn row_span(line: &str) -> Option<RowSpan> {
    let mut first = None;
    let mut last = 0;
    for (col, ch) in line.chars().enumerate() {
        if ch != ' ' {
            if first.is_none() {
                first = Some(col);
            }
            last = col;
        }
    }
    first.map(|first| RowSpan { first, last })
}

/// Marker geometry derived from the grid metrics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerDims {
    /// Side of the row-end triangle
    pub triangle_size: f64,
    /// Row-start rectangle, along and across the row
    pub rect_width: f64,
    pub rect_depth: f64,
    /// Character em height
    pub char_em: f64,
    /// Recess depth of every marker
    pub recess_depth: f64,
}

pub fn marker_dims(dot_spacing: f64, base_thickness: f64) -> MarkerDims {
    MarkerDims {
        triangle_size: 2.0 * dot_spacing,
        rect_width: 2.0 * dot_spacing,
        rect_depth: dot_spacing,
        char_em: 3.0 * dot_spacing,
        recess_depth: (0.4 * dot_spacing).min(base_thickness / 2.0),
    }
}

/// Cell columns used by the row markers, relative to the row content span.
/// The triangle sits one pitch past the last non-blank cell; the row-start
/// marker two pitches before the first.
pub fn marker_columns(span: RowSpan) -> (f64, f64) {
    let triangle_col = span.last as f64 + 1.0;
    let start_col = span.first as f64 - 2.0;
    (triangle_col, start_col)
}

/// Anchor grid on the flat plate top surface
#[derive(Debug, Clone, Copy)]
pub struct FlatLayout {
    pub thickness: f64,
    cell_spacing: f64,
    line_spacing: f64,
    x0: f64,
    y0: f64,
}

impl FlatLayout {
    pub fn new(settings: &CardSettings) -> Self {
        let columns = settings.grid_columns as f64;
        let rows = settings.grid_rows as f64;
        let gutter = if settings.indicator_shapes == IndicatorShapes::On {
            INDICATOR_GUTTER_CELLS * settings.cell_spacing
        } else {
            0.0
        };
        // Grid centered in the usable area; row 0 is the top row.
        let x0 = settings.card_width / 2.0 - (columns - 1.0) / 2.0 * settings.cell_spacing
            + settings.braille_x_adjust
            + gutter;
        let y0 = settings.card_height / 2.0 + (rows - 1.0) / 2.0 * settings.line_spacing
            + settings.braille_y_adjust;
        FlatLayout {
            thickness: settings.card_thickness,
            cell_spacing: settings.cell_spacing,
            line_spacing: settings.line_spacing,
            x0,
            y0,
        }
    }

    /// Cell anchor. `col` is fractional so marker columns can reuse it.
    pub fn anchor(&self, row: usize, col: f64) -> (f64, f64) {
        (
            self.x0 + col * self.cell_spacing,
            self.y0 - row as f64 * self.line_spacing,
        )
    }

    pub fn world(&self, x: f64, y: f64) -> Vec3 {
        Vec3::new(x, y, self.thickness)
    }

    pub fn axis(&self) -> Vec3 {
        Vec3::new(0.0, 0.0, 1.0)
    }
}

/// Anchor grid on the cylinder surface, parameterized by (θ, z)
#[derive(Debug, Clone, Copy)]
pub struct CylinderLayout {
    pub radius: f64,
    pub height: f64,
    cell_pitch_rad: f64,
    line_spacing: f64,
    theta0: f64,
    seam_rad: f64,
    z0: f64,
    /// Counter plates mirror the angular direction (θ → −θ) so the two
    /// plates register when the counter is flipped about the X axis.
    mirrored: bool,
}

impl CylinderLayout {
    pub fn new(settings: &CardSettings, mirrored: bool) -> Self {
        let radius = settings.cylinder_diameter / 2.0;
        let rows = settings.grid_rows as f64;
        let gutter_cells = if settings.indicator_shapes == IndicatorShapes::On {
            INDICATOR_GUTTER_CELLS
        } else {
            0.0
        };
        // One cell of clearance keeps content off the seam; the indicator
        // gutter adds room for the row-start marker.
        let theta_margin = (1.0 + gutter_cells) * settings.cell_spacing / radius;
        let seam_rad = settings.seam_offset_deg.to_radians();
        let theta0 = seam_rad + theta_margin + settings.braille_x_adjust / radius;
        let z0 = settings.cylinder_height / 2.0
            + (rows - 1.0) / 2.0 * settings.line_spacing
            + settings.braille_y_adjust;
        CylinderLayout {
            radius,
            height: settings.cylinder_height,
            cell_pitch_rad: settings.cell_spacing / radius,
            line_spacing: settings.line_spacing,
            theta0,
            seam_rad,
            z0,
            mirrored,
        }
    }

    /// Cell anchor as (θ, z). θ is not wrapped; callers detect overflow.
    pub fn anchor(&self, row: usize, col: f64) -> (f64, f64) {
        let theta = self.theta0 + col * self.cell_pitch_rad;
        let z = self.z0 - row as f64 * self.line_spacing;
        let theta = if self.mirrored { -theta } else { theta };
        (theta, z)
    }

    /// Angular pitch of one cell
    pub fn cell_pitch_rad(&self) -> f64 {
        self.cell_pitch_rad
    }

    pub fn is_mirrored(&self) -> bool {
        self.mirrored
    }

    /// Arc-length distance (mm) from the wall seam to a cell column,
    /// measured in the unmirrored direction. Used for fit checking:
    /// content must stay strictly inside one revolution.
    pub fn arc_u(&self, col: f64) -> f64 {
        (self.theta0 - self.seam_rad + col * self.cell_pitch_rad) * self.radius
    }

    pub fn world(&self, theta: f64, z: f64) -> Vec3 {
        Vec3::new(self.radius * theta.cos(), self.radius * theta.sin(), z)
    }

    pub fn axis(&self, theta: f64) -> Vec3 {
        Vec3::new(theta.cos(), theta.sin(), 0.0)
    }
}
