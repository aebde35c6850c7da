//! Geometry spec extraction: validated request + layout math → `GeometrySpec`.
//!
//! Two paths selected by shape type. Feature order is cell scan order
//! (row-major, top-to-bottom, left-to-right) so downstream CSG and tests
//! are deterministic. Overflow is never truncated silently.

use crate::errors::LayoutError;
use crate::layout::{
    dot_flags, dot_offsets, marker_columns, marker_dims, row_span, CylinderLayout, FlatLayout,
    FIT_CLEARANCE_MM,
};
use crate::request::GenerateRequest;
use crate::settings::{CardSettings, DotShape, IndicatorShapes, RecessShape};
use crate::spec::{Base, DotParams, DotProfile, Feature, GeometrySpec, PlateType, ShapeType, Vec3};

/// The dot profile and parameters a plate type selects from the settings
fn dot_shape_for_plate(settings: &CardSettings, plate: PlateType) -> (DotProfile, DotParams) {
    match plate {
        PlateType::Positive => match settings.dot_shape {
            DotShape::Rounded => (
                DotProfile::Rounded,
                DotParams::Rounded {
                    base_diameter: settings.rounded_dot_base_diameter,
                    base_height: settings.rounded_dot_base_height,
                    dome_diameter: settings.rounded_dot_dome_diameter,
                    dome_height: settings.rounded_dot_dome_height,
                },
            ),
            DotShape::Cone => (
                DotProfile::Cone,
                DotParams::Cone {
                    base_diameter: settings.emboss_dot_base_diameter,
                    top_diameter: settings.emboss_dot_flat_hat,
                    height: settings.emboss_dot_height,
                },
            ),
        },
        PlateType::Negative => match settings.recess_shape {
            RecessShape::Hemisphere => (
                DotProfile::Hemisphere,
                DotParams::Hemisphere {
                    diameter: settings.bowl_counter_dot_base_diameter,
                },
            ),
            RecessShape::Bowl => (
                DotProfile::Bowl,
                DotParams::Bowl {
                    opening_diameter: settings.bowl_counter_dot_base_diameter,
                    depth: settings.counter_dot_depth,
                },
            ),
            RecessShape::Cone => (
                DotProfile::Cone,
                DotParams::Cone {
                    base_diameter: settings.cone_counter_dot_base_diameter,
                    top_diameter: settings.cone_counter_dot_flat_hat,
                    height: settings.cone_counter_dot_height,
                },
            ),
        },
    }
}

fn dot_footprint_radius(params: &DotParams) -> f64 {
    match params {
        DotParams::Rounded { base_diameter, .. } => base_diameter / 2.0,
        DotParams::Cone { base_diameter, .. } => base_diameter / 2.0,
        DotParams::Bowl { opening_diameter, .. } => opening_diameter / 2.0,
        DotParams::Hemisphere { diameter } => diameter / 2.0,
    }
}

/// Row-start marker content: a character glyph, or a rectangle when the
/// original text carries no usable indicator character.
enum StartMarker {
    Character(String),
    Rect,
}

fn start_marker(original_lines: Option<&Vec<String>>, row: usize) -> StartMarker {
    let Some(lines) = original_lines else {
        return StartMarker::Character("X".to_string());
    };
    // Original text exists: a printable ASCII first character becomes the
    // indicator glyph, anything else (empty text, non-ASCII scripts) gets
    // the rectangle marker.
    let text = lines.get(row).map(String::as_str).unwrap_or("");
    match text.trim_start().chars().next() {
        None => StartMarker::Rect,
        Some(ch) => {
            let upper = ch.to_ascii_uppercase();
            if upper.is_ascii_graphic() {
                StartMarker::Character(upper.to_string())
            } else {
                StartMarker::Rect
            }
        }
    }
}

/// On-surface placement of one feature, shared by both extractor paths
struct Placement {
    center: Vec3,
    axis: Vec3,
}

/// Maps grid coordinates to placements and enforces the physical fit of
/// every footprint on the face.
trait SurfaceMapper {
    /// Placement for a footprint of radius `footprint` centered at
    /// (row, col + du/pitch, dv), or a `layout_overflow` if it leaves the
    /// face. `du`/`dv` are millimeter offsets from the cell anchor.
    fn place(
        &self,
        row: usize,
        col: f64,
        du: f64,
        dv: f64,
        footprint: f64,
    ) -> Result<Placement, (usize, usize)>;
}

struct FlatMapper<'a> {
    layout: FlatLayout,
    settings: &'a CardSettings,
}

impl SurfaceMapper for FlatMapper<'_> {
    fn place(
        &self,
        row: usize,
        col: f64,
        du: f64,
        dv: f64,
        footprint: f64,
    ) -> Result<Placement, (usize, usize)> {
        let (x, y) = self.layout.anchor(row, col);
        let (x, y) = (x + du, y + dv);
        let clearance = footprint + FIT_CLEARANCE_MM;
        let on_face = x >= clearance
            && x <= self.settings.card_width - clearance
            && y >= clearance
            && y <= self.settings.card_height - clearance;
        if !on_face {
            return Err((row, col.max(0.0) as usize));
        }
        Ok(Placement {
            center: self.layout.world(x, y),
            axis: self.layout.axis(),
        })
    }
}

struct CylinderMapper {
    layout: CylinderLayout,
}

impl SurfaceMapper for CylinderMapper {
    fn place(
        &self,
        row: usize,
        col: f64,
        du: f64,
        dv: f64,
        footprint: f64,
    ) -> Result<Placement, (usize, usize)> {
        let (theta, z) = self.layout.anchor(row, col);
        let du_theta = du / self.layout.radius;
        // Mirrored layouts mirror the in-cell offsets too, so every
        // counter recess lands exactly opposite its embossed dot.
        let theta = if self.layout.is_mirrored() {
            theta - du_theta
        } else {
            theta + du_theta
        };
        let z = z + dv;
        let clearance = footprint + FIT_CLEARANCE_MM;
        // Unmirrored arc distance from the wall seam; content must stay
        // strictly inside one revolution.
        let u = self.layout.arc_u(col) + du;
        let circumference = 2.0 * std::f64::consts::PI * self.layout.radius;
        let fits = u >= clearance
            && u <= circumference - clearance
            && z >= clearance
            && z <= self.layout.height - clearance;
        if !fits {
            return Err((row, col.max(0.0) as usize));
        }
        Ok(Placement {
            center: self.layout.world(theta, z),
            axis: self.layout.axis(theta),
        })
    }
}

/// Turn a validated request into a geometry spec.
///
/// Pure: same request, byte-identical spec.
pub fn extract_geometry_spec(request: &GenerateRequest) -> Result<GeometrySpec, LayoutError> {
    let settings = &request.settings;

    // Grid overflow comes first; nothing is emitted on failure.
    if request.lines.len() > settings.grid_rows as usize {
        return Err(LayoutError::LayoutOverflow {
            row: settings.grid_rows as usize,
            column: 0,
        });
    }
    for (row, line) in request.lines.iter().enumerate() {
        let cells = line.chars().count();
        if cells > settings.grid_columns as usize {
            return Err(LayoutError::LayoutOverflow {
                row,
                column: settings.grid_columns as usize,
            });
        }
    }

    let base = match request.shape_type {
        ShapeType::Card => Base::Card {
            width: settings.card_width,
            height: settings.card_height,
            thickness: settings.card_thickness,
        },
        ShapeType::Cylinder => Base::Cylinder {
            diameter: settings.cylinder_diameter,
            height: settings.cylinder_height,
            wall_thickness: settings.cylinder_diameter / 2.0
                - settings.cylinder_polygonal_cutout_radius,
            polygon_sides: settings.cylinder_polygonal_cutout_sides,
            seam_offset_deg: settings.seam_offset_deg,
        },
    };

    let mirrored = request.shape_type == ShapeType::Cylinder
        && request.plate_type == PlateType::Negative;
    let mapper: Box<dyn SurfaceMapper + '_> = match request.shape_type {
        ShapeType::Card => Box::new(FlatMapper {
            layout: FlatLayout::new(settings),
            settings,
        }),
        ShapeType::Cylinder => Box::new(CylinderMapper {
            layout: CylinderLayout::new(settings, mirrored),
        }),
    };

    let base_thickness = match request.shape_type {
        ShapeType::Card => settings.card_thickness,
        ShapeType::Cylinder => {
            settings.cylinder_diameter / 2.0 - settings.cylinder_polygonal_cutout_radius
        }
    };

    let (dot_profile, dot_params) = dot_shape_for_plate(settings, request.plate_type);
    let dot_radius = dot_footprint_radius(&dot_params);
    let dots_subtract = request.plate_type == PlateType::Negative;
    let offsets = dot_offsets(settings.dot_spacing);
    let dims = marker_dims(settings.dot_spacing, base_thickness);
    let indicators_on = settings.indicator_shapes == IndicatorShapes::On;

    let overflow = |(row, column)| LayoutError::LayoutOverflow { row, column };

    let mut features = Vec::new();
    for (row, line) in request.lines.iter().enumerate() {
        for (col, ch) in line.chars().enumerate() {
            if ch == ' ' {
                continue;
            }
            for (dot, &(du, dv)) in dot_flags(ch).iter().zip(offsets.iter()) {
                if !dot {
                    continue;
                }
                let placement = mapper
                    .place(row, col as f64, du, dv, dot_radius)
                    .map_err(overflow)?;
                features.push(Feature::Dot {
                    shape: dot_profile,
                    center: placement.center,
                    axis: placement.axis,
                    params: dot_params,
                    for_subtraction: dots_subtract,
                });
            }
        }

        if !indicators_on {
            continue;
        }
        let Some(span) = row_span(line) else {
            continue;
        };
        let (triangle_col, start_col) = marker_columns(span);

        let placement = mapper
            .place(row, triangle_col, 0.0, 0.0, dims.triangle_size / 2.0)
            .map_err(overflow)?;
        features.push(Feature::Triangle {
            center: placement.center,
            axis: placement.axis,
            size: dims.triangle_size,
            height: dims.recess_depth,
            for_subtraction: true,
        });

        match start_marker(request.original_lines.as_ref(), row) {
            StartMarker::Character(glyph) => {
                let placement = mapper
                    .place(row, start_col, 0.0, 0.0, dims.char_em / 2.0)
                    .map_err(overflow)?;
                features.push(Feature::Character {
                    glyph,
                    center: placement.center,
                    axis: placement.axis,
                    size: dims.char_em,
                    height: dims.recess_depth,
                    for_subtraction: true,
                });
            }
            StartMarker::Rect => {
                let footprint = (dims.rect_width.hypot(dims.rect_depth)) / 2.0;
                let placement = mapper
                    .place(row, start_col, 0.0, 0.0, footprint)
                    .map_err(overflow)?;
                features.push(Feature::Rect {
                    center: placement.center,
                    axis: placement.axis,
                    width: dims.rect_width,
                    depth: dims.rect_depth,
                    height: dims.recess_depth,
                    for_subtraction: true,
                });
            }
        }
    }

    Ok(GeometrySpec {
        base,
        plate_type: request.plate_type,
        features,
    })
}
