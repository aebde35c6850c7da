//! Spec validation and feature planning.
//!
//! The planner is the only consumer of the raw `GeometrySpec`: it enforces
//! the spec invariants (`bad_spec` on violation) and lowers every feature
//! into a chart-space build plan the backends execute verbatim. Glyph
//! outlines are resolved here, with the logged rectangle fallback.

use braille_plate_core::{Base, DotParams, DotProfile, Feature, GeometrySpec, PlateType};

use crate::chart::{AnyChart, CylinderChart, PlateChart, SurfaceChart};
use crate::errors::{CsgError, CsgResult};
use crate::fill::reversed;
use crate::glyph::FontStore;
use crate::primitives::{rect_loop, triangle_loop};

/// Tolerance for "center lies on the surface" and axis checks
const SURFACE_TOLERANCE_MM: f64 = 1e-6;

/// Fallback footprint proportions when a glyph outline is unavailable
const GLYPH_FALLBACK_WIDTH_EM: f32 = 0.6;
const GLYPH_FALLBACK_DEPTH_EM: f32 = 0.8;

/// Chart-space build plan for one feature
#[derive(Debug, Clone)]
pub enum PlannedShape {
    EmbossFrustum {
        center: [f32; 2],
        base_radius: f64,
        top_radius: f64,
        height: f64,
    },
    EmbossRounded {
        center: [f32; 2],
        base_radius: f64,
        base_height: f64,
        dome_radius: f64,
        dome_height: f64,
    },
    RecessCap {
        center: [f32; 2],
        opening_radius: f64,
        depth: f64,
    },
    RecessFrustum {
        center: [f32; 2],
        opening_radius: f64,
        bottom_radius: f64,
        depth: f64,
    },
    /// Loops carry punch winding: clockwise outer contours, CCW islands
    RecessPrism {
        loops: Vec<Vec<[f32; 2]>>,
        depth: f64,
    },
}

impl PlannedShape {
    pub fn is_emboss(&self) -> bool {
        matches!(
            self,
            PlannedShape::EmbossFrustum { .. } | PlannedShape::EmbossRounded { .. }
        )
    }

    /// 2D footprint bounds in chart space
    pub fn bounds(&self) -> ([f32; 2], [f32; 2]) {
        match self {
            PlannedShape::EmbossFrustum {
                center, base_radius, ..
            }
            | PlannedShape::EmbossRounded {
                center, base_radius, ..
            } => circle_bounds(*center, *base_radius as f32),
            PlannedShape::RecessCap {
                center,
                opening_radius,
                ..
            }
            | PlannedShape::RecessFrustum {
                center,
                opening_radius,
                ..
            } => circle_bounds(*center, *opening_radius as f32),
            PlannedShape::RecessPrism { loops, .. } => {
                let mut min = [f32::MAX, f32::MAX];
                let mut max = [f32::MIN, f32::MIN];
                for p in loops.iter().flatten() {
                    min[0] = min[0].min(p[0]);
                    min[1] = min[1].min(p[1]);
                    max[0] = max[0].max(p[0]);
                    max[1] = max[1].max(p[1]);
                }
                (min, max)
            }
        }
    }

}

fn circle_bounds(center: [f32; 2], radius: f32) -> ([f32; 2], [f32; 2]) {
    (
        [center[0] - radius, center[1] - radius],
        [center[0] + radius, center[1] + radius],
    )
}

pub fn chart_for(spec: &GeometrySpec) -> AnyChart {
    match &spec.base {
        Base::Card { thickness, .. } => AnyChart::Plate(PlateChart {
            thickness: *thickness,
        }),
        Base::Cylinder {
            diameter,
            seam_offset_deg,
            ..
        } => AnyChart::Cylinder(CylinderChart {
            radius: diameter / 2.0,
            seam_rad: seam_offset_deg.to_radians(),
            mirrored: spec.plate_type == PlateType::Negative,
        }),
    }
}

fn base_thickness(base: &Base) -> f64 {
    match base {
        Base::Card { thickness, .. } => *thickness,
        Base::Cylinder { wall_thickness, .. } => *wall_thickness,
    }
}

/// Spec invariants that are programmer errors when violated
pub fn check_spec_invariants(spec: &GeometrySpec) -> CsgResult<()> {
    match &spec.base {
        Base::Card {
            width,
            height,
            thickness,
        } => {
            if *width <= 0.0 || *height <= 0.0 || *thickness <= 0.0 {
                return Err(CsgError::bad_spec("card dimensions must be positive"));
            }
        }
        Base::Cylinder {
            diameter,
            height,
            wall_thickness,
            polygon_sides,
            ..
        } => {
            if *polygon_sides < 3 {
                return Err(CsgError::bad_spec("cylinder cutout needs at least 3 sides"));
            }
            if *diameter <= 0.0 || *height <= 0.0 {
                return Err(CsgError::bad_spec("cylinder dimensions must be positive"));
            }
            if *wall_thickness <= 0.0 || *wall_thickness >= diameter / 2.0 {
                return Err(CsgError::bad_spec(
                    "cutout radius must leave a positive wall inside the cylinder",
                ));
            }
        }
    }

    let chart = chart_for(spec);
    let thickness = base_thickness(&spec.base);
    for (index, feature) in spec.features.iter().enumerate() {
        let center = feature.center();
        let axis = feature.axis();
        let axis_norm =
            (axis.x * axis.x + axis.y * axis.y + axis.z * axis.z).sqrt();
        if (axis_norm - 1.0).abs() > SURFACE_TOLERANCE_MM {
            return Err(CsgError::bad_spec(format!(
                "feature {} axis is not a unit vector",
                index
            )));
        }

        let world = nalgebra::Point3::new(center.x, center.y, center.z);
        let uv = chart.uv_of(&world);
        let on_surface = chart.to_world(uv, 0.0);
        if (world - on_surface).norm() > 1e-3 {
            return Err(CsgError::bad_spec(format!(
                "feature {} center is off the base surface",
                index
            )));
        }
        let outward = chart.outward(uv);
        if (outward - nalgebra::Vector3::new(axis.x, axis.y, axis.z)).norm() > 1e-3 {
            return Err(CsgError::bad_spec(format!(
                "feature {} axis does not point along the surface outward direction",
                index
            )));
        }

        match feature {
            Feature::Dot {
                for_subtraction, ..
            } => {
                let expected = spec.plate_type == PlateType::Negative;
                if *for_subtraction != expected {
                    return Err(CsgError::bad_spec(format!(
                        "dot feature {} forSubtraction does not match the plate type",
                        index
                    )));
                }
            }
            Feature::Triangle {
                for_subtraction, ..
            }
            | Feature::Rect {
                for_subtraction, ..
            }
            | Feature::Character {
                for_subtraction, ..
            } => {
                if !for_subtraction {
                    return Err(CsgError::bad_spec(format!(
                        "marker feature {} must be recessed",
                        index
                    )));
                }
            }
        }
    }

    // Recess depths must not pierce the base
    for (index, feature) in spec.features.iter().enumerate() {
        let depth = match feature {
            Feature::Dot {
                params,
                for_subtraction: true,
                ..
            } => match params {
                DotParams::Bowl {
                    opening_diameter,
                    depth,
                } => {
                    if *depth > 0.0 {
                        *depth
                    } else {
                        opening_diameter / 2.0
                    }
                }
                DotParams::Hemisphere { diameter } => diameter / 2.0,
                DotParams::Cone { height, .. } => *height,
                DotParams::Rounded { .. } => 0.0,
            },
            Feature::Triangle { height, .. }
            | Feature::Rect { height, .. }
            | Feature::Character { height, .. } => *height,
            _ => 0.0,
        };
        if depth >= thickness {
            return Err(CsgError::bad_spec(format!(
                "feature {} recess depth {} pierces the {} mm base",
                index, depth, thickness
            )));
        }
    }

    Ok(())
}

/// Lower every feature to a chart-space build plan, in spec order
pub fn plan_features(
    spec: &GeometrySpec,
    _segments: u32,
    font: &FontStore,
) -> CsgResult<Vec<PlannedShape>> {
    let chart = chart_for(spec);
    let mut planned = Vec::with_capacity(spec.features.len());

    for (index, feature) in spec.features.iter().enumerate() {
        let center = feature.center();
        let world = nalgebra::Point3::new(center.x, center.y, center.z);
        let uv = chart.uv_of(&world);

        let shape = match feature {
            Feature::Dot {
                shape,
                params,
                for_subtraction,
                ..
            } => plan_dot(index, *shape, params, *for_subtraction, uv)?,
            Feature::Triangle { size, height, .. } => PlannedShape::RecessPrism {
                loops: vec![reversed(triangle_loop(uv, *size as f32))],
                depth: *height,
            },
            Feature::Rect {
                width,
                depth,
                height,
                ..
            } => PlannedShape::RecessPrism {
                loops: vec![reversed(rect_loop(uv, *width as f32, *depth as f32))],
                depth: *height,
            },
            Feature::Character {
                glyph,
                size,
                height,
                ..
            } => {
                let em = *size as f32;
                match font.glyph_loops(glyph, em, uv) {
                    // Glyph contours already carry punch winding
                    Some(loops) => PlannedShape::RecessPrism {
                        loops,
                        depth: *height,
                    },
                    None => PlannedShape::RecessPrism {
                        loops: vec![reversed(rect_loop(
                            uv,
                            em * GLYPH_FALLBACK_WIDTH_EM,
                            em * GLYPH_FALLBACK_DEPTH_EM,
                        ))],
                        depth: *height,
                    },
                }
            }
        };
        planned.push(shape);
    }
    Ok(planned)
}

fn plan_dot(
    index: usize,
    profile: DotProfile,
    params: &DotParams,
    for_subtraction: bool,
    uv: [f32; 2],
) -> CsgResult<PlannedShape> {
    match (profile, params, for_subtraction) {
        (
            DotProfile::Rounded,
            DotParams::Rounded {
                base_diameter,
                base_height,
                dome_diameter,
                dome_height,
            },
            false,
        ) => Ok(PlannedShape::EmbossRounded {
            center: uv,
            base_radius: base_diameter / 2.0,
            base_height: *base_height,
            dome_radius: dome_diameter / 2.0,
            dome_height: *dome_height,
        }),
        (
            DotProfile::Cone,
            DotParams::Cone {
                base_diameter,
                top_diameter,
                height,
            },
            false,
        ) => Ok(PlannedShape::EmbossFrustum {
            center: uv,
            base_radius: base_diameter / 2.0,
            top_radius: top_diameter / 2.0,
            height: *height,
        }),
        (
            DotProfile::Bowl,
            DotParams::Bowl {
                opening_diameter,
                depth,
            },
            true,
        ) => Ok(PlannedShape::RecessCap {
            center: uv,
            opening_radius: opening_diameter / 2.0,
            depth: *depth,
        }),
        (DotProfile::Hemisphere, DotParams::Hemisphere { diameter }, true) => {
            Ok(PlannedShape::RecessCap {
                center: uv,
                opening_radius: diameter / 2.0,
                depth: diameter / 2.0,
            })
        }
        (
            DotProfile::Cone,
            DotParams::Cone {
                base_diameter,
                top_diameter,
                height,
            },
            true,
        ) => Ok(PlannedShape::RecessFrustum {
            center: uv,
            opening_radius: base_diameter / 2.0,
            bottom_radius: top_diameter / 2.0,
            depth: *height,
        }),
        _ => Err(CsgError::bad_spec(format!(
            "dot feature {} profile does not match its parameters or plate side",
            index
        ))),
    }
}
