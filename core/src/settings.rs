//! Geometry settings for a plate job.
//!
//! All lengths are millimeters. Every field has a documented default and a
//! legal range; a value present in the raw request but outside its range
//! fails validation, a missing value takes the default.

use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// Shape of an embossed dot on the positive plate
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DotShape {
    Rounded,
    Cone,
}

/// Shape of a dot recess on the counter plate
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecessShape {
    Hemisphere,
    Bowl,
    Cone,
}

/// Whether row indicator markers are generated
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorShapes {
    On,
    Off,
}

/// The full enumerated settings record. Unknown keys are rejected by the
/// validator before this struct is built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CardSettings {
    // Grid
    pub grid_columns: u32,
    pub grid_rows: u32,
    pub cell_spacing: f64,
    pub line_spacing: f64,
    pub dot_spacing: f64,
    pub braille_x_adjust: f64,
    pub braille_y_adjust: f64,

    // Embossed rounded dot
    pub rounded_dot_base_diameter: f64,
    pub rounded_dot_base_height: f64,
    pub rounded_dot_dome_diameter: f64,
    pub rounded_dot_dome_height: f64,

    // Embossed cone dot
    pub emboss_dot_base_diameter: f64,
    pub emboss_dot_height: f64,
    pub emboss_dot_flat_hat: f64,

    // Counter bowl recess
    pub bowl_counter_dot_base_diameter: f64,
    pub counter_dot_depth: f64,

    // Counter cone recess
    pub cone_counter_dot_base_diameter: f64,
    pub cone_counter_dot_height: f64,
    pub cone_counter_dot_flat_hat: f64,

    // Cylinder
    pub cylinder_diameter: f64,
    pub cylinder_height: f64,
    pub cylinder_polygonal_cutout_radius: f64,
    pub cylinder_polygonal_cutout_sides: u32,
    pub seam_offset_deg: f64,

    // Plate
    pub card_width: f64,
    pub card_height: f64,
    pub card_thickness: f64,

    // Selectors
    pub dot_shape: DotShape,
    pub recess_shape: RecessShape,
    pub indicator_shapes: IndicatorShapes,
}

impl Default for CardSettings {
    fn default() -> Self {
        CardSettings {
            grid_columns: 13,
            grid_rows: 4,
            cell_spacing: 6.0,
            line_spacing: 10.0,
            dot_spacing: 2.5,
            braille_x_adjust: 0.0,
            braille_y_adjust: 0.0,

            rounded_dot_base_diameter: 1.5,
            rounded_dot_base_height: 0.5,
            rounded_dot_dome_diameter: 1.0,
            rounded_dot_dome_height: 0.5,

            emboss_dot_base_diameter: 1.6,
            emboss_dot_height: 0.9,
            emboss_dot_flat_hat: 0.4,

            bowl_counter_dot_base_diameter: 1.8,
            counter_dot_depth: 0.8,

            cone_counter_dot_base_diameter: 1.8,
            cone_counter_dot_height: 1.0,
            cone_counter_dot_flat_hat: 0.5,

            cylinder_diameter: 30.8,
            cylinder_height: 52.0,
            cylinder_polygonal_cutout_radius: 13.0,
            cylinder_polygonal_cutout_sides: 12,
            seam_offset_deg: 0.0,

            card_width: 90.0,
            card_height: 52.0,
            card_thickness: 2.0,

            dot_shape: DotShape::Rounded,
            recess_shape: RecessShape::Bowl,
            indicator_shapes: IndicatorShapes::Off,
        }
    }
}

/// Inclusive legal range for one numeric setting
#[derive(Debug, Clone, Copy)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub const fn new(min: f64, max: f64) -> Self {
        Range { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

pub fn check_range(field: &str, value: f64, range: Range) -> Result<f64, ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::wrong_type(field).with_detail("not a finite number"));
    }
    if !range.contains(value) {
        return Err(ValidationError::out_of_range(
            field,
            format!("{} outside [{}, {}]", value, range.min, range.max),
        ));
    }
    Ok(value)
}

// Legal ranges. Strictly-positive lengths use a small epsilon floor so a
// zero spacing cannot collapse the layout.
pub const RANGE_CARD_SIDE: Range = Range::new(10.0, 500.0);
pub const RANGE_THICKNESS: Range = Range::new(0.5, 10.0);
pub const RANGE_CYL_DIAMETER: Range = Range::new(5.0, 500.0);
pub const RANGE_CYL_HEIGHT: Range = Range::new(10.0, 500.0);
pub const RANGE_POLY_SIDES: Range = Range::new(3.0, 128.0);
pub const RANGE_SEAM_OFFSET: Range = Range::new(-360.0, 360.0);
pub const RANGE_GRID_COLUMNS: Range = Range::new(1.0, 64.0);
pub const RANGE_GRID_ROWS: Range = Range::new(1.0, 32.0);
pub const RANGE_CELL_SPACING: Range = Range::new(0.001, 50.0);
pub const RANGE_DOT_SPACING: Range = Range::new(0.001, 10.0);
pub const RANGE_ADJUST: Range = Range::new(-100.0, 100.0);
pub const RANGE_DOT_DIMENSION: Range = Range::new(0.001, 10.0);
pub const RANGE_DOT_DEPTH: Range = Range::new(0.0, 10.0);

impl CardSettings {
    /// Cross-field consistency checks that individual ranges cannot express.
    pub fn check_consistency(&self) -> Result<(), ValidationError> {
        if self.cylinder_polygonal_cutout_radius >= self.cylinder_diameter / 2.0 {
            return Err(ValidationError::out_of_range(
                "cylinderPolygonalCutoutRadius",
                "must be smaller than the cylinder radius",
            ));
        }
        if self.cylinder_polygonal_cutout_radius <= 0.0 {
            return Err(ValidationError::out_of_range(
                "cylinderPolygonalCutoutRadius",
                "must be positive",
            ));
        }
        if self.emboss_dot_flat_hat >= self.emboss_dot_base_diameter {
            return Err(ValidationError::out_of_range(
                "embossDotFlatHat",
                "must be smaller than embossDotBaseDiameter",
            ));
        }
        if self.cone_counter_dot_flat_hat >= self.cone_counter_dot_base_diameter {
            return Err(ValidationError::out_of_range(
                "coneCounterDotFlatHat",
                "must be smaller than coneCounterDotBaseDiameter",
            ));
        }
        if self.rounded_dot_dome_diameter > self.rounded_dot_base_diameter {
            return Err(ValidationError::out_of_range(
                "roundedDotDomeDiameter",
                "must not exceed roundedDotBaseDiameter",
            ));
        }
        Ok(())
    }
}
