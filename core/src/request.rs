//! Request validation: untyped JSON in, typed `GenerateRequest` out.
//!
//! The validator is the only component that touches raw JSON. Everything
//! downstream operates on the typed request. Missing numeric settings take
//! their defaults; present-but-out-of-range values fail the request, as do
//! unknown settings keys.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ValidationError;
use crate::settings::{
    check_range, CardSettings, DotShape, IndicatorShapes, RecessShape, RANGE_ADJUST,
    RANGE_CARD_SIDE, RANGE_CELL_SPACING, RANGE_CYL_DIAMETER, RANGE_CYL_HEIGHT,
    RANGE_DOT_DEPTH, RANGE_DOT_DIMENSION, RANGE_DOT_SPACING, RANGE_GRID_COLUMNS,
    RANGE_GRID_ROWS, RANGE_POLY_SIDES, RANGE_SEAM_OFFSET, RANGE_THICKNESS,
};
use crate::spec::{PlateType, ShapeType};

/// Total braille character budget across all lines
const MAX_TOTAL_CHARS: usize = 10_000;
/// Maximum code points per original (pre-translation) line
const MAX_ORIGINAL_LINE_LEN: usize = 200;

/// A validated plate generation job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub shape_type: ShapeType,
    pub plate_type: PlateType,
    pub lines: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_lines: Option<Vec<String>>,
    pub settings: CardSettings,
}

fn is_braille_or_blank(ch: char) -> bool {
    ch == ' ' || ('\u{2800}'..='\u{28FF}').contains(&ch)
}

fn require_object<'a>(
    raw: &'a Value,
    field: &str,
) -> Result<&'a serde_json::Map<String, Value>, ValidationError> {
    raw.as_object()
        .ok_or_else(|| ValidationError::wrong_type(field).with_detail("expected an object"))
}

fn string_list(value: &Value, field: &str) -> Result<Vec<String>, ValidationError> {
    let items = value
        .as_array()
        .ok_or_else(|| ValidationError::wrong_type(field).with_detail("expected a list of strings"))?;
    let mut out = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let s = item.as_str().ok_or_else(|| {
            ValidationError::wrong_type(format!("{}[{}]", field, index))
                .with_detail("expected a string")
        })?;
        out.push(s.to_string());
    }
    Ok(out)
}

fn enum_field<T, F>(
    obj: &serde_json::Map<String, Value>,
    field: &str,
    parse: F,
) -> Result<T, ValidationError>
where
    F: Fn(&str) -> Option<T>,
{
    let value = obj
        .get(field)
        .ok_or_else(|| ValidationError::missing(field))?;
    let s = value
        .as_str()
        .ok_or_else(|| ValidationError::wrong_type(field).with_detail("expected a string"))?;
    parse(s).ok_or_else(|| {
        ValidationError::out_of_range(field, format!("'{}' is not a recognized value", s))
    })
}

/// Read one numeric setting: default when absent, range-checked when present.
fn num_setting(
    obj: &serde_json::Map<String, Value>,
    field: &str,
    default: f64,
    range: crate::settings::Range,
) -> Result<f64, ValidationError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => {
            let n = value
                .as_f64()
                .ok_or_else(|| ValidationError::wrong_type(field).with_detail("expected a number"))?;
            check_range(field, n, range)
        }
    }
}

fn count_setting(
    obj: &serde_json::Map<String, Value>,
    field: &str,
    default: u32,
    range: crate::settings::Range,
) -> Result<u32, ValidationError> {
    let n = num_setting(obj, field, default as f64, range)?;
    if n.fract() != 0.0 {
        return Err(ValidationError::wrong_type(field).with_detail("expected an integer"));
    }
    Ok(n as u32)
}

fn selector_setting<T: Copy, F>(
    obj: &serde_json::Map<String, Value>,
    field: &str,
    default: T,
    parse: F,
) -> Result<T, ValidationError>
where
    F: Fn(&str) -> Option<T>,
{
    match obj.get(field) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => {
            let s = value
                .as_str()
                .ok_or_else(|| ValidationError::wrong_type(field).with_detail("expected a string"))?;
            parse(s).ok_or_else(|| {
                ValidationError::out_of_range(field, format!("'{}' is not a recognized value", s))
            })
        }
    }
}

const KNOWN_SETTINGS_KEYS: &[&str] = &[
    "gridColumns",
    "gridRows",
    "cellSpacing",
    "lineSpacing",
    "dotSpacing",
    "brailleXAdjust",
    "brailleYAdjust",
    "roundedDotBaseDiameter",
    "roundedDotBaseHeight",
    "roundedDotDomeDiameter",
    "roundedDotDomeHeight",
    "embossDotBaseDiameter",
    "embossDotHeight",
    "embossDotFlatHat",
    "bowlCounterDotBaseDiameter",
    "counterDotDepth",
    "coneCounterDotBaseDiameter",
    "coneCounterDotHeight",
    "coneCounterDotFlatHat",
    "cylinderDiameter",
    "cylinderHeight",
    "cylinderPolygonalCutoutRadius",
    "cylinderPolygonalCutoutSides",
    "seamOffsetDeg",
    "cardWidth",
    "cardHeight",
    "cardThickness",
    "dotShape",
    "recessShape",
    "indicatorShapes",
];

fn validate_settings(raw: &Value) -> Result<CardSettings, ValidationError> {
    let obj = match raw {
        Value::Null => return Ok(CardSettings::default()),
        other => require_object(other, "settings")?,
    };

    // Recognize every option; reject unknown keys outright.
    for key in obj.keys() {
        if !KNOWN_SETTINGS_KEYS.contains(&key.as_str()) {
            return Err(ValidationError::unknown_field(format!("settings.{}", key)));
        }
    }

    let defaults = CardSettings::default();
    let settings = CardSettings {
        grid_columns: count_setting(obj, "gridColumns", defaults.grid_columns, RANGE_GRID_COLUMNS)?,
        grid_rows: count_setting(obj, "gridRows", defaults.grid_rows, RANGE_GRID_ROWS)?,
        cell_spacing: num_setting(obj, "cellSpacing", defaults.cell_spacing, RANGE_CELL_SPACING)?,
        line_spacing: num_setting(obj, "lineSpacing", defaults.line_spacing, RANGE_CELL_SPACING)?,
        dot_spacing: num_setting(obj, "dotSpacing", defaults.dot_spacing, RANGE_DOT_SPACING)?,
        braille_x_adjust: num_setting(obj, "brailleXAdjust", defaults.braille_x_adjust, RANGE_ADJUST)?,
        braille_y_adjust: num_setting(obj, "brailleYAdjust", defaults.braille_y_adjust, RANGE_ADJUST)?,

        rounded_dot_base_diameter: num_setting(
            obj,
            "roundedDotBaseDiameter",
            defaults.rounded_dot_base_diameter,
            RANGE_DOT_DIMENSION,
        )?,
        rounded_dot_base_height: num_setting(
            obj,
            "roundedDotBaseHeight",
            defaults.rounded_dot_base_height,
            RANGE_DOT_DIMENSION,
        )?,
        rounded_dot_dome_diameter: num_setting(
            obj,
            "roundedDotDomeDiameter",
            defaults.rounded_dot_dome_diameter,
            RANGE_DOT_DIMENSION,
        )?,
        rounded_dot_dome_height: num_setting(
            obj,
            "roundedDotDomeHeight",
            defaults.rounded_dot_dome_height,
            RANGE_DOT_DIMENSION,
        )?,

        emboss_dot_base_diameter: num_setting(
            obj,
            "embossDotBaseDiameter",
            defaults.emboss_dot_base_diameter,
            RANGE_DOT_DIMENSION,
        )?,
        emboss_dot_height: num_setting(
            obj,
            "embossDotHeight",
            defaults.emboss_dot_height,
            RANGE_DOT_DIMENSION,
        )?,
        emboss_dot_flat_hat: num_setting(
            obj,
            "embossDotFlatHat",
            defaults.emboss_dot_flat_hat,
            RANGE_DOT_DEPTH,
        )?,

        bowl_counter_dot_base_diameter: num_setting(
            obj,
            "bowlCounterDotBaseDiameter",
            defaults.bowl_counter_dot_base_diameter,
            RANGE_DOT_DIMENSION,
        )?,
        counter_dot_depth: num_setting(
            obj,
            "counterDotDepth",
            defaults.counter_dot_depth,
            RANGE_DOT_DEPTH,
        )?,

        cone_counter_dot_base_diameter: num_setting(
            obj,
            "coneCounterDotBaseDiameter",
            defaults.cone_counter_dot_base_diameter,
            RANGE_DOT_DIMENSION,
        )?,
        cone_counter_dot_height: num_setting(
            obj,
            "coneCounterDotHeight",
            defaults.cone_counter_dot_height,
            RANGE_DOT_DIMENSION,
        )?,
        cone_counter_dot_flat_hat: num_setting(
            obj,
            "coneCounterDotFlatHat",
            defaults.cone_counter_dot_flat_hat,
            RANGE_DOT_DEPTH,
        )?,

        cylinder_diameter: num_setting(
            obj,
            "cylinderDiameter",
            defaults.cylinder_diameter,
            RANGE_CYL_DIAMETER,
        )?,
        cylinder_height: num_setting(
            obj,
            "cylinderHeight",
            defaults.cylinder_height,
            RANGE_CYL_HEIGHT,
        )?,
        cylinder_polygonal_cutout_radius: num_setting(
            obj,
            "cylinderPolygonalCutoutRadius",
            defaults.cylinder_polygonal_cutout_radius,
            RANGE_CYL_DIAMETER,
        )?,
        cylinder_polygonal_cutout_sides: count_setting(
            obj,
            "cylinderPolygonalCutoutSides",
            defaults.cylinder_polygonal_cutout_sides,
            RANGE_POLY_SIDES,
        )?,
        seam_offset_deg: num_setting(obj, "seamOffsetDeg", defaults.seam_offset_deg, RANGE_SEAM_OFFSET)?,

        card_width: num_setting(obj, "cardWidth", defaults.card_width, RANGE_CARD_SIDE)?,
        card_height: num_setting(obj, "cardHeight", defaults.card_height, RANGE_CARD_SIDE)?,
        card_thickness: num_setting(obj, "cardThickness", defaults.card_thickness, RANGE_THICKNESS)?,

        dot_shape: selector_setting(obj, "dotShape", defaults.dot_shape, |s| match s {
            "rounded" => Some(DotShape::Rounded),
            "cone" => Some(DotShape::Cone),
            _ => None,
        })?,
        recess_shape: selector_setting(obj, "recessShape", defaults.recess_shape, |s| match s {
            "hemisphere" => Some(RecessShape::Hemisphere),
            "bowl" => Some(RecessShape::Bowl),
            "cone" => Some(RecessShape::Cone),
            _ => None,
        })?,
        indicator_shapes: selector_setting(obj, "indicatorShapes", defaults.indicator_shapes, |s| {
            match s {
                "on" => Some(IndicatorShapes::On),
                "off" => Some(IndicatorShapes::Off),
                _ => None,
            }
        })?,
    };

    settings.check_consistency()?;
    Ok(settings)
}

/// Validate an untyped request body.
///
/// Pure: same input, same result. No side effects.
pub fn validate(raw: &Value) -> Result<GenerateRequest, ValidationError> {
    let obj = require_object(raw, "request")?;

    let shape_type = enum_field(obj, "shapeType", |s| match s {
        "card" => Some(ShapeType::Card),
        "cylinder" => Some(ShapeType::Cylinder),
        _ => None,
    })?;
    let plate_type = enum_field(obj, "plateType", |s| match s {
        "positive" => Some(PlateType::Positive),
        "negative" => Some(PlateType::Negative),
        _ => None,
    })?;

    let lines_value = obj
        .get("lines")
        .ok_or_else(|| ValidationError::missing("lines"))?;
    let lines = string_list(lines_value, "lines")?;
    if lines.is_empty() {
        return Err(ValidationError::wrong_type("lines").with_detail("must not be empty"));
    }
    if lines.iter().all(|line| line.trim().is_empty()) {
        return Err(
            ValidationError::wrong_type("lines").with_detail("at least one line must be non-empty")
        );
    }

    let total_chars: usize = lines.iter().map(|line| line.chars().count()).sum();
    if total_chars > MAX_TOTAL_CHARS {
        return Err(ValidationError::too_long(
            "lines",
            format!("{} characters exceeds the {} limit", total_chars, MAX_TOTAL_CHARS),
        ));
    }

    for (row, line) in lines.iter().enumerate() {
        if let Some(bad) = line.chars().find(|ch| !is_braille_or_blank(*ch)) {
            return Err(ValidationError::not_braille(
                format!("lines[{}]", row),
                format!("U+{:04X} is not braille or blank", bad as u32),
            ));
        }
    }

    let original_lines = match obj.get("originalLines") {
        None | Some(Value::Null) => None,
        Some(value) => {
            let originals = string_list(value, "originalLines")?;
            if originals.len() != lines.len() {
                return Err(ValidationError::inconsistent(
                    "originalLines",
                    format!("{} entries for {} braille lines", originals.len(), lines.len()),
                ));
            }
            for (row, line) in originals.iter().enumerate() {
                let len = line.chars().count();
                if len > MAX_ORIGINAL_LINE_LEN {
                    return Err(ValidationError::too_long(
                        format!("originalLines[{}]", row),
                        format!("{} code points exceeds the {} limit", len, MAX_ORIGINAL_LINE_LEN),
                    ));
                }
            }
            Some(originals)
        }
    };

    let settings = validate_settings(obj.get("settings").unwrap_or(&Value::Null))?;

    Ok(GenerateRequest {
        shape_type,
        plate_type,
        lines,
        original_lines,
        settings,
    })
}
