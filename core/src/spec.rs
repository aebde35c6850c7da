//! The geometry specification exchanged between the server extractor and
//! the CSG worker.
//!
//! This is a pure data model: positions, orientations and shape parameters
//! of every feature on a base surface. No mesh exists at this level. Field
//! names follow the JSON wire format (camelCase, lowercase tags).

use serde::{Deserialize, Serialize};

/// Target surface kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ShapeType {
    Card,
    Cylinder,
}

/// Which of the two plates of a job is being generated
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlateType {
    Positive,
    Negative,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Vec3 { x, y, z }
    }

    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Base surface the features sit on
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum Base {
    Card {
        width: f64,
        height: f64,
        thickness: f64,
    },
    Cylinder {
        diameter: f64,
        height: f64,
        wall_thickness: f64,
        polygon_sides: u32,
        seam_offset_deg: f64,
    },
}

/// Geometry profile of a single dot feature
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DotProfile {
    Cone,
    Rounded,
    Hemisphere,
    Bowl,
}

/// Shape parameters per dot profile. Untagged: the field sets are disjoint,
/// so the profile in the owning feature picks the variant unambiguously.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum DotParams {
    Rounded {
        base_diameter: f64,
        base_height: f64,
        dome_diameter: f64,
        dome_height: f64,
    },
    Cone {
        base_diameter: f64,
        top_diameter: f64,
        height: f64,
    },
    Bowl {
        opening_diameter: f64,
        depth: f64,
    },
    Hemisphere {
        diameter: f64,
    },
}

/// A discrete geometric element added to or cut from the base surface
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum Feature {
    Dot {
        shape: DotProfile,
        center: Vec3,
        axis: Vec3,
        params: DotParams,
        for_subtraction: bool,
    },
    Triangle {
        center: Vec3,
        axis: Vec3,
        size: f64,
        height: f64,
        for_subtraction: bool,
    },
    Rect {
        center: Vec3,
        axis: Vec3,
        width: f64,
        depth: f64,
        height: f64,
        for_subtraction: bool,
    },
    Character {
        glyph: String,
        center: Vec3,
        axis: Vec3,
        size: f64,
        height: f64,
        for_subtraction: bool,
    },
}

impl Feature {
    pub fn center(&self) -> Vec3 {
        match self {
            Feature::Dot { center, .. }
            | Feature::Triangle { center, .. }
            | Feature::Rect { center, .. }
            | Feature::Character { center, .. } => *center,
        }
    }

    pub fn axis(&self) -> Vec3 {
        match self {
            Feature::Dot { axis, .. }
            | Feature::Triangle { axis, .. }
            | Feature::Rect { axis, .. }
            | Feature::Character { axis, .. } => *axis,
        }
    }

    pub fn for_subtraction(&self) -> bool {
        match self {
            Feature::Dot { for_subtraction, .. }
            | Feature::Triangle { for_subtraction, .. }
            | Feature::Rect { for_subtraction, .. }
            | Feature::Character { for_subtraction, .. } => *for_subtraction,
        }
    }

    pub fn is_dot(&self) -> bool {
        matches!(self, Feature::Dot { .. })
    }
}

/// What the extractor emits and the CSG worker consumes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeometrySpec {
    pub base: Base,
    pub plate_type: PlateType,
    pub features: Vec<Feature>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_serializes_with_kind_tag() {
        let base = Base::Card {
            width: 90.0,
            height: 52.0,
            thickness: 2.0,
        };
        let json = serde_json::to_value(&base).unwrap();
        assert_eq!(json["kind"], "card");
        assert_eq!(json["width"], 90.0);
    }

    #[test]
    fn cylinder_base_uses_camel_case_fields() {
        let base = Base::Cylinder {
            diameter: 30.8,
            height: 52.0,
            wall_thickness: 2.4,
            polygon_sides: 12,
            seam_offset_deg: 0.0,
        };
        let json = serde_json::to_value(&base).unwrap();
        assert_eq!(json["kind"], "cylinder");
        assert_eq!(json["wallThickness"], 2.4);
        assert_eq!(json["polygonSides"], 12);
    }

    #[test]
    fn dot_feature_round_trips() {
        let feature = Feature::Dot {
            shape: DotProfile::Bowl,
            center: Vec3::new(1.0, 2.0, 3.0),
            axis: Vec3::new(0.0, 0.0, 1.0),
            params: DotParams::Bowl {
                opening_diameter: 1.8,
                depth: 0.8,
            },
            for_subtraction: true,
        };
        let json = serde_json::to_string(&feature).unwrap();
        assert!(json.contains("\"kind\":\"dot\""));
        assert!(json.contains("\"openingDiameter\":1.8"));
        assert!(json.contains("\"forSubtraction\":true"));
        let back: Feature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, feature);
    }

    #[test]
    fn rounded_params_round_trip_untagged() {
        let params = DotParams::Rounded {
            base_diameter: 1.5,
            base_height: 0.5,
            dome_diameter: 1.0,
            dome_height: 0.5,
        };
        let json = serde_json::to_string(&params).unwrap();
        let back: DotParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn spec_json_is_deterministic() {
        let spec = GeometrySpec {
            base: Base::Card {
                width: 90.0,
                height: 52.0,
                thickness: 2.0,
            },
            plate_type: PlateType::Positive,
            features: vec![],
        };
        let a = serde_json::to_string(&spec).unwrap();
        let b = serde_json::to_string(&spec).unwrap();
        assert_eq!(a, b);
    }
}
