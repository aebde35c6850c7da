//! Server-side braille plate pipeline.
//!
//! Three pure stages, no shared state, no I/O:
//! - request validation: untyped JSON → [`GenerateRequest`] or a typed
//!   [`ValidationError`]
//! - layout: cell, dot and marker positions on a flat card or a cylinder
//! - extraction: [`GenerateRequest`] → [`GeometrySpec`], the language-neutral
//!   description of every feature the CSG worker will mesh
//!
//! The geometry spec is the wire contract with `braille-csg-kernel`; no mesh
//! is built on this side.
//!
//! ```
//! use braille_plate_core::{extract_geometry_spec, validate};
//!
//! let raw = serde_json::json!({
//!     "shapeType": "card",
//!     "plateType": "positive",
//!     "lines": ["⠓⠑⠇⠇⠕"],
//! });
//! let request = validate(&raw).expect("valid request");
//! let spec = extract_geometry_spec(&request).expect("spec");
//! assert!(!spec.features.is_empty());
//! ```

pub mod errors;
pub mod extract;
pub mod layout;
pub mod request;
pub mod settings;
pub mod spec;

pub use errors::{LayoutError, ValidationError, ValidationReason};
pub use extract::extract_geometry_spec;
pub use request::{validate, GenerateRequest};
pub use settings::{CardSettings, DotShape, IndicatorShapes, RecessShape};
pub use spec::{Base, DotParams, DotProfile, Feature, GeometrySpec, PlateType, ShapeType, Vec3};
