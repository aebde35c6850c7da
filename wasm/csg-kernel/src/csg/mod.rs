//! The CSG engine: spec in, watertight mesh out.
//!
//! Two backends share one composition strategy (fill the base surface
//! around feature footprints, grow feature shells from the same rims):
//! [`flat`] for cards and [`shell`] for cylinders. This module owns backend
//! selection, the retry-at-lower-subdivision path, degradation semantics
//! and the job checkpoints where cancellation and the wall-clock budget are
//! observed.

mod features;
pub mod flat;
pub mod plan;
pub mod shell;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use braille_plate_core::{Base, GeometrySpec};

use crate::console::{self, Clock};
use crate::errors::{CsgError, EngineResult, EngineStop, Interrupt};
use crate::glyph::FontStore;
use crate::healing::{heal, verify_mesh, MeshReport};
use crate::mesh::TriMesh;

/// Default rim segments for curved primitives
pub const DEFAULT_SEGMENTS: u32 = 24;
pub const MIN_SEGMENTS: u32 = 8;
pub const MAX_SEGMENTS: u32 = 64;

/// Facets of the cylinder's outer wall
pub const OUTER_WALL_FACETS: u32 = 60;

#[derive(Debug, Clone, Copy)]
pub struct CsgOptions {
    pub segments: u32,
}

impl Default for CsgOptions {
    fn default() -> Self {
        CsgOptions {
            segments: DEFAULT_SEGMENTS,
        }
    }
}

impl CsgOptions {
    pub fn clamped(segments: u32) -> Self {
        CsgOptions {
            segments: segments.clamp(MIN_SEGMENTS, MAX_SEGMENTS),
        }
    }
}

/// Observer for progress messages
pub trait ProgressSink {
    fn progress(&mut self, stage: &str, fraction: f64);
}

/// Sink that drops everything; used where progress is not observable
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn progress(&mut self, _stage: &str, _fraction: f64) {}
}

/// Per-job state threaded through the engine. Cancellation and the budget
/// are observed at every checkpoint (one per primitive boundary).
pub struct JobContext<'a> {
    deadline_ms: Option<f64>,
    cancel: Arc<AtomicBool>,
    progress: &'a mut dyn ProgressSink,
}

impl<'a> JobContext<'a> {
    pub fn new(
        budget_ms: Option<f64>,
        cancel: Arc<AtomicBool>,
        progress: &'a mut dyn ProgressSink,
    ) -> Self {
        JobContext {
            deadline_ms: budget_ms.map(|budget| Clock::now_ms() + budget),
            cancel,
            progress,
        }
    }

    /// Unlimited context for direct library use and tests
    pub fn unbounded(progress: &'a mut dyn ProgressSink) -> Self {
        JobContext {
            deadline_ms: None,
            cancel: Arc::new(AtomicBool::new(false)),
            progress,
        }
    }

    pub fn checkpoint(&mut self, stage: &str, fraction: f64) -> Result<(), Interrupt> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(Interrupt::Cancelled);
        }
        if let Some(deadline) = self.deadline_ms {
            if Clock::now_ms() > deadline {
                return Err(Interrupt::Timeout);
            }
        }
        self.progress.progress(stage, fraction);
        Ok(())
    }
}

/// Engine output: the mesh plus everything the caller needs to decide
#[derive(Debug, Clone)]
pub struct CsgOutcome {
    pub mesh: TriMesh,
    pub report: MeshReport,
    /// Set when the result needed a fallback or remains non-manifold
    pub degraded: bool,
    pub warnings: Vec<String>,
    /// Segments actually used (after any retry)
    pub segments: u32,
}

/// Run the full engine: backend selection, composition, healing,
/// verification, one retry at half subdivision, degradation semantics.
pub fn generate_mesh(
    spec: &GeometrySpec,
    options: &CsgOptions,
    font: &FontStore,
    ctx: &mut JobContext,
) -> EngineResult<CsgOutcome> {
    plan::check_spec_invariants(spec)?;

    let mut segments = options.segments.clamp(MIN_SEGMENTS, MAX_SEGMENTS);
    let mut attempt = run_backend(spec, segments, font, ctx);

    // One retry at a lower subdivision if the boolean degraded
    let needs_retry = match &attempt {
        Ok(outcome) => !outcome.report.is_watertight(),
        Err(EngineStop::Error(error)) => error.code == crate::errors::CsgErrorCode::CsgFailed,
        Err(EngineStop::Interrupted(_)) => false,
    };
    if needs_retry && segments > MIN_SEGMENTS {
        let retry_segments = (segments / 2).max(MIN_SEGMENTS);
        console::warn(&format!(
            "mesh verification failed at {} segments; retrying at {}",
            segments, retry_segments
        ));
        ctx.checkpoint("retry", 0.0)?;
        let retry = run_backend(spec, retry_segments, font, ctx);
        // Keep whichever attempt verified; prefer the retry
        let use_retry = match &retry {
            Ok(outcome) => outcome.report.is_watertight() || attempt.is_err(),
            Err(_) => false,
        };
        if use_retry {
            segments = retry_segments;
            attempt = retry;
        }
    }

    let mut outcome = attempt?;
    outcome.segments = segments;
    if !outcome.report.is_watertight() {
        outcome.degraded = true;
        outcome
            .warnings
            .push("result is not manifold after retry".to_string());
        console::warn("returning degraded mesh: boundary edges remained after retry");
    }
    if outcome.mesh.is_empty() {
        return Err(CsgError::failed("composition produced an empty mesh").into());
    }
    Ok(outcome)
}

fn run_backend(
    spec: &GeometrySpec,
    segments: u32,
    font: &FontStore,
    ctx: &mut JobContext,
) -> EngineResult<CsgOutcome> {
    let planned = plan::plan_features(spec, segments, font)?;
    let (mesh, mut warnings, degraded) = match &spec.base {
        Base::Card { .. } => flat::compose_card(spec, &planned, segments, ctx)?,
        Base::Cylinder { .. } => shell::compose_cylinder(spec, &planned, segments, ctx)?,
    };

    ctx.checkpoint("heal", 0.9)?;
    let healed = heal(mesh);
    let report = verify_mesh(&healed);
    if !report.all_finite {
        return Err(CsgError::failed("mesh contains non-finite coordinates").into());
    }
    if !report.is_watertight() {
        warnings.push(format!(
            "verification: {} boundary, {} non-manifold edges",
            report.boundary_edges, report.non_manifold_edges
        ));
    }
    Ok(CsgOutcome {
        mesh: healed,
        report,
        degraded,
        warnings,
        segments,
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use braille_plate_core::{extract_geometry_spec, validate, GeometrySpec};

    /// Build a spec through the real server pipeline
    pub fn spec_from(raw: serde_json::Value) -> GeometrySpec {
        extract_geometry_spec(&validate(&raw).unwrap()).unwrap()
    }

    pub fn run(spec: &GeometrySpec) -> CsgOutcome {
        let font = FontStore::empty();
        let mut sink = NullProgress;
        let mut ctx = JobContext::unbounded(&mut sink);
        generate_mesh(spec, &CsgOptions::default(), &font, &mut ctx).expect("engine run")
    }
}
