//! Worker message protocol and job state machine.
//!
//! The worker is driven entirely by messages: `init` loads the per-worker
//! assets (font table, tessellation state), `generate` runs one job to a
//! binary STL, `cancel` interrupts cooperatively at the next primitive
//! boundary. Replies are data only; errors carry taxonomy codes, never
//! stack traces. The STL buffer itself is handed to the host separately so
//! it can be transferred zero-copy.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use braille_plate_core::GeometrySpec;

use crate::console::Clock;
use crate::csg::{generate_mesh, CsgOptions, JobContext, ProgressSink, DEFAULT_SEGMENTS};
use crate::errors::{CsgError, CsgErrorCode, EngineStop, Interrupt};
use crate::glyph::FontStore;
use crate::stl::write_binary_stl;

/// Default wall-clock budget per job
pub const DEFAULT_BUDGET_MS: f64 = 120_000.0;

/// Lifecycle of a worker. Only `Ready` accepts jobs; the terminal job
/// states collapse back to `Ready` once their reply is posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Idle,
    LoadingAssets,
    Ready,
    Running,
    Cancelled,
    Done,
    Failed,
}

/// Host → worker messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostMessage {
    Init {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        font_bytes: Option<Vec<u8>>,
    },
    Generate {
        id: String,
        spec: GeometrySpec,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        budget_ms: Option<f64>,
    },
    Cancel {
        id: String,
    },
    /// Subdivision level for curved primitives, clamped to [8, 64]
    SetSubdivisions {
        segments: u32,
    },
}

/// Worker → host replies
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkerReply {
    Ready,
    Done {
        id: String,
        stats: MeshStats,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        reason: CsgErrorCode,
        message: String,
    },
    Cancelled {
        id: String,
    },
    Progress {
        id: String,
        stage: String,
        fraction: f64,
    },
}

/// Result statistics reported with `done`. `stl_bytes` announces the size
/// of the STL buffer the host collects next; the buffer itself is handed
/// over out of band so it can be transferred zero-copy instead of being
/// inflated into the reply JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MeshStats {
    pub vertex_count: usize,
    pub triangle_count: usize,
    pub boundary_edges: usize,
    pub stl_bytes: usize,
    pub duration_ms: f64,
    pub segments: u32,
    /// Set when the result needed a fallback or remains non-manifold;
    /// the caller decides whether to accept it
    pub degraded: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

struct ProgressReplies<'a> {
    id: &'a str,
    replies: &'a mut Vec<WorkerReply>,
}

impl ProgressSink for ProgressReplies<'_> {
    fn progress(&mut self, stage: &str, fraction: f64) {
        self.replies.push(WorkerReply::Progress {
            id: self.id.to_string(),
            stage: stage.to_string(),
            fraction,
        });
    }
}

/// The CSG worker. One per Web Worker; no state outlives it except the
/// read-only font table installed at init.
pub struct CsgWorker {
    state: WorkerState,
    segments: u32,
    font: FontStore,
    cancel: Arc<AtomicBool>,
}

impl Default for CsgWorker {
    fn default() -> Self {
        Self::new()
    }
}

impl CsgWorker {
    pub fn new() -> Self {
        CsgWorker {
            state: WorkerState::Idle,
            segments: DEFAULT_SEGMENTS,
            font: FontStore::empty(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Cooperative cancellation handle; observed at primitive boundaries
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Process one host message, appending replies. A successful generate
    /// returns the STL bytes for zero-copy transfer.
    pub fn handle(&mut self, message: HostMessage, replies: &mut Vec<WorkerReply>) -> Option<Vec<u8>> {
        match message {
            HostMessage::Init { font_bytes } => {
                self.state = WorkerState::LoadingAssets;
                if let Some(bytes) = font_bytes {
                    self.font.install(bytes);
                }
                self.state = WorkerState::Ready;
                replies.push(WorkerReply::Ready);
                None
            }
            HostMessage::SetSubdivisions { segments } => {
                self.segments = CsgOptions::clamped(segments).segments;
                None
            }
            HostMessage::Cancel { id } => {
                // Only a running job is cancellable; acknowledging a cancel
                // for a finished job must not poison the next one.
                if self.state == WorkerState::Running {
                    self.cancel.store(true, Ordering::Relaxed);
                    self.state = WorkerState::Cancelled;
                }
                replies.push(WorkerReply::Cancelled { id });
                None
            }
            HostMessage::Generate {
                id,
                spec,
                budget_ms,
            } => self.generate(&id, &spec, budget_ms, replies),
        }
    }

    fn generate(
        &mut self,
        id: &str,
        spec: &GeometrySpec,
        budget_ms: Option<f64>,
        replies: &mut Vec<WorkerReply>,
    ) -> Option<Vec<u8>> {
        if self.state != WorkerState::Ready {
            replies.push(WorkerReply::Error {
                id: Some(id.to_string()),
                reason: CsgErrorCode::BadSpec,
                message: format!("worker is {:?}, only ready workers accept jobs", self.state),
            });
            return None;
        }
        self.state = WorkerState::Running;
        let started = Clock::now_ms();

        let outcome = {
            let mut sink = ProgressReplies {
                id,
                replies: &mut *replies,
            };
            let budget = Some(budget_ms.unwrap_or(DEFAULT_BUDGET_MS));
            let mut ctx = JobContext::new(budget, Arc::clone(&self.cancel), &mut sink);
            generate_mesh(
                spec,
                &CsgOptions {
                    segments: self.segments,
                },
                &self.font,
                &mut ctx,
            )
        };

        // One job per flag: whatever happened, the next job starts clean
        self.cancel.store(false, Ordering::Relaxed);

        let result = match outcome {
            Err(EngineStop::Interrupted(Interrupt::Cancelled)) => {
                replies.push(WorkerReply::Cancelled { id: id.to_string() });
                self.state = WorkerState::Cancelled;
                None
            }
            Err(EngineStop::Interrupted(Interrupt::Timeout)) => {
                self.push_error(replies, id, CsgError::timeout("wall-clock budget exceeded"));
                None
            }
            Err(EngineStop::Error(error)) => {
                self.push_error(replies, id, error);
                None
            }
            Ok(outcome) => match write_binary_stl(&outcome.mesh) {
                Err(error) => {
                    self.push_error(replies, id, error);
                    None
                }
                Ok(bytes) => {
                    replies.push(WorkerReply::Done {
                        id: id.to_string(),
                        stats: MeshStats {
                            vertex_count: outcome.mesh.vertex_count(),
                            triangle_count: outcome.mesh.triangle_count(),
                            boundary_edges: outcome.report.boundary_edges,
                            stl_bytes: bytes.len(),
                            duration_ms: Clock::now_ms() - started,
                            segments: outcome.segments,
                            degraded: outcome.degraded,
                            warnings: outcome.warnings,
                        },
                    });
                    self.state = WorkerState::Done;
                    Some(bytes)
                }
            },
        };

        // Terminal job states collapse back to ready for the next job
        self.state = WorkerState::Ready;
        result
    }

    fn push_error(&mut self, replies: &mut Vec<WorkerReply>, id: &str, error: CsgError) {
        replies.push(WorkerReply::Error {
            id: Some(id.to_string()),
            reason: error.code,
            message: error.message,
        });
        self.state = WorkerState::Failed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec() -> GeometrySpec {
        let raw = json!({
            "shapeType": "card",
            "plateType": "positive",
            "lines": ["⠓"],
        });
        braille_plate_core::extract_geometry_spec(&braille_plate_core::validate(&raw).unwrap())
            .unwrap()
    }

    fn ready_worker() -> CsgWorker {
        let mut worker = CsgWorker::new();
        let mut replies = Vec::new();
        worker.handle(HostMessage::Init { font_bytes: None }, &mut replies);
        assert_eq!(replies, vec![WorkerReply::Ready]);
        worker
    }

    #[test]
    fn init_transitions_idle_to_ready() {
        let worker = CsgWorker::new();
        assert_eq!(worker.state(), WorkerState::Idle);
        let worker = ready_worker();
        assert_eq!(worker.state(), WorkerState::Ready);
    }

    #[test]
    fn generate_before_init_is_rejected() {
        let mut worker = CsgWorker::new();
        let mut replies = Vec::new();
        let stl = worker.handle(
            HostMessage::Generate {
                id: "job".into(),
                spec: spec(),
                budget_ms: None,
            },
            &mut replies,
        );
        assert!(stl.is_none());
        assert!(matches!(
            replies.last(),
            Some(WorkerReply::Error {
                reason: CsgErrorCode::BadSpec,
                ..
            })
        ));
    }

    #[test]
    fn generate_produces_stl_and_stats() {
        let mut worker = ready_worker();
        let mut replies = Vec::new();
        let stl = worker
            .handle(
                HostMessage::Generate {
                    id: "job-1".into(),
                    spec: spec(),
                    budget_ms: None,
                },
                &mut replies,
            )
            .expect("stl bytes");

        assert_ne!(&stl[0..5], b"solid");
        let done = replies
            .iter()
            .find_map(|r| match r {
                WorkerReply::Done { id, stats } => Some((id.clone(), stats.clone())),
                _ => None,
            })
            .expect("done reply");
        assert_eq!(done.0, "job-1");
        assert!(!done.1.degraded);
        assert_eq!(done.1.boundary_edges, 0);
        assert_eq!(done.1.stl_bytes, stl.len());
        let count = u32::from_le_bytes(stl[80..84].try_into().unwrap());
        assert_eq!(count as usize, done.1.triangle_count);

        // Progress was reported along the way
        assert!(replies
            .iter()
            .any(|r| matches!(r, WorkerReply::Progress { .. })));
        assert_eq!(worker.state(), WorkerState::Ready);
    }

    #[test]
    fn cancel_interrupts_then_next_job_succeeds() {
        // A cancelled job posts cancelled, no STL; the worker returns
        // to ready and the next generate completes normally.
        let mut worker = ready_worker();
        worker.cancel_flag().store(true, Ordering::Relaxed);

        let mut replies = Vec::new();
        let stl = worker.handle(
            HostMessage::Generate {
                id: "victim".into(),
                spec: spec(),
                budget_ms: None,
            },
            &mut replies,
        );
        assert!(stl.is_none());
        assert!(replies
            .iter()
            .any(|r| matches!(r, WorkerReply::Cancelled { id } if id == "victim")));
        assert_eq!(worker.state(), WorkerState::Ready);

        let mut replies = Vec::new();
        let stl = worker.handle(
            HostMessage::Generate {
                id: "next".into(),
                spec: spec(),
                budget_ms: None,
            },
            &mut replies,
        );
        assert!(stl.is_some());
    }

    #[test]
    fn zero_budget_times_out() {
        let mut worker = ready_worker();
        let mut replies = Vec::new();
        let stl = worker.handle(
            HostMessage::Generate {
                id: "late".into(),
                spec: spec(),
                budget_ms: Some(-1.0),
            },
            &mut replies,
        );
        assert!(stl.is_none());
        assert!(matches!(
            replies.last(),
            Some(WorkerReply::Error {
                reason: CsgErrorCode::CsgTimeout,
                ..
            })
        ));
    }

    #[test]
    fn subdivisions_are_clamped() {
        let mut worker = ready_worker();
        let mut replies = Vec::new();
        worker.handle(HostMessage::SetSubdivisions { segments: 200 }, &mut replies);
        assert_eq!(worker.segments, 64);
        worker.handle(HostMessage::SetSubdivisions { segments: 2 }, &mut replies);
        assert_eq!(worker.segments, 8);
    }

    #[test]
    fn message_json_uses_lowercase_type_tags() {
        let message: HostMessage = serde_json::from_value(json!({
            "type": "cancel",
            "id": "j"
        }))
        .unwrap();
        assert!(matches!(message, HostMessage::Cancel { .. }));

        let reply = WorkerReply::Error {
            id: None,
            reason: CsgErrorCode::CsgTimeout,
            message: "late".into(),
        };
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["reason"], "csg_timeout");
    }

    #[test]
    fn generate_message_parses_spec_payload() {
        let raw = json!({
            "type": "generate",
            "id": "wire-job",
            "spec": serde_json::to_value(spec()).unwrap(),
            "budgetMs": 5000.0
        });
        let message: HostMessage = serde_json::from_value(raw).unwrap();
        let HostMessage::Generate { id, budget_ms, .. } = message else {
            panic!("expected generate");
        };
        assert_eq!(id, "wire-job");
        assert_eq!(budget_ms, Some(5000.0));
    }
}
