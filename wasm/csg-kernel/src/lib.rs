//! CSG worker kernel for braille plate generation.
//!
//! Consumes the `GeometrySpec` produced by `braille-plate-core` and emits a
//! watertight binary STL. Runs inside a Web Worker through the
//! [`BrailleCsgWorker`] JSON facade, and natively as a plain library (the
//! whole engine is testable without a browser).
//!
//! # Pipeline
//!
//! - `csg::plan`: spec invariants, chart-space feature plans
//! - `csg::flat` / `csg::shell`: surface composition per base kind
//! - `healing`: weld, degenerate removal, manifold verification
//! - `stl`: deterministic binary STL bytes
//! - `worker`: message protocol and the job state machine
//!
//! # Worker usage
//!
//! ```typescript
//! const worker = new BrailleCsgWorker();
//! worker.handle_message(JSON.stringify({ type: "init" }));
//! const replies = JSON.parse(worker.handle_message(JSON.stringify({
//!   type: "generate", id: "job-1", spec, budgetMs: 120000,
//! })));
//! const done = replies.find(r => r.type === "done");
//! if (done) {
//!   // One buffer per done reply, sized by done.stats.stlBytes;
//!   // collected out of band so it transfers zero-copy
//!   const stl = worker.take_stl();
//!   postMessage({ ...done, stl }, [stl.buffer]);
//! }
//! ```
//!
//! The facade always returns valid JSON, even on malformed input.

#![allow(clippy::too_many_arguments)]

use wasm_bindgen::prelude::*;

pub mod bvh;
pub mod chart;
pub mod console;
pub mod csg;
pub mod errors;
pub mod fill;
pub mod glyph;
pub mod healing;
pub mod mesh;
pub mod primitives;
pub mod stl;
pub mod worker;

use worker::{CsgWorker, HostMessage, WorkerReply};

/// WASM entry point: one instance per Web Worker
#[wasm_bindgen]
pub struct BrailleCsgWorker {
    inner: CsgWorker,
    last_stl: Option<Vec<u8>>,
}

#[wasm_bindgen]
impl BrailleCsgWorker {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        #[cfg(feature = "console_error_panic_hook")]
        console_error_panic_hook::set_once();

        BrailleCsgWorker {
            inner: CsgWorker::new(),
            last_stl: None,
        }
    }

    /// Process one host message (JSON). Returns a JSON array of replies.
    #[wasm_bindgen]
    pub fn handle_message(&mut self, message: &str) -> String {
        let mut replies: Vec<WorkerReply> = Vec::new();
        match serde_json::from_str::<HostMessage>(message) {
            Err(error) => {
                replies.push(WorkerReply::Error {
                    id: None,
                    reason: errors::CsgErrorCode::BadSpec,
                    message: format!("unparseable worker message: {}", error),
                });
            }
            Ok(message) => {
                if let Some(stl) = self.inner.handle(message, &mut replies) {
                    self.last_stl = Some(stl);
                }
            }
        }
        serde_json::to_string(&replies).unwrap_or_else(|_| {
            r#"[{"type":"error","reason":"csg_failed","message":"failed to serialize replies"}]"#
                .to_string()
        })
    }

    /// Take the STL produced by the last successful generate. The returned
    /// buffer is moved to the host; a second call returns nothing.
    #[wasm_bindgen]
    pub fn take_stl(&mut self) -> Option<Vec<u8>> {
        self.last_stl.take()
    }

    /// Cooperative cancellation from the host side
    #[wasm_bindgen]
    pub fn request_cancel(&mut self) {
        self.inner
            .cancel_flag()
            .store(true, std::sync::atomic::Ordering::Relaxed);
    }
}

impl Default for BrailleCsgWorker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn facade_round_trip_produces_stl() {
        let mut facade = BrailleCsgWorker::new();
        let replies = facade.handle_message(r#"{"type":"init"}"#);
        let replies: serde_json::Value = serde_json::from_str(&replies).unwrap();
        assert_eq!(replies[0]["type"], "ready");

        let raw = json!({
            "shapeType": "card",
            "plateType": "positive",
            "lines": ["⠓⠑⠇⠇⠕"],
        });
        let spec = braille_plate_core::extract_geometry_spec(
            &braille_plate_core::validate(&raw).unwrap(),
        )
        .unwrap();

        let message = json!({
            "type": "generate",
            "id": "job",
            "spec": spec,
            "budgetMs": 120000.0,
        });
        let replies = facade.handle_message(&message.to_string());
        let replies: serde_json::Value = serde_json::from_str(&replies).unwrap();
        let done = replies
            .as_array()
            .unwrap()
            .iter()
            .find(|r| r["type"] == "done")
            .expect("done reply");
        assert_eq!(done["id"], "job");
        assert_eq!(done["stats"]["degraded"], false);

        let stl = facade.take_stl().expect("stl buffer");
        assert_ne!(&stl[0..5], b"solid");
        // The reply announces exactly the buffer the host collects
        assert_eq!(
            done["stats"]["stlBytes"].as_u64().unwrap() as usize,
            stl.len()
        );
        assert!(facade.take_stl().is_none());
    }

    #[test]
    fn malformed_message_yields_valid_error_json() {
        let mut facade = BrailleCsgWorker::new();
        let replies = facade.handle_message("{not json");
        let replies: serde_json::Value = serde_json::from_str(&replies).unwrap();
        assert_eq!(replies[0]["type"], "error");
        assert_eq!(replies[0]["reason"], "bad_spec");
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::wasm_bindgen_test;

    #[wasm_bindgen_test]
    fn facade_initializes_in_worker() {
        let mut facade = BrailleCsgWorker::new();
        let replies = facade.handle_message(r#"{"type":"init"}"#);
        assert!(replies.contains("ready"));
    }
}
