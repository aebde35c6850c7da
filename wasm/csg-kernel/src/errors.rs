//! Error handling for the CSG worker.
//!
//! Errors serialize to JSON and cross the worker boundary as data; they
//! never carry stack traces. The code set is closed: the engine owns
//! `bad_spec`, `csg_timeout`, `csg_degraded` and `csg_failed`, the
//! serializer owns `serializer_error`, and nothing here fabricates the
//! server-side kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure codes owned by the worker
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CsgErrorCode {
    /// The spec violates an invariant; programmer error, not retryable
    BadSpec,
    /// Wall-clock budget exceeded; the caller may retry with a larger one
    CsgTimeout,
    /// A result exists but is not manifold; the caller decides
    CsgDegraded,
    /// All retries exhausted, no result
    CsgFailed,
    /// A bad mesh reached the serializer
    SerializerError,
}

impl fmt::Display for CsgErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CsgErrorCode::BadSpec => "bad_spec",
            CsgErrorCode::CsgTimeout => "csg_timeout",
            CsgErrorCode::CsgDegraded => "csg_degraded",
            CsgErrorCode::CsgFailed => "csg_failed",
            CsgErrorCode::SerializerError => "serializer_error",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CsgError {
    pub code: CsgErrorCode,
    pub message: String,
}

impl CsgError {
    pub fn new(code: CsgErrorCode, message: impl Into<String>) -> Self {
        CsgError {
            code,
            message: message.into(),
        }
    }

    pub fn bad_spec(message: impl Into<String>) -> Self {
        CsgError::new(CsgErrorCode::BadSpec, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        CsgError::new(CsgErrorCode::CsgTimeout, message)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        CsgError::new(CsgErrorCode::CsgDegraded, message)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        CsgError::new(CsgErrorCode::CsgFailed, message)
    }

    pub fn serializer(message: impl Into<String>) -> Self {
        CsgError::new(CsgErrorCode::SerializerError, message)
    }
}

impl fmt::Display for CsgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for CsgError {}

pub type CsgResult<T> = Result<T, CsgError>;

/// Why a running job stopped before completion. Cancellation is not an
/// error kind of the taxonomy; it surfaces as a `cancelled` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Cancelled,
    Timeout,
}

/// Anything that ends an engine run early: a taxonomy error, or an
/// interrupt observed at a primitive boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineStop {
    Error(CsgError),
    Interrupted(Interrupt),
}

impl From<CsgError> for EngineStop {
    fn from(error: CsgError) -> Self {
        EngineStop::Error(error)
    }
}

impl From<Interrupt> for EngineStop {
    fn from(interrupt: Interrupt) -> Self {
        EngineStop::Interrupted(interrupt)
    }
}

pub type EngineResult<T> = Result<T, EngineStop>;
