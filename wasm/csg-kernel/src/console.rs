//! Host-facing diagnostics and wall-clock time.
//!
//! The worker logs warnings only (non-silent fallbacks, degraded results).
//! On wasm32 they go to the browser console, elsewhere to stderr.

/// Emit a warning to the host console
pub fn warn(message: &str) {
    #[cfg(target_arch = "wasm32")]
    {
        web_sys::console::warn_1(&message.into());
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        eprintln!("warning: {}", message);
    }
}

/// Monotonic-enough wall clock in milliseconds, for job budgets
#[derive(Debug, Clone, Copy)]
pub struct Clock;

impl Clock {
    pub fn now_ms() -> f64 {
        #[cfg(target_arch = "wasm32")]
        {
            js_sys::Date::now()
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            use std::time::{SystemTime, UNIX_EPOCH};
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs_f64() * 1000.0)
                .unwrap_or(0.0)
        }
    }
}
