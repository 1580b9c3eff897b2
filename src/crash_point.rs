//! Crash point injection for testing label durability
//!
//! When `NVLABEL_CRASH_POINT` names a point, reaching it terminates the
//! process via `std::process::abort()`. No cleanup, no unwinding.
//!
//! # Testing
//!
//! ```bash
//! NVLABEL_CRASH_POINT=init_between_index_writes nvlabel init --image lsa.img
//! ```

use std::sync::OnceLock;

/// Environment variable naming the active crash point
pub const CRASH_POINT_ENV: &str = "NVLABEL_CRASH_POINT";

static CRASH_POINT: OnceLock<Option<String>> = OnceLock::new();

#[inline]
fn get_crash_point() -> Option<&'static str> {
    CRASH_POINT
        .get_or_init(|| std::env::var(CRASH_POINT_ENV).ok())
        .as_deref()
}

/// Returns true if `NVLABEL_CRASH_POINT` equals `name`.
#[inline]
pub fn crash_point_enabled(name: &str) -> bool {
    get_crash_point().map(|p| p == name).unwrap_or(false)
}

/// Aborts the process if the named crash point is enabled.
#[inline]
pub fn maybe_crash(name: &str) {
    if crash_point_enabled(name) {
        eprintln!("[CRASH] Triggering crash at point: {}", name);
        std::process::abort();
    }
}

/// All defined crash point names
pub mod points {
    // Reinitialization
    pub const INIT_BEFORE_FIRST_INDEX: &str = "init_before_first_index";
    pub const INIT_BETWEEN_INDEX_WRITES: &str = "init_between_index_writes";
    pub const INIT_AFTER_SECOND_INDEX: &str = "init_after_second_index";

    // Zero-fill and raw writes
    pub const ZERO_BEFORE_WRITE: &str = "zero_before_write";
    pub const ZERO_AFTER_WRITE: &str = "zero_after_write";
    pub const WRITE_BEFORE_SUBMIT: &str = "write_before_submit";

    // Kernel view refresh
    pub const REFRESH_AFTER_DISABLE: &str = "refresh_after_disable";

    pub fn all() -> &'static [&'static str] {
        &[
            INIT_BEFORE_FIRST_INDEX,
            INIT_BETWEEN_INDEX_WRITES,
            INIT_AFTER_SECOND_INDEX,
            ZERO_BEFORE_WRITE,
            ZERO_AFTER_WRITE,
            WRITE_BEFORE_SUBMIT,
            REFRESH_AFTER_DISABLE,
        ]
    }
}
