//! Audit log: soft-fail integrity violation tracking.
//!
//! The heap never aborts on a detected inconsistency. Verification code
//! **reports facts**; tests and the orchestrator **judge correctness** by
//! draining the log afterwards. Violations are also written to stderr so an
//! interactive run surfaces them immediately.

#[cfg(feature = "audit")]
use lazy_static::lazy_static;
#[cfg(feature = "audit")]
use std::sync::Mutex;

// Violation IDs (stable, used by contract assertions in tests)

/// Occupied-block count changed across a compaction: data was lost or invented.
pub const HEAP_CONTENT_LOST: u8 = 1;

/// A free block precedes an occupied block after compaction.
pub const HEAP_NOT_PACKED: u8 = 2;

/// A ledger entry was evicted but owned no blocks in the array.
pub const STALE_LEDGER_ENTRY: u8 = 3;

/// A recorded violation: numeric ID plus free-form detail.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub id: u8,
    pub detail: String,
}

#[cfg(feature = "audit")]
lazy_static! {
    static ref VIOLATION_LOG: Mutex<Vec<Violation>> = Mutex::new(Vec::new());
}

/// Report an integrity violation: logs to stderr and records it.
///
/// Never panics; the run continues with whatever state it has.
pub fn report_violation(id: u8, detail: &str) {
    eprintln!("CRITICAL [{}]: {}", violation_name(id), detail);
    #[cfg(feature = "audit")]
    VIOLATION_LOG.lock().unwrap().push(Violation {
        id,
        detail: detail.to_string(),
    });
}

#[cfg(feature = "audit")]
/// Drain all recorded violations, emptying the log.
pub fn drain_violations() -> Vec<Violation> {
    let mut log = VIOLATION_LOG.lock().unwrap();
    std::mem::take(&mut *log)
}

#[cfg(not(feature = "audit"))]
/// Drain recorded violations: always empty when auditing is disabled.
pub fn drain_violations() -> Vec<Violation> {
    Vec::new()
}

#[cfg(feature = "audit")]
/// Clear the violation log (for between test runs).
pub fn clear_violations() {
    VIOLATION_LOG.lock().unwrap().clear();
}

#[cfg(not(feature = "audit"))]
/// Clear the violation log: no-op when auditing is disabled.
pub fn clear_violations() {}

/// Maps violation ID to human-readable name (for diagnostics only).
pub const fn violation_name(id: u8) -> &'static str {
    match id {
        HEAP_CONTENT_LOST => "HEAP_CONTENT_LOST",
        HEAP_NOT_PACKED => "HEAP_NOT_PACKED",
        STALE_LEDGER_ENTRY => "STALE_LEDGER_ENTRY",
        _ => "UNKNOWN",
    }
}
