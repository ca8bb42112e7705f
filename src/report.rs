//! Progress/diagnostic reporting.
//!
//! The scheduler performs no I/O itself; it emits `(phase, current, total,
//! target)` tuples and diagnostics through an injected [`Reporter`]. Worker
//! pool tasks run on pool-owned threads, so the reporter is additionally
//! made available via a thread-local "scoped reporter" — the same shape the
//! teacher's own `report` module uses to carry a reporter across its rayon
//! pool boundary, here used across this crate's own [`crate::pool`] boundary.

use std::cell::RefCell;
use std::sync::Arc;

pub trait Reporter: Send + Sync {
    fn on_phase(&self, _phase: &str, _current: usize, _total: usize) {}
    fn on_target_start(&self, _target: &str) {}
    fn on_target_done(&self, _target: &str, _skipped: bool) {}
    fn on_diagnostic(&self, tag: &str, target: Option<&str>, message: &str) {
        match target {
            Some(target) => tracing::warn!(tag, target, "{message}"),
            None => tracing::warn!(tag, "{message}"),
        }
    }
}

/// A reporter that renders nothing — the default for library callers that
/// don't care about progress (and for tests).
pub struct NullReporter;
impl Reporter for NullReporter {}

thread_local! {
    static SCOPED: RefCell<Option<Arc<dyn Reporter>>> = const { RefCell::new(None) };
}

/// RAII guard restoring the previous scoped reporter (if any) on drop.
pub struct ScopedGuard {
    previous: Option<Arc<dyn Reporter>>,
}

impl Drop for ScopedGuard {
    fn drop(&mut self) {
        SCOPED.with(|cell| *cell.borrow_mut() = self.previous.take());
    }
}

/// Installs `reporter` as this thread's scoped reporter for the guard's
/// lifetime. Worker threads call this once per task so nested helpers can
/// reach the caller's reporter via [`with_scoped`] without threading it
/// through every function signature.
pub fn set_scoped(reporter: Arc<dyn Reporter>) -> ScopedGuard {
    let previous = SCOPED.with(|cell| cell.borrow_mut().replace(reporter));
    ScopedGuard { previous }
}

/// Runs `f` with the current thread's scoped reporter, falling back to
/// [`NullReporter`] if none was installed.
pub fn with_scoped<R>(f: impl FnOnce(&dyn Reporter) -> R) -> R {
    SCOPED.with(|cell| match cell.borrow().as_ref() {
        Some(reporter) => f(reporter.as_ref()),
        None => f(&NullReporter),
    })
}
