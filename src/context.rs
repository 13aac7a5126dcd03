/*!
Run-scoped progress reporting and cooperative cancellation.

A [`RunContext`] travels through every pipeline stage. It carries an optional
[`CancelToken`] that long stages poll at bounded intervals, and an optional
[`ProgressSink`] fed a completion fraction in `[0, 1]` that never decreases
over the course of one run.
*/

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Receives completion fractions as a run advances.
pub trait ProgressSink {
    /// Called with a fraction in `[0, 1]`, monotone over one run.
    fn update(&self, fraction: f64);
}

/// Cooperative cancellation flag shared between a run and its controller.
///
/// Cloning is cheap and every clone observes the same flag, so the token can
/// be handed to another thread while a run is underway.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the run holding this token to stop at its next poll.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-run bundle of cancellation and progress plumbing.
pub struct RunContext<'a> {
    cancel: Option<&'a CancelToken>,
    sink: Option<&'a dyn ProgressSink>,
    watermark: AtomicU64,
}

impl<'a> RunContext<'a> {
    pub fn new() -> Self {
        Self {
            cancel: None,
            sink: None,
            watermark: AtomicU64::new(0),
        }
    }

    pub fn with_cancel(mut self, token: &'a CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_progress(mut self, sink: &'a dyn ProgressSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.map(CancelToken::is_cancelled).unwrap_or(false)
    }

    /// Forward `fraction` to the sink, clamped to `[0, 1]` and never below
    /// any fraction already reported for this run.
    pub fn report(&self, fraction: f64) {
        let Some(sink) = self.sink else {
            return;
        };
        if !fraction.is_finite() {
            return;
        }
        // non-negative doubles order the same as their bit patterns
        let bits = fraction.clamp(0.0, 1.0).to_bits();
        let prev = self.watermark.fetch_max(bits, Ordering::Relaxed);
        sink.update(f64::from_bits(bits.max(prev)));
    }

    /// View of this context covering one stage's slice of the run.
    pub fn stage(&self, offset: f64, span: f64) -> StageContext<'a, '_> {
        StageContext {
            run: self,
            offset,
            span,
        }
    }
}

impl Default for RunContext<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RunContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("cancelled", &self.is_cancelled())
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

/// Stage-local handle rescaling `[0, 1]` stage progress onto the slice of
/// the run that the stage accounts for.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a, 'b> {
    run: &'b RunContext<'a>,
    offset: f64,
    span: f64,
}

impl StageContext<'_, '_> {
    pub fn is_cancelled(&self) -> bool {
        self.run.is_cancelled()
    }

    pub fn report(&self, fraction: f64) {
        self.run
            .report(self.offset + self.span * fraction.clamp(0.0, 1.0));
    }

    pub fn done(&self) {
        self.report(1.0);
    }
}
