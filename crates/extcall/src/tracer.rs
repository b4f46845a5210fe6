//! Marshaling trace infrastructure.
//!
//! Provides a trait-based tracing system with zero-cost abstraction. When using
//! [`NoopTracer`], all trace methods compile away entirely via monomorphization,
//! the same way [`NoLimitTracker`](crate::resource::NoLimitTracker) eliminates resource
//! checking overhead.
//!
//! | Tracer | Purpose |
//! |--------|---------|
//! | [`NoopTracer`] | Zero-cost no-op (production default) |
//! | [`StderrTracer`] | Human-readable marshaling log to stderr |
//! | [`RecordingTracer`] | Full event recording for tests and post-mortem |
//!
//! The context is parameterized as `Context<T: ResourceTracker, Tr: MarshalTracer>`:
//!
//! ```
//! use extcall::{Context, NoLimitTracker, RecordingTracer, build_value};
//!
//! let mut ctx = Context::with_tracer(NoLimitTracker, RecordingTracer::new());
//! let value = build_value(&mut ctx, "i", vec![7.into()]).unwrap();
//! value.drop_with_heap(ctx.heap_mut());
//! assert_eq!(ctx.tracer().events().len(), 1);
//! ```

use crate::{binder::BindError, trampoline::Family};

/// Trace event emitted while marshaling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// A format string was interpreted.
    Build {
        format: String,
        /// Whether a value was produced.
        ok: bool,
    },
    /// A call was bound successfully.
    Bind {
        fname: Option<String>,
        nargs: usize,
        nkwargs: usize,
        /// True when the positional slice was returned unchanged.
        fast_path: bool,
    },
    /// Binding failed with the rendered diagnostic.
    BindError { fname: Option<String>, message: String },
    /// A spec's keyword names were interned for the first time in this context.
    NamesInterned { fname: Option<String>, count: usize },
    /// A trampoline adapted one call.
    Trampoline {
        family: Family,
        /// False when the error sentinel was returned.
        ok: bool,
    },
}

/// Trait for marshaling traces.
///
/// All methods have default no-op implementations, so [`NoopTracer`] requires
/// zero lines of code and compiles to zero instructions. Implementations only
/// override the hooks they care about.
pub trait MarshalTracer: std::fmt::Debug {
    /// Called after the builder interpreted `format`.
    #[inline(always)]
    fn on_build(&mut self, _format: &str, _ok: bool) {}

    /// Called after a successful bind.
    ///
    /// # Arguments
    /// * `fname` - The spec's function name, if declared
    /// * `nargs` - Number of positional arguments supplied
    /// * `nkwargs` - Number of keyword arguments supplied
    /// * `fast_path` - Whether the caller's positional slice was returned unchanged
    #[inline(always)]
    fn on_bind(&mut self, _fname: Option<&str>, _nargs: usize, _nkwargs: usize, _fast_path: bool) {}

    /// Called when binding fails, before the error is returned.
    #[inline(always)]
    fn on_bind_error(&mut self, _fname: Option<&str>, _error: &BindError) {}

    /// Called when a spec's keyword names are interned and cached.
    #[inline(always)]
    fn on_names_interned(&mut self, _fname: Option<&str>, _count: usize) {}

    /// Called when a trampoline returns to the ambient caller.
    #[inline(always)]
    fn on_trampoline(&mut self, _family: Family, _ok: bool) {}
}

// ============================================================================
// NoopTracer: zero-cost production default
// ============================================================================

/// A tracer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl MarshalTracer for NoopTracer {}

// ============================================================================
// StderrTracer: human-readable marshaling log
// ============================================================================

/// Tracer that prints one line per event to stderr.
///
/// Output format:
/// ```text
/// build  "(iis)"            ok
/// bind   f()                nargs=1 nkwargs=1 slow
/// ERROR  f()                f() missing required argument 'b' (pos 2)
/// intern f()                names=2
/// tramp  Keywords           ok
/// ```
#[derive(Debug, Default)]
pub struct StderrTracer {
    /// Maximum number of lines to print before stopping. None = unlimited.
    limit: Option<usize>,
    count: usize,
    stopped: bool,
}

impl StderrTracer {
    /// Creates a new stderr tracer with no line limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new stderr tracer that stops after `limit` lines.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    fn emit(&mut self, line: std::fmt::Arguments<'_>) {
        if self.stopped {
            return;
        }
        eprintln!("{line}");
        self.count += 1;
        if let Some(limit) = self.limit
            && self.count >= limit
        {
            eprintln!("--- trace limit reached ({limit} events) ---");
            self.stopped = true;
        }
    }
}

fn display_name(fname: Option<&str>) -> String {
    fname.map_or_else(|| "<anonymous>".to_owned(), |name| format!("{name}()"))
}

impl MarshalTracer for StderrTracer {
    fn on_build(&mut self, format: &str, ok: bool) {
        let status = if ok { "ok" } else { "error" };
        let quoted = format!("{format:?}");
        self.emit(format_args!("build  {quoted:<18} {status}"));
    }

    fn on_bind(&mut self, fname: Option<&str>, nargs: usize, nkwargs: usize, fast_path: bool) {
        let path = if fast_path { "fast" } else { "slow" };
        let name = display_name(fname);
        self.emit(format_args!("bind   {name:<18} nargs={nargs} nkwargs={nkwargs} {path}"));
    }

    fn on_bind_error(&mut self, fname: Option<&str>, error: &BindError) {
        let name = display_name(fname);
        self.emit(format_args!("ERROR  {name:<18} {error}"));
    }

    fn on_names_interned(&mut self, fname: Option<&str>, count: usize) {
        let name = display_name(fname);
        self.emit(format_args!("intern {name:<18} names={count}"));
    }

    fn on_trampoline(&mut self, family: Family, ok: bool) {
        let status = if ok { "ok" } else { "error" };
        let family = format!("{family:?}");
        self.emit(format_args!("tramp  {family:<18} {status}"));
    }
}

// ============================================================================
// RecordingTracer: full event recording
// ============================================================================

/// Tracer that records every event.
///
/// Allocates per event, so use it for tests and for recording short sessions.
#[derive(Debug, Default)]
pub struct RecordingTracer {
    events: Vec<TraceEvent>,
}

impl RecordingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Number of binds that took the slow path.
    #[must_use]
    pub fn slow_binds(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, TraceEvent::Bind { fast_path: false, .. }))
            .count()
    }
}

impl MarshalTracer for RecordingTracer {
    fn on_build(&mut self, format: &str, ok: bool) {
        self.events.push(TraceEvent::Build {
            format: format.to_owned(),
            ok,
        });
    }

    fn on_bind(&mut self, fname: Option<&str>, nargs: usize, nkwargs: usize, fast_path: bool) {
        self.events.push(TraceEvent::Bind {
            fname: fname.map(str::to_owned),
            nargs,
            nkwargs,
            fast_path,
        });
    }

    fn on_bind_error(&mut self, fname: Option<&str>, error: &BindError) {
        self.events.push(TraceEvent::BindError {
            fname: fname.map(str::to_owned),
            message: error.to_string(),
        });
    }

    fn on_names_interned(&mut self, fname: Option<&str>, count: usize) {
        self.events.push(TraceEvent::NamesInterned {
            fname: fname.map(str::to_owned),
            count,
        });
    }

    fn on_trampoline(&mut self, family: Family, ok: bool) {
        self.events.push(TraceEvent::Trampoline { family, ok });
    }
}
