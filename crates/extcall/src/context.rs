use crate::{
    exception::RunError,
    heap::{ContainsHeap, Heap},
    param_spec::ParamSpecCache,
    resource::{NoLimitTracker, ResourceTracker},
    tracer::{MarshalTracer, NoopTracer},
};

/// One runtime instance as seen by extension code.
///
/// Owns the object heap, the pending-error slot (the ambient error channel), the
/// per-runtime cache of interned keyword names, and the tracer. Every builder, binder and
/// trampoline call runs against exactly one `Context`.
#[derive(Debug)]
pub struct Context<T: ResourceTracker, Tr: MarshalTracer = NoopTracer> {
    heap: Heap<T>,
    pending: Option<RunError>,
    names: ParamSpecCache,
    tracer: Tr,
}

/// Context with no resource limits and no tracing.
pub type DefaultContext = Context<NoLimitTracker, NoopTracer>;

impl<T: ResourceTracker> Context<T, NoopTracer> {
    pub fn new(tracker: T) -> Self {
        Self::with_tracer(tracker, NoopTracer)
    }
}

impl Default for DefaultContext {
    fn default() -> Self {
        Self::new(NoLimitTracker)
    }
}

impl<T: ResourceTracker, Tr: MarshalTracer> Context<T, Tr> {
    pub fn with_tracer(tracker: T, tracer: Tr) -> Self {
        Self {
            heap: Heap::new(tracker),
            pending: None,
            names: ParamSpecCache::default(),
            tracer,
        }
    }

    #[must_use]
    pub fn heap(&self) -> &Heap<T> {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap<T> {
        &mut self.heap
    }

    /// True if an error is pending.
    #[must_use]
    pub fn err_occurred(&self) -> bool {
        self.pending.is_some()
    }

    /// The pending error, if any, without clearing it.
    #[must_use]
    pub fn pending_error(&self) -> Option<&RunError> {
        self.pending.as_ref()
    }

    /// Sets the pending error, replacing any previous one.
    pub fn set_error(&mut self, err: impl Into<RunError>) {
        self.pending = Some(err.into());
    }

    /// Takes and clears the pending error.
    pub fn take_error(&mut self) -> Option<RunError> {
        self.pending.take()
    }

    #[must_use]
    pub fn tracer(&self) -> &Tr {
        &self.tracer
    }

    pub fn tracer_mut(&mut self) -> &mut Tr {
        &mut self.tracer
    }

    #[must_use]
    pub fn names(&self) -> &ParamSpecCache {
        &self.names
    }

    /// Splits the context into the pieces the binder needs at once.
    pub(crate) fn parts_mut(&mut self) -> (&mut Heap<T>, &mut ParamSpecCache, &mut Tr) {
        (&mut self.heap, &mut self.names, &mut self.tracer)
    }
}

impl<T: ResourceTracker, Tr: MarshalTracer> ContainsHeap<T> for Context<T, Tr> {
    #[inline]
    fn heap_mut(&mut self) -> &mut Heap<T> {
        &mut self.heap
    }
}
