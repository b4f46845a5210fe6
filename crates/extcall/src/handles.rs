//! Helpers for extension code that juggles many owned handles.

use crate::{
    exception::{ExcType, RunResult},
    heap::{DropWithHeap, Heap, HeapId},
    resource::ResourceTracker,
    value::Value,
};

/// Collects owned values so they can all be released at once.
///
/// Useful in functions with many exit points: every intermediate value is added to the
/// tracker and a single [`close`](Self::close) releases them, whichever path was taken.
#[derive(Debug, Default)]
pub struct HandleTracker {
    handles: Vec<Value>,
}

impl HandleTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            handles: Vec::with_capacity(capacity),
        }
    }

    /// Takes ownership of `value` and returns a borrowed reference valid until the tracker
    /// is closed.
    pub fn add(&mut self, value: Value) -> HeapId {
        let id = value.id();
        self.handles.push(value);
        id
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Stops tracking every value without releasing it; ownership moves to the caller.
    pub fn forget_all(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.handles)
    }

    /// Releases every tracked value.
    pub fn close(self, heap: &mut Heap<impl ResourceTracker>) {
        self.handles.drop_with_heap(heap);
    }
}

impl<T: ResourceTracker> DropWithHeap<T> for HandleTracker {
    fn drop_with_heap(self, heap: &mut Heap<T>) {
        self.close(heap);
    }
}

/// Fixed-size slot storage shared by the tuple and list builders.
#[derive(Debug)]
struct Slots {
    items: Vec<Option<Value>>,
}

impl Slots {
    fn new(len: usize) -> Self {
        Self {
            items: std::iter::repeat_with(|| None).take(len).collect(),
        }
    }

    fn set(&mut self, heap: &mut Heap<impl ResourceTracker>, index: usize, value: Value) -> RunResult<()> {
        let Some(slot) = self.items.get_mut(index) else {
            value.drop_with_heap(heap);
            return Err(ExcType::bad_internal_call());
        };
        if let Some(old) = slot.replace(value) {
            old.drop_with_heap(heap);
        }
        Ok(())
    }

    /// Returns the items if every slot was set; otherwise releases them.
    fn finish(self, heap: &mut Heap<impl ResourceTracker>, kind: &str) -> RunResult<Vec<Value>> {
        if let Some(missing) = self.items.iter().position(Option::is_none) {
            self.items.drop_with_heap(heap);
            return Err(ExcType::system_error(format!("{kind} builder slot {missing} was never set")));
        }
        Ok(self.items.into_iter().flatten().collect())
    }
}

impl<T: ResourceTracker> DropWithHeap<T> for Slots {
    fn drop_with_heap(self, heap: &mut Heap<T>) {
        self.items.drop_with_heap(heap);
    }
}

/// Builds a tuple of known length slot by slot.
#[derive(Debug)]
pub struct TupleBuilder(Slots);

impl TupleBuilder {
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self(Slots::new(len))
    }

    /// Stores `value` at `index`, releasing any value set there before.
    ///
    /// An out-of-range index releases `value` and raises `SystemError`.
    pub fn set(&mut self, heap: &mut Heap<impl ResourceTracker>, index: usize, value: Value) -> RunResult<()> {
        self.0.set(heap, index, value)
    }

    /// Creates the tuple. Fails with `SystemError` if any slot is unset, releasing the rest.
    pub fn build(self, heap: &mut Heap<impl ResourceTracker>) -> RunResult<Value> {
        let items = self.0.finish(heap, "tuple")?;
        heap.new_tuple(items)
    }

    /// Abandons the builder, releasing everything set so far.
    pub fn cancel(self, heap: &mut Heap<impl ResourceTracker>) {
        self.0.drop_with_heap(heap);
    }
}

/// Builds a list of known length slot by slot.
#[derive(Debug)]
pub struct ListBuilder(Slots);

impl ListBuilder {
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self(Slots::new(len))
    }

    pub fn set(&mut self, heap: &mut Heap<impl ResourceTracker>, index: usize, value: Value) -> RunResult<()> {
        self.0.set(heap, index, value)
    }

    pub fn build(self, heap: &mut Heap<impl ResourceTracker>) -> RunResult<Value> {
        let items = self.0.finish(heap, "list")?;
        heap.new_list(items)
    }

    pub fn cancel(self, heap: &mut Heap<impl ResourceTracker>) {
        self.0.drop_with_heap(heap);
    }
}

/// Creates a tuple holding new references to each of `items`.
pub fn tuple_from_array(heap: &mut Heap<impl ResourceTracker>, items: &[HeapId]) -> RunResult<Value> {
    let items = items.iter().map(|&id| heap.retain(id)).collect();
    heap.new_tuple(items)
}
