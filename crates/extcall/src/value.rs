use std::mem::ManuallyDrop;

use crate::{
    heap::{Heap, HeapId},
    resource::ResourceTracker,
};

/// An owned reference to a heap object.
///
/// Holding a `Value` means holding one reference count on the object. `Value` is
/// neither `Clone` nor `Copy`: a second reference is obtained with
/// [`clone_with_heap`](Self::clone_with_heap) and every `Value` must leave scope through
/// [`drop_with_heap`](Self::drop_with_heap), [`into_raw`](Self::into_raw), or by being
/// moved into a container. Borrowed references are plain [`HeapId`]s.
///
/// The layout is a single machine word, identical to `HeapId` and to the ABI handle types
/// in [`trampoline`](crate::trampoline).
#[derive(Debug, PartialEq, Eq)]
#[repr(transparent)]
pub struct Value(HeapId);

impl Value {
    /// Wraps a reference the heap has just created for the caller.
    #[inline]
    pub(crate) fn from_new(id: HeapId) -> Self {
        Self(id)
    }

    /// Takes ownership of one existing reference to `id`.
    ///
    /// Use this for raw ids received under an ownership-transferring convention, such as
    /// the return value of a handle-based implementation.
    #[inline]
    #[must_use]
    pub fn adopt(id: HeapId) -> Self {
        Self(id)
    }

    /// Borrows the referenced object.
    #[inline]
    #[must_use]
    pub fn id(&self) -> HeapId {
        self.0
    }

    /// Gives up ownership without touching the refcount; the reference now belongs to
    /// whoever receives the raw id.
    #[inline]
    #[must_use]
    pub fn into_raw(self) -> HeapId {
        let this = ManuallyDrop::new(self);
        this.0
    }

    /// Creates a second owned reference to the same object.
    #[inline]
    #[must_use]
    pub fn clone_with_heap(&self, heap: &Heap<impl ResourceTracker>) -> Self {
        heap.inc_ref(self.0);
        Self(self.0)
    }

    /// Releases this reference.
    #[inline]
    pub fn drop_with_heap(self, heap: &mut Heap<impl ResourceTracker>) {
        let id = self.into_raw();
        heap.dec_ref(id);
    }
}

#[cfg(feature = "ref-count-panic")]
impl Drop for Value {
    fn drop(&mut self) {
        panic!("Value {:?} dropped without drop_with_heap", self.0);
    }
}
