//! String interning for keyword names.
//!
//! Interned strings are heap `str` objects that are looked up by content and never freed,
//! so two interned names with equal text are the same `HeapId`. The call binder relies on
//! this to match keywords by identity before falling back to string comparison.

use ahash::AHashMap;

use crate::heap::HeapId;

/// Text-to-object table owned by a [`Heap`](crate::heap::Heap).
#[derive(Debug, Default)]
pub(crate) struct Interns {
    strings: AHashMap<Box<str>, HeapId>,
}

impl Interns {
    pub fn get(&self, s: &str) -> Option<HeapId> {
        self.strings.get(s).copied()
    }

    pub fn insert(&mut self, s: &str, id: HeapId) {
        self.strings.insert(s.into(), id);
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }
}
