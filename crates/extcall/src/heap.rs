use std::{
    cell::Cell,
    collections::BTreeMap,
    fmt::Write,
    mem::{ManuallyDrop, size_of},
    num::NonZeroUsize,
    ptr::addr_of,
    sync::atomic::{AtomicUsize, Ordering},
    vec,
};

use num_bigint::BigInt;
use num_traits::ToPrimitive;
use strum::IntoStaticStr;

use crate::{
    exception::RunResult,
    intern::Interns,
    resource::{MAX_DATA_RECURSION_DEPTH, ResourceError, ResourceTracker},
    types::{Dict, NativeObject, TypeFlags},
    value::Value,
};

/// Snapshot of heap state at a point in time.
///
/// The `objects_by_type` map uses `BTreeMap` for deterministic iteration order,
/// making snapshots suitable for display and comparison without sort overhead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapStats {
    /// Total number of live objects on the heap, including immortal singletons.
    pub live_objects: usize,
    /// Number of free (recycled) slots available for reuse.
    pub free_slots: usize,
    /// Total heap capacity (live + free).
    pub total_slots: usize,
    /// Breakdown of live objects by `HeapData` variant name ("Tuple", "Dict", "Str", ...).
    pub objects_by_type: BTreeMap<&'static str, usize>,
    /// Number of interned strings.
    pub interned_strings: usize,
    /// Resource tracker allocation count, if using `LimitedTracker`.
    pub tracker_allocations: Option<usize>,
    /// Resource tracker memory usage in bytes, if using `LimitedTracker`.
    pub tracker_memory_bytes: Option<usize>,
}

/// Borrowed reference to an object stored inside the heap arena.
///
/// Never null: the ABI types in [`trampoline`](crate::trampoline) use `0` for "no object".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct HeapId(NonZeroUsize);

impl HeapId {
    #[inline]
    fn from_index(index: usize) -> Self {
        Self(NonZeroUsize::MIN.saturating_add(index))
    }

    /// Returns the slot index.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0.get() - 1
    }

    /// Returns the machine-word encoding shared with the ABI handle types.
    #[inline]
    #[must_use]
    pub fn to_bits(self) -> usize {
        self.0.get()
    }

    /// Decodes a machine word; `0` is "no object".
    #[inline]
    #[must_use]
    pub fn from_bits(bits: usize) -> Option<Self> {
        NonZeroUsize::new(bits).map(Self)
    }
}

/// Payload of a heap object.
#[derive(Debug, IntoStaticStr)]
pub enum HeapData {
    None,
    Bool(bool),
    Int(i64),
    /// Integers outside the `i64` range.
    LongInt(BigInt),
    Float(f64),
    Str(Box<str>),
    Bytes(Box<[u8]>),
    Tuple(Box<[Value]>),
    List(Vec<Value>),
    Dict(Dict),
    Native(NativeObject),
}

impl HeapData {
    /// The runtime-visible type name, as used in diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) | Self::LongInt(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Bytes(_) => "bytes",
            Self::Tuple(_) => "tuple",
            Self::List(_) => "list",
            Self::Dict(_) => "dict",
            Self::Native(native) => native.type_name(),
        }
    }

    fn estimate_size(&self) -> usize {
        size_of::<Self>()
            + match self {
                Self::Str(s) => s.len(),
                Self::Bytes(b) => b.len(),
                Self::LongInt(big) => usize::try_from(big.bits().div_ceil(8)).unwrap_or(usize::MAX),
                Self::Tuple(items) => items.len() * size_of::<Value>(),
                Self::List(items) => items.capacity() * size_of::<Value>(),
                Self::Dict(dict) => dict.len() * 4 * size_of::<Value>(),
                Self::Native(native) => native.storage_size(),
                Self::None | Self::Bool(_) | Self::Int(_) | Self::Float(_) => 0,
            }
    }

    /// Moves the ids of every owned child reference into `out`.
    fn into_child_ids(self, out: &mut Vec<HeapId>) {
        match self {
            Self::Tuple(items) => out.extend(items.into_vec().into_iter().map(Value::into_raw)),
            Self::List(items) => out.extend(items.into_iter().map(Value::into_raw)),
            Self::Dict(dict) => dict.into_ids(out),
            _ => {}
        }
    }
}

#[derive(Debug)]
struct HeapValue {
    refcount: AtomicUsize,
    /// Singletons and interned strings ignore refcounting and are never freed.
    immortal: bool,
    data: HeapData,
}

/// Reference-counted object arena.
///
/// Every object reachable by extension code lives here. Freed slots are recycled through a
/// free list, so a `HeapId` must not be used after its last reference was released.
#[derive(Debug)]
pub struct Heap<T: ResourceTracker> {
    entries: Vec<Option<HeapValue>>,
    free_list: Vec<HeapId>,
    tracker: T,
    interns: Interns,
    /// Levels of nested data left before traversals (repr, key hashing) give up.
    data_depth_remaining: Cell<u16>,
    none_id: HeapId,
    true_id: HeapId,
    false_id: HeapId,
    empty_tuple_id: HeapId,
}

impl<T: ResourceTracker> Heap<T> {
    /// Creates a heap holding only the immortal singletons (`None`, `True`, `False`, `()`).
    pub fn new(tracker: T) -> Self {
        let mut heap = Self {
            entries: Vec::new(),
            free_list: Vec::new(),
            tracker,
            interns: Interns::default(),
            data_depth_remaining: Cell::new(MAX_DATA_RECURSION_DEPTH),
            none_id: HeapId::from_index(0),
            true_id: HeapId::from_index(1),
            false_id: HeapId::from_index(2),
            empty_tuple_id: HeapId::from_index(3),
        };
        for data in [
            HeapData::None,
            HeapData::Bool(true),
            HeapData::Bool(false),
            HeapData::Tuple(Box::default()),
        ] {
            heap.insert(data, true);
        }
        heap
    }

    #[must_use]
    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    /// Allocates a new heap entry and returns the only reference to it.
    ///
    /// Returns `Err(ResourceError)` if allocation would exceed configured limits; the
    /// children owned by `data` are released in that case.
    pub fn allocate(&mut self, data: HeapData) -> Result<Value, ResourceError> {
        if let Err(err) = self.tracker.on_allocate(|| data.estimate_size()) {
            let mut children = Vec::new();
            data.into_child_ids(&mut children);
            for child in children {
                self.dec_ref(child);
            }
            return Err(err);
        }
        Ok(Value::from_new(self.insert(data, false)))
    }

    fn insert(&mut self, data: HeapData, immortal: bool) -> HeapId {
        let entry = HeapValue {
            refcount: AtomicUsize::new(1),
            immortal,
            data,
        };
        if let Some(id) = self.free_list.pop() {
            self.entries[id.index()] = Some(entry);
            id
        } else {
            let id = HeapId::from_index(self.entries.len());
            self.entries.push(Some(entry));
            id
        }
    }

    /// Increments the reference count for an existing heap entry.
    ///
    /// Uses interior mutability for the refcount, so only shared access to the heap
    /// is required.
    ///
    /// # Panics
    /// Panics if the id is invalid or the object has already been freed.
    pub fn inc_ref(&self, id: HeapId) {
        let value = self
            .entries
            .get(id.index())
            .expect("Heap::inc_ref: slot missing")
            .as_ref()
            .expect("Heap::inc_ref: object already freed");
        if !value.immortal {
            value.refcount.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Decrements the reference count and frees the object (plus children) once it hits zero.
    ///
    /// Children are released through an explicit work list, so arbitrarily deep nesting
    /// does not grow the call stack.
    ///
    /// # Panics
    /// Panics if the id is invalid or the object has already been freed.
    pub fn dec_ref(&mut self, id: HeapId) {
        if let Some(data) = self.take_last_reference(id) {
            self.free_all(id, data);
        }
    }

    /// Releases an object's storage regardless of its reference count.
    ///
    /// This is the final step of a native destructor. Children are still released through
    /// the normal refcounting path. Immortal objects are left untouched.
    ///
    /// # Panics
    /// Panics if the id is invalid or the object has already been freed.
    pub fn release_storage(&mut self, id: HeapId) {
        let slot = self.entries.get_mut(id.index()).expect("Heap::release_storage: slot missing");
        if slot.as_ref().expect("Heap::release_storage: object already freed").immortal {
            return;
        }
        if let Some(value) = slot.take() {
            self.free_all(id, value.data);
        }
    }

    /// Drops one reference; returns the payload when it was the last one.
    fn take_last_reference(&mut self, id: HeapId) -> Option<HeapData> {
        let slot = self.entries.get_mut(id.index()).expect("Heap::dec_ref: slot missing");
        let entry = slot.as_mut().expect("Heap::dec_ref: object already freed");
        if entry.immortal {
            return None;
        }
        let count = entry.refcount.load(Ordering::Relaxed);
        if count > 1 {
            entry.refcount.store(count - 1, Ordering::Relaxed);
            return None;
        }
        slot.take().map(|value| value.data)
    }

    fn free_all(&mut self, id: HeapId, data: HeapData) {
        let mut pending = Vec::new();
        self.free_slot(id, data, &mut pending);
        while let Some(child) = pending.pop() {
            if let Some(data) = self.take_last_reference(child) {
                self.free_slot(child, data, &mut pending);
            }
        }
    }

    fn free_slot(&mut self, id: HeapId, data: HeapData, pending: &mut Vec<HeapId>) {
        self.free_list.push(id);
        self.tracker.on_free(|| data.estimate_size());
        data.into_child_ids(pending);
    }

    /// Creates a new owned reference to an existing object.
    #[must_use]
    pub fn retain(&self, id: HeapId) -> Value {
        self.inc_ref(id);
        Value::from_new(id)
    }

    /// Returns an immutable reference to the heap data stored at the given id.
    ///
    /// # Panics
    /// Panics if the id is invalid or the object has already been freed.
    #[must_use]
    pub fn get(&self, id: HeapId) -> &HeapData {
        &self
            .entries
            .get(id.index())
            .expect("Heap::get: slot missing")
            .as_ref()
            .expect("Heap::get: object already freed")
            .data
    }

    /// Returns the heap data if the slot is live, `None` instead of panicking otherwise.
    #[must_use]
    pub fn get_if_live(&self, id: HeapId) -> Option<&HeapData> {
        self.entries.get(id.index())?.as_ref().map(|entry| &entry.data)
    }

    /// Returns a mutable reference to the heap data stored at the given id.
    ///
    /// # Panics
    /// Panics if the id is invalid or the object has already been freed.
    pub fn get_mut(&mut self, id: HeapId) -> &mut HeapData {
        &mut self
            .entries
            .get_mut(id.index())
            .expect("Heap::get_mut: slot missing")
            .as_mut()
            .expect("Heap::get_mut: object already freed")
            .data
    }

    /// Mutable counterpart of [`get_if_live`](Self::get_if_live).
    pub fn get_mut_if_live(&mut self, id: HeapId) -> Option<&mut HeapData> {
        self.entries.get_mut(id.index())?.as_mut().map(|entry| &mut entry.data)
    }

    /// Returns the current refcount of a live object, or 0 when freed.
    #[must_use]
    pub fn refcount(&self, id: HeapId) -> usize {
        self.entries
            .get(id.index())
            .and_then(Option::as_ref)
            .map_or(0, |entry| entry.refcount.load(Ordering::Relaxed))
    }

    #[must_use]
    pub fn is_live(&self, id: HeapId) -> bool {
        self.get_if_live(id).is_some()
    }

    /// Snapshot of the heap's current state.
    #[must_use]
    pub fn stats(&self) -> HeapStats {
        let mut objects_by_type = BTreeMap::new();
        let mut live_objects = 0;
        for entry in self.entries.iter().flatten() {
            live_objects += 1;
            *objects_by_type.entry(<&'static str>::from(&entry.data)).or_insert(0) += 1;
        }
        HeapStats {
            live_objects,
            free_slots: self.free_list.len(),
            total_slots: self.entries.len(),
            objects_by_type,
            interned_strings: self.interns.len(),
            tracker_allocations: self.tracker.allocation_count(),
            tracker_memory_bytes: self.tracker.current_memory_bytes(),
        }
    }

    /// Attempts to enter one level of nested data (repr, key hashing).
    ///
    /// Returns `false` once the depth limit is reached. Every `true` must be paired with
    /// one [`data_depth_exit`](Self::data_depth_exit).
    #[inline]
    #[must_use]
    pub fn data_depth_enter(&self) -> bool {
        let remaining = self.data_depth_remaining.get();
        if remaining == 0 {
            false
        } else {
            self.data_depth_remaining.set(remaining - 1);
            true
        }
    }

    #[inline]
    pub fn data_depth_exit(&self) {
        self.data_depth_remaining.set(self.data_depth_remaining.get() + 1);
    }

    // ------------------------------------------------------------------
    // singletons and constructors
    // ------------------------------------------------------------------

    #[must_use]
    pub fn none_id(&self) -> HeapId {
        self.none_id
    }

    #[must_use]
    pub fn none(&self) -> Value {
        Value::from_new(self.none_id)
    }

    #[must_use]
    pub fn bool(&self, b: bool) -> Value {
        Value::from_new(if b { self.true_id } else { self.false_id })
    }

    #[must_use]
    pub fn empty_tuple(&self) -> Value {
        Value::from_new(self.empty_tuple_id)
    }

    pub fn new_int(&mut self, i: i64) -> RunResult<Value> {
        Ok(self.allocate(HeapData::Int(i))?)
    }

    /// Creates an int from an unsigned value, promoting to a big integer above `i64::MAX`.
    pub fn new_uint(&mut self, u: u64) -> RunResult<Value> {
        match i64::try_from(u) {
            Ok(i) => self.new_int(i),
            Err(_) => Ok(self.allocate(HeapData::LongInt(BigInt::from(u)))?),
        }
    }

    pub fn new_float(&mut self, f: f64) -> RunResult<Value> {
        Ok(self.allocate(HeapData::Float(f))?)
    }

    pub fn new_str(&mut self, s: &str) -> RunResult<Value> {
        Ok(self.allocate(HeapData::Str(s.into()))?)
    }

    pub fn new_bytes(&mut self, b: &[u8]) -> RunResult<Value> {
        Ok(self.allocate(HeapData::Bytes(b.into()))?)
    }

    /// Creates a tuple that takes ownership of `items`. An empty tuple is the singleton.
    pub fn new_tuple(&mut self, items: Vec<Value>) -> RunResult<Value> {
        if items.is_empty() {
            return Ok(self.empty_tuple());
        }
        Ok(self.allocate(HeapData::Tuple(items.into_boxed_slice()))?)
    }

    /// Creates a list that takes ownership of `items`.
    pub fn new_list(&mut self, items: Vec<Value>) -> RunResult<Value> {
        Ok(self.allocate(HeapData::List(items))?)
    }

    pub fn new_dict(&mut self, dict: Dict) -> RunResult<Value> {
        Ok(self.allocate(HeapData::Dict(dict))?)
    }

    /// Creates a zero-initialised instance of a native extension type.
    pub fn new_native(&mut self, type_name: &'static str, flags: TypeFlags, payload_len: usize) -> RunResult<Value> {
        Ok(self.allocate(HeapData::Native(NativeObject::new(type_name, flags, payload_len)))?)
    }

    /// Returns the interned `str` object for `s`, creating it on first use.
    ///
    /// The result is borrowed: interned strings live as long as the heap.
    pub fn intern(&mut self, s: &str) -> Result<HeapId, ResourceError> {
        if let Some(id) = self.interns.get(s) {
            return Ok(id);
        }
        let data = HeapData::Str(s.into());
        self.tracker.on_allocate(|| data.estimate_size())?;
        let id = self.insert(data, true);
        self.interns.insert(s, id);
        Ok(id)
    }

    #[must_use]
    pub fn is_interned(&self, id: HeapId) -> bool {
        self.as_str(id).is_some_and(|s| self.interns.get(s) == Some(id))
    }

    // ------------------------------------------------------------------
    // inspection
    // ------------------------------------------------------------------

    /// The runtime-visible type name of an object.
    #[must_use]
    pub fn type_name(&self, id: HeapId) -> &'static str {
        self.get(id).type_name()
    }

    #[must_use]
    pub fn is_none(&self, id: HeapId) -> bool {
        id == self.none_id
    }

    #[must_use]
    pub fn as_str(&self, id: HeapId) -> Option<&str> {
        match self.get_if_live(id)? {
            HeapData::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self, id: HeapId) -> Option<i64> {
        match self.get_if_live(id)? {
            HeapData::Int(i) => Some(*i),
            HeapData::Bool(b) => Some(i64::from(*b)),
            HeapData::LongInt(big) => big.to_i64(),
            _ => None,
        }
    }

    /// Borrowed items of a tuple, or `None` if `id` is not a tuple.
    #[must_use]
    pub fn tuple_items(&self, id: HeapId) -> Option<&[Value]> {
        match self.get_if_live(id)? {
            HeapData::Tuple(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_dict(&self, id: HeapId) -> Option<&Dict> {
        match self.get_if_live(id)? {
            HeapData::Dict(dict) => Some(dict),
            _ => None,
        }
    }

    /// True if `a` and `b` are the same object or both are strings with equal text.
    #[must_use]
    pub fn str_eq(&self, a: HeapId, b: HeapId) -> bool {
        a == b || matches!((self.as_str(a), self.as_str(b)), (Some(x), Some(y)) if x == y)
    }

    /// Renders an object the way the runtime's `repr()` would.
    #[must_use]
    pub fn repr(&self, id: HeapId) -> String {
        let mut out = String::new();
        self.repr_into(id, &mut out);
        out
    }

    fn repr_into(&self, id: HeapId, out: &mut String) {
        if !self.data_depth_enter() {
            out.push_str("...");
            return;
        }
        self.repr_data(id, out);
        self.data_depth_exit();
    }

    fn repr_data(&self, id: HeapId, out: &mut String) {
        match self.get(id) {
            HeapData::None => out.push_str("None"),
            HeapData::Bool(true) => out.push_str("True"),
            HeapData::Bool(false) => out.push_str("False"),
            HeapData::Int(i) => {
                let _ = write!(out, "{i}");
            }
            HeapData::LongInt(big) => {
                let _ = write!(out, "{big}");
            }
            HeapData::Float(f) => float_repr(*f, out),
            HeapData::Str(s) => str_repr(s, out),
            HeapData::Bytes(b) => bytes_repr(b, out),
            HeapData::Tuple(items) => {
                out.push('(');
                self.repr_items(items.iter().map(Value::id), out);
                if items.len() == 1 {
                    out.push(',');
                }
                out.push(')');
            }
            HeapData::List(items) => {
                out.push('[');
                self.repr_items(items.iter().map(Value::id), out);
                out.push(']');
            }
            HeapData::Dict(dict) => {
                out.push('{');
                for (i, (key, value)) in dict.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.repr_into(key, out);
                    out.push_str(": ");
                    self.repr_into(value, out);
                }
                out.push('}');
            }
            HeapData::Native(native) => {
                let _ = write!(out, "<{} object>", native.type_name());
            }
        }
    }

    fn repr_items(&self, ids: impl Iterator<Item = HeapId>, out: &mut String) {
        for (i, id) in ids.enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.repr_into(id, out);
        }
    }
}

fn float_repr(f: f64, out: &mut String) {
    if f.is_nan() {
        out.push_str("nan");
    } else if f.is_infinite() {
        out.push_str(if f > 0.0 { "inf" } else { "-inf" });
    } else if f.fract() == 0.0 && f.abs() < 1e16 {
        let _ = write!(out, "{f:.1}");
    } else {
        let _ = write!(out, "{f}");
    }
}

fn str_repr(s: &str, out: &mut String) {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => {
                let _ = write!(out, "\\x{:02x}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
}

fn bytes_repr(b: &[u8], out: &mut String) {
    out.push_str("b'");
    for &byte in b {
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'\'' => out.push_str("\\'"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..0x7f => out.push(char::from(byte)),
            _ => {
                let _ = write!(out, "\\x{byte:02x}");
            }
        }
    }
    out.push('\'');
}

/// Forgets every owned child reference before the heap's storage is dropped, so the
/// `ref-count-panic` check only fires for values that escaped the heap.
#[cfg(feature = "ref-count-panic")]
impl<T: ResourceTracker> Drop for Heap<T> {
    fn drop(&mut self) {
        let mut dummy = Vec::new();
        for entry in self.entries.drain(..).flatten() {
            entry.data.into_child_ids(&mut dummy);
        }
    }
}

/// This trait represents types that contain a `Heap`; it allows for more complex structures
/// to participate in the `HeapGuard` pattern.
pub trait ContainsHeap<T: ResourceTracker> {
    fn heap_mut(&mut self) -> &mut Heap<T>;
}

impl<T: ResourceTracker> ContainsHeap<T> for Heap<T> {
    #[inline]
    fn heap_mut(&mut self) -> &mut Self {
        self
    }
}

/// Trait for types that require heap access for proper cleanup.
///
/// Rust's standard `Drop` trait cannot decrement heap reference counts because it has no
/// access to the `Heap`. This trait provides an explicit drop-with-heap method so that
/// owned references (and containers of them) can properly decrement their counts when
/// they are no longer needed.
///
/// **All types implementing this trait must be cleaned up on every code path**, not just
/// the happy path, but also early returns and error branches. Prefer [`HeapGuard`] to
/// guarantee cleanup automatically rather than inserting manual calls in every branch.
pub trait DropWithHeap<T: ResourceTracker> {
    /// Consume `self` and decrement reference counts for any owned references contained within.
    fn drop_with_heap(self, heap: &mut Heap<T>);
}

impl<T: ResourceTracker> DropWithHeap<T> for Value {
    #[inline]
    fn drop_with_heap(self, heap: &mut Heap<T>) {
        Self::drop_with_heap(self, heap);
    }
}

impl<T: ResourceTracker, U: DropWithHeap<T>> DropWithHeap<T> for Option<U> {
    #[inline]
    fn drop_with_heap(self, heap: &mut Heap<T>) {
        if let Some(value) = self {
            value.drop_with_heap(heap);
        }
    }
}

impl<T: ResourceTracker, U: DropWithHeap<T>> DropWithHeap<T> for Vec<U> {
    fn drop_with_heap(self, heap: &mut Heap<T>) {
        for value in self {
            value.drop_with_heap(heap);
        }
    }
}

impl<T: ResourceTracker, U: DropWithHeap<T>> DropWithHeap<T> for vec::IntoIter<U> {
    fn drop_with_heap(self, heap: &mut Heap<T>) {
        for value in self {
            value.drop_with_heap(heap);
        }
    }
}

impl<T: ResourceTracker> DropWithHeap<T> for (Value, Value) {
    fn drop_with_heap(self, heap: &mut Heap<T>) {
        let (key, value) = self;
        key.drop_with_heap(heap);
        value.drop_with_heap(heap);
    }
}

/// RAII guard that ensures a [`DropWithHeap`] value is cleaned up on every code path.
///
/// The guard's `Drop` impl calls [`DropWithHeap::drop_with_heap`] automatically, so
/// cleanup happens whether the scope exits normally, via `?`, early return, or any other
/// branch.
///
/// On the normal path, the guarded value can be borrowed via
/// [`as_parts_mut`](Self::as_parts_mut), or reclaimed via [`into_parts`](Self::into_parts)
/// (which consumes the guard without dropping the value).
pub(crate) struct HeapGuard<'a, T: ResourceTracker, H: ContainsHeap<T>, V: DropWithHeap<T>> {
    // manually dropped because it needs to be dropped by move.
    value: ManuallyDrop<V>,
    heap: &'a mut H,
    _tracker: std::marker::PhantomData<T>,
}

impl<'a, T: ResourceTracker, H: ContainsHeap<T>, V: DropWithHeap<T>> HeapGuard<'a, T, H, V> {
    /// Creates a new `HeapGuard` for the given value and heap.
    #[inline]
    pub fn new(value: V, heap: &'a mut H) -> Self {
        Self {
            value: ManuallyDrop::new(value),
            heap,
            _tracker: std::marker::PhantomData,
        }
    }

    /// Borrows the value (mutably) and heap (mutably) out of the guard.
    #[inline]
    pub fn as_parts_mut(&mut self) -> (&mut V, &mut H) {
        (&mut self.value, self.heap)
    }

    /// Consumes the guard and returns the value and heap separately, without dropping.
    #[inline]
    pub fn into_parts(self) -> (V, &'a mut H) {
        let mut this = ManuallyDrop::new(self);
        // SAFETY: `ManuallyDrop` prevents `Drop` on self, so we can recover the parts
        unsafe { (ManuallyDrop::take(&mut this.value), addr_of!(this.heap).read()) }
    }
}

impl<T: ResourceTracker, H: ContainsHeap<T>, V: DropWithHeap<T>> Drop for HeapGuard<'_, T, H, V> {
    fn drop(&mut self) {
        // SAFETY: value is never manually dropped until this point
        unsafe { ManuallyDrop::take(&mut self.value) }.drop_with_heap(self.heap.heap_mut());
    }
}
