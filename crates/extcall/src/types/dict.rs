use ahash::RandomState;
use indexmap::IndexMap;
use num_bigint::BigInt;

use crate::{
    exception::{ExcType, RunResult},
    heap::{DropWithHeap, Heap, HeapData, HeapId},
    resource::ResourceTracker,
    value::Value,
};

/// Hashable projection of a dict key.
///
/// Keys that compare equal in the runtime project to the same `DictKey`: `True`, `1` and
/// `1.0` are all `Int(1)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DictKey {
    None,
    Int(i64),
    BigInt(BigInt),
    /// Bit pattern of a non-integral float.
    Float(u64),
    Str(Box<str>),
    Bytes(Box<[u8]>),
    Tuple(Box<[DictKey]>),
    /// Native objects hash by identity.
    Identity(HeapId),
}

impl DictKey {
    /// Computes the key projection of a heap object.
    ///
    /// Raises `RecursionError` for tuples nested deeper than
    /// [`MAX_DATA_RECURSION_DEPTH`](crate::MAX_DATA_RECURSION_DEPTH).
    pub fn of(heap: &Heap<impl ResourceTracker>, id: HeapId) -> RunResult<Self> {
        Ok(match heap.get(id) {
            HeapData::None => Self::None,
            HeapData::Bool(b) => Self::Int(i64::from(*b)),
            HeapData::Int(i) => Self::Int(*i),
            HeapData::LongInt(big) => match i64::try_from(big) {
                Ok(i) => Self::Int(i),
                Err(_) => Self::BigInt(big.clone()),
            },
            HeapData::Float(f) => float_key(*f),
            HeapData::Str(s) => Self::Str(s.clone()),
            HeapData::Bytes(b) => Self::Bytes(b.clone()),
            HeapData::Tuple(items) => {
                if !heap.data_depth_enter() {
                    return Err(ExcType::recursion_error());
                }
                let items: RunResult<Box<[Self]>> = items.iter().map(|item| Self::of(heap, item.id())).collect();
                heap.data_depth_exit();
                Self::Tuple(items?)
            }
            HeapData::Native(_) => Self::Identity(id),
            data @ (HeapData::List(_) | HeapData::Dict(_)) => {
                return Err(ExcType::type_error_unhashable(data.type_name()));
            }
        })
    }
}

#[expect(clippy::cast_possible_truncation, reason = "range is checked before the cast")]
fn float_key(f: f64) -> DictKey {
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    if f.fract() == 0.0 && in_range {
        DictKey::Int(f as i64)
    } else {
        DictKey::Float(f.to_bits())
    }
}

/// Insertion-ordered mapping of owned keys to owned values.
#[derive(Debug, Default)]
pub struct Dict {
    entries: IndexMap<DictKey, (Value, Value), RandomState>,
}

impl Dict {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a dict from adjacent `(key, value)` pairs in insertion order.
    ///
    /// On error every item, consumed or not, is released. `items.len()` must be even;
    /// a trailing unpaired item is released and ignored.
    pub fn from_pairs(heap: &mut Heap<impl ResourceTracker>, items: Vec<Value>) -> RunResult<Self> {
        let mut dict = Self::new();
        let mut items = items.into_iter();
        while let Some(key) = items.next() {
            let Some(value) = items.next() else {
                key.drop_with_heap(heap);
                break;
            };
            if let Err(err) = dict.set_item(heap, key, value) {
                items.drop_with_heap(heap);
                dict.drop_with_heap(heap);
                return Err(err);
            }
        }
        Ok(dict)
    }

    /// Inserts or replaces an entry. A replaced entry keeps its original key object.
    pub fn set_item(&mut self, heap: &mut Heap<impl ResourceTracker>, key: Value, value: Value) -> RunResult<()> {
        let hash_key = match DictKey::of(heap, key.id()) {
            Ok(hash_key) => hash_key,
            Err(err) => {
                key.drop_with_heap(heap);
                value.drop_with_heap(heap);
                return Err(err);
            }
        };
        if let Some((_, slot)) = self.entries.get_mut(&hash_key) {
            let old = std::mem::replace(slot, value);
            old.drop_with_heap(heap);
            key.drop_with_heap(heap);
        } else {
            self.entries.insert(hash_key, (key, value));
        }
        Ok(())
    }

    /// Looks up the value stored under `key`, borrowed.
    #[must_use]
    pub fn get(&self, key: &DictKey) -> Option<HeapId> {
        self.entries.get(key).map(|(_, value)| value.id())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(key, value)` pairs in insertion order, borrowed.
    pub fn iter(&self) -> impl Iterator<Item = (HeapId, HeapId)> + '_ {
        self.entries.values().map(|(key, value)| (key.id(), value.id()))
    }

    /// Moves every key and value id into `out`, giving up ownership to the caller.
    pub(crate) fn into_ids(self, out: &mut Vec<HeapId>) {
        for (_, (key, value)) in self.entries {
            out.push(key.into_raw());
            out.push(value.into_raw());
        }
    }
}

impl<T: ResourceTracker> DropWithHeap<T> for Dict {
    fn drop_with_heap(self, heap: &mut Heap<T>) {
        for (_, pair) in self.entries {
            pair.drop_with_heap(heap);
        }
    }
}
