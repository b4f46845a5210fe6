//! Object payloads stored in the heap beyond the scalar variants of `HeapData`.

pub mod dict;
pub mod native;

pub use dict::{Dict, DictKey};
pub use native::{NativeObject, PURE_HEADER_SIZE, TypeFlags};
