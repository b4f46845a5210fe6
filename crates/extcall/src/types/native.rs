use std::{ffi::c_void, fmt, mem::size_of};

/// Size of the object header that precedes the payload of a "pure" native object.
///
/// Equal to a reference count plus a type pointer.
pub const PURE_HEADER_SIZE: usize = 2 * size_of::<usize>();

/// Type flags of a native extension type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[repr(transparent)]
pub struct TypeFlags(u64);

impl TypeFlags {
    pub const DEFAULT: Self = Self(0);
    /// The instance payload starts after a [`PURE_HEADER_SIZE`]-byte header instead of at
    /// the object's base address.
    pub const INTERNAL_PURE: Self = Self(1 << 8);

    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// An instance of a native extension type.
///
/// Storage is a zeroed, 8-byte aligned block holding a [`PURE_HEADER_SIZE`] header followed
/// by the payload. Legacy types see the whole block (their struct embeds the header);
/// pure types only see the payload.
pub struct NativeObject {
    type_name: &'static str,
    flags: TypeFlags,
    payload_len: usize,
    storage: Box<[u64]>,
}

impl fmt::Debug for NativeObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeObject")
            .field("type_name", &self.type_name)
            .field("flags", &self.flags)
            .field("payload_len", &self.payload_len)
            .finish_non_exhaustive()
    }
}

impl NativeObject {
    #[must_use]
    pub fn new(type_name: &'static str, flags: TypeFlags, payload_len: usize) -> Self {
        let words = (PURE_HEADER_SIZE + payload_len).div_ceil(size_of::<u64>());
        Self {
            type_name,
            flags,
            payload_len,
            storage: vec![0u64; words].into_boxed_slice(),
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    #[must_use]
    pub fn flags(&self) -> TypeFlags {
        self.flags
    }

    /// The instance payload, after the header.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.bytes()[PURE_HEADER_SIZE..PURE_HEADER_SIZE + self.payload_len]
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        let range = PURE_HEADER_SIZE..PURE_HEADER_SIZE + self.payload_len;
        &mut self.bytes_mut()[range]
    }

    /// Pointer handed to a type's destructor: the payload for pure types, the object base
    /// otherwise.
    pub fn destructor_data(&mut self) -> *mut c_void {
        let offset = if self.flags.contains(TypeFlags::INTERNAL_PURE) {
            PURE_HEADER_SIZE
        } else {
            0
        };
        self.bytes_mut()[offset..].as_mut_ptr().cast()
    }

    /// Approximate number of bytes owned by this object.
    #[must_use]
    pub fn storage_size(&self) -> usize {
        self.storage.len() * size_of::<u64>()
    }

    fn bytes(&self) -> &[u8] {
        // SAFETY: every bit pattern is a valid u8 and u8 has no alignment requirement; the
        // byte view covers exactly the storage allocation and borrows it immutably.
        unsafe { std::slice::from_raw_parts(self.storage.as_ptr().cast::<u8>(), self.storage_size()) }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        let len = self.storage_size();
        // SAFETY: as in `bytes`, and the exclusive borrow of `self` makes the view unique.
        unsafe { std::slice::from_raw_parts_mut(self.storage.as_mut_ptr().cast::<u8>(), len) }
    }
}
