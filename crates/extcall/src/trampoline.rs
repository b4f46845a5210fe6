//! Adapters between the ambient calling convention and handle-based implementations.
//!
//! The ambient convention passes raw object words (a receiver, an argument tuple, a keyword
//! dict) and signals errors with a sentinel return plus a pending error. Handle-based
//! implementations instead receive the context, the receiver as a [`Handle`], and the
//! positional arguments as a `&[Handle]` slice.
//!
//! Each family has an `unsafe fn` adapter here that does the conversion, and the
//! [`trampolines!`](crate::trampolines) macro exports one `extern "C"` entry point per
//! declared symbol:
//!
//! ```
//! use extcall::{DefaultContext, trampoline::Handle, trampolines};
//!
//! // Returns a new reference to the receiver.
//! fn identity(ctx: &mut DefaultContext, slf: Handle) -> Handle {
//!     slf.id().map_or(Handle::NULL, |id| Handle::from_value(ctx.heap().retain(id)))
//! }
//!
//! trampolines! {
//!     context = DefaultContext;
//!     noargs fn doc_identity = identity;
//! }
//! ```
//!
//! Handles, raw object words, [`HeapId`] and [`Value`] all share one layout: a single
//! non-zero machine word, with `0` meaning "no object". The varargs-style adapters rely on
//! this to hand out a tuple's item storage as `&[Handle]` without copying.

use std::{
    cmp::Ordering,
    ffi::{c_char, c_int, c_void},
    mem::{align_of, offset_of, size_of},
    ptr, slice,
};

use strum::{Display, IntoStaticStr};

use crate::{
    context::Context,
    exception::ExcType,
    heap::{HeapData, HeapId},
    resource::ResourceTracker,
    tracer::MarshalTracer,
    value::Value,
};

/// An object word in the ambient convention. `0` is null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct RawObject(usize);

impl RawObject {
    pub const NULL: Self = Self(0);

    #[must_use]
    pub const fn from_bits(bits: usize) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn to_bits(self) -> usize {
        self.0
    }

    /// Borrowed reference to `id`.
    #[must_use]
    pub fn from_id(id: HeapId) -> Self {
        Self(id.to_bits())
    }

    /// Transfers ownership of `value` to whoever receives this word.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        Self::from_id(value.into_raw())
    }

    #[must_use]
    pub fn id(self) -> Option<HeapId> {
        HeapId::from_bits(self.0)
    }

    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn to_handle(self) -> Handle {
        Handle(self.0)
    }
}

/// A reference as seen by handle-based implementations. `0` is [`Handle::NULL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Handle(usize);

impl Handle {
    pub const NULL: Self = Self(0);

    #[must_use]
    pub fn from_id(id: HeapId) -> Self {
        Self(id.to_bits())
    }

    /// Transfers ownership of `value` into the returned handle.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        Self::from_id(value.into_raw())
    }

    #[must_use]
    pub fn id(self) -> Option<HeapId> {
        HeapId::from_bits(self.0)
    }

    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn to_raw(self) -> RawObject {
        RawObject(self.0)
    }
}

/// Buffer view in the ambient convention.
#[repr(C)]
#[derive(Debug)]
pub struct RawBuffer {
    pub buf: *mut c_void,
    pub obj: RawObject,
    pub len: isize,
    pub itemsize: isize,
    pub readonly: c_int,
    pub ndim: c_int,
    pub format: *mut c_char,
    pub shape: *mut isize,
    pub strides: *mut isize,
    pub suboffsets: *mut isize,
    pub internal: *mut c_void,
}

/// Buffer view as seen by handle-based implementations.
#[repr(C)]
#[derive(Debug)]
pub struct HandleBuffer {
    pub buf: *mut c_void,
    pub obj: Handle,
    pub len: isize,
    pub itemsize: isize,
    pub readonly: c_int,
    pub ndim: c_int,
    pub format: *mut c_char,
    pub shape: *mut isize,
    pub strides: *mut isize,
    pub suboffsets: *mut isize,
    pub internal: *mut c_void,
}

impl Default for RawBuffer {
    fn default() -> Self {
        Self {
            buf: ptr::null_mut(),
            obj: RawObject::NULL,
            len: 0,
            itemsize: 0,
            readonly: 0,
            ndim: 0,
            format: ptr::null_mut(),
            shape: ptr::null_mut(),
            strides: ptr::null_mut(),
            suboffsets: ptr::null_mut(),
            internal: ptr::null_mut(),
        }
    }
}

// The adapters reinterpret tuple storage and buffer views in place.
const _: () = {
    assert!(size_of::<Handle>() == size_of::<Value>());
    assert!(align_of::<Handle>() == align_of::<Value>());
    assert!(size_of::<Handle>() == size_of::<HeapId>());
    assert!(size_of::<Handle>() == size_of::<RawObject>());
    assert!(size_of::<RawBuffer>() == size_of::<HandleBuffer>());
    assert!(align_of::<RawBuffer>() == align_of::<HandleBuffer>());
    assert!(offset_of!(RawBuffer, buf) == offset_of!(HandleBuffer, buf));
    assert!(offset_of!(RawBuffer, obj) == offset_of!(HandleBuffer, obj));
    assert!(offset_of!(RawBuffer, len) == offset_of!(HandleBuffer, len));
    assert!(offset_of!(RawBuffer, itemsize) == offset_of!(HandleBuffer, itemsize));
    assert!(offset_of!(RawBuffer, readonly) == offset_of!(HandleBuffer, readonly));
    assert!(offset_of!(RawBuffer, ndim) == offset_of!(HandleBuffer, ndim));
    assert!(offset_of!(RawBuffer, format) == offset_of!(HandleBuffer, format));
    assert!(offset_of!(RawBuffer, shape) == offset_of!(HandleBuffer, shape));
    assert!(offset_of!(RawBuffer, strides) == offset_of!(HandleBuffer, strides));
    assert!(offset_of!(RawBuffer, suboffsets) == offset_of!(HandleBuffer, suboffsets));
    assert!(offset_of!(RawBuffer, internal) == offset_of!(HandleBuffer, internal));
};

/// Rich comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[repr(i32)]
pub enum CompareOp {
    Lt = 0,
    Le = 1,
    Eq = 2,
    Ne = 3,
    Gt = 4,
    Ge = 5,
}

impl CompareOp {
    #[must_use]
    pub fn from_raw(op: c_int) -> Option<Self> {
        Some(match op {
            0 => Self::Lt,
            1 => Self::Le,
            2 => Self::Eq,
            3 => Self::Ne,
            4 => Self::Gt,
            5 => Self::Ge,
            _ => return None,
        })
    }

    #[must_use]
    pub fn to_raw(self) -> c_int {
        self as c_int
    }

    /// Whether an ordering satisfies this operator.
    #[must_use]
    pub fn matches(self, ordering: Ordering) -> bool {
        match self {
            Self::Lt => ordering.is_lt(),
            Self::Le => ordering.is_le(),
            Self::Eq => ordering.is_eq(),
            Self::Ne => ordering.is_ne(),
            Self::Gt => ordering.is_gt(),
            Self::Ge => ordering.is_ge(),
        }
    }
}

/// Function families a trampoline can adapt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
pub enum Family {
    NoArgs,
    O,
    VarArgs,
    Keywords,
    InitProc,
    DestroyFunc,
    RichCmp,
    GetBuffer,
    ReleaseBuffer,
}

pub type NoArgsImpl<T, Tr> = fn(&mut Context<T, Tr>, Handle) -> Handle;
pub type OImpl<T, Tr> = fn(&mut Context<T, Tr>, Handle, Handle) -> Handle;
pub type VarArgsImpl<T, Tr> = fn(&mut Context<T, Tr>, Handle, &[Handle]) -> Handle;
pub type KeywordsImpl<T, Tr> = fn(&mut Context<T, Tr>, Handle, &[Handle], Handle) -> Handle;
pub type InitProcImpl<T, Tr> = fn(&mut Context<T, Tr>, Handle, &[Handle], Handle) -> c_int;
/// Receives the instance payload of the object being destroyed.
pub type DestroyImpl = fn(*mut c_void);
pub type RichCmpImpl<T, Tr> = fn(&mut Context<T, Tr>, Handle, Handle, CompareOp) -> Handle;
pub type GetBufferImpl<T, Tr> = fn(&mut Context<T, Tr>, Handle, &mut HandleBuffer, c_int) -> c_int;
pub type ReleaseBufferImpl<T, Tr> = fn(&mut Context<T, Tr>, Handle, &mut HandleBuffer);

/// Reports malformed ambient input.
fn reject<T: ResourceTracker, Tr: MarshalTracer>(ctx: &mut Context<T, Tr>, family: Family) {
    ctx.set_error(ExcType::bad_internal_call());
    ctx.tracer_mut().on_trampoline(family, false);
}

fn finish_object<T: ResourceTracker, Tr: MarshalTracer>(
    ctx: &mut Context<T, Tr>,
    family: Family,
    result: Handle,
) -> RawObject {
    ctx.tracer_mut().on_trampoline(family, !result.is_null());
    result.to_raw()
}

fn finish_status<T: ResourceTracker, Tr: MarshalTracer>(ctx: &mut Context<T, Tr>, family: Family, status: c_int) -> c_int {
    ctx.tracer_mut().on_trampoline(family, status >= 0);
    status
}

/// Borrows the items of an argument tuple as handles.
///
/// # Safety
/// The returned slice aliases the tuple's item storage. The caller must keep the tuple
/// alive and unmodified while the slice is in use.
unsafe fn tuple_handles<'t, T: ResourceTracker, Tr: MarshalTracer>(
    ctx: &Context<T, Tr>,
    args: RawObject,
) -> Option<&'t [Handle]> {
    let items = ctx.heap().tuple_items(args.id()?)?;
    // SAFETY: `Value` and `Handle` are both `repr(transparent)` over one machine word with
    // equal size and alignment (asserted above), and every `Value` bit pattern is a valid
    // `Handle`. Tuple storage is a boxed slice that does not move when the heap grows, and
    // the caller guarantees it is neither freed nor mutated while the slice lives.
    Some(unsafe { slice::from_raw_parts(items.as_ptr().cast::<Handle>(), items.len()) })
}

/// Resolves an optional keyword dict. `Err` means the word is not a dict.
fn keyword_handle<T: ResourceTracker, Tr: MarshalTracer>(ctx: &Context<T, Tr>, kw: RawObject) -> Result<Handle, ()> {
    match kw.id() {
        None => Ok(Handle::NULL),
        Some(id) if ctx.heap().as_dict(id).is_some() => Ok(Handle::from_id(id)),
        Some(_) => Err(()),
    }
}

/// `self` only; the second word is ignored.
///
/// # Safety
/// `ctx` must be null or point to a live `Context` that is not otherwise borrowed for the
/// duration of the call.
pub unsafe fn noargs<T: ResourceTracker, Tr: MarshalTracer>(
    ctx: *mut Context<T, Tr>,
    f: NoArgsImpl<T, Tr>,
    slf: RawObject,
    _unused: RawObject,
) -> RawObject {
    // SAFETY: guaranteed by the caller.
    let Some(ctx) = (unsafe { ctx.as_mut() }) else {
        return RawObject::NULL;
    };
    let result = f(ctx, slf.to_handle());
    finish_object(ctx, Family::NoArgs, result)
}

/// `self` and a single argument.
///
/// # Safety
/// As for [`noargs`].
pub unsafe fn o<T: ResourceTracker, Tr: MarshalTracer>(
    ctx: *mut Context<T, Tr>,
    f: OImpl<T, Tr>,
    slf: RawObject,
    arg: RawObject,
) -> RawObject {
    // SAFETY: guaranteed by the caller.
    let Some(ctx) = (unsafe { ctx.as_mut() }) else {
        return RawObject::NULL;
    };
    let result = f(ctx, slf.to_handle(), arg.to_handle());
    finish_object(ctx, Family::O, result)
}

/// `self` and an argument tuple, passed on as a handle slice.
///
/// # Safety
/// As for [`noargs`]. In addition `args` must stay referenced by the caller for the
/// duration of the call, and the implementation must not mutate it.
pub unsafe fn varargs<T: ResourceTracker, Tr: MarshalTracer>(
    ctx: *mut Context<T, Tr>,
    f: VarArgsImpl<T, Tr>,
    slf: RawObject,
    args: RawObject,
) -> RawObject {
    // SAFETY: guaranteed by the caller.
    let Some(ctx) = (unsafe { ctx.as_mut() }) else {
        return RawObject::NULL;
    };
    // SAFETY: the caller keeps `args` alive and unmodified for the whole call.
    let Some(handles) = (unsafe { tuple_handles(ctx, args) }) else {
        reject(ctx, Family::VarArgs);
        return RawObject::NULL;
    };
    let result = f(ctx, slf.to_handle(), handles);
    finish_object(ctx, Family::VarArgs, result)
}

/// `self`, an argument tuple and an optional keyword dict.
///
/// # Safety
/// As for [`varargs`].
pub unsafe fn keywords<T: ResourceTracker, Tr: MarshalTracer>(
    ctx: *mut Context<T, Tr>,
    f: KeywordsImpl<T, Tr>,
    slf: RawObject,
    args: RawObject,
    kw: RawObject,
) -> RawObject {
    // SAFETY: guaranteed by the caller.
    let Some(ctx) = (unsafe { ctx.as_mut() }) else {
        return RawObject::NULL;
    };
    // SAFETY: the caller keeps `args` alive and unmodified for the whole call.
    let handles = unsafe { tuple_handles(ctx, args) };
    let (Some(handles), Ok(kw)) = (handles, keyword_handle(ctx, kw)) else {
        reject(ctx, Family::Keywords);
        return RawObject::NULL;
    };
    let result = f(ctx, slf.to_handle(), handles, kw);
    finish_object(ctx, Family::Keywords, result)
}

/// Instance initialiser: like [`keywords`] but returns `0` or `-1`.
///
/// # Safety
/// As for [`varargs`].
pub unsafe fn initproc<T: ResourceTracker, Tr: MarshalTracer>(
    ctx: *mut Context<T, Tr>,
    f: InitProcImpl<T, Tr>,
    slf: RawObject,
    args: RawObject,
    kw: RawObject,
) -> c_int {
    // SAFETY: guaranteed by the caller.
    let Some(ctx) = (unsafe { ctx.as_mut() }) else {
        return -1;
    };
    // SAFETY: the caller keeps `args` alive and unmodified for the whole call.
    let handles = unsafe { tuple_handles(ctx, args) };
    let (Some(handles), Ok(kw)) = (handles, keyword_handle(ctx, kw)) else {
        reject(ctx, Family::InitProc);
        return -1;
    };
    let status = f(ctx, slf.to_handle(), handles, kw);
    finish_status(ctx, Family::InitProc, status)
}

/// Destructor: hands the instance payload to `f`, then frees the object's storage.
///
/// Pure types (flagged [`TypeFlags::INTERNAL_PURE`](crate::TypeFlags::INTERNAL_PURE)) get a
/// pointer just past the object header; other types get the object's base address. The
/// storage is released whatever the reference count says.
///
/// # Safety
/// As for [`noargs`]. `obj` must not be used after the call.
pub unsafe fn destroyfunc<T: ResourceTracker, Tr: MarshalTracer>(
    ctx: *mut Context<T, Tr>,
    f: DestroyImpl,
    obj: RawObject,
) {
    // SAFETY: guaranteed by the caller.
    let Some(ctx) = (unsafe { ctx.as_mut() }) else {
        return;
    };
    let Some(id) = obj.id() else {
        reject(ctx, Family::DestroyFunc);
        return;
    };
    let Some(HeapData::Native(native)) = ctx.heap_mut().get_mut_if_live(id) else {
        reject(ctx, Family::DestroyFunc);
        return;
    };
    f(native.destructor_data());
    ctx.heap_mut().release_storage(id);
    ctx.tracer_mut().on_trampoline(Family::DestroyFunc, true);
}

/// Rich comparison.
///
/// # Safety
/// As for [`noargs`].
pub unsafe fn richcmp<T: ResourceTracker, Tr: MarshalTracer>(
    ctx: *mut Context<T, Tr>,
    f: RichCmpImpl<T, Tr>,
    slf: RawObject,
    other: RawObject,
    op: c_int,
) -> RawObject {
    // SAFETY: guaranteed by the caller.
    let Some(ctx) = (unsafe { ctx.as_mut() }) else {
        return RawObject::NULL;
    };
    let Some(op) = CompareOp::from_raw(op) else {
        reject(ctx, Family::RichCmp);
        return RawObject::NULL;
    };
    let result = f(ctx, slf.to_handle(), other.to_handle(), op);
    finish_object(ctx, Family::RichCmp, result)
}

/// Buffer export.
///
/// # Safety
/// As for [`noargs`]. `view` must be null or point to a writable `RawBuffer` that is not
/// otherwise accessed during the call.
pub unsafe fn getbuffer<T: ResourceTracker, Tr: MarshalTracer>(
    ctx: *mut Context<T, Tr>,
    f: GetBufferImpl<T, Tr>,
    slf: RawObject,
    view: *mut RawBuffer,
    flags: c_int,
) -> c_int {
    // SAFETY: guaranteed by the caller.
    let Some(ctx) = (unsafe { ctx.as_mut() }) else {
        return -1;
    };
    // SAFETY: `RawBuffer` and `HandleBuffer` have identical layouts (asserted above) and
    // `RawObject`/`Handle` share every bit pattern; the caller grants exclusive access.
    let Some(view) = (unsafe { view.cast::<HandleBuffer>().as_mut() }) else {
        reject(ctx, Family::GetBuffer);
        return -1;
    };
    let status = f(ctx, slf.to_handle(), view, flags);
    finish_status(ctx, Family::GetBuffer, status)
}

/// Buffer release.
///
/// # Safety
/// As for [`getbuffer`].
pub unsafe fn releasebuffer<T: ResourceTracker, Tr: MarshalTracer>(
    ctx: *mut Context<T, Tr>,
    f: ReleaseBufferImpl<T, Tr>,
    slf: RawObject,
    view: *mut RawBuffer,
) {
    // SAFETY: guaranteed by the caller.
    let Some(ctx) = (unsafe { ctx.as_mut() }) else {
        return;
    };
    // SAFETY: as in `getbuffer`.
    let Some(view) = (unsafe { view.cast::<HandleBuffer>().as_mut() }) else {
        reject(ctx, Family::ReleaseBuffer);
        return;
    };
    f(ctx, slf.to_handle(), view);
    ctx.tracer_mut().on_trampoline(Family::ReleaseBuffer, true);
}

/// Exports one `extern "C"` entry point per declared implementation.
///
/// ```text
/// trampolines! {
///     context = MyContext;
///     noargs fn my_type_clear = clear_impl;
///     keywords fn my_type_call = call_impl;
///     destroyfunc fn my_type_dealloc = dealloc_impl;
/// }
/// ```
///
/// Every generated symbol takes the context pointer first, followed by the ambient
/// arguments of its family, and forwards to the matching adapter in
/// [`trampoline`](crate::trampoline).
#[macro_export]
macro_rules! trampolines {
    (context = $ctx:ty; $($family:ident fn $sym:ident = $imp:path;)*) => {
        $( $crate::trampolines!(@emit $ctx; $family $sym $imp); )*
    };
    (@emit $ctx:ty; noargs $sym:ident $imp:path) => {
        /// # Safety
        /// See [`extcall::trampoline::noargs`].
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $sym(
            ctx: *mut $ctx,
            slf: $crate::trampoline::RawObject,
            unused: $crate::trampoline::RawObject,
        ) -> $crate::trampoline::RawObject {
            // SAFETY: the caller upholds the adapter's contract.
            unsafe { $crate::trampoline::noargs(ctx, $imp, slf, unused) }
        }
    };
    (@emit $ctx:ty; o $sym:ident $imp:path) => {
        /// # Safety
        /// See [`extcall::trampoline::o`].
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $sym(
            ctx: *mut $ctx,
            slf: $crate::trampoline::RawObject,
            arg: $crate::trampoline::RawObject,
        ) -> $crate::trampoline::RawObject {
            // SAFETY: the caller upholds the adapter's contract.
            unsafe { $crate::trampoline::o(ctx, $imp, slf, arg) }
        }
    };
    (@emit $ctx:ty; varargs $sym:ident $imp:path) => {
        /// # Safety
        /// See [`extcall::trampoline::varargs`].
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $sym(
            ctx: *mut $ctx,
            slf: $crate::trampoline::RawObject,
            args: $crate::trampoline::RawObject,
        ) -> $crate::trampoline::RawObject {
            // SAFETY: the caller upholds the adapter's contract.
            unsafe { $crate::trampoline::varargs(ctx, $imp, slf, args) }
        }
    };
    (@emit $ctx:ty; keywords $sym:ident $imp:path) => {
        /// # Safety
        /// See [`extcall::trampoline::keywords`].
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $sym(
            ctx: *mut $ctx,
            slf: $crate::trampoline::RawObject,
            args: $crate::trampoline::RawObject,
            kw: $crate::trampoline::RawObject,
        ) -> $crate::trampoline::RawObject {
            // SAFETY: the caller upholds the adapter's contract.
            unsafe { $crate::trampoline::keywords(ctx, $imp, slf, args, kw) }
        }
    };
    (@emit $ctx:ty; initproc $sym:ident $imp:path) => {
        /// # Safety
        /// See [`extcall::trampoline::initproc`].
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $sym(
            ctx: *mut $ctx,
            slf: $crate::trampoline::RawObject,
            args: $crate::trampoline::RawObject,
            kw: $crate::trampoline::RawObject,
        ) -> ::std::ffi::c_int {
            // SAFETY: the caller upholds the adapter's contract.
            unsafe { $crate::trampoline::initproc(ctx, $imp, slf, args, kw) }
        }
    };
    (@emit $ctx:ty; destroyfunc $sym:ident $imp:path) => {
        /// # Safety
        /// See [`extcall::trampoline::destroyfunc`].
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $sym(ctx: *mut $ctx, obj: $crate::trampoline::RawObject) {
            // SAFETY: the caller upholds the adapter's contract.
            unsafe { $crate::trampoline::destroyfunc(ctx, $imp, obj) }
        }
    };
    (@emit $ctx:ty; richcmp $sym:ident $imp:path) => {
        /// # Safety
        /// See [`extcall::trampoline::richcmp`].
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $sym(
            ctx: *mut $ctx,
            slf: $crate::trampoline::RawObject,
            other: $crate::trampoline::RawObject,
            op: ::std::ffi::c_int,
        ) -> $crate::trampoline::RawObject {
            // SAFETY: the caller upholds the adapter's contract.
            unsafe { $crate::trampoline::richcmp(ctx, $imp, slf, other, op) }
        }
    };
    (@emit $ctx:ty; getbuffer $sym:ident $imp:path) => {
        /// # Safety
        /// See [`extcall::trampoline::getbuffer`].
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $sym(
            ctx: *mut $ctx,
            slf: $crate::trampoline::RawObject,
            view: *mut $crate::trampoline::RawBuffer,
            flags: ::std::ffi::c_int,
        ) -> ::std::ffi::c_int {
            // SAFETY: the caller upholds the adapter's contract.
            unsafe { $crate::trampoline::getbuffer(ctx, $imp, slf, view, flags) }
        }
    };
    (@emit $ctx:ty; releasebuffer $sym:ident $imp:path) => {
        /// # Safety
        /// See [`extcall::trampoline::releasebuffer`].
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $sym(
            ctx: *mut $ctx,
            slf: $crate::trampoline::RawObject,
            view: *mut $crate::trampoline::RawBuffer,
        ) {
            // SAFETY: the caller upholds the adapter's contract.
            unsafe { $crate::trampoline::releasebuffer(ctx, $imp, slf, view) }
        }
    };
}
