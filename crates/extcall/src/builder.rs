//! Value construction from a format string and a typed argument list.
//!
//! A format string is a sequence of directive characters, each consuming one argument
//! (two with a `#` length suffix) and producing one item. `(`, `[` and `{` open nested
//! tuples, lists and dicts. The items at the top level become the result: nothing gives
//! `None`, a single item is returned as is, several items form a tuple.
//!
//! ```
//! use extcall::{BuildArg, DefaultContext, build_value};
//!
//! let mut ctx = DefaultContext::default();
//! let value = build_value(&mut ctx, "(iis)", vec![1.into(), 2.into(), "x".into()]).unwrap();
//! assert_eq!(ctx.heap().repr(value.id()), "(1, 2, 'x')");
//! value.drop_with_heap(ctx.heap_mut());
//! ```
//!
//! Format strings are decoded once by [`Format::compile`], which rejects malformed strings
//! before any argument is touched. On every error path all owned arguments and every
//! partially built value are released.

use std::{any::Any, fmt, vec};

use crate::{
    context::Context,
    exception::{ExcType, RunError, RunResult, SimpleException},
    heap::{DropWithHeap, Heap, HeapGuard, HeapId},
    resource::ResourceTracker,
    tracer::{MarshalTracer, NoopTracer},
    types::Dict,
    value::Value,
};

/// Conversion function for the `O&` directive.
///
/// Receives the context and the raw argument and returns a new owned value.
pub type Converter<T, Tr = NoopTracer> = fn(&mut Context<T, Tr>, &dyn Any) -> RunResult<Value>;

/// One argument of a build call, tagged with its C-level type.
pub enum BuildArg<'a, T: ResourceTracker, Tr: MarshalTracer = NoopTracer> {
    /// `char *`; `None` is a null pointer.
    CStr(Option<&'a [u8]>),
    /// `wchar_t *`; `None` is a null pointer.
    Wide(Option<&'a [u32]>),
    /// The length following a `#` suffix.
    Size(isize),
    Int(i64),
    UInt(u64),
    Float(f64),
    /// Borrowed object; the builder takes a new reference.
    Object(Option<HeapId>),
    /// Owned object; the builder takes over the reference.
    Steal(Option<Value>),
    /// Converter and raw argument for `O&`.
    Convert(Converter<T, Tr>, Option<&'a dyn Any>),
}

impl<T: ResourceTracker, Tr: MarshalTracer> fmt::Debug for BuildArg<'_, T, Tr> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CStr(bytes) => f.debug_tuple("CStr").field(bytes).finish(),
            Self::Wide(chars) => f.debug_tuple("Wide").field(chars).finish(),
            Self::Size(n) => f.debug_tuple("Size").field(n).finish(),
            Self::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Self::UInt(u) => f.debug_tuple("UInt").field(u).finish(),
            Self::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Self::Object(id) => f.debug_tuple("Object").field(id).finish(),
            Self::Steal(value) => f.debug_tuple("Steal").field(value).finish(),
            Self::Convert(_, raw) => f.debug_tuple("Convert").field(&raw.is_some()).finish(),
        }
    }
}

impl<T: ResourceTracker, Tr: MarshalTracer> DropWithHeap<T> for BuildArg<'_, T, Tr> {
    fn drop_with_heap(self, heap: &mut Heap<T>) {
        if let Self::Steal(Some(value)) = self {
            value.drop_with_heap(heap);
        }
    }
}

impl<T: ResourceTracker, Tr: MarshalTracer> From<i32> for BuildArg<'_, T, Tr> {
    fn from(i: i32) -> Self {
        Self::Int(i.into())
    }
}

impl<T: ResourceTracker, Tr: MarshalTracer> From<i64> for BuildArg<'_, T, Tr> {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl<T: ResourceTracker, Tr: MarshalTracer> From<u32> for BuildArg<'_, T, Tr> {
    fn from(u: u32) -> Self {
        Self::UInt(u.into())
    }
}

impl<T: ResourceTracker, Tr: MarshalTracer> From<u64> for BuildArg<'_, T, Tr> {
    fn from(u: u64) -> Self {
        Self::UInt(u)
    }
}

impl<T: ResourceTracker, Tr: MarshalTracer> From<f64> for BuildArg<'_, T, Tr> {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl<'a, T: ResourceTracker, Tr: MarshalTracer> From<&'a str> for BuildArg<'a, T, Tr> {
    fn from(s: &'a str) -> Self {
        Self::CStr(Some(s.as_bytes()))
    }
}

impl<'a, T: ResourceTracker, Tr: MarshalTracer> From<&'a [u8]> for BuildArg<'a, T, Tr> {
    fn from(bytes: &'a [u8]) -> Self {
        Self::CStr(Some(bytes))
    }
}

impl<T: ResourceTracker, Tr: MarshalTracer> From<HeapId> for BuildArg<'_, T, Tr> {
    fn from(id: HeapId) -> Self {
        Self::Object(Some(id))
    }
}

impl<T: ResourceTracker, Tr: MarshalTracer> From<Value> for BuildArg<'_, T, Tr> {
    fn from(value: Value) -> Self {
        Self::Steal(Some(value))
    }
}

/// Composite kinds a group directive builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKind {
    Tuple,
    List,
    Dict,
}

impl GroupKind {
    #[must_use]
    pub fn opener(self) -> char {
        match self {
            Self::Tuple => '(',
            Self::List => '[',
            Self::Dict => '{',
        }
    }

    #[must_use]
    pub fn closer(self) -> char {
        match self {
            Self::Tuple => ')',
            Self::List => ']',
            Self::Dict => '}',
        }
    }
}

/// A decoded directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// `s`, `z`, `U`: text from UTF-8 bytes.
    Str { sized: bool },
    /// `y`: bytes.
    Bytes { sized: bool },
    /// `u`: text from code points.
    Wide { sized: bool },
    /// `i`, `b`, `h`: C `int`.
    CInt,
    /// `l`, `L`, `n`: 64-bit signed.
    Long,
    /// `B`, `H`, `I`: C `unsigned int`.
    CUInt,
    /// `k`, `K`: 64-bit unsigned.
    ULong,
    /// `c`: one byte as `bytes`.
    Char,
    /// `C`: one code point as `str`.
    UnicodeChar,
    /// `d`, `f`.
    Float,
    /// `O`, `S`: borrowed object.
    Object,
    /// `N`: owned object.
    Steal,
    /// `O&`.
    Convert,
    Open(GroupKind),
    Close(GroupKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Step {
    code: char,
    directive: Directive,
}

/// Malformed format string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatFault {
    BadChar(char),
    /// `:`, `,` or space outside any group.
    SeparatorOutsideGroup,
    OddDictItems,
}

/// Unbalanced group directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupFault {
    /// A closer of this kind without a matching opener.
    Unopened(GroupKind),
    /// An opener that is never closed.
    Unclosed,
}

/// Arguments that don't match the format string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallFault {
    NullObject,
    /// `position` is 1-based over the argument list.
    ArgMismatch { position: usize, code: char },
    MissingArg { position: usize, code: char },
    ExtraArgs { count: usize },
    LengthOutOfRange { position: usize, len: usize, available: usize },
}

/// Why a value could not be built.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildError {
    BadFormat(FormatFault),
    BadInternalCall(CallFault),
    DanglingGroup(GroupFault),
    /// An error raised while building a value, or the pending error behind a null handle.
    Raised(RunError),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadFormat(FormatFault::BadChar(_)) => f.write_str("bad format char passed to Py_BuildValue"),
            Self::BadFormat(FormatFault::SeparatorOutsideGroup) => f.write_str("':' without '{' in Py_BuildValue"),
            Self::BadFormat(FormatFault::OddDictItems) => {
                f.write_str("odd number of items in '{...}' group in Py_BuildValue")
            }
            Self::DanglingGroup(GroupFault::Unopened(kind)) => {
                write!(f, "'{}' without '{}' in Py_BuildValue", kind.closer(), kind.opener())
            }
            Self::DanglingGroup(GroupFault::Unclosed) => f.write_str("dangling group in Py_BuildValue"),
            Self::BadInternalCall(fault) => match fault {
                CallFault::NullObject => f.write_str("NULL object passed to Py_BuildValue"),
                CallFault::ArgMismatch { position, code } => {
                    write!(f, "argument {position} does not match format '{code}' in Py_BuildValue")
                }
                CallFault::MissingArg { position, code } => {
                    write!(f, "missing argument {position} for format '{code}' in Py_BuildValue")
                }
                CallFault::ExtraArgs { count } => write!(f, "{count} unused arguments passed to Py_BuildValue"),
                CallFault::LengthOutOfRange { position, len, available } => write!(
                    f,
                    "argument {position}: length {len} exceeds the {available} available in Py_BuildValue"
                ),
            },
            Self::Raised(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for BuildError {}

impl BuildError {
    #[must_use]
    pub fn exc_type(&self) -> ExcType {
        match self {
            Self::Raised(err) => err.exc_type().unwrap_or(ExcType::SystemError),
            _ => ExcType::SystemError,
        }
    }
}

impl From<RunError> for BuildError {
    fn from(err: RunError) -> Self {
        Self::Raised(err)
    }
}

impl From<BuildError> for RunError {
    fn from(err: BuildError) -> Self {
        match err {
            BuildError::Raised(err) => err,
            other => SimpleException::new_msg(ExcType::SystemError, other).into(),
        }
    }
}

/// A decoded format string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Format {
    source: Box<str>,
    steps: Vec<Step>,
    arg_count: usize,
    item_count: usize,
}

impl Format {
    /// Decodes and validates a format string.
    ///
    /// # Errors
    /// [`BuildError::BadFormat`] for unknown characters, separators at the top level and
    /// dict groups with an odd number of items; [`BuildError::DanglingGroup`] for
    /// unbalanced or mismatched group characters.
    pub fn compile(format: &str) -> Result<Self, BuildError> {
        let mut steps = Vec::with_capacity(format.len());
        let mut arg_count = 0;
        // open groups and the number of items each holds so far
        let mut groups: Vec<(GroupKind, usize)> = Vec::new();
        let mut item_count = 0;
        let mut chars = format.chars().peekable();

        while let Some(code) = chars.next() {
            let sized = matches!(code, 's' | 'z' | 'U' | 'y' | 'u') && chars.next_if_eq(&'#').is_some();
            let directive = match code {
                's' | 'z' | 'U' => Directive::Str { sized },
                'y' => Directive::Bytes { sized },
                'u' => Directive::Wide { sized },
                'i' | 'b' | 'h' => Directive::CInt,
                'l' | 'L' | 'n' => Directive::Long,
                'B' | 'H' | 'I' => Directive::CUInt,
                'k' | 'K' => Directive::ULong,
                'c' => Directive::Char,
                'C' => Directive::UnicodeChar,
                'd' | 'f' => Directive::Float,
                'O' if chars.next_if_eq(&'&').is_some() => Directive::Convert,
                'O' | 'S' => Directive::Object,
                'N' => Directive::Steal,
                '(' => Directive::Open(GroupKind::Tuple),
                '[' => Directive::Open(GroupKind::List),
                '{' => Directive::Open(GroupKind::Dict),
                ')' => Directive::Close(GroupKind::Tuple),
                ']' => Directive::Close(GroupKind::List),
                '}' => Directive::Close(GroupKind::Dict),
                ':' | ',' | ' ' => {
                    if groups.is_empty() {
                        return Err(BuildError::BadFormat(FormatFault::SeparatorOutsideGroup));
                    }
                    continue;
                }
                other => return Err(BuildError::BadFormat(FormatFault::BadChar(other))),
            };

            match directive {
                Directive::Open(kind) => groups.push((kind, 0)),
                Directive::Close(kind) => match groups.pop() {
                    Some((open, items)) if open == kind => {
                        if kind == GroupKind::Dict && items % 2 != 0 {
                            return Err(BuildError::BadFormat(FormatFault::OddDictItems));
                        }
                        match groups.last_mut() {
                            Some((_, parent_items)) => *parent_items += 1,
                            None => item_count += 1,
                        }
                    }
                    _ => return Err(BuildError::DanglingGroup(GroupFault::Unopened(kind))),
                },
                Directive::Str { sized } | Directive::Bytes { sized } | Directive::Wide { sized } => {
                    arg_count += 1 + usize::from(sized);
                }
                _ => arg_count += 1,
            }
            if !matches!(directive, Directive::Open(_) | Directive::Close(_)) {
                match groups.last_mut() {
                    Some((_, items)) => *items += 1,
                    None => item_count += 1,
                }
            }
            steps.push(Step { code, directive });
        }

        if !groups.is_empty() {
            return Err(BuildError::DanglingGroup(GroupFault::Unclosed));
        }
        Ok(Self {
            source: format.into(),
            steps,
            arg_count,
            item_count,
        })
    }

    /// The format string this was compiled from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Decoded directives, separators removed.
    pub fn directives(&self) -> impl Iterator<Item = Directive> + '_ {
        self.steps.iter().map(|step| step.directive)
    }

    /// Number of [`BuildArg`]s a call must supply.
    #[must_use]
    pub fn arg_count(&self) -> usize {
        self.arg_count
    }

    /// Number of top-level items the format produces.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.item_count
    }

    /// Builds a value from `args`.
    ///
    /// # Errors
    /// See [`BuildError`]. Every `Steal` argument is consumed whether or not the build
    /// succeeds.
    pub fn build<T: ResourceTracker, Tr: MarshalTracer>(
        &self,
        ctx: &mut Context<T, Tr>,
        args: Vec<BuildArg<'_, T, Tr>>,
    ) -> Result<Value, BuildError> {
        let result = self.run(ctx, args);
        ctx.tracer_mut().on_build(&self.source, result.is_ok());
        result
    }

    fn run<T: ResourceTracker, Tr: MarshalTracer>(
        &self,
        ctx: &mut Context<T, Tr>,
        args: Vec<BuildArg<'_, T, Tr>>,
    ) -> Result<Value, BuildError> {
        let state = BuildState {
            args: args.into_iter(),
            position: 0,
            bottom: Frame::default(),
            groups: Vec::new(),
        };
        let mut guard: HeapGuard<'_, T, _, _> = HeapGuard::new(state, ctx);

        for &Step { code, directive } in &self.steps {
            let (state, ctx) = guard.as_parts_mut();
            match directive {
                Directive::Open(_) => state.groups.push(Frame::default()),
                Directive::Close(kind) => {
                    let frame = state
                        .groups
                        .pop()
                        .ok_or_else(|| RunError::internal("builder closed a group that was never opened"))?;
                    let value = close_group(ctx.heap_mut(), kind, frame.items)?;
                    state.top().push_owned(value);
                }
                directive => match state.produce(ctx, code, directive)? {
                    Item::Owned(value) => state.top().push_owned(value),
                    Item::Retained(id) => state.top().push_retained(ctx.heap(), id),
                },
            }
        }

        let (state, _) = guard.as_parts_mut();
        let extra = state.args.len();
        if extra > 0 {
            return Err(BuildError::BadInternalCall(CallFault::ExtraArgs { count: extra }));
        }

        let (state, ctx) = guard.into_parts();
        let mut items = state.bottom.items;
        match items.len() {
            0 => Ok(ctx.heap().none()),
            1 => items
                .pop()
                .ok_or_else(|| RunError::internal("builder lost its only item").into()),
            _ => Ok(ctx.heap_mut().new_tuple(items)?),
        }
    }
}

/// Compiles `format` and builds a value from `args`.
///
/// On a format error the owned arguments are released before returning.
pub fn build_value<T: ResourceTracker, Tr: MarshalTracer>(
    ctx: &mut Context<T, Tr>,
    format: &str,
    args: Vec<BuildArg<'_, T, Tr>>,
) -> Result<Value, BuildError> {
    match Format::compile(format) {
        Ok(compiled) => compiled.build(ctx, args),
        Err(err) => {
            args.drop_with_heap(ctx.heap_mut());
            ctx.tracer_mut().on_build(format, false);
            Err(err)
        }
    }
}

/// Accumulated items of one open group.
#[derive(Debug, Default)]
struct Frame {
    items: Vec<Value>,
}

impl Frame {
    fn push_owned(&mut self, value: Value) {
        self.items.push(value);
    }

    fn push_retained(&mut self, heap: &Heap<impl ResourceTracker>, id: HeapId) {
        self.items.push(heap.retain(id));
    }
}

impl<T: ResourceTracker> DropWithHeap<T> for Frame {
    fn drop_with_heap(self, heap: &mut Heap<T>) {
        self.items.drop_with_heap(heap);
    }
}

fn close_group(heap: &mut Heap<impl ResourceTracker>, kind: GroupKind, items: Vec<Value>) -> RunResult<Value> {
    match kind {
        GroupKind::Tuple => heap.new_tuple(items),
        GroupKind::List => heap.new_list(items),
        GroupKind::Dict => {
            let dict = Dict::from_pairs(heap, items)?;
            heap.new_dict(dict)
        }
    }
}

/// What one value directive produced.
enum Item {
    /// A new reference the frame takes over.
    Owned(Value),
    /// A borrowed object the frame must retain.
    Retained(HeapId),
}

/// Everything a build owns while it runs.
struct BuildState<'a, T: ResourceTracker, Tr: MarshalTracer> {
    args: vec::IntoIter<BuildArg<'a, T, Tr>>,
    /// Arguments consumed so far.
    position: usize,
    bottom: Frame,
    groups: Vec<Frame>,
}

impl<T: ResourceTracker, Tr: MarshalTracer> DropWithHeap<T> for BuildState<'_, T, Tr> {
    fn drop_with_heap(self, heap: &mut Heap<T>) {
        self.args.drop_with_heap(heap);
        self.groups.drop_with_heap(heap);
        self.bottom.drop_with_heap(heap);
    }
}

impl<'a, T: ResourceTracker, Tr: MarshalTracer> BuildState<'a, T, Tr> {
    fn top(&mut self) -> &mut Frame {
        self.groups.last_mut().unwrap_or(&mut self.bottom)
    }

    fn next_arg(&mut self, code: char) -> Result<BuildArg<'a, T, Tr>, BuildError> {
        self.position += 1;
        self.args.next().ok_or(BuildError::BadInternalCall(CallFault::MissingArg {
            position: self.position,
            code,
        }))
    }

    /// Releases an argument of the wrong kind and reports it.
    fn mismatch(&self, arg: BuildArg<'a, T, Tr>, heap: &mut Heap<T>, code: char) -> BuildError {
        arg.drop_with_heap(heap);
        BuildError::BadInternalCall(CallFault::ArgMismatch {
            position: self.position,
            code,
        })
    }

    fn next_size(&mut self, heap: &mut Heap<T>, code: char) -> Result<isize, BuildError> {
        match self.next_arg(code)? {
            BuildArg::Size(n) => Ok(n),
            BuildArg::Int(i) => Ok(isize::try_from(i).unwrap_or(if i < 0 { -1 } else { isize::MAX })),
            other => Err(self.mismatch(other, heap, code)),
        }
    }

    fn next_signed(&mut self, heap: &mut Heap<T>, code: char) -> Result<i64, BuildError> {
        match self.next_arg(code)? {
            BuildArg::Int(i) => Ok(i),
            #[expect(clippy::cast_possible_wrap, reason = "varargs reinterpret the bits")]
            BuildArg::UInt(u) => Ok(u as i64),
            other => Err(self.mismatch(other, heap, code)),
        }
    }

    fn next_unsigned(&mut self, heap: &mut Heap<T>, code: char) -> Result<u64, BuildError> {
        match self.next_arg(code)? {
            BuildArg::UInt(u) => Ok(u),
            #[expect(clippy::cast_sign_loss, reason = "varargs reinterpret the bits")]
            BuildArg::Int(i) => Ok(i as u64),
            other => Err(self.mismatch(other, heap, code)),
        }
    }

    /// Borrows the byte range a `char *` argument designates.
    fn c_bytes<'b>(&self, bytes: &'b [u8], len: Option<isize>) -> Result<&'b [u8], BuildError> {
        match len.and_then(|n| usize::try_from(n).ok()) {
            None => Ok(bytes.split(|&b| b == 0).next().unwrap_or_default()),
            Some(n) => bytes.get(..n).ok_or(BuildError::BadInternalCall(CallFault::LengthOutOfRange {
                position: self.position,
                len: n,
                available: bytes.len(),
            })),
        }
    }

    /// Consumes the arguments of one value directive and returns the produced item.
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "C int directives truncate like the C call"
    )]
    fn produce(&mut self, ctx: &mut Context<T, Tr>, code: char, directive: Directive) -> Result<Item, BuildError> {
        let heap = ctx.heap_mut();
        let value = match directive {
            Directive::Str { sized } | Directive::Bytes { sized } => {
                let text = match self.next_arg(code)? {
                    BuildArg::CStr(text) => text,
                    other => return Err(self.mismatch(other, heap, code)),
                };
                let len = if sized { Some(self.next_size(heap, code)?) } else { None };
                let Some(text) = text else {
                    return Ok(Item::Owned(heap.none()));
                };
                let bytes = self.c_bytes(text, len)?;
                if matches!(directive, Directive::Bytes { .. }) {
                    heap.new_bytes(bytes)?
                } else {
                    let s = std::str::from_utf8(bytes).map_err(|err| ExcType::unicode_decode_error(bytes, err))?;
                    heap.new_str(s)?
                }
            }
            Directive::Wide { sized } => {
                let chars = match self.next_arg(code)? {
                    BuildArg::Wide(chars) => chars,
                    other => return Err(self.mismatch(other, heap, code)),
                };
                let len = if sized { Some(self.next_size(heap, code)?) } else { None };
                let Some(chars) = chars else {
                    return Ok(Item::Owned(heap.none()));
                };
                let units = match len.and_then(|n| usize::try_from(n).ok()) {
                    None => chars.split(|&c| c == 0).next().unwrap_or_default(),
                    Some(n) => chars.get(..n).ok_or(BuildError::BadInternalCall(CallFault::LengthOutOfRange {
                        position: self.position,
                        len: n,
                        available: chars.len(),
                    }))?,
                };
                let s = units
                    .iter()
                    .map(|&unit| char::from_u32(unit).ok_or_else(|| ExcType::value_error_wide_char(unit)))
                    .collect::<RunResult<String>>()?;
                heap.new_str(&s)?
            }
            Directive::CInt => {
                let i = self.next_signed(heap, code)?;
                heap.new_int(i64::from(i as i32))?
            }
            Directive::Long => {
                let i = self.next_signed(heap, code)?;
                heap.new_int(i)?
            }
            Directive::CUInt => {
                let u = self.next_unsigned(heap, code)?;
                heap.new_int(i64::from(u as u32))?
            }
            Directive::ULong => {
                let u = self.next_unsigned(heap, code)?;
                heap.new_uint(u)?
            }
            Directive::Char => {
                let i = self.next_signed(heap, code)?;
                heap.new_bytes(&[i as u8])?
            }
            Directive::UnicodeChar => {
                let i = self.next_signed(heap, code)?;
                let c = u32::try_from(i)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(ExcType::value_error_chr_range)?;
                heap.new_str(c.encode_utf8(&mut [0; 4]))?
            }
            Directive::Float => match self.next_arg(code)? {
                BuildArg::Float(x) => heap.new_float(x)?,
                other => return Err(self.mismatch(other, heap, code)),
            },
            Directive::Object => match self.next_arg(code)? {
                BuildArg::Object(Some(id)) if heap.is_live(id) => return Ok(Item::Retained(id)),
                BuildArg::Object(None) => return Err(null_object(ctx)),
                other => return Err(self.mismatch(other, heap, code)),
            },
            Directive::Steal => match self.next_arg(code)? {
                BuildArg::Steal(Some(value)) => value,
                BuildArg::Steal(None) => return Err(null_object(ctx)),
                other => return Err(self.mismatch(other, heap, code)),
            },
            Directive::Convert => match self.next_arg(code)? {
                BuildArg::Convert(converter, Some(raw)) => converter(ctx, raw)?,
                BuildArg::Convert(_, None) => return Err(null_object(ctx)),
                other => return Err(self.mismatch(other, heap, code)),
            },
            Directive::Open(_) | Directive::Close(_) => {
                return Err(RunError::internal("group directive passed to produce").into());
            }
        };
        Ok(Item::Owned(value))
    }
}

/// A null handle passes a pending error through; otherwise it is a caller bug.
fn null_object<T: ResourceTracker, Tr: MarshalTracer>(ctx: &mut Context<T, Tr>) -> BuildError {
    match ctx.take_error() {
        Some(err) => BuildError::Raised(err),
        None => BuildError::BadInternalCall(CallFault::NullObject),
    }
}
