//! Matching actual call arguments against a declared [`ParamSpec`].
//!
//! [`bind`] reconciles positional arguments and keyword arguments (given either as a
//! dict or as a names tuple plus a value slice) into one positional buffer indexed by
//! declared parameter. Calls that need no reconciliation return the caller's own slice.
//! Every diagnostic reproduces the runtime's exact wording.

use std::fmt;

use smallvec::{SmallVec, smallvec};

use crate::{
    context::Context,
    exception::{ExcType, RunError, SimpleException, write_truncated},
    heap::{Heap, HeapId},
    param_spec::{ParamSpec, SpecError},
    resource::ResourceTracker,
    tracer::MarshalTracer,
    types::{Dict, DictKey},
    value::Value,
};

/// Keyword arguments in either of the two calling conventions.
#[derive(Debug, Clone, Copy, Default)]
pub enum KeywordSource<'k> {
    #[default]
    None,
    /// A `dict` mapping names to values.
    Dict(HeapId),
    /// A tuple of names and the matching values, in the same order.
    Names { names: HeapId, values: &'k [HeapId] },
}

/// Positional arity constraints of one call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub min_positional: usize,
    pub max_positional: usize,
    /// Number of keyword-only parameters that must be supplied.
    pub min_keyword: usize,
}

impl Arity {
    #[must_use]
    pub const fn new(min_positional: usize, max_positional: usize, min_keyword: usize) -> Self {
        Self {
            min_positional,
            max_positional,
            min_keyword,
        }
    }

    /// Exactly `n` positional arguments and no required keyword-only arguments.
    #[must_use]
    pub const fn exact(n: usize) -> Self {
        Self::new(n, n, 0)
    }
}

/// Arguments resolved to declared parameter positions. Never owns references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundArgs<'a> {
    /// The caller's positional slice, returned unchanged.
    Borrowed(&'a [HeapId]),
    /// One slot per declared parameter; `None` where no argument was supplied.
    Filled(SmallVec<[Option<HeapId>; 8]>),
}

impl BoundArgs<'_> {
    /// The argument bound to parameter `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<HeapId> {
        match self {
            Self::Borrowed(args) => args.get(index).copied(),
            Self::Filled(slots) => slots.get(index).copied().flatten(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Borrowed(args) => args.len(),
            Self::Filled(slots) => slots.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when the caller's slice was returned unchanged.
    #[must_use]
    pub fn is_fast_path(&self) -> bool {
        matches!(self, Self::Borrowed(_))
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<HeapId>> + '_ {
        (0..self.len()).map(|index| self.get(index))
    }
}

/// Function name as rendered by binder diagnostics: `name()` truncated to 200
/// characters, or a fallback when the spec has no name.
struct Callee<'a> {
    fname: Option<&'a str>,
    fallback: &'static str,
}

impl fmt::Display for Callee<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.fname {
            Some(name) => {
                write_truncated(f, name, 200)?;
                f.write_str("()")
            }
            None => f.write_str(self.fallback),
        }
    }
}

fn callee(fname: Option<&str>) -> Callee<'_> {
    Callee {
        fname,
        fallback: "function",
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

/// A call that does not fit its declared parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    /// More arguments in total than declared parameters.
    TooManyArguments {
        fname: Option<&'static str>,
        max_args: usize,
        given: usize,
        /// Only keywords were supplied.
        keyword_only: bool,
    },
    TooManyPositional {
        fname: Option<&'static str>,
        max_positional: usize,
        exact: bool,
        given: usize,
    },
    TooFewPositional {
        fname: Option<&'static str>,
        min_positional: usize,
        exact: bool,
        given: usize,
    },
    MissingRequired {
        fname: Option<&'static str>,
        name: &'static str,
        /// 1-based parameter position.
        position: usize,
    },
    /// A parameter was given both positionally and by keyword.
    DuplicateArgument {
        fname: Option<&'static str>,
        name: &'static str,
        position: usize,
    },
    UnexpectedKeyword {
        fname: Option<&'static str>,
        name: String,
    },
    NonStringKeyword,
    InvalidSpec(SpecError),
    /// The caller passed malformed keyword or argument containers.
    BadInternalCall,
    /// Positional count outside `min..=max` for the unpack helpers.
    ///
    /// Without a name the message talks about unpacking a tuple.
    ArgumentCount {
        name: Option<String>,
        qualifier: &'static str,
        expected: usize,
        given: usize,
        /// Singular noun when `expected == 1`; otherwise the noun is always plural.
        agree_number: bool,
        /// Cut the name at 200 characters. Tuple unpacking prints it in full.
        truncate_name: bool,
    },
    NoKeywords {
        fname: String,
    },
    NoPositional {
        fname: String,
    },
    BadArgument {
        fname: String,
        displayname: String,
        expected: String,
        actual: &'static str,
    },
    /// An error raised by the runtime while binding, such as a resource limit.
    Raised(RunError),
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooManyArguments {
                fname,
                max_args,
                given,
                keyword_only,
            } => {
                let keyword = if *keyword_only { "keyword " } else { "" };
                write!(
                    f,
                    "{} takes at most {max_args} {keyword}argument{} ({given} given)",
                    callee(*fname),
                    plural(*max_args)
                )
            }
            Self::TooManyPositional {
                fname,
                max_positional: 0,
                ..
            } => write!(f, "{} takes no positional arguments", callee(*fname)),
            Self::TooManyPositional {
                fname,
                max_positional,
                exact,
                given,
            } => {
                let bound = if *exact { "exactly" } else { "at most" };
                write!(
                    f,
                    "{} takes {bound} {max_positional} positional argument{} ({given} given)",
                    callee(*fname),
                    plural(*max_positional)
                )
            }
            Self::TooFewPositional {
                fname,
                min_positional,
                exact,
                given,
            } => {
                let bound = if *exact { "exactly" } else { "at least" };
                write!(
                    f,
                    "{} takes {bound} {min_positional} positional argument{} ({given} given)",
                    callee(*fname),
                    plural(*min_positional)
                )
            }
            Self::MissingRequired { fname, name, position } => {
                write!(
                    f,
                    "{} missing required argument '{name}' (pos {position})",
                    callee(*fname)
                )
            }
            Self::DuplicateArgument { fname, name, position } => {
                write!(
                    f,
                    "argument for {} given by name ('{name}') and position ({position})",
                    callee(*fname)
                )
            }
            Self::UnexpectedKeyword { fname, name } => {
                let target = Callee {
                    fname: *fname,
                    fallback: "this function",
                };
                write!(f, "'{name}' is an invalid keyword argument for {target}")
            }
            Self::NonStringKeyword => f.write_str("keywords must be strings"),
            Self::InvalidSpec(err) => err.fmt(f),
            Self::BadInternalCall => f.write_str("bad argument to internal function"),
            Self::ArgumentCount {
                name,
                qualifier,
                expected,
                given,
                agree_number,
                truncate_name,
            } => {
                let suffix = if *agree_number { plural(*expected) } else { "s" };
                match name {
                    Some(name) => {
                        if *truncate_name {
                            write_truncated(f, name, 200)?;
                        } else {
                            f.write_str(name)?;
                        }
                        write!(f, " expected {qualifier}{expected} argument{suffix}, got {given}")
                    }
                    None => write!(
                        f,
                        "unpacked tuple should have {qualifier}{expected} element{suffix}, but has {given}"
                    ),
                }
            }
            Self::NoKeywords { fname } => {
                write_truncated(f, fname, 200)?;
                f.write_str("() takes no keyword arguments")
            }
            Self::NoPositional { fname } => {
                write_truncated(f, fname, 200)?;
                f.write_str("() takes no positional arguments")
            }
            Self::BadArgument {
                fname,
                displayname,
                expected,
                actual,
            } => {
                write_truncated(f, fname, 200)?;
                f.write_str("() ")?;
                write_truncated(f, displayname, 200)?;
                f.write_str(" must be ")?;
                write_truncated(f, expected, 50)?;
                f.write_str(", not ")?;
                write_truncated(f, actual, 50)
            }
            Self::Raised(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for BindError {}

impl BindError {
    /// The exception class this error raises as.
    #[must_use]
    pub fn exc_type(&self) -> ExcType {
        match self {
            Self::InvalidSpec(_) | Self::BadInternalCall => ExcType::SystemError,
            Self::Raised(err) => err.exc_type().unwrap_or(ExcType::SystemError),
            _ => ExcType::TypeError,
        }
    }
}

impl From<SpecError> for BindError {
    fn from(err: SpecError) -> Self {
        Self::InvalidSpec(err)
    }
}

impl From<RunError> for BindError {
    fn from(err: RunError) -> Self {
        Self::Raised(err)
    }
}

impl From<BindError> for RunError {
    fn from(err: BindError) -> Self {
        match err {
            BindError::Raised(err) => err,
            BindError::InvalidSpec(err) => err.into(),
            BindError::BadInternalCall => ExcType::bad_internal_call(),
            other => SimpleException::new_msg(other.exc_type(), other).into(),
        }
    }
}

/// Keyword arguments resolved against the heap.
enum Keywords<'h, 'k> {
    None,
    Dict(&'h Dict),
    Names { names: &'h [Value], values: &'k [HeapId] },
}

impl<'h, 'k> Keywords<'h, 'k> {
    fn resolve(heap: &'h Heap<impl ResourceTracker>, source: KeywordSource<'k>) -> Result<Self, BindError> {
        match source {
            KeywordSource::None => Ok(Self::None),
            KeywordSource::Dict(id) => heap.as_dict(id).map(Self::Dict).ok_or(BindError::BadInternalCall),
            KeywordSource::Names { names, values } => {
                let names = heap.tuple_items(names).ok_or(BindError::BadInternalCall)?;
                if names.len() == values.len() {
                    Ok(Self::Names { names, values })
                } else {
                    Err(BindError::BadInternalCall)
                }
            }
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Dict(dict) => dict.len(),
            Self::Names { names, .. } => names.len(),
        }
    }

    /// Finds the value supplied for a declared name.
    ///
    /// Names tuples are scanned by identity first, then by string equality.
    fn lookup(&self, heap: &Heap<impl ResourceTracker>, interned: HeapId, name: &str) -> Option<HeapId> {
        match self {
            Self::None => None,
            Self::Dict(dict) => dict.get(&DictKey::Str(name.into())),
            Self::Names { names, values } => {
                let position = names
                    .iter()
                    .position(|key| key.id() == interned)
                    .or_else(|| names.iter().position(|key| heap.str_eq(key.id(), interned)))?;
                Some(values[position])
            }
        }
    }

    /// The supplied keyword objects, in call order.
    fn supplied(&self) -> SmallVec<[HeapId; 8]> {
        match self {
            Self::None => SmallVec::new(),
            Self::Dict(dict) => dict.iter().map(|(key, _)| key).collect(),
            Self::Names { names, .. } => names.iter().map(Value::id).collect(),
        }
    }
}

/// Binds `args` and `kwargs` to the parameters declared by `spec`.
///
/// Calls without keywords whose positional count lies within the arity are returned
/// unchanged as [`BoundArgs::Borrowed`]. Everything else is resolved into one slot per
/// declared parameter. Keyword names are interned into the context the first time a spec
/// needs the slow path and reused afterwards.
///
/// # Errors
/// Returns a [`BindError`] carrying the exact diagnostic when the call does not fit, when
/// the spec is malformed, or when `kwargs` is not a well-formed keyword container.
pub fn bind<'a, T: ResourceTracker, Tr: MarshalTracer>(
    ctx: &mut Context<T, Tr>,
    spec: &ParamSpec,
    args: &'a [HeapId],
    kwargs: KeywordSource<'_>,
    arity: Arity,
) -> Result<BoundArgs<'a>, BindError> {
    let result = bind_inner(ctx, spec, args, kwargs, arity);
    let tracer = ctx.tracer_mut();
    match &result {
        Ok((bound, nkwargs)) => tracer.on_bind(spec.fname(), args.len(), *nkwargs, bound.is_fast_path()),
        Err(err) => tracer.on_bind_error(spec.fname(), err),
    }
    result.map(|(bound, _)| bound)
}

fn bind_inner<'a, T: ResourceTracker, Tr: MarshalTracer>(
    ctx: &mut Context<T, Tr>,
    spec: &ParamSpec,
    args: &'a [HeapId],
    kwargs: KeywordSource<'_>,
    arity: Arity,
) -> Result<(BoundArgs<'a>, usize), BindError> {
    let nargs = args.len();
    let nkwargs = Keywords::resolve(ctx.heap(), kwargs)?.len();
    let layout = spec.layout()?;

    if nkwargs == 0 && arity.min_keyword == 0 && arity.min_positional <= nargs && nargs <= arity.max_positional {
        return Ok((BoundArgs::Borrowed(args), 0));
    }

    let fname = spec.fname();
    let posonly = layout.positional_only();
    let max_args = layout.max_args();
    let keyword_names = layout.keyword_names();
    let reqlimit = if arity.min_keyword > 0 {
        arity.max_positional + arity.min_keyword
    } else {
        arity.min_positional
    };
    let minposonly = posonly.min(arity.min_positional);

    if nargs + nkwargs > max_args {
        return Err(BindError::TooManyArguments {
            fname,
            max_args,
            given: nargs + nkwargs,
            keyword_only: nargs == 0,
        });
    }
    if nargs > arity.max_positional {
        return Err(BindError::TooManyPositional {
            fname,
            max_positional: arity.max_positional,
            exact: arity.min_positional >= arity.max_positional,
            given: nargs,
        });
    }
    if nargs < minposonly {
        return Err(BindError::TooFewPositional {
            fname,
            min_positional: minposonly,
            exact: minposonly >= arity.max_positional,
            given: nargs,
        });
    }

    let names = {
        let (heap, cache, tracer) = ctx.parts_mut();
        let fresh = cache.get(spec).is_none();
        let names = cache.interned_names(heap, spec)?;
        if fresh {
            tracer.on_names_interned(fname, names.len());
        }
        names
    };
    let heap = ctx.heap();
    let keywords = Keywords::resolve(heap, kwargs)?;

    let mut buf: SmallVec<[Option<HeapId>; 8]> = smallvec![None; max_args];
    for (slot, &arg) in buf.iter_mut().zip(args) {
        *slot = Some(arg);
    }

    let mut remaining = nkwargs;
    for i in nargs.max(posonly)..max_args {
        let name_index = i - posonly;
        let current = if remaining > 0 {
            keywords.lookup(heap, names[name_index], keyword_names[name_index])
        } else if i >= reqlimit {
            break;
        } else {
            None
        };
        buf[i] = current;
        if current.is_some() {
            remaining -= 1;
        } else if i < arity.min_positional || (arity.max_positional <= i && i < reqlimit) {
            return Err(BindError::MissingRequired {
                fname,
                name: keyword_names[name_index],
                position: i + 1,
            });
        }
    }

    if remaining > 0 {
        for i in posonly..nargs {
            let name_index = i - posonly;
            if keywords
                .lookup(heap, names[name_index], keyword_names[name_index])
                .is_some()
            {
                return Err(BindError::DuplicateArgument {
                    fname,
                    name: keyword_names[name_index],
                    position: i + 1,
                });
            }
        }
        for key in keywords.supplied() {
            let Some(name) = heap.as_str(key) else {
                return Err(BindError::NonStringKeyword);
            };
            if !keyword_names.iter().any(|declared| *declared == name) {
                return Err(BindError::UnexpectedKeyword {
                    fname,
                    name: name.to_owned(),
                });
            }
        }
    }

    Ok((BoundArgs::Filled(buf), nkwargs))
}
