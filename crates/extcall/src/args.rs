//! Positional-count checks and argument guards for hand-written argument parsing.
//!
//! These cover the calls that don't go through a [`ParamSpec`](crate::ParamSpec): fixed
//! arity functions that unpack a tuple or stack directly, functions that reject keywords
//! or positionals outright, and the standard "wrong argument type" diagnostic.

use crate::{
    binder::BindError,
    exception::ExcType,
    heap::{Heap, HeapId},
    resource::ResourceTracker,
    value::Value,
};

fn qualifier(min: usize, max: usize, bound: &'static str) -> &'static str {
    if min == max { "" } else { bound }
}

/// Positional-count checks differ only in how they word the diagnostic.
#[derive(Clone, Copy)]
enum CountCheck {
    Positional,
    Stack,
    Tuple,
}

/// Checks `min <= nargs <= max` and reports the count in either direction.
fn check_count(name: Option<&str>, nargs: usize, min: usize, max: usize, check: CountCheck) -> Result<(), BindError> {
    debug_assert!(min <= max, "min must not exceed max");
    let (qualifier, expected) = if nargs < min {
        (qualifier(min, max, "at least "), min)
    } else if nargs > max {
        (qualifier(min, max, "at most "), max)
    } else {
        return Ok(());
    };
    Err(BindError::ArgumentCount {
        name: name.map(str::to_owned),
        qualifier,
        expected,
        given: nargs,
        agree_number: matches!(check, CountCheck::Positional),
        truncate_name: !matches!(check, CountCheck::Tuple),
    })
}

/// Checks that a positional count lies within `min..=max`.
///
/// `name` is the function name used in the message; without one the message talks about
/// unpacking a tuple.
pub fn check_positional(name: Option<&str>, nargs: usize, min: usize, max: usize) -> Result<(), BindError> {
    check_count(name, nargs, min, max, CountCheck::Positional)
}

/// Checks the arity of a positional argument stack and returns it.
pub fn unpack_stack<'a>(args: &'a [HeapId], name: Option<&str>, min: usize, max: usize) -> Result<&'a [HeapId], BindError> {
    check_count(name, args.len(), min, max, CountCheck::Stack)?;
    Ok(args)
}

/// Checks the arity of an argument tuple and returns its items, borrowed.
///
/// # Errors
/// `SystemError` if `args` is not a tuple, otherwise the same count diagnostics as
/// [`unpack_stack`], except that the name is never truncated.
pub fn unpack_tuple<'h>(
    heap: &'h Heap<impl ResourceTracker>,
    args: HeapId,
    name: Option<&str>,
    min: usize,
    max: usize,
) -> Result<&'h [Value], BindError> {
    let items = heap.tuple_items(args).ok_or_else(|| {
        BindError::Raised(ExcType::system_error("PyArg_UnpackTuple() argument list is not a tuple"))
    })?;
    check_count(name, items.len(), min, max, CountCheck::Tuple)?;
    Ok(items)
}

/// Fails if `kwargs` holds any keyword arguments.
///
/// A missing dict and an empty dict are both accepted.
pub fn no_keywords(heap: &Heap<impl ResourceTracker>, fname: &str, kwargs: Option<HeapId>) -> Result<(), BindError> {
    let Some(kwargs) = kwargs else {
        return Ok(());
    };
    match heap.as_dict(kwargs) {
        None => Err(BindError::BadInternalCall),
        Some(dict) if dict.is_empty() => Ok(()),
        Some(_) => Err(BindError::NoKeywords { fname: fname.to_owned() }),
    }
}

/// Fails if `args` holds any positional arguments.
pub fn no_positional(heap: &Heap<impl ResourceTracker>, fname: &str, args: Option<HeapId>) -> Result<(), BindError> {
    let Some(args) = args else {
        return Ok(());
    };
    match heap.tuple_items(args) {
        None => Err(BindError::BadInternalCall),
        Some(items) if items.is_empty() => Ok(()),
        Some(_) => Err(BindError::NoPositional { fname: fname.to_owned() }),
    }
}

/// Builds the diagnostic for an argument of the wrong type.
#[must_use]
pub fn bad_argument(
    heap: &Heap<impl ResourceTracker>,
    fname: &str,
    displayname: &str,
    expected: &str,
    arg: HeapId,
) -> BindError {
    let actual = if heap.is_none(arg) { "None" } else { heap.type_name(arg) };
    BindError::BadArgument {
        fname: fname.to_owned(),
        displayname: displayname.to_owned(),
        expected: expected.to_owned(),
        actual,
    }
}
