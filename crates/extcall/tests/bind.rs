//! Tests for binding call arguments against a declared `ParamSpec`.
//!
//! Covers the fast path, keyword resolution in both calling conventions, and the exact
//! wording of every arity and keyword diagnostic.

use extcall::{
    Arity, BindError, BoundArgs, BuildArg, DefaultContext, DropWithHeap, ExcType, HeapId, KeywordSource, NoLimitTracker,
    ParamSpec, RunError, SpecError, Value, bind, build_value,
};
use pretty_assertions::assert_eq;

/// `def f(a, /, b, c)`
static F: ParamSpec = ParamSpec::new(&["", "b", "c"], Some("f"));

/// Allocates one int per entry of `values`.
fn ints(ctx: &mut DefaultContext, values: &[i64]) -> Vec<Value> {
    values.iter().map(|&i| ctx.heap_mut().new_int(i).unwrap()).collect()
}

fn ids(values: &[Value]) -> Vec<HeapId> {
    values.iter().map(Value::id).collect()
}

/// Builds a keyword dict mapping each name to the int at the same position.
fn kw_dict(ctx: &mut DefaultContext, pairs: &[(&str, i64)]) -> Value {
    let format = format!("{{{}}}", "s:l,".repeat(pairs.len()));
    let args: Vec<BuildArg<'_, NoLimitTracker>> = pairs
        .iter()
        .flat_map(|&(name, value)| [name.into(), value.into()])
        .collect();
    build_value(ctx, &format, args).unwrap()
}

/// Builds a names tuple for the vectorcall-style keyword convention.
fn kw_names(ctx: &mut DefaultContext, names: &[&str]) -> Value {
    let items = names.iter().map(|name| ctx.heap_mut().new_str(name).unwrap()).collect();
    ctx.heap_mut().new_tuple(items).unwrap()
}

fn bind_err(ctx: &mut DefaultContext, spec: &ParamSpec, args: &[HeapId], kwargs: KeywordSource<'_>, arity: Arity) -> String {
    bind(ctx, spec, args, kwargs, arity).unwrap_err().to_string()
}

// =============================================================================
// 1. Fast path
// =============================================================================

/// Positional-only calls within the arity return the caller's slice unchanged.
#[test]
fn fast_path_returns_caller_slice() {
    let mut ctx = DefaultContext::default();
    let args = ints(&mut ctx, &[1, 2]);
    let handles = ids(&args);
    let bound = bind(&mut ctx, &F, &handles, KeywordSource::None, Arity::new(1, 3, 0)).unwrap();
    assert!(bound.is_fast_path());
    assert_eq!(bound, BoundArgs::Borrowed(&handles));
    assert!(ctx.names().is_empty(), "fast path must not intern keyword names");
    args.drop_with_heap(ctx.heap_mut());
}

/// An empty keyword dict still takes the fast path.
#[test]
fn empty_keyword_dict_is_fast() {
    let mut ctx = DefaultContext::default();
    let args = ints(&mut ctx, &[1]);
    let handles = ids(&args);
    let kwargs = kw_dict(&mut ctx, &[]);
    let bound = bind(&mut ctx, &F, &handles, KeywordSource::Dict(kwargs.id()), Arity::new(1, 3, 0)).unwrap();
    assert!(bound.is_fast_path());
    kwargs.drop_with_heap(ctx.heap_mut());
    args.drop_with_heap(ctx.heap_mut());
}

/// The slow path agrees with the fast path on every declared slot.
#[test]
fn slow_path_agrees_with_fast_path() {
    let mut ctx = DefaultContext::default();
    let args = ints(&mut ctx, &[1, 2]);
    let handles = ids(&args);
    let fast = bind(&mut ctx, &F, &handles, KeywordSource::None, Arity::new(1, 3, 0)).unwrap();

    let names = kw_names(&mut ctx, &["b"]);
    let values = [handles[1]];
    let kwargs = KeywordSource::Names {
        names: names.id(),
        values: &values,
    };
    let slow = bind(&mut ctx, &F, &handles[..1], kwargs, Arity::new(1, 3, 0)).unwrap();
    assert!(!slow.is_fast_path());
    assert_eq!(slow.len(), 3);

    let fast_slots: Vec<_> = (0..3).map(|i| fast.get(i)).collect();
    let slow_slots: Vec<_> = slow.iter().collect();
    assert_eq!(fast_slots, slow_slots);

    names.drop_with_heap(ctx.heap_mut());
    args.drop_with_heap(ctx.heap_mut());
}

// =============================================================================
// 2. Keyword resolution
// =============================================================================

/// Keywords given as a dict fill their declared slots.
#[test]
fn dict_keywords_fill_slots() {
    let mut ctx = DefaultContext::default();
    let args = ints(&mut ctx, &[1]);
    let handles = ids(&args);
    let kwargs = kw_dict(&mut ctx, &[("c", 3), ("b", 2)]);
    let bound = bind(&mut ctx, &F, &handles, KeywordSource::Dict(kwargs.id()), Arity::new(1, 3, 0)).unwrap();

    let heap = ctx.heap();
    let slots: Vec<_> = bound.iter().map(|slot| slot.and_then(|id| heap.as_int(id))).collect();
    assert_eq!(slots, vec![Some(1), Some(2), Some(3)]);

    kwargs.drop_with_heap(ctx.heap_mut());
    args.drop_with_heap(ctx.heap_mut());
}

/// Keyword names that are equal strings but not the interned objects still match.
#[test]
fn names_match_by_string_equality() {
    let mut ctx = DefaultContext::default();
    let args = ints(&mut ctx, &[1, 3]);
    let handles = ids(&args);
    let names = kw_names(&mut ctx, &["c"]);
    let values = [handles[1]];
    let kwargs = KeywordSource::Names {
        names: names.id(),
        values: &values,
    };
    let bound = bind(&mut ctx, &F, &handles[..1], kwargs, Arity::new(1, 3, 0)).unwrap();
    assert_eq!(bound.get(0), Some(handles[0]));
    assert_eq!(bound.get(1), None);
    assert_eq!(bound.get(2), Some(handles[1]));

    names.drop_with_heap(ctx.heap_mut());
    args.drop_with_heap(ctx.heap_mut());
}

/// Interned keyword names match by identity.
#[test]
fn names_match_interned_objects() {
    let mut ctx = DefaultContext::default();
    let args = ints(&mut ctx, &[1, 2]);
    let handles = ids(&args);
    let b = ctx.heap_mut().intern("b").unwrap();
    let b = ctx.heap().retain(b);
    let names = ctx.heap_mut().new_tuple(vec![b]).unwrap();
    let values = [handles[1]];
    let kwargs = KeywordSource::Names {
        names: names.id(),
        values: &values,
    };
    let bound = bind(&mut ctx, &F, &handles[..1], kwargs, Arity::new(1, 3, 0)).unwrap();
    assert_eq!(bound.get(1), Some(handles[1]));

    names.drop_with_heap(ctx.heap_mut());
    args.drop_with_heap(ctx.heap_mut());
}

/// A required keyword-only parameter is filled from the keywords.
#[test]
fn required_keyword_only_parameter() {
    static KW: ParamSpec = ParamSpec::new(&["a", "b"], Some("kw"));
    let mut ctx = DefaultContext::default();
    let args = ints(&mut ctx, &[1]);
    let handles = ids(&args);
    let arity = Arity::new(1, 1, 1);

    assert_eq!(
        bind_err(&mut ctx, &KW, &handles, KeywordSource::None, arity),
        "kw() missing required argument 'b' (pos 2)"
    );

    let kwargs = kw_dict(&mut ctx, &[("b", 2)]);
    let bound = bind(&mut ctx, &KW, &handles, KeywordSource::Dict(kwargs.id()), arity).unwrap();
    assert_eq!(bound.len(), 2);
    assert_eq!(ctx.heap().as_int(bound.get(1).unwrap()), Some(2));

    kwargs.drop_with_heap(ctx.heap_mut());
    args.drop_with_heap(ctx.heap_mut());
}

/// Keyword names are interned once per context and reused.
#[test]
fn names_are_interned_once() {
    let mut ctx = DefaultContext::default();
    let args = ints(&mut ctx, &[1, 2]);
    let handles = ids(&args);
    let kwargs = kw_dict(&mut ctx, &[("b", 2)]);

    bind(&mut ctx, &F, &handles[..1], KeywordSource::Dict(kwargs.id()), Arity::new(1, 3, 0)).unwrap();
    let first = ctx.names().get(&F).unwrap();
    let interned = ctx.heap().stats().interned_strings;

    bind(&mut ctx, &F, &handles[..1], KeywordSource::Dict(kwargs.id()), Arity::new(1, 3, 0)).unwrap();
    let second = ctx.names().get(&F).unwrap();
    assert_eq!(first, second);
    assert_eq!(ctx.names().len(), 1);
    assert_eq!(ctx.heap().stats().interned_strings, interned);
    assert_eq!(interned, 2);

    kwargs.drop_with_heap(ctx.heap_mut());
    args.drop_with_heap(ctx.heap_mut());
}

/// Binding the same call twice fills identical slots, in both keyword conventions.
#[test]
fn binding_is_repeatable() {
    let mut ctx = DefaultContext::default();
    let args = ints(&mut ctx, &[1, 2, 3]);
    let handles = ids(&args);
    let arity = Arity::new(1, 3, 0);

    let names = kw_names(&mut ctx, &["c", "b"]);
    let values = [handles[2], handles[1]];
    let kwargs = KeywordSource::Names {
        names: names.id(),
        values: &values,
    };
    let first = bind(&mut ctx, &F, &handles[..1], kwargs, arity).unwrap();
    let second = bind(&mut ctx, &F, &handles[..1], kwargs, arity).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.iter().collect::<Vec<_>>(), vec![Some(handles[0]), Some(handles[1]), Some(handles[2])]);

    let dict = kw_dict(&mut ctx, &[("b", 2), ("c", 3)]);
    let first = bind(&mut ctx, &F, &handles[..1], KeywordSource::Dict(dict.id()), arity).unwrap();
    let second = bind(&mut ctx, &F, &handles[..1], KeywordSource::Dict(dict.id()), arity).unwrap();
    assert_eq!(first, second);

    dict.drop_with_heap(ctx.heap_mut());
    names.drop_with_heap(ctx.heap_mut());
    args.drop_with_heap(ctx.heap_mut());
}

// =============================================================================
// 3. Diagnostics
// =============================================================================

/// Missing a required parameter names it and its 1-based position, in both keyword
/// conventions.
#[test]
fn missing_required_argument() {
    let mut ctx = DefaultContext::default();
    let args = ints(&mut ctx, &[1, 2]);
    let handles = ids(&args);
    let arity = Arity::new(2, 3, 0);

    let names = kw_names(&mut ctx, &["c"]);
    let values = [handles[1]];
    let kwargs = KeywordSource::Names {
        names: names.id(),
        values: &values,
    };
    let err = bind(&mut ctx, &F, &handles[..1], kwargs, arity).unwrap_err();
    assert_eq!(
        err,
        BindError::MissingRequired {
            fname: Some("f"),
            name: "b",
            position: 2
        }
    );
    assert_eq!(err.to_string(), "f() missing required argument 'b' (pos 2)");
    assert_eq!(err.exc_type(), ExcType::TypeError);

    let dict = kw_dict(&mut ctx, &[("c", 2)]);
    assert_eq!(
        bind_err(&mut ctx, &F, &handles[..1], KeywordSource::Dict(dict.id()), arity),
        "f() missing required argument 'b' (pos 2)"
    );

    dict.drop_with_heap(ctx.heap_mut());
    names.drop_with_heap(ctx.heap_mut());
    args.drop_with_heap(ctx.heap_mut());
}

/// Too many positionals says "exactly" when the bounds agree and "at most" otherwise.
#[test]
fn too_many_positional() {
    static H: ParamSpec = ParamSpec::new(&["a", "b", "c"], Some("h"));
    let mut ctx = DefaultContext::default();
    let args = ints(&mut ctx, &[1, 2, 3]);
    let handles = ids(&args);

    assert_eq!(
        bind_err(&mut ctx, &H, &handles, KeywordSource::None, Arity::exact(2)),
        "h() takes exactly 2 positional arguments (3 given)"
    );
    assert_eq!(
        bind_err(&mut ctx, &H, &handles, KeywordSource::None, Arity::new(1, 2, 0)),
        "h() takes at most 2 positional arguments (3 given)"
    );
    assert_eq!(
        bind_err(&mut ctx, &H, &handles[..2], KeywordSource::None, Arity::new(0, 1, 0)),
        "h() takes at most 1 positional argument (2 given)"
    );
    assert_eq!(
        bind_err(&mut ctx, &H, &handles[..1], KeywordSource::None, Arity::new(0, 0, 0)),
        "h() takes no positional arguments"
    );

    args.drop_with_heap(ctx.heap_mut());
}

/// More arguments than declared parameters is reported before anything else.
#[test]
fn too_many_arguments() {
    static G: ParamSpec = ParamSpec::new(&["a", "b"], Some("g"));
    let mut ctx = DefaultContext::default();
    let args = ints(&mut ctx, &[1, 2, 3]);
    let handles = ids(&args);

    assert_eq!(
        bind_err(&mut ctx, &G, &handles, KeywordSource::None, Arity::exact(2)),
        "g() takes at most 2 arguments (3 given)"
    );

    let kwargs = kw_dict(&mut ctx, &[("a", 1), ("b", 2), ("z", 3)]);
    let err = bind(&mut ctx, &G, &[], KeywordSource::Dict(kwargs.id()), Arity::new(0, 2, 0)).unwrap_err();
    assert_eq!(
        err,
        BindError::TooManyArguments {
            fname: Some("g"),
            max_args: 2,
            given: 3,
            keyword_only: true
        }
    );
    assert_eq!(err.to_string(), "g() takes at most 2 keyword arguments (3 given)");

    kwargs.drop_with_heap(ctx.heap_mut());
    args.drop_with_heap(ctx.heap_mut());
}

/// Too few positionals counts only the positional-only minimum.
#[test]
fn too_few_positional() {
    static P: ParamSpec = ParamSpec::new(&["", "", "c"], Some("p"));
    static Q: ParamSpec = ParamSpec::new(&[""], Some("q"));
    let mut ctx = DefaultContext::default();
    let args = ints(&mut ctx, &[1]);
    let handles = ids(&args);

    assert_eq!(
        bind_err(&mut ctx, &P, &handles, KeywordSource::None, Arity::new(2, 3, 0)),
        "p() takes at least 2 positional arguments (1 given)"
    );
    assert_eq!(
        bind_err(&mut ctx, &P, &handles, KeywordSource::None, Arity::exact(2)),
        "p() takes exactly 2 positional arguments (1 given)"
    );
    assert_eq!(
        bind_err(&mut ctx, &Q, &[], KeywordSource::None, Arity::exact(1)),
        "q() takes exactly 1 positional argument (0 given)"
    );

    args.drop_with_heap(ctx.heap_mut());
}

/// A parameter given both positionally and by keyword is reported with its position.
#[test]
fn duplicate_argument() {
    let mut ctx = DefaultContext::default();
    let args = ints(&mut ctx, &[1, 2]);
    let handles = ids(&args);
    let kwargs = kw_dict(&mut ctx, &[("b", 3)]);

    let err = bind(&mut ctx, &F, &handles, KeywordSource::Dict(kwargs.id()), Arity::new(1, 3, 0)).unwrap_err();
    assert_eq!(
        err.to_string(),
        "argument for f() given by name ('b') and position (2)"
    );

    let extra = ints(&mut ctx, &[3]);
    let names = kw_names(&mut ctx, &["b"]);
    let values = ids(&extra);
    let source = KeywordSource::Names {
        names: names.id(),
        values: &values,
    };
    assert_eq!(
        bind_err(&mut ctx, &F, &handles, source, Arity::new(1, 3, 0)),
        "argument for f() given by name ('b') and position (2)"
    );

    names.drop_with_heap(ctx.heap_mut());
    extra.drop_with_heap(ctx.heap_mut());
    kwargs.drop_with_heap(ctx.heap_mut());
    args.drop_with_heap(ctx.heap_mut());
}

/// An undeclared keyword is rejected, with a generic phrase when the spec has no name.
#[test]
fn unexpected_keyword() {
    static ANON: ParamSpec = ParamSpec::new(&["", "b", "c"], None);
    let mut ctx = DefaultContext::default();
    let args = ints(&mut ctx, &[1]);
    let handles = ids(&args);
    let kwargs = kw_dict(&mut ctx, &[("d", 2)]);
    let source = KeywordSource::Dict(kwargs.id());

    assert_eq!(
        bind_err(&mut ctx, &F, &handles, source, Arity::new(1, 3, 0)),
        "'d' is an invalid keyword argument for f()"
    );
    assert_eq!(
        bind_err(&mut ctx, &ANON, &handles, source, Arity::new(1, 3, 0)),
        "'d' is an invalid keyword argument for this function"
    );

    let names = kw_names(&mut ctx, &["d"]);
    let values = [handles[0]];
    let source = KeywordSource::Names {
        names: names.id(),
        values: &values,
    };
    assert_eq!(
        bind_err(&mut ctx, &F, &handles, source, Arity::new(1, 3, 0)),
        "'d' is an invalid keyword argument for f()"
    );

    names.drop_with_heap(ctx.heap_mut());
    kwargs.drop_with_heap(ctx.heap_mut());
    args.drop_with_heap(ctx.heap_mut());
}

/// Keyword keys must be strings, whether they come from a dict or a names tuple.
#[test]
fn non_string_keyword() {
    let mut ctx = DefaultContext::default();
    let args = ints(&mut ctx, &[1]);
    let handles = ids(&args);
    let kwargs = build_value(&mut ctx, "{i:i}", vec![1.into(), 2.into()]).unwrap();

    let err = bind(&mut ctx, &F, &handles, KeywordSource::Dict(kwargs.id()), Arity::new(1, 3, 0)).unwrap_err();
    assert_eq!(err, BindError::NonStringKeyword);
    assert_eq!(err.to_string(), "keywords must be strings");

    let key = ctx.heap_mut().new_int(1).unwrap();
    let names = ctx.heap_mut().new_tuple(vec![key]).unwrap();
    let values = [handles[0]];
    let source = KeywordSource::Names {
        names: names.id(),
        values: &values,
    };
    let err = bind(&mut ctx, &F, &handles, source, Arity::new(1, 3, 0)).unwrap_err();
    assert_eq!(err, BindError::NonStringKeyword);

    names.drop_with_heap(ctx.heap_mut());
    kwargs.drop_with_heap(ctx.heap_mut());
    args.drop_with_heap(ctx.heap_mut());
}

/// Function names in diagnostics are truncated to 200 characters.
#[test]
fn long_function_names_are_truncated() {
    let name: &'static str = Box::leak("x".repeat(250).into_boxed_str());
    let spec = ParamSpec::new(&["a"], Some(name));
    let mut ctx = DefaultContext::default();
    let args = ints(&mut ctx, &[1, 2]);
    let handles = ids(&args);

    let message = bind_err(&mut ctx, &spec, &handles, KeywordSource::None, Arity::exact(1));
    assert_eq!(
        message,
        format!("{}() takes at most 1 argument (2 given)", "x".repeat(200))
    );

    args.drop_with_heap(ctx.heap_mut());
}

/// A spec without a name says "function".
#[test]
fn anonymous_spec_says_function() {
    static ANON: ParamSpec = ParamSpec::new(&["a"], None);
    let mut ctx = DefaultContext::default();
    let args = ints(&mut ctx, &[1, 2]);
    let handles = ids(&args);
    assert_eq!(
        bind_err(&mut ctx, &ANON, &handles, KeywordSource::None, Arity::exact(1)),
        "function takes at most 1 argument (2 given)"
    );
    args.drop_with_heap(ctx.heap_mut());
}

// =============================================================================
// 4. Caller bugs
// =============================================================================

/// A malformed spec fails even on a call that would take the fast path.
#[test]
fn malformed_spec_is_system_error() {
    static BAD: ParamSpec = ParamSpec::new(&["a", "", "c"], Some("bad"));
    let mut ctx = DefaultContext::default();
    let args = ints(&mut ctx, &[1]);
    let handles = ids(&args);

    let err = bind(&mut ctx, &BAD, &handles, KeywordSource::None, Arity::new(1, 3, 0)).unwrap_err();
    assert_eq!(err, BindError::InvalidSpec(SpecError::EmptyKeywordName));
    assert_eq!(err.to_string(), "Empty keyword parameter name");
    assert_eq!(err.exc_type(), ExcType::SystemError);

    args.drop_with_heap(ctx.heap_mut());
}

/// Keyword containers of the wrong type are bad internal calls.
#[test]
fn malformed_keyword_containers() {
    let mut ctx = DefaultContext::default();
    let args = ints(&mut ctx, &[1]);
    let handles = ids(&args);

    let err = bind(&mut ctx, &F, &handles, KeywordSource::Dict(handles[0]), Arity::new(1, 3, 0)).unwrap_err();
    assert_eq!(err, BindError::BadInternalCall);
    assert_eq!(err.to_string(), "bad argument to internal function");

    let names = kw_names(&mut ctx, &["b", "c"]);
    let values = [handles[0]];
    let kwargs = KeywordSource::Names {
        names: names.id(),
        values: &values,
    };
    let err = bind(&mut ctx, &F, &handles, kwargs, Arity::new(1, 3, 0)).unwrap_err();
    assert_eq!(err, BindError::BadInternalCall);

    names.drop_with_heap(ctx.heap_mut());
    args.drop_with_heap(ctx.heap_mut());
}

/// Bind errors convert into runtime errors of the matching exception type.
#[test]
fn bind_errors_convert_to_run_errors() {
    let err = BindError::NonStringKeyword;
    let run: RunError = err.into();
    assert_eq!(run.exc_type(), Some(ExcType::TypeError));
    assert_eq!(run.message(), Some("keywords must be strings"));

    let run: RunError = BindError::BadInternalCall.into();
    assert_eq!(run.exc_type(), Some(ExcType::SystemError));
}
