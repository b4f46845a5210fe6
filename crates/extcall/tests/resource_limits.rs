//! Tests for resource limits: limit configuration, and builders and binders running out
//! of allocations or memory without leaking.

use extcall::{
    Arity, BindError, BuildError, Context, ExcType, KeywordSource, LimitedTracker, ParamSpec, ResourceLimits,
    RunError, build_value,
};
use pretty_assertions::assert_eq;

fn limited(limits: ResourceLimits) -> Context<LimitedTracker> {
    Context::new(LimitedTracker::new(limits))
}

fn live(ctx: &Context<LimitedTracker>) -> usize {
    ctx.heap().stats().live_objects
}

// =============================================================================
// 1. Configuration
// =============================================================================

/// Limits load from JSON, with missing fields left unlimited.
#[test]
fn limits_from_json() {
    let limits = ResourceLimits::from_json(r#"{"max_allocations": 10, "max_memory": 4096}"#).unwrap();
    assert_eq!(limits, ResourceLimits::new().max_allocations(10).max_memory(4096));

    let limits = ResourceLimits::from_json("{}").unwrap();
    assert_eq!(limits, ResourceLimits::new());

    assert!(ResourceLimits::from_json(r#"{"max_allocations": "many"}"#).is_err());
}

/// The tracker keeps the limits it was created with.
#[test]
fn tracker_exposes_limits() {
    let limits = ResourceLimits::new().max_allocations(3);
    let ctx = limited(limits);
    assert_eq!(ctx.heap().tracker().limits(), &limits);
}

// =============================================================================
// 2. Builders under limits
// =============================================================================

/// Running out of allocations mid-build raises `MemoryError` and releases the partial items.
#[test]
fn build_hits_allocation_limit() {
    let mut ctx = limited(ResourceLimits::new().max_allocations(2));
    let before = live(&ctx);
    let err = build_value(&mut ctx, "[iii]", vec![1.into(), 2.into(), 3.into()]).unwrap_err();
    let BuildError::Raised(raised) = &err else {
        panic!("expected a raised error, got {err:?}");
    };
    assert!(matches!(raised, RunError::UncatchableExc(_)));
    assert_eq!(err.exc_type(), ExcType::MemoryError);
    assert_eq!(err.to_string(), "MemoryError: allocation limit exceeded: 3 > 2");
    assert_eq!(live(&ctx), before);
}

/// A memory limit smaller than any object stops the first allocation.
#[test]
fn build_hits_memory_limit() {
    let mut ctx = limited(ResourceLimits::new().max_memory(1));
    let err = build_value(&mut ctx, "s", vec!["text".into()]).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::MemoryError);
    assert!(err.to_string().starts_with("MemoryError: memory limit exceeded"));
}

/// The singletons are free: `None` and `()` build even with no allocations left.
#[test]
fn singletons_need_no_allocation() {
    let mut ctx = limited(ResourceLimits::new().max_allocations(0));
    let none = build_value(&mut ctx, "", vec![]).unwrap();
    assert_eq!(ctx.heap().repr(none.id()), "None");
    let empty = build_value(&mut ctx, "()", vec![]).unwrap();
    assert_eq!(ctx.heap().repr(empty.id()), "()");
    none.drop_with_heap(ctx.heap_mut());
    empty.drop_with_heap(ctx.heap_mut());
}

/// A memory error is uncatchable: it is not reported as an ordinary exception.
#[test]
fn memory_error_is_uncatchable() {
    let mut ctx = limited(ResourceLimits::new().max_allocations(0));
    let err: RunError = build_value(&mut ctx, "i", vec![1.into()]).unwrap_err().into();
    assert_eq!(err.exc_type(), Some(ExcType::MemoryError));
    assert!(!err.is_exception_type(ExcType::MemoryError));
}

// =============================================================================
// 3. Binding under limits
// =============================================================================

/// Interning keyword names counts against the limit; the failure surfaces as `Raised`.
#[test]
fn bind_interning_hits_limit() {
    static SPEC: ParamSpec = ParamSpec::new(&["", "b"], Some("g"));
    let mut ctx = limited(ResourceLimits::new().max_allocations(2));
    let a = ctx.heap_mut().new_int(1).unwrap();
    let kw = build_value(&mut ctx, "{}", vec![]).unwrap();
    let args = [a.id()];

    // Both allocations are used up, so the slow path cannot intern "b".
    let err = extcall::bind(&mut ctx, &SPEC, &args, KeywordSource::Dict(kw.id()), Arity::new(1, 2, 1)).unwrap_err();
    assert!(matches!(err, BindError::Raised(RunError::UncatchableExc(_))));
    assert_eq!(err.exc_type(), ExcType::MemoryError);
    assert!(ctx.names().is_empty());

    kw.drop_with_heap(ctx.heap_mut());
    a.drop_with_heap(ctx.heap_mut());
}
