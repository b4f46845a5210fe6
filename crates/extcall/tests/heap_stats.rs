//! Tests for `Heap::stats`: live object counts, per-type breakdown, slot reuse and the
//! tracker counters.

use extcall::{Context, DefaultContext, LimitedTracker, ResourceLimits, build_value};
use pretty_assertions::assert_eq;

/// A fresh heap holds only the four immortal singletons.
#[test]
fn fresh_heap_holds_singletons() {
    let ctx = DefaultContext::default();
    let stats = ctx.heap().stats();
    assert_eq!(stats.live_objects, 4);
    assert_eq!(stats.free_slots, 0);
    assert_eq!(stats.total_slots, 4);
    assert_eq!(stats.objects_by_type.get("None"), Some(&1));
    assert_eq!(stats.objects_by_type.get("Bool"), Some(&2));
    assert_eq!(stats.objects_by_type.get("Tuple"), Some(&1));
    assert_eq!(stats.interned_strings, 0);
    assert_eq!(stats.tracker_allocations, None);
    assert_eq!(stats.tracker_memory_bytes, None);
}

/// Built values show up by variant name and disappear when released.
#[test]
fn objects_by_type_counts_built_values() {
    let mut ctx = DefaultContext::default();
    let value = build_value(&mut ctx, "[isd]", vec![1.into(), "a".into(), 2.5.into()]).unwrap();
    let stats = ctx.heap().stats();
    assert_eq!(stats.live_objects, 8);
    assert_eq!(stats.objects_by_type.get("List"), Some(&1));
    assert_eq!(stats.objects_by_type.get("Int"), Some(&1));
    assert_eq!(stats.objects_by_type.get("Str"), Some(&1));
    assert_eq!(stats.objects_by_type.get("Float"), Some(&1));

    value.drop_with_heap(ctx.heap_mut());
    let stats = ctx.heap().stats();
    assert_eq!(stats.live_objects, 4);
    assert_eq!(stats.free_slots, 4);
    assert_eq!(stats.objects_by_type.get("List"), None);
}

/// Freed slots are handed out again before the heap grows.
#[test]
fn free_slots_are_reused() {
    let mut ctx = DefaultContext::default();
    let first = ctx.heap_mut().new_int(1).unwrap();
    let first_id = first.id();
    first.drop_with_heap(ctx.heap_mut());
    assert_eq!(ctx.heap().stats().free_slots, 1);

    let second = ctx.heap_mut().new_int(2).unwrap();
    assert_eq!(second.id(), first_id);
    let stats = ctx.heap().stats();
    assert_eq!(stats.free_slots, 0);
    assert_eq!(stats.total_slots, 5);
    second.drop_with_heap(ctx.heap_mut());
}

/// Interned names are immortal and counted separately.
#[test]
fn interned_strings_are_counted() {
    let mut ctx = DefaultContext::default();
    let a = ctx.heap_mut().intern("alpha").unwrap();
    let again = ctx.heap_mut().intern("alpha").unwrap();
    ctx.heap_mut().intern("beta").unwrap();
    assert_eq!(a, again);
    let stats = ctx.heap().stats();
    assert_eq!(stats.interned_strings, 2);
    assert_eq!(stats.live_objects, 6);
}

/// A limited tracker reports its allocation count and memory in the stats.
#[test]
fn tracker_counters_in_stats() {
    let mut ctx = Context::new(LimitedTracker::new(ResourceLimits::new()));
    let value = build_value(&mut ctx, "(ii)", vec![1.into(), 2.into()]).unwrap();
    let stats = ctx.heap().stats();
    assert_eq!(stats.tracker_allocations, Some(3));
    assert!(stats.tracker_memory_bytes.is_some_and(|bytes| bytes > 0));

    value.drop_with_heap(ctx.heap_mut());
    let stats = ctx.heap().stats();
    assert_eq!(stats.tracker_allocations, Some(3));
    assert_eq!(stats.tracker_memory_bytes, Some(0));
}

/// Snapshots compare equal once everything built in between has been released.
#[test]
fn snapshot_matches_after_release() {
    let mut ctx = DefaultContext::default();
    let before = ctx.heap().stats();
    let value = build_value(&mut ctx, "{s:(ii)}", vec!["k".into(), 1.into(), 2.into()]).unwrap();
    let during = ctx.heap().stats();
    assert_ne!(during, before);
    assert_eq!(during.objects_by_type.get("Dict"), Some(&1));

    value.drop_with_heap(ctx.heap_mut());
    let after = ctx.heap().stats();
    assert_eq!(after.live_objects, before.live_objects);
    assert_eq!(after.objects_by_type, before.objects_by_type);
    assert_eq!(after.free_slots, 5);
}
