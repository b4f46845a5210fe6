#![doc = include_str!("../../../README.md")]
mod args;
mod binder;
mod builder;
mod context;
mod exception;
mod handles;
mod heap;
mod intern;
mod param_spec;
mod resource;
pub mod tracer;
pub mod trampoline;
mod types;
mod value;

pub use crate::{
    args::{bad_argument, check_positional, no_keywords, no_positional, unpack_stack, unpack_tuple},
    binder::{Arity, BindError, BoundArgs, KeywordSource, bind},
    builder::{
        BuildArg, BuildError, CallFault, Converter, Directive, Format, FormatFault, GroupFault, GroupKind, build_value,
    },
    context::{Context, DefaultContext},
    exception::{ExcType, RunError, RunResult, SimpleException},
    handles::{HandleTracker, ListBuilder, TupleBuilder, tuple_from_array},
    heap::{ContainsHeap, DropWithHeap, Heap, HeapData, HeapId, HeapStats},
    param_spec::{ParamSpec, ParamSpecCache, SpecError, SpecId, SpecLayout},
    resource::{LimitedTracker, MAX_DATA_RECURSION_DEPTH, NoLimitTracker, ResourceError, ResourceLimits, ResourceTracker},
    tracer::{MarshalTracer, NoopTracer, RecordingTracer, StderrTracer, TraceEvent},
    trampoline::{CompareOp, Family, Handle, HandleBuffer, RawBuffer, RawObject},
    types::{Dict, DictKey, NativeObject, PURE_HEADER_SIZE, TypeFlags},
    value::Value,
};
