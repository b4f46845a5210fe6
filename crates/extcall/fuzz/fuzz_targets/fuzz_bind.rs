//! Fuzz target: bind arbitrary calls against a fixed parameter declaration.
//!
//! The first bytes pick the arity and the number of positional arguments; the rest of
//! the input is split on `,` into keyword names, passed alternately as a dict and as a
//! names tuple. Binding may fail with any diagnostic but must never panic, and on
//! success every filled slot must be one of the supplied arguments.

#![no_main]

use libfuzzer_sys::fuzz_target;

use extcall::{Arity, Context, HeapId, KeywordSource, LimitedTracker, ParamSpec, ResourceLimits, Value, bind};

static SPEC: ParamSpec = ParamSpec::new(&["", "", "alpha", "beta", "gamma", "delta"], Some("fuzzed"));

fuzz_target!(|data: &[u8]| {
    let [min, max, kwonly, nargs, rest @ ..] = data else {
        return;
    };
    let Ok(rest) = std::str::from_utf8(rest) else {
        return;
    };
    if rest.len() > 512 {
        return;
    }

    let min = usize::from(min % 7);
    let max = usize::from(max % 7);
    let arity = Arity::new(min, max, usize::from(kwonly % 3));
    let nargs = usize::from(nargs % 8);

    let limits = ResourceLimits::new().max_allocations(1_000).max_memory(1024 * 1024);
    let mut ctx = Context::new(LimitedTracker::new(limits));
    let mut owned: Vec<Value> = Vec::new();

    for i in 0..nargs {
        let Ok(value) = ctx.heap_mut().new_int(i64::try_from(i).unwrap_or(0)) else {
            return;
        };
        owned.push(value);
    }
    let args: Vec<HeapId> = owned.iter().map(Value::id).collect();

    let mut names = Vec::new();
    let mut values = Vec::new();
    for name in rest.split(',').filter(|name| !name.is_empty()).take(8) {
        let (Ok(key), Ok(value)) = (ctx.heap_mut().new_str(name), ctx.heap_mut().new_int(-1)) else {
            return;
        };
        values.push(value.id());
        names.push(key);
        owned.push(value);
    }

    let use_dict = data.len() % 2 == 0;
    let container = if use_dict {
        let mut dict = extcall::Dict::new();
        for (key, &value) in names.into_iter().zip(&values) {
            let value = ctx.heap().retain(value);
            if dict.set_item(ctx.heap_mut(), key, value).is_err() {
                return;
            }
        }
        ctx.heap_mut().new_dict(dict)
    } else {
        ctx.heap_mut().new_tuple(names)
    };
    let Ok(container) = container else {
        return;
    };
    let kwargs = if use_dict {
        KeywordSource::Dict(container.id())
    } else {
        KeywordSource::Names {
            names: container.id(),
            values: &values,
        }
    };

    if let Ok(bound) = bind(&mut ctx, &SPEC, &args, kwargs, arity) {
        for id in bound.iter().flatten() {
            assert!(args.contains(&id) || values.contains(&id));
        }
    }
});
