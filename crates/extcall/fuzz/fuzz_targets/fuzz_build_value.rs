//! Fuzz target: compile and interpret arbitrary format strings.
//!
//! The format comes from the input text and the arguments are synthesised from the
//! compiled directives, with every third argument deliberately of the wrong kind. Any
//! outcome is fine except a panic or a leaked object: after releasing the result the
//! heap must be back to its initial population.

#![no_main]

use libfuzzer_sys::fuzz_target;

use extcall::{BuildArg, Context, Directive, Format, LimitedTracker, ResourceLimits};

const WIDE: &[u32] = &[0x66, 0x75, 0x7a, 0x7a];

fuzz_target!(|data: &[u8]| {
    let Ok(format) = std::str::from_utf8(data) else {
        return;
    };
    if format.len() > 16_384 {
        return;
    }

    let limits = ResourceLimits::new().max_allocations(1_000).max_memory(1024 * 1024);
    let mut ctx = Context::new(LimitedTracker::new(limits));
    let baseline = ctx.heap().stats().live_objects;

    let Ok(compiled) = Format::compile(format) else {
        return;
    };

    let mut args: Vec<BuildArg<'_, LimitedTracker>> = Vec::with_capacity(compiled.arg_count());
    for (position, directive) in compiled.directives().enumerate() {
        if matches!(directive, Directive::Open(_) | Directive::Close(_)) {
            continue;
        }
        if position % 3 == 2 {
            args.push(BuildArg::Float(1.5));
            continue;
        }
        match directive {
            Directive::Str { sized } => {
                args.push("fuzz".into());
                if sized {
                    args.push(BuildArg::Size(4));
                }
            }
            Directive::Bytes { sized } => {
                args.push(b"fuzz".as_slice().into());
                if sized {
                    args.push(BuildArg::Size(-1));
                }
            }
            Directive::Wide { sized } => {
                args.push(BuildArg::Wide(Some(WIDE)));
                if sized {
                    args.push(BuildArg::Size(2));
                }
            }
            Directive::Float => args.push(0.25.into()),
            Directive::Object => args.push(ctx.heap().none_id().into()),
            Directive::Steal => {
                let Ok(value) = ctx.heap_mut().new_int(7) else {
                    return;
                };
                args.push(value.into());
            }
            Directive::ULong => args.push(u64::MAX.into()),
            _ => args.push(i64::from(u8::MAX).into()),
        }
    }

    if let Ok(value) = compiled.build(&mut ctx, args) {
        value.drop_with_heap(ctx.heap_mut());
    }
    ctx.take_error();
    assert_eq!(ctx.heap().stats().live_objects, baseline);
});
