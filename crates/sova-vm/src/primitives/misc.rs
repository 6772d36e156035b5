// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Clocks, cache control, VM parameters, the quit primitive and the
//! named-plugin gateway.

use num_traits::ToPrimitive;
use sova_objects::immediate;
use sova_objects::known::{class_table, special};
use tracing::debug;

use crate::clock;
use crate::interpreter::Interpreter;
use crate::plugins;

use super::{
    PrimResult, PrimitiveFailure, PrimitiveOutcome, argument, argument_count, expect_small_int,
    largeint, receiver, small_int_or_fail,
};

/// Primitives 89 and 116: flush the method-lookup cache.
pub fn flush_method_cache(vm: &mut Interpreter) -> PrimResult {
    vm.cache.flush();
    Ok(PrimitiveOutcome::Value(receiver(vm)?))
}

/// Primitive 113: quit.
pub fn quit(vm: &mut Interpreter) -> PrimResult {
    debug!(steps = vm.steps(), "image requested shutdown");
    Ok(PrimitiveOutcome::Quit)
}

/// Primitive 117: external call through a named plugin.
///
/// The method's first literal is a pragma array whose first two slots
/// name the module and the function. Unknown pairs fail, so the image's
/// fallback code runs.
pub fn external_call(vm: &mut Interpreter) -> PrimResult {
    let method = vm.current_method().map_err(|_| PrimitiveFailure)?;
    let pragma = method.literal(&vm.memory, 0)?;
    let pragma_obj = vm.memory.heap_object(pragma)?;
    let module = vm.memory.text(vm.memory.slot(&pragma_obj, 0)?)?;
    let function = vm.memory.text(vm.memory.slot(&pragma_obj, 1)?)?;
    plugins::call(vm, &module, &function)
}

/// Primitive 125: low-space watcher registration.
///
/// The image either hands a byte threshold or the semaphore to signal
/// when space runs out.
pub fn low_space_watcher(vm: &mut Interpreter) -> PrimResult {
    let arg = argument(vm, 0)?;
    if arg.is_small_int() {
        vm.scheduler.set_low_space_threshold(immediate::small_int_value(arg).max(0) as u64);
    } else if arg == vm.memory.nil() {
        // nil leaves the registration untouched
    } else if vm.memory.heap_object(arg)?.class_index == class_table::SEMAPHORE {
        vm.scheduler.register_low_space_semaphore(arg);
    } else {
        return Err(PrimitiveFailure);
    }
    Ok(PrimitiveOutcome::Value(receiver(vm)?))
}

/// Primitive 135: the wrapping 29-bit millisecond clock.
pub fn millisecond_clock(vm: &mut Interpreter) -> PrimResult {
    let _ = vm;
    Ok(PrimitiveOutcome::Value(small_int_or_fail(clock::milliseconds() as i64)?))
}

/// Primitives 240 and 241: the microsecond clocks (this VM reports UTC
/// for both).
pub fn microsecond_clock(vm: &mut Interpreter) -> PrimResult {
    let _ = vm;
    Ok(PrimitiveOutcome::Value(small_int_or_fail(clock::utc_microseconds() as i64)?))
}

/// Primitive 242: schedule the timer-semaphore signal at an absolute
/// microsecond time; a nil semaphore disarms the wake-up.
pub fn signal_at_microseconds(vm: &mut Interpreter) -> PrimResult {
    let semaphore = argument(vm, 0)?;
    let deadline = argument(vm, 1)?;
    if semaphore == vm.memory.nil() {
        vm.memory.special_put(special::TIMER_SEMAPHORE, vm.memory.nil())?;
        vm.scheduler.set_wakeup(0);
        return Ok(PrimitiveOutcome::Value(receiver(vm)?));
    }
    let usecs = largeint::to_integer(vm, deadline)?.to_u64().ok_or(PrimitiveFailure)?;
    vm.memory.special_put(special::TIMER_SEMAPHORE, semaphore)?;
    vm.scheduler.set_wakeup(usecs);
    debug!(deadline = usecs, "timer armed");
    Ok(PrimitiveOutcome::Value(receiver(vm)?))
}

/// Primitive 254: VM parameter get/set.
pub fn vm_parameter(vm: &mut Interpreter) -> PrimResult {
    let index = expect_small_int(argument(vm, 0)?)?;
    if argument_count(vm)? >= 2 {
        let value = argument(vm, 1)?;
        vm.param_put(index, value);
        return Ok(PrimitiveOutcome::Value(small_int_or_fail(0)?));
    }
    vm.param(index).map(PrimitiveOutcome::Value).ok_or(PrimitiveFailure)
}
