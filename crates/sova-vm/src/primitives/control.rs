// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Control-flow primitives: `perform:`, block evaluation, context
//! manipulation and the exception-machinery walks.
//!
//! Primitives 198 (unwind marker) and 199 (handler marker) are not
//! handled here at all - they fail unconditionally so the marked
//! method's body runs; 195 and 197 find them by walking sender chains
//! and inspecting each method's primitive number.

use sova_objects::known::class_table;
use sova_objects::oop::Oop;

use crate::context;
use crate::interpreter::Interpreter;
use crate::interpreter::closures::closure_arg_count;
use crate::lookup::{self, LookupOutcome};
use crate::method::CompiledMethod;

use super::{PrimResult, PrimitiveFailure, PrimitiveOutcome, argument, argument_count, receiver};

/// The primitive number marking unwind-protect methods.
const UNWIND_MARKER: u16 = 198;
/// The primitive number marking handler methods.
const HANDLER_MARKER: u16 = 199;

/// Primitive 76: `stackp:` - resize a context's stack pointer.
pub fn context_stackp_put(vm: &mut Interpreter) -> PrimResult {
    let ctx = receiver(vm)?;
    let new_stackp = super::expect_small_int(argument(vm, 0)?)?;
    if new_stackp < 0 || new_stackp as u64 > context::capacity(&vm.memory, ctx)? {
        return Err(PrimitiveFailure);
    }
    let old = context::stackp(&vm.memory, ctx)?;
    let nil = vm.memory.nil();
    for i in old..new_stackp as u64 {
        context::temp_put(&mut vm.memory, ctx, i, nil)?;
    }
    context::set_stackp(&mut vm.memory, ctx, new_stackp as u64)?;
    Ok(PrimitiveOutcome::Value(ctx))
}

/// Primitive 83: `perform:` and its with-argument variants.
///
/// Re-dispatches the selector in argument 0 with the remaining
/// arguments, replacing the `perform:` activation entirely.
pub fn perform(vm: &mut Interpreter) -> PrimResult {
    let argc = argument_count(vm)?;
    if argc == 0 {
        return Err(PrimitiveFailure);
    }
    let selector = argument(vm, 0)?;
    let mut args = Vec::with_capacity(argc as usize - 1);
    for i in 1..argc {
        args.push(argument(vm, i)?);
    }
    redispatch(vm, selector, &args)
}

/// Primitive 84: `perform:withArguments:`.
pub fn perform_with_arguments(vm: &mut Interpreter) -> PrimResult {
    let selector = argument(vm, 0)?;
    let array = vm.memory.heap_object(argument(vm, 1)?)?;
    if !array.format.is_pointers() {
        return Err(PrimitiveFailure);
    }
    let mut args = Vec::with_capacity(array.slot_count as usize);
    for i in 0..array.slot_count {
        args.push(vm.memory.slot(&array, i)?);
    }
    redispatch(vm, selector, &args)
}

/// Shared tail of the perform primitives: look the selector up and
/// activate it in place of the current activation.
fn redispatch(vm: &mut Interpreter, selector: Oop, args: &[Oop]) -> PrimResult {
    let target = receiver(vm)?;
    let class = vm.memory.class_of(target)?;
    let method = match lookup::lookup_method(&vm.memory, &mut vm.cache, class, selector, false)? {
        LookupOutcome::Method(method) => method,
        // let the fallback code raise doesNotUnderstand: in Smalltalk
        LookupOutcome::DoesNotUnderstand => return Err(PrimitiveFailure),
    };
    let decoded = CompiledMethod::decode(&vm.memory, method)?;
    if u64::from(decoded.header.num_args) != args.len() as u64 {
        return Err(PrimitiveFailure);
    }
    let sender = context::sender(&vm.memory, vm.current_context())?;
    vm.activate_method(method, target, args, sender).map_err(|_| PrimitiveFailure)?;
    Ok(PrimitiveOutcome::Activated)
}

/// Primitives 201-205 (and the no-context-switch aliases): evaluate a
/// block closure with `argc` arguments.
pub fn block_value(vm: &mut Interpreter, argc: u64) -> PrimResult {
    let closure = receiver(vm)?;
    let obj = vm.memory.heap_object(closure)?;
    if obj.class_index != class_table::BLOCK_CLOSURE {
        return Err(PrimitiveFailure);
    }
    if closure_arg_count(&vm.memory, closure)? != argc as i64 {
        return Err(PrimitiveFailure);
    }
    let mut args = Vec::with_capacity(argc as usize);
    for i in 0..argc {
        args.push(argument(vm, i)?);
    }
    vm.activate_block(closure, &args).map_err(|_| PrimitiveFailure)?;
    Ok(PrimitiveOutcome::Activated)
}

/// Primitive 195: find the next unwind-marked context between the
/// receiver and the stop context, exclusive.
pub fn find_next_unwind_context(vm: &mut Interpreter) -> PrimResult {
    let start = receiver(vm)?;
    let stop = argument(vm, 0)?;
    let mut ctx = context::sender(&vm.memory, start)?;
    while ctx != vm.memory.nil() && ctx != stop {
        if method_primitive(vm, ctx)? == UNWIND_MARKER {
            return Ok(PrimitiveOutcome::Value(ctx));
        }
        ctx = context::sender(&vm.memory, ctx)?;
    }
    Ok(PrimitiveOutcome::Value(vm.memory.nil()))
}

/// Primitive 196: `terminateTo:` - cut the sender chain so the
/// receiver returns straight to the argument.
pub fn terminate_to(vm: &mut Interpreter) -> PrimResult {
    let ctx = receiver(vm)?;
    let target = argument(vm, 0)?;
    // drop every intervening context so stale returns are detectable
    let mut walk = context::sender(&vm.memory, ctx)?;
    while walk != vm.memory.nil() && walk != target {
        let next = context::sender(&vm.memory, walk)?;
        context::terminate(&mut vm.memory, walk)?;
        walk = next;
    }
    context::slot_put(&mut vm.memory, ctx, context::SENDER, target)?;
    Ok(PrimitiveOutcome::Value(ctx))
}

/// Primitive 197: find the nearest handler-marked context starting at
/// the receiver.
pub fn find_handler_context(vm: &mut Interpreter) -> PrimResult {
    let mut ctx = receiver(vm)?;
    while ctx != vm.memory.nil() {
        if method_primitive(vm, ctx)? == HANDLER_MARKER {
            return Ok(PrimitiveOutcome::Value(ctx));
        }
        ctx = context::sender(&vm.memory, ctx)?;
    }
    Ok(PrimitiveOutcome::Value(vm.memory.nil()))
}

/// The primitive number of a context's method, 0 when absent.
fn method_primitive(vm: &Interpreter, ctx: Oop) -> Result<u16, PrimitiveFailure> {
    let method_oop = context::method_oop(&vm.memory, ctx)?;
    let method = CompiledMethod::decode(&vm.memory, method_oop)?;
    Ok(method.primitive_number(&vm.memory)?)
}
