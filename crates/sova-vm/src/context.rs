// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Activation records.
//!
//! Every activation is a real heap context (class-table index 36) so
//! `thisContext`, process suspension and the exception primitives all
//! observe the same object the interpreter runs. Slots, in order:
//! sender, pc, stackp, method, closure-or-nil, receiver; the variable
//! part is the operand stack, temporaries at its bottom.
//!
//! The pc slot follows the image convention of one-based indexing into
//! the method body; this module converts at the boundary so the
//! interpreter works with zero-based offsets throughout.


use sova_objects::immediate;
use sova_objects::known::class_table;
use sova_objects::oop::Oop;

use crate::memory::{ObjectError, ObjectMemory};
use crate::method::CompiledMethod;

/// Context slot: the sender context, nil at the bottom of a chain.
pub const SENDER: u64 = 0;
/// Context slot: one-based pc into the method body, nil when dead.
pub const PC: u64 = 1;
/// Context slot: operand-stack height, temporaries included.
pub const STACKP: u64 = 2;
/// Context slot: the compiled method being executed.
pub const METHOD: u64 = 3;
/// Context slot: the block closure being evaluated, or nil.
pub const CLOSURE: u64 = 4;
/// Context slot: the receiver.
pub const RECEIVER: u64 = 5;
/// First slot of the operand stack.
pub const STACK_BASE: u64 = 6;

/// Closure slot: the defining (outer) context.
pub const CLOSURE_OUTER: u64 = 0;
/// Closure slot: one-based start pc within the outer method.
pub const CLOSURE_START_PC: u64 = 1;
/// Closure slot: argument count.
pub const CLOSURE_NUM_ARGS: u64 = 2;
/// First closure slot holding copied values.
pub const CLOSURE_COPIED_BASE: u64 = 3;

/// Message slot: the missed selector.
pub const MESSAGE_SELECTOR: u64 = 0;
/// Message slot: the argument array.
pub const MESSAGE_ARGS: u64 = 1;
/// Message slot: the class lookup started at.
pub const MESSAGE_LOOKUP_CLASS: u64 = 2;

/// Allocate and initialise a fresh method activation.
///
/// Arguments land at the bottom of the stack, remaining temporaries are
/// nil, and `stackp` starts at the method's temp count.
///
/// # Errors
///
/// Returns an error when allocation fails.
pub fn new_activation(
    memory: &mut ObjectMemory,
    method: &CompiledMethod,
    receiver: Oop,
    args: &[Oop],
    sender: Oop,
) -> Result<Oop, ObjectError> {
    let class = memory.class_at(class_table::CONTEXT)?;
    let ctx = memory.allocate(class, u64::from(method.header.frame_size()))?;
    let obj = memory.heap_object(ctx)?;
    memory.slot_put(&obj, SENDER, sender)?;
    set_pc(memory, ctx, method.initial_pc())?;
    memory.slot_put(&obj, STACKP, small_int(i64::from(method.header.num_temps)))?;
    memory.slot_put(&obj, METHOD, method.oop)?;
    memory.slot_put(&obj, CLOSURE, memory.nil())?;
    memory.slot_put(&obj, RECEIVER, receiver)?;
    for (i, arg) in args.iter().enumerate() {
        memory.slot_put(&obj, STACK_BASE + i as u64, *arg)?;
    }
    Ok(ctx)
}

fn small_int(value: i64) -> Oop {
    immediate::small_int(value).unwrap_or_default()
}

/// Read a context slot.
///
/// # Errors
///
/// Returns an error when the context does not decode.
pub fn slot(memory: &ObjectMemory, ctx: Oop, index: u64) -> Result<Oop, ObjectError> {
    let obj = memory.heap_object(ctx)?;
    memory.slot(&obj, index)
}

/// Write a context slot.
///
/// # Errors
///
/// Returns an error when the context does not decode.
pub fn slot_put(
    memory: &mut ObjectMemory,
    ctx: Oop,
    index: u64,
    value: Oop,
) -> Result<(), ObjectError> {
    let obj = memory.heap_object(ctx)?;
    memory.slot_put(&obj, index, value)
}

/// The zero-based pc.
///
/// # Errors
///
/// Returns an error when the context does not decode.
pub fn pc(memory: &ObjectMemory, ctx: Oop) -> Result<u64, ObjectError> {
    let raw = slot(memory, ctx, PC)?;
    Ok((immediate::small_int_value(raw) as u64).saturating_sub(1))
}

/// Store a zero-based pc (one-based in the slot).
///
/// # Errors
///
/// Returns an error when the context does not decode.
pub fn set_pc(memory: &mut ObjectMemory, ctx: Oop, pc: u64) -> Result<(), ObjectError> {
    slot_put(memory, ctx, PC, small_int(pc as i64 + 1))
}

/// Whether the context has not yet returned (pc slot still an integer).
///
/// # Errors
///
/// Returns an error when the context does not decode.
pub fn is_live(memory: &ObjectMemory, ctx: Oop) -> Result<bool, ObjectError> {
    Ok(slot(memory, ctx, PC)?.is_small_int())
}

/// The stack height, temporaries included.
///
/// # Errors
///
/// Returns an error when the context does not decode.
pub fn stackp(memory: &ObjectMemory, ctx: Oop) -> Result<u64, ObjectError> {
    Ok(immediate::small_int_value(slot(memory, ctx, STACKP)?) as u64)
}

/// Store the stack height.
///
/// # Errors
///
/// Returns an error when the context does not decode.
pub fn set_stackp(memory: &mut ObjectMemory, ctx: Oop, value: u64) -> Result<(), ObjectError> {
    slot_put(memory, ctx, STACKP, small_int(value as i64))
}

/// Slots available to the operand stack.
///
/// # Errors
///
/// Returns an error when the context does not decode.
pub fn capacity(memory: &ObjectMemory, ctx: Oop) -> Result<u64, ObjectError> {
    let obj = memory.heap_object(ctx)?;
    Ok(obj.slot_count - STACK_BASE)
}

/// Push a value on the operand stack.
///
/// # Errors
///
/// Returns [`ObjectError::StackOverflow`] when the frame is full.
pub fn push(memory: &mut ObjectMemory, ctx: Oop, value: Oop) -> Result<(), ObjectError> {
    let sp = stackp(memory, ctx)?;
    if sp >= capacity(memory, ctx)? {
        return Err(ObjectError::StackOverflow { ctx: ctx.address() });
    }
    slot_put(memory, ctx, STACK_BASE + sp, value)?;
    set_stackp(memory, ctx, sp + 1)
}

/// Pop the top of the operand stack.
///
/// # Errors
///
/// Returns [`ObjectError::StackUnderflow`] on an empty stack.
pub fn pop(memory: &mut ObjectMemory, ctx: Oop) -> Result<Oop, ObjectError> {
    let sp = stackp(memory, ctx)?;
    if sp == 0 {
        return Err(ObjectError::StackUnderflow { ctx: ctx.address() });
    }
    let value = slot(memory, ctx, STACK_BASE + sp - 1)?;
    set_stackp(memory, ctx, sp - 1)?;
    Ok(value)
}

/// Read the top of the operand stack without popping.
///
/// # Errors
///
/// Returns [`ObjectError::StackUnderflow`] on an empty stack.
pub fn peek(memory: &ObjectMemory, ctx: Oop) -> Result<Oop, ObjectError> {
    let sp = stackp(memory, ctx)?;
    if sp == 0 {
        return Err(ObjectError::StackUnderflow { ctx: ctx.address() });
    }
    slot(memory, ctx, STACK_BASE + sp - 1)
}

/// Read a value `depth` slots below the top (0 = top).
///
/// # Errors
///
/// Returns [`ObjectError::StackUnderflow`] when the stack is shallower.
pub fn peek_at(memory: &ObjectMemory, ctx: Oop, depth: u64) -> Result<Oop, ObjectError> {
    let sp = stackp(memory, ctx)?;
    if depth >= sp {
        return Err(ObjectError::StackUnderflow { ctx: ctx.address() });
    }
    slot(memory, ctx, STACK_BASE + sp - 1 - depth)
}

/// Read temporary (or argument) `i`.
///
/// # Errors
///
/// Returns an error when the context does not decode.
pub fn temp(memory: &ObjectMemory, ctx: Oop, i: u64) -> Result<Oop, ObjectError> {
    slot(memory, ctx, STACK_BASE + i)
}

/// Write temporary (or argument) `i`.
///
/// # Errors
///
/// Returns an error when the context does not decode.
pub fn temp_put(memory: &mut ObjectMemory, ctx: Oop, i: u64, value: Oop) -> Result<(), ObjectError> {
    slot_put(memory, ctx, STACK_BASE + i, value)
}

/// The sender context.
///
/// # Errors
///
/// Returns an error when the context does not decode.
pub fn sender(memory: &ObjectMemory, ctx: Oop) -> Result<Oop, ObjectError> {
    slot(memory, ctx, SENDER)
}

/// The receiver.
///
/// # Errors
///
/// Returns an error when the context does not decode.
pub fn receiver(memory: &ObjectMemory, ctx: Oop) -> Result<Oop, ObjectError> {
    slot(memory, ctx, RECEIVER)
}

/// The compiled-method oop.
///
/// # Errors
///
/// Returns an error when the context does not decode.
pub fn method_oop(memory: &ObjectMemory, ctx: Oop) -> Result<Oop, ObjectError> {
    slot(memory, ctx, METHOD)
}

/// The closure slot (nil for plain method activations).
///
/// # Errors
///
/// Returns an error when the context does not decode.
pub fn closure(memory: &ObjectMemory, ctx: Oop) -> Result<Oop, ObjectError> {
    slot(memory, ctx, CLOSURE)
}

/// The home context: follow the outer chain until a plain method
/// activation is reached.
///
/// # Errors
///
/// Returns an error when a closure in the chain does not decode.
pub fn home(memory: &ObjectMemory, ctx: Oop) -> Result<Oop, ObjectError> {
    let mut current = ctx;
    loop {
        let block = closure(memory, current)?;
        if block == memory.nil() {
            return Ok(current);
        }
        let block_obj = memory.heap_object(block)?;
        current = memory.slot(&block_obj, CLOSURE_OUTER)?;
    }
}

/// Cut the context out of any chain: nil the sender and pc so a later
/// return into it is detectable.
///
/// # Errors
///
/// Returns an error when the context does not decode.
pub fn terminate(memory: &mut ObjectMemory, ctx: Oop) -> Result<(), ObjectError> {
    slot_put(memory, ctx, SENDER, memory.nil())?;
    slot_put(memory, ctx, PC, memory.nil())
}
