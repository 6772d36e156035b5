// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Numbered primitives.
//!
//! A method whose header sets the primitive flag leads its body with a
//! `callPrimitive` bytecode; the interpreter routes the number here. By
//! then the activation is current, so every handler reads the receiver
//! and arguments from the activation's slots.
//!
//! A handler answers one of three outcomes: a value (control returns to
//! the sender with it pushed), an activation (the handler installed a
//! new current context itself, e.g. block evaluation and `perform:`),
//! or failure - in which case the interpreter falls through to the
//! method's Smalltalk fallback body with the arguments untouched.

#[cfg(test)]
mod primitives_test;

pub mod arithmetic;
pub mod control;
pub mod indexable;
pub mod largeint;
pub mod misc;
pub mod objects;
pub mod processes;

use sova_objects::immediate;
use sova_objects::oop::Oop;

use crate::context;
use crate::interpreter::Interpreter;
use crate::memory::ObjectError;

/// The failure signal: the send falls through to the fallback bytecode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimitiveFailure;

impl From<ObjectError> for PrimitiveFailure {
    fn from(_: ObjectError) -> Self {
        Self
    }
}

/// What a successful primitive produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveOutcome {
    /// Return this value to the sender.
    Value(Oop),
    /// The handler installed a new current context.
    Activated,
    /// The image asked the VM to shut down.
    Quit,
}

/// Shorthand for primitive handler results.
pub type PrimResult = Result<PrimitiveOutcome, PrimitiveFailure>;

/// The receiver of the current (primitive) activation.
pub(crate) fn receiver(vm: &Interpreter) -> Result<Oop, PrimitiveFailure> {
    Ok(context::receiver(&vm.memory, vm.current_context())?)
}

/// Argument `i` of the current activation.
pub(crate) fn argument(vm: &Interpreter, i: u64) -> Result<Oop, PrimitiveFailure> {
    Ok(context::temp(&vm.memory, vm.current_context(), i)?)
}

/// Argument count of the current activation's method.
pub(crate) fn argument_count(vm: &Interpreter) -> Result<u64, PrimitiveFailure> {
    let method = vm.current_method().map_err(|_| PrimitiveFailure)?;
    Ok(u64::from(method.header.num_args))
}

/// Decode a SmallInteger argument or fail.
pub(crate) fn expect_small_int(oop: Oop) -> Result<i64, PrimitiveFailure> {
    if oop.is_small_int() {
        Ok(immediate::small_int_value(oop))
    } else {
        Err(PrimitiveFailure)
    }
}

/// Encode a SmallInteger result or fail on 61-bit overflow.
pub(crate) fn small_int_or_fail(value: i64) -> Result<Oop, PrimitiveFailure> {
    immediate::small_int(value).ok_or(PrimitiveFailure)
}

/// Route a primitive number to its handler.
///
/// Unknown numbers fail, which sends control into the method's fallback
/// body - the image's own Smalltalk implementation.
///
/// # Errors
///
/// Returns [`PrimitiveFailure`] exactly when the image-visible
/// primitive fails.
pub fn dispatch(vm: &mut Interpreter, number: u16) -> PrimResult {
    match number {
        1..=17 => arithmetic::small_int_op(vm, number),
        18 => objects::make_point(vm),
        21..=33 => largeint::large_int_op(vm, number),
        40 => arithmetic::small_int_as_float(vm),
        41..=51 => arithmetic::float_op(vm, number - 40),
        60 => indexable::at(vm),
        61 => indexable::at_put(vm),
        62 => indexable::size(vm),
        63 => indexable::string_at(vm),
        64 => indexable::string_at_put(vm),
        68 => indexable::object_at(vm),
        70 => objects::basic_new(vm),
        71 => objects::basic_new_sized(vm),
        75 | 175 => objects::identity_hash(vm),
        76 => control::context_stackp_put(vm),
        83 => control::perform(vm),
        84 => control::perform_with_arguments(vm),
        85 => processes::semaphore_signal(vm),
        86 => processes::semaphore_wait(vm),
        87 => processes::process_resume(vm),
        88 => processes::process_suspend(vm),
        89 | 116 => misc::flush_method_cache(vm),
        105 => indexable::replace_from_to(vm),
        110 => objects::identical(vm),
        111 => objects::class_of(vm),
        113 => misc::quit(vm),
        117 => misc::external_call(vm),
        125 => misc::low_space_watcher(vm),
        129 => objects::special_objects_array(vm),
        135 => misc::millisecond_clock(vm),
        148 => objects::shallow_copy(vm),
        195 => control::find_next_unwind_context(vm),
        196 => control::terminate_to(vm),
        197 => control::find_handler_context(vm),
        // handler / unwind markers: always fail so the body runs
        198 | 199 => Err(PrimitiveFailure),
        201..=205 => control::block_value(vm, u64::from(number) - 201),
        211..=214 => control::block_value(vm, u64::from(number) - 211),
        221 | 222 => control::block_value(vm, u64::from(number) - 221),
        230 => processes::yield_processor(vm),
        240 | 241 => misc::microsecond_clock(vm),
        242 => misc::signal_at_microseconds(vm),
        254 => misc::vm_parameter(vm),
        541..=551 => arithmetic::float_op(vm, number - 540),
        _ => Err(PrimitiveFailure),
    }
}
