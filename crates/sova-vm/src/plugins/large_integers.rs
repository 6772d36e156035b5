// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The LargeIntegers plugin.
//!
//! Digit-level helpers the image leans on when the numbered primitives
//! fail. Operands arrive as SmallIntegers or LargeIntegers; results
//! shrink back to SmallInteger when they fit.

use num_bigint::BigInt;
use num_traits::Zero;

use crate::interpreter::Interpreter;
use crate::primitives::largeint::{integer_result, to_integer};
use crate::primitives::{
    PrimResult, PrimitiveFailure, PrimitiveOutcome, argument, receiver, small_int_or_fail,
};

/// Route a LargeIntegers function by name.
pub fn call(vm: &mut Interpreter, function: &str) -> PrimResult {
    match function {
        "primDigitAdd" => binary_op(vm, |a, b| a + b),
        "primDigitSubtract" => binary_op(vm, |a, b| a - b),
        "primDigitMultiplyNegative" => binary_op(vm, |a, b| a * b),
        "primDigitDivNegative" => div_negative(vm),
        "primDigitCompare" => compare(vm),
        "primDigitBitAnd" => binary_op(vm, |a, b| a & b),
        "primDigitBitOr" => binary_op(vm, |a, b| a | b),
        "primDigitBitXor" => binary_op(vm, |a, b| a ^ b),
        _ => Err(PrimitiveFailure),
    }
}

fn binary_op(vm: &mut Interpreter, op: impl FnOnce(BigInt, BigInt) -> BigInt) -> PrimResult {
    let a = to_integer(vm, receiver(vm)?)?;
    let b = to_integer(vm, argument(vm, 0)?)?;
    let value = integer_result(vm, &op(a, b))?;
    Ok(PrimitiveOutcome::Value(value))
}

/// `primDigitCompare`: -1, 0 or 1.
fn compare(vm: &mut Interpreter) -> PrimResult {
    let a = to_integer(vm, receiver(vm)?)?;
    let b = to_integer(vm, argument(vm, 0)?)?;
    let order = match a.cmp(&b) {
        core::cmp::Ordering::Less => -1,
        core::cmp::Ordering::Equal => 0,
        core::cmp::Ordering::Greater => 1,
    };
    Ok(PrimitiveOutcome::Value(small_int_or_fail(order)?))
}

/// `primDigitDivNegative`: quotient and remainder as a two-slot array.
fn div_negative(vm: &mut Interpreter) -> PrimResult {
    let a = to_integer(vm, receiver(vm)?)?;
    let b = to_integer(vm, argument(vm, 0)?)?;
    if b.is_zero() {
        return Err(PrimitiveFailure);
    }
    let quotient = integer_result(vm, &(&a / &b))?;
    let remainder = integer_result(vm, &(&a % &b))?;

    let class = vm.memory.class_at(sova_objects::known::class_table::ARRAY)?;
    let array = vm.memory.allocate(class, 2)?;
    let obj = vm.memory.heap_object(array)?;
    vm.memory.slot_put(&obj, 0, quotient)?;
    vm.memory.slot_put(&obj, 1, remainder)?;
    Ok(PrimitiveOutcome::Value(array))
}
