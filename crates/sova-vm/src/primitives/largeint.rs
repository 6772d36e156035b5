// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! LargeInteger arithmetic primitives (21-33).
//!
//! Large integers are byte objects holding a little-endian magnitude;
//! the sign lives in the class (LargePositiveInteger /
//! LargeNegativeInteger). Operands convert to arbitrary precision,
//! results shrink back to SmallInteger when they fit.

use num_bigint::{BigInt, Sign};
use num_integer::Integer;
use num_traits::{Signed, ToPrimitive, Zero};
use sova_objects::immediate::{self, SMALL_INT_MAX, SMALL_INT_MIN};
use sova_objects::known::{class_table, special};
use sova_objects::oop::Oop;

use crate::interpreter::Interpreter;

use super::{PrimResult, PrimitiveFailure, PrimitiveOutcome, argument, receiver};

/// Decode a SmallInteger or LargeInteger operand.
pub(crate) fn to_integer(vm: &Interpreter, oop: Oop) -> Result<BigInt, PrimitiveFailure> {
    if oop.is_small_int() {
        return Ok(BigInt::from(immediate::small_int_value(oop)));
    }
    if !oop.is_pointer() {
        return Err(PrimitiveFailure);
    }
    let obj = vm.memory.heap_object(oop)?;
    let sign = match obj.class_index {
        class_table::LARGE_POSITIVE_INTEGER => Sign::Plus,
        class_table::LARGE_NEGATIVE_INTEGER => Sign::Minus,
        _ => return Err(PrimitiveFailure),
    };
    let magnitude = vm.memory.payload(&obj)?;
    Ok(BigInt::from_bytes_le(sign, magnitude))
}

/// Encode an integer result: SmallInteger when it fits, otherwise a
/// fresh LargeInteger with the sign encoded in the class.
pub(crate) fn integer_result(vm: &mut Interpreter, value: &BigInt) -> Result<Oop, PrimitiveFailure> {
    if let Some(small) = value.to_i64() {
        if (SMALL_INT_MIN..=SMALL_INT_MAX).contains(&small) {
            return Ok(immediate::small_int(small).ok_or(PrimitiveFailure)?);
        }
    }
    let class = if value.is_negative() {
        vm.memory.special(special::CLASS_LARGE_NEGATIVE_INTEGER)?
    } else {
        vm.memory.special(special::CLASS_LARGE_POSITIVE_INTEGER)?
    };
    let (_, bytes) = value.to_bytes_le();
    let oop = vm.memory.allocate(class, bytes.len() as u64)?;
    let obj = vm.memory.heap_object(oop)?;
    vm.memory.payload_mut(&obj)?.copy_from_slice(&bytes);
    Ok(oop)
}

/// Primitives 21-33: LargeInteger arithmetic and comparison.
pub fn large_int_op(vm: &mut Interpreter, number: u16) -> PrimResult {
    let a = to_integer(vm, receiver(vm)?)?;
    let b = to_integer(vm, argument(vm, 0)?)?;
    let value = match number {
        21 => integer_result(vm, &(a + b))?,
        22 => integer_result(vm, &(a - b))?,
        23 => vm.memory.boolean(a < b),
        24 => vm.memory.boolean(a > b),
        25 => vm.memory.boolean(a <= b),
        26 => vm.memory.boolean(a >= b),
        27 => vm.memory.boolean(a == b),
        28 => vm.memory.boolean(a != b),
        29 => integer_result(vm, &(a * b))?,
        30 => {
            if b.is_zero() {
                return Err(PrimitiveFailure);
            }
            let (q, r) = a.div_mod_floor(&b);
            if !r.is_zero() {
                return Err(PrimitiveFailure);
            }
            integer_result(vm, &q)?
        }
        31 => {
            if b.is_zero() {
                return Err(PrimitiveFailure);
            }
            integer_result(vm, &a.mod_floor(&b))?
        }
        32 => {
            if b.is_zero() {
                return Err(PrimitiveFailure);
            }
            integer_result(vm, &a.div_floor(&b))?
        }
        33 => {
            if b.is_zero() {
                return Err(PrimitiveFailure);
            }
            integer_result(vm, &(a / b))?
        }
        _ => return Err(PrimitiveFailure),
    };
    Ok(PrimitiveOutcome::Value(value))
}
