// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! SmallInteger and float arithmetic primitives.
//!
//! SmallInteger operations (1-17) fail on overflow or a non-SmallInteger
//! operand so the image's LargeInteger fallback code runs. Float
//! operations serve both the boxed range (41-51) and the Sista
//! SmallFloat range (541-551); results come back as SmallFloat64 when
//! the exponent fits and as BoxedFloat64 otherwise.

use sova_objects::immediate;
use sova_objects::known::special;
use sova_objects::oop::Oop;

use crate::interpreter::Interpreter;
use crate::memory::ObjectError;

use super::{
    PrimResult, PrimitiveFailure, PrimitiveOutcome, argument, expect_small_int, receiver,
    small_int_or_fail,
};

/// Floored division, the way `\\` and `//` behave in the image.
const fn floor_div_mod(a: i64, b: i64) -> Option<(i64, i64)> {
    if b == 0 {
        return None;
    }
    let q = a / b;
    let r = a % b;
    if r != 0 && (r < 0) != (b < 0) {
        Some((q - 1, r + b))
    } else {
        Some((q, r))
    }
}

/// Primitives 1-17: SmallInteger arithmetic, comparison and bit ops.
pub fn small_int_op(vm: &mut Interpreter, number: u16) -> PrimResult {
    let a = expect_small_int(receiver(vm)?)?;
    let b = expect_small_int(argument(vm, 0)?)?;
    let value = match number {
        1 => small_int_or_fail(a.checked_add(b).ok_or(PrimitiveFailure)?)?,
        2 => small_int_or_fail(a.checked_sub(b).ok_or(PrimitiveFailure)?)?,
        3 => vm.memory.boolean(a < b),
        4 => vm.memory.boolean(a > b),
        5 => vm.memory.boolean(a <= b),
        6 => vm.memory.boolean(a >= b),
        7 => vm.memory.boolean(a == b),
        8 => vm.memory.boolean(a != b),
        9 => small_int_or_fail(a.checked_mul(b).ok_or(PrimitiveFailure)?)?,
        10 => {
            // exact division only; the fallback builds a Fraction
            let (q, r) = floor_div_mod(a, b).ok_or(PrimitiveFailure)?;
            if r != 0 {
                return Err(PrimitiveFailure);
            }
            small_int_or_fail(q)?
        }
        11 => small_int_or_fail(floor_div_mod(a, b).ok_or(PrimitiveFailure)?.1)?,
        12 => small_int_or_fail(floor_div_mod(a, b).ok_or(PrimitiveFailure)?.0)?,
        13 => {
            if b == 0 {
                return Err(PrimitiveFailure);
            }
            small_int_or_fail(a.wrapping_div(b))?
        }
        14 => small_int_or_fail(a & b)?,
        15 => small_int_or_fail(a | b)?,
        16 => small_int_or_fail(a ^ b)?,
        17 => {
            if b >= 0 {
                if b > 60 {
                    return Err(PrimitiveFailure);
                }
                let shifted = a.checked_shl(b as u32).ok_or(PrimitiveFailure)?;
                // a left shift that cannot be undone overflowed the value
                if (shifted >> b) != a {
                    return Err(PrimitiveFailure);
                }
                small_int_or_fail(shifted)?
            } else {
                let shift = (-b).min(63) as u32;
                small_int_or_fail(a >> shift)?
            }
        }
        _ => return Err(PrimitiveFailure),
    };
    Ok(PrimitiveOutcome::Value(value))
}

/// Primitive 40: SmallInteger receiver as a float.
pub fn small_int_as_float(vm: &mut Interpreter) -> PrimResult {
    let value = expect_small_int(receiver(vm)?)?;
    Ok(PrimitiveOutcome::Value(float_result(vm, value as f64)?))
}

/// Primitives 41-51 / 541-551 (passed rebased to 1-11): float
/// arithmetic and comparison.
pub fn float_op(vm: &mut Interpreter, op: u16) -> PrimResult {
    let a = float_value(vm, receiver(vm)?)?;
    let value = match op {
        1 | 2 | 9 | 10 => {
            let b = float_value(vm, argument(vm, 0)?)?;
            let result = match op {
                1 => a + b,
                2 => a - b,
                9 => a * b,
                _ => {
                    if b == 0.0 {
                        return Err(PrimitiveFailure);
                    }
                    a / b
                }
            };
            float_result(vm, result)?
        }
        3..=8 => {
            let b = float_value(vm, argument(vm, 0)?)?;
            vm.memory.boolean(match op {
                3 => a < b,
                4 => a > b,
                5 => a <= b,
                6 => a >= b,
                7 => a == b,
                _ => a != b,
            })
        }
        11 => {
            let truncated = a.trunc();
            if !truncated.is_finite() {
                return Err(PrimitiveFailure);
            }
            small_int_or_fail(truncated as i64)?
        }
        _ => return Err(PrimitiveFailure),
    };
    Ok(PrimitiveOutcome::Value(value))
}

/// Decode any float receiver: immediate SmallFloat64 or BoxedFloat64.
///
/// Boxed floats store the IEEE double as two 32-bit words in high/low
/// order, or as a single 64-bit word, depending on the class's declared
/// element width.
pub(crate) fn float_value(vm: &Interpreter, oop: Oop) -> Result<f64, PrimitiveFailure> {
    if oop.is_small_float() {
        return Ok(immediate::small_float_value(oop));
    }
    if !oop.is_pointer() {
        return Err(PrimitiveFailure);
    }
    let float_class = vm.memory.special(special::CLASS_FLOAT)?;
    if vm.memory.class_of(oop)? != float_class {
        return Err(PrimitiveFailure);
    }
    let obj = vm.memory.heap_object(oop)?;
    let bits = match obj.format.element_bits() {
        Some(64) => vm.memory.raw_at(&obj, 0)?,
        Some(32) => (vm.memory.raw_at(&obj, 0)? << 32) | vm.memory.raw_at(&obj, 1)?,
        _ => return Err(PrimitiveFailure),
    };
    Ok(f64::from_bits(bits))
}

/// Encode a float result: SmallFloat64 when representable, otherwise a
/// fresh BoxedFloat64.
pub(crate) fn float_result(vm: &mut Interpreter, value: f64) -> Result<Oop, PrimitiveFailure> {
    if let Some(oop) = immediate::small_float(value) {
        return Ok(oop);
    }
    Ok(boxed_float(vm, value)?)
}

/// Allocate a BoxedFloat64 holding `value`.
pub(crate) fn boxed_float(vm: &mut Interpreter, value: f64) -> Result<Oop, ObjectError> {
    let class = vm.memory.special(special::CLASS_FLOAT)?;
    let bits = value.to_bits();
    let oop = match vm.memory.class_inst_format(class)? {
        9 => {
            let oop = vm.memory.allocate(class, 1)?;
            let obj = vm.memory.heap_object(oop)?;
            vm.memory.raw_at_put(&obj, 0, bits)?;
            oop
        }
        _ => {
            let oop = vm.memory.allocate(class, 2)?;
            let obj = vm.memory.heap_object(oop)?;
            vm.memory.raw_at_put(&obj, 0, bits >> 32)?;
            vm.memory.raw_at_put(&obj, 1, bits & 0xFFFF_FFFF)?;
            oop
        }
    };
    Ok(oop)
}
