// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The MiscPrimitivePlugin: string hashing and comparison.

use crate::interpreter::Interpreter;
use crate::primitives::{
    PrimResult, PrimitiveFailure, PrimitiveOutcome, argument, expect_small_int, receiver,
    small_int_or_fail,
};

/// Route a MiscPrimitivePlugin function by name.
pub fn call(vm: &mut Interpreter, function: &str) -> PrimResult {
    match function {
        "primitiveStringHash" => string_hash(vm),
        "primitiveCompareString" => compare_string(vm),
        _ => Err(PrimitiveFailure),
    }
}

/// `primitiveStringHash`: the image's incremental string hash, seeded
/// with the species hash and folded to 28 bits.
fn string_hash(vm: &mut Interpreter) -> PrimResult {
    // receiver is the species class; the string and seed are arguments
    let _ = receiver(vm)?;
    let string_obj = vm.memory.heap_object(argument(vm, 0)?)?;
    let bytes = vm.memory.payload(&string_obj)?.to_vec();
    let seed = expect_small_int(argument(vm, 1)?)?;

    let mut hash: u64 = (seed as u64) & 0x0FFF_FFFF;
    for byte in bytes {
        hash += u64::from(byte);
        let low = hash & 16383;
        hash = (0x260D * low + ((0x260D * (hash >> 14) + (0x0065 * low) & 16383) * 16384))
            & 0x0FFF_FFFF;
    }
    Ok(PrimitiveOutcome::Value(small_int_or_fail(hash as i64)?))
}

/// `primitiveCompareString`: 1, 2 or 3 for less, equal, greater.
fn compare_string(vm: &mut Interpreter) -> PrimResult {
    let _ = receiver(vm)?;
    let first = vm.memory.heap_object(argument(vm, 0)?)?;
    let second = vm.memory.heap_object(argument(vm, 1)?)?;
    let a = vm.memory.payload(&first)?;
    let b = vm.memory.payload(&second)?;
    let order = match a.cmp(b) {
        core::cmp::Ordering::Less => 1,
        core::cmp::Ordering::Equal => 2,
        core::cmp::Ordering::Greater => 3,
    };
    Ok(PrimitiveOutcome::Value(small_int_or_fail(order)?))
}
