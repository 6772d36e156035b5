// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Indexed access primitives: `at:`, `at:put:`, `size`, string access,
//! bulk replacement and compiled-method `objectAt:`.
//!
//! All indices arriving from the image are one-based. Pointer objects
//! index their variable part past the named instance variables; binary
//! objects index elements at the width their format implies.

use num_bigint::BigInt;
use sova_objects::immediate::{self, SMALL_INT_MAX};
use sova_objects::oop::Oop;

use crate::interpreter::Interpreter;
use crate::memory::HeapObject;
use crate::method::CompiledMethod;

use super::{
    PrimResult, PrimitiveFailure, PrimitiveOutcome, argument, expect_small_int, largeint, receiver,
};

/// Named instance variables preceding the indexable part.
fn fixed_slots(vm: &Interpreter, obj: &HeapObject) -> Result<u64, PrimitiveFailure> {
    if obj.format.is_pointers() {
        let class = vm.memory.class_at(obj.class_index)?;
        Ok(vm.memory.class_inst_size(class)?)
    } else {
        Ok(0)
    }
}

/// Number of image-visible elements.
fn indexable_len(vm: &Interpreter, obj: &HeapObject) -> Result<u64, PrimitiveFailure> {
    if !obj.format.is_indexable() {
        return Err(PrimitiveFailure);
    }
    Ok(obj.element_count() - fixed_slots(vm, obj)?)
}

/// Check and rebase a one-based index.
fn rebase_index(index: Oop, len: u64) -> Result<u64, PrimitiveFailure> {
    let i = expect_small_int(index)?;
    if i < 1 || i as u64 > len {
        return Err(PrimitiveFailure);
    }
    Ok(i as u64 - 1)
}

/// Primitive 60: `at:`.
pub fn at(vm: &mut Interpreter) -> PrimResult {
    let obj = vm.memory.heap_object(receiver(vm)?)?;
    let len = indexable_len(vm, &obj)?;
    let i = rebase_index(argument(vm, 0)?, len)?;
    let value = if obj.format.is_pointers() {
        vm.memory.slot(&obj, fixed_slots(vm, &obj)? + i)?
    } else {
        let raw = vm.memory.raw_at(&obj, i)?;
        if raw <= SMALL_INT_MAX as u64 {
            immediate::small_int(raw as i64).ok_or(PrimitiveFailure)?
        } else {
            largeint::integer_result(vm, &BigInt::from(raw))?
        }
    };
    Ok(PrimitiveOutcome::Value(value))
}

/// Primitive 61: `at:put:`.
pub fn at_put(vm: &mut Interpreter) -> PrimResult {
    let obj = vm.memory.heap_object(receiver(vm)?)?;
    let len = indexable_len(vm, &obj)?;
    let i = rebase_index(argument(vm, 0)?, len)?;
    let value = argument(vm, 1)?;
    if obj.format.is_pointers() {
        let slot = fixed_slots(vm, &obj)? + i;
        vm.memory.slot_put(&obj, slot, value)?;
        // installing a compiled method through at:put: is how the image
        // edits method dictionaries; drop every cached lookup
        if value.is_pointer() && vm.memory.heap_object(value)?.format.is_compiled_method() {
            vm.cache.flush();
        }
    } else {
        let raw = expect_small_int(value)?;
        let bits = obj.format.element_bits().ok_or(PrimitiveFailure)?;
        if raw < 0 || (bits < 64 && raw as u64 >= (1 << bits)) {
            return Err(PrimitiveFailure);
        }
        vm.memory.raw_at_put(&obj, i, raw as u64)?;
    }
    Ok(PrimitiveOutcome::Value(value))
}

/// Primitive 62: `size`.
pub fn size(vm: &mut Interpreter) -> PrimResult {
    let obj = vm.memory.heap_object(receiver(vm)?)?;
    let len = indexable_len(vm, &obj)?;
    Ok(PrimitiveOutcome::Value(immediate::small_int(len as i64).ok_or(PrimitiveFailure)?))
}

/// Primitive 63: `at:` on strings, answering a Character.
pub fn string_at(vm: &mut Interpreter) -> PrimResult {
    let obj = vm.memory.heap_object(receiver(vm)?)?;
    if !obj.format.is_binary() {
        return Err(PrimitiveFailure);
    }
    let len = indexable_len(vm, &obj)?;
    let i = rebase_index(argument(vm, 0)?, len)?;
    let code = vm.memory.raw_at(&obj, i)?;
    Ok(PrimitiveOutcome::Value(immediate::character(code as u32)))
}

/// Primitive 64: `at:put:` on strings, taking a Character.
pub fn string_at_put(vm: &mut Interpreter) -> PrimResult {
    let obj = vm.memory.heap_object(receiver(vm)?)?;
    if !obj.format.is_binary() {
        return Err(PrimitiveFailure);
    }
    let len = indexable_len(vm, &obj)?;
    let i = rebase_index(argument(vm, 0)?, len)?;
    let value = argument(vm, 1)?;
    if !value.is_character() {
        return Err(PrimitiveFailure);
    }
    let code = u64::from(immediate::character_value(value));
    let bits = obj.format.element_bits().ok_or(PrimitiveFailure)?;
    if bits < 64 && code >= (1 << bits) {
        return Err(PrimitiveFailure);
    }
    vm.memory.raw_at_put(&obj, i, code)?;
    Ok(PrimitiveOutcome::Value(value))
}

/// Primitive 68: `objectAt:` - compiled-method header and literals.
pub fn object_at(vm: &mut Interpreter) -> PrimResult {
    let method = CompiledMethod::decode(&vm.memory, receiver(vm)?).map_err(|_| PrimitiveFailure)?;
    let i = expect_small_int(argument(vm, 0)?)?;
    if i < 1 || i > i64::from(method.header.num_literals) + 1 {
        return Err(PrimitiveFailure);
    }
    Ok(PrimitiveOutcome::Value(vm.memory.slot(&method.object, i as u64 - 1)?))
}

/// Primitive 105: `replaceFrom:to:with:startingAt:`.
pub fn replace_from_to(vm: &mut Interpreter) -> PrimResult {
    let target = vm.memory.heap_object(receiver(vm)?)?;
    let start = expect_small_int(argument(vm, 0)?)?;
    let stop = expect_small_int(argument(vm, 1)?)?;
    let source_oop = argument(vm, 2)?;
    let source = vm.memory.heap_object(source_oop)?;
    let source_start = expect_small_int(argument(vm, 3)?)?;

    if start < 1 || stop < start - 1 {
        return Err(PrimitiveFailure);
    }
    let count = (stop - start + 1) as u64;
    let target_len = indexable_len(vm, &target)?;
    let source_len = indexable_len(vm, &source)?;
    if start as u64 - 1 + count > target_len || source_start < 1 {
        return Err(PrimitiveFailure);
    }
    if source_start as u64 - 1 + count > source_len {
        return Err(PrimitiveFailure);
    }

    if target.format.is_pointers() && source.format.is_pointers() {
        let target_base = fixed_slots(vm, &target)? + start as u64 - 1;
        let source_base = fixed_slots(vm, &source)? + source_start as u64 - 1;
        for k in 0..count {
            let value = vm.memory.slot(&source, source_base + k)?;
            vm.memory.slot_put(&target, target_base + k, value)?;
        }
    } else if target.format.element_bits() == source.format.element_bits()
        && target.format.is_binary()
    {
        for k in 0..count {
            let value = vm.memory.raw_at(&source, source_start as u64 - 1 + k)?;
            vm.memory.raw_at_put(&target, start as u64 - 1 + k, value)?;
        }
    } else {
        return Err(PrimitiveFailure);
    }
    Ok(PrimitiveOutcome::Value(receiver(vm)?))
}
