// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Object-level primitives: instantiation, identity, class access and
//! copying.

use sova_objects::immediate;
use sova_objects::known::special;

use crate::interpreter::Interpreter;

use super::{
    PrimResult, PrimitiveFailure, PrimitiveOutcome, argument, expect_small_int, receiver,
    small_int_or_fail,
};

/// Primitive 18: build a Point from the receiver and argument.
pub fn make_point(vm: &mut Interpreter) -> PrimResult {
    let x = receiver(vm)?;
    let y = argument(vm, 0)?;
    let class = vm.memory.special(special::CLASS_POINT)?;
    let point = vm.memory.allocate(class, 0)?;
    let obj = vm.memory.heap_object(point)?;
    vm.memory.slot_put(&obj, 0, x)?;
    vm.memory.slot_put(&obj, 1, y)?;
    Ok(PrimitiveOutcome::Value(point))
}

/// Primitive 70: `basicNew`.
pub fn basic_new(vm: &mut Interpreter) -> PrimResult {
    let class = receiver(vm)?;
    Ok(PrimitiveOutcome::Value(vm.memory.allocate(class, 0)?))
}

/// Primitive 71: `basicNew:`.
pub fn basic_new_sized(vm: &mut Interpreter) -> PrimResult {
    let class = receiver(vm)?;
    let size = expect_small_int(argument(vm, 0)?)?;
    if size < 0 {
        return Err(PrimitiveFailure);
    }
    Ok(PrimitiveOutcome::Value(vm.memory.allocate(class, size as u64)?))
}

/// Primitives 75 and 175: identity hash, lazily assigned.
pub fn identity_hash(vm: &mut Interpreter) -> PrimResult {
    let oop = receiver(vm)?;
    let value = if oop.is_small_int() {
        immediate::small_int_value(oop)
    } else if oop.is_character() {
        i64::from(immediate::character_value(oop))
    } else if oop.is_pointer() {
        i64::from(vm.memory.identity_hash(oop)?)
    } else {
        return Err(PrimitiveFailure);
    };
    Ok(PrimitiveOutcome::Value(small_int_or_fail(value)?))
}

/// Primitive 110: `==`.
pub fn identical(vm: &mut Interpreter) -> PrimResult {
    let a = receiver(vm)?;
    let b = argument(vm, 0)?;
    Ok(PrimitiveOutcome::Value(vm.memory.boolean(a == b)))
}

/// Primitive 111: `class`.
pub fn class_of(vm: &mut Interpreter) -> PrimResult {
    let oop = receiver(vm)?;
    Ok(PrimitiveOutcome::Value(vm.memory.class_of(oop)?))
}

/// Primitive 129: the special objects array.
pub fn special_objects_array(vm: &mut Interpreter) -> PrimResult {
    Ok(PrimitiveOutcome::Value(vm.memory.special_objects()))
}

/// Primitive 148: `shallowCopy`.
///
/// Immediates answer themselves; heap objects get a fresh clone of the
/// same class and size with every body word copied verbatim.
pub fn shallow_copy(vm: &mut Interpreter) -> PrimResult {
    let oop = receiver(vm)?;
    if oop.is_immediate() {
        return Ok(PrimitiveOutcome::Value(oop));
    }
    let source = vm.memory.heap_object(oop)?;
    let class = vm.memory.class_of(oop)?;
    let variable = if source.format.is_pointers() {
        let fixed = vm.memory.class_inst_size(class)?;
        source.slot_count.saturating_sub(fixed)
    } else {
        source.element_count()
    };
    let clone = vm.memory.allocate(class, variable)?;
    let clone_obj = vm.memory.heap_object(clone)?;
    if clone_obj.slot_count != source.slot_count {
        return Err(PrimitiveFailure);
    }
    for i in 0..source.slot_count {
        let word = vm.memory.word(source.body() + i * 8)?;
        vm.memory.word_put(clone_obj.body() + i * 8, word)?;
    }
    Ok(PrimitiveOutcome::Value(clone))
}
