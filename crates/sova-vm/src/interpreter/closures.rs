// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Block closures, array construction, remote temps and the inline
//! primitive-call bytecode.
//!
//! A closure captures its defining context, the pc of its body, its
//! argument count and N copied values. Evaluating one (primitives 201+)
//! activates the outer method's code at the closure's start pc with the
//! stack laid out as `[args..., copied..., outer temps copy]`, so the
//! remote-temp opcodes keep addressing shared state through the
//! captured temp vectors.

use sova_objects::known::class_table;
use sova_objects::oop::Oop;

use crate::context;
use crate::memory::ObjectError;
use crate::method::CompiledMethod;
use crate::primitives::{self, PrimitiveOutcome};

use super::{Interpreter, StepOutcome, VmError};

impl Interpreter {
    /// Opcode 143: build a closure and skip its body.
    ///
    /// Operands: `(copied << 4) | argc`, then a big-endian block size.
    pub(crate) fn push_closure(
        &mut self,
        method: &CompiledMethod,
        pc: u64,
    ) -> Result<StepOutcome, VmError> {
        let info = method.byte_at(&self.memory, pc + 1)?;
        let num_copied = u64::from(info >> 4);
        let num_args = u64::from(info & 0x0F);
        let size_high = method.byte_at(&self.memory, pc + 2)?;
        let size_low = method.byte_at(&self.memory, pc + 3)?;
        let block_size = u64::from(u16::from_be_bytes([size_high, size_low]));

        let mut copied = vec![Oop::default(); num_copied as usize];
        for slot in copied.iter_mut().rev() {
            *slot = self.pop()?;
        }

        let class = self.memory.class_at(class_table::BLOCK_CLOSURE)?;
        let closure = self.memory.allocate(class, num_copied)?;
        let closure_obj = self.memory.heap_object(closure)?;
        self.memory.slot_put(&closure_obj, context::CLOSURE_OUTER, self.current_context())?;
        // start pc is stored one-based, like a context's pc slot
        let start = super::small_int((pc + 4) as i64 + 1);
        self.memory.slot_put(&closure_obj, context::CLOSURE_START_PC, start)?;
        self.memory.slot_put(&closure_obj, context::CLOSURE_NUM_ARGS, super::small_int(num_args as i64))?;
        for (i, value) in copied.iter().enumerate() {
            self.memory.slot_put(&closure_obj, context::CLOSURE_COPIED_BASE + i as u64, *value)?;
        }

        self.push(closure)?;
        // skip the block body
        let ctx = self.current_context();
        context::set_pc(&mut self.memory, ctx, pc + 4 + block_size)?;
        Ok(StepOutcome::Continue)
    }

    /// Build a block activation for primitives 201-204 and 211-222.
    ///
    /// The new context runs the outer method at the closure's start pc,
    /// with the closure in its closure slot and the outer receiver as
    /// receiver. It replaces the `value` activation: its sender is the
    /// current context's sender.
    pub(crate) fn activate_block(
        &mut self,
        closure: Oop,
        args: &[Oop],
    ) -> Result<(), VmError> {
        let closure_obj = self.memory.heap_object(closure)?;
        let outer = self.memory.slot(&closure_obj, context::CLOSURE_OUTER)?;
        let start_pc = self.memory.slot(&closure_obj, context::CLOSURE_START_PC)?;
        let num_copied = closure_obj.slot_count - context::CLOSURE_COPIED_BASE;

        let receiver = context::receiver(&self.memory, outer)?;
        let method_oop = context::method_oop(&self.memory, outer)?;
        let method = CompiledMethod::decode(&self.memory, method_oop)?;

        let sender = context::sender(&self.memory, self.current_context())?;
        let ctx = context::new_activation(&mut self.memory, &method, receiver, args, sender)?;
        context::slot_put(&mut self.memory, ctx, context::CLOSURE, closure)?;
        context::slot_put(&mut self.memory, ctx, context::PC, start_pc)?;

        // stack: args (already placed), copied values, outer temps copy
        let mut height = args.len() as u64;
        for i in 0..num_copied {
            let value = self.memory.slot(&closure_obj, context::CLOSURE_COPIED_BASE + i)?;
            context::temp_put(&mut self.memory, ctx, height, value)?;
            height += 1;
        }
        let outer_args = u64::from(method.header.num_args);
        let outer_temps = u64::from(method.header.num_temps);
        for i in outer_args..outer_temps {
            let value = context::temp(&self.memory, outer, i)?;
            context::temp_put(&mut self.memory, ctx, height, value)?;
            height += 1;
        }
        context::set_stackp(&mut self.memory, ctx, height)?;

        self.set_current_context(ctx);
        Ok(())
    }

    /// Opcode 138: create an array from the top N elements, or push an
    /// array of N nils.
    pub(crate) fn make_array(&mut self, info: u8) -> Result<(), VmError> {
        let size = u64::from(info & 0x7F);
        let pop_elements = info & 0x80 != 0;
        let class = super::array_class(&self.memory)?;
        let array = self.memory.allocate(class, size)?;
        if pop_elements {
            let array_obj = self.memory.heap_object(array)?;
            for i in (0..size).rev() {
                let value = self.pop()?;
                self.memory.slot_put(&array_obj, i, value)?;
            }
        }
        self.push(array)
    }

    /// Opcodes 140-142: push, store or pop-store through a remote temp
    /// vector (an Array held in a temporary).
    pub(crate) fn remote_temp(
        &mut self,
        opcode: u8,
        index: u64,
        temp_index: u64,
    ) -> Result<(), VmError> {
        let vector = context::temp(&self.memory, self.current_context(), temp_index)?;
        let vector_obj = self.memory.heap_object(vector)?;
        match opcode {
            140 => {
                let value = self.memory.slot(&vector_obj, index)?;
                self.push(value)
            }
            141 => {
                let value = self.peek()?;
                Ok(self.memory.slot_put(&vector_obj, index, value)?)
            }
            _ => {
                let value = self.pop()?;
                Ok(self.memory.slot_put(&vector_obj, index, value)?)
            }
        }
    }

    /// Opcode 139: attempt the numbered primitive.
    ///
    /// Success returns to the sender with the result (or keeps the
    /// context an activating primitive installed); failure falls
    /// through to the Smalltalk fallback body after the 3-byte
    /// instruction.
    pub(crate) fn call_primitive(
        &mut self,
        method: &CompiledMethod,
        pc: u64,
    ) -> Result<StepOutcome, VmError> {
        let low = method.byte_at(&self.memory, pc + 1)?;
        let high = method.byte_at(&self.memory, pc + 2)?;
        let number = u16::from_le_bytes([low, high]);
        match primitives::dispatch(self, number) {
            Ok(PrimitiveOutcome::Value(value)) => {
                let target = context::sender(&self.memory, self.current_context())?;
                self.return_value(value, target)
            }
            Ok(PrimitiveOutcome::Activated) => Ok(StepOutcome::Continue),
            Ok(PrimitiveOutcome::Quit) => Err(VmError::Quit),
            Err(primitives::PrimitiveFailure) => {
                tracing::trace!(number, "primitive failed, running fallback");
                let ctx = self.current_context();
                context::set_pc(&mut self.memory, ctx, pc + 3)?;
                Ok(StepOutcome::Continue)
            }
        }
    }
}

/// Number of arguments a closure expects.
pub(crate) fn closure_arg_count(
    memory: &crate::memory::ObjectMemory,
    closure: Oop,
) -> Result<i64, ObjectError> {
    let obj = memory.heap_object(closure)?;
    Ok(sova_objects::immediate::small_int_value(
        memory.slot(&obj, context::CLOSURE_NUM_ARGS)?,
    ))
}
