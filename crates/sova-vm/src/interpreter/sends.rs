// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Message sending, method activation and returns.
//!
//! The send protocol: pop arguments and receiver, walk the receiver's
//! class for the selector, then activate the found method with the
//! arguments at the bottom of a fresh context whose sender is the
//! current context. A miss restarts the walk with `doesNotUnderstand:`
//! and a freshly built Message. Returns push the value on the target
//! context's stack and reinstall it; `^` inside a block targets the
//! home context's sender (non-local return), while a block falling off
//! its end returns to its own caller.

use sova_objects::known::{class_table, special};
use sova_objects::oop::Oop;
use tracing::debug;

use crate::context;
use crate::lookup::{self, LookupOutcome};
use crate::memory::ObjectError;
use crate::method::CompiledMethod;

use super::{Interpreter, StepOutcome, VmError};

impl Interpreter {
    /// Pop arguments and receiver, then dispatch `selector`.
    ///
    /// `lookup_class` overrides the start of the walk for super sends.
    pub(crate) fn send_selector(
        &mut self,
        selector: Oop,
        argc: u64,
        lookup_class: Option<Oop>,
    ) -> Result<(), VmError> {
        let mut args = vec![Oop::default(); argc as usize];
        for slot in args.iter_mut().rev() {
            *slot = self.pop()?;
        }
        let receiver = self.pop()?;
        let class = match lookup_class {
            Some(class) => class,
            None => self.memory.class_of(receiver)?,
        };
        let sender = self.current_context();
        self.dispatch_message(receiver, class, selector, &args, sender)
    }

    /// Look up and activate, falling back to `doesNotUnderstand:`.
    pub(crate) fn dispatch_message(
        &mut self,
        receiver: Oop,
        class: Oop,
        selector: Oop,
        args: &[Oop],
        sender: Oop,
    ) -> Result<(), VmError> {
        match lookup::lookup_method(&self.memory, &mut self.cache, class, selector, false)? {
            LookupOutcome::Method(method) => self.activate_method(method, receiver, args, sender),
            LookupOutcome::DoesNotUnderstand => {
                self.does_not_understand(receiver, class, selector, args, sender)
            }
        }
    }

    /// Build a fresh activation for `method` and install it.
    pub(crate) fn activate_method(
        &mut self,
        method_oop: Oop,
        receiver: Oop,
        args: &[Oop],
        sender: Oop,
    ) -> Result<(), VmError> {
        let method = CompiledMethod::decode(&self.memory, method_oop)?;
        let ctx = context::new_activation(&mut self.memory, &method, receiver, args, sender)?;
        self.set_current_context(ctx);
        Ok(())
    }

    /// The `doesNotUnderstand:` protocol: allocate a Message carrying
    /// the missed selector, the arguments and the lookup class, then
    /// re-dispatch with the Message as the only argument.
    fn does_not_understand(
        &mut self,
        receiver: Oop,
        class: Oop,
        selector: Oop,
        args: &[Oop],
        sender: Oop,
    ) -> Result<(), VmError> {
        debug!(
            selector = %self.memory.text(selector).unwrap_or_default(),
            class = %self.memory.class_name(class),
            "doesNotUnderstand:"
        );

        let array_class = super::array_class(&self.memory)?;
        let args_array = self.memory.allocate(array_class, args.len() as u64)?;
        let args_obj = self.memory.heap_object(args_array)?;
        for (i, arg) in args.iter().enumerate() {
            self.memory.slot_put(&args_obj, i as u64, *arg)?;
        }

        let message_class = self.memory.class_at(class_table::MESSAGE)?;
        let message = self.memory.allocate(message_class, 0)?;
        let message_obj = self.memory.heap_object(message)?;
        self.memory.slot_put(&message_obj, context::MESSAGE_SELECTOR, selector)?;
        self.memory.slot_put(&message_obj, context::MESSAGE_ARGS, args_array)?;
        self.memory.slot_put(&message_obj, context::MESSAGE_LOOKUP_CLASS, class)?;

        let dnu_selector = self.memory.special(special::SELECTOR_DOES_NOT_UNDERSTAND)?;
        match lookup::lookup_method(&self.memory, &mut self.cache, class, dnu_selector, true)? {
            LookupOutcome::Method(method) => {
                self.activate_method(method, receiver, &[message], sender)
            }
            LookupOutcome::DoesNotUnderstand => Err(VmError::LookupFailed {
                selector: self.memory.text(selector).unwrap_or_default(),
            }),
        }
    }

    // --- returns ---

    /// Return `value` from the current activation to its caller; `^` in
    /// a block returns from the home method instead (non-local).
    pub(crate) fn method_return(&mut self, value: Oop) -> Result<StepOutcome, VmError> {
        let current = self.current_context();
        let home = context::home(&self.memory, current)?;
        let target = context::sender(&self.memory, home)?;
        self.return_value(value, target)
    }

    /// Opcode 125: return `value` from the block activation to its own
    /// caller. Non-local exits go through `^` (opcode 124), which
    /// unwinds to the home context's sender.
    pub(crate) fn block_return(&mut self, value: Oop) -> Result<StepOutcome, VmError> {
        let current = self.current_context();
        let target = context::sender(&self.memory, current)?;
        self.return_value(value, target)
    }

    /// Push `value` on `target` and install it as current. A nil or
    /// already-returned target halts the program for plain method
    /// chains, or raises `cannotReturn:` for block activations.
    pub(crate) fn return_value(
        &mut self,
        value: Oop,
        target: Oop,
    ) -> Result<StepOutcome, VmError> {
        let current = self.current_context();
        let target_dead =
            target == self.memory.nil() || !context::is_live(&self.memory, target)?;
        if target_dead {
            if context::closure(&self.memory, current)? != self.memory.nil() {
                return self.cannot_return(value);
            }
            context::terminate(&mut self.memory, current)?;
            return Ok(StepOutcome::Halted(value));
        }
        context::terminate(&mut self.memory, current)?;
        context::push(&mut self.memory, target, value)?;
        self.set_current_context(target);
        Ok(StepOutcome::Continue)
    }

    /// Surface a dead-context return to the image by sending
    /// `cannotReturn:` to the violating activation.
    fn cannot_return(&mut self, value: Oop) -> Result<StepOutcome, VmError> {
        let current = self.current_context();
        debug!(context = %current, "return into a dead context");
        let selector = self.memory.special(special::SELECTOR_CANNOT_RETURN)?;
        let class = self.memory.class_of(current)?;
        match lookup::lookup_method(&self.memory, &mut self.cache, class, selector, false)? {
            LookupOutcome::Method(method) => {
                self.activate_method(method, current, &[value], current)?;
                Ok(StepOutcome::Continue)
            }
            LookupOutcome::DoesNotUnderstand => Err(VmError::CannotReturn),
        }
    }

    // --- extended accesses (opcodes 128-130, 132) ---

    /// Extended push: descriptor selects receiver variable, temporary,
    /// literal constant or literal-association value.
    pub(crate) fn extended_push(
        &mut self,
        method: &CompiledMethod,
        descriptor: u8,
    ) -> Result<(), VmError> {
        let index = u64::from(descriptor & 0x3F);
        let value = match descriptor >> 6 {
            0 => {
                let receiver = self.memory.heap_object(context::receiver(
                    &self.memory,
                    self.current_context(),
                )?)?;
                self.memory.slot(&receiver, index)?
            }
            1 => context::temp(&self.memory, self.current_context(), index)?,
            2 => method.literal(&self.memory, index)?,
            _ => {
                let association = method.literal(&self.memory, index)?;
                let obj = self.memory.heap_object(association)?;
                self.memory.slot(&obj, 1)?
            }
        };
        self.push(value)
    }

    /// Extended store: descriptor selects receiver variable, temporary
    /// or literal-association value as the target.
    pub(crate) fn extended_store(
        &mut self,
        method: &CompiledMethod,
        descriptor: u8,
        value: Oop,
    ) -> Result<(), VmError> {
        let index = u64::from(descriptor & 0x3F);
        match descriptor >> 6 {
            0 => {
                let receiver = self.memory.heap_object(context::receiver(
                    &self.memory,
                    self.current_context(),
                )?)?;
                self.memory.slot_put(&receiver, index, value)?;
            }
            1 => {
                let ctx = self.current_context();
                context::temp_put(&mut self.memory, ctx, index, value)?
            }
            3 => {
                let association = method.literal(&self.memory, index)?;
                let obj = self.memory.heap_object(association)?;
                self.memory.slot_put(&obj, 1, value)?;
            }
            target => {
                return Err(VmError::Object(ObjectError::BadImage(match target {
                    2 => "extended store into a constant",
                    _ => "unreachable store target",
                })));
            }
        }
        Ok(())
    }

    /// Opcode 132: two operand bytes select one of eight operations.
    pub(crate) fn double_extended(
        &mut self,
        method: &CompiledMethod,
        pc: u64,
    ) -> Result<StepOutcome, VmError> {
        let first = method.byte_at(&self.memory, pc + 1)?;
        let second = u64::from(method.byte_at(&self.memory, pc + 2)?);
        let operation = first >> 5;
        let ctx = self.current_context();
        context::set_pc(&mut self.memory, ctx, pc + 3)?;
        match operation {
            0 | 1 => {
                let argc = u64::from(first & 0x1F);
                let selector = method.literal(&self.memory, second)?;
                let lookup_class = if operation == 1 {
                    Some(self.method_superclass(method)?)
                } else {
                    None
                };
                self.send_selector(selector, argc, lookup_class)?;
            }
            2 => {
                let receiver = self.memory.heap_object(context::receiver(
                    &self.memory,
                    self.current_context(),
                )?)?;
                let value = self.memory.slot(&receiver, second)?;
                self.push(value)?;
            }
            3 => {
                let value = method.literal(&self.memory, second)?;
                self.push(value)?;
            }
            4 => {
                let association = method.literal(&self.memory, second)?;
                let obj = self.memory.heap_object(association)?;
                let value = self.memory.slot(&obj, 1)?;
                self.push(value)?;
            }
            5 | 6 => {
                let value = if operation == 5 { self.peek()? } else { self.pop()? };
                let receiver = self.memory.heap_object(context::receiver(
                    &self.memory,
                    self.current_context(),
                )?)?;
                self.memory.slot_put(&receiver, second, value)?;
            }
            _ => {
                let value = self.peek()?;
                let association = method.literal(&self.memory, second)?;
                let obj = self.memory.heap_object(association)?;
                self.memory.slot_put(&obj, 1, value)?;
            }
        }
        Ok(StepOutcome::Continue)
    }

    /// The superclass lookups start at for super sends: the superclass
    /// of the class named by the method's last literal.
    pub(crate) fn method_superclass(&self, method: &CompiledMethod) -> Result<Oop, VmError> {
        let association = method.class_association(&self.memory)?;
        let obj = self.memory.heap_object(association)?;
        // the last literal is the defining-class binding; its value slot
        // holds the class
        let defining_class = self.memory.slot(&obj, 1)?;
        let class_obj = self.memory.heap_object(defining_class)?;
        Ok(self.memory.slot(&class_obj, lookup::CLASS_SUPERCLASS)?)
    }
}
