// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The bytecode interpreter.
//!
//! A fetch/decode/execute loop over the V3+Sista bytecode set. Each step
//! first gives the scheduler its fetch-boundary window (timer, queued
//! signals, process switch), then fetches one byte at the current
//! context's pc and dispatches on it. Opcode handlers advance the pc by
//! their own encoding length (1-4 bytes).
//!
//! All interpreter state an image can observe lives in heap objects; the
//! [`Interpreter`] itself only carries the current-context oop, the
//! lookup cache and the VM-side scheduler state.


pub(crate) mod closures;
mod disasm;
mod sends;

use std::collections::BTreeMap;

use sova_objects::immediate;
use sova_objects::known::{class_table, special};
use sova_objects::oop::Oop;
use thiserror::Error;
use tracing::{debug, trace};

use crate::clock;
use crate::context;
use crate::lookup::MethodCache;
use crate::memory::{ObjectError, ObjectMemory};
use crate::method::CompiledMethod;
use crate::scheduler::{self, Scheduler};

pub use disasm::mnemonic;

/// Fatal interpreter errors; recoverable conditions (primitive failure,
/// `doesNotUnderstand:`, cannot-return) are surfaced back to the image
/// instead.
#[derive(Debug, Error)]
pub enum VmError {
    /// The object memory rejected an access.
    #[error(transparent)]
    Object(#[from] ObjectError),
    /// An opcode without a handler was fetched.
    #[error("unknown bytecode {opcode} at pc {pc}")]
    UnknownBytecode {
        /// The opcode byte.
        opcode: u8,
        /// Zero-based body offset it was fetched from.
        pc: u64,
    },
    /// `doesNotUnderstand:` itself was not found; the image is not
    /// properly bootstrapped.
    #[error("selector #{selector} not understood and doesNotUnderstand: is missing")]
    LookupFailed {
        /// The selector that missed.
        selector: String,
    },
    /// A block returned into a dead context and `cannotReturn:` is not
    /// defined either.
    #[error("cannot return from an already-returned context")]
    CannotReturn,
    /// The operand stack outgrew the activation frame.
    #[error("operand stack overflow")]
    StackOverflow,
    /// A process was scheduled whose suspended context is gone.
    #[error("scheduled process has no runnable context")]
    DeadProcess,
    /// The image executed the quit primitive.
    #[error("image requested shutdown")]
    Quit,
}

/// What one interpreter step produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Keep stepping.
    Continue,
    /// The bottom context returned; the value is the program result.
    Halted(Oop),
}

/// The virtual machine: object memory plus interpreter state.
pub struct Interpreter {
    /// The object memory, shared by every Smalltalk process.
    pub memory: ObjectMemory,
    /// The method-lookup cache.
    pub cache: MethodCache,
    /// VM-side scheduling state.
    pub scheduler: Scheduler,
    current_context: Oop,
    params: BTreeMap<i64, Oop>,
    steps: u64,
}

impl Interpreter {
    /// Build an interpreter resuming the image's active process.
    ///
    /// # Errors
    ///
    /// Returns an error when the active process has no suspended
    /// context to resume.
    pub fn new(memory: ObjectMemory) -> Result<Self, VmError> {
        let scheduler_oop = Scheduler::scheduler_oop(&memory)?;
        let scheduler_obj = memory.heap_object(scheduler_oop)?;
        let active = memory.slot(&scheduler_obj, scheduler::SCHEDULER_ACTIVE)?;
        let process = memory.heap_object(active)?;
        let current = memory.slot(&process, scheduler::PROCESS_SUSPENDED_CONTEXT)?;
        if current == memory.nil() {
            return Err(VmError::DeadProcess);
        }

        let mut params = BTreeMap::new();
        params.insert(40, small_int(8)); // word size
        let eden = if memory.eden_bytes() == 0 { 6_854_880 } else { i64::from(memory.eden_bytes()) };
        params.insert(44, small_int(eden));

        Ok(Self {
            memory,
            cache: MethodCache::new(),
            scheduler: Scheduler::new(),
            current_context: current,
            params,
            steps: 0,
        })
    }

    /// The context currently executing.
    #[inline]
    #[must_use]
    pub const fn current_context(&self) -> Oop {
        self.current_context
    }

    /// Install a context as current (activation, return, switch).
    pub(crate) fn set_current_context(&mut self, ctx: Oop) {
        self.current_context = ctx;
    }

    /// Steps executed so far.
    #[inline]
    #[must_use]
    pub const fn steps(&self) -> u64 {
        self.steps
    }

    /// VM-parameter table access (primitive 254).
    pub(crate) fn param(&self, index: i64) -> Option<Oop> {
        self.params.get(&index).copied()
    }

    /// VM-parameter table update (primitive 254).
    pub(crate) fn param_put(&mut self, index: i64, value: Oop) {
        self.params.insert(index, value);
    }

    /// Run until the bottom context returns or `max_steps` is hit
    /// (0 = unbounded). Answers the final value when the program
    /// halted, `None` on a step-limit stop.
    ///
    /// # Errors
    ///
    /// Propagates fatal interpreter errors.
    pub fn run(&mut self, max_steps: u64) -> Result<Option<Oop>, VmError> {
        loop {
            match self.step()? {
                StepOutcome::Continue => {
                    if max_steps != 0 && self.steps >= max_steps {
                        return Ok(None);
                    }
                }
                StepOutcome::Halted(value) => return Ok(Some(value)),
            }
        }
    }

    /// Execute one fetch/decode/execute cycle.
    ///
    /// # Errors
    ///
    /// Propagates fatal interpreter errors. A stack overflow signals the
    /// registered low-space semaphore before surfacing.
    pub fn step(&mut self) -> Result<StepOutcome, VmError> {
        match self.step_inner() {
            Err(VmError::Object(ObjectError::StackOverflow { .. })) => {
                self.scheduler.signal_low_space();
                Err(VmError::StackOverflow)
            }
            other => other,
        }
    }

    fn step_inner(&mut self) -> Result<StepOutcome, VmError> {
        self.check_interrupts()?;
        self.check_process_switch()?;
        self.steps += 1;

        let ctx = self.current_context;
        let method = self.current_method()?;
        let pc = context::pc(&self.memory, ctx)?;
        let opcode = method.byte_at(&self.memory, pc)?;
        trace!(pc, opcode, op = mnemonic(opcode), "fetch");
        self.dispatch(opcode, &method, pc)
    }

    /// The compiled method of the current context.
    ///
    /// # Errors
    ///
    /// Returns an error when the context or method does not decode.
    pub fn current_method(&self) -> Result<CompiledMethod, VmError> {
        let oop = context::method_oop(&self.memory, self.current_context)?;
        Ok(CompiledMethod::decode(&self.memory, oop)?)
    }

    // --- fetch-boundary checks ---

    fn check_interrupts(&mut self) -> Result<(), VmError> {
        self.scheduler.check_timer(&self.memory, clock::utc_microseconds())?;
        self.scheduler.drain_pending(&mut self.memory)?;
        Ok(())
    }

    fn check_process_switch(&mut self) -> Result<(), VmError> {
        let Some(incoming) = self.scheduler.take_new_process() else {
            return Ok(());
        };
        let scheduler_oop = Scheduler::scheduler_oop(&self.memory)?;
        let scheduler_obj = self.memory.heap_object(scheduler_oop)?;
        let outgoing = self.memory.slot(&scheduler_obj, scheduler::SCHEDULER_ACTIVE)?;

        let outgoing_obj = self.memory.heap_object(outgoing)?;
        self.memory.slot_put(
            &outgoing_obj,
            scheduler::PROCESS_SUSPENDED_CONTEXT,
            self.current_context,
        )?;
        self.memory.slot_put(&scheduler_obj, scheduler::SCHEDULER_ACTIVE, incoming)?;

        let incoming_obj = self.memory.heap_object(incoming)?;
        let resumed = self.memory.slot(&incoming_obj, scheduler::PROCESS_SUSPENDED_CONTEXT)?;
        if resumed == self.memory.nil() {
            return Err(VmError::DeadProcess);
        }
        debug!(from = %outgoing, to = %incoming, "process switch");
        self.current_context = resumed;
        Ok(())
    }

    // --- stack shorthand on the current context ---

    pub(crate) fn push(&mut self, value: Oop) -> Result<(), VmError> {
        Ok(context::push(&mut self.memory, self.current_context, value)?)
    }

    pub(crate) fn pop(&mut self) -> Result<Oop, VmError> {
        Ok(context::pop(&mut self.memory, self.current_context)?)
    }

    pub(crate) fn peek(&self) -> Result<Oop, VmError> {
        Ok(context::peek(&self.memory, self.current_context)?)
    }

    fn advance(&mut self, pc: u64, len: u64) -> Result<(), VmError> {
        Ok(context::set_pc(&mut self.memory, self.current_context, pc + len)?)
    }

    fn receiver(&self) -> Result<Oop, VmError> {
        Ok(context::receiver(&self.memory, self.current_context)?)
    }

    // --- dispatch ---

    #[allow(clippy::too_many_lines)]
    fn dispatch(
        &mut self,
        opcode: u8,
        method: &CompiledMethod,
        pc: u64,
    ) -> Result<StepOutcome, VmError> {
        match opcode {
            // push receiver instance variable
            0..=15 => {
                let receiver = self.receiver()?;
                let obj = self.memory.heap_object(receiver)?;
                let value = self.memory.slot(&obj, u64::from(opcode))?;
                self.push(value)?;
                self.advance(pc, 1)?;
                Ok(StepOutcome::Continue)
            }
            // push temporary
            16..=31 => {
                let value = context::temp(&self.memory, self.current_context, u64::from(opcode - 16))?;
                self.push(value)?;
                self.advance(pc, 1)?;
                Ok(StepOutcome::Continue)
            }
            // push literal constant
            32..=63 => {
                let value = method.literal(&self.memory, u64::from(opcode - 32))?;
                self.push(value)?;
                self.advance(pc, 1)?;
                Ok(StepOutcome::Continue)
            }
            // push value of literal association
            64..=95 => {
                let association = method.literal(&self.memory, u64::from(opcode - 64))?;
                let obj = self.memory.heap_object(association)?;
                self.push(self.memory.slot(&obj, 1)?)?;
                self.advance(pc, 1)?;
                Ok(StepOutcome::Continue)
            }
            // pop into receiver instance variable
            96..=103 => {
                let value = self.pop()?;
                let receiver = self.receiver()?;
                let obj = self.memory.heap_object(receiver)?;
                self.memory.slot_put(&obj, u64::from(opcode - 96), value)?;
                self.advance(pc, 1)?;
                Ok(StepOutcome::Continue)
            }
            // pop into temporary
            104..=111 => {
                let value = self.pop()?;
                context::temp_put(&mut self.memory, self.current_context, u64::from(opcode - 104), value)?;
                self.advance(pc, 1)?;
                Ok(StepOutcome::Continue)
            }
            // push receiver
            112 => {
                let receiver = self.receiver()?;
                self.push(receiver)?;
                self.advance(pc, 1)?;
                Ok(StepOutcome::Continue)
            }
            // push true / false / nil
            113 => {
                let value = self.memory.true_oop();
                self.push(value)?;
                self.advance(pc, 1)?;
                Ok(StepOutcome::Continue)
            }
            114 => {
                let value = self.memory.false_oop();
                self.push(value)?;
                self.advance(pc, 1)?;
                Ok(StepOutcome::Continue)
            }
            115 => {
                let value = self.memory.nil();
                self.push(value)?;
                self.advance(pc, 1)?;
                Ok(StepOutcome::Continue)
            }
            // push -1, 0, 1, 2
            116..=119 => {
                let value = i64::from(opcode) - 117;
                let oop = self.memory.interned_small_int(value).unwrap_or_else(|| small_int(value));
                self.push(oop)?;
                self.advance(pc, 1)?;
                Ok(StepOutcome::Continue)
            }
            // return receiver / true / false / nil / top
            120 => {
                let value = self.receiver()?;
                self.method_return(value)
            }
            121 => {
                let value = self.memory.true_oop();
                self.method_return(value)
            }
            122 => {
                let value = self.memory.false_oop();
                self.method_return(value)
            }
            123 => {
                let value = self.memory.nil();
                self.method_return(value)
            }
            124 => {
                let value = self.pop()?;
                self.method_return(value)
            }
            // block return
            125 => {
                let value = self.pop()?;
                self.block_return(value)
            }
            // extended push
            128 => {
                let descriptor = method.byte_at(&self.memory, pc + 1)?;
                self.extended_push(method, descriptor)?;
                self.advance(pc, 2)?;
                Ok(StepOutcome::Continue)
            }
            // extended store / store-pop
            129 | 130 => {
                let descriptor = method.byte_at(&self.memory, pc + 1)?;
                let value = if opcode == 129 { self.peek()? } else { self.pop()? };
                self.extended_store(method, descriptor, value)?;
                self.advance(pc, 2)?;
                Ok(StepOutcome::Continue)
            }
            // single extended send: (argc << 5) | literal index
            131 => {
                let operand = method.byte_at(&self.memory, pc + 1)?;
                self.advance(pc, 2)?;
                let selector = method.literal(&self.memory, u64::from(operand & 0x1F))?;
                self.send_selector(selector, u64::from(operand >> 5), None)?;
                Ok(StepOutcome::Continue)
            }
            // double extended do-anything
            132 => self.double_extended(method, pc),
            // super send: like 131, lookup from the defining class's super
            133 => {
                let operand = method.byte_at(&self.memory, pc + 1)?;
                self.advance(pc, 2)?;
                let selector = method.literal(&self.memory, u64::from(operand & 0x1F))?;
                let superclass = self.method_superclass(method)?;
                self.send_selector(selector, u64::from(operand >> 5), Some(superclass))?;
                Ok(StepOutcome::Continue)
            }
            // second extended send: (argc << 6) | literal index
            134 => {
                let operand = method.byte_at(&self.memory, pc + 1)?;
                self.advance(pc, 2)?;
                let selector = method.literal(&self.memory, u64::from(operand & 0x3F))?;
                self.send_selector(selector, u64::from(operand >> 6), None)?;
                Ok(StepOutcome::Continue)
            }
            // pop
            135 => {
                self.pop()?;
                self.advance(pc, 1)?;
                Ok(StepOutcome::Continue)
            }
            // duplicate top
            136 => {
                let top = self.peek()?;
                self.push(top)?;
                self.advance(pc, 1)?;
                Ok(StepOutcome::Continue)
            }
            // push thisContext
            137 => {
                let ctx = self.current_context;
                self.push(ctx)?;
                self.advance(pc, 1)?;
                Ok(StepOutcome::Continue)
            }
            // create array from top N elements
            138 => {
                let info = method.byte_at(&self.memory, pc + 1)?;
                self.make_array(info)?;
                self.advance(pc, 2)?;
                Ok(StepOutcome::Continue)
            }
            // call primitive
            139 => self.call_primitive(method, pc),
            // remote temp vector ops
            140..=142 => {
                let index = method.byte_at(&self.memory, pc + 1)?;
                let temp = method.byte_at(&self.memory, pc + 2)?;
                self.remote_temp(opcode, u64::from(index), u64::from(temp))?;
                self.advance(pc, 3)?;
                Ok(StepOutcome::Continue)
            }
            // push closure
            143 => self.push_closure(method, pc),
            // short unconditional jump
            144..=151 => {
                let offset = u64::from(opcode) - 143;
                self.advance(pc, 1 + offset)?;
                Ok(StepOutcome::Continue)
            }
            // short jump if false
            152..=159 => {
                let condition = self.pop()?;
                if condition == self.memory.false_oop() {
                    let offset = u64::from(opcode) - 151;
                    self.advance(pc, 1 + offset)?;
                } else {
                    self.advance(pc, 1)?;
                }
                Ok(StepOutcome::Continue)
            }
            // long unconditional jump, signed base-4 with operand byte
            160..=167 => {
                let operand = method.byte_at(&self.memory, pc + 1)?;
                let offset = (i64::from(opcode) - 164) * 256 + i64::from(operand);
                let target = (pc as i64 + 2 + offset) as u64;
                context::set_pc(&mut self.memory, self.current_context, target)?;
                Ok(StepOutcome::Continue)
            }
            // long jump if true
            168..=171 => {
                let operand = method.byte_at(&self.memory, pc + 1)?;
                let condition = self.pop()?;
                if condition == self.memory.true_oop() {
                    let offset = (u64::from(opcode) - 168) * 256 + u64::from(operand);
                    self.advance(pc, 2 + offset)?;
                } else {
                    self.advance(pc, 2)?;
                }
                Ok(StepOutcome::Continue)
            }
            // long jump if false
            172..=175 => {
                let operand = method.byte_at(&self.memory, pc + 1)?;
                let condition = self.pop()?;
                if condition == self.memory.false_oop() {
                    let offset = (u64::from(opcode) - 172) * 256 + u64::from(operand);
                    self.advance(pc, 2 + offset)?;
                } else {
                    self.advance(pc, 2)?;
                }
                Ok(StepOutcome::Continue)
            }
            // special selector sends
            176..=207 => {
                self.advance(pc, 1)?;
                let index = u64::from(opcode - 176) * 2;
                let selectors = self.memory.special(special::SPECIAL_SELECTORS)?;
                let selectors_obj = self.memory.heap_object(selectors)?;
                let selector = self.memory.slot(&selectors_obj, index)?;
                let argc = immediate::small_int_value(self.memory.slot(&selectors_obj, index + 1)?);
                self.send_selector(selector, argc as u64, None)?;
                Ok(StepOutcome::Continue)
            }
            // literal selector sends with 0, 1, 2 arguments
            208..=223 => {
                self.advance(pc, 1)?;
                let selector = method.literal(&self.memory, u64::from(opcode - 208))?;
                self.send_selector(selector, 0, None)?;
                Ok(StepOutcome::Continue)
            }
            224..=239 => {
                self.advance(pc, 1)?;
                let selector = method.literal(&self.memory, u64::from(opcode - 224))?;
                self.send_selector(selector, 1, None)?;
                Ok(StepOutcome::Continue)
            }
            240..=255 => {
                self.advance(pc, 1)?;
                let selector = method.literal(&self.memory, u64::from(opcode - 240))?;
                self.send_selector(selector, 2, None)?;
                Ok(StepOutcome::Continue)
            }
            _ => Err(VmError::UnknownBytecode { opcode, pc }),
        }
    }
}

pub(crate) fn small_int(value: i64) -> Oop {
    immediate::small_int(value).unwrap_or_default()
}

/// Resolve the Array class used for VM-built arrays.
pub(crate) fn array_class(memory: &ObjectMemory) -> Result<Oop, ObjectError> {
    memory
        .class_at(class_table::ARRAY)
        .or_else(|_| memory.special(special::CLASS_ARRAY))
}
