// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Process and semaphore primitives.
//!
//! These mutate scheduler objects and may mark a process switch; the
//! switch itself only happens at the next fetch boundary, after the
//! primitive has returned its value to the sender.

use sova_objects::known::class_table;

use crate::interpreter::Interpreter;
use crate::scheduler::{PROCESS_MY_LIST, Scheduler};

use super::{PrimResult, PrimitiveFailure, PrimitiveOutcome, receiver};

/// Primitive 85: `signal`.
pub fn semaphore_signal(vm: &mut Interpreter) -> PrimResult {
    let semaphore = receiver(vm)?;
    if vm.memory.heap_object(semaphore)?.class_index != class_table::SEMAPHORE {
        return Err(PrimitiveFailure);
    }
    vm.scheduler.synchronous_signal(&mut vm.memory, semaphore)?;
    Ok(PrimitiveOutcome::Value(semaphore))
}

/// Primitive 86: `wait`.
pub fn semaphore_wait(vm: &mut Interpreter) -> PrimResult {
    let semaphore = receiver(vm)?;
    if vm.memory.heap_object(semaphore)?.class_index != class_table::SEMAPHORE {
        return Err(PrimitiveFailure);
    }
    vm.scheduler.wait(&mut vm.memory, semaphore)?;
    Ok(PrimitiveOutcome::Value(semaphore))
}

/// Primitive 87: `resume`.
pub fn process_resume(vm: &mut Interpreter) -> PrimResult {
    let process = receiver(vm)?;
    vm.scheduler.resume(&mut vm.memory, process)?;
    Ok(PrimitiveOutcome::Value(process))
}

/// Primitive 88: `suspend`.
///
/// Suspending the active process yields the CPU; suspending a waiting
/// process unlinks it from whatever list holds it and answers that
/// list.
pub fn process_suspend(vm: &mut Interpreter) -> PrimResult {
    let process = receiver(vm)?;
    let active = vm.scheduler.active_process(&vm.memory)?;
    if process == active {
        vm.scheduler.suspend_active(&mut vm.memory)?;
        return Ok(PrimitiveOutcome::Value(vm.memory.nil()));
    }
    let process_obj = vm.memory.heap_object(process)?;
    let list = vm.memory.slot(&process_obj, PROCESS_MY_LIST)?;
    Scheduler::remove_link(&mut vm.memory, process)?;
    Ok(PrimitiveOutcome::Value(list))
}

/// Primitive 230: `yield` - give same-priority peers a turn.
pub fn yield_processor(vm: &mut Interpreter) -> PrimResult {
    let active = vm.scheduler.active_process(&vm.memory)?;
    Scheduler::sleep(&mut vm.memory, active)?;
    vm.scheduler.suspend_active(&mut vm.memory)?;
    Ok(PrimitiveOutcome::Value(receiver(vm)?))
}
