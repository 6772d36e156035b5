// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Cooperative process scheduling and semaphores.
//!
//! Smalltalk processes are green threads living entirely in the object
//! memory: the ProcessorScheduler singleton holds one FIFO linked list
//! per priority plus the active process; semaphores queue waiting
//! processes the same way. The interpreter consults this module at every
//! fetch boundary, which is the only point a switch may happen.
//!
//! Signals arriving from outside bytecode (the timer, plugins) are
//! queued in a small VM-owned ring and drained synchronously on the next
//! fetch.


use sova_objects::immediate;
use sova_objects::known::special;
use sova_objects::oop::Oop;
use tracing::{debug, warn};

use crate::memory::{ObjectError, ObjectMemory};

/// Process slot: next link in whatever list the process is on.
pub const PROCESS_NEXT_LINK: u64 = 0;
/// Process slot: the suspended context while not running.
pub const PROCESS_SUSPENDED_CONTEXT: u64 = 1;
/// Process slot: priority (1-based SmallInteger).
pub const PROCESS_PRIORITY: u64 = 2;
/// Process slot: the list the process is currently on, or nil.
pub const PROCESS_MY_LIST: u64 = 3;

/// Linked-list slot: first link.
pub const LIST_FIRST: u64 = 0;
/// Linked-list slot: last link.
pub const LIST_LAST: u64 = 1;

/// Semaphore slot: excess signal count (after the two list links).
pub const SEMAPHORE_EXCESS_SIGNALS: u64 = 2;

/// Scheduler slot: the array of ready lists, indexed by priority - 1.
pub const SCHEDULER_LISTS: u64 = 0;
/// Scheduler slot: the active process.
pub const SCHEDULER_ACTIVE: u64 = 1;

/// Association slot: the value (slot 0 is the key).
const ASSOCIATION_VALUE: u64 = 1;

/// Capacity of the asynchronous-signal ring.
const PENDING_CAPACITY: usize = 64;

/// VM-side scheduling state: everything that is not an object.
pub struct Scheduler {
    /// Process waiting to be installed at the next fetch boundary.
    new_process: Option<Oop>,
    /// Ring of semaphores signalled asynchronously.
    pending: [Oop; PENDING_CAPACITY],
    pending_head: usize,
    pending_len: usize,
    /// Absolute microsecond deadline for the timer semaphore; 0 = none.
    next_wakeup_usecs: u64,
    /// Semaphore to signal when space runs low, when registered.
    low_space_semaphore: Option<Oop>,
    /// Low-space threshold in bytes (informational).
    low_space_threshold: u64,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Create an idle scheduler.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            new_process: None,
            pending: [Oop::new(0); PENDING_CAPACITY],
            pending_head: 0,
            pending_len: 0,
            next_wakeup_usecs: 0,
            low_space_semaphore: None,
            low_space_threshold: 0,
        }
    }

    // --- object-side accessors ---

    /// The ProcessorScheduler singleton (value of the scheduler
    /// association in the special objects array).
    ///
    /// # Errors
    ///
    /// Returns an error when the association does not decode.
    pub fn scheduler_oop(memory: &ObjectMemory) -> Result<Oop, ObjectError> {
        let association = memory.special(special::SCHEDULER_ASSOCIATION)?;
        let obj = memory.heap_object(association)?;
        memory.slot(&obj, ASSOCIATION_VALUE)
    }

    /// The process that will run at the next fetch boundary.
    ///
    /// # Errors
    ///
    /// Returns an error when the scheduler objects do not decode.
    pub fn active_process(&self, memory: &ObjectMemory) -> Result<Oop, ObjectError> {
        if let Some(process) = self.new_process {
            return Ok(process);
        }
        let scheduler = Self::scheduler_oop(memory)?;
        let obj = memory.heap_object(scheduler)?;
        memory.slot(&obj, SCHEDULER_ACTIVE)
    }

    /// A process's priority.
    ///
    /// # Errors
    ///
    /// Returns an error when the process does not decode.
    pub fn priority_of(memory: &ObjectMemory, process: Oop) -> Result<i64, ObjectError> {
        let obj = memory.heap_object(process)?;
        Ok(immediate::small_int_value(memory.slot(&obj, PROCESS_PRIORITY)?))
    }

    // --- linked lists (shared by ready lists and semaphores) ---

    /// Whether a linked list has no links.
    ///
    /// # Errors
    ///
    /// Returns an error when the list does not decode.
    pub fn is_empty_list(memory: &ObjectMemory, list: Oop) -> Result<bool, ObjectError> {
        let obj = memory.heap_object(list)?;
        Ok(memory.slot(&obj, LIST_FIRST)? == memory.nil())
    }

    /// Append a process at the tail of a list and set its `myList`.
    ///
    /// # Errors
    ///
    /// Returns an error when the objects do not decode.
    pub fn add_last_link(
        memory: &mut ObjectMemory,
        list: Oop,
        link: Oop,
    ) -> Result<(), ObjectError> {
        let list_obj = memory.heap_object(list)?;
        if Self::is_empty_list(memory, list)? {
            memory.slot_put(&list_obj, LIST_FIRST, link)?;
        } else {
            let last = memory.slot(&list_obj, LIST_LAST)?;
            let last_obj = memory.heap_object(last)?;
            memory.slot_put(&last_obj, PROCESS_NEXT_LINK, link)?;
        }
        memory.slot_put(&list_obj, LIST_LAST, link)?;
        let link_obj = memory.heap_object(link)?;
        memory.slot_put(&link_obj, PROCESS_MY_LIST, list)
    }

    /// Remove and answer the first link of a non-empty list.
    ///
    /// # Errors
    ///
    /// Returns an error when the objects do not decode.
    pub fn remove_first_link(memory: &mut ObjectMemory, list: Oop) -> Result<Oop, ObjectError> {
        let nil = memory.nil();
        let list_obj = memory.heap_object(list)?;
        let first = memory.slot(&list_obj, LIST_FIRST)?;
        let first_obj = memory.heap_object(first)?;
        let last = memory.slot(&list_obj, LIST_LAST)?;
        if first == last {
            memory.slot_put(&list_obj, LIST_FIRST, nil)?;
            memory.slot_put(&list_obj, LIST_LAST, nil)?;
        } else {
            let next = memory.slot(&first_obj, PROCESS_NEXT_LINK)?;
            memory.slot_put(&list_obj, LIST_FIRST, next)?;
        }
        memory.slot_put(&first_obj, PROCESS_NEXT_LINK, nil)?;
        memory.slot_put(&first_obj, PROCESS_MY_LIST, nil)?;
        Ok(first)
    }

    /// Unlink a process from whatever list it is on.
    ///
    /// Answers whether the process was found on a list.
    ///
    /// # Errors
    ///
    /// Returns an error when the objects do not decode.
    pub fn remove_link(memory: &mut ObjectMemory, process: Oop) -> Result<bool, ObjectError> {
        let nil = memory.nil();
        let process_obj = memory.heap_object(process)?;
        let list = memory.slot(&process_obj, PROCESS_MY_LIST)?;
        if list == nil {
            return Ok(false);
        }
        let list_obj = memory.heap_object(list)?;
        let mut prev = nil;
        let mut link = memory.slot(&list_obj, LIST_FIRST)?;
        while link != nil {
            if link == process {
                let next = memory.slot(&process_obj, PROCESS_NEXT_LINK)?;
                if prev == nil {
                    memory.slot_put(&list_obj, LIST_FIRST, next)?;
                } else {
                    let prev_obj = memory.heap_object(prev)?;
                    memory.slot_put(&prev_obj, PROCESS_NEXT_LINK, next)?;
                }
                if memory.slot(&list_obj, LIST_LAST)? == process {
                    memory.slot_put(&list_obj, LIST_LAST, prev)?;
                }
                memory.slot_put(&process_obj, PROCESS_NEXT_LINK, nil)?;
                memory.slot_put(&process_obj, PROCESS_MY_LIST, nil)?;
                return Ok(true);
            }
            prev = link;
            let link_obj = memory.heap_object(link)?;
            link = memory.slot(&link_obj, PROCESS_NEXT_LINK)?;
        }
        Ok(false)
    }

    // --- scheduling ---

    /// Mark a process to be installed at the next fetch boundary.
    pub fn transfer_to(&mut self, process: Oop) {
        self.new_process = Some(process);
    }

    /// Take the pending process switch, if any.
    pub fn take_new_process(&mut self) -> Option<Oop> {
        self.new_process.take()
    }

    /// Append a process to the ready list of its own priority.
    ///
    /// # Errors
    ///
    /// Returns an error when the scheduler objects do not decode.
    pub fn sleep(memory: &mut ObjectMemory, process: Oop) -> Result<(), ObjectError> {
        let priority = Self::priority_of(memory, process)?;
        let scheduler = Self::scheduler_oop(memory)?;
        let scheduler_obj = memory.heap_object(scheduler)?;
        let lists = memory.slot(&scheduler_obj, SCHEDULER_LISTS)?;
        let lists_obj = memory.heap_object(lists)?;
        let list = memory.slot(&lists_obj, (priority - 1) as u64)?;
        Self::add_last_link(memory, list, process)
    }

    /// Detach the head of the highest-priority non-empty ready list.
    ///
    /// # Errors
    ///
    /// Returns an error when every list is empty (the image must always
    /// keep an idle process runnable).
    pub fn wake_highest_priority(memory: &mut ObjectMemory) -> Result<Oop, ObjectError> {
        let scheduler = Self::scheduler_oop(memory)?;
        let scheduler_obj = memory.heap_object(scheduler)?;
        let lists = memory.slot(&scheduler_obj, SCHEDULER_LISTS)?;
        let lists_obj = memory.heap_object(lists)?;
        let mut priority = lists_obj.slot_count;
        while priority > 0 {
            let list = memory.slot(&lists_obj, priority - 1)?;
            if !Self::is_empty_list(memory, list)? {
                return Self::remove_first_link(memory, list);
            }
            priority -= 1;
        }
        Err(ObjectError::BadImage("no runnable process on any ready list"))
    }

    /// Take the active process off the CPU in favour of the best ready
    /// process.
    ///
    /// # Errors
    ///
    /// Returns an error when the scheduler objects do not decode.
    pub fn suspend_active(&mut self, memory: &mut ObjectMemory) -> Result<(), ObjectError> {
        let next = Self::wake_highest_priority(memory)?;
        self.transfer_to(next);
        Ok(())
    }

    /// Make a process runnable: preempt the active process when the
    /// resumed one has higher priority, otherwise append it to its
    /// ready list.
    ///
    /// # Errors
    ///
    /// Returns an error when the scheduler objects do not decode.
    pub fn resume(&mut self, memory: &mut ObjectMemory, process: Oop) -> Result<(), ObjectError> {
        let active = self.active_process(memory)?;
        let active_priority = Self::priority_of(memory, active)?;
        let new_priority = Self::priority_of(memory, process)?;
        if new_priority > active_priority {
            debug!(active = %active, preempted_by = %process, "priority preemption");
            Self::sleep(memory, active)?;
            self.transfer_to(process);
        } else {
            Self::sleep(memory, process)?;
        }
        Ok(())
    }

    // --- semaphores ---

    /// Synchronous signal: release the first waiter or bank the signal.
    ///
    /// # Errors
    ///
    /// Returns an error when the semaphore does not decode.
    pub fn synchronous_signal(
        &mut self,
        memory: &mut ObjectMemory,
        semaphore: Oop,
    ) -> Result<(), ObjectError> {
        if Self::is_empty_list(memory, semaphore)? {
            let obj = memory.heap_object(semaphore)?;
            let excess = immediate::small_int_value(memory.slot(&obj, SEMAPHORE_EXCESS_SIGNALS)?);
            let bumped = immediate::small_int(excess + 1).unwrap_or_default();
            memory.slot_put(&obj, SEMAPHORE_EXCESS_SIGNALS, bumped)?;
            return Ok(());
        }
        let process = Self::remove_first_link(memory, semaphore)?;
        self.resume(memory, process)
    }

    /// Wait on a semaphore: consume an excess signal or queue the
    /// active process and suspend it.
    ///
    /// # Errors
    ///
    /// Returns an error when the semaphore does not decode.
    pub fn wait(&mut self, memory: &mut ObjectMemory, semaphore: Oop) -> Result<(), ObjectError> {
        let obj = memory.heap_object(semaphore)?;
        let excess = immediate::small_int_value(memory.slot(&obj, SEMAPHORE_EXCESS_SIGNALS)?);
        if excess > 0 {
            let lowered = immediate::small_int(excess - 1).unwrap_or_default();
            memory.slot_put(&obj, SEMAPHORE_EXCESS_SIGNALS, lowered)?;
            return Ok(());
        }
        let active = self.active_process(memory)?;
        Self::add_last_link(memory, semaphore, active)?;
        self.suspend_active(memory)
    }

    /// Queue a signal from outside bytecode (timer, plugins); drained at
    /// the next fetch boundary.
    pub fn asynchronous_signal(&mut self, semaphore: Oop) {
        if self.pending_len == PENDING_CAPACITY {
            warn!(%semaphore, "asynchronous signal ring full, dropping signal");
            return;
        }
        let tail = (self.pending_head + self.pending_len) % PENDING_CAPACITY;
        self.pending[tail] = semaphore;
        self.pending_len += 1;
    }

    /// Drain queued asynchronous signals through
    /// [`Self::synchronous_signal`].
    ///
    /// # Errors
    ///
    /// Returns an error when a queued semaphore does not decode.
    pub fn drain_pending(&mut self, memory: &mut ObjectMemory) -> Result<(), ObjectError> {
        while self.pending_len > 0 {
            let semaphore = self.pending[self.pending_head];
            self.pending_head = (self.pending_head + 1) % PENDING_CAPACITY;
            self.pending_len -= 1;
            self.synchronous_signal(memory, semaphore)?;
        }
        Ok(())
    }

    // --- timer wake-up ---

    /// Arm (or with 0, disarm) the single microsecond wake-up.
    pub fn set_wakeup(&mut self, deadline_usecs: u64) {
        self.next_wakeup_usecs = deadline_usecs;
    }

    /// Fire the timer semaphore when the deadline has passed.
    ///
    /// # Errors
    ///
    /// Returns an error when the special objects array does not decode.
    pub fn check_timer(&mut self, memory: &ObjectMemory, now_usecs: u64) -> Result<(), ObjectError> {
        if self.next_wakeup_usecs == 0 || now_usecs < self.next_wakeup_usecs {
            return Ok(());
        }
        self.next_wakeup_usecs = 0;
        let semaphore = memory.special(special::TIMER_SEMAPHORE)?;
        if semaphore != memory.nil() {
            debug!(%semaphore, "timer wake-up");
            self.asynchronous_signal(semaphore);
        }
        Ok(())
    }

    // --- low space ---

    /// Register the semaphore signalled when space runs out.
    pub fn register_low_space_semaphore(&mut self, semaphore: Oop) {
        self.low_space_semaphore = Some(semaphore);
    }

    /// Record the low-space threshold the image asked for.
    pub fn set_low_space_threshold(&mut self, bytes: u64) {
        self.low_space_threshold = bytes;
    }

    /// Signal the registered low-space semaphore, if any.
    pub fn signal_low_space(&mut self) {
        if let Some(semaphore) = self.low_space_semaphore {
            self.asynchronous_signal(semaphore);
        }
    }
}
