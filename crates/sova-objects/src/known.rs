// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Well-known table indices fixed by the image contract.
//!
//! The class table's first 32 indices are reserved; a handful of classes
//! the VM must recognise by index live there or just above. The special
//! objects array (whose oop the image header carries) exposes the
//! canonical singletons and the classes the VM instantiates itself.

/// Fixed class-table indices.
pub mod class_table {
    /// Index 0 is permanently nil.
    pub const NIL: u32 = 0;
    /// SmallFloat64.
    pub const SMALL_FLOAT: u32 = 4;
    /// SmallInteger.
    pub const SMALL_INTEGER: u32 = 5;
    /// ByteString.
    pub const BYTE_STRING: u32 = 6;
    /// Array.
    pub const ARRAY: u32 = 7;
    /// LargeNegativeInteger.
    pub const LARGE_NEGATIVE_INTEGER: u32 = 32;
    /// LargePositiveInteger.
    pub const LARGE_POSITIVE_INTEGER: u32 = 33;
    /// Message, built by the VM for `doesNotUnderstand:`.
    pub const MESSAGE: u32 = 35;
    /// Context (method and block activations).
    pub const CONTEXT: u32 = 36;
    /// BlockClosure.
    pub const BLOCK_CLOSURE: u32 = 37;
    /// Semaphore.
    pub const SEMAPHORE: u32 = 48;

    /// Indices below this are reserved and must never be overwritten.
    pub const RESERVED_LIMIT: u32 = 32;

    /// Class slots per class-table page.
    pub const PAGE_SIZE: u32 = 1024;
}

/// Fixed special-objects-array indices.
pub mod special {
    /// The nil singleton.
    pub const NIL: usize = 0;
    /// The false singleton.
    pub const FALSE: usize = 1;
    /// The true singleton.
    pub const TRUE: usize = 2;
    /// Association whose value is the ProcessorScheduler singleton.
    pub const SCHEDULER_ASSOCIATION: usize = 3;
    /// Class SmallInteger.
    pub const CLASS_SMALL_INTEGER: usize = 5;
    /// Class ByteString.
    pub const CLASS_BYTE_STRING: usize = 6;
    /// Class Array.
    pub const CLASS_ARRAY: usize = 7;
    /// The SystemDictionary (`Smalltalk`).
    pub const SMALLTALK: usize = 8;
    /// Class BoxedFloat64.
    pub const CLASS_FLOAT: usize = 9;
    /// Class Context.
    pub const CLASS_CONTEXT: usize = 10;
    /// Class Point.
    pub const CLASS_POINT: usize = 12;
    /// Class LargePositiveInteger.
    pub const CLASS_LARGE_POSITIVE_INTEGER: usize = 13;
    /// Class Semaphore.
    pub const CLASS_SEMAPHORE: usize = 18;
    /// Class Character.
    pub const CLASS_CHARACTER: usize = 19;
    /// The `doesNotUnderstand:` selector.
    pub const SELECTOR_DOES_NOT_UNDERSTAND: usize = 20;
    /// The `cannotReturn:` selector.
    pub const SELECTOR_CANNOT_RETURN: usize = 21;
    /// The special-selectors array (selector/arity pairs for the
    /// special-send opcodes).
    pub const SPECIAL_SELECTORS: usize = 23;
    /// The timer semaphore signalled on microsecond wake-ups.
    pub const TIMER_SEMAPHORE: usize = 29;
    /// The user-interrupt semaphore.
    pub const INTERRUPT_SEMAPHORE: usize = 30;
    /// Class LargeNegativeInteger.
    pub const CLASS_LARGE_NEGATIVE_INTEGER: usize = 42;
}
