// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! # Sova object formats
//!
//! Pure data types for the 64-bit Spur object memory format:
//!
//! - Tagged object pointers ([`Oop`]) with the 3-bit tag scheme
//! - Immediate encodings (SmallInteger, Character, SmallFloat64)
//! - The 8-byte object header and its overflow variant
//! - The 5-bit object-format code families
//! - The compiled-method header word
//! - Well-known class-table and special-objects-array indices
//!
//! Everything here is a function of bits; nothing touches an object
//! space. The `sova-vm` crate layers memory access, interpretation and
//! scheduling on top.

pub mod format;
pub mod header;
pub mod immediate;
pub mod known;
pub mod method;
pub mod oop;

pub use format::ObjectFormat;
pub use header::{OVERFLOW_SLOT_COUNT, ObjectHeader, overflow_slot_count, overflow_word};
pub use immediate::{SMALL_INT_MAX, SMALL_INT_MIN};
pub use method::MethodHeader;
pub use oop::Oop;
