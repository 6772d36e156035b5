// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Compiled-method access.
//!
//! A compiled method is a binary object (format 24-31) whose body holds
//! the header word, the literal frame (pointer slots), the bytecode, and
//! a trailer. This module gives the interpreter a typed view: literals
//! by index, bytecode bytes by zero-based body offset, the primitive
//! number, and the trailer span so the bytecode end is known.


use sova_objects::MethodHeader;
use sova_objects::oop::Oop;
use sova_objects::immediate;

use crate::memory::{HeapObject, ObjectError, ObjectMemory};

/// The `callPrimitive` opcode that leads a primitive method's body.
pub const CALL_PRIMITIVE: u8 = 139;

/// A decoded compiled method.
#[derive(Debug, Clone, Copy)]
pub struct CompiledMethod {
    /// The method's oop.
    pub oop: Oop,
    /// The underlying heap object.
    pub object: HeapObject,
    /// The decoded header word (slot 0).
    pub header: MethodHeader,
}

impl CompiledMethod {
    /// Decode a method from its oop.
    ///
    /// # Errors
    ///
    /// Returns an error when the oop is not a compiled-method object.
    pub fn decode(memory: &ObjectMemory, oop: Oop) -> Result<Self, ObjectError> {
        let object = memory.heap_object(oop)?;
        if !object.format.is_compiled_method() {
            return Err(ObjectError::NotAHeapObject { bits: oop.bits() });
        }
        let header_word = memory.slot(&object, 0)?;
        let header = MethodHeader::decode(immediate::small_int_value(header_word));
        Ok(Self { oop, object, header })
    }

    /// Read literal `i` (0-based; literal 0 follows the header slot).
    ///
    /// # Errors
    ///
    /// Returns an error when the index runs past the literal frame.
    pub fn literal(&self, memory: &ObjectMemory, i: u64) -> Result<Oop, ObjectError> {
        if i >= u64::from(self.header.num_literals) {
            return Err(ObjectError::SlotOutOfRange {
                index: i + 1,
                count: u64::from(self.header.num_literals) + 1,
            });
        }
        memory.slot(&self.object, i + 1)
    }

    /// The association/class literal that names the defining class
    /// (by convention the last literal).
    ///
    /// # Errors
    ///
    /// Returns an error on a method without literals.
    pub fn class_association(&self, memory: &ObjectMemory) -> Result<Oop, ObjectError> {
        self.literal(memory, u64::from(self.header.num_literals) - 1)
    }

    /// Byte length of the method body, trailer included.
    #[must_use]
    pub fn byte_size(&self) -> u64 {
        self.object.byte_len()
    }

    /// Zero-based body offset of the first bytecode.
    #[inline]
    #[must_use]
    pub const fn initial_pc(&self) -> u64 {
        self.header.initial_pc()
    }

    /// Fetch the bytecode byte at a zero-based body offset.
    ///
    /// # Errors
    ///
    /// Returns an error when the offset leaves the object.
    pub fn byte_at(&self, memory: &ObjectMemory, pc: u64) -> Result<u8, ObjectError> {
        if pc >= self.byte_size() {
            return Err(ObjectError::ElementOutOfRange { index: pc, len: self.byte_size() });
        }
        memory.byte(self.object.body() + pc)
    }

    /// The primitive number, or 0 when the method has none.
    ///
    /// The number is encoded little-endian in the two operand bytes of
    /// the `callPrimitive` bytecode at the start of the body.
    ///
    /// # Errors
    ///
    /// Returns an error when the method object is malformed.
    pub fn primitive_number(&self, memory: &ObjectMemory) -> Result<u16, ObjectError> {
        if !self.header.has_primitive {
            return Ok(0);
        }
        let pc = self.initial_pc();
        if self.byte_at(memory, pc)? != CALL_PRIMITIVE {
            return Ok(0);
        }
        let low = self.byte_at(memory, pc + 1)?;
        let high = self.byte_at(memory, pc + 2)?;
        Ok(u16::from_le_bytes([low, high]))
    }

    /// Byte length of the trailer, decoded from its flag byte.
    ///
    /// The final byte's top six bits select the trailer kind; length-
    /// prefixed kinds store their byte count in the low two bits, the
    /// variable-length source pointer is a little-endian base-128
    /// sequence read backwards.
    ///
    /// # Errors
    ///
    /// Returns an error when the method object is malformed.
    pub fn trailer_size(&self, memory: &ObjectMemory) -> Result<u64, ObjectError> {
        let size = self.byte_size();
        if size == 0 {
            return Ok(0);
        }
        let flag = self.byte_at(memory, size - 1)?;
        let kind = flag >> 2;
        match kind {
            0b00_0000 | 0b00_0100 => Ok(1),
            0b00_0001..=0b00_0011 | 0b00_0101..=0b00_0111 => {
                let num_bytes = u64::from(flag & 0x03);
                let mut length: u64 = 0;
                for i in 0..num_bytes {
                    length = (length << 8) | u64::from(self.byte_at(memory, size - 2 - i)?);
                }
                Ok(length + num_bytes + 1)
            }
            0b00_1000 => {
                // variable-length source pointer, 7 bits per byte
                let mut pos = size - 2;
                let mut trailer = 2;
                while self.byte_at(memory, pos)? > 127 {
                    if pos == 0 {
                        break;
                    }
                    pos -= 1;
                    trailer += 1;
                }
                Ok(trailer)
            }
            0b00_1001 => Ok(2),
            _ => Ok(4),
        }
    }

    /// One-past-the-end body offset of the bytecode.
    ///
    /// # Errors
    ///
    /// Returns an error when the trailer cannot be decoded.
    pub fn bytecode_end(&self, memory: &ObjectMemory) -> Result<u64, ObjectError> {
        Ok(self.byte_size() - self.trailer_size(memory)?)
    }
}
