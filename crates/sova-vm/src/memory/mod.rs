// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The Spur object memory.
//!
//! The memory simulates the address space the image was saved in: the
//! object space sits at the image's old base address, so the absolute
//! pointers inside objects stay valid without rewriting. Below it a
//! young region is reserved for new objects, handed out by a bump
//! allocator that never frees (no GC in this VM; contexts leak by
//! design).
//!
//! ```text
//! window_base          old_base                    heap_end
//!   │  young region ▲     │   image objects           │
//!   └────────────────bump─┴───────────────────────────┘
//! ```
//!
//! All access goes through oops; decoding an oop yields either an
//! immediate value or a [`HeapObject`] view carrying the decoded header.


use sova_objects::format::ObjectFormat;
use sova_objects::header::{ObjectHeader, overflow_slot_count, overflow_word};
use sova_objects::immediate;
use sova_objects::known::{class_table, special};
use sova_objects::oop::{Oop, Tag};
use thiserror::Error;

use crate::image::Image;

/// Bytes reserved below the image for the young region when the image
/// base allows it.
const YOUNG_RESERVE: u64 = 64 * 1024 * 1024;

/// Range of pre-interned SmallIntegers.
const INTERN_MIN: i64 = -255;
const INTERN_MAX: i64 = 254;

/// Error decoding or mutating the object memory.
#[derive(Debug, Error)]
pub enum ObjectError {
    /// An address fell outside the simulated space.
    #[error("address {addr:#x} outside object memory")]
    AddressOutOfBounds {
        /// The offending address.
        addr: u64,
    },
    /// An oop with a reserved tag was encountered.
    #[error("oop {bits:#x} carries a reserved tag")]
    ReservedTag {
        /// The raw oop word.
        bits: u64,
    },
    /// A heap operation was applied to an immediate.
    #[error("oop {bits:#x} is an immediate, not a heap object")]
    NotAHeapObject {
        /// The raw oop word.
        bits: u64,
    },
    /// An object header carried a reserved format code.
    #[error("object at {addr:#x} has reserved format code {code}")]
    BadFormat {
        /// Address of the object.
        addr: u64,
        /// The reserved code.
        code: u8,
    },
    /// A pointer-slot index was out of range.
    #[error("slot {index} out of range for object with {count} slots")]
    SlotOutOfRange {
        /// Requested slot.
        index: u64,
        /// Available slots.
        count: u64,
    },
    /// A raw element index was out of range.
    #[error("element {index} out of range for {len} elements")]
    ElementOutOfRange {
        /// Requested element.
        index: u64,
        /// Available elements.
        len: u64,
    },
    /// Raw element access on a pure pointer object.
    #[error("object at {addr:#x} has no binary elements")]
    NotBinary {
        /// Address of the object.
        addr: u64,
    },
    /// The young region is exhausted.
    #[error("young region exhausted allocating {requested} bytes")]
    OutOfMemory {
        /// Bytes requested.
        requested: u64,
    },
    /// A context push ran past the activation frame.
    #[error("operand stack overflow in context at {ctx:#x}")]
    StackOverflow {
        /// Address of the context.
        ctx: u64,
    },
    /// A context pop found an empty stack.
    #[error("operand stack underflow in context at {ctx:#x}")]
    StackUnderflow {
        /// Address of the context.
        ctx: u64,
    },
    /// A class-table index resolved to nil.
    #[error("class table has no class at index {index}")]
    ClassTableHole {
        /// The empty index.
        index: u32,
    },
    /// The object graph around the special objects array is inconsistent.
    #[error("inconsistent image: {0}")]
    BadImage(&'static str),
}

/// A decoded view of one heap object.
///
/// The view caches the header fields; it stays valid because objects
/// never move (bump allocation, no GC). The slot count is the resolved
/// one, overflow header applied.
#[derive(Debug, Clone, Copy)]
pub struct HeapObject {
    /// The object's oop (nominal address).
    pub oop: Oop,
    /// Class-table index from the header.
    pub class_index: u32,
    /// Decoded layout family.
    pub format: ObjectFormat,
    /// Identity hash field (0 = not yet assigned).
    pub hash: u32,
    /// Resolved slot count in 64-bit words.
    pub slot_count: u64,
}

impl HeapObject {
    /// Address of the object's first slot.
    #[inline]
    #[must_use]
    pub const fn body(&self) -> u64 {
        self.oop.address() + 8
    }

    /// Byte length of the binary payload (padding removed).
    #[must_use]
    pub fn byte_len(&self) -> u64 {
        let bits = self.format.element_bits().unwrap_or(64);
        self.slot_count * 8 - self.format.trailing_unused() * u64::from(bits / 8)
    }

    /// Number of indexable elements for binary formats.
    #[must_use]
    pub fn element_count(&self) -> u64 {
        match self.format.element_bits() {
            Some(bits) => self.slot_count * (64 / u64::from(bits)) - self.format.trailing_unused(),
            None => self.slot_count,
        }
    }
}

/// What an oop decodes to.
#[derive(Debug, Clone, Copy)]
pub enum ObjectRef {
    /// An immediate SmallInteger.
    SmallInt(i64),
    /// An immediate Character codepoint.
    Character(u32),
    /// An immediate SmallFloat64.
    SmallFloat(f64),
    /// A heap object.
    Object(HeapObject),
}

/// The simulated address space plus allocation state.
pub struct ObjectMemory {
    bytes: Vec<u8>,
    /// First simulated address (start of the young region).
    window_base: u64,
    /// Image objects start here.
    old_base: u64,
    /// End of the image object space.
    heap_end: u64,
    /// Next free young address.
    young_next: u64,
    special_oop: Oop,
    class_table_oop: Oop,
    nil_oop: Oop,
    false_oop: Oop,
    true_oop: Oop,
    last_hash: u32,
    eden_bytes: u32,
    interned_ints: Vec<Oop>,
}

impl ObjectMemory {
    /// Build the memory from a loaded image.
    ///
    /// # Errors
    ///
    /// Returns an error when the object graph around the special objects
    /// array does not decode (a `BadImage` condition: the VM aborts
    /// before interpreting).
    pub fn from_image(image: &Image) -> Result<Self, ObjectError> {
        let old_base = image.header.old_base_address;
        let heap_end = old_base + image.header.data_size;
        let window_base = if old_base > YOUNG_RESERVE { old_base - YOUNG_RESERVE } else { 8 };

        let mut bytes = vec![0u8; (heap_end - window_base) as usize];
        bytes[(old_base - window_base) as usize..].copy_from_slice(&image.object_space);

        let mut memory = Self {
            bytes,
            window_base,
            old_base,
            heap_end,
            young_next: window_base,
            special_oop: Oop::from_address(image.header.special_objects_oop),
            class_table_oop: Oop::default(),
            nil_oop: Oop::default(),
            false_oop: Oop::default(),
            true_oop: Oop::default(),
            last_hash: (image.header.last_hash as u32) & 0x3F_FFFF,
            eden_bytes: image.header.eden_bytes,
            interned_ints: Vec::new(),
        };
        memory.bootstrap()?;
        Ok(memory)
    }

    /// Resolve the canonical singletons and the class table.
    ///
    /// The class table (hidden roots) is the object following the
    /// free-list object, which itself follows `true` in the image.
    fn bootstrap(&mut self) -> Result<(), ObjectError> {
        self.nil_oop = self.special(special::NIL)?;
        self.false_oop = self.special(special::FALSE)?;
        self.true_oop = self.special(special::TRUE)?;

        let true_obj = self.heap_object(self.true_oop)?;
        let free_list = self.next_object_addr(&true_obj)?;
        let free_obj = self.heap_object(Oop::from_address(free_list))?;
        let table_addr = self.object_end(&free_obj) + 8;
        self.class_table_oop = Oop::from_address(table_addr);
        let table = self.heap_object(self.class_table_oop)?;
        if !table.format.is_pointers() {
            return Err(ObjectError::BadImage("class table is not a pointer object"));
        }

        self.interned_ints = (INTERN_MIN..=INTERN_MAX)
            .map(|i| immediate::small_int(i).unwrap_or_default())
            .collect();
        Ok(())
    }

    // --- raw word access ---

    fn index_of(&self, addr: u64, len: u64) -> Result<usize, ObjectError> {
        let end = addr.checked_add(len).ok_or(ObjectError::AddressOutOfBounds { addr })?;
        if addr < self.window_base || end > self.window_base + self.bytes.len() as u64 {
            return Err(ObjectError::AddressOutOfBounds { addr });
        }
        Ok((addr - self.window_base) as usize)
    }

    /// Read a 64-bit little-endian word.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is outside the simulated space.
    pub fn word(&self, addr: u64) -> Result<u64, ObjectError> {
        let i = self.index_of(addr, 8)?;
        Ok(u64::from_le_bytes(self.bytes[i..i + 8].try_into().unwrap_or([0; 8])))
    }

    /// Write a 64-bit little-endian word.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is outside the simulated space.
    pub fn word_put(&mut self, addr: u64, value: u64) -> Result<(), ObjectError> {
        let i = self.index_of(addr, 8)?;
        self.bytes[i..i + 8].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Read one byte.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is outside the simulated space.
    pub fn byte(&self, addr: u64) -> Result<u8, ObjectError> {
        let i = self.index_of(addr, 1)?;
        Ok(self.bytes[i])
    }

    /// Borrow a byte range.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is outside the simulated space.
    pub fn byte_range(&self, addr: u64, len: u64) -> Result<&[u8], ObjectError> {
        let i = self.index_of(addr, len)?;
        Ok(&self.bytes[i..i + len as usize])
    }

    /// Borrow a mutable byte range.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is outside the simulated space.
    pub fn byte_range_mut(&mut self, addr: u64, len: u64) -> Result<&mut [u8], ObjectError> {
        let i = self.index_of(addr, len)?;
        Ok(&mut self.bytes[i..i + len as usize])
    }

    // --- oop decoding ---

    /// Decode an oop into an immediate value or a heap-object view.
    ///
    /// Idempotent: the same oop always decodes to the same logical
    /// reference.
    ///
    /// # Errors
    ///
    /// Returns an error for reserved tags or undecodable headers.
    pub fn object_ref(&self, oop: Oop) -> Result<ObjectRef, ObjectError> {
        match oop.tag() {
            Some(Tag::SmallInteger) => Ok(ObjectRef::SmallInt(immediate::small_int_value(oop))),
            Some(Tag::Character) => Ok(ObjectRef::Character(immediate::character_value(oop))),
            Some(Tag::SmallFloat) => Ok(ObjectRef::SmallFloat(immediate::small_float_value(oop))),
            Some(Tag::Pointer) => Ok(ObjectRef::Object(self.heap_object(oop)?)),
            None => Err(ObjectError::ReservedTag { bits: oop.bits() }),
        }
    }

    /// Decode a pointer oop into a heap-object view.
    ///
    /// # Errors
    ///
    /// Returns an error for immediates, reserved format codes, or
    /// addresses outside the space.
    pub fn heap_object(&self, oop: Oop) -> Result<HeapObject, ObjectError> {
        if !oop.is_pointer() {
            return Err(ObjectError::NotAHeapObject { bits: oop.bits() });
        }
        let addr = oop.address();
        let header = ObjectHeader::decode(self.word(addr)?);
        let format = ObjectFormat::from_code(header.format)
            .ok_or(ObjectError::BadFormat { addr, code: header.format })?;
        let slot_count = if header.has_overflow() {
            overflow_slot_count(self.word(addr - 8)?)
        } else {
            u64::from(header.slot_count_byte)
        };
        Ok(HeapObject { oop, class_index: header.class_index, format, hash: header.hash, slot_count })
    }

    // --- slot & element access ---

    /// Read pointer slot `i` of an object.
    ///
    /// # Errors
    ///
    /// Returns an error when the index is out of range.
    pub fn slot(&self, obj: &HeapObject, i: u64) -> Result<Oop, ObjectError> {
        if i >= obj.slot_count {
            return Err(ObjectError::SlotOutOfRange { index: i, count: obj.slot_count });
        }
        Ok(Oop::new(self.word(obj.body() + i * 8)?))
    }

    /// Write pointer slot `i` of an object.
    ///
    /// # Errors
    ///
    /// Returns an error when the index is out of range.
    pub fn slot_put(&mut self, obj: &HeapObject, i: u64, value: Oop) -> Result<(), ObjectError> {
        if i >= obj.slot_count {
            return Err(ObjectError::SlotOutOfRange { index: i, count: obj.slot_count });
        }
        self.word_put(obj.body() + i * 8, value.bits())
    }

    /// Read raw element `i` at the element width implied by the format.
    ///
    /// # Errors
    ///
    /// Returns an error on pointer objects or out-of-range indices.
    pub fn raw_at(&self, obj: &HeapObject, i: u64) -> Result<u64, ObjectError> {
        let bits = obj
            .format
            .element_bits()
            .ok_or(ObjectError::NotBinary { addr: obj.oop.address() })?;
        let len = obj.element_count();
        if i >= len {
            return Err(ObjectError::ElementOutOfRange { index: i, len });
        }
        let width = u64::from(bits / 8);
        let bytes = self.byte_range(obj.body() + i * width, width)?;
        let mut word = [0u8; 8];
        word[..bytes.len()].copy_from_slice(bytes);
        Ok(u64::from_le_bytes(word))
    }

    /// Write raw element `i` at the element width implied by the format.
    ///
    /// # Errors
    ///
    /// Returns an error on pointer objects or out-of-range indices.
    pub fn raw_at_put(&mut self, obj: &HeapObject, i: u64, value: u64) -> Result<(), ObjectError> {
        let bits = obj
            .format
            .element_bits()
            .ok_or(ObjectError::NotBinary { addr: obj.oop.address() })?;
        let len = obj.element_count();
        if i >= len {
            return Err(ObjectError::ElementOutOfRange { index: i, len });
        }
        let width = (bits / 8) as usize;
        let encoded = value.to_le_bytes();
        let dest = self.byte_range_mut(obj.body() + i * width as u64, width as u64)?;
        dest.copy_from_slice(&encoded[..width]);
        Ok(())
    }

    /// Borrow the binary payload of an object.
    ///
    /// # Errors
    ///
    /// Returns an error on pointer objects.
    pub fn payload(&self, obj: &HeapObject) -> Result<&[u8], ObjectError> {
        if !obj.format.is_binary() {
            return Err(ObjectError::NotBinary { addr: obj.oop.address() });
        }
        self.byte_range(obj.body(), obj.byte_len())
    }

    /// Borrow the binary payload of an object mutably.
    ///
    /// # Errors
    ///
    /// Returns an error on pointer objects.
    pub fn payload_mut(&mut self, obj: &HeapObject) -> Result<&mut [u8], ObjectError> {
        if !obj.format.is_binary() {
            return Err(ObjectError::NotBinary { addr: obj.oop.address() });
        }
        let len = obj.byte_len();
        self.byte_range_mut(obj.body(), len)
    }

    /// Decode a byte object as text (lossy, for selectors and tracing).
    ///
    /// # Errors
    ///
    /// Returns an error on pointer objects.
    pub fn text(&self, oop: Oop) -> Result<String, ObjectError> {
        let obj = self.heap_object(oop)?;
        Ok(String::from_utf8_lossy(self.payload(&obj)?).into_owned())
    }

    // --- heap walking ---

    /// First address past the object's rounded-up extent.
    #[must_use]
    pub fn object_end(&self, obj: &HeapObject) -> u64 {
        obj.body() + obj.slot_count.max(1) * 8
    }

    /// Nominal address of the next object in a linear walk.
    ///
    /// Skips the following object's overflow header when present.
    ///
    /// # Errors
    ///
    /// Returns an error when the peek runs outside the space.
    pub fn next_object_addr(&self, obj: &HeapObject) -> Result<u64, ObjectError> {
        let end = self.object_end(obj);
        if end + 8 > self.heap_end {
            return Ok(end);
        }
        let peek = ObjectHeader::decode(self.word(end)?);
        if peek.has_overflow() { Ok(end + 8) } else { Ok(end) }
    }

    /// Walk the image portion of the heap from its first object.
    ///
    /// Yields every object exactly once, in address order, stopping at
    /// the end of the image object space.
    ///
    /// # Errors
    ///
    /// The iterator yields an error if a header fails to decode.
    pub fn heap_walk(&self) -> HeapWalk<'_> {
        HeapWalk { memory: self, next: self.old_base }
    }

    // --- class table ---

    /// Resolve a class-table index through the two-level table.
    ///
    /// # Errors
    ///
    /// Returns an error for empty pages or out-of-range indices.
    pub fn class_at(&self, index: u32) -> Result<Oop, ObjectError> {
        let table = self.heap_object(self.class_table_oop)?;
        let page_oop = self.slot(&table, u64::from(index / class_table::PAGE_SIZE))?;
        if page_oop == self.nil_oop {
            return Err(ObjectError::ClassTableHole { index });
        }
        let page = self.heap_object(page_oop)?;
        let class = self.slot(&page, u64::from(index % class_table::PAGE_SIZE))?;
        if class == self.nil_oop {
            return Err(ObjectError::ClassTableHole { index });
        }
        Ok(class)
    }

    /// The class of any oop, immediates included.
    ///
    /// # Errors
    ///
    /// Returns an error when the class table has no entry.
    pub fn class_of(&self, oop: Oop) -> Result<Oop, ObjectError> {
        match oop.tag() {
            Some(Tag::SmallInteger) => self.class_at(class_table::SMALL_INTEGER),
            Some(Tag::SmallFloat) => self.class_at(class_table::SMALL_FLOAT),
            Some(Tag::Character) => self.special(special::CLASS_CHARACTER),
            Some(Tag::Pointer) => {
                let obj = self.heap_object(oop)?;
                self.class_at(obj.class_index)
            }
            None => Err(ObjectError::ReservedTag { bits: oop.bits() }),
        }
    }

    /// Named instance-variable count a class declares for its instances.
    ///
    /// # Errors
    ///
    /// Returns an error if the class object does not decode.
    pub fn class_inst_size(&self, class: Oop) -> Result<u64, ObjectError> {
        let obj = self.heap_object(class)?;
        let word = self.slot(&obj, 2)?;
        Ok((immediate::small_int_value(word) as u64) & 0xFFFF)
    }

    /// Instance layout format code a class declares.
    ///
    /// # Errors
    ///
    /// Returns an error if the class object does not decode.
    pub fn class_inst_format(&self, class: Oop) -> Result<u8, ObjectError> {
        let obj = self.heap_object(class)?;
        let word = self.slot(&obj, 2)?;
        Ok(((immediate::small_int_value(word) >> 16) & 0x1F) as u8)
    }

    /// A class's name, for diagnostics.
    #[must_use]
    pub fn class_name(&self, class: Oop) -> String {
        self.heap_object(class)
            .and_then(|obj| self.slot(&obj, 6))
            .and_then(|name| self.text(name))
            .unwrap_or_else(|_| "?".to_owned())
    }

    // --- special objects ---

    /// The special objects array oop.
    #[inline]
    #[must_use]
    pub const fn special_objects(&self) -> Oop {
        self.special_oop
    }

    /// Read a slot of the special objects array.
    ///
    /// # Errors
    ///
    /// Returns an error when the index is out of range.
    pub fn special(&self, index: usize) -> Result<Oop, ObjectError> {
        let array = self.heap_object(self.special_oop)?;
        self.slot(&array, index as u64)
    }

    /// Write a slot of the special objects array.
    ///
    /// # Errors
    ///
    /// Returns an error when the index is out of range.
    pub fn special_put(&mut self, index: usize, value: Oop) -> Result<(), ObjectError> {
        let array = self.heap_object(self.special_oop)?;
        self.slot_put(&array, index as u64, value)
    }

    /// The nil singleton.
    #[inline]
    #[must_use]
    pub const fn nil(&self) -> Oop {
        self.nil_oop
    }

    /// The true singleton.
    #[inline]
    #[must_use]
    pub const fn true_oop(&self) -> Oop {
        self.true_oop
    }

    /// The false singleton.
    #[inline]
    #[must_use]
    pub const fn false_oop(&self) -> Oop {
        self.false_oop
    }

    /// The boolean singleton for a host bool.
    #[inline]
    #[must_use]
    pub const fn boolean(&self, value: bool) -> Oop {
        if value { self.true_oop } else { self.false_oop }
    }

    /// The pre-interned oop for small literal integers, when in range.
    ///
    /// Immediates are self-encoding, so interning only pins down the
    /// canonical word; equality-by-reference holds for all of them.
    #[must_use]
    pub fn interned_small_int(&self, value: i64) -> Option<Oop> {
        if (INTERN_MIN..=INTERN_MAX).contains(&value) {
            self.interned_ints.get((value - INTERN_MIN) as usize).copied()
        } else {
            None
        }
    }

    /// Eden-size hint carried by the image header.
    #[inline]
    #[must_use]
    pub const fn eden_bytes(&self) -> u32 {
        self.eden_bytes
    }

    // --- identity hashes ---

    /// The object's identity hash, assigning a fresh one on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the object does not decode.
    pub fn identity_hash(&mut self, oop: Oop) -> Result<u32, ObjectError> {
        let obj = self.heap_object(oop)?;
        if obj.hash != 0 {
            return Ok(obj.hash);
        }
        // 22 bits, never zero
        self.last_hash = (self.last_hash.wrapping_mul(1_664_525).wrapping_add(1_013_904_223))
            & 0x3F_FFFF;
        if self.last_hash == 0 {
            self.last_hash = 1;
        }
        let addr = oop.address();
        let mut header = ObjectHeader::decode(self.word(addr)?);
        header.hash = self.last_hash;
        self.word_put(addr, header.encode())?;
        Ok(self.last_hash)
    }

    // --- allocation ---

    /// Bump-allocate a fresh instance of `class` with `variable` extra
    /// elements (array slots or binary elements, per the class's
    /// instance format).
    ///
    /// Pointer slots are initialised to nil, binary payloads to zero.
    ///
    /// # Errors
    ///
    /// Returns an error when the young region is exhausted or the class
    /// declares a reserved format.
    pub fn allocate(&mut self, class: Oop, variable: u64) -> Result<Oop, ObjectError> {
        let inst_size = self.class_inst_size(class)?;
        let inst_format = self.class_inst_format(class)?;
        let class_obj = self.heap_object(class)?;
        // a class's identity hash is its class-table index
        let class_index = class_obj.hash;
        if class_index == 0 {
            return Err(ObjectError::BadImage("instantiating a class without a table index"));
        }

        let (code, slot_count) = match inst_format {
            0 => (0, 0),
            1 => (1, inst_size),
            2 => (2, variable),
            3 | 4 => (inst_format, inst_size + variable),
            9 => (9, variable),
            10 => (ObjectFormat::binary_code_for(10, variable), variable.div_ceil(2)),
            12 => (ObjectFormat::binary_code_for(12, variable), variable.div_ceil(4)),
            16 => (ObjectFormat::binary_code_for(16, variable), variable.div_ceil(8)),
            24 => (ObjectFormat::binary_code_for(24, variable), variable.div_ceil(8)),
            code => {
                return Err(ObjectError::BadFormat { addr: class.address(), code });
            }
        };

        let needs_overflow = slot_count >= 255;
        let overflow_len: u64 = if needs_overflow { 8 } else { 0 };
        let total = overflow_len + 8 + slot_count.max(1) * 8;
        if self.young_next + total > self.old_base {
            return Err(ObjectError::OutOfMemory { requested: total });
        }

        let addr = self.young_next + overflow_len;
        self.young_next += total;

        if needs_overflow {
            self.word_put(addr - 8, overflow_word(slot_count))?;
        }
        let slot_byte = if needs_overflow { 255 } else { slot_count as u8 };
        let header = ObjectHeader::new(class_index, code, slot_byte);
        self.word_put(addr, header.encode())?;

        let format = ObjectFormat::from_code(code)
            .ok_or(ObjectError::BadFormat { addr, code })?;
        let fill = if format.is_pointers() { self.nil_oop.bits() } else { 0 };
        for i in 0..slot_count.max(1) {
            self.word_put(addr + 8 + i * 8, fill)?;
        }

        Ok(Oop::from_address(addr))
    }

    /// First address of the young region (test and diagnostic use).
    #[inline]
    #[must_use]
    pub const fn young_base(&self) -> u64 {
        self.window_base
    }

    /// Next free young address (test and diagnostic use).
    #[inline]
    #[must_use]
    pub const fn young_next(&self) -> u64 {
        self.young_next
    }

    /// Construct a memory directly from parts, for fixtures that build a
    /// synthetic object space instead of loading an image file.
    ///
    /// # Errors
    ///
    /// Returns an error when the special objects array does not decode.
    pub fn from_parts(
        old_base: u64,
        object_space: Vec<u8>,
        special_oop: u64,
        last_hash: u32,
    ) -> Result<Self, ObjectError> {
        let heap_end = old_base + object_space.len() as u64;
        let window_base = if old_base > YOUNG_RESERVE { old_base - YOUNG_RESERVE } else { 8 };
        let mut bytes = vec![0u8; (heap_end - window_base) as usize];
        bytes[(old_base - window_base) as usize..].copy_from_slice(&object_space);
        let mut memory = Self {
            bytes,
            window_base,
            old_base,
            heap_end,
            young_next: window_base,
            special_oop: Oop::from_address(special_oop),
            class_table_oop: Oop::default(),
            nil_oop: Oop::default(),
            false_oop: Oop::default(),
            true_oop: Oop::default(),
            last_hash: last_hash & 0x3F_FFFF,
            eden_bytes: 0,
            interned_ints: Vec::new(),
        };
        memory.bootstrap()?;
        Ok(memory)
    }
}

/// Iterator over the image portion of the heap.
pub struct HeapWalk<'a> {
    memory: &'a ObjectMemory,
    next: u64,
}

impl Iterator for HeapWalk<'_> {
    type Item = Result<HeapObject, ObjectError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.memory.heap_end {
            return None;
        }
        match self.memory.heap_object(Oop::from_address(self.next)) {
            Ok(obj) => {
                match self.memory.next_object_addr(&obj) {
                    Ok(next) => self.next = next,
                    Err(e) => return Some(Err(e)),
                }
                Some(Ok(obj))
            }
            Err(e) => Some(Err(e)),
        }
    }
}
