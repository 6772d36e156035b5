// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Object-format code families.
//!
//! The 5-bit format code in the object header groups objects into layout
//! families. Binary families spread over several codes: the low bits of
//! the code record how many trailing element slots of the last 64-bit
//! word are unused, which is how byte lengths that are not multiples of
//! eight survive the word-granular slot count.


/// Layout family of a heap object, decoded from the header format code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectFormat {
    /// Code 0: header only, no slots.
    ZeroSized,
    /// Code 1: fixed pointer slots (regular objects).
    Fixed,
    /// Code 2: variable pointer slots, no named instance variables.
    Variable,
    /// Code 3: named instance-variable pointers followed by a variable
    /// pointer part.
    VariableWithInstVars,
    /// Code 4: like [`Self::VariableWithInstVars`] but the variable part
    /// holds weak references.
    Weak,
    /// Code 9: 64-bit binary elements.
    Indexable64,
    /// Codes 10-11: 32-bit binary elements; payload = trailing unused.
    Indexable32(u8),
    /// Codes 12-15: 16-bit binary elements; payload = trailing unused.
    Indexable16(u8),
    /// Codes 16-23: 8-bit binary elements (strings, byte arrays);
    /// payload = trailing unused bytes.
    Indexable8(u8),
    /// Codes 24-31: compiled method; pointer literals then bytecode;
    /// payload = trailing unused bytes.
    CompiledMethod(u8),
}

impl ObjectFormat {
    /// Decode a 5-bit format code, or `None` for a reserved code.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::ZeroSized),
            1 => Some(Self::Fixed),
            2 => Some(Self::Variable),
            3 => Some(Self::VariableWithInstVars),
            4 => Some(Self::Weak),
            9 => Some(Self::Indexable64),
            10..=11 => Some(Self::Indexable32(code - 10)),
            12..=15 => Some(Self::Indexable16(code - 12)),
            16..=23 => Some(Self::Indexable8(code - 16)),
            24..=31 => Some(Self::CompiledMethod(code - 24)),
            _ => None,
        }
    }

    /// The 5-bit format code for this family.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::ZeroSized => 0,
            Self::Fixed => 1,
            Self::Variable => 2,
            Self::VariableWithInstVars => 3,
            Self::Weak => 4,
            Self::Indexable64 => 9,
            Self::Indexable32(pad) => 10 + pad,
            Self::Indexable16(pad) => 12 + pad,
            Self::Indexable8(pad) => 16 + pad,
            Self::CompiledMethod(pad) => 24 + pad,
        }
    }

    /// Check whether the slots hold object pointers.
    #[inline]
    #[must_use]
    pub const fn is_pointers(self) -> bool {
        matches!(
            self,
            Self::ZeroSized | Self::Fixed | Self::Variable | Self::VariableWithInstVars | Self::Weak
        )
    }

    /// Check whether the slots hold raw binary data.
    #[inline]
    #[must_use]
    pub const fn is_binary(self) -> bool {
        matches!(
            self,
            Self::Indexable64
                | Self::Indexable32(_)
                | Self::Indexable16(_)
                | Self::Indexable8(_)
                | Self::CompiledMethod(_)
        )
    }

    /// Check whether this is a compiled-method layout.
    #[inline]
    #[must_use]
    pub const fn is_compiled_method(self) -> bool {
        matches!(self, Self::CompiledMethod(_))
    }

    /// Check whether objects of this format have a variable part the
    /// image can index with `at:`.
    #[inline]
    #[must_use]
    pub const fn is_indexable(self) -> bool {
        !matches!(self, Self::ZeroSized | Self::Fixed)
    }

    /// Bits per indexable element, or `None` for pure pointer layouts.
    #[must_use]
    pub const fn element_bits(self) -> Option<u32> {
        match self {
            Self::Indexable64 => Some(64),
            Self::Indexable32(_) => Some(32),
            Self::Indexable16(_) => Some(16),
            Self::Indexable8(_) | Self::CompiledMethod(_) => Some(8),
            _ => None,
        }
    }

    /// Number of trailing unused element slots in the final 64-bit word.
    #[must_use]
    pub const fn trailing_unused(self) -> u64 {
        match self {
            Self::Indexable32(pad) => pad as u64,
            Self::Indexable16(pad) => pad as u64,
            Self::Indexable8(pad) | Self::CompiledMethod(pad) => pad as u64,
            _ => 0,
        }
    }

    /// Build the format code for a binary family holding `len` elements.
    ///
    /// `base` is the family's first code (9, 10, 12, 16 or 24); the
    /// padding bits are derived from how many elements of the final word
    /// stay unused.
    #[must_use]
    pub const fn binary_code_for(base: u8, len: u64) -> u8 {
        let per_word: u64 = match base {
            9 => 1,
            10 => 2,
            12 => 4,
            _ => 8,
        };
        let rem = len % per_word;
        let pad = if rem == 0 { 0 } else { per_word - rem };
        base + pad as u8
    }
}
