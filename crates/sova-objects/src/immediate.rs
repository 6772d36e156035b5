// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Immediate value encodings.
//!
//! SmallIntegers, Characters and SmallFloat64s live entirely inside the
//! oop word; the heap is never involved. SmallIntegers carry a 61-bit
//! two's complement value, Characters a codepoint, and SmallFloat64s an
//! IEEE-754 double whose bit pattern is rotated and rebased so the tag
//! fits in the low 3 bits.


use crate::oop::{Oop, TAG_BITS, Tag};

/// Largest encodable SmallInteger (2^60 - 1).
pub const SMALL_INT_MAX: i64 = (1 << 60) - 1;

/// Smallest encodable SmallInteger (-2^60).
pub const SMALL_INT_MIN: i64 = -(1 << 60);

/// Exponent rebase subtracted from a double before rotation.
const FLOAT_EXPONENT_OFFSET: u64 = 0x3FE;

/// Smallest biased exponent a SmallFloat64 can carry.
const FLOAT_EXPONENT_MIN: u64 = FLOAT_EXPONENT_OFFSET + 1;

/// Largest biased exponent a SmallFloat64 can carry.
const FLOAT_EXPONENT_MAX: u64 = FLOAT_EXPONENT_OFFSET + 0xFF;

/// Encode a SmallInteger, or `None` if the value needs more than 61 bits.
#[inline]
#[must_use]
pub const fn small_int(value: i64) -> Option<Oop> {
    if value < SMALL_INT_MIN || value > SMALL_INT_MAX {
        return None;
    }
    Some(Oop::new(((value << TAG_BITS) as u64) | Tag::SmallInteger as u64))
}

/// Decode a SmallInteger oop to its value.
///
/// Only meaningful when the oop carries the SmallInteger tag; the value
/// is recovered by an arithmetic shift so the sign extends.
#[inline]
#[must_use]
pub const fn small_int_value(oop: Oop) -> i64 {
    (oop.bits() as i64) >> TAG_BITS
}

/// Encode a Character from its codepoint.
#[inline]
#[must_use]
pub const fn character(codepoint: u32) -> Oop {
    Oop::new(((codepoint as u64) << TAG_BITS) | Tag::Character as u64)
}

/// Decode a Character oop to its codepoint.
#[inline]
#[must_use]
pub const fn character_value(oop: Oop) -> u32 {
    (oop.bits() >> TAG_BITS) as u32
}

/// Check whether a double is representable as a SmallFloat64.
///
/// Representable doubles are +/-0.0 and those whose biased exponent
/// rebases into 1..=0xFF. NaNs and infinities have exponent 0x7FF and
/// therefore box.
#[inline]
#[must_use]
pub fn small_float_fits(value: f64) -> bool {
    let bits = value.to_bits();
    if bits & !(1 << 63) == 0 {
        return true;
    }
    let exponent = (bits >> 52) & 0x7FF;
    (FLOAT_EXPONENT_MIN..=FLOAT_EXPONENT_MAX).contains(&exponent)
}

/// Encode a SmallFloat64, or `None` when the double must box.
///
/// The double's bit pattern is rotated left by one (sign to bit 0) after
/// subtracting the exponent rebase, freeing the top three bits; shifting
/// into place leaves room for the `100` tag.
#[must_use]
pub fn small_float(value: f64) -> Option<Oop> {
    if !small_float_fits(value) {
        return None;
    }
    let bits = value.to_bits();
    let rotated = bits.rotate_left(1);
    let rebased = if bits & !(1 << 63) == 0 {
        rotated
    } else {
        rotated - (FLOAT_EXPONENT_OFFSET << 53)
    };
    Some(Oop::new((rebased << TAG_BITS) | Tag::SmallFloat as u64))
}

/// Decode a SmallFloat64 oop to its double.
#[must_use]
pub fn small_float_value(oop: Oop) -> f64 {
    let payload = oop.bits() >> TAG_BITS;
    let rotated = if payload <= 1 {
        // +/-0.0: only the sign bit (bit 0 after rotation) survives.
        payload
    } else {
        payload + (FLOAT_EXPONENT_OFFSET << 53)
    };
    f64::from_bits(rotated.rotate_right(1))
}
