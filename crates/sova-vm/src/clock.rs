// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Wall-clock sources for the clock primitives and timer wake-ups.

use std::time::{SystemTime, UNIX_EPOCH};

/// Mask for the wrapping millisecond clock (29 bits).
pub const MILLISECOND_MASK: u64 = (1 << 29) - 1;

/// Current UTC time in microseconds since the Unix epoch.
#[must_use]
pub fn utc_microseconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// The wrapping 29-bit millisecond clock.
#[must_use]
pub fn milliseconds() -> u64 {
    (utc_microseconds() / 1000) & MILLISECOND_MASK
}
