// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Named plugins behind primitive 117.
//!
//! The external-call primitive resolves a (module name, function name)
//! pair from the calling method's pragma literal and routes it here.
//! An unknown module or function fails the primitive so the image's
//! Smalltalk fallback code takes over - which is exactly the contract
//! the image expects for plugins this VM does not ship (files,
//! graphics, locale, security).

#[cfg(test)]
mod plugins_test;

mod large_integers;
mod misc_plugin;

use tracing::warn;

use crate::interpreter::Interpreter;
use crate::primitives::{PrimResult, PrimitiveFailure};

/// Route an external call to its plugin function.
///
/// # Errors
///
/// Returns [`PrimitiveFailure`] for unknown modules or functions, and
/// whenever the plugin function itself fails.
pub fn call(vm: &mut Interpreter, module: &str, function: &str) -> PrimResult {
    match module {
        "LargeIntegers" => large_integers::call(vm, function),
        "MiscPrimitivePlugin" => misc_plugin::call(vm, function),
        _ => {
            warn!(module, function, "external call to unknown plugin");
            Err(PrimitiveFailure)
        }
    }
}
