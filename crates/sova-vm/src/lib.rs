// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! # Sova VM
//!
//! A 64-bit Spur-format Smalltalk virtual machine: a bytecode interpreter
//! over an object memory loaded from a Pharo/Squeak image file.
//!
//! This crate provides:
//! - Image-file loading and header validation
//! - The Spur object memory (header decoding, slot access, class-table
//!   navigation, bump allocation)
//! - The fetch/decode/execute interpreter over the V3+Sista bytecode set
//! - Method lookup with a direct-mapped cache and `doesNotUnderstand:`
//! - Numbered primitives and the named-plugin gateway
//! - The cooperative process scheduler and semaphores
//!
//! The VM is single-threaded: Smalltalk processes are green threads
//! scheduled entirely inside the interpreter at fetch boundaries.

pub mod clock;
pub mod context;
pub mod image;
pub mod interpreter;
pub mod lookup;
pub mod memory;
pub mod method;
pub mod plugins;
pub mod primitives;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testkit;

// Re-export commonly used types at crate root
pub use image::Image;
pub use interpreter::{Interpreter, StepOutcome, VmError};
pub use memory::ObjectMemory;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
