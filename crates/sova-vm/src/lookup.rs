// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Method lookup.
//!
//! Selectors are image-interned symbols, so lookup compares oops by
//! identity: scan the method dictionary's selector slots, take the
//! method at the matching index in the `values` array, and walk up the
//! superclass chain on a miss. A direct-mapped cache keyed on
//! `(class, selector)` front-ends the walk; `doesNotUnderstand:`
//! lookups bypass it so a cached DNU can never mask a later method
//! installation.


use sova_objects::oop::Oop;

use crate::memory::{ObjectError, ObjectMemory};

/// Class slot: the superclass, nil at the root.
pub const CLASS_SUPERCLASS: u64 = 0;
/// Class slot: the method dictionary.
pub const CLASS_METHOD_DICT: u64 = 1;
/// Class slot: the instance-format word.
pub const CLASS_FORMAT: u64 = 2;
/// Class slot: the name symbol.
pub const CLASS_NAME: u64 = 6;

/// Method-dictionary instance variable: occupied-slot count.
pub const DICT_TALLY: u64 = 0;
/// Method-dictionary instance variable: the `values` array.
pub const DICT_VALUES: u64 = 1;

/// Number of cache entries; must stay a power of two.
const CACHE_SIZE: usize = 1024;

#[derive(Clone, Copy, Default)]
struct CacheEntry {
    class: Oop,
    selector: Oop,
    method: Oop,
}

/// Direct-mapped lookup cache.
///
/// Entries are overwritten on collision and the whole table is flushed
/// when a method dictionary is observed to change.
pub struct MethodCache {
    entries: Vec<CacheEntry>,
}

impl Default for MethodCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MethodCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self { entries: vec![CacheEntry::default(); CACHE_SIZE] }
    }

    fn index(class: Oop, selector: Oop) -> usize {
        let hash = (class.bits() >> 3) ^ (selector.bits() >> 3).rotate_left(11);
        (hash as usize) & (CACHE_SIZE - 1)
    }

    /// Look up a cached method.
    #[must_use]
    pub fn get(&self, class: Oop, selector: Oop) -> Option<Oop> {
        let entry = &self.entries[Self::index(class, selector)];
        (entry.class == class && entry.selector == selector).then_some(entry.method)
    }

    /// Record a successful lookup.
    pub fn put(&mut self, class: Oop, selector: Oop, method: Oop) {
        self.entries[Self::index(class, selector)] = CacheEntry { class, selector, method };
    }

    /// Drop every entry.
    pub fn flush(&mut self) {
        tracing::debug!("method cache flushed");
        self.entries.iter_mut().for_each(|e| *e = CacheEntry::default());
    }
}

/// Result of a lookup walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOutcome {
    /// The method to run.
    Method(Oop),
    /// The walk reached nil; the caller restarts with
    /// `doesNotUnderstand:`.
    DoesNotUnderstand,
}

/// Scan one method dictionary for a selector, by identity.
///
/// Nil selector slots are skipped. Answers the method at the matching
/// index of the `values` array.
///
/// # Errors
///
/// Returns an error when the dictionary shape does not decode.
fn scan_dictionary(
    memory: &ObjectMemory,
    dict: Oop,
    selector: Oop,
) -> Result<Option<Oop>, ObjectError> {
    let dict_obj = memory.heap_object(dict)?;
    let fixed = memory.class_inst_size(memory.class_of(dict)?)?;
    for i in fixed..dict_obj.slot_count {
        let candidate = memory.slot(&dict_obj, i)?;
        if candidate == selector {
            let values = memory.slot(&dict_obj, DICT_VALUES)?;
            let values_obj = memory.heap_object(values)?;
            return Ok(Some(memory.slot(&values_obj, i - fixed)?));
        }
    }
    Ok(None)
}

/// Walk the class hierarchy for a selector.
///
/// The cache is consulted first and populated on success; lookups of
/// the `doesNotUnderstand:` selector bypass it entirely (pass
/// `bypass_cache`).
///
/// # Errors
///
/// Returns an error when a class on the walk does not decode.
pub fn lookup_method(
    memory: &ObjectMemory,
    cache: &mut MethodCache,
    class: Oop,
    selector: Oop,
    bypass_cache: bool,
) -> Result<LookupOutcome, ObjectError> {
    if !bypass_cache {
        if let Some(method) = cache.get(class, selector) {
            return Ok(LookupOutcome::Method(method));
        }
    }

    let nil = memory.nil();
    let mut current = class;
    while current != nil {
        let class_obj = memory.heap_object(current)?;
        let dict = memory.slot(&class_obj, CLASS_METHOD_DICT)?;
        if dict != nil {
            if let Some(method) = scan_dictionary(memory, dict, selector)? {
                if !bypass_cache {
                    cache.put(class, selector, method);
                }
                return Ok(LookupOutcome::Method(method));
            }
        }
        current = memory.slot(&class_obj, CLASS_SUPERCLASS)?;
    }
    Ok(LookupOutcome::DoesNotUnderstand)
}
