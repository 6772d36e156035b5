// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Synthetic Spur worlds for tests.
//!
//! Builds a miniature but structurally faithful object space in memory -
//! singletons, class table, classes with method dictionaries, a
//! scheduler with ready lists and an active process - so interpreter
//! tests can assemble bytecode by hand and run it without an image
//! file. Layout constraints mirror the loader's expectations: nil,
//! false and true come first, the free-list object follows true, and
//! the class-table root (with its overflow header) follows that.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;

use sova_objects::MethodHeader;
use sova_objects::header::{ObjectHeader, overflow_word};
use sova_objects::immediate;
use sova_objects::known::{class_table, special};
use sova_objects::oop::Oop;

use crate::context;
use crate::interpreter::Interpreter;
use crate::memory::ObjectMemory;

/// Base address of the synthetic object space.
pub const OLD_BASE: u64 = 0x10_0000;

/// Class-table indices for the classes the kit invents (the first 32
/// are reserved for the well-known set).
pub mod test_class {
    /// Metaclass stand-in; its own class is itself.
    pub const METACLASS: u32 = 49;
    /// The root class.
    pub const OBJECT: u32 = 50;
    /// Receiver class used by most tests.
    pub const PROBE: u32 = 51;
    /// MethodDictionary.
    pub const METHOD_DICT: u32 = 52;
    /// CompiledMethod.
    pub const COMPILED_METHOD: u32 = 53;
    /// UndefinedObject.
    pub const UNDEFINED: u32 = 54;
    /// False.
    pub const FALSE: u32 = 55;
    /// True.
    pub const TRUE: u32 = 56;
    /// ByteSymbol.
    pub const SYMBOL: u32 = 57;
    /// Process.
    pub const PROCESS: u32 = 58;
    /// LinkedList.
    pub const LINKED_LIST: u32 = 59;
    /// ProcessorScheduler.
    pub const SCHEDULER: u32 = 60;
    /// Association.
    pub const ASSOCIATION: u32 = 61;
    /// Point.
    pub const POINT: u32 = 62;
    /// BoxedFloat64.
    pub const FLOAT: u32 = 63;
    /// ByteArray (also used for the free-list stand-in).
    pub const BYTE_ARRAY: u32 = 64;
    /// Character.
    pub const CHARACTER: u32 = 65;
}

/// Ready-list priorities the synthetic scheduler provides.
pub const PRIORITIES: u64 = 8;

/// SmallInteger oop shorthand.
pub fn int(value: i64) -> Oop {
    immediate::small_int(value).unwrap()
}

/// A method literal, resolved to an oop while the world is built.
#[derive(Clone)]
pub enum Lit<'a> {
    /// A SmallInteger.
    Int(i64),
    /// An interned symbol.
    Symbol(&'a str),
    /// The class at a table index.
    Class(u32),
    /// An association whose value is the class at a table index (the
    /// defining-class binding super sends need as the last literal).
    ClassAssoc(u32),
    /// A fresh Semaphore instance (also recorded in
    /// `World::semaphores`, in literal order).
    Semaphore,
    /// A LargePositiveInteger with the given little-endian magnitude.
    LargePos(&'a [u8]),
    /// A LargeNegativeInteger with the given little-endian magnitude.
    LargeNeg(&'a [u8]),
    /// A plugin pragma: an array of (module name, function name).
    Pragma(&'a str, &'a str),
    /// A raw oop word.
    Raw(u64),
}

/// Declarative description of a method to install.
pub struct MethodSpec<'a> {
    /// Selector text.
    pub selector: &'a str,
    /// Argument count.
    pub num_args: u8,
    /// Temp count, arguments included.
    pub num_temps: u8,
    /// Literals, in literal-frame order.
    pub literals: Vec<Lit<'a>>,
    /// Bytecode bytes.
    pub bytecode: Vec<u8>,
    /// Whether the body leads with a callPrimitive bytecode.
    pub has_primitive: bool,
}

impl<'a> MethodSpec<'a> {
    /// A plain zero-argument, zero-literal method.
    pub fn unary(selector: &'a str, bytecode: Vec<u8>) -> Self {
        Self {
            selector,
            num_args: 0,
            num_temps: 0,
            literals: Vec::new(),
            bytecode,
            has_primitive: false,
        }
    }

    /// A method whose body is only a primitive attempt with a
    /// return-nil fallback.
    pub fn primitive(selector: &'a str, num_args: u8, number: u16) -> Self {
        let [low, high] = number.to_le_bytes();
        Self {
            selector,
            num_args,
            num_temps: num_args,
            literals: Vec::new(),
            bytecode: vec![139, low, high, 115, 124],
            has_primitive: true,
        }
    }
}

/// The serialised object space under construction.
pub struct SpaceBuilder {
    bytes: Vec<u8>,
    patches: Vec<(u64, u64)>,
}

impl SpaceBuilder {
    fn new() -> Self {
        Self { bytes: Vec::new(), patches: Vec::new() }
    }

    /// Address the next object will get.
    fn next_addr(&self) -> u64 {
        OLD_BASE + self.bytes.len() as u64
    }

    fn push_word(&mut self, word: u64) {
        self.bytes.extend_from_slice(&word.to_le_bytes());
    }

    /// Write an object with pointer-slot contents, overflow header
    /// included when needed. Answers the nominal address.
    pub fn object(&mut self, class_index: u32, format: u8, hash: u32, slots: &[u64]) -> u64 {
        let count = slots.len() as u64;
        let overflow = count >= 255;
        if overflow {
            self.push_word(overflow_word(count));
        }
        let addr = self.next_addr();
        let byte = if overflow { 255 } else { count as u8 };
        let mut header = ObjectHeader::new(class_index, format, byte);
        header.hash = hash;
        self.push_word(header.encode());
        for slot in slots {
            self.push_word(*slot);
        }
        if slots.is_empty() {
            self.push_word(0);
        }
        addr
    }

    /// Write a byte object; the format code derives from the family
    /// base and the byte length.
    pub fn byte_object(&mut self, class_index: u32, base: u8, hash: u32, data: &[u8]) -> u64 {
        let words = (data.len() as u64).div_ceil(8);
        let code = sova_objects::ObjectFormat::binary_code_for(base, data.len() as u64);
        let addr = self.next_addr();
        let mut header = ObjectHeader::new(class_index, code, words as u8);
        header.hash = hash;
        self.push_word(header.encode());
        let mut padded = data.to_vec();
        padded.resize((words.max(1) * 8) as usize, 0);
        self.bytes.extend_from_slice(&padded);
        addr
    }

    /// Defer a slot write until the target address is known.
    pub fn patch_slot(&mut self, object_addr: u64, slot: u64, value: u64) {
        self.patches.push((object_addr + 8 + slot * 8, value));
    }

    fn finish(mut self) -> Vec<u8> {
        for (addr, value) in std::mem::take(&mut self.patches) {
            let i = (addr - OLD_BASE) as usize;
            self.bytes[i..i + 8].copy_from_slice(&value.to_le_bytes());
        }
        self.bytes
    }
}

/// Everything a test needs to know about the built world.
pub struct World {
    /// The finished object memory.
    pub memory: ObjectMemory,
    /// Interned symbols by text.
    pub symbols: HashMap<String, Oop>,
    /// Class oops by table index.
    pub classes: HashMap<u32, Oop>,
    /// Method dictionaries by class index.
    pub dicts: HashMap<u32, Oop>,
    /// Semaphores created for `Lit::Semaphore`, in creation order.
    pub semaphores: Vec<Oop>,
    /// The driver context the active process resumes.
    pub driver_context: Oop,
    /// The driver's receiver (a Probe instance).
    pub probe: Oop,
    /// The active process.
    pub active_process: Oop,
    /// The scheduler's ready-list array.
    pub ready_lists: Oop,
}

/// Builder for a complete synthetic world.
pub struct WorldBuilder<'a> {
    space: SpaceBuilder,
    symbols: HashMap<String, u64>,
    classes: HashMap<u32, u64>,
    page0: u64,
    nil_addr: u64,
    methods: Vec<(u32, MethodSpec<'a>)>,
    driver: Option<MethodSpec<'a>>,
    semaphores: Vec<u64>,
}

impl<'a> WorldBuilder<'a> {
    /// Start an empty world.
    pub fn new() -> Self {
        Self {
            space: SpaceBuilder::new(),
            symbols: HashMap::new(),
            classes: HashMap::new(),
            page0: 0,
            nil_addr: 0,
            methods: Vec::new(),
            driver: None,
            semaphores: Vec::new(),
        }
    }

    /// Install a method on the Probe class.
    pub fn method(mut self, spec: MethodSpec<'a>) -> Self {
        self.methods.push((test_class::PROBE, spec));
        self
    }

    /// Install a method on an arbitrary class.
    pub fn class_method(mut self, class_index: u32, spec: MethodSpec<'a>) -> Self {
        self.methods.push((class_index, spec));
        self
    }

    /// Set the driver method body (run as `probe driver`).
    pub fn driver(mut self, spec: MethodSpec<'a>) -> Self {
        self.driver = Some(spec);
        self
    }

    fn symbol(&mut self, text: &str) -> u64 {
        if let Some(&addr) = self.symbols.get(text) {
            return addr;
        }
        let addr = self.space.byte_object(test_class::SYMBOL, 16, 0, text.as_bytes());
        self.symbols.insert(text.to_owned(), addr);
        addr
    }

    /// Create a class object and register it in the table page.
    fn class(
        &mut self,
        index: u32,
        superclass: u64,
        inst_size: u16,
        inst_format: u8,
        name: &str,
    ) -> u64 {
        let name_addr = self.symbol(name);
        let nil = self.nil_addr;
        let format_word = int((i64::from(inst_format) << 16) | i64::from(inst_size)).bits();
        let addr = self.space.object(
            test_class::METACLASS,
            1,
            index,
            &[superclass, nil, format_word, nil, nil, nil, name_addr],
        );
        self.space.patch_slot(self.page0, u64::from(index), addr);
        self.classes.insert(index, addr);
        addr
    }

    fn resolve_literal(&mut self, literal: &Lit<'a>) -> u64 {
        match literal {
            Lit::Int(value) => int(*value).bits(),
            Lit::Symbol(text) => self.symbol(text),
            Lit::Class(index) => self.classes[index],
            Lit::ClassAssoc(index) => {
                let class = self.classes[index];
                let nil = self.nil_addr;
                self.space.object(test_class::ASSOCIATION, 1, 0, &[nil, class])
            }
            Lit::Semaphore => {
                let nil = self.nil_addr;
                let addr = self.space.object(
                    class_table::SEMAPHORE,
                    1,
                    0,
                    &[nil, nil, int(0).bits()],
                );
                self.semaphores.push(addr);
                addr
            }
            Lit::LargePos(magnitude) => {
                self.space.byte_object(class_table::LARGE_POSITIVE_INTEGER, 16, 0, magnitude)
            }
            Lit::LargeNeg(magnitude) => {
                self.space.byte_object(class_table::LARGE_NEGATIVE_INTEGER, 16, 0, magnitude)
            }
            Lit::Pragma(module, function) => {
                let module = self.symbol(module);
                let function = self.symbol(function);
                self.space.object(class_table::ARRAY, 2, 0, &[module, function])
            }
            Lit::Raw(bits) => *bits,
        }
    }

    fn compiled_method(&mut self, spec: &MethodSpec<'a>) -> u64 {
        let mut literals = Vec::with_capacity(spec.literals.len());
        for lit in &spec.literals {
            let resolved = self.resolve_literal(lit);
            literals.push(resolved);
        }
        let header = pack_method_header(
            spec.num_args,
            spec.num_temps,
            spec.has_primitive,
            literals.len() as u16,
        );
        let mut body = Vec::new();
        body.extend_from_slice(&int(header).bits().to_le_bytes());
        for literal in &literals {
            body.extend_from_slice(&literal.to_le_bytes());
        }
        body.extend_from_slice(&spec.bytecode);
        body.push(0); // no-trailer flag byte
        self.space.byte_object(test_class::COMPILED_METHOD, 24, 0, &body)
    }

    /// Build everything and boot an object memory.
    pub fn build(mut self) -> World {
        // singletons first: the loader finds the class table by walking
        // past true and the free-list object
        let nil = self.space.object(test_class::UNDEFINED, 0, 0, &[]);
        self.nil_addr = nil;
        let false_addr = self.space.object(test_class::FALSE, 0, 0, &[]);
        let true_addr = self.space.object(test_class::TRUE, 0, 0, &[]);
        let _free_list = self.space.byte_object(test_class::BYTE_ARRAY, 16, 0, &[0; 16]);

        // class-table root: 256 slots forces the overflow header the
        // loader expects between the free-list object and the table
        let table = self.space.object(class_table::ARRAY, 2, 0, &vec![nil; 256]);
        let page0 = self.space.object(class_table::ARRAY, 2, 0, &vec![nil; 1024]);
        self.space.patch_slot(table, 0, page0);
        self.page0 = page0;

        // bootstrap classes; UndefinedObject first so `nil` resolves
        let undef_class = self.class(test_class::UNDEFINED, 0, 0, 0, "UndefinedObject");
        let object_class = self.class(test_class::OBJECT, nil, 0, 1, "Object");
        self.space.patch_slot(undef_class, 0, object_class);
        self.class(test_class::METACLASS, object_class, 7, 1, "Metaclass");
        self.class(test_class::FALSE, object_class, 0, 0, "False");
        self.class(test_class::TRUE, object_class, 0, 0, "True");
        self.class(class_table::SMALL_INTEGER, object_class, 0, 0, "SmallInteger");
        self.class(class_table::SMALL_FLOAT, object_class, 0, 0, "SmallFloat64");
        self.class(class_table::BYTE_STRING, object_class, 0, 16, "ByteString");
        let string_class = self.classes[&class_table::BYTE_STRING];
        self.class(test_class::SYMBOL, string_class, 0, 16, "ByteSymbol");
        self.class(class_table::ARRAY, object_class, 0, 2, "Array");
        self.class(test_class::METHOD_DICT, object_class, 2, 3, "MethodDictionary");
        self.class(test_class::COMPILED_METHOD, object_class, 0, 24, "CompiledMethod");
        self.class(class_table::CONTEXT, object_class, 6, 3, "Context");
        self.class(class_table::BLOCK_CLOSURE, object_class, 3, 3, "BlockClosure");
        self.class(class_table::MESSAGE, object_class, 3, 1, "Message");
        self.class(class_table::SEMAPHORE, object_class, 3, 1, "Semaphore");
        self.class(test_class::PROCESS, object_class, 4, 1, "Process");
        self.class(test_class::LINKED_LIST, object_class, 2, 1, "LinkedList");
        self.class(test_class::SCHEDULER, object_class, 2, 1, "ProcessorScheduler");
        self.class(test_class::ASSOCIATION, object_class, 2, 1, "Association");
        self.class(test_class::POINT, object_class, 2, 1, "Point");
        self.class(test_class::FLOAT, object_class, 0, 10, "BoxedFloat64");
        self.class(test_class::BYTE_ARRAY, object_class, 0, 16, "ByteArray");
        self.class(test_class::CHARACTER, object_class, 0, 0, "Character");
        self.class(class_table::LARGE_POSITIVE_INTEGER, object_class, 0, 16, "LargePositiveInteger");
        self.class(class_table::LARGE_NEGATIVE_INTEGER, object_class, 0, 16, "LargeNegativeInteger");
        self.class(test_class::PROBE, object_class, 2, 1, "Probe");

        // group requested methods by class; the driver lands on Probe
        let driver_spec = self.driver.take().unwrap_or_else(|| {
            MethodSpec::unary("driver", vec![112, 124]) // ^self
        });
        let driver_initial_pc = (driver_spec.literals.len() as u64 + 1) * 8;
        let driver_temps = driver_spec.num_temps;
        let mut grouped: Vec<(u32, Vec<MethodSpec<'a>>)> = Vec::new();
        for (class_index, spec) in std::mem::take(&mut self.methods) {
            if let Some(pos) = grouped.iter().position(|(i, _)| *i == class_index) {
                grouped[pos].1.push(spec);
            } else {
                grouped.push((class_index, vec![spec]));
            }
        }
        if let Some(pos) = grouped.iter().position(|(i, _)| *i == test_class::PROBE) {
            grouped[pos].1.push(driver_spec);
        } else {
            grouped.push((test_class::PROBE, vec![driver_spec]));
        }

        let mut dicts: HashMap<u32, u64> = HashMap::new();
        let mut driver_method = 0;
        for (class_index, specs) in &grouped {
            let capacity = specs.len() as u64 + 2;
            let values = self.space.object(
                class_table::ARRAY,
                2,
                0,
                &vec![nil; capacity as usize],
            );
            let mut slots = vec![int(specs.len() as i64).bits(), values];
            slots.extend(std::iter::repeat_n(nil, capacity as usize));
            let dict = self.space.object(test_class::METHOD_DICT, 3, 0, &slots);
            let class_addr = self.classes[class_index];
            self.space.patch_slot(class_addr, 1, dict);
            dicts.insert(*class_index, dict);

            for (i, spec) in specs.iter().enumerate() {
                let selector = self.symbol(spec.selector);
                let method = self.compiled_method(spec);
                self.space.patch_slot(dict, 2 + i as u64, selector);
                self.space.patch_slot(values, i as u64, method);
                if *class_index == test_class::PROBE && i == specs.len() - 1 {
                    driver_method = method;
                }
            }
        }

        // the driver activation and its process
        let probe = self.space.object(test_class::PROBE, 1, 0, &[nil, nil]);
        let frame = 16u64;
        let mut ctx_slots = vec![
            nil,                                      // sender
            int(driver_initial_pc as i64 + 1).bits(), // pc, one-based
            int(i64::from(driver_temps)).bits(),      // stackp
            driver_method,
            nil, // closure
            probe,
        ];
        ctx_slots.extend(std::iter::repeat_n(nil, frame as usize));
        let driver_ctx = self.space.object(class_table::CONTEXT, 3, 0, &ctx_slots);

        let process = self.space.object(
            test_class::PROCESS,
            1,
            0,
            &[nil, driver_ctx, int(3).bits(), nil],
        );

        // scheduler: one empty FIFO list per priority
        let mut list_addrs = Vec::new();
        for _ in 0..PRIORITIES {
            list_addrs.push(self.space.object(test_class::LINKED_LIST, 1, 0, &[nil, nil]));
        }
        let lists = self.space.object(class_table::ARRAY, 2, 0, &list_addrs);
        let scheduler = self.space.object(test_class::SCHEDULER, 1, 0, &[lists, process]);
        let scheduler_key = self.symbol("Processor");
        let association =
            self.space.object(test_class::ASSOCIATION, 1, 0, &[scheduler_key, scheduler]);

        // special selectors: pairs for opcodes 176.. (+, -, <, >, ...)
        let special_selector_names: [(&str, i64); 7] =
            [("+", 1), ("-", 1), ("<", 1), (">", 1), ("<=", 1), (">=", 1), ("=", 1)];
        let mut pairs = Vec::new();
        for (name, argc) in special_selector_names {
            let selector = self.symbol(name);
            pairs.push(selector);
            pairs.push(int(argc).bits());
        }
        let special_selectors = self.space.object(class_table::ARRAY, 2, 0, &pairs);

        let dnu_selector = self.symbol("doesNotUnderstand:");
        let cannot_return_selector = self.symbol("cannotReturn:");

        // the special objects array
        let mut specials = vec![nil; 64];
        specials[special::NIL] = nil;
        specials[special::FALSE] = false_addr;
        specials[special::TRUE] = true_addr;
        specials[special::SCHEDULER_ASSOCIATION] = association;
        specials[special::CLASS_SMALL_INTEGER] = self.classes[&class_table::SMALL_INTEGER];
        specials[special::CLASS_BYTE_STRING] = string_class;
        specials[special::CLASS_ARRAY] = self.classes[&class_table::ARRAY];
        specials[special::CLASS_FLOAT] = self.classes[&test_class::FLOAT];
        specials[special::CLASS_CONTEXT] = self.classes[&class_table::CONTEXT];
        specials[special::CLASS_POINT] = self.classes[&test_class::POINT];
        specials[special::CLASS_LARGE_POSITIVE_INTEGER] =
            self.classes[&class_table::LARGE_POSITIVE_INTEGER];
        specials[special::CLASS_SEMAPHORE] = self.classes[&class_table::SEMAPHORE];
        specials[special::CLASS_CHARACTER] = self.classes[&test_class::CHARACTER];
        specials[special::SELECTOR_DOES_NOT_UNDERSTAND] = dnu_selector;
        specials[special::SELECTOR_CANNOT_RETURN] = cannot_return_selector;
        specials[special::SPECIAL_SELECTORS] = special_selectors;
        specials[special::CLASS_LARGE_NEGATIVE_INTEGER] =
            self.classes[&class_table::LARGE_NEGATIVE_INTEGER];
        let special_array = self.space.object(class_table::ARRAY, 2, 0, &specials);

        let symbols = std::mem::take(&mut self.symbols);
        let classes = std::mem::take(&mut self.classes);
        let semaphores = std::mem::take(&mut self.semaphores);
        let bytes = self.space.finish();
        let memory = ObjectMemory::from_parts(OLD_BASE, bytes, special_array, 0x1234)
            .expect("synthetic world must boot");

        World {
            memory,
            symbols: symbols.into_iter().map(|(k, v)| (k, Oop::from_address(v))).collect(),
            classes: classes.into_iter().map(|(k, v)| (k, Oop::from_address(v))).collect(),
            dicts: dicts.into_iter().map(|(k, v)| (k, Oop::from_address(v))).collect(),
            semaphores: semaphores.into_iter().map(Oop::from_address).collect(),
            driver_context: Oop::from_address(driver_ctx),
            probe: Oop::from_address(probe),
            active_process: Oop::from_address(process),
            ready_lists: Oop::from_address(lists),
        }
    }
}

impl World {
    /// Boot an interpreter on this world.
    pub fn interpreter(self) -> Interpreter {
        Interpreter::new(self.memory).expect("synthetic world must have an active process")
    }

    /// Look up an interned symbol oop.
    pub fn symbol(&self, text: &str) -> Oop {
        self.symbols[text]
    }

    /// Allocate a Semaphore instance with zero excess signals.
    pub fn new_semaphore(memory: &mut ObjectMemory) -> Oop {
        let class = memory.class_at(class_table::SEMAPHORE).unwrap();
        let semaphore = memory.allocate(class, 0).unwrap();
        let obj = memory.heap_object(semaphore).unwrap();
        memory.slot_put(&obj, 2, int(0)).unwrap();
        semaphore
    }

    /// Allocate a Process with the given priority and a fresh driver
    /// activation as its suspended context.
    pub fn new_process(&mut self, priority: i64) -> Oop {
        let memory = &mut self.memory;
        let class = self.classes[&test_class::PROCESS];
        let process = memory.allocate(class, 0).unwrap();
        let obj = memory.heap_object(process).unwrap();
        let method = context::method_oop(memory, self.driver_context).unwrap();
        let decoded = crate::method::CompiledMethod::decode(memory, method).unwrap();
        let ctx = context::new_activation(memory, &decoded, self.probe, &[], memory.nil()).unwrap();
        memory.slot_put(&obj, 1, ctx).unwrap();
        memory.slot_put(&obj, 2, int(priority)).unwrap();
        process
    }
}

/// Pack a compiled-method header word (the untagged value).
pub fn pack_method_header(num_args: u8, num_temps: u8, has_primitive: bool, literals: u16) -> i64 {
    let mut word = i64::from(literals & 0x7FFF);
    word |= i64::from(num_temps & 0x3F) << 18;
    word |= i64::from(num_args & 0x0F) << 24;
    if has_primitive {
        word |= 1 << 16;
    }
    debug_assert_eq!(MethodHeader::decode(word).num_args, num_args);
    word
}
