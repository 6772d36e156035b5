// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the primitive-117 plugin gateway.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use sova_objects::known::class_table;
use sova_objects::oop::Oop;

use crate::interpreter::Interpreter;
use crate::testkit::{Lit, MethodSpec, World, WorldBuilder, int, test_class};

fn run(world: World) -> (Interpreter, Oop) {
    let mut vm = world.interpreter();
    let value = vm.run(100_000).unwrap().expect("driver must halt");
    (vm, value)
}

/// An external-call method: primitive 117 with a pragma literal naming
/// the module and function, falling back to `^nil`.
fn external(selector: &'static str, num_args: u8, module: &'static str, function: &'static str) -> MethodSpec<'static> {
    MethodSpec {
        selector,
        num_args,
        num_temps: num_args,
        literals: vec![Lit::Pragma(module, function)],
        bytecode: vec![139, 117, 0, 115, 124],
        has_primitive: true,
    }
}

#[test]
fn large_integers_digit_add() {
    let world = WorldBuilder::new()
        .class_method(
            class_table::SMALL_INTEGER,
            external("digitAdd:", 1, "LargeIntegers", "primDigitAdd"),
        )
        .driver(MethodSpec {
            selector: "driver",
            num_args: 0,
            num_temps: 0,
            literals: vec![Lit::Symbol("digitAdd:"), Lit::Int(1), Lit::Int(2)],
            bytecode: vec![33, 34, 224, 124],
            has_primitive: false,
        })
        .build();
    let (_, value) = run(world);
    assert_eq!(value, int(3));
}

#[test]
fn large_integers_digit_compare() {
    let world = WorldBuilder::new()
        .class_method(
            class_table::LARGE_POSITIVE_INTEGER,
            external("digitCompare:", 1, "LargeIntegers", "primDigitCompare"),
        )
        .driver(MethodSpec {
            selector: "driver",
            num_args: 0,
            num_temps: 0,
            literals: vec![
                Lit::Symbol("digitCompare:"),
                Lit::LargePos(&[0, 0, 0, 0, 0, 0, 0, 0x20]),
                Lit::LargePos(&[1, 0, 0, 0, 0, 0, 0, 0x20]),
            ],
            bytecode: vec![33, 34, 224, 124],
            has_primitive: false,
        })
        .build();
    let (_, value) = run(world);
    assert_eq!(value, int(-1));
}

#[test]
fn misc_plugin_string_hash_is_deterministic() {
    let driver = |seed: i64| {
        let world = WorldBuilder::new()
            .class_method(
                test_class::METACLASS,
                external("hash:seed:", 2, "MiscPrimitivePlugin", "primitiveStringHash"),
            )
            .driver(MethodSpec {
                selector: "driver",
                num_args: 0,
                num_temps: 0,
                literals: vec![
                    Lit::Symbol("hash:seed:"),
                    Lit::Class(class_table::BYTE_STRING),
                    Lit::Symbol("abc"),
                    Lit::Int(seed),
                ],
                bytecode: vec![33, 34, 35, 240, 124],
                has_primitive: false,
            })
            .build();
        run(world).1
    };
    let first = driver(1);
    assert!(first.is_small_int());
    assert_eq!(first, driver(1), "same input, same hash");
    assert_ne!(first, driver(2), "the seed participates");
}

#[test]
fn misc_plugin_compare_string() {
    let world = WorldBuilder::new()
        .class_method(
            test_class::METACLASS,
            external("cmp:with:", 2, "MiscPrimitivePlugin", "primitiveCompareString"),
        )
        .driver(MethodSpec {
            selector: "driver",
            num_args: 0,
            num_temps: 0,
            literals: vec![
                Lit::Symbol("cmp:with:"),
                Lit::Class(class_table::BYTE_STRING),
                Lit::Symbol("abc"),
                Lit::Symbol("abd"),
            ],
            bytecode: vec![33, 34, 35, 240, 124],
            has_primitive: false,
        })
        .build();
    let (_, value) = run(world);
    assert_eq!(value, int(1), "abc collates before abd");
}

#[test]
fn unknown_plugin_falls_back_to_smalltalk() {
    let world = WorldBuilder::new()
        .method(external("mystery", 0, "NoSuchPlugin", "noSuchFunction"))
        .driver(MethodSpec {
            selector: "driver",
            num_args: 0,
            num_temps: 0,
            literals: vec![Lit::Symbol("mystery")],
            bytecode: vec![112, 208, 124],
            has_primitive: false,
        })
        .build();
    let (vm, value) = run(world);
    assert_eq!(value, vm.memory.nil());
}

#[test]
fn unknown_function_in_known_plugin_falls_back() {
    let world = WorldBuilder::new()
        .method(external("mystery", 0, "LargeIntegers", "primDoesNotExist"))
        .driver(MethodSpec {
            selector: "driver",
            num_args: 0,
            num_temps: 0,
            literals: vec![Lit::Symbol("mystery")],
            bytecode: vec![112, 208, 124],
            has_primitive: false,
        })
        .build();
    let (vm, value) = run(world);
    assert_eq!(value, vm.memory.nil());
}
