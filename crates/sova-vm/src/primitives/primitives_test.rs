// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Primitive tests, driven through real sends on synthetic worlds so
//! the whole path (send, activation, callPrimitive, outcome) is the one
//! the image exercises.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use sova_objects::immediate::{self, SMALL_INT_MAX};
use sova_objects::known::class_table;
use sova_objects::oop::Oop;

use crate::interpreter::Interpreter;
use crate::testkit::{Lit, MethodSpec, World, WorldBuilder, int, test_class};

/// Run the world's driver and answer the halting value.
fn run(world: World) -> (Interpreter, Oop) {
    let mut vm = world.interpreter();
    let value = vm.run(100_000).unwrap().expect("driver must halt");
    (vm, value)
}

/// Driver that sends a one-argument selector to a literal receiver:
/// `^lit1 selector: lit2`.
fn binary_driver(selector: &'static str, receiver: Lit<'static>, argument: Lit<'static>) -> MethodSpec<'static> {
    MethodSpec {
        selector: "driver",
        num_args: 0,
        num_temps: 0,
        literals: vec![Lit::Symbol(selector), receiver, argument],
        bytecode: vec![33, 34, 224, 124],
        has_primitive: false,
    }
}

// --- SmallInteger arithmetic (1-17) ---

fn arith_world(
    selector: &'static str,
    number: u16,
    receiver: i64,
    argument: i64,
) -> (Interpreter, Oop) {
    let world = WorldBuilder::new()
        .class_method(class_table::SMALL_INTEGER, MethodSpec::primitive(selector, 1, number))
        .driver(binary_driver(selector, Lit::Int(receiver), Lit::Int(argument)))
        .build();
    run(world)
}

#[test]
fn small_int_add_sub_mul() {
    assert_eq!(arith_world("+", 1, 3, 4).1, int(7));
    assert_eq!(arith_world("-", 2, 3, 4).1, int(-1));
    assert_eq!(arith_world("*", 9, 6, 7).1, int(42));
}

#[test]
fn small_int_overflow_fails_to_fallback() {
    // the fallback body of MethodSpec::primitive answers nil
    let (vm, value) = arith_world("+", 1, SMALL_INT_MAX, 1);
    assert_eq!(value, vm.memory.nil());
}

#[test]
fn small_int_comparisons() {
    let (vm, value) = arith_world("<", 3, 3, 4);
    assert_eq!(value, vm.memory.true_oop());
    let (vm, value) = arith_world(">", 4, 3, 4);
    assert_eq!(value, vm.memory.false_oop());
    let (vm, value) = arith_world("=", 7, 5, 5);
    assert_eq!(value, vm.memory.true_oop());
    let (vm, value) = arith_world("~=", 8, 5, 5);
    assert_eq!(value, vm.memory.false_oop());
}

#[test]
fn small_int_division_family() {
    assert_eq!(arith_world("/", 10, 12, 4).1, int(3));
    // inexact division fails into the fallback
    let (vm, value) = arith_world("/", 10, 13, 4);
    assert_eq!(value, vm.memory.nil());
    // floored mod and div follow the divisor's sign
    assert_eq!(arith_world("\\\\", 11, -7, 2).1, int(1));
    assert_eq!(arith_world("//", 12, -7, 2).1, int(-4));
    // quo: truncates toward zero
    assert_eq!(arith_world("quo:", 13, -7, 2).1, int(-3));
    // division by zero always fails
    let (vm, value) = arith_world("//", 12, 7, 0);
    assert_eq!(value, vm.memory.nil());
}

#[test]
fn small_int_bit_ops() {
    assert_eq!(arith_world("bitAnd:", 14, 0b1100, 0b1010).1, int(0b1000));
    assert_eq!(arith_world("bitOr:", 15, 0b1100, 0b1010).1, int(0b1110));
    assert_eq!(arith_world("bitXor:", 16, 0b1100, 0b1010).1, int(0b0110));
    assert_eq!(arith_world("bitShift:", 17, 1, 4).1, int(16));
    assert_eq!(arith_world("bitShift:", 17, 16, -4).1, int(1));
    // shifting a bit out of the 61-bit range fails
    let (vm, value) = arith_world("bitShift:", 17, 1, 61);
    assert_eq!(value, vm.memory.nil());
}

// --- LargeInteger arithmetic (21-33) ---

#[test]
fn large_add_carries_across_the_magnitude() {
    // 2^61 (not a SmallInteger) + 1
    let magnitude: &[u8] = &[0, 0, 0, 0, 0, 0, 0, 0x20];
    let world = WorldBuilder::new()
        .class_method(
            class_table::LARGE_POSITIVE_INTEGER,
            MethodSpec::primitive("largeAdd:", 1, 21),
        )
        .driver(binary_driver("largeAdd:", Lit::LargePos(magnitude), Lit::Int(1)))
        .build();
    let (vm, value) = run(world);
    let obj = vm.memory.heap_object(value).unwrap();
    assert_eq!(obj.class_index, class_table::LARGE_POSITIVE_INTEGER);
    assert_eq!(vm.memory.payload(&obj).unwrap(), &[1, 0, 0, 0, 0, 0, 0, 0x20]);
}

#[test]
fn large_results_shrink_to_small_integers() {
    let world = WorldBuilder::new()
        .class_method(
            class_table::LARGE_POSITIVE_INTEGER,
            MethodSpec::primitive("largeSub:", 1, 22),
        )
        .driver(binary_driver(
            "largeSub:",
            Lit::LargePos(&[0, 0, 0, 0, 0, 0, 0, 0x20]),
            Lit::LargePos(&[0, 0, 0, 0, 0, 0, 0, 0x20]),
        ))
        .build();
    let (_, value) = run(world);
    assert_eq!(value, int(0));
}

#[test]
fn large_negative_sign_comes_from_the_class() {
    let world = WorldBuilder::new()
        .class_method(
            class_table::LARGE_NEGATIVE_INTEGER,
            MethodSpec::primitive("largeLess:", 1, 23),
        )
        .driver(binary_driver("largeLess:", Lit::LargeNeg(&[0, 0, 0, 0, 0, 0, 0, 0x20]), Lit::Int(0)))
        .build();
    let (vm, value) = run(world);
    assert_eq!(value, vm.memory.true_oop());
}

#[test]
fn large_multiply() {
    // 2^61 * 2 = 2^62
    let world = WorldBuilder::new()
        .class_method(
            class_table::LARGE_POSITIVE_INTEGER,
            MethodSpec::primitive("largeMul:", 1, 29),
        )
        .driver(binary_driver("largeMul:", Lit::LargePos(&[0, 0, 0, 0, 0, 0, 0, 0x20]), Lit::Int(2)))
        .build();
    let (vm, value) = run(world);
    let obj = vm.memory.heap_object(value).unwrap();
    assert_eq!(vm.memory.payload(&obj).unwrap(), &[0, 0, 0, 0, 0, 0, 0, 0x40]);
}

// --- floats (40-51, 541-551) ---

#[test]
fn small_int_as_float() {
    let world = WorldBuilder::new()
        .class_method(class_table::SMALL_INTEGER, MethodSpec::primitive("asFloat", 0, 40))
        .driver(MethodSpec {
            selector: "driver",
            num_args: 0,
            num_temps: 0,
            literals: vec![Lit::Symbol("asFloat"), Lit::Int(3)],
            bytecode: vec![33, 208, 124],
            has_primitive: false,
        })
        .build();
    let (_, value) = run(world);
    assert_eq!(value, immediate::small_float(3.0).unwrap());
}

#[test]
fn float_arithmetic_stays_small_when_it_fits() {
    let a = immediate::small_float(1.5).unwrap();
    let b = immediate::small_float(2.25).unwrap();
    let world = WorldBuilder::new()
        .class_method(class_table::SMALL_FLOAT, MethodSpec::primitive("fadd:", 1, 541))
        .driver(binary_driver("fadd:", Lit::Raw(a.bits()), Lit::Raw(b.bits())))
        .build();
    let (_, value) = run(world);
    assert_eq!(value, immediate::small_float(3.75).unwrap());
}

#[test]
fn float_overflow_boxes() {
    let x = immediate::small_float((2.0f64).powi(200)).unwrap();
    let world = WorldBuilder::new()
        .class_method(class_table::SMALL_FLOAT, MethodSpec::primitive("fmul:", 1, 549))
        .driver(binary_driver("fmul:", Lit::Raw(x.bits()), Lit::Raw(x.bits())))
        .build();
    let (vm, value) = run(world);
    assert!(value.is_pointer());
    let expected = (2.0f64).powi(400);
    assert_eq!(super::arithmetic::float_value(&vm, value).unwrap(), expected);
}

#[test]
fn float_compare_and_divide_by_zero() {
    let a = immediate::small_float(1.0).unwrap();
    let zero = immediate::small_float(0.0).unwrap();
    let world = WorldBuilder::new()
        .class_method(class_table::SMALL_FLOAT, MethodSpec::primitive("flt:", 1, 543))
        .driver(binary_driver("flt:", Lit::Raw(zero.bits()), Lit::Raw(a.bits())))
        .build();
    let (vm, value) = run(world);
    assert_eq!(value, vm.memory.true_oop());

    let world = WorldBuilder::new()
        .class_method(class_table::SMALL_FLOAT, MethodSpec::primitive("fdiv:", 1, 550))
        .driver(binary_driver("fdiv:", Lit::Raw(a.bits()), Lit::Raw(zero.bits())))
        .build();
    let (vm, value) = run(world);
    assert_eq!(value, vm.memory.nil(), "zero divide fails into the fallback");
}

#[test]
fn float_truncated() {
    let a = immediate::small_float(3.75).unwrap();
    let world = WorldBuilder::new()
        .class_method(class_table::SMALL_FLOAT, MethodSpec::primitive("trunc", 0, 551))
        .driver(MethodSpec {
            selector: "driver",
            num_args: 0,
            num_temps: 0,
            literals: vec![Lit::Symbol("trunc"), Lit::Raw(a.bits())],
            bytecode: vec![33, 208, 124],
            has_primitive: false,
        })
        .build();
    let (_, value) = run(world);
    assert_eq!(value, int(3));
}

// --- indexed access (60-64, 105) ---

#[test]
fn array_at_and_at_put() {
    let world = WorldBuilder::new()
        .class_method(class_table::ARRAY, MethodSpec::primitive("at:", 1, 60))
        .class_method(class_table::ARRAY, MethodSpec::primitive("at:put:", 2, 61))
        .driver(driver_at_put())
        .build();
    let (_, value) = run(world);
    assert_eq!(value, int(2));
}

fn driver_at_put() -> MethodSpec<'static> {
    MethodSpec {
        selector: "driver",
        num_args: 0,
        num_temps: 0,
        literals: vec![Lit::Symbol("at:"), Lit::Symbol("at:put:")],
        // {-1. 0} dup at: 1 put: 2; pop; at: 1
        bytecode: vec![116, 117, 138, 0x82, 136, 118, 119, 241, 135, 118, 224, 124],
        has_primitive: false,
    }
}

#[test]
fn at_bounds_are_checked() {
    let world = WorldBuilder::new()
        .class_method(class_table::ARRAY, MethodSpec::primitive("at:", 1, 60))
        .driver(MethodSpec {
            selector: "driver",
            num_args: 0,
            num_temps: 0,
            literals: vec![Lit::Symbol("at:"), Lit::Int(3)],
            // {-1. 0} at: 3 -> out of range, fallback answers nil
            bytecode: vec![116, 117, 138, 0x82, 33, 224, 124],
            has_primitive: false,
        })
        .build();
    let (vm, value) = run(world);
    assert_eq!(value, vm.memory.nil());
}

#[test]
fn array_size() {
    let world = WorldBuilder::new()
        .class_method(class_table::ARRAY, MethodSpec::primitive("size", 0, 62))
        .driver(MethodSpec {
            selector: "driver",
            num_args: 0,
            num_temps: 0,
            literals: vec![Lit::Symbol("size")],
            bytecode: vec![116, 117, 138, 0x82, 208, 124],
            has_primitive: false,
        })
        .build();
    let (_, value) = run(world);
    assert_eq!(value, int(2));
}

#[test]
fn string_at_answers_characters() {
    let world = WorldBuilder::new()
        .class_method(test_class::SYMBOL, MethodSpec::primitive("sat:", 1, 63))
        .driver(binary_driver("sat:", Lit::Symbol("abc"), Lit::Int(2)))
        .build();
    let (_, value) = run(world);
    assert_eq!(value, immediate::character(u32::from(b'b')));
}

#[test]
fn replace_from_to_copies_bytes() {
    let world = WorldBuilder::new().build();
    let mut vm = world.interpreter();
    let class = vm.memory.class_at(class_table::BYTE_STRING).unwrap();
    let target = vm.memory.allocate(class, 5).unwrap();
    let target_obj = vm.memory.heap_object(target).unwrap();
    let source = vm.memory.allocate(class, 5).unwrap();
    let source_obj = vm.memory.heap_object(source).unwrap();
    vm.memory.payload_mut(&source_obj).unwrap().copy_from_slice(b"hello");

    // replaceFrom: 2 to: 4 with: source startingAt: 1
    let ctx = make_activation(
        &mut vm,
        target,
        &[int(2), int(4), source, int(1)],
        4,
    );
    vm.set_current_context(ctx);
    super::indexable::replace_from_to(&mut vm).unwrap();
    assert_eq!(vm.memory.payload(&target_obj).unwrap(), b"\0hel\0");
}

/// Build a bare activation for direct primitive-handler tests.
fn make_activation(vm: &mut Interpreter, receiver: Oop, args: &[Oop], num_args: u8) -> Oop {
    use crate::testkit::pack_method_header;
    let class = vm.memory.class_at(test_class::COMPILED_METHOD).unwrap();
    let method = vm.memory.allocate(class, 24).unwrap();
    let method_obj = vm.memory.heap_object(method).unwrap();
    let header = pack_method_header(num_args, num_args, false, 0);
    vm.memory
        .payload_mut(&method_obj)
        .unwrap()[..8]
        .copy_from_slice(&int(header).bits().to_le_bytes());
    let decoded = crate::method::CompiledMethod::decode(&vm.memory, method).unwrap();
    let nil = vm.memory.nil();
    crate::context::new_activation(&mut vm.memory, &decoded, receiver, args, nil)
        .unwrap()
}

// --- instantiation, identity, copying ---

#[test]
fn basic_new_and_sized() {
    let world = WorldBuilder::new()
        .class_method(test_class::METACLASS, MethodSpec::primitive("basicNew", 0, 70))
        .class_method(test_class::METACLASS, MethodSpec::primitive("basicNew:", 1, 71))
        .driver(MethodSpec {
            selector: "driver",
            num_args: 0,
            num_temps: 1,
            literals: vec![
                Lit::Symbol("basicNew"),
                Lit::Symbol("basicNew:"),
                Lit::Class(test_class::PROBE),
                Lit::Class(class_table::ARRAY),
                Lit::Int(3),
            ],
            // t0 := Probe basicNew. {t0. Array basicNew: 3}
            bytecode: vec![34, 208, 104, 16, 35, 36, 225, 138, 0x82, 124],
            has_primitive: false,
        })
        .build();
    let (vm, value) = run(world);
    let pair = vm.memory.heap_object(value).unwrap();
    let probe = vm.memory.heap_object(vm.memory.slot(&pair, 0).unwrap()).unwrap();
    assert_eq!(probe.class_index, test_class::PROBE);
    assert_eq!(probe.slot_count, 2);
    let array = vm.memory.heap_object(vm.memory.slot(&pair, 1).unwrap()).unwrap();
    assert_eq!(array.class_index, class_table::ARRAY);
    assert_eq!(array.slot_count, 3);
}

#[test]
fn identity_hash_is_assigned_once() {
    let world = WorldBuilder::new()
        .method(MethodSpec::primitive("hash", 0, 75))
        .driver(MethodSpec {
            selector: "driver",
            num_args: 0,
            num_temps: 0,
            literals: vec![Lit::Symbol("hash")],
            // {self hash. self hash}
            bytecode: vec![112, 208, 112, 208, 138, 0x82, 124],
            has_primitive: false,
        })
        .build();
    let (vm, value) = run(world);
    let pair = vm.memory.heap_object(value).unwrap();
    let first = vm.memory.slot(&pair, 0).unwrap();
    let second = vm.memory.slot(&pair, 1).unwrap();
    assert!(first.is_small_int());
    assert_ne!(first, int(0));
    assert_eq!(first, second);
}

#[test]
fn identity_of_immediates() {
    let world = WorldBuilder::new()
        .class_method(class_table::SMALL_INTEGER, MethodSpec::primitive("eq:", 1, 110))
        .driver(binary_driver("eq:", Lit::Int(7), Lit::Int(7)))
        .build();
    let (vm, value) = run(world);
    assert_eq!(value, vm.memory.true_oop());
}

#[test]
fn class_primitive() {
    let world = WorldBuilder::new()
        .method(MethodSpec::primitive("klass", 0, 111))
        .driver(MethodSpec {
            selector: "driver",
            num_args: 0,
            num_temps: 0,
            literals: vec![Lit::Symbol("klass")],
            bytecode: vec![112, 208, 124],
            has_primitive: false,
        })
        .build();
    let probe_class = world.classes[&test_class::PROBE];
    let (_, value) = run(world);
    assert_eq!(value, probe_class);
}

#[test]
fn shallow_copy_clones_slots() {
    let world = WorldBuilder::new()
        .method(MethodSpec::primitive("copy", 0, 148))
        .driver(MethodSpec {
            selector: "driver",
            num_args: 0,
            num_temps: 0,
            literals: vec![Lit::Symbol("copy")],
            // self instVar0 := 2, then ^self copy
            bytecode: vec![119, 96, 112, 208, 124],
            has_primitive: false,
        })
        .build();
    let probe = world.probe;
    let (vm, value) = run(world);
    assert_ne!(value, probe);
    let copy = vm.memory.heap_object(value).unwrap();
    assert_eq!(copy.class_index, test_class::PROBE);
    assert_eq!(vm.memory.slot(&copy, 0).unwrap(), int(2));
}

#[test]
fn make_point() {
    let world = WorldBuilder::new()
        .class_method(class_table::SMALL_INTEGER, MethodSpec::primitive("@", 1, 18))
        .driver(binary_driver("@", Lit::Int(3), Lit::Int(4)))
        .build();
    let (vm, value) = run(world);
    let point = vm.memory.heap_object(value).unwrap();
    assert_eq!(point.class_index, test_class::POINT);
    assert_eq!(vm.memory.slot(&point, 0).unwrap(), int(3));
    assert_eq!(vm.memory.slot(&point, 1).unwrap(), int(4));
}

// --- VM housekeeping ---

#[test]
fn vm_parameter_reads_the_word_size() {
    let world = WorldBuilder::new()
        .method(MethodSpec::primitive("param:", 1, 254))
        .driver(MethodSpec {
            selector: "driver",
            num_args: 0,
            num_temps: 0,
            literals: vec![Lit::Symbol("param:"), Lit::Int(40)],
            bytecode: vec![112, 33, 224, 124],
            has_primitive: false,
        })
        .build();
    let (_, value) = run(world);
    assert_eq!(value, int(8));
}

#[test]
fn clocks_answer_small_integers() {
    let world = WorldBuilder::new()
        .method(MethodSpec::primitive("usecs", 0, 240))
        .driver(MethodSpec {
            selector: "driver",
            num_args: 0,
            num_temps: 0,
            literals: vec![Lit::Symbol("usecs")],
            bytecode: vec![112, 208, 124],
            has_primitive: false,
        })
        .build();
    let (_, value) = run(world);
    assert!(value.is_small_int());
    assert!(immediate::small_int_value(value) > 1_600_000_000_000_000); // after 2020
}

#[test]
fn special_objects_oop_primitive() {
    let world = WorldBuilder::new()
        .method(MethodSpec::primitive("specials", 0, 129))
        .driver(MethodSpec {
            selector: "driver",
            num_args: 0,
            num_temps: 0,
            literals: vec![Lit::Symbol("specials")],
            bytecode: vec![112, 208, 124],
            has_primitive: false,
        })
        .build();
    let special = world.memory.special_objects();
    let (_, value) = run(world);
    assert_eq!(value, special);
}

#[test]
fn unknown_primitive_numbers_fail() {
    let world = WorldBuilder::new()
        .method(MethodSpec::primitive("nope", 0, 9999))
        .driver(MethodSpec {
            selector: "driver",
            num_args: 0,
            num_temps: 0,
            literals: vec![Lit::Symbol("nope")],
            bytecode: vec![112, 208, 124],
            has_primitive: false,
        })
        .build();
    let (vm, value) = run(world);
    assert_eq!(value, vm.memory.nil());
}

#[test]
fn quit_primitive_stops_the_vm() {
    let world = WorldBuilder::new()
        .method(MethodSpec::primitive("quit", 0, 113))
        .driver(MethodSpec {
            selector: "driver",
            num_args: 0,
            num_temps: 0,
            literals: vec![Lit::Symbol("quit")],
            bytecode: vec![112, 208, 124],
            has_primitive: false,
        })
        .build();
    let mut vm = world.interpreter();
    assert!(matches!(vm.run(100), Err(crate::interpreter::VmError::Quit)));
}

#[test]
fn signal_at_arms_the_timer() {
    let world = WorldBuilder::new()
        .method(MethodSpec {
            selector: "arm:at:",
            num_args: 2,
            num_temps: 2,
            literals: vec![],
            bytecode: vec![139, 242, 0, 115, 124],
            has_primitive: true,
        })
        .driver(MethodSpec {
            selector: "driver",
            num_args: 0,
            num_temps: 0,
            literals: vec![Lit::Symbol("arm:at:"), Lit::Semaphore, Lit::Int(5_000)],
            bytecode: vec![112, 33, 34, 240, 124],
            has_primitive: false,
        })
        .build();
    let semaphore = world.semaphores[0];
    let (vm, _) = run(world);
    assert_eq!(
        vm.memory.special(sova_objects::known::special::TIMER_SEMAPHORE).unwrap(),
        semaphore
    );
}
