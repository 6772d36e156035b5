// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! One-line bytecode mnemonics for tracing and diagnostics.

/// The mnemonic for an opcode byte.
#[must_use]
pub const fn mnemonic(opcode: u8) -> &'static str {
    match opcode {
        0..=15 => "pushRcvrInstvar",
        16..=31 => "pushTemp",
        32..=63 => "pushConstant",
        64..=95 => "pushLitVar",
        96..=103 => "popIntoRcvrInstvar",
        104..=111 => "popIntoTemp",
        112 => "pushSelf",
        113 => "pushTrue",
        114 => "pushFalse",
        115 => "pushNil",
        116..=119 => "pushInt",
        120 => "returnSelf",
        121 => "returnTrue",
        122 => "returnFalse",
        123 => "returnNil",
        124 => "returnTop",
        125 => "blockReturn",
        128 => "extendedPush",
        129 => "extendedStore",
        130 => "extendedStorePop",
        131 => "singleExtendedSend",
        132 => "doubleExtendedDoAnything",
        133 => "superSend",
        134 => "secondExtendedSend",
        135 => "pop",
        136 => "dup",
        137 => "pushThisContext",
        138 => "pushOrPopIntoArray",
        139 => "callPrimitive",
        140 => "pushRemoteTemp",
        141 => "storeRemoteTemp",
        142 => "popIntoRemoteTemp",
        143 => "pushClosure",
        144..=151 => "shortJump",
        152..=159 => "shortJumpFalse",
        160..=167 => "longJump",
        168..=171 => "longJumpTrue",
        172..=175 => "longJumpFalse",
        176..=207 => "sendSpecial",
        208..=223 => "send0Args",
        224..=239 => "send1Arg",
        240..=255 => "send2Args",
        _ => "unknown",
    }
}
