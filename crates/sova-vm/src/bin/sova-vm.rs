// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Sova launcher: load an image and interpret it.

use std::path::PathBuf;
use std::process::ExitCode;

use argh::FromArgs;
use sova_vm::image::Image;
use sova_vm::interpreter::{Interpreter, VmError};
use sova_vm::memory::ObjectMemory;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Run a 64-bit Spur Smalltalk image.
#[derive(FromArgs)]
struct Args {
    /// path to the image file
    #[argh(positional)]
    image: PathBuf,

    /// trace every bytecode (forces sova_vm=trace)
    #[argh(switch)]
    debug: bool,

    /// stop after this many bytecodes (0 = run forever)
    #[argh(option, default = "0")]
    steps: u64,
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("sova_vm=trace")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sova_vm=info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn run(args: &Args) -> Result<(), String> {
    let image = Image::load(&args.image).map_err(|e| e.to_string())?;
    info!(
        version = image.header.version,
        data_size = image.header.data_size,
        base = %format_args!("{:#x}", image.header.old_base_address),
        "image loaded"
    );
    let memory = ObjectMemory::from_image(&image).map_err(|e| e.to_string())?;
    let mut vm = Interpreter::new(memory).map_err(|e| e.to_string())?;

    match vm.run(args.steps) {
        Ok(Some(value)) => {
            info!(steps = vm.steps(), result = %value, "program finished");
            Ok(())
        }
        Ok(None) => {
            info!(steps = vm.steps(), "step limit reached");
            Ok(())
        }
        Err(VmError::Quit) => {
            info!(steps = vm.steps(), "image quit");
            Ok(())
        }
        Err(e) => Err(format!("after {} bytecodes: {e}", vm.steps())),
    }
}

fn main() -> ExitCode {
    let args: Args = argh::from_env();
    init_tracing(args.debug);
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("sova-vm: {message}");
            ExitCode::FAILURE
        }
    }
}
