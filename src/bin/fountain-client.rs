#![deny(unsafe_code)]

use mimalloc::MiMalloc;
use std::{env, process::ExitCode};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> ExitCode {
    client::run(env::args_os())
}
