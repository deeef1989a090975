//! This is the `pyslot` binary. If you're looking to embed the slot machinery into your own
//! runtime, you're likely looking for the [`pyslot-vm`](pyslot_vm) crate.
//!
//! The binary builds an interpreter, defines a few classes the way a class statement would
//! and drives them through the operator entry points, printing what each step dispatched to:
//!
//! ```no_run
//! fn main() -> std::process::ExitCode {
//!     pyslot::run()
//! }
//! ```
#![allow(clippy::needless_doctest_main)]

mod scenarios;
mod settings;

pub use pyslot_vm;
pub use scenarios::Scenario;
pub use settings::{ArgError, RunMode, parse_opts};

use pyslot_vm::{Interpreter, native::NoNativeBridge};
use std::{process::ExitCode, sync::Arc};

/// The main cli of the `pyslot` binary.
pub fn run() -> ExitCode {
    env_logger::init();

    let (settings, mode) = match parse_opts() {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("pyslot: {err}");
            eprintln!("{}", settings::USAGE);
            return ExitCode::from(2);
        }
    };
    let scenarios = match mode {
        RunMode::Help => {
            println!("{}", settings::USAGE);
            return ExitCode::SUCCESS;
        }
        RunMode::All => Scenario::ALL.to_vec(),
        RunMode::One(scenario) => vec![scenario],
    };
    log::debug!("running {scenarios:?} with {settings:?}");

    let interp = Interpreter::with_settings(settings, Arc::new(NoNativeBridge));
    interp.enter(|vm| {
        let mut status = ExitCode::SUCCESS;
        for scenario in scenarios {
            println!("== {scenario}");
            match scenario.run(vm) {
                Ok(lines) => {
                    for line in lines {
                        println!("{line}");
                    }
                }
                Err(exc) => {
                    eprintln!("{}", exc.to_report());
                    status = ExitCode::FAILURE;
                }
            }
        }
        status
    })
}
