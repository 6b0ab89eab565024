mod utils;
mod error;
mod memory;
mod cpu;
mod instructions;
mod scheduler;
mod terminal;
mod run;

use run::{ Args, ExitKind };
use std::process::exit;

fn main() {
    let args: Args = argh::from_env();
    match run::run_from_args(args) {
        Ok(kind) =>
            match kind {
                ExitKind::Natural => {
                    exit(0);
                }
                ExitKind::Forced => {
                    exit(130);
                }
            }
        Err(e) => {
            log::error!("{}", e);
            eprintln!("An unexpected error occurred: {}", e);
            exit(1);
        }
    }
}
