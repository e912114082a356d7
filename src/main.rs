#![allow(special_module_name)]

mod asm_main;
mod dis_main;
mod file_input_util;
mod file_output_util;
mod lib;

use std::thread;

use clap::{Parser, Subcommand};

use asm_main::assembler_main;
use asm_main::AssemblerCli;
use dis_main::disassembler_main;
use dis_main::DisassemblerCli;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Assemble text into class files
    Asm(AssemblerCli),
    /// Disassemble class files into text
    Dis(DisassemblerCli),
}

fn real_main() -> i32 {
    let cli = Cli::parse();
    let res = match cli.command {
        Command::Asm(cli) => assembler_main(cli),
        Command::Dis(cli) => disassembler_main(cli),
    };
    if let Err(err) = res {
        println!("Error: {:?}", err);
        // set exit code 1 if there were errors
        1
    } else {
        0
    }
}
fn main() {
    env_logger::init();
    // Deeply nested annotations recurse in both directions, so run everything on a thread with a 256mb stack.
    let child = match thread::Builder::new().stack_size(256 * 1024 * 1024).spawn(real_main) {
        Ok(child) => child,
        Err(err) => {
            eprintln!("Error: unable to spawn main thread: {}", err);
            std::process::exit(1);
        }
    };
    std::process::exit(child.join().unwrap_or(1));
}
