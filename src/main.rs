//! Pebble CLI: execute script files, evaluate one-liners, or run the REPL.

use std::env;
use std::path::Path;
use std::process;

use colored::Colorize;

use pebble::repl::Repl;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// CLI command to execute.
enum Command {
    /// Run a script file
    Run { file: String },
    /// Evaluate a string and print the result
    Eval { code: String },
    /// Start the REPL
    Repl,
}

/// CLI options parsed from arguments.
struct Options {
    command: Command,
    disassemble: bool,
}

fn print_usage() {
    eprintln!("Pebble {} - the Pebble programming language", VERSION);
    eprintln!();
    eprintln!("Usage: pebble [options] [script.peb]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -e <code>            Evaluate code and print the result");
    eprintln!("  -d, --disassemble    Dump bytecode before running");
    eprintln!("  -h, --help           Show this help");
    eprintln!();
    eprintln!("With no script, an interactive REPL is started.");
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut command = None;
    let mut disassemble = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-d" | "--disassemble" => disassemble = true,
            "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            "-e" => {
                let code = iter
                    .next()
                    .ok_or_else(|| "-e requires an argument".to_string())?;
                command = Some(Command::Eval { code: code.clone() });
            }
            other if other.starts_with('-') => {
                return Err(format!("Unknown option: {}", other));
            }
            file => {
                if command.is_some() {
                    return Err(format!("Unexpected argument: {}", file));
                }
                command = Some(Command::Run {
                    file: file.to_string(),
                });
            }
        }
    }

    Ok(Options {
        command: command.unwrap_or(Command::Repl),
        disassemble,
    })
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();

    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{}", message.red());
            eprintln!();
            print_usage();
            process::exit(64);
        }
    };

    let result = match options.command {
        Command::Run { file } => {
            pebble::run_file(Path::new(&file), options.disassemble).map(|_| ())
        }
        Command::Eval { code } => pebble::run_with_options(&code, options.disassemble)
            .map(|value| println!("{}", value)),
        Command::Repl => {
            Repl::new().run();
            Ok(())
        }
    };

    if let Err(err) = result {
        eprintln!("{}", err.to_string().red());
        process::exit(1);
    }
}
