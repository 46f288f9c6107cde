//! Interactive REPL with persistent compiler and VM state.

use std::io::{self, BufRead, Write};
use std::mem;
use std::path::PathBuf;

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::bytecode::builtins::BUILTINS;
use crate::bytecode::symbol_table::SymbolTable;
use crate::bytecode::value::Value;
use crate::bytecode::vm::{Vm, GLOBALS_SIZE};
use crate::bytecode::Compiler;
use crate::error::PebbleError;
use crate::lexer::Scanner;
use crate::parser::Parser;

const PROMPT: &str = ">> ";
const HISTORY_FILE: &str = ".pebble_history";

/// The REPL threads the global symbol table, the constant pool, and the
/// globals array through every line, so bindings survive between inputs.
pub struct Repl {
    symbol_table: SymbolTable,
    constants: Vec<Value>,
    globals: Vec<Value>,
}

impl Repl {
    pub fn new() -> Self {
        let mut symbol_table = SymbolTable::new();
        for (index, builtin) in BUILTINS.iter().enumerate() {
            symbol_table.define_builtin(index, builtin.name);
        }

        Self {
            symbol_table,
            constants: Vec::new(),
            globals: vec![Value::Null; GLOBALS_SIZE],
        }
    }

    pub fn run(&mut self) {
        println!("Pebble REPL");
        println!("Type \".help\" for available commands.\n");

        let mut editor = match DefaultEditor::new() {
            Ok(editor) => editor,
            Err(_) => {
                println!("Warning: using basic input (no history)");
                self.run_basic();
                return;
            }
        };

        let history_file = Self::history_path();
        let _ = editor.load_history(&history_file);

        loop {
            match editor.readline(PROMPT) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = editor.add_history_entry(line);

                    match line {
                        ".exit" => break,
                        ".help" => {
                            println!(".help  show this help");
                            println!(".exit  leave the REPL");
                            continue;
                        }
                        _ => {}
                    }

                    self.eval_and_print(line);
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("{}", format!("Input error: {}", err).red());
                    break;
                }
            }
        }

        let _ = editor.save_history(&history_file);
    }

    /// Plain stdin fallback when no line editor is available.
    fn run_basic(&mut self) {
        let stdin = io::stdin();
        loop {
            print!("{}", PROMPT);
            let _ = io::stdout().flush();

            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == ".exit" {
                break;
            }

            self.eval_and_print(line);
        }
    }

    fn eval_and_print(&mut self, line: &str) {
        match self.eval_line(line) {
            Ok(value) => println!("{}", value),
            Err(err) => eprintln!("{}", err.to_string().red()),
        }
    }

    /// Compile and run one line, keeping compiler and VM state for the next.
    fn eval_line(&mut self, line: &str) -> Result<Value, PebbleError> {
        let tokens = Scanner::new(line).scan_tokens()?;
        let program = Parser::new(tokens).parse()?;

        let symbol_table = mem::take(&mut self.symbol_table);
        let constants = mem::take(&mut self.constants);
        let mut compiler = Compiler::with_state(symbol_table, constants);

        let compiled = compiler.compile(&program);
        let bytecode = compiler.bytecode();
        let (symbol_table, constants) = compiler.into_state();
        self.symbol_table = symbol_table;
        self.constants = constants;
        compiled?;

        let globals = mem::take(&mut self.globals);
        let mut vm = Vm::with_globals(bytecode, globals);
        let result = vm.run();
        let value = vm.last_popped().clone();
        self.globals = vm.into_globals();
        result?;

        Ok(value)
    }

    fn history_path() -> PathBuf {
        match dirs::home_dir() {
            Some(home) => home.join(HISTORY_FILE),
            None => PathBuf::from(HISTORY_FILE),
        }
    }
}

impl Default for Repl {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_survives_between_lines() {
        let mut repl = Repl::new();
        repl.eval_line("let x = 1;").expect("first line");
        let value = repl.eval_line("x + 41").expect("second line");
        assert_eq!(value, Value::Integer(42));
    }

    #[test]
    fn test_functions_survive_between_lines() {
        let mut repl = Repl::new();
        repl.eval_line("let add = fn(a, b) { a + b };")
            .expect("definition");
        let value = repl.eval_line("add(2, 3)").expect("call");
        assert_eq!(value, Value::Integer(5));
    }

    #[test]
    fn test_assignment_between_lines() {
        let mut repl = Repl::new();
        repl.eval_line("let x = 1;").expect("definition");
        repl.eval_line("x = x + 1;").expect("assignment");
        let value = repl.eval_line("x").expect("read");
        assert_eq!(value, Value::Integer(2));
    }

    #[test]
    fn test_error_keeps_repl_usable() {
        let mut repl = Repl::new();
        assert!(repl.eval_line("missing").is_err());
        let value = repl.eval_line("1 + 1").expect("still works");
        assert_eq!(value, Value::Integer(2));
    }

    #[test]
    fn test_builtins_available() {
        let mut repl = Repl::new();
        let value = repl.eval_line("len([1, 2, 3])").expect("builtin call");
        assert_eq!(value, Value::Integer(3));
    }
}
