//! Pebble: a small, dynamically-typed language compiled to bytecode and
//! executed on a stack-based virtual machine.
//!
//! The pipeline is AST → Compiler → Bytecode {instructions, constants} →
//! VM → final stack-top value:
//!
//! ```
//! let value = pebble::interpret("let add = fn(a, b) { a + b }; add(1, 2)").unwrap();
//! assert_eq!(value, pebble::bytecode::Value::Integer(3));
//! ```

pub mod ast;
pub mod bytecode;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod repl;
pub mod span;

use std::path::Path;

use bytecode::{Bytecode, Compiler, Value, Vm};
use error::PebbleError;
use lexer::Scanner;
use parser::Parser;

/// Parse source code into an AST.
pub fn parse(source: &str) -> Result<ast::Program, PebbleError> {
    let tokens = Scanner::new(source).scan_tokens()?;
    let program = Parser::new(tokens).parse()?;
    Ok(program)
}

/// Compile source code to bytecode.
pub fn compile(source: &str) -> Result<Bytecode, PebbleError> {
    let program = parse(source)?;
    let mut compiler = Compiler::new();
    compiler.compile(&program)?;
    Ok(compiler.bytecode())
}

/// Compile and run source code, returning the value of its final
/// expression.
pub fn interpret(source: &str) -> Result<Value, PebbleError> {
    run_with_options(source, false)
}

/// Compile and run source code, optionally dumping the bytecode first.
pub fn run_with_options(source: &str, disassemble: bool) -> Result<Value, PebbleError> {
    let bytecode = compile(source)?;
    if disassemble {
        bytecode::print_disassembly(&bytecode);
    }

    let mut vm = Vm::new(bytecode);
    vm.run()?;
    Ok(vm.last_popped().clone())
}

/// Read and run a script file.
pub fn run_file(path: &Path, disassemble: bool) -> Result<Value, PebbleError> {
    let source = std::fs::read_to_string(path)?;
    run_with_options(&source, disassemble)
}
