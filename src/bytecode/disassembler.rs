//! Bytecode disassembler for debugging.

use std::fmt::Write;

use crate::bytecode::compiler::Bytecode;
use crate::bytecode::instruction::{read_operands, Opcode};
use crate::bytecode::value::Value;

/// Disassemble a compiled program: the outer instruction stream followed by
/// every function constant in the pool.
pub fn disassemble(bytecode: &Bytecode) -> String {
    let mut output = String::new();

    writeln!(&mut output, "== <main> ==").unwrap();
    disassemble_instructions(&bytecode.instructions, &bytecode.constants, &mut output);

    for (index, constant) in bytecode.constants.iter().enumerate() {
        if let Value::CompiledFunction(function) = constant {
            writeln!(
                &mut output,
                "\n== <fn {}> (locals: {}, parameters: {}) ==",
                index, function.num_locals, function.num_parameters
            )
            .unwrap();
            disassemble_instructions(&function.instructions, &bytecode.constants, &mut output);
        }
    }

    output
}

/// Disassemble one instruction stream into `output`.
pub fn disassemble_instructions(code: &[u8], constants: &[Value], output: &mut String) {
    let mut offset = 0;

    while offset < code.len() {
        offset = disassemble_instruction(code, constants, offset, output);
    }
}

/// Disassemble the single instruction at `offset`; returns the offset of
/// the next one.
fn disassemble_instruction(
    code: &[u8],
    constants: &[Value],
    offset: usize,
    output: &mut String,
) -> usize {
    write!(output, "{:04} ", offset).unwrap();

    let byte = code[offset];
    let Some(opcode) = Opcode::from_u8(byte) else {
        writeln!(output, "Unknown opcode {}", byte).unwrap();
        return offset + 1;
    };

    let (operands, read) = read_operands(opcode, code, offset + 1);

    match opcode {
        Opcode::Constant => {
            let index = operands[0];
            writeln!(
                output,
                "{:?} {} ({})",
                opcode,
                index,
                constant_str(constants, index)
            )
            .unwrap();
        }
        Opcode::Closure => {
            writeln!(
                output,
                "{:?} {} ({}) free={}",
                opcode,
                operands[0],
                constant_str(constants, operands[0]),
                operands[1]
            )
            .unwrap();
        }
        _ => match operands.as_slice() {
            [] => writeln!(output, "{:?}", opcode).unwrap(),
            [operand] => writeln!(output, "{:?} {}", opcode, operand).unwrap(),
            _ => writeln!(output, "{:?} {:?}", opcode, operands).unwrap(),
        },
    }

    offset + 1 + read
}

/// Display form of a constant, shortened for long strings.
fn constant_str(constants: &[Value], index: usize) -> String {
    match constants.get(index) {
        Some(Value::String(s)) if s.len() > 20 => format!("\"{}...\"", &s[..20]),
        Some(Value::String(s)) => format!("\"{}\"", s),
        Some(Value::CompiledFunction(_)) => format!("<fn {}>", index),
        Some(constant) => constant.to_string(),
        None => format!("?{}", index),
    }
}

/// Print a disassembly to stdout.
pub fn print_disassembly(bytecode: &Bytecode) {
    print!("{}", disassemble(bytecode));
}
