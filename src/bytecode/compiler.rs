//! Bytecode compiler: walks the AST and emits instructions.

use std::rc::Rc;

use crate::ast::{Expr, ExprKind, InfixOp, PrefixOp, Program, Stmt, StmtKind};
use crate::bytecode::builtins::BUILTINS;
use crate::bytecode::instruction::{self, Opcode};
use crate::bytecode::symbol_table::{Symbol, SymbolScope, SymbolTable};
use crate::bytecode::value::{CompiledFunction, Value};
use crate::error::CompileError;
use crate::span::Span;

/// Result type for compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// Jump operand emitted before the target is known; always patched.
const PLACEHOLDER: usize = 9999;

/// Compiler output: the flat instruction stream of the outermost scope plus
/// the constant pool of the whole compilation unit.
#[derive(Debug, Clone)]
pub struct Bytecode {
    pub instructions: Vec<u8>,
    pub constants: Vec<Value>,
}

/// Opcode and byte offset of an emitted instruction.
#[derive(Debug, Clone, Copy)]
struct EmittedInstruction {
    opcode: Opcode,
    position: usize,
}

/// Per-function emission state. Scopes stack as function literals nest.
#[derive(Debug, Default)]
struct CompilationScope {
    instructions: Vec<u8>,
    last_instruction: Option<EmittedInstruction>,
    previous_instruction: Option<EmittedInstruction>,
}

/// The bytecode compiler.
pub struct Compiler {
    constants: Vec<Value>,
    symbol_table: SymbolTable,
    scopes: Vec<CompilationScope>,
}

impl Compiler {
    /// Create a compiler with a fresh symbol table, with the builtin
    /// registry installed before any compilation.
    pub fn new() -> Self {
        let mut symbol_table = SymbolTable::new();
        for (index, builtin) in BUILTINS.iter().enumerate() {
            symbol_table.define_builtin(index, builtin.name);
        }
        Self::with_state(symbol_table, Vec::new())
    }

    /// Create a compiler that continues from existing state. The REPL uses
    /// this to keep globals and constants alive across lines.
    pub fn with_state(symbol_table: SymbolTable, constants: Vec<Value>) -> Self {
        Self {
            constants,
            symbol_table,
            scopes: vec![CompilationScope::default()],
        }
    }

    /// Tear the compiler down into its reusable state.
    pub fn into_state(self) -> (SymbolTable, Vec<Value>) {
        (self.symbol_table, self.constants)
    }

    /// Compile a whole program into the current (outermost) scope.
    pub fn compile(&mut self, program: &Program) -> CompileResult<()> {
        for stmt in &program.statements {
            self.compile_statement(stmt)?;
        }
        Ok(())
    }

    /// The compiled program. Call after `compile` has succeeded.
    pub fn bytecode(&self) -> Bytecode {
        Bytecode {
            instructions: self.scope().instructions.clone(),
            constants: self.constants.clone(),
        }
    }

    fn compile_statement(&mut self, stmt: &Stmt) -> CompileResult<()> {
        match &stmt.kind {
            StmtKind::Expression(expr) => {
                // Assignment is a statement form: it leaves nothing on the
                // stack, so there is nothing to pop afterwards.
                if let ExprKind::Infix {
                    left,
                    operator: InfixOp::Assign,
                    right,
                } = &expr.kind
                {
                    self.compile_assignment(left, right, expr.span)?;
                } else {
                    self.compile_expression(expr)?;
                    self.emit(Opcode::Pop, &[]);
                }
            }

            StmtKind::Let { name, value } => {
                self.compile_expression(value)?;
                let symbol = self.symbol_table.define(name);
                self.emit_store(&symbol);
            }

            StmtKind::Return(value) => {
                self.compile_expression(value)?;
                self.emit(Opcode::ReturnValue, &[]);
            }

            StmtKind::Block(statements) => {
                for stmt in statements {
                    self.compile_statement(stmt)?;
                }
            }
        }

        Ok(())
    }

    fn compile_expression(&mut self, expr: &Expr) -> CompileResult<()> {
        match &expr.kind {
            ExprKind::IntegerLiteral(n) => {
                let index = self.add_constant(Value::Integer(*n));
                self.emit(Opcode::Constant, &[index]);
            }

            ExprKind::StringLiteral(s) => {
                let index = self.add_constant(Value::string(s.clone()));
                self.emit(Opcode::Constant, &[index]);
            }

            ExprKind::BooleanLiteral(true) => {
                self.emit(Opcode::True, &[]);
            }
            ExprKind::BooleanLiteral(false) => {
                self.emit(Opcode::False, &[]);
            }

            ExprKind::Identifier(name) => {
                let symbol = self
                    .symbol_table
                    .resolve(name)
                    .ok_or_else(|| CompileError::undefined_variable(name, expr.span))?;
                self.load_symbol(&symbol);
            }

            ExprKind::Prefix { operator, operand } => {
                self.compile_expression(operand)?;
                match operator {
                    PrefixOp::Bang => self.emit(Opcode::Bang, &[]),
                    PrefixOp::Minus => self.emit(Opcode::Minus, &[]),
                };
            }

            ExprKind::Infix {
                left,
                operator,
                right,
            } => {
                if *operator == InfixOp::Assign {
                    return self.compile_assignment(left, right, expr.span);
                }
                self.compile_expression(left)?;
                self.compile_expression(right)?;
                let opcode = binary_opcode(*operator, expr.span)?;
                self.emit(opcode, &[]);
            }

            ExprKind::If {
                condition,
                consequence,
                alternative,
            } => {
                self.compile_expression(condition)?;
                let jump_not_truthy_pos = self.emit(Opcode::JumpNotTruthy, &[PLACEHOLDER]);

                self.compile_statement(consequence)?;
                if self.last_instruction_is(Opcode::Pop) {
                    self.remove_last_pop();
                }

                let jump_pos = self.emit(Opcode::Jump, &[PLACEHOLDER]);

                let after_consequence = self.scope().instructions.len();
                self.change_operand(jump_not_truthy_pos, after_consequence);

                match alternative {
                    None => {
                        self.emit(Opcode::Null, &[]);
                    }
                    Some(alt) => {
                        self.compile_statement(alt)?;
                        if self.last_instruction_is(Opcode::Pop) {
                            self.remove_last_pop();
                        }
                    }
                }

                let after_alternative = self.scope().instructions.len();
                self.change_operand(jump_pos, after_alternative);
            }

            ExprKind::While { condition, body } => {
                let loop_start = self.scope().instructions.len();

                self.compile_expression(condition)?;
                let jump_not_truthy_pos = self.emit(Opcode::JumpNotTruthy, &[PLACEHOLDER]);

                self.compile_statement(body)?;
                self.emit(Opcode::Jump, &[loop_start]);

                let after_loop = self.scope().instructions.len();
                self.change_operand(jump_not_truthy_pos, after_loop);

                // The while form itself evaluates to null.
                self.emit(Opcode::Null, &[]);
            }

            ExprKind::Function { parameters, body } => {
                self.enter_scope();

                for parameter in parameters {
                    self.symbol_table.define(&parameter.name);
                }

                self.compile_statement(body)?;

                if self.last_instruction_is(Opcode::Pop) {
                    self.replace_last_pop_with_return();
                }
                if !self.last_instruction_is(Opcode::ReturnValue) {
                    self.emit(Opcode::Return, &[]);
                }

                let free_symbols = self.symbol_table.free_symbols().to_vec();
                let num_locals = self.symbol_table.num_definitions();
                let instructions = self.leave_scope();

                // Load the captured values in the enclosing scope so that
                // CLOSURE can pop them in free-symbol order.
                for symbol in &free_symbols {
                    self.load_symbol(symbol);
                }

                let function = CompiledFunction {
                    instructions,
                    num_locals,
                    num_parameters: parameters.len(),
                };
                let fn_index = self.add_constant(Value::CompiledFunction(Rc::new(function)));
                self.emit(Opcode::Closure, &[fn_index, free_symbols.len()]);
            }

            ExprKind::Call { callee, arguments } => {
                self.compile_expression(callee)?;
                for argument in arguments {
                    self.compile_expression(argument)?;
                }
                self.emit(Opcode::Call, &[arguments.len()]);
            }

            ExprKind::Array(elements) => {
                for element in elements {
                    self.compile_expression(element)?;
                }
                self.emit(Opcode::Array, &[elements.len()]);
            }

            ExprKind::Hash(pairs) => {
                for (key, value) in pairs {
                    self.compile_expression(key)?;
                    self.compile_expression(value)?;
                }
                // The operand counts stack values, two per pair.
                self.emit(Opcode::Hash, &[pairs.len() * 2]);
            }

            ExprKind::Index { object, index } => {
                self.compile_expression(object)?;
                self.compile_expression(index)?;
                self.emit(Opcode::Index, &[]);
            }
        }

        Ok(())
    }

    fn compile_assignment(&mut self, left: &Expr, right: &Expr, span: Span) -> CompileResult<()> {
        let ExprKind::Identifier(name) = &left.kind else {
            return Err(CompileError::AssignmentTargetNotIdentifier(span));
        };

        self.compile_expression(right)?;

        let symbol = self
            .symbol_table
            .resolve(name)
            .ok_or_else(|| CompileError::undefined_variable(name, left.span))?;
        self.emit_store(&symbol);

        Ok(())
    }

    /// Emit the store matching a symbol's scope.
    fn emit_store(&mut self, symbol: &Symbol) {
        if symbol.scope == SymbolScope::Global {
            self.emit(Opcode::SetGlobal, &[symbol.index]);
        } else {
            self.emit(Opcode::SetLocal, &[symbol.index]);
        }
    }

    /// Emit the load matching a symbol's scope.
    fn load_symbol(&mut self, symbol: &Symbol) {
        match symbol.scope {
            SymbolScope::Global => self.emit(Opcode::GetGlobal, &[symbol.index]),
            SymbolScope::Local => self.emit(Opcode::GetLocal, &[symbol.index]),
            SymbolScope::Builtin => self.emit(Opcode::GetBuiltin, &[symbol.index]),
            SymbolScope::Free => self.emit(Opcode::GetFree, &[symbol.index]),
        };
    }

    // ===== Emission =====

    fn emit(&mut self, op: Opcode, operands: &[usize]) -> usize {
        let instruction = instruction::make(op, operands);
        let position = self.add_instruction(&instruction);
        self.set_last_instruction(op, position);
        position
    }

    fn add_instruction(&mut self, instruction: &[u8]) -> usize {
        let scope = self.scope_mut();
        let position = scope.instructions.len();
        scope.instructions.extend_from_slice(instruction);
        position
    }

    fn set_last_instruction(&mut self, opcode: Opcode, position: usize) {
        let scope = self.scope_mut();
        scope.previous_instruction = scope.last_instruction;
        scope.last_instruction = Some(EmittedInstruction { opcode, position });
    }

    fn last_instruction_is(&self, opcode: Opcode) -> bool {
        self.scope()
            .last_instruction
            .is_some_and(|last| last.opcode == opcode)
    }

    /// Drop the trailing pop so the enclosing expression keeps its value.
    fn remove_last_pop(&mut self) {
        let scope = self.scope_mut();
        if let Some(last) = scope.last_instruction {
            scope.instructions.truncate(last.position);
            scope.last_instruction = scope.previous_instruction;
        }
    }

    fn replace_instruction(&mut self, position: usize, new_instruction: &[u8]) {
        let instructions = &mut self.scope_mut().instructions;
        instructions[position..position + new_instruction.len()]
            .copy_from_slice(new_instruction);
    }

    /// Re-encode the operand of the instruction at `position`.
    fn change_operand(&mut self, position: usize, operand: usize) {
        let opcode = Opcode::from_u8(self.scope().instructions[position])
            .expect("patch position does not hold an opcode");
        let new_instruction = instruction::make(opcode, &[operand]);
        self.replace_instruction(position, &new_instruction);
    }

    /// Turn a function body's trailing pop into its return.
    fn replace_last_pop_with_return(&mut self) {
        if let Some(last) = self.scope().last_instruction {
            self.replace_instruction(last.position, &instruction::make(Opcode::ReturnValue, &[]));
            if let Some(last) = &mut self.scope_mut().last_instruction {
                last.opcode = Opcode::ReturnValue;
            }
        }
    }

    fn add_constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }

    // ===== Scopes =====

    fn scope(&self) -> &CompilationScope {
        self.scopes.last().expect("compiler has no open scope")
    }

    fn scope_mut(&mut self) -> &mut CompilationScope {
        self.scopes.last_mut().expect("compiler has no open scope")
    }

    fn enter_scope(&mut self) {
        self.scopes.push(CompilationScope::default());
        let outer = std::mem::take(&mut self.symbol_table);
        self.symbol_table = SymbolTable::enclosed(outer);
    }

    fn leave_scope(&mut self) -> Vec<u8> {
        let scope = self.scopes.pop().expect("compiler has no open scope");
        let inner = std::mem::take(&mut self.symbol_table);
        self.symbol_table = inner.into_outer().unwrap_or_default();
        scope.instructions
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a non-assignment infix operator to its opcode. Source operand order
/// is kept for every comparison; nothing is reversed.
fn binary_opcode(operator: InfixOp, span: Span) -> CompileResult<Opcode> {
    match operator {
        InfixOp::Add => Ok(Opcode::Add),
        InfixOp::Subtract => Ok(Opcode::Sub),
        InfixOp::Multiply => Ok(Opcode::Mul),
        InfixOp::Divide => Ok(Opcode::Div),
        InfixOp::Modulo => Ok(Opcode::Mod),
        InfixOp::Equal => Ok(Opcode::Equal),
        InfixOp::NotEqual => Ok(Opcode::NotEqual),
        InfixOp::Less => Ok(Opcode::LessThan),
        InfixOp::LessEqual => Ok(Opcode::LessOrEqual),
        InfixOp::Greater => Ok(Opcode::GreaterThan),
        InfixOp::GreaterEqual => Ok(Opcode::GreaterOrEqual),
        InfixOp::Assign => Err(CompileError::UnknownOperator {
            operator: operator.to_string(),
            span,
        }),
    }
}
