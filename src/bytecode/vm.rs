//! Stack-based virtual machine executing Pebble bytecode.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::bytecode::builtins;
use crate::bytecode::compiler::Bytecode;
use crate::bytecode::instruction::{self, Opcode};
use crate::bytecode::value::{Builtin, Closure, CompiledFunction, HashPair, Value};
use crate::error::RuntimeError;

/// Capacity of the value stack. Locals live on this stack too.
pub const STACK_SIZE: usize = 2048;
/// Capacity of the globals array.
pub const GLOBALS_SIZE: usize = 65536;
/// Capacity of the call-frame stack.
pub const MAX_FRAMES: usize = 1024;

/// Result type for VM operations.
pub type VmResult<T> = Result<T, RuntimeError>;

/// One active call: the executing closure, an instruction pointer naming
/// the last-executed byte, and the stack index where its locals begin.
#[derive(Debug)]
struct Frame {
    closure: Rc<Closure>,
    ip: isize,
    base_pointer: usize,
}

impl Frame {
    fn new(closure: Rc<Closure>, base_pointer: usize) -> Self {
        Self {
            closure,
            ip: -1,
            base_pointer,
        }
    }
}

/// The virtual machine.
pub struct Vm {
    constants: Vec<Value>,
    stack: Vec<Value>,
    /// Next free stack slot; the top of the stack is `stack[sp - 1]`.
    sp: usize,
    globals: Vec<Value>,
    frames: Vec<Frame>,
}

impl Vm {
    /// Create a VM for a compiled program with a fresh globals array.
    pub fn new(bytecode: Bytecode) -> Self {
        Self::with_globals(bytecode, vec![Value::Null; GLOBALS_SIZE])
    }

    /// Create a VM reusing an existing globals array. The REPL uses this to
    /// keep top-level bindings alive across lines.
    pub fn with_globals(bytecode: Bytecode, globals: Vec<Value>) -> Self {
        // The outer instruction stream runs as a synthetic function with no
        // parameters and no locals.
        let main_function = CompiledFunction {
            instructions: bytecode.instructions,
            num_locals: 0,
            num_parameters: 0,
        };
        let main_closure = Rc::new(Closure {
            function: Rc::new(main_function),
            free: Vec::new(),
        });

        let mut frames = Vec::with_capacity(MAX_FRAMES);
        frames.push(Frame::new(main_closure, 0));

        Self {
            constants: bytecode.constants,
            stack: vec![Value::Null; STACK_SIZE],
            sp: 0,
            globals,
            frames,
        }
    }

    /// Tear the VM down into its globals array.
    pub fn into_globals(self) -> Vec<Value> {
        self.globals
    }

    /// The value sitting just above the stack top: the result of the most
    /// recent pop, i.e. the final expression of a finished program.
    pub fn last_popped(&self) -> &Value {
        &self.stack[self.sp]
    }

    /// Execute until the current frame's instructions are exhausted.
    pub fn run(&mut self) -> VmResult<()> {
        while let Some(byte) = self.fetch_opcode() {
            let op = Opcode::from_u8(byte).ok_or(RuntimeError::OpcodeUndefined(byte))?;

            match op {
                Opcode::Constant => {
                    let index = self.read_u16_operand() as usize;
                    let constant = self.constants[index].clone();
                    self.push(constant)?;
                }

                Opcode::Add
                | Opcode::Sub
                | Opcode::Mul
                | Opcode::Div
                | Opcode::Mod
                | Opcode::Equal
                | Opcode::NotEqual
                | Opcode::GreaterThan
                | Opcode::LessThan
                | Opcode::GreaterOrEqual
                | Opcode::LessOrEqual => {
                    self.execute_binary_operation(op)?;
                }

                Opcode::Minus => {
                    let operand = self.pop();
                    match operand {
                        Value::Integer(n) => self.push(Value::Integer(n.wrapping_neg()))?,
                        other => {
                            return Err(RuntimeError::UnsupportedUnaryType(other.type_name()))
                        }
                    }
                }

                Opcode::Bang => {
                    let operand = self.pop();
                    let negated = match operand {
                        Value::Boolean(b) => !b,
                        Value::Null => true,
                        _ => false,
                    };
                    self.push(Value::Boolean(negated))?;
                }

                Opcode::True => self.push(Value::Boolean(true))?,
                Opcode::False => self.push(Value::Boolean(false))?,
                Opcode::Null => self.push(Value::Null)?,

                Opcode::JumpNotTruthy => {
                    let target = self.read_u16_operand() as isize;
                    let condition = self.pop();
                    if !condition.is_truthy() {
                        self.current_frame_mut().ip = target - 1;
                    }
                }

                Opcode::Jump => {
                    let target = self.read_u16_operand() as isize;
                    self.current_frame_mut().ip = target - 1;
                }

                Opcode::SetGlobal => {
                    let index = self.read_u16_operand() as usize;
                    self.globals[index] = self.pop();
                }

                Opcode::GetGlobal => {
                    let index = self.read_u16_operand() as usize;
                    let value = self.globals[index].clone();
                    self.push(value)?;
                }

                Opcode::SetLocal => {
                    let index = self.read_u8_operand() as usize;
                    let base_pointer = self.current_frame().base_pointer;
                    self.stack[base_pointer + index] = self.pop();
                }

                Opcode::GetLocal => {
                    let index = self.read_u8_operand() as usize;
                    let base_pointer = self.current_frame().base_pointer;
                    let value = self.stack[base_pointer + index].clone();
                    self.push(value)?;
                }

                Opcode::GetBuiltin => {
                    let index = self.read_u8_operand() as usize;
                    let builtin = builtins::lookup(index).expect("builtin index out of range");
                    self.push(Value::Builtin(builtin))?;
                }

                Opcode::GetFree => {
                    let index = self.read_u8_operand() as usize;
                    let value = self.current_frame().closure.free[index].clone();
                    self.push(value)?;
                }

                Opcode::Closure => {
                    let fn_index = self.read_u16_operand() as usize;
                    let num_free = self.read_u8_operand() as usize;
                    self.push_closure(fn_index, num_free)?;
                }

                Opcode::Array => {
                    let count = self.read_u16_operand() as usize;
                    let elements = self.stack[self.sp - count..self.sp].to_vec();
                    self.sp -= count;
                    self.push(Value::Array(Rc::new(elements)))?;
                }

                Opcode::Hash => {
                    // The operand counts stack values, two per pair.
                    let count = self.read_u16_operand() as usize;
                    let hash = self.build_hash(count)?;
                    self.sp -= count;
                    self.push(hash)?;
                }

                Opcode::Index => {
                    let index = self.pop();
                    let left = self.pop();
                    self.execute_index_expression(left, index)?;
                }

                Opcode::Call => {
                    let num_args = self.read_u8_operand() as usize;
                    self.execute_call(num_args)?;
                }

                Opcode::ReturnValue => {
                    let return_value = self.pop();
                    let frame = self.pop_frame();
                    if self.frames.is_empty() {
                        // A return at the top level halts the program with
                        // its value as the final result.
                        self.sp = 0;
                        self.push(return_value)?;
                        self.pop();
                        return Ok(());
                    }
                    self.sp = frame.base_pointer - 1;
                    self.push(return_value)?;
                }

                Opcode::Return => {
                    let frame = self.pop_frame();
                    self.sp = frame.base_pointer - 1;
                    self.push(Value::Null)?;
                }

                Opcode::Pop => {
                    self.pop();
                }
            }
        }

        Ok(())
    }

    // ===== Fetch/decode =====

    /// Advance past the current instruction and read the next opcode byte,
    /// or `None` when the current frame's instructions are exhausted.
    fn fetch_opcode(&mut self) -> Option<u8> {
        let frame = self.current_frame_mut();
        if frame.ip + 1 >= frame.closure.function.instructions.len() as isize {
            return None;
        }
        frame.ip += 1;
        Some(frame.closure.function.instructions[frame.ip as usize])
    }

    fn read_u8_operand(&mut self) -> u8 {
        let frame = self.current_frame_mut();
        let operand = frame.closure.function.instructions[(frame.ip + 1) as usize];
        frame.ip += 1;
        operand
    }

    fn read_u16_operand(&mut self) -> u16 {
        let frame = self.current_frame_mut();
        let operand = instruction::read_u16(
            &frame.closure.function.instructions,
            (frame.ip + 1) as usize,
        );
        frame.ip += 2;
        operand
    }

    // ===== Operations =====

    fn execute_binary_operation(&mut self, op: Opcode) -> VmResult<()> {
        let right = self.pop();
        let left = self.pop();

        match (&left, &right) {
            (Value::Integer(l), Value::Integer(r)) => {
                self.execute_integer_operation(op, *l, *r)
            }
            (Value::String(l), Value::String(r)) => {
                if op == Opcode::Add {
                    self.push(Value::string(format!("{}{}", l, r)))
                } else {
                    Err(RuntimeError::UnknownStringOperator(format!("{:?}", op)))
                }
            }
            _ => Err(RuntimeError::UnsupportedBinaryTypes {
                left: left.type_name(),
                right: right.type_name(),
            }),
        }
    }

    fn execute_integer_operation(&mut self, op: Opcode, left: i64, right: i64) -> VmResult<()> {
        let value = match op {
            Opcode::Add => Value::Integer(left.wrapping_add(right)),
            Opcode::Sub => Value::Integer(left.wrapping_sub(right)),
            Opcode::Mul => Value::Integer(left.wrapping_mul(right)),
            Opcode::Div => {
                if right == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                Value::Integer(left.wrapping_div(right))
            }
            Opcode::Mod => {
                if right == 0 {
                    return Err(RuntimeError::ModuloByZero);
                }
                Value::Integer(left.wrapping_rem(right))
            }
            Opcode::Equal => Value::Boolean(left == right),
            Opcode::NotEqual => Value::Boolean(left != right),
            Opcode::GreaterThan => Value::Boolean(left > right),
            Opcode::LessThan => Value::Boolean(left < right),
            Opcode::GreaterOrEqual => Value::Boolean(left >= right),
            Opcode::LessOrEqual => Value::Boolean(left <= right),
            _ => unreachable!("not an integer operator: {:?}", op),
        };
        self.push(value)
    }

    fn build_hash(&mut self, count: usize) -> VmResult<Value> {
        let start = self.sp - count;
        let mut pairs = IndexMap::with_capacity(count / 2);

        let mut i = start;
        while i < self.sp {
            let key = self.stack[i].clone();
            let value = self.stack[i + 1].clone();
            let hash_key = key.hash_key()?;
            pairs.insert(hash_key, HashPair { key, value });
            i += 2;
        }

        Ok(Value::Hash(Rc::new(pairs)))
    }

    fn execute_index_expression(&mut self, left: Value, index: Value) -> VmResult<()> {
        match (&left, &index) {
            (Value::Array(elements), Value::Integer(i)) => {
                let value = if *i < 0 || *i >= elements.len() as i64 {
                    Value::Null
                } else {
                    elements[*i as usize].clone()
                };
                self.push(value)
            }
            (Value::Hash(pairs), _) => {
                let key = index.hash_key()?;
                let value = pairs
                    .get(&key)
                    .map(|pair| pair.value.clone())
                    .unwrap_or(Value::Null);
                self.push(value)
            }
            _ => Err(RuntimeError::IndexUnsupported(left.type_name())),
        }
    }

    fn execute_call(&mut self, num_args: usize) -> VmResult<()> {
        let callee = self.stack[self.sp - 1 - num_args].clone();
        match callee {
            Value::Closure(closure) => self.call_closure(closure, num_args),
            Value::CompiledFunction(function) => {
                // A bare function constant behaves like a closure with no
                // captures.
                let closure = Rc::new(Closure {
                    function,
                    free: Vec::new(),
                });
                self.call_closure(closure, num_args)
            }
            Value::Builtin(builtin) => self.call_builtin(builtin, num_args),
            other => Err(RuntimeError::NotCallable(other.type_name())),
        }
    }

    fn call_closure(&mut self, closure: Rc<Closure>, num_args: usize) -> VmResult<()> {
        if num_args != closure.function.num_parameters {
            return Err(RuntimeError::ArityMismatch {
                want: closure.function.num_parameters,
                got: num_args,
            });
        }
        if self.frames.len() >= MAX_FRAMES {
            return Err(RuntimeError::StackOverflow);
        }

        // Arguments already occupy the first local slots.
        let base_pointer = self.sp - num_args;
        let new_sp = base_pointer + closure.function.num_locals;
        if new_sp > STACK_SIZE {
            return Err(RuntimeError::StackOverflow);
        }

        self.frames.push(Frame::new(closure, base_pointer));
        self.sp = new_sp;
        Ok(())
    }

    fn call_builtin(&mut self, builtin: &'static Builtin, num_args: usize) -> VmResult<()> {
        let args = self.stack[self.sp - num_args..self.sp].to_vec();
        let result = (builtin.func)(&args)?;

        // Drop the arguments and the callee.
        self.sp -= num_args + 1;
        match result {
            Some(value) => self.push(value),
            None => self.push(Value::Null),
        }
    }

    fn push_closure(&mut self, fn_index: usize, num_free: usize) -> VmResult<()> {
        let function = match &self.constants[fn_index] {
            Value::CompiledFunction(function) => Rc::clone(function),
            other => return Err(RuntimeError::NotCallable(other.type_name())),
        };

        // The enclosing scope pushed the captures in free-symbol order.
        let free = self.stack[self.sp - num_free..self.sp].to_vec();
        self.sp -= num_free;

        self.push(Value::Closure(Rc::new(Closure { function, free })))
    }

    // ===== Stack & frames =====

    fn push(&mut self, value: Value) -> VmResult<()> {
        if self.sp >= STACK_SIZE {
            return Err(RuntimeError::StackOverflow);
        }
        self.stack[self.sp] = value;
        self.sp += 1;
        Ok(())
    }

    fn pop(&mut self) -> Value {
        let value = self.stack[self.sp - 1].clone();
        self.sp -= 1;
        value
    }

    fn current_frame(&self) -> &Frame {
        self.frames.last().expect("frame stack is empty")
    }

    fn current_frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("frame stack is empty")
    }

    fn pop_frame(&mut self) -> Frame {
        self.frames.pop().expect("frame stack is empty")
    }
}
