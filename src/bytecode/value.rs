//! Runtime values for the Pebble VM.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::RuntimeError;

/// Signature of a host-provided built-in function. Returning `None` makes
/// the VM push null.
pub type BuiltinFn = fn(&[Value]) -> Result<Option<Value>, RuntimeError>;

/// An immutable code object produced by the compiler. The instruction
/// buffer never changes once the compiler closes the function's scope.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFunction {
    pub instructions: Vec<u8>,
    pub num_locals: usize,
    pub num_parameters: usize,
}

/// A compiled function paired with its captured free values; the callable
/// entity at runtime. Capture order matches the free-symbol order of the
/// defining scope, which is what `GetFree` indexes into.
#[derive(Debug, Clone, PartialEq)]
pub struct Closure {
    pub function: Rc<CompiledFunction>,
    pub free: Vec<Value>,
}

/// A named built-in function.
#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFn,
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builtin").field("name", &self.name).finish()
    }
}

impl PartialEq for Builtin {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.func as usize == other.func as usize
    }
}

/// Type tag of a hashable value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashTag {
    Integer,
    Boolean,
    String,
}

/// Digest defining equivalence for hashable values: the value's type tag
/// plus a 64-bit hash. Two hashable values are equal iff their keys are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashKey {
    pub tag: HashTag,
    pub value: u64,
}

/// A key-value entry of a hash, keeping the original key around for
/// inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct HashPair {
    pub key: Value,
    pub value: Value,
}

/// A tagged runtime value.
///
/// `Boolean(true)`, `Boolean(false)`, and `Null` act as the TRUE/FALSE/NULL
/// singletons: equality on them is representation-based, so every instance
/// of a given discriminant is the same value.
#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    Boolean(bool),
    String(Rc<String>),
    Null,
    Array(Rc<Vec<Value>>),
    Hash(Rc<IndexMap<HashKey, HashPair>>),
    CompiledFunction(Rc<CompiledFunction>),
    Closure(Rc<Closure>),
    Builtin(&'static Builtin),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Value {
        Value::String(Rc::new(s.into()))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "Integer",
            Value::Boolean(_) => "Boolean",
            Value::String(_) => "String",
            Value::Null => "Null",
            Value::Array(_) => "Array",
            Value::Hash(_) => "Hash",
            Value::CompiledFunction(_) => "Function",
            Value::Closure(_) => "Closure",
            Value::Builtin(_) => "Builtin",
        }
    }

    /// Truthiness used by conditional jumps: only `false` and `null` are
    /// falsy. `0`, `""`, and empty collections are truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Boolean(false) | Value::Null)
    }

    /// Compute the hash key of a hashable value (Integer, Boolean, String).
    pub fn hash_key(&self) -> Result<HashKey, RuntimeError> {
        match self {
            Value::Integer(n) => Ok(HashKey {
                tag: HashTag::Integer,
                value: *n as u64,
            }),
            Value::Boolean(b) => Ok(HashKey {
                tag: HashTag::Boolean,
                value: u64::from(*b),
            }),
            Value::String(s) => Ok(HashKey {
                tag: HashTag::String,
                value: fnv1a_64(s.as_bytes()),
            }),
            other => Err(RuntimeError::NotHashable(other.type_name())),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Hash(a), Value::Hash(b)) => a == b,
            (Value::CompiledFunction(a), Value::CompiledFunction(b)) => Rc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::String(s) => write!(f, "{}", s),
            Value::Null => write!(f, "null"),
            Value::Array(elements) => {
                write!(f, "[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", element)?;
                }
                write!(f, "]")
            }
            Value::Hash(pairs) => {
                write!(f, "{{")?;
                for (i, pair) in pairs.values().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", pair.key, pair.value)?;
                }
                write!(f, "}}")
            }
            Value::CompiledFunction(_) | Value::Closure(_) => write!(f, "<fn>"),
            Value::Builtin(builtin) => write!(f, "<builtin {}>", builtin.name),
        }
    }
}

/// FNV-1a 64-bit hash, used for string hash keys.
fn fnv1a_64(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    let mut hash = OFFSET_BASIS;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Boolean(false).is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(Value::Boolean(true).is_truthy());
        assert!(Value::Integer(0).is_truthy());
        assert!(Value::string("").is_truthy());
        assert!(Value::Array(Rc::new(Vec::new())).is_truthy());
    }

    #[test]
    fn test_string_hash_keys_match_by_content() {
        let a = Value::string("Hello World");
        let b = Value::string("Hello World");
        let c = Value::string("Something else");

        assert_eq!(a.hash_key().unwrap(), b.hash_key().unwrap());
        assert_ne!(a.hash_key().unwrap(), c.hash_key().unwrap());
    }

    #[test]
    fn test_hash_keys_distinguish_types() {
        let one = Value::Integer(1);
        let truthy = Value::Boolean(true);
        assert_ne!(one.hash_key().unwrap(), truthy.hash_key().unwrap());
    }

    #[test]
    fn test_negative_integer_hash_key() {
        let key = Value::Integer(-1).hash_key().unwrap();
        assert_eq!(key.tag, HashTag::Integer);
        assert_eq!(key.value, u64::MAX);
    }

    #[test]
    fn test_not_hashable() {
        let array = Value::Array(Rc::new(vec![Value::Integer(1)]));
        assert_eq!(
            array.hash_key().unwrap_err(),
            RuntimeError::NotHashable("Array")
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Integer(42).to_string(), "42");
        assert_eq!(Value::Boolean(true).to_string(), "true");
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::string("hi").to_string(), "hi");

        let array = Value::Array(Rc::new(vec![Value::Integer(1), Value::Integer(2)]));
        assert_eq!(array.to_string(), "[1, 2]");
    }

    #[test]
    fn test_hash_display_insertion_order() {
        let mut pairs = IndexMap::new();
        for (key, value) in [("one", 1), ("two", 2)] {
            let k = Value::string(key);
            pairs.insert(
                k.hash_key().unwrap(),
                HashPair {
                    key: k,
                    value: Value::Integer(value),
                },
            );
        }
        assert_eq!(Value::Hash(Rc::new(pairs)).to_string(), "{one: 1, two: 2}");
    }

    #[test]
    fn test_singleton_equality_is_representation_based() {
        assert_eq!(Value::Boolean(true), Value::Boolean(true));
        assert_eq!(Value::Null, Value::Null);
        assert_ne!(Value::Boolean(true), Value::Boolean(false));
        assert_ne!(Value::Null, Value::Boolean(false));
    }
}
