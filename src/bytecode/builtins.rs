//! Built-in functions exposed to Pebble programs.
//!
//! The registry order is the contract: a builtin's position here is the
//! index the compiler registers via `define_builtin` and the index the VM
//! uses for `GetBuiltin`. Built-ins validate their own arity and argument
//! types; the VM accepts any arity at the call site.

use std::rc::Rc;

use lazy_static::lazy_static;

use crate::bytecode::value::{Builtin, Value};
use crate::error::RuntimeError;

lazy_static! {
    /// The ordered builtin registry shared by compiler and VM.
    pub static ref BUILTINS: Vec<Builtin> = vec![
        Builtin { name: "len", func: builtin_len },
        Builtin { name: "puts", func: builtin_puts },
        Builtin { name: "first", func: builtin_first },
        Builtin { name: "last", func: builtin_last },
        Builtin { name: "rest", func: builtin_rest },
        Builtin { name: "push", func: builtin_push },
    ];
}

/// Look up a builtin by registry index.
pub fn lookup(index: usize) -> Option<&'static Builtin> {
    BUILTINS.get(index)
}

fn expect_arity(name: &'static str, args: &[Value], want: usize) -> Result<(), RuntimeError> {
    if args.len() != want {
        return Err(RuntimeError::builtin(
            name,
            format!("wrong number of arguments. got={}, want={}", args.len(), want),
        ));
    }
    Ok(())
}

fn builtin_len(args: &[Value]) -> Result<Option<Value>, RuntimeError> {
    expect_arity("len", args, 1)?;
    match &args[0] {
        Value::String(s) => Ok(Some(Value::Integer(s.len() as i64))),
        Value::Array(elements) => Ok(Some(Value::Integer(elements.len() as i64))),
        Value::Hash(pairs) => Ok(Some(Value::Integer(pairs.len() as i64))),
        other => Err(RuntimeError::builtin(
            "len",
            format!("argument not supported, got {}", other.type_name()),
        )),
    }
}

fn builtin_puts(args: &[Value]) -> Result<Option<Value>, RuntimeError> {
    for arg in args {
        println!("{}", arg);
    }
    Ok(None)
}

fn builtin_first(args: &[Value]) -> Result<Option<Value>, RuntimeError> {
    expect_arity("first", args, 1)?;
    match &args[0] {
        Value::Array(elements) => Ok(elements.first().cloned()),
        other => Err(RuntimeError::builtin(
            "first",
            format!("argument must be an Array, got {}", other.type_name()),
        )),
    }
}

fn builtin_last(args: &[Value]) -> Result<Option<Value>, RuntimeError> {
    expect_arity("last", args, 1)?;
    match &args[0] {
        Value::Array(elements) => Ok(elements.last().cloned()),
        other => Err(RuntimeError::builtin(
            "last",
            format!("argument must be an Array, got {}", other.type_name()),
        )),
    }
}

fn builtin_rest(args: &[Value]) -> Result<Option<Value>, RuntimeError> {
    expect_arity("rest", args, 1)?;
    match &args[0] {
        Value::Array(elements) => {
            if elements.is_empty() {
                Ok(None)
            } else {
                Ok(Some(Value::Array(Rc::new(elements[1..].to_vec()))))
            }
        }
        other => Err(RuntimeError::builtin(
            "rest",
            format!("argument must be an Array, got {}", other.type_name()),
        )),
    }
}

fn builtin_push(args: &[Value]) -> Result<Option<Value>, RuntimeError> {
    expect_arity("push", args, 2)?;
    match &args[0] {
        Value::Array(elements) => {
            let mut extended = elements.as_ref().clone();
            extended.push(args[1].clone());
            Ok(Some(Value::Array(Rc::new(extended))))
        }
        other => Err(RuntimeError::builtin(
            "push",
            format!("first argument must be an Array, got {}", other.type_name()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_order_is_stable() {
        let names: Vec<_> = BUILTINS.iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["len", "puts", "first", "last", "rest", "push"]);
        assert_eq!(lookup(0).map(|b| b.name), Some("len"));
        assert!(lookup(BUILTINS.len()).is_none());
    }

    #[test]
    fn test_len() {
        assert_eq!(
            builtin_len(&[Value::string("four")]).unwrap(),
            Some(Value::Integer(4))
        );
        assert_eq!(
            builtin_len(&[Value::Array(Rc::new(vec![Value::Integer(1)]))]).unwrap(),
            Some(Value::Integer(1))
        );
        assert!(builtin_len(&[Value::Integer(1)]).is_err());
        assert!(builtin_len(&[]).is_err());
    }

    #[test]
    fn test_first_last_on_empty_array() {
        let empty = Value::Array(Rc::new(Vec::new()));
        assert_eq!(builtin_first(&[empty.clone()]).unwrap(), None);
        assert_eq!(builtin_last(&[empty]).unwrap(), None);
    }

    #[test]
    fn test_rest_returns_new_array() {
        let array = Value::Array(Rc::new(vec![
            Value::Integer(1),
            Value::Integer(2),
            Value::Integer(3),
        ]));
        let rest = builtin_rest(&[array.clone()]).unwrap().unwrap();
        assert_eq!(
            rest,
            Value::Array(Rc::new(vec![Value::Integer(2), Value::Integer(3)]))
        );
        // The original is untouched.
        assert_eq!(
            array,
            Value::Array(Rc::new(vec![
                Value::Integer(1),
                Value::Integer(2),
                Value::Integer(3),
            ]))
        );
    }

    #[test]
    fn test_push_does_not_mutate_original() {
        let array = Value::Array(Rc::new(vec![Value::Integer(1)]));
        let pushed = builtin_push(&[array.clone(), Value::Integer(2)])
            .unwrap()
            .unwrap();
        assert_eq!(
            pushed,
            Value::Array(Rc::new(vec![Value::Integer(1), Value::Integer(2)]))
        );
        assert_eq!(array, Value::Array(Rc::new(vec![Value::Integer(1)])));
    }
}
