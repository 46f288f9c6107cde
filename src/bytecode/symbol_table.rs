//! Lexically scoped symbol table with free-variable capture.

use std::collections::HashMap;

/// Classification of a resolved name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolScope {
    /// Defined in the outermost scope; lives in the globals array.
    Global,
    /// Defined inside a function; lives in a stack slot.
    Local,
    /// Registered by the host before compilation.
    Builtin,
    /// Captured from an enclosing function scope.
    Free,
}

/// A resolved name: stable for the lifetime of its defining table.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    pub index: usize,
}

/// One node in the scope chain. The outermost table persists for the whole
/// compilation unit and holds globals and built-ins; inner tables live for
/// one function's compilation scope.
#[derive(Debug, Default)]
pub struct SymbolTable {
    outer: Option<Box<SymbolTable>>,
    store: HashMap<String, Symbol>,
    num_definitions: usize,
    free_symbols: Vec<Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table nested inside `outer`.
    pub fn enclosed(outer: SymbolTable) -> Self {
        Self {
            outer: Some(Box::new(outer)),
            ..Self::default()
        }
    }

    /// Give the enclosing table back, dropping this scope.
    pub fn into_outer(self) -> Option<SymbolTable> {
        self.outer.map(|outer| *outer)
    }

    /// Define `name` in this scope at the next free index. Redefinition
    /// assigns a fresh index; indices are never reused.
    pub fn define(&mut self, name: &str) -> Symbol {
        let scope = if self.outer.is_none() {
            SymbolScope::Global
        } else {
            SymbolScope::Local
        };
        let symbol = Symbol {
            name: name.to_string(),
            scope,
            index: self.num_definitions,
        };
        self.num_definitions += 1;
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Register a built-in with an explicit index. Only meaningful on the
    /// outermost table, before compilation begins.
    pub fn define_builtin(&mut self, index: usize, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Builtin,
            index,
        };
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Resolve `name` in this scope, then recursively outward. A hit on an
    /// outer Local or Free binding is promoted to Free here: the original
    /// symbol is recorded in `free_symbols` (in first-reference order) and
    /// a Free symbol indexing into it is returned from now on. Globals and
    /// built-ins resolve without promotion.
    pub fn resolve(&mut self, name: &str) -> Option<Symbol> {
        if let Some(symbol) = self.store.get(name) {
            return Some(symbol.clone());
        }

        let outer_symbol = self.outer.as_mut()?.resolve(name)?;
        match outer_symbol.scope {
            SymbolScope::Global | SymbolScope::Builtin => Some(outer_symbol),
            SymbolScope::Local | SymbolScope::Free => Some(self.define_free(outer_symbol)),
        }
    }

    fn define_free(&mut self, original: Symbol) -> Symbol {
        let symbol = Symbol {
            name: original.name.clone(),
            scope: SymbolScope::Free,
            index: self.free_symbols.len(),
        };
        self.free_symbols.push(original);
        self.store.insert(symbol.name.clone(), symbol.clone());
        symbol
    }

    /// Number of names defined locally in this scope (free and built-in
    /// symbols do not count).
    pub fn num_definitions(&self) -> usize {
        self.num_definitions
    }

    /// Outer-scope symbols captured by this scope, in first-reference order.
    pub fn free_symbols(&self) -> &[Symbol] {
        &self.free_symbols
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_global() {
        let mut table = SymbolTable::new();
        let a = table.define("a");
        assert_eq!(a.scope, SymbolScope::Global);
        assert_eq!(a.index, 0);

        let b = table.define("b");
        assert_eq!(b.scope, SymbolScope::Global);
        assert_eq!(b.index, 1);
        assert_eq!(table.num_definitions(), 2);
    }

    #[test]
    fn test_resolve_global() {
        let mut table = SymbolTable::new();
        table.define("a");

        let a = table.resolve("a").expect("a resolves");
        assert_eq!(a.scope, SymbolScope::Global);
        assert_eq!(a.index, 0);
        assert!(table.resolve("missing").is_none());
    }

    #[test]
    fn test_resolve_is_stable() {
        let mut table = SymbolTable::new();
        table.define("a");
        assert_eq!(table.resolve("a"), table.resolve("a"));
    }

    #[test]
    fn test_redefinition_gets_fresh_index() {
        let mut table = SymbolTable::new();
        table.define("a");
        let again = table.define("a");
        assert_eq!(again.index, 1);
        assert_eq!(table.num_definitions(), 2);
    }

    #[test]
    fn test_resolve_local() {
        let mut global = SymbolTable::new();
        global.define("a");

        let mut local = SymbolTable::enclosed(global);
        local.define("b");

        let a = local.resolve("a").expect("a resolves");
        assert_eq!(a.scope, SymbolScope::Global);
        let b = local.resolve("b").expect("b resolves");
        assert_eq!(b.scope, SymbolScope::Local);
        assert_eq!(b.index, 0);
    }

    #[test]
    fn test_resolve_nested_local_promotes_to_free() {
        let mut global = SymbolTable::new();
        global.define("a");

        let mut first = SymbolTable::enclosed(global);
        first.define("b");

        let mut second = SymbolTable::enclosed(first);
        second.define("c");

        // Global resolves without promotion.
        let a = second.resolve("a").expect("a resolves");
        assert_eq!(a.scope, SymbolScope::Global);
        assert!(second.free_symbols().is_empty());

        // Outer local is promoted to free.
        let b = second.resolve("b").expect("b resolves");
        assert_eq!(b.scope, SymbolScope::Free);
        assert_eq!(b.index, 0);
        assert_eq!(second.free_symbols().len(), 1);
        assert_eq!(second.free_symbols()[0].name, "b");
        assert_eq!(second.free_symbols()[0].scope, SymbolScope::Local);

        // Own local is untouched.
        let c = second.resolve("c").expect("c resolves");
        assert_eq!(c.scope, SymbolScope::Local);

        // After promotion the name stays free.
        let b_again = second.resolve("b").expect("b resolves");
        assert_eq!(b_again.scope, SymbolScope::Free);
        assert_eq!(second.free_symbols().len(), 1);
    }

    #[test]
    fn test_free_symbols_in_first_reference_order() {
        let mut global = SymbolTable::new();
        global.define("a");

        let mut first = SymbolTable::enclosed(global);
        first.define("b");
        first.define("c");

        let mut second = SymbolTable::enclosed(first);
        second.resolve("c");
        second.resolve("b");

        let names: Vec<_> = second
            .free_symbols()
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["c", "b"]);
    }

    #[test]
    fn test_free_of_free() {
        // A name local to the outermost function, referenced two scopes
        // down, is free in the middle scope and free-of-free innermost.
        let mut first = SymbolTable::enclosed(SymbolTable::new());
        first.define("a");

        let second = SymbolTable::enclosed(first);
        let mut third = SymbolTable::enclosed(second);

        let a = third.resolve("a").expect("a resolves");
        assert_eq!(a.scope, SymbolScope::Free);
        assert_eq!(a.index, 0);

        // The middle scope captured it as free from its own outer.
        let middle = third.into_outer().expect("middle scope");
        assert_eq!(middle.free_symbols().len(), 1);
        assert_eq!(middle.free_symbols()[0].scope, SymbolScope::Local);
    }

    #[test]
    fn test_define_and_resolve_builtins() {
        let mut global = SymbolTable::new();
        global.define_builtin(0, "len");
        global.define_builtin(1, "puts");

        let mut local = SymbolTable::enclosed(global);
        let len = local.resolve("len").expect("len resolves");
        assert_eq!(len.scope, SymbolScope::Builtin);
        assert_eq!(len.index, 0);
        // Built-ins never count as definitions and are never captured.
        assert!(local.free_symbols().is_empty());
        assert_eq!(local.num_definitions(), 0);
    }

    #[test]
    fn test_shadowing_builtin_with_local() {
        let mut global = SymbolTable::new();
        global.define_builtin(0, "len");

        let mut local = SymbolTable::enclosed(global);
        local.define("len");

        let len = local.resolve("len").expect("len resolves");
        assert_eq!(len.scope, SymbolScope::Local);
    }
}
