use std::collections::HashMap;

use log::trace;

use crate::ast::{Ident, Type};

/// A stack of lexical scopes. Scope `0` is the global scope, which is never
/// exited.
#[derive(Debug)]
pub struct SymbolTable {
    /// Never empty.
    scopes: Vec<Scope>,
    /// Exited scopes, kept around for diagnostics. Never searched.
    retired: Vec<Scope>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Scope {
    pub level: usize,
    pub kind: ScopeKind,
    symbols: HashMap<Ident, Symbol>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    /// The parameters of the named function.
    Function(Ident),
    Block,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Symbol {
    pub name: Ident,
    pub ty: Type,
    pub kind: SymbolKind,
    /// Declaration order within the owning scope.
    order: usize,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Parameter,
    Function,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{name} is already declared in this scope")]
pub struct Redeclared {
    pub name: Ident,
}

impl SymbolTable {
    /// Creates a table with the global scope already entered.
    pub fn new() -> SymbolTable {
        let mut table = SymbolTable {
            scopes: Vec::with_capacity(8),
            retired: Vec::new(),
        };
        table.enter_scope(ScopeKind::Global);
        table
    }

    pub fn enter_scope(&mut self, kind: ScopeKind) {
        let level = self.scopes.len();
        trace!("enter scope {level} ({kind:?})");
        self.scopes.push(Scope {
            level,
            kind,
            symbols: HashMap::new(),
        });
    }

    /// Pops the innermost scope. The popped scope stays available through
    /// [`SymbolTable::retired`] but is no longer searched. Returns `None`
    /// when only the global scope is left.
    pub fn exit_scope(&mut self) -> Option<&Scope> {
        if self.scopes.len() == 1 {
            return None;
        }
        let scope = self.scopes.pop()?;
        trace!("exit scope {} ({:?})", scope.level, scope.kind);
        self.retired.push(scope);
        self.retired.last()
    }

    /// Declares a name in the innermost scope.
    ///
    /// Fails if that exact scope already has the name. Names in enclosing
    /// scopes are shadowed.
    pub fn declare(&mut self, name: &str, ty: Type, kind: SymbolKind) -> Result<(), Redeclared> {
        let innermost = self.scopes.len() - 1;
        let scope = &mut self.scopes[innermost];
        if scope.has(name) {
            return Err(Redeclared { name: name.into() });
        }
        let order = scope.symbols.len();
        let symbol = Symbol {
            name: name.into(),
            ty,
            kind,
            order,
        };
        scope.symbols.insert(name.into(), symbol);
        Ok(())
    }

    /// Resolves a name, innermost scope first.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// The number of currently entered scopes.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    pub fn retired(&self) -> &[Scope] {
        &self.retired
    }

    /// Exited scopes in exit order, then the open ones from the innermost
    /// out. The global scope always comes last.
    pub fn all(&self) -> impl DoubleEndedIterator<Item = &Scope> {
        self.retired.iter().chain(self.scopes.iter().rev())
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        SymbolTable::new()
    }
}

impl Scope {
    pub fn has(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbols in declaration order.
    pub fn symbols(&self) -> Vec<&Symbol> {
        let mut symbols: Vec<_> = self.symbols.values().collect();
        symbols.sort_by_key(|symbol| symbol.order);
        symbols
    }
}
