//! Variable Table
//!
//! A flat global mapping overlaid by a stack of scopes. Lookups walk
//! the scopes top-down before falling back to the globals; scope exit
//! drops exactly the entries made while the scope was open. Insertion
//! order is preserved so iteration for emission is deterministic.

use indexmap::IndexMap;

use crate::eval::types::{Origin, Var};
use crate::sym::Symbol;

#[derive(Debug, Default)]
pub struct VarTable {
    globals: IndexMap<Symbol, Var>,
    scopes: Vec<IndexMap<Symbol, Var>>,
    /// Export marks: `true` from `export`, `false` from `unexport`.
    /// Tracked independently of definitions so a name can be marked
    /// before it is assigned.
    exports: IndexMap<Symbol, bool>,
}

impl VarTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a variable, innermost scope first.
    pub fn lookup(&self, name: Symbol) -> Option<&Var> {
        for scope in self.scopes.iter().rev() {
            if let Some(v) = scope.get(&name) {
                return Some(v);
            }
        }
        self.globals.get(&name)
    }

    /// Read only the global binding, ignoring scopes. Assignment
    /// semantics (`?=`, `+=`) are defined against this view.
    pub fn lookup_global(&self, name: Symbol) -> Option<&Var> {
        self.globals.get(&name)
    }

    /// Define a global, honoring origin precedence: an assignment of
    /// strictly weaker origin than the existing one is silently
    /// dropped. Returns whether the definition was stored.
    pub fn define_global(&mut self, name: Symbol, var: Var) -> bool {
        if let Some(existing) = self.globals.get(&name) {
            if var.origin.strength() < existing.origin.strength() {
                return false;
            }
        }
        self.globals.insert(name, var);
        true
    }

    /// Define unconditionally, bypassing precedence. Used for internal
    /// bookkeeping variables the tool itself maintains.
    pub fn define_global_forced(&mut self, name: Symbol, var: Var) {
        self.globals.insert(name, var);
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(IndexMap::new());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop().expect("pop_scope without push_scope");
    }

    pub fn in_scope(&self) -> bool {
        !self.scopes.is_empty()
    }

    /// Define into the innermost scope. Requires an open scope.
    pub fn define_scoped(&mut self, name: Symbol, var: Var) {
        self.scopes
            .last_mut()
            .expect("define_scoped without open scope")
            .insert(name, var);
    }

    /// Mark a name exported or unexported.
    pub fn set_exported(&mut self, name: Symbol, exported: bool) {
        self.exports.insert(name, exported);
    }

    pub fn is_exported(&self, name: Symbol) -> bool {
        match self.exports.get(&name) {
            Some(&mark) => mark,
            None => self
                .lookup(name)
                .is_some_and(|v| v.origin == Origin::Environment),
        }
    }

    /// Globals in definition order.
    pub fn iter_globals(&self) -> impl Iterator<Item = (Symbol, &Var)> {
        self.globals.iter().map(|(s, v)| (*s, v))
    }

    /// Names currently marked for export, in mark order.
    pub fn exported_names(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.exports
            .iter()
            .filter(|(_, &on)| on)
            .map(|(s, _)| *s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Value;
    use crate::sym::intern;

    #[test]
    fn test_global_define_and_lookup() {
        let mut t = VarTable::new();
        let cc = intern("CC");
        t.define_global(cc, Var::simple("gcc", Origin::File));
        assert_eq!(t.lookup(cc).unwrap().string_value(), "gcc");
    }

    #[test]
    fn test_scope_shadows_global() {
        let mut t = VarTable::new();
        let x = intern("X");
        t.define_global(x, Var::simple("global", Origin::File));
        t.push_scope();
        t.define_scoped(x, Var::simple("scoped", Origin::Automatic));
        assert_eq!(t.lookup(x).unwrap().string_value(), "scoped");
        t.pop_scope();
        assert_eq!(t.lookup(x).unwrap().string_value(), "global");
    }

    #[test]
    fn test_inner_scope_wins() {
        let mut t = VarTable::new();
        let x = intern("Y");
        t.push_scope();
        t.define_scoped(x, Var::simple("outer", Origin::Automatic));
        t.push_scope();
        t.define_scoped(x, Var::simple("inner", Origin::Automatic));
        assert_eq!(t.lookup(x).unwrap().string_value(), "inner");
        t.pop_scope();
        assert_eq!(t.lookup(x).unwrap().string_value(), "outer");
        t.pop_scope();
        assert!(t.lookup(x).is_none());
    }

    #[test]
    fn test_weaker_origin_dropped() {
        let mut t = VarTable::new();
        let x = intern("Z");
        t.define_global(x, Var::simple("cli", Origin::CommandLine));
        assert!(!t.define_global(x, Var::simple("file", Origin::File)));
        assert_eq!(t.lookup(x).unwrap().string_value(), "cli");
        assert!(t.define_global(x, Var::simple("over", Origin::Override)));
        assert_eq!(t.lookup(x).unwrap().string_value(), "over");
    }

    #[test]
    fn test_file_replaces_environment() {
        let mut t = VarTable::new();
        let x = intern("PATHISH");
        t.define_global(x, Var::simple("/env", Origin::Environment));
        assert!(t.define_global(x, Var::simple("/file", Origin::File)));
        assert_eq!(t.lookup(x).unwrap().origin, Origin::File);
    }

    #[test]
    fn test_export_marks() {
        let mut t = VarTable::new();
        let a = intern("A");
        let b = intern("B");
        t.set_exported(a, true);
        assert!(t.is_exported(a));
        assert!(!t.is_exported(b));
        t.define_global(b, Var::simple("v", Origin::Environment));
        assert!(t.is_exported(b), "environment variables propagate by default");
        t.set_exported(b, false);
        assert!(!t.is_exported(b));
    }

    #[test]
    fn test_iteration_order_is_definition_order() {
        let mut t = VarTable::new();
        for name in ["ONE", "TWO", "THREE"] {
            t.define_global(intern(name), Var::recursive(Value::literal(""), Origin::File));
        }
        let names: Vec<&str> = t.iter_globals().map(|(s, _)| s.as_str()).collect();
        assert_eq!(names, vec!["ONE", "TWO", "THREE"]);
    }
}
