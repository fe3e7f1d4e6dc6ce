//! Symbol Interner
//!
//! Maps strings to stable small integers so that names compare by
//! identity. The table is global and append-only: a symbol interned once
//! stays valid for the rest of the process. Inserts take a write lock;
//! resolving an existing symbol only takes a read lock on the id table
//! and hands out a `&'static str` backed by the interner.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// An interned string. Equality and hashing go through the small integer
/// id, never the bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

struct SymbolTable {
    names: Vec<&'static str>,
    ids: HashMap<&'static str, u32>,
}

lazy_static::lazy_static! {
    static ref SYMTAB: RwLock<SymbolTable> = RwLock::new(SymbolTable {
        names: Vec::new(),
        ids: HashMap::new(),
    });
}

/// Intern a string, returning its symbol. Idempotent: the same bytes
/// always yield the same symbol.
pub fn intern(name: &str) -> Symbol {
    {
        let tab = SYMTAB.read().unwrap();
        if let Some(&id) = tab.ids.get(name) {
            return Symbol(id);
        }
    }
    let mut tab = SYMTAB.write().unwrap();
    // Re-check: another thread may have inserted between the locks.
    if let Some(&id) = tab.ids.get(name) {
        return Symbol(id);
    }
    let leaked: &'static str = Box::leak(name.to_string().into_boxed_str());
    let id = tab.names.len() as u32;
    tab.names.push(leaked);
    tab.ids.insert(leaked, id);
    Symbol(id)
}

impl Symbol {
    /// The interned bytes. Valid for the rest of the process.
    pub fn as_str(self) -> &'static str {
        SYMTAB.read().unwrap().names[self.0 as usize]
    }

    pub fn val(self) -> u32 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.as_str().is_empty()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Symbols serialize as their string form; deserializing re-interns, so
// ids are stable within a run but never persisted.
impl Serialize for Symbol {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(intern(&s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_equality() {
        let a = intern("foo.o");
        let b = intern("foo.o");
        assert_eq!(a, b);
        assert_eq!(a.val(), b.val());
    }

    #[test]
    fn test_distinct_symbols() {
        let a = intern("foo");
        let b = intern("bar");
        assert_ne!(a, b);
        assert_eq!(a.as_str(), "foo");
        assert_eq!(b.as_str(), "bar");
    }

    #[test]
    fn test_empty_symbol() {
        let e = intern("");
        assert!(e.is_empty());
        assert_eq!(e, intern(""));
    }

    #[test]
    fn test_serde_round_trip() {
        let a = intern("round-trip");
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, "\"round-trip\"");
        let b: Symbol = serde_json::from_str(&json).unwrap();
        assert_eq!(a, b);
    }
}
