//! Source Locations
//!
//! Every statement and diagnostic carries the makefile name and line
//! number it came from.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::sym::Symbol;

/// A position in a makefile: file name plus 1-based line number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loc {
    pub filename: Symbol,
    pub line: u32,
}

impl Loc {
    pub fn new(filename: Symbol, line: u32) -> Self {
        Self { filename, line }
    }

    /// Location used before any file has been read (command line,
    /// internal seeding).
    pub fn builtin() -> Self {
        Self {
            filename: crate::sym::intern("*builtin*"),
            line: 0,
        }
    }
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.filename, self.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sym::intern;

    #[test]
    fn test_display() {
        let loc = Loc::new(intern("Makefile"), 12);
        assert_eq!(loc.to_string(), "Makefile:12");
    }

    #[test]
    fn test_copy_equality() {
        let a = Loc::new(intern("m.mk"), 3);
        let b = a;
        assert_eq!(a, b);
    }
}
