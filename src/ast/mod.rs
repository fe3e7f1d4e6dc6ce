//! Statement tree produced by the parser.

pub mod types;

pub use types::*;
