//! Lazy Expression Model
//!
//! Values are parsed once and evaluated on demand into byte sinks.

pub mod parser;
pub mod sink;
pub mod types;

pub use parser::parse_expr;
pub use sink::WordWriter;
pub use types::{FuncCall, ParenKind, Value};
