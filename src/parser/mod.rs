//! Makefile Parser
//!
//! Line reader, statement parser, and shared parser types.

pub mod lines;
pub mod parser;
pub mod types;

pub use parser::{parse, parse_eval_text, Makefile};
pub use types::ParseException;
