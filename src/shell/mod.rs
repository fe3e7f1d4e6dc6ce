//! Shell Integration
//!
//! Real command execution for `$(shell ...)` plus the optimizer that
//! replaces recognized fragments with native implementations.

pub mod command;
pub mod optimizer;

pub use command::{format_shell_output, spawn_shell};
pub use optimizer::{frozen_date, recognize, rot13, Recognized};
