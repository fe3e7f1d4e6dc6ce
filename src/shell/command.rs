//! Shell Command Execution
//!
//! The real-shell path of `$(shell ...)`: spawn `$(SHELL) -c CMD`
//! synchronously, capture stdout, and normalize the output the way
//! command substitution does.

use std::process::{Command, Stdio};

/// Run a command under the given shell, returning raw captured stdout.
/// stderr passes through to the caller's stderr. A command that cannot
/// be spawned yields empty output; the exit status is not an error,
/// matching command-substitution semantics.
pub fn spawn_shell(shell: &str, cmd: &str, extra_env: &[(String, String)]) -> String {
    let mut c = Command::new(shell);
    c.arg("-c").arg(cmd).stdin(Stdio::null()).stderr(Stdio::inherit());
    for (k, v) in extra_env {
        c.env(k, v);
    }
    match c.output() {
        Ok(out) => String::from_utf8_lossy(&out.stdout).into_owned(),
        Err(e) => {
            tracing::debug!(shell, cmd, error = %e, "failed to spawn shell");
            String::new()
        }
    }
}

/// Command-substitution output normalization: trailing newlines are
/// dropped, interior newlines become single spaces.
pub fn format_shell_output(out: &str) -> String {
    let trimmed = out.trim_end_matches('\n');
    trimmed.replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_trims_trailing_newlines() {
        assert_eq!(format_shell_output("hello\n"), "hello");
        assert_eq!(format_shell_output("hello\n\n\n"), "hello");
    }

    #[test]
    fn test_format_flattens_interior_newlines() {
        assert_eq!(format_shell_output("a\nb\nc\n"), "a b c");
    }

    #[test]
    fn test_format_empty() {
        assert_eq!(format_shell_output(""), "");
        assert_eq!(format_shell_output("\n"), "");
    }

    #[cfg(unix)]
    #[test]
    fn test_spawn_captures_stdout() {
        let out = spawn_shell("/bin/sh", "echo hi", &[]);
        assert_eq!(out, "hi\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_spawn_passes_env() {
        let out = spawn_shell(
            "/bin/sh",
            "echo $JM_TEST_VAR",
            &[("JM_TEST_VAR".to_string(), "42".to_string())],
        );
        assert_eq!(out, "42\n");
    }

    #[test]
    fn test_spawn_bad_shell_is_empty() {
        let out = spawn_shell("/no/such/shell", "echo hi", &[]);
        assert_eq!(out, "");
    }
}
