//! Make Environment
//!
//! Main entry point tying the pipeline together: regeneration check,
//! parse, evaluate, dependency build, ninja emission, stamp save.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::dep::{build_graph, DepGraph};
use crate::diag::{Diagnostic, Diagnostics};
use crate::eval::types::EvalError;
use crate::eval::Evaluator;
use crate::fs::FsCache;
use crate::loc::Loc;
use crate::ninja::NinjaGenerator;
use crate::parser::ParseException;
use crate::regen::{build_stamp, load_if_fresh, save, stamp_path};
use crate::sym::{intern, Symbol};

/// Any failure of the pipeline. Parse and evaluation errors carry
/// their location and render as the canonical single-line diagnostic.
#[derive(Debug, Error)]
pub enum MakeError {
    #[error("{0}")]
    Parse(#[from] ParseException),
    #[error("{0}")]
    Eval(#[from] EvalError),
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// Options for one translation run.
#[derive(Debug, Clone)]
pub struct MakeOptions {
    /// Explicit makefile path; otherwise the conventional names are
    /// tried in order.
    pub makefile: Option<String>,
    /// Requested targets; empty means the default target.
    pub targets: Vec<String>,
    /// `VAR=VALUE` bindings from the command line.
    pub variables: Vec<String>,
    /// Build every root target instead of the default one.
    pub gen_all_targets: bool,
    /// Where to write the ninja file, if anywhere.
    pub ninja_output: Option<String>,
    /// Reuse the stamped graph when nothing changed.
    pub use_regen_cache: bool,
    /// Emulate whitelisted find commands against the directory cache.
    pub use_find_emulator: bool,
    /// Parallelism for the downstream executor; recorded only, the
    /// translation pipeline itself is single-threaded.
    pub jobs: usize,
    /// Suppress informational output.
    pub silent: bool,
}

impl Default for MakeOptions {
    fn default() -> Self {
        Self {
            makefile: None,
            targets: Vec::new(),
            variables: Vec::new(),
            gen_all_targets: false,
            ninja_output: None,
            use_regen_cache: false,
            use_find_emulator: false,
            jobs: 1,
            silent: false,
        }
    }
}

/// Outcome of a run.
#[derive(Debug)]
pub struct RunResult {
    pub graph: DepGraph,
    /// True when the graph came from a fresh stamp and evaluation was
    /// skipped entirely.
    pub from_cache: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// The main make environment.
pub struct Make {
    opts: MakeOptions,
}

impl Make {
    pub fn new(opts: MakeOptions) -> Self {
        Self { opts }
    }

    pub fn run(&self) -> Result<RunResult, MakeError> {
        let makefile = match &self.opts.makefile {
            Some(f) => f.clone(),
            None => default_makefile().ok_or_else(|| {
                EvalError::new(
                    Loc::builtin(),
                    "No targets specified and no makefile found",
                )
            })?,
        };
        let command_line = self.fingerprint(&makefile);
        let stamp_file = stamp_path(&makefile, &self.opts.targets);

        if self.opts.use_regen_cache {
            if let Some(stamp) = load_if_fresh(&stamp_file, &command_line) {
                tracing::debug!("stamp is fresh, skipping re-evaluation");
                if let Some(out) = &self.opts.ninja_output {
                    NinjaGenerator::new().write_file(out, &stamp.graph)?;
                }
                return Ok(RunResult {
                    graph: stamp.graph,
                    from_cache: true,
                    diagnostics: Vec::new(),
                });
            }
            tracing::debug!("stamp missing or stale, re-evaluating");
        }

        let fs = Arc::new(FsCache::new());
        let mut ev = Evaluator::new(
            fs,
            Diagnostics::new(self.opts.silent),
            self.opts.use_find_emulator,
        );
        ev.seed_environment();
        ev.seed_defaults();
        ev.seed_command_line(&self.opts.variables)?;
        ev.eval_file(&makefile, true)?;

        let targets: Vec<Symbol> = self.opts.targets.iter().map(|t| intern(t)).collect();
        let graph = build_graph(&mut ev, &targets, self.opts.gen_all_targets)?;

        if let Some(out) = &self.opts.ninja_output {
            NinjaGenerator::new().write_file(out, &graph)?;
        }
        if self.opts.use_regen_cache {
            let shell_path = ev.shell_path()?;
            let stamp = build_stamp(&ev, graph.clone(), &command_line, shell_path);
            save(&stamp_file, &stamp)?;
        }
        Ok(RunResult {
            graph,
            from_cache: false,
            diagnostics: ev.diag.lines.clone(),
        })
    }

    /// Everything that must match for a stamp to be reusable.
    fn fingerprint(&self, makefile: &str) -> Vec<String> {
        let mut v = vec![format!("makefile={}", makefile)];
        v.extend(self.opts.targets.iter().map(|t| format!("target={}", t)));
        v.extend(self.opts.variables.iter().map(|d| format!("var={}", d)));
        if self.opts.gen_all_targets {
            v.push("gen-all-targets".to_string());
        }
        if self.opts.use_find_emulator {
            v.push("use-find-emulator".to_string());
        }
        v
    }
}

/// The conventional makefile names, most specific first.
fn default_makefile() -> Option<String> {
    for name in ["GNUmakefile", "makefile", "Makefile"] {
        if Path::new(name).exists() {
            return Some(name.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct TreeGuard {
        _lock: std::sync::MutexGuard<'static, ()>,
        dir: tempfile::TempDir,
        saved_cwd: PathBuf,
    }

    fn enter_tree(makefile: &str, files: &[&str]) -> TreeGuard {
        let lock = crate::test_support::lock_cwd();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Makefile"), makefile).unwrap();
        for f in files {
            std::fs::File::create(dir.path().join(f)).unwrap();
        }
        let saved_cwd = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        TreeGuard {
            _lock: lock,
            dir,
            saved_cwd,
        }
    }

    impl Drop for TreeGuard {
        fn drop(&mut self) {
            let _ = std::env::set_current_dir(&self.saved_cwd);
            let _ = &self.dir;
        }
    }

    fn run(opts: MakeOptions) -> RunResult {
        Make::new(opts).run().unwrap()
    }

    fn silent_opts() -> MakeOptions {
        MakeOptions {
            silent: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_end_to_end_explicit_rule() {
        let _t = enter_tree("a: b\n\techo hi\n", &[]);
        let r = run(silent_opts());
        assert!(!r.from_cache);
        assert_eq!(r.graph.format_node(r.graph.roots[0]), "a: b");
        assert_eq!(r.graph.nodes[r.graph.roots[0]].commands[0].cmd, "echo hi");
    }

    #[test]
    fn test_end_to_end_conditional() {
        let _t = enter_tree(
            "X:=1\nifeq ($(X),1)\nA:=yes\nelse\nA:=no\nendif\nall:\n\techo $(A)\n",
            &[],
        );
        let r = run(silent_opts());
        let all = &r.graph.nodes[r.graph.roots[0]];
        assert_eq!(all.output.as_str(), "all");
        assert_eq!(all.commands[0].cmd, "echo yes");
    }

    #[test]
    fn test_end_to_end_define_eval_call() {
        let _t = enter_tree(
            "define R\nA:=$(1)\nendef\n$(eval $(call R,42))\nall:\n\techo $(A)\n",
            &[],
        );
        let r = run(silent_opts());
        assert_eq!(r.graph.nodes[r.graph.roots[0]].commands[0].cmd, "echo 42");
    }

    #[test]
    fn test_end_to_end_wildcard_objects() {
        let _t = enter_tree(
            "SRC:=$(wildcard *.c)\nOBJ:=$(patsubst %.c,%.o,$(SRC))\nall: $(OBJ)\n%.o: %.c\n\tcc -c $<\n",
            &["a.c", "b.c"],
        );
        let r = run(silent_opts());
        let all = &r.graph.nodes[r.graph.roots[0]];
        let mut deps: Vec<&str> = all
            .deps
            .iter()
            .map(|&d| r.graph.nodes[d].output.as_str())
            .collect();
        deps.sort();
        assert_eq!(deps, vec!["a.o", "b.o"]);
    }

    #[test]
    fn test_end_to_end_command_line_variable() {
        let _t = enter_tree("all:\n\techo $(MODE)\n", &[]);
        let r = run(MakeOptions {
            variables: vec!["MODE=fast".to_string()],
            ..silent_opts()
        });
        assert_eq!(r.graph.nodes[r.graph.roots[0]].commands[0].cmd, "echo fast");
    }

    #[test]
    fn test_ninja_output_written() {
        let _t = enter_tree("a:\n\techo done\n", &[]);
        let r = run(MakeOptions {
            ninja_output: Some("build.ninja".to_string()),
            ..silent_opts()
        });
        assert!(!r.from_cache);
        let text = std::fs::read_to_string("build.ninja").unwrap();
        assert!(text.contains("build a:"));
        assert!(text.contains("default a"));
    }

    #[test]
    fn test_regen_cache_round_trip() {
        let _t = enter_tree("a: b\n\techo hi\nb:\n\ttouch b\n", &[]);
        let opts = MakeOptions {
            use_regen_cache: true,
            ..silent_opts()
        };
        let first = run(opts.clone());
        assert!(!first.from_cache);
        let second = run(opts.clone());
        assert!(second.from_cache);
        assert_eq!(first.graph, second.graph);

        // Touching the makefile content forces a re-evaluation.
        std::fs::write("Makefile", "a: c\n\techo changed\nc:\n\ttouch c\n").unwrap();
        let third = run(opts);
        assert!(!third.from_cache);
        assert_eq!(third.graph.format_node(third.graph.roots[0]), "a: c");
    }

    #[test]
    fn test_regen_cache_watches_new_optional_include() {
        let _t = enter_tree("-include extra.mk\nall:\n\techo $(FROM_EXTRA)\n", &[]);
        let opts = MakeOptions {
            use_regen_cache: true,
            ..silent_opts()
        };
        let first = run(opts.clone());
        assert!(!first.from_cache);
        // The optional include did not exist; creating it invalidates.
        std::fs::write("extra.mk", "FROM_EXTRA := yes\n").unwrap();
        let second = run(opts);
        assert!(!second.from_cache);
        assert_eq!(
            second.graph.nodes[second.graph.roots[0]].commands[0].cmd,
            "echo yes"
        );
    }

    #[test]
    fn test_missing_makefile_is_error() {
        let _t = enter_tree("all:\n\ttrue\n", &[]);
        let err = Make::new(MakeOptions {
            makefile: Some("nope.mk".to_string()),
            ..silent_opts()
        })
        .run()
        .unwrap_err();
        assert!(err.to_string().contains("nope.mk: No such file or directory"));
    }

    #[test]
    fn test_error_formats_single_line() {
        let _t = enter_tree("$(error stop here)\n", &[]);
        let err = Make::new(silent_opts()).run().unwrap_err();
        assert_eq!(err.to_string(), "Makefile:1: *** stop here.");
    }

    #[test]
    fn test_include_chain_in_error() {
        let _t = enter_tree("include sub.mk\n", &[]);
        std::fs::write("sub.mk", "$(error inner problem)\n").unwrap();
        let err = Make::new(silent_opts()).run().unwrap_err();
        let text = err.to_string();
        assert!(text.starts_with("sub.mk:1: *** inner problem."));
        assert!(text.contains("Makefile:1: included from here"));
    }
}
