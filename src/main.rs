use clap::Parser;
use just_make::make::{Make, MakeOptions};

#[derive(Parser)]
#[command(name = "just-make")]
#[command(about = "Translates a makefile into a ninja-style build graph")]
#[command(version)]
struct Cli {
    /// Makefile to read (defaults to GNUmakefile, makefile, Makefile)
    #[arg(short = 'f', long = "file")]
    file: Option<String>,

    /// Write the generated ninja build file here
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Generate every root target instead of the default target
    #[arg(long = "gen-all-targets")]
    gen_all_targets: bool,

    /// Check the stamp and re-evaluate only when inputs changed
    #[arg(long = "regen")]
    regen: bool,

    /// Emulate whitelisted find commands against the directory cache
    #[arg(long = "use-find-emulator")]
    use_find_emulator: bool,

    /// Parallel jobs for the downstream executor (recorded only)
    #[arg(short = 'j', long = "jobs", default_value_t = 1)]
    jobs: usize,

    /// Suppress informational output
    #[arg(short = 's', long = "silent")]
    silent: bool,

    /// Targets to build; arguments containing '=' become variable
    /// bindings
    #[arg()]
    args: Vec<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let (variables, targets): (Vec<String>, Vec<String>) =
        cli.args.into_iter().partition(|a| a.contains('='));

    let opts = MakeOptions {
        makefile: cli.file,
        targets,
        variables,
        gen_all_targets: cli.gen_all_targets,
        ninja_output: cli.output,
        use_regen_cache: cli.regen,
        use_find_emulator: cli.use_find_emulator,
        jobs: cli.jobs,
        silent: cli.silent,
    };

    match Make::new(opts).run() {
        Ok(result) => {
            if result.from_cache {
                tracing::debug!("graph reused from stamp");
            }
        }
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
