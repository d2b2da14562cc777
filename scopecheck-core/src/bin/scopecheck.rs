//! scopecheck command line.
//!
//! ```text
//! scopecheck run tests/fixtures/basic.json --parallel
//! scopecheck theme onedark.json "source.x comment.line"
//! ```
//!
//! Exit codes: 0 all cases passed, 1 a case failed, 2 a suite or theme file
//! could not be loaded.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use scopecheck_core::{init_tracing, run_suite, RunConfig, TestSuite, Theme, ThemeDefaults};

#[derive(Parser, Debug)]
#[command(name = "scopecheck", version, about = "Conformance harness for TextMate grammar tokenizers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run fixture suites and report every case
    Run {
        /// Suite files (.json, .yaml, .yml)
        #[arg(required = true)]
        suites: Vec<PathBuf>,
        /// Only run cases whose description contains this text
        #[arg(long)]
        filter: Option<String>,
        /// Run cases on worker threads
        #[arg(long)]
        parallel: bool,
        /// Stop at the first failing case
        #[arg(long)]
        fail_fast: bool,
    },
    /// Resolve the style a theme gives to scope paths
    Theme {
        theme: PathBuf,
        /// Space-separated scope paths, outermost first
        #[arg(required = true)]
        scopes: Vec<String>,
        #[arg(long, default_value = "#FFF")]
        foreground: String,
        #[arg(long, default_value = "#000")]
        background: String,
    },
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            suites,
            filter,
            parallel,
            fail_fast,
        } => {
            let env = RunConfig::from_env();
            let config = RunConfig {
                filter: filter.or(env.filter),
                parallel: parallel || env.parallel,
                fail_fast: fail_fast || env.fail_fast,
            };
            run(&suites, &config)
        }
        Commands::Theme {
            theme,
            scopes,
            foreground,
            background,
        } => resolve_theme(&theme, &scopes, ThemeDefaults { foreground, background }),
    }
}

fn run(paths: &[PathBuf], config: &RunConfig) -> ExitCode {
    // Load everything up front so a broken suite file stops the run before
    // any case executes.
    let mut suites = Vec::with_capacity(paths.len());
    for path in paths {
        match TestSuite::load(path) {
            Ok(suite) => suites.push((path, suite)),
            Err(e) => {
                eprintln!("error: {}", e);
                return ExitCode::from(2);
            }
        }
    }

    let mut failed = false;
    for (path, suite) in &suites {
        println!("{}", path.display());
        let report = run_suite(suite, config);
        println!("{}\n", report);
        failed |= !report.is_success();
        if failed && config.fail_fast {
            break;
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn resolve_theme(path: &PathBuf, scopes: &[String], defaults: ThemeDefaults) -> ExitCode {
    let theme = match Theme::load(path, defaults) {
        Ok(theme) => theme,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(2);
        }
    };

    for scope_path in scopes {
        let style = theme.resolve(scope_path);
        println!(
            "{}\tforeground={} background={} fontStyle={}",
            scope_path,
            style.foreground,
            style.background,
            style.font_style.as_deref().unwrap_or("-")
        );
    }
    ExitCode::SUCCESS
}
