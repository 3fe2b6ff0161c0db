//! halfpipe CLI entry point

// The CLI owns stdout and stderr
#![allow(clippy::print_stdout, clippy::print_stderr)]

use halfpipe::cli::{self, error_json, exit_code_for};
use halfpipe::commands;
use halfpipe::tracing::{TracingConfig, init_tracing};
use miette::{IntoDiagnostic, Report};

fn main() -> miette::Result<()> {
    let cli = cli::parse();
    init_tracing(TracingConfig {
        format: cli.log_format,
        level: cli.log_level,
        filter: None,
    })?;

    let working_dir = std::env::current_dir().into_diagnostic()?;
    match commands::execute(&cli, &working_dir) {
        Ok(output) => {
            print!("{}", output.stdout);
            eprint!("{}", output.stderr);
            if output.exit_code != cli::EXIT_OK {
                std::process::exit(output.exit_code);
            }
            Ok(())
        }
        Err(err) => {
            let code = exit_code_for(&err);
            if cli.wants_json() {
                println!("{}", error_json(&err));
            } else {
                eprintln!("{:?}", Report::new(err));
            }
            std::process::exit(code);
        }
    }
}
