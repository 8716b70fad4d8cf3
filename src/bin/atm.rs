//! `atm`: download contests, test solutions locally and submit them through the browser.

use std::{path::PathBuf, process::ExitCode};

use anyhow::Context;
use atcoder_tools_mini::{
    commands,
    configuration::Configuration,
    error::AtmError,
    logger::{init_logger, log_file_name},
};
use clap::{Parser, Subcommand};
use tracing::error;

#[derive(Parser)]
#[command(
    name = "atm",
    version,
    about = "A lightweight CLI for AtCoder: download samples, test locally, submit"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download every task of a contest into ./<contest_id>
    Gen {
        /// Contest ID (e.g. abc300)
        contest_id: String,
    },
    /// Compile and run a source file on the samples of the current directory
    Test {
        /// Path to the source file
        #[arg(default_value = "main.cpp")]
        src: PathBuf,
        /// Language symbol (e.g. cpp, python); guessed from the extension when omitted
        #[arg(short, long)]
        lang: Option<String>,
    },
    /// Submit a source file
    Submit {
        /// Path to the source file
        #[arg(default_value = "main.cpp")]
        src: PathBuf,
        /// Contest ID; guessed from metadata.json or the directory path when omitted
        #[arg(short, long)]
        contest: Option<String>,
        /// Task screen name (e.g. abc300_a); guessed like the contest
        #[arg(short, long)]
        task: Option<String>,
        /// Numeric language ID on the judge; C++ (5001) is inferred from a C++ source
        #[arg(short, long)]
        lang: Option<String>,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config = Configuration::from_env();
    if config.log() {
        init_logger(&PathBuf::from(log_file_name()))?;
    }
    let cwd = std::env::current_dir().context("could not read the current directory")?;

    let outcome = match &cli.command {
        Command::Gen { contest_id } => {
            commands::gen_contest(&config, &cwd, contest_id).map(|_| true)
        }
        Command::Test { src, lang } => commands::test_source(&config, &cwd, src, lang.as_deref()),
        Command::Submit {
            src,
            contest,
            task,
            lang,
        } => commands::submit_source(
            &config,
            &cwd,
            src,
            contest.as_deref(),
            task.as_deref(),
            lang.as_deref(),
        )
        .map(|_| true),
    };

    match outcome {
        Ok(true) => Ok(ExitCode::SUCCESS),
        Ok(false) => Ok(ExitCode::FAILURE),
        Err(e) => {
            error!("{e}");
            report(&e);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn report(e: &AtmError) {
    match e {
        AtmError::ConnectionUnavailable { .. } => {
            println!("[CLI] Error: Could not connect to background Native Host.");
            println!(
                "[CLI] Please ensure the native host is installed, then close and re-open your browser."
            );
        }
        AtmError::CompileFailure { stderr } => {
            println!("[CLI] Compilation Failed!");
            println!("{stderr}");
        }
        other => println!("[CLI] Error: {other}"),
    }
}
