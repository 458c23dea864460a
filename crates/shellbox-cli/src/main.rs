//! Shellbox CLI - command line interface for sandboxed shell execution
//!
//! Usage:
//!   shellbox -c 'echo hello'       # Execute a command string
//!   shellbox script.sh             # Execute a script file (host path)
//!   echo 'echo hi' | shellbox      # Execute a script from stdin

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

/// Shellbox - sandboxed shell interpreter
#[derive(Parser, Debug)]
#[command(name = "shellbox")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Execute the given command string
    #[arg(short = 'c')]
    command: Option<String>,

    /// Script file to execute
    #[arg()]
    script: Option<PathBuf>,

    /// Arguments to pass to the script ($1..)
    #[arg(trailing_var_arg = true)]
    args: Vec<String>,

    /// Wall-clock budget in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    if std::env::var_os("SHELLBOX_LOG").is_some() {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_env("SHELLBOX_LOG")
                    .unwrap_or_else(|_| "shellbox=debug".into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    let args = Args::parse();

    let limits = shellbox::ExecutionLimits::new()
        .timeout(std::time::Duration::from_secs(args.timeout));
    let mut shell = shellbox::Shell::builder().limits(limits).build();

    let script = if let Some(command) = args.command {
        command
    } else if let Some(path) = args.script {
        std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read script: {}", path.display()))?
    } else {
        let mut script = String::new();
        std::io::stdin()
            .read_to_string(&mut script)
            .context("failed to read script from stdin")?;
        script
    };

    if !args.args.is_empty() {
        // Positional parameters via `set --`, quoted for safety.
        let quoted: Vec<String> = args
            .args
            .iter()
            .map(|a| format!("'{}'", a.replace('\'', "'\\''")))
            .collect();
        shell
            .exec(&format!("set -- {}", quoted.join(" ")))
            .await
            .context("failed to set positional parameters")?;
    }

    let result = shell.exec(&script).await.context("execution failed")?;
    print!("{}", result.stdout);
    if !result.stderr.is_empty() {
        eprint!("{}", result.stderr);
    }
    std::process::exit(result.exit_code);
}
