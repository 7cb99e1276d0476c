//! `ghost` binary: argument parsing, logging, bootstrap, and mode select.

mod prompt;
mod repl;

use anyhow::Context;
use clap::Parser;
use ghost_runtime::{GhostConfig, Shell};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Portable personal shell.
#[derive(Debug, Parser)]
#[command(name = "ghost", version, about)]
struct Args {
    /// Installation root (defaults to GHOST_HOME, then ~/.ghost).
    #[arg(long)]
    root: Option<PathBuf>,

    /// Verbose logging, overriding RUST_LOG.
    #[arg(long)]
    debug: bool,

    /// Never prompt; fail instead of provisioning interactively.
    #[arg(long)]
    headless: bool,

    /// One-shot command to dispatch instead of starting the REPL.
    #[arg(trailing_var_arg = true)]
    command: Vec<String>,
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_root(arg: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    if let Some(root) = arg {
        return Ok(root);
    }
    if let Some(home) = std::env::var_os("GHOST_HOME") {
        return Ok(PathBuf::from(home));
    }
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .context("cannot locate a home directory; pass --root")?;
    Ok(PathBuf::from(home).join(".ghost"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let root = resolve_root(args.root)?;
    let mut config = GhostConfig::load(&root)
        .with_context(|| format!("loading settings under {}", root.display()))?;
    if args.headless {
        config.headless = true;
    }

    let shell = if config.headless {
        Shell::bootstrap(config, &prompt::HeadlessPrompt).await
    } else {
        Shell::bootstrap(config, &prompt::TerminalPrompt).await
    }
    .context("shell failed to start")?;

    if shell.boot_report().degraded {
        eprintln!(
            "warning: degraded boot, missing engines: {}",
            shell.boot_report().failed.join(", ")
        );
    }

    let result = if args.command.is_empty() {
        repl::run(&shell).await
    } else {
        dispatch_once(&shell, &args.command.join(" ")).await
    };

    shell.shutdown();
    result
}

async fn dispatch_once(shell: &Shell, line: &str) -> anyhow::Result<()> {
    match shell.dispatch(line).await {
        Ok(outcome) => {
            if !outcome.text.is_empty() {
                println!("{}", outcome.text);
            }
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
