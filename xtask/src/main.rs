use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::Command;

#[derive(Parser)]
#[command(name = "xtask", about = "Workspace automation for camoscene")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all checks: fmt, clippy, tests, doc
    Check,
    /// Run cargo fmt --check on all crates
    Fmt,
    /// Run clippy on all crates
    Clippy,
    /// Run all tests
    Test,
    /// Build rustdoc for the workspace
    Doc,
    /// Build the entire workspace
    Build,
    /// Headless smoke run: simulate a few seconds and shade the demo sphere
    Smoke,
    /// Launch the desktop demo
    Demo {
        /// Extra arguments passed through to camoscene-desktop
        #[arg(trailing_var_arg = true)]
        args: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check => {
            cargo("fmt", &["fmt", "--all", "--", "--check"])?;
            clippy()?;
            cargo("test", &["test", "--workspace"])?;
            cargo("doc", &["doc", "--workspace", "--no-deps"])?;
        }
        Commands::Fmt => cargo("fmt", &["fmt", "--all", "--", "--check"])?,
        Commands::Clippy => clippy()?,
        Commands::Test => cargo("test", &["test", "--workspace"])?,
        Commands::Doc => cargo("doc", &["doc", "--workspace", "--no-deps"])?,
        Commands::Build => cargo("build", &["build", "--workspace"])?,
        Commands::Smoke => {
            cargo(
                "simulate",
                &[
                    "run", "-p", "camoscene-cli", "--", "simulate", "--ticks", "180", "--bodies",
                ],
            )?;
            cargo(
                "shade",
                &["run", "-p", "camoscene-cli", "--", "shade", "--strength", "1.0"],
            )?;
        }
        Commands::Demo { args } => {
            let mut full = vec!["run", "-p", "camoscene-desktop", "--release", "--"];
            full.extend(args.iter().map(String::as_str));
            cargo("demo", &full)?;
        }
    }

    Ok(())
}

fn clippy() -> Result<()> {
    cargo(
        "clippy",
        &[
            "clippy",
            "--workspace",
            "--all-targets",
            "--",
            "-D",
            "warnings",
        ],
    )
}

fn cargo(step: &str, args: &[&str]) -> Result<()> {
    println!("==> cargo {}", args.join(" "));
    let status = Command::new("cargo").args(args).status()?;
    if !status.success() {
        anyhow::bail!("{step} failed");
    }
    Ok(())
}
