//! Build automation tasks for the minibatis workspace.
//!
//! Run with `cargo xtask <command>`.
//!
//! ## Available Commands
//!
//! - `ci`: Run all CI checks (format, lint, test, docs)
//! - `fmt`: Check/apply code formatting
//! - `clippy`: Run clippy lints
//! - `test`: Run all tests
//! - `doc`: Generate documentation
//! - `bench`: Run benchmarks
//! - `fuzz`: Run fuzz tests (requires cargo-fuzz + nightly)
//! - `coverage`: Run code coverage (requires cargo-llvm-cov)
//! - `semver`: Check published crates for semver violations

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use xshell::{Shell, cmd};

/// Crates published to crates.io, in dependency order.
const PUBLISHED_CRATES: [&str; 4] = [
    "minibatis-types",
    "minibatis-pool",
    "minibatis-derive",
    "minibatis",
];

#[derive(Parser)]
#[command(name = "xtask", about = "Build automation for minibatis")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all checks (format, lint, test, docs)
    Ci,
    /// Run cargo fmt (--check by default, --fix to apply)
    Fmt {
        /// Apply formatting fixes
        #[arg(long)]
        fix: bool,
    },
    /// Run clippy with all features
    Clippy {
        /// Apply clippy suggestions
        #[arg(long)]
        fix: bool,
    },
    /// Run all tests
    Test {
        /// Test a specific package
        #[arg(short, long)]
        package: Option<String>,
    },
    /// Generate documentation
    Doc {
        /// Open documentation in browser
        #[arg(long)]
        open: bool,
    },
    /// Run benchmarks
    Bench {
        /// Benchmark filter pattern
        filter: Option<String>,
    },
    /// Run fuzz tests (requires cargo-fuzz + nightly)
    Fuzz {
        /// Fuzz target to run
        #[arg(default_value = "placeholder_scan")]
        target: String,
        /// Maximum runtime in seconds
        #[arg(long, default_value = "60")]
        max_time: u64,
        /// List available fuzz targets
        #[arg(long)]
        list: bool,
    },
    /// Run code coverage
    Coverage {
        /// Output format (html, lcov, json)
        #[arg(long, default_value = "html")]
        format: String,
    },
    /// Check for semver violations (requires cargo-semver-checks)
    Semver,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;

    // Change to workspace root
    let workspace_root = workspace_root()?;
    sh.change_dir(&workspace_root);

    match cli.command {
        Command::Ci => {
            fmt(&sh, false)?;
            clippy(&sh, false)?;
            test(&sh, None)?;
            doc(&sh, false)?;
            println!("\nall CI checks passed");
        }
        Command::Fmt { fix } => fmt(&sh, fix)?,
        Command::Clippy { fix } => clippy(&sh, fix)?,
        Command::Test { package } => test(&sh, package.as_deref())?,
        Command::Doc { open } => doc(&sh, open)?,
        Command::Bench { filter } => bench(&sh, filter.as_deref())?,
        Command::Fuzz {
            target,
            max_time,
            list,
        } => fuzz(&sh, &target, max_time, list)?,
        Command::Coverage { format } => coverage(&sh, &format)?,
        Command::Semver => semver(&sh)?,
    }

    Ok(())
}

fn workspace_root() -> Result<PathBuf> {
    let output = std::process::Command::new("cargo")
        .args(["locate-project", "--workspace", "--message-format=plain"])
        .output()
        .context("failed to run cargo locate-project")?;

    let path = String::from_utf8(output.stdout)
        .context("invalid UTF-8 in cargo output")?
        .trim()
        .to_string();

    Ok(PathBuf::from(path)
        .parent()
        .context("failed to get workspace root")?
        .to_path_buf())
}

/// Run `command`, framing it with a start line and a success line.
fn step(label: &str, command: xshell::Cmd<'_>) -> Result<()> {
    println!("==> {label}");
    command.run().with_context(|| format!("{label} failed"))?;
    println!("    ok: {label}");
    Ok(())
}

fn fmt(sh: &Shell, fix: bool) -> Result<()> {
    if fix {
        step("cargo fmt", cmd!(sh, "cargo fmt --all"))
    } else {
        step("format check", cmd!(sh, "cargo fmt --all -- --check"))
    }
}

fn clippy(sh: &Shell, fix: bool) -> Result<()> {
    let base = cmd!(sh, "cargo clippy --workspace --all-features --all-targets");
    if fix {
        step("clippy --fix", base.args(["--fix", "--allow-dirty"]))
    } else {
        step("clippy", base.args(["--", "-D", "warnings"]))
    }
}

fn test(sh: &Shell, package: Option<&str>) -> Result<()> {
    let scope: Vec<&str> = match package {
        Some(pkg) => vec!["-p", pkg],
        None => vec!["--workspace"],
    };
    step("tests", cmd!(sh, "cargo test {scope...} --all-features"))
}

fn doc(sh: &Shell, open: bool) -> Result<()> {
    let open = open.then_some("--open");
    step(
        "rustdoc",
        cmd!(sh, "cargo doc --workspace --all-features --no-deps {open...}"),
    )
}

fn bench(sh: &Shell, filter: Option<&str>) -> Result<()> {
    let filter: Vec<&str> = filter.map(|f| vec!["--", f]).unwrap_or_default();
    step("benchmarks", cmd!(sh, "cargo bench -p minibatis {filter...}"))
}

fn fuzz(sh: &Shell, target: &str, max_time: u64, list: bool) -> Result<()> {
    let targets_dir = sh.current_dir().join("fuzz").join("fuzz_targets");
    if !targets_dir.is_dir() {
        bail!("no fuzz targets under {}", targets_dir.display());
    }

    if list {
        let mut names: Vec<String> = fs::read_dir(&targets_dir)?
            .filter_map(|entry| {
                let path = entry.ok()?.path();
                Some(path.file_stem()?.to_string_lossy().into_owned())
            })
            .collect();
        names.sort();
        for name in names {
            println!("{name}");
        }
        return Ok(());
    }

    // cargo-fuzz requires nightly
    let limit = format!("-max_total_time={max_time}");
    step(
        &format!("fuzz {target} ({max_time}s)"),
        cmd!(sh, "cargo +nightly fuzz run {target} -- {limit}"),
    )
}

fn coverage(sh: &Shell, format: &str) -> Result<()> {
    // Requires cargo-llvm-cov
    let output: &[&str] = match format {
        "html" => &["--html"],
        "lcov" => &["--lcov", "--output-path", "target/lcov.info"],
        "json" => &["--json", "--output-path", "target/coverage.json"],
        other => bail!("unknown coverage format {other:?}; expected html, lcov or json"),
    };
    step(
        "coverage",
        cmd!(sh, "cargo llvm-cov --workspace --all-features {output...}"),
    )
}

fn semver(sh: &Shell) -> Result<()> {
    for crate_name in PUBLISHED_CRATES {
        step(
            &format!("semver {crate_name}"),
            cmd!(sh, "cargo semver-checks check-release -p {crate_name}"),
        )?;
    }
    Ok(())
}
