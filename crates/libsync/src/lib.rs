//! # libsync
//!
//! Command-line tool that refreshes the prebuilt native libraries of an
//! Android project from an upstream native project.
//!
//! ## Overview
//!
//! One run does, strictly in order:
//!
//! - **Validate** - Parse flags and check every `--arch` against the supported ABIs
//! - **Provision** - Reuse a checkout, or shallow-clone the requested repository and branch
//! - **Build** - Per ABI: pull the toolchain image if needed, configure and build in it
//! - **Install** - Copy each ABI's shared library into `jniLibs/<abi>/`, then the
//!   bindings archive into `app/libs/`
//!
//! Any failure stops the run with a non-zero exit status; a temporary checkout
//! is always removed.
//!
//! ## Quick Start
//!
//! ```bash
//! # All four ABIs from the default upstream branch
//! libsync
//!
//! # Two ABIs from a tag, keeping the checkout for the next run
//! libsync --branch v3.0.0 --clone-dir ../f3d --arch arm64-v8a --arch x86_64
//!
//! # See what would happen
//! libsync --dry-run --verbose
//! ```
//!
//! ## Exit Status
//!
//! | Status | Meaning |
//! |--------|---------|
//! | `0` | Every requested ABI was built and installed |
//! | `1` | Configuration, clone, pull, build, missing output or I/O failure |
//! | `2` | Usage error, or `--help` |
//!
//! ## Modules
//!
//! - [`config`] - Configuration file support for `libsync.toml`

#![cfg_attr(docsrs, feature(doc_cfg))]

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use libsync_sdk::builders::{CommandRunner, SystemRunner, install_interrupt_handler};
use libsync_sdk::{
    Abi, AndroidLibBuilder, BuildRequest, DEFAULT_BRANCH, DEFAULT_REPOSITORY, SyncError,
    SyncReport, SyncSettings,
};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

pub mod config;

use config::ConfigResolver;

const AFTER_HELP: &str = "Supported architectures: arm64-v8a, armeabi-v7a, x86, x86_64\n\
     Without --arch, all supported architectures are built.";

/// Rebuild the upstream native library for Android ABIs and install it into this project.
#[derive(Parser, Debug)]
#[command(
    name = "libsync",
    author,
    about = "Cross-compile an upstream native library for Android and install it into the app",
    long_about = None,
    after_help = AFTER_HELP
)]
struct Cli {
    #[arg(long, value_name = "OWNER/NAME", help = "Upstream repository (default: f3d-app/f3d)")]
    repo: Option<String>,

    #[arg(long, value_name = "NAME", help = "Branch or tag to clone (default: master)")]
    branch: Option<String>,

    /// Working directory for the source, reused as-is if already a checkout
    /// (default: temporary, removed on exit)
    #[arg(long, value_name = "PATH")]
    clone_dir: Option<PathBuf>,

    #[arg(
        long = "arch",
        value_enum,
        value_name = "ABI",
        help = "Architecture to build; repeat for several (default: all)"
    )]
    arches: Vec<ArchArg>,

    #[arg(long, value_name = "PATH", help = "Android project root (default: auto-detect)")]
    project_dir: Option<PathBuf>,

    #[arg(long, value_name = "PATH", help = "Config file (default: discover libsync.toml)")]
    config: Option<PathBuf>,

    /// Print what would be done without actually doing it
    #[arg(long)]
    dry_run: bool,

    /// Print verbose output including all commands
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum ArchArg {
    #[value(name = "arm64-v8a")]
    Arm64V8a,
    #[value(name = "armeabi-v7a")]
    ArmeabiV7a,
    #[value(name = "x86")]
    X86,
    #[value(name = "x86_64")]
    X86_64,
}

impl From<ArchArg> for Abi {
    fn from(arch: ArchArg) -> Self {
        match arch {
            ArchArg::Arm64V8a => Abi::Arm64V8a,
            ArchArg::ArmeabiV7a => Abi::ArmeabiV7a,
            ArchArg::X86 => Abi::X86,
            ArchArg::X86_64 => Abi::X86_64,
        }
    }
}

/// A command-line problem: bad flag, bad value, or `--help`.
///
/// Reported before anything is cloned, pulled or built.
#[derive(Debug)]
pub enum UsageError {
    /// Rejected (or help requested) by the argument parser.
    Clap(clap::Error),
    /// Parsed, but the values do not form a valid request.
    Invalid(String),
}

impl UsageError {
    /// Prints the usage message to the terminal.
    pub fn print(&self) {
        match self {
            UsageError::Clap(err) => {
                let _ = err.print();
            }
            UsageError::Invalid(msg) => {
                eprintln!("error: {msg}\n\nFor more information, try '--help'.");
            }
        }
    }
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsageError::Clap(err) => write!(f, "{}", err.render()),
            UsageError::Invalid(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for UsageError {}

/// Exit status for a failed run: 2 for usage errors and `--help`, 1 otherwise.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<UsageError>().is_some() {
        2
    } else {
        1
    }
}

/// The immutable inputs of one run, produced once at startup.
#[derive(Debug)]
struct Resolved {
    request: BuildRequest,
    settings: SyncSettings,
    config_path: Option<PathBuf>,
}

/// Runs the CLI against the process arguments.
///
/// Installs the Ctrl-C handler, so call this at most once per process.
pub fn run() -> Result<()> {
    let interrupted = install_interrupt_handler()?;
    let runner = SystemRunner::new().with_interrupt_flag(interrupted);
    run_from(std::env::args_os(), runner)
}

/// Runs the CLI against `args` (the first item is the program name),
/// executing external commands through `runner`.
pub fn run_from<I, T>(args: I, runner: impl CommandRunner) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = parse_cli(args)?;
    let cwd = std::env::current_dir().context("resolving the current directory")?;
    let resolved = resolve(&cli, &cwd)?;
    load_dotenv(&resolved.settings.layout.project_root);

    let report = execute(&cli, &resolved, runner)?;
    print_report(&report);
    Ok(())
}

fn parse_cli<I, T>(args: I) -> Result<Cli>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Cli::try_parse_from(args).map_err(|err| UsageError::Clap(err).into())
}

fn resolve(cli: &Cli, cwd: &Path) -> Result<Resolved> {
    let resolver = ConfigResolver::load(cli.config.as_deref(), cwd)?;

    let project_root = cli
        .project_dir
        .clone()
        .or_else(|| resolver.config_dir().map(Path::to_path_buf))
        .or_else(|| find_project_root(cwd))
        .unwrap_or_else(|| cwd.to_path_buf());
    let settings = resolver.settings(project_root);

    let repository = resolver.resolve(
        cli.repo.clone(),
        |c| c.source.repository.clone(),
        DEFAULT_REPOSITORY.to_string(),
    );
    let branch = resolver.resolve(
        cli.branch.clone(),
        |c| c.source.branch.clone(),
        DEFAULT_BRANCH.to_string(),
    );
    let abis: Vec<Abi> = if cli.arches.is_empty() {
        resolver.default_abis()?
    } else {
        cli.arches.iter().copied().map(Abi::from).collect()
    };

    let request = BuildRequest::new(repository, branch, cli.clone_dir.clone(), abis)
        .map_err(|err| match err {
            SyncError::InvalidRequest(msg) => anyhow::Error::new(UsageError::Invalid(msg)),
            other => other.into(),
        })?;

    Ok(Resolved {
        request,
        settings,
        config_path: resolver.config_path,
    })
}

fn execute(cli: &Cli, resolved: &Resolved, runner: impl CommandRunner) -> Result<SyncReport> {
    let request = &resolved.request;
    if let Some(path) = &resolved.config_path {
        println!("Using config {}", path.display());
    }
    println!(
        "Updating {} ({}) for {}",
        request.repository(),
        request.branch(),
        request
            .abis()
            .iter()
            .map(Abi::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    );
    if cli.verbose {
        println!(
            "  Android project: {}",
            resolved.settings.layout.project_root.display()
        );
    }

    let report = AndroidLibBuilder::new(&resolved.settings)
        .runner(runner)
        .verbose(cli.verbose)
        .dry_run(cli.dry_run)
        .build(request)?;
    Ok(report)
}

fn print_report(report: &SyncReport) {
    if report.dry_run {
        println!("\nDry run: nothing was executed or written.");
        return;
    }
    println!("\nInstalled {} native libraries:", report.libraries.len());
    for library in &report.libraries {
        println!("  {:<12} {}", library.abi, library.destination.display());
    }
    println!(
        "Installed bindings archive (from the {} build): {}",
        report.bindings_abi,
        report.bindings.display()
    );
}

fn load_dotenv(project_root: &Path) {
    let _ = dotenvy::from_path(project_root.join(".env.local"));
}

fn find_project_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|candidate| is_project_root(candidate))
        .map(|root| root.to_path_buf())
}

fn is_project_root(candidate: &Path) -> bool {
    candidate.join("settings.gradle").is_file() || candidate.join("settings.gradle.kts").is_file()
}
