//! Command execution shared by the source provisioner and the build executor.
//!
//! Every external tool (git, the container engine) is invoked through the
//! [`CommandRunner`] trait so a run is a sequence of explicit synchronous calls
//! that each return a `Result`. [`SystemRunner`] spawns real processes; tests
//! substitute a recording fake.
//!
//! ## Error Messages
//!
//! Failures carry what was being done (the step description), the program that
//! could not be started or its exit code, and how to fix a missing tool.

use std::ffi::OsStr;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::types::SyncError;

/// Why an external command did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum CommandFailure {
    /// The program could not be started at all.
    #[error(
        "failed to start `{program}` for {description}. \
         Ensure it is installed and available on PATH"
    )]
    Spawn {
        description: String,
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran and reported failure.
    #[error("{description} failed ({})", describe_exit(*code))]
    Status {
        description: String,
        code: Option<i32>,
    },

    /// The operator interrupted the run before or during the command.
    #[error("{description} was interrupted")]
    Interrupted { description: String },
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

/// Runs external commands on behalf of the pipeline.
pub trait CommandRunner {
    /// Runs `cmd` to completion with the operator's terminal attached.
    fn run(&self, cmd: &mut Command, description: &str) -> Result<(), CommandFailure>;

    /// Runs `cmd` silently and reports whether it exited successfully.
    ///
    /// Only a failure to start the program is an error.
    fn succeeds(&self, cmd: &mut Command, description: &str) -> Result<bool, CommandFailure>;
}

impl<T: CommandRunner + ?Sized> CommandRunner for &T {
    fn run(&self, cmd: &mut Command, description: &str) -> Result<(), CommandFailure> {
        (**self).run(cmd, description)
    }

    fn succeeds(&self, cmd: &mut Command, description: &str) -> Result<bool, CommandFailure> {
        (**self).succeeds(cmd, description)
    }
}

/// Spawns real processes, honouring an interrupt flag.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    interrupted: Arc<AtomicBool>,
}

impl SystemRunner {
    /// Creates a runner with its own (never set) interrupt flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `flag` (typically from [`install_interrupt_handler`]) to stop
    /// starting new commands once the operator presses Ctrl-C.
    pub fn with_interrupt_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupted = flag;
        self
    }

    fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, cmd: &mut Command, description: &str) -> Result<(), CommandFailure> {
        if self.is_interrupted() {
            return Err(CommandFailure::Interrupted {
                description: description.to_string(),
            });
        }

        let status = cmd.status().map_err(|source| CommandFailure::Spawn {
            description: description.to_string(),
            program: program_name(cmd),
            source,
        })?;

        if status.success() {
            Ok(())
        } else if self.is_interrupted() {
            Err(CommandFailure::Interrupted {
                description: description.to_string(),
            })
        } else {
            Err(CommandFailure::Status {
                description: description.to_string(),
                code: status.code(),
            })
        }
    }

    fn succeeds(&self, cmd: &mut Command, description: &str) -> Result<bool, CommandFailure> {
        if self.is_interrupted() {
            return Err(CommandFailure::Interrupted {
                description: description.to_string(),
            });
        }

        let status = cmd
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|source| CommandFailure::Spawn {
                description: description.to_string(),
                program: program_name(cmd),
                source,
            })?;
        Ok(status.success())
    }
}

/// Installs a Ctrl-C handler and returns the flag it sets.
///
/// The child process in the foreground receives the signal too and fails;
/// the runner then reports [`CommandFailure::Interrupted`] and the run unwinds
/// normally, dropping any temporary checkout. Can only be called once per
/// process.
pub fn install_interrupt_handler() -> Result<Arc<AtomicBool>, SyncError> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&flag);
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
        eprintln!("Interrupted, cleaning up...");
    })?;
    Ok(flag)
}

/// Maps a command failure to a pipeline error, keeping interruptions distinct.
pub(crate) fn classify(
    failure: CommandFailure,
    wrap: impl FnOnce(CommandFailure) -> SyncError,
) -> SyncError {
    match failure {
        CommandFailure::Interrupted { .. } => SyncError::Interrupted,
        other => wrap(other),
    }
}

/// Renders `cmd` as a copy-pasteable shell line.
pub fn render_command(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(shell_quote)
        .collect::<Vec<_>>()
        .join(" ")
}

fn shell_quote(arg: &OsStr) -> String {
    let arg = arg.to_string_lossy();
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@+,".contains(c));
    if plain {
        arg.into_owned()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

fn program_name(cmd: &Command) -> String {
    cmd.get_program().to_string_lossy().into_owned()
}

/// Runs `cmd`, echoing it first when `verbose` is set.
pub(crate) fn run_logged(
    runner: &dyn CommandRunner,
    mut cmd: Command,
    description: &str,
    verbose: bool,
) -> Result<(), CommandFailure> {
    if verbose {
        println!("  $ {}", render_command(&cmd));
    }
    runner.run(&mut cmd, description)
}
