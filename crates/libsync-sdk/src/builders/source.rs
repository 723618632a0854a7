//! Source provisioning
//!
//! Makes sure a checkout of the upstream project exists before any build
//! runs. A caller-supplied directory that already holds a checkout is reused
//! untouched; otherwise a shallow, single-branch, blob-filtered clone is made
//! into the supplied directory or into a temporary one.

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use super::common::{CommandRunner, classify, render_command, run_logged};
use crate::settings::SyncSettings;
use crate::types::{BuildRequest, SyncError};

/// How a [`SourceTree`] came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceOrigin {
    /// Caller-supplied checkout, used as-is.
    Existing,
    /// Cloned by this run into a caller-supplied directory, which is kept.
    Cloned,
    /// Cloned by this run into a temporary directory removed on drop.
    Temporary,
}

/// A checkout of the upstream project.
///
/// When the origin is [`SourceOrigin::Temporary`] the directory is owned by
/// this value. [`close`](Self::close) removes it and reports failure; dropping
/// an unclosed tree removes it too and prints a warning if that fails.
#[derive(Debug)]
pub struct SourceTree {
    path: PathBuf,
    origin: SourceOrigin,
    guard: Option<TempDir>,
}

impl SourceTree {
    /// Absolute path of the checkout.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// How the checkout was obtained.
    pub fn origin(&self) -> SourceOrigin {
        self.origin
    }

    /// `true` if the directory disappears when this value is dropped.
    pub fn is_ephemeral(&self) -> bool {
        self.guard.is_some()
    }

    /// Removes an ephemeral checkout. Does nothing for caller-supplied directories.
    ///
    /// # Errors
    ///
    /// [`SyncError::Cleanup`] if the directory could not be removed, e.g.
    /// because the container left root-owned build files in it.
    pub fn close(mut self) -> Result<(), SyncError> {
        match self.guard.take() {
            Some(guard) => guard.close().map_err(|source| SyncError::Cleanup {
                path: self.path.clone(),
                source,
            }),
            None => Ok(()),
        }
    }
}

impl Drop for SourceTree {
    fn drop(&mut self) {
        let Some(guard) = self.guard.take() else {
            return;
        };
        if let Err(err) = guard.close() {
            eprintln!(
                "Warning: failed to remove temporary checkout {}: {}",
                self.path.display(),
                err
            );
        }
    }
}

/// Returns `true` if `dir` holds a git checkout.
pub fn is_checkout(dir: &Path) -> bool {
    dir.join(".git").exists()
}

/// Builds the shallow, single-branch, blob-filtered clone command.
pub fn clone_command(settings: &SyncSettings, request: &BuildRequest, dest: &Path) -> Command {
    let mut cmd = Command::new("git");
    cmd.args([
        "clone",
        "--depth",
        "1",
        "--single-branch",
        "--filter=blob:none",
        "--branch",
        request.branch(),
    ])
    .arg(settings.repository_url(request.repository()))
    .arg(dest);
    cmd
}

/// Obtains the working source tree for a request.
pub struct SourceProvisioner<'a> {
    settings: &'a SyncSettings,
    runner: &'a dyn CommandRunner,
    verbose: bool,
}

impl<'a> SourceProvisioner<'a> {
    /// Creates a provisioner running git through `runner`.
    pub fn new(settings: &'a SyncSettings, runner: &'a dyn CommandRunner) -> Self {
        Self {
            settings,
            runner,
            verbose: false,
        }
    }

    /// Enables verbose output
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Provides a checkout for `request`.
    ///
    /// # Errors
    ///
    /// * [`SyncError::Provision`] if the clone fails; no retry is attempted.
    /// * [`SyncError::InvalidRequest`] if the supplied directory is neither a
    ///   checkout nor empty.
    pub fn provision(&self, request: &BuildRequest) -> Result<SourceTree, SyncError> {
        match request.clone_dir() {
            Some(dir) if is_checkout(dir) => {
                if let Some(note) = self.reuse_note(dir, request) {
                    println!("{note}");
                }
                let path = dir.canonicalize().map_err(|e| SyncError::io(dir, e))?;
                Ok(SourceTree {
                    path,
                    origin: SourceOrigin::Existing,
                    guard: None,
                })
            }
            Some(dir) => {
                ensure_clone_target(dir)?;
                std::fs::create_dir_all(dir).map_err(|e| SyncError::io(dir, e))?;
                let path = dir.canonicalize().map_err(|e| SyncError::io(dir, e))?;
                self.clone_into(request, &path)?;
                Ok(SourceTree {
                    path,
                    origin: SourceOrigin::Cloned,
                    guard: None,
                })
            }
            None => {
                let guard = tempfile::Builder::new()
                    .prefix("libsync-")
                    .tempdir()
                    .map_err(|e| SyncError::io(std::env::temp_dir(), e))?;
                let path = guard.path().to_path_buf();
                if self.verbose {
                    println!("  Using temporary checkout at {}", path.display());
                }
                let tree = SourceTree {
                    path,
                    origin: SourceOrigin::Temporary,
                    guard: Some(guard),
                };
                self.clone_into(request, tree.path())?;
                Ok(tree)
            }
        }
    }

    /// Describes what [`provision`](Self::provision) would do without doing it.
    ///
    /// Returns the checkout path (a placeholder for temporary directories) and
    /// the clone command line, if a clone would run.
    ///
    /// # Errors
    ///
    /// The same [`SyncError::InvalidRequest`] that
    /// [`provision`](Self::provision) would raise for an unusable directory.
    pub fn plan(&self, request: &BuildRequest) -> Result<(PathBuf, Option<String>), SyncError> {
        match request.clone_dir() {
            Some(dir) if is_checkout(dir) => Ok((dir.to_path_buf(), None)),
            Some(dir) => {
                ensure_clone_target(dir)?;
                let cmd = clone_command(self.settings, request, dir);
                Ok((dir.to_path_buf(), Some(render_command(&cmd))))
            }
            None => {
                let dir = std::env::temp_dir().join("libsync-XXXXXX");
                let cmd = clone_command(self.settings, request, &dir);
                Ok((dir, Some(render_command(&cmd))))
            }
        }
    }

    /// Progress line for reusing `dir`, shown only in verbose mode.
    fn reuse_note(&self, dir: &Path, request: &BuildRequest) -> Option<String> {
        self.verbose.then(|| {
            format!(
                "  Reusing existing checkout at {} ({} at '{}' ignored)",
                dir.display(),
                request.repository(),
                request.branch()
            )
        })
    }

    fn clone_into(&self, request: &BuildRequest, dest: &Path) -> Result<(), SyncError> {
        println!(
            "Cloning {} ({}) into {}...",
            request.repository(),
            request.branch(),
            dest.display()
        );
        let cmd = clone_command(self.settings, request, dest);
        run_logged(self.runner, cmd, "git clone", self.verbose).map_err(|failure| {
            classify(failure, |source| SyncError::Provision {
                repository: request.repository().to_string(),
                branch: request.branch().to_string(),
                source,
            })
        })
    }
}

fn ensure_clone_target(dir: &Path) -> Result<(), SyncError> {
    if !dir.exists() {
        return Ok(());
    }
    if !dir.is_dir() {
        return Err(SyncError::InvalidRequest(format!(
            "clone directory {} exists but is not a directory",
            dir.display()
        )));
    }
    let mut entries = std::fs::read_dir(dir).map_err(|e| SyncError::io(dir, e))?;
    if entries.next().is_some() {
        return Err(SyncError::InvalidRequest(format!(
            "clone directory {} is not empty and is not a git checkout.\n\n\
             Point --clone-dir at an existing checkout, an empty directory, \
             or a path that does not exist yet.",
            dir.display()
        )));
    }
    Ok(())
}
