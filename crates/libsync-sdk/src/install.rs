//! Artifact installation into the Android project.
//!
//! Destinations are plain overwrite targets: there is no manifest, checksum or
//! version check. The installer trusts the build step and the fixed output
//! paths, and only fails when an expected file is not there.

use std::path::{Path, PathBuf};

use crate::settings::AndroidLayout;
use crate::types::{Abi, SyncError};

/// Copies build outputs into the Android project layout.
pub struct ArtifactInstaller<'a> {
    layout: &'a AndroidLayout,
    verbose: bool,
}

impl<'a> ArtifactInstaller<'a> {
    /// Creates an installer writing into `layout`.
    pub fn new(layout: &'a AndroidLayout) -> Self {
        Self {
            layout,
            verbose: false,
        }
    }

    /// Enables verbose output
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Destination of the shared library `src` for `abi`.
    pub fn library_destination(&self, abi: Abi, src: &Path) -> PathBuf {
        self.layout.abi_dir(abi).join(file_name(src))
    }

    /// Destination of the bindings archive `src`.
    pub fn bindings_destination(&self, src: &Path) -> PathBuf {
        self.layout.bindings_dir().join(file_name(src))
    }

    /// Copies the shared library built for `abi` into `<jniLibs>/<abi>/`.
    ///
    /// # Errors
    ///
    /// [`SyncError::MissingOutput`] if `src` does not exist, or
    /// [`SyncError::Io`] if the copy fails.
    pub fn install_library(&self, abi: Abi, src: &Path) -> Result<PathBuf, SyncError> {
        let dest = self.library_destination(abi, src);
        self.copy(abi, src, &dest)?;
        Ok(dest)
    }

    /// Copies the bindings archive built for `abi` into the shared libs directory.
    ///
    /// # Errors
    ///
    /// [`SyncError::MissingOutput`] if `src` does not exist, or
    /// [`SyncError::Io`] if the copy fails.
    pub fn install_bindings(&self, abi: Abi, src: &Path) -> Result<PathBuf, SyncError> {
        let dest = self.bindings_destination(src);
        self.copy(abi, src, &dest)?;
        Ok(dest)
    }

    fn copy(&self, abi: Abi, src: &Path, dest: &Path) -> Result<(), SyncError> {
        if !src.is_file() {
            return Err(SyncError::MissingOutput {
                abi,
                path: src.to_path_buf(),
            });
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SyncError::io(parent, e))?;
        }
        std::fs::copy(src, dest).map_err(|e| SyncError::io(dest, e))?;

        if self.verbose {
            println!("  Copied {} -> {}", src.display(), dest.display());
        }
        Ok(())
    }
}

fn file_name(src: &Path) -> &std::ffi::OsStr {
    src.file_name().unwrap_or(src.as_os_str())
}
