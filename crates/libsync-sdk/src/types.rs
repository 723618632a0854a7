//! Core types for libsync-sdk.
//!
//! - [`SyncError`] - Error type for every stage of an update run
//! - [`Abi`] - The closed set of Android ABIs the toolchain images exist for
//! - [`BuildRequest`] - What to fetch and which ABIs to build
//! - [`SyncReport`] - What a run installed (or would install, in dry-run mode)

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::builders::common::CommandFailure;

/// Upstream repository used when none is requested.
pub const DEFAULT_REPOSITORY: &str = "f3d-app/f3d";

/// Upstream branch or tag used when none is requested.
pub const DEFAULT_BRANCH: &str = "master";

/// Error types for libsync-sdk operations.
///
/// Every variant is fatal: a run stops at the first error and cleans up its
/// ephemeral checkout on the way out.
///
/// # Example
///
/// ```ignore
/// use libsync_sdk::{AndroidLibBuilder, SyncError};
///
/// match builder.build(&request) {
///     Ok(report) => println!("installed {} libraries", report.libraries.len()),
///     Err(SyncError::MissingOutput { abi, path }) => {
///         eprintln!("{abi}: nothing at {}", path.display());
///     }
///     Err(e) => eprintln!("update failed: {e}"),
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// An architecture outside the supported allow-list was requested.
    #[error("unsupported architecture '{0}'. Supported architectures: {}", Abi::supported_list())]
    UnsupportedAbi(String),

    /// The request itself is malformed (repository form, clone directory state).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}. Check libsync.toml or CLI flags")]
    Config(String),

    /// Cloning the upstream source failed (network, auth, unknown branch).
    #[error("failed to fetch {repository} at '{branch}'")]
    Provision {
        repository: String,
        branch: String,
        #[source]
        source: CommandFailure,
    },

    /// The isolated build environment failed: image pull, configure or build.
    #[error("build environment failed for {abi}")]
    Environment {
        abi: Abi,
        #[source]
        source: CommandFailure,
    },

    /// A step reported success but its expected output is not on disk.
    ///
    /// This points at a build configuration or upstream layout change rather
    /// than a toolchain failure.
    #[error(
        "build for {abi} succeeded but the expected output is missing: {}\n\n\
         The build configuration or the upstream output layout may have changed.",
        path.display()
    )]
    MissingOutput { abi: Abi, path: PathBuf },

    /// The operator interrupted the run.
    #[error("interrupted")]
    Interrupted,

    /// The Ctrl-C handler could not be installed.
    #[error("failed to install the interrupt handler")]
    Signal(#[from] ctrlc::Error),

    /// A temporary checkout could not be removed after the run.
    #[error(
        "failed to remove temporary checkout {}. Remove it manually; \
         files created by the container may need elevated permissions",
        path.display()
    )]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An I/O error occurred while preparing directories or copying artifacts.
    #[error("I/O error at {}. Check file paths and permissions", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Android ABI the native library is cross-compiled for.
///
/// # Example
///
/// ```
/// use libsync_sdk::Abi;
///
/// let abi: Abi = "arm64-v8a".parse().unwrap();
/// assert_eq!(abi, Abi::Arm64V8a);
/// assert_eq!(abi.as_str(), "arm64-v8a");
/// assert!("mips".parse::<Abi>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Abi {
    /// 64-bit ARM.
    Arm64V8a,
    /// 32-bit ARM.
    ArmeabiV7a,
    /// 32-bit x86.
    X86,
    /// 64-bit x86.
    X86_64,
}

impl Abi {
    /// Every supported ABI, in the order they are built by default.
    pub const ALL: [Abi; 4] = [Abi::Arm64V8a, Abi::ArmeabiV7a, Abi::X86, Abi::X86_64];

    /// Returns the Android ABI name, which is also the jniLibs directory name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Abi::Arm64V8a => "arm64-v8a",
            Abi::ArmeabiV7a => "armeabi-v7a",
            Abi::X86 => "x86",
            Abi::X86_64 => "x86_64",
        }
    }

    /// Comma-separated list of supported ABI names, for help and error text.
    pub fn supported_list() -> String {
        Abi::ALL
            .iter()
            .map(Abi::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Abi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Abi {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Abi::ALL
            .into_iter()
            .find(|abi| abi.as_str() == s)
            .ok_or_else(|| SyncError::UnsupportedAbi(s.to_string()))
    }
}

/// A validated, immutable description of one update run.
///
/// Built once from command-line input (merged with configuration). The ABI
/// list is never empty and keeps the order of first occurrence; the first ABI
/// is the one whose build supplies the bindings archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    repository: String,
    branch: String,
    clone_dir: Option<PathBuf>,
    abis: Vec<Abi>,
}

impl BuildRequest {
    /// Validates and builds a request.
    ///
    /// An empty `abis` selects every supported ABI. Duplicates are dropped.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidRequest`] if `repository` is not in `owner/name`
    /// form or `branch` is empty.
    pub fn new(
        repository: impl Into<String>,
        branch: impl Into<String>,
        clone_dir: Option<PathBuf>,
        abis: impl IntoIterator<Item = Abi>,
    ) -> Result<Self, SyncError> {
        let repository = repository.into();
        let branch = branch.into();
        validate_repository(&repository)?;
        if branch.trim().is_empty() {
            return Err(SyncError::InvalidRequest(
                "branch must not be empty".to_string(),
            ));
        }

        let mut selected = Vec::new();
        for abi in abis {
            if !selected.contains(&abi) {
                selected.push(abi);
            }
        }
        if selected.is_empty() {
            selected = Abi::ALL.to_vec();
        }

        Ok(Self {
            repository,
            branch,
            clone_dir,
            abis: selected,
        })
    }

    /// Upstream repository in `owner/name` form.
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Branch or tag to clone.
    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Caller-supplied working directory, if any.
    pub fn clone_dir(&self) -> Option<&std::path::Path> {
        self.clone_dir.as_deref()
    }

    /// ABIs to build, in build order.
    pub fn abis(&self) -> &[Abi] {
        &self.abis
    }

    /// The ABI whose build output supplies the bindings archive.
    ///
    /// The archive is assumed to be identical for every ABI. Nothing checks
    /// this; only the first requested ABI's copy is ever read.
    pub fn bindings_abi(&self) -> Abi {
        self.abis[0]
    }
}

impl Default for BuildRequest {
    fn default() -> Self {
        Self {
            repository: DEFAULT_REPOSITORY.to_string(),
            branch: DEFAULT_BRANCH.to_string(),
            clone_dir: None,
            abis: Abi::ALL.to_vec(),
        }
    }
}

fn validate_repository(repository: &str) -> Result<(), SyncError> {
    let valid = match repository.split_once('/') {
        Some((owner, name)) => {
            !owner.is_empty()
                && !name.is_empty()
                && !name.contains('/')
                && !repository.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(SyncError::InvalidRequest(format!(
            "repository '{}' must be in owner/name form (e.g. {})",
            repository, DEFAULT_REPOSITORY
        )))
    }
}

/// One shared library placed into the Android project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledLibrary {
    /// ABI the library was built for.
    pub abi: Abi,
    /// Build output the library was copied from.
    pub source: PathBuf,
    /// Destination inside the Android project.
    pub destination: PathBuf,
}

/// Result of an update run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// One entry per requested ABI, in build order.
    pub libraries: Vec<InstalledLibrary>,
    /// Destination of the shared bindings archive.
    pub bindings: PathBuf,
    /// ABI whose build supplied the bindings archive.
    pub bindings_abi: Abi,
    /// `true` when nothing was executed or written.
    pub dry_run: bool,
}
