//! Build automation for the upstream native library.
//!
//! ## Overview
//!
//! The pipeline is strictly sequential:
//!
//! 1. **Source** - Reuse a checkout or make a shallow, blob-filtered clone ([`source`])
//! 2. **Toolchain** - Make sure each ABI's cross-compilation image is present
//! 3. **Build** - Configure and build inside the ABI's container, one ABI at a time
//! 4. **Install** - Copy each ABI's shared library as soon as it is verified, then
//!    the shared bindings archive ([`crate::install`])
//!
//! ## Common Utilities
//!
//! The [`common`] module provides the [`CommandRunner`] seam every external
//! tool goes through, command rendering for verbose and dry-run output, and
//! the Ctrl-C flag.
//!
//! ## Builder Options
//!
//! - **`verbose(bool)`** - Echo every external command before running it
//! - **`dry_run(bool)`** - Print the plan without running or writing anything
//! - **`runner(impl CommandRunner)`** - Replace how commands are executed
//!
//! ## Example
//!
//! ```ignore
//! use libsync_sdk::builders::AndroidLibBuilder;
//! use libsync_sdk::{Abi, BuildRequest, SyncSettings};
//!
//! let settings = SyncSettings::default();
//! let request = BuildRequest::new("f3d-app/f3d", "master", None, [Abi::Arm64V8a])?;
//!
//! let report = AndroidLibBuilder::new(&settings)
//!     .verbose(true)
//!     .build(&request)?;
//! # Ok::<(), libsync_sdk::SyncError>(())
//! ```

pub mod android;
pub mod common;
pub mod source;

pub use android::AndroidLibBuilder;
pub use common::{CommandFailure, CommandRunner, SystemRunner, install_interrupt_handler};
pub use source::{SourceOrigin, SourceProvisioner, SourceTree};
