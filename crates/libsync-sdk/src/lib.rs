//! Android native-library sync for Rust
//!
//! `libsync-sdk` fetches an upstream native project, cross-compiles it for
//! Android ABIs inside per-ABI toolchain containers, and installs the results
//! where an Android Gradle project expects them:
//!
//! ```text
//! app/
//! ├── libs/f3d.jar                          # bindings archive (one copy)
//! └── src/main/jniLibs/
//!     ├── arm64-v8a/libf3d-java.so
//!     ├── armeabi-v7a/libf3d-java.so
//!     ├── x86/libf3d-java.so
//!     └── x86_64/libf3d-java.so
//! ```
//!
//! # Architecture
//!
//! - **Types**: [`BuildRequest`] (what to build), [`SyncSettings`] (how and
//!   where), [`SyncReport`] (what was installed), [`SyncError`]
//! - **Builders**: source provisioning and the per-ABI build loop
//! - **Install**: copying verified outputs into the Android project
//!
//! # Example
//!
//! ```ignore
//! use libsync_sdk::{AndroidLibBuilder, Abi, BuildRequest, SyncSettings};
//!
//! fn main() -> Result<(), libsync_sdk::SyncError> {
//!     let settings = SyncSettings::default();
//!     let request = BuildRequest::new(
//!         "f3d-app/f3d",
//!         "master",
//!         None,
//!         [Abi::Arm64V8a, Abi::X86_64],
//!     )?;
//!
//!     let report = AndroidLibBuilder::new(&settings).build(&request)?;
//!     println!("bindings: {}", report.bindings.display());
//!     Ok(())
//! }
//! ```
//!
//! The bindings archive is taken from the first requested ABI's build only.
//! It is assumed to be the same for every ABI; nothing verifies that.

pub mod builders;
pub mod install;
pub mod settings;
pub mod types;

#[cfg(test)]
mod testing;

pub use builders::{AndroidLibBuilder, CommandRunner, SystemRunner};
pub use install::ArtifactInstaller;
pub use settings::{AndroidLayout, SyncSettings};
pub use types::{
    Abi, BuildRequest, DEFAULT_BRANCH, DEFAULT_REPOSITORY, InstalledLibrary, SyncError, SyncReport,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
