//! Run-wide settings shared by every stage.
//!
//! [`SyncSettings`] holds everything that is fixed for a run: where the
//! upstream lives, which toolchain image builds which ABI, how the build is
//! configured, where outputs land and where the Android project wants them.
//! It is produced once at startup and passed by reference to each stage.

use std::path::{Path, PathBuf};

use crate::types::Abi;

/// Placeholder replaced by the `owner/name` repository in [`SyncSettings::url_template`].
pub const REPOSITORY_PLACEHOLDER: &str = "{repository}";

/// Placeholder replaced by the ABI name in image and build directory templates.
pub const ABI_PLACEHOLDER: &str = "{abi}";

/// Where the Android project expects the installed artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AndroidLayout {
    /// Root of the Android project.
    pub project_root: PathBuf,
    /// Per-ABI native library directory, relative to the project root.
    pub jni_libs_dir: PathBuf,
    /// Flat third-party library directory, relative to the project root.
    pub libs_dir: PathBuf,
}

impl AndroidLayout {
    /// Standard Gradle layout rooted at `project_root`.
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            jni_libs_dir: PathBuf::from("app/src/main/jniLibs"),
            libs_dir: PathBuf::from("app/libs"),
        }
    }

    /// Directory receiving the shared library for `abi`.
    pub fn abi_dir(&self, abi: Abi) -> PathBuf {
        self.project_root.join(&self.jni_libs_dir).join(abi.as_str())
    }

    /// Directory receiving the bindings archive.
    pub fn bindings_dir(&self) -> PathBuf {
        self.project_root.join(&self.libs_dir)
    }
}

/// Immutable settings for one update run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Clone URL template; `{repository}` is replaced by `owner/name`.
    pub url_template: String,
    /// Container engine CLI (`docker`, `podman`).
    pub engine: String,
    /// Toolchain image template; `{abi}` is replaced by the ABI name.
    pub image_template: String,
    /// Where the source tree is mounted inside the container.
    pub mount_point: String,
    /// Options passed to the configure step.
    pub configure_options: Vec<String>,
    /// Host environment variables forwarded into the container when set.
    pub forward_env: Vec<String>,
    /// Build directory template, relative to the source tree.
    pub build_dir_template: String,
    /// Shared library path relative to a build directory.
    pub library: PathBuf,
    /// Bindings archive path relative to a build directory.
    pub bindings: PathBuf,
    /// Destination layout.
    pub layout: AndroidLayout,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            url_template: "https://github.com/{repository}.git".to_string(),
            engine: "docker".to_string(),
            image_template: "ghcr.io/f3d-app/f3d-android-{abi}:latest".to_string(),
            mount_point: "/src".to_string(),
            configure_options: default_configure_options(),
            forward_env: vec!["CMAKE_BUILD_PARALLEL_LEVEL".to_string()],
            build_dir_template: "build_{abi}".to_string(),
            library: PathBuf::from("lib/libf3d-java.so"),
            bindings: PathBuf::from("java/f3d.jar"),
            layout: AndroidLayout::new("."),
        }
    }
}

/// Release build with the Java bindings and the optional readers compiled in.
pub fn default_configure_options() -> Vec<String> {
    [
        "-DCMAKE_BUILD_TYPE=Release",
        "-DF3D_BINDINGS_JAVA=ON",
        "-DF3D_PLUGINS_STATIC_BUILD=ON",
        "-DF3D_MODULE_EXR=ON",
        "-DF3D_PLUGIN_BUILD_ALEMBIC=ON",
        "-DF3D_PLUGIN_BUILD_ASSIMP=ON",
        "-DF3D_PLUGIN_BUILD_DRACO=ON",
        "-DF3D_PLUGIN_BUILD_OCCT=ON",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl SyncSettings {
    /// Clone URL for `repository`.
    pub fn repository_url(&self, repository: &str) -> String {
        self.url_template.replace(REPOSITORY_PLACEHOLDER, repository)
    }

    /// Toolchain image for `abi`.
    pub fn image(&self, abi: Abi) -> String {
        self.image_template.replace(ABI_PLACEHOLDER, abi.as_str())
    }

    /// Build directory name for `abi`, relative to the source tree.
    pub fn build_dir(&self, abi: Abi) -> String {
        self.build_dir_template.replace(ABI_PLACEHOLDER, abi.as_str())
    }

    /// Host path of the shared library produced for `abi`.
    pub fn library_output(&self, source: &Path, abi: Abi) -> PathBuf {
        source.join(self.build_dir(abi)).join(&self.library)
    }

    /// Host path of the bindings archive produced by the `abi` build.
    pub fn bindings_output(&self, source: &Path, abi: Abi) -> PathBuf {
        source.join(self.build_dir(abi)).join(&self.bindings)
    }
}
