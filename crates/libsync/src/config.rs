//! Configuration file support for libsync.
//!
//! This module provides support for `libsync.toml` configuration files that
//! let an Android project pin its upstream, toolchain images and output
//! layout instead of passing CLI flags on every run.
//!
//! ## Configuration File Location
//!
//! The configuration file is searched for in the following order:
//! 1. `--config <path>` if given
//! 2. Current working directory (`./libsync.toml`)
//! 3. Parent directories (up to the repository root or filesystem root)
//!
//! ## Example Configuration
//!
//! ```toml
//! [source]
//! repository = "f3d-app/f3d"
//! branch = "master"
//!
//! [toolchain]
//! engine = "docker"
//! image_template = "ghcr.io/f3d-app/f3d-android-{abi}:latest"
//! forward_env = ["CMAKE_BUILD_PARALLEL_LEVEL"]
//!
//! [outputs]
//! build_dir_template = "build_{abi}"
//! library = "lib/libf3d-java.so"
//! bindings = "java/f3d.jar"
//!
//! [android]
//! jni_libs_dir = "app/src/main/jniLibs"
//! libs_dir = "app/libs"
//! abis = ["arm64-v8a", "x86_64"]
//! ```

use anyhow::{Context, Result};
use libsync_sdk::{Abi, SyncError, SyncSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The default configuration file name.
pub const CONFIG_FILE_NAME: &str = "libsync.toml";

/// Root configuration structure for `libsync.toml`.
///
/// Every field is optional; anything left out falls back to the built-in
/// [`SyncSettings`] defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LibsyncConfig {
    /// Upstream source selection.
    pub source: SourceConfig,

    /// Container toolchain settings.
    pub toolchain: ToolchainConfig,

    /// Where the build puts its outputs.
    pub outputs: OutputsConfig,

    /// Android project layout.
    pub android: AndroidConfig,
}

/// Upstream source selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    /// Repository in `owner/name` form.
    pub repository: Option<String>,

    /// Branch or tag to clone.
    pub branch: Option<String>,

    /// Clone URL template containing `{repository}`.
    pub url_template: Option<String>,
}

/// Container toolchain settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolchainConfig {
    /// Container engine CLI, e.g. `docker` or `podman`.
    pub engine: Option<String>,

    /// Image template containing `{abi}`.
    pub image_template: Option<String>,

    /// Mount point of the source tree inside the container.
    pub mount_point: Option<String>,

    /// Replaces the default configure options entirely.
    pub configure_options: Option<Vec<String>>,

    /// Host environment variables forwarded into the container when set.
    pub forward_env: Option<Vec<String>>,
}

/// Build output locations, relative to the source tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputsConfig {
    /// Build directory template containing `{abi}`.
    pub build_dir_template: Option<String>,

    /// Shared library path inside a build directory.
    pub library: Option<PathBuf>,

    /// Bindings archive path inside a build directory.
    pub bindings: Option<PathBuf>,
}

/// Android project layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AndroidConfig {
    /// Per-ABI native library directory, relative to the project root.
    pub jni_libs_dir: Option<PathBuf>,

    /// Bindings archive directory, relative to the project root.
    pub libs_dir: Option<PathBuf>,

    /// ABIs built when no `--arch` is given.
    ///
    /// Defaults to all four supported ABIs.
    pub abis: Option<Vec<String>>,
}

impl LibsyncConfig {
    /// Loads configuration from the specified file path.
    ///
    /// # Returns
    ///
    /// * `Ok(LibsyncConfig)` - Successfully loaded configuration
    /// * `Err` - If the file cannot be read or parsed
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: LibsyncConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Attempts to find and load configuration starting from the specified directory.
    ///
    /// Walks up the directory tree until a `libsync.toml` is found, a
    /// directory containing `.git` has been checked, or the root is reached.
    ///
    /// # Returns
    ///
    /// * `Ok(Some((config, path)))` - Found and loaded configuration with its path
    /// * `Ok(None)` - No configuration file found
    /// * `Err` - If a config file was found but couldn't be parsed
    pub fn discover_from(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.is_file() {
                let config = Self::load_from_file(&config_path)?;
                return Ok(Some((config, config_path)));
            }

            // Stop at repository root or filesystem root
            if current.join(".git").exists() || !current.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Parses the configured default ABI list, if any.
    pub fn default_abis(&self) -> Result<Option<Vec<Abi>>, SyncError> {
        let Some(names) = &self.android.abis else {
            return Ok(None);
        };
        names
            .iter()
            .map(|name| {
                name.parse::<Abi>().map_err(|_| {
                    SyncError::Config(format!(
                        "unsupported ABI '{}' in [android].abis (supported: {})",
                        name,
                        Abi::supported_list()
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    /// Applies every configured value on top of `settings`.
    pub fn apply(&self, settings: &mut SyncSettings) {
        fn set<T: Clone>(slot: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *slot = value.clone();
            }
        }

        set(&mut settings.url_template, &self.source.url_template);
        set(&mut settings.engine, &self.toolchain.engine);
        set(&mut settings.image_template, &self.toolchain.image_template);
        set(&mut settings.mount_point, &self.toolchain.mount_point);
        set(
            &mut settings.configure_options,
            &self.toolchain.configure_options,
        );
        set(&mut settings.forward_env, &self.toolchain.forward_env);
        set(
            &mut settings.build_dir_template,
            &self.outputs.build_dir_template,
        );
        set(&mut settings.library, &self.outputs.library);
        set(&mut settings.bindings, &self.outputs.bindings);
        set(&mut settings.layout.jni_libs_dir, &self.android.jni_libs_dir);
        set(&mut settings.layout.libs_dir, &self.android.libs_dir);
    }
}

/// Configuration resolver that merges CLI arguments with config file values.
///
/// Priority order (highest to lowest):
/// 1. CLI arguments
/// 2. Config file values
/// 3. Built-in defaults
#[derive(Debug, Default)]
pub struct ConfigResolver {
    /// Loaded configuration, if any.
    pub config: Option<LibsyncConfig>,
    /// Path to the loaded config file, if any.
    pub config_path: Option<PathBuf>,
}

impl ConfigResolver {
    /// Loads `explicit` if given, otherwise discovers a config file from `start_dir`.
    ///
    /// An explicit path that cannot be read is an error; finding no file
    /// during discovery is not.
    pub fn load(explicit: Option<&Path>, start_dir: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            let config = LibsyncConfig::load_from_file(path)?;
            return Ok(Self {
                config: Some(config),
                config_path: Some(path.to_path_buf()),
            });
        }

        match LibsyncConfig::discover_from(start_dir)? {
            Some((config, path)) => Ok(Self {
                config: Some(config),
                config_path: Some(path),
            }),
            None => Ok(Self::default()),
        }
    }

    /// Directory containing the loaded config file.
    pub fn config_dir(&self) -> Option<&Path> {
        self.config_path
            .as_deref()
            .and_then(Path::parent)
            .map(|dir| {
                if dir.as_os_str().is_empty() {
                    Path::new(".")
                } else {
                    dir
                }
            })
    }

    /// Resolves a CLI value, using config as fallback.
    ///
    /// # Arguments
    ///
    /// * `cli_value` - Value from CLI argument (None if not provided)
    /// * `config_getter` - Function to get value from config
    /// * `default` - Default value if neither CLI nor config provides a value
    ///
    /// # Returns
    ///
    /// The resolved value, preferring CLI over config over default.
    pub fn resolve<T, F>(&self, cli_value: Option<T>, config_getter: F, default: T) -> T
    where
        F: FnOnce(&LibsyncConfig) -> Option<T>,
    {
        cli_value
            .or_else(|| self.config.as_ref().and_then(config_getter))
            .unwrap_or(default)
    }

    /// Builds the run-wide settings for an Android project at `project_root`.
    pub fn settings(&self, project_root: PathBuf) -> SyncSettings {
        let mut settings = SyncSettings::default();
        if let Some(config) = &self.config {
            config.apply(&mut settings);
        }
        settings.layout.project_root = project_root;
        settings
    }

    /// ABIs to build when none are given on the command line.
    pub fn default_abis(&self) -> Result<Vec<Abi>, SyncError> {
        match &self.config {
            Some(config) => Ok(config.default_abis()?.unwrap_or_default()),
            None => Ok(Vec::new()),
        }
    }
}
