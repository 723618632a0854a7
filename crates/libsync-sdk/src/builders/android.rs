//! Android build automation
//!
//! This module cross-compiles the upstream native library for each requested
//! Android ABI inside that ABI's toolchain container, and installs the shared
//! libraries and the bindings archive into the Android project.

use std::path::{Path, PathBuf};
use std::process::Command;

use super::common::{CommandRunner, SystemRunner, classify, render_command, run_logged};
use super::source::SourceProvisioner;
use crate::install::ArtifactInstaller;
use crate::settings::SyncSettings;
use crate::types::{Abi, BuildRequest, InstalledLibrary, SyncError, SyncReport};

/// `<engine> image inspect <image>`: succeeds when the image is present locally.
pub fn image_inspect_command(settings: &SyncSettings, abi: Abi) -> Command {
    let mut cmd = Command::new(&settings.engine);
    cmd.args(["image", "inspect"]).arg(settings.image(abi));
    cmd
}

/// `<engine> pull <image>`
pub fn pull_command(settings: &SyncSettings, abi: Abi) -> Command {
    let mut cmd = Command::new(&settings.engine);
    cmd.arg("pull").arg(settings.image(abi));
    cmd
}

/// Configure step: `cmake -S . -B <build dir> <options>` inside the container.
pub fn configure_command(settings: &SyncSettings, source: &Path, abi: Abi) -> Command {
    let mut cmd = container_command(settings, source, abi);
    cmd.args(["cmake", "-S", ".", "-B"])
        .arg(settings.build_dir(abi))
        .args(&settings.configure_options);
    cmd
}

/// Build step: `cmake --build <build dir>` inside the container.
pub fn compile_command(settings: &SyncSettings, source: &Path, abi: Abi) -> Command {
    let mut cmd = container_command(settings, source, abi);
    cmd.args(["cmake", "--build"]).arg(settings.build_dir(abi));
    cmd
}

/// `<engine> run --rm -v <source>:<mount> -w <mount> [-e VAR]... <image>`
///
/// Variables listed in `forward_env` are passed through only when set on the
/// host; the engine reads their values from its own environment.
fn container_command(settings: &SyncSettings, source: &Path, abi: Abi) -> Command {
    let mut cmd = Command::new(&settings.engine);
    cmd.args(["run", "--rm", "-v"])
        .arg(format!("{}:{}", source.display(), settings.mount_point))
        .arg("-w")
        .arg(&settings.mount_point);
    for var in &settings.forward_env {
        if std::env::var_os(var).is_some() {
            cmd.arg("-e").arg(var);
        }
    }
    cmd.arg(settings.image(abi));
    cmd
}

/// Android builder that handles the complete update pipeline
pub struct AndroidLibBuilder<'a> {
    settings: &'a SyncSettings,
    runner: Box<dyn CommandRunner + 'a>,
    verbose: bool,
    dry_run: bool,
}

impl<'a> AndroidLibBuilder<'a> {
    /// Creates a new Android builder running real processes.
    pub fn new(settings: &'a SyncSettings) -> Self {
        Self {
            settings,
            runner: Box::new(SystemRunner::new()),
            verbose: false,
            dry_run: false,
        }
    }

    /// Replaces the command runner (e.g. one wired to a Ctrl-C flag).
    pub fn runner(mut self, runner: impl CommandRunner + 'a) -> Self {
        self.runner = Box::new(runner);
        self
    }

    /// Enables verbose output
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Prints the steps instead of running them
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Runs the update for `request`.
    ///
    /// This performs the following steps:
    /// 1. Provision the upstream source (reuse a checkout or clone)
    /// 2. For each ABI, in order: ensure the toolchain image, configure, build,
    ///    verify the shared library and install it into `<jniLibs>/<abi>/`
    /// 3. Install the bindings archive from the first ABI's build
    ///
    /// The first failure aborts the run; ABIs after it are not attempted.
    ///
    /// # Returns
    ///
    /// * `Ok(SyncReport)` listing every installed artifact
    /// * `Err(SyncError)` naming the failed stage and ABI, or
    ///   [`SyncError::Cleanup`] if the temporary checkout could not be removed
    pub fn build(&self, request: &BuildRequest) -> Result<SyncReport, SyncError> {
        if self.dry_run {
            return self.plan(request);
        }

        // Step 1: Source
        let source = SourceProvisioner::new(self.settings, self.runner.as_ref())
            .verbose(self.verbose)
            .provision(request)?;

        // Step 2: Per-ABI build and library install
        let installer = ArtifactInstaller::new(&self.settings.layout).verbose(self.verbose);
        let total = request.abis().len();
        let mut libraries = Vec::with_capacity(total);
        for (index, &abi) in request.abis().iter().enumerate() {
            println!("[{}/{}] Building for {}...", index + 1, total, abi);
            let library = self.build_abi(source.path(), abi)?;
            let destination = installer.install_library(abi, &library)?;
            println!("[{}/{}] Installed {}", index + 1, total, destination.display());
            libraries.push(InstalledLibrary {
                abi,
                source: library,
                destination,
            });
        }

        // Step 3: Bindings, assumed identical across ABIs
        let bindings_abi = request.bindings_abi();
        println!("Installing bindings archive from the {} build...", bindings_abi);
        let bindings_src = self.settings.bindings_output(source.path(), bindings_abi);
        let bindings = installer.install_bindings(bindings_abi, &bindings_src)?;
        source.close()?;

        Ok(SyncReport {
            libraries,
            bindings,
            bindings_abi,
            dry_run: false,
        })
    }

    /// Pulls, configures and builds one ABI, returning the verified library path.
    fn build_abi(&self, source: &Path, abi: Abi) -> Result<PathBuf, SyncError> {
        let env_err = |failure| SyncError::Environment { abi, source: failure };

        self.ensure_image(abi)?;

        if self.verbose {
            println!("  Configuring {} in {}", abi, self.settings.build_dir(abi));
        }
        let cmd = configure_command(self.settings, source, abi);
        run_logged(self.runner.as_ref(), cmd, "configure", self.verbose)
            .map_err(|f| classify(f, env_err))?;

        if self.verbose {
            println!("  Compiling {}", abi);
        }
        let cmd = compile_command(self.settings, source, abi);
        run_logged(self.runner.as_ref(), cmd, "build", self.verbose)
            .map_err(|f| classify(f, env_err))?;

        let library = self.settings.library_output(source, abi);
        if !library.is_file() {
            return Err(SyncError::MissingOutput { abi, path: library });
        }
        Ok(library)
    }

    /// Pulls the toolchain image for `abi` unless it is already present.
    fn ensure_image(&self, abi: Abi) -> Result<(), SyncError> {
        let env_err = |failure| SyncError::Environment { abi, source: failure };
        let image = self.settings.image(abi);

        let mut inspect = image_inspect_command(self.settings, abi);
        let present = self
            .runner
            .succeeds(&mut inspect, "image inspect")
            .map_err(|f| classify(f, env_err))?;
        if present {
            if self.verbose {
                println!("  Image {} already present", image);
            }
            return Ok(());
        }

        println!("  Pulling {}...", image);
        run_logged(
            self.runner.as_ref(),
            pull_command(self.settings, abi),
            "image pull",
            self.verbose,
        )
        .map_err(|f| classify(f, env_err))
    }

    /// Prints every step of [`build`](Self::build) without running anything.
    fn plan(&self, request: &BuildRequest) -> Result<SyncReport, SyncError> {
        let installer = ArtifactInstaller::new(&self.settings.layout);
        let (source, clone) =
            SourceProvisioner::new(self.settings, self.runner.as_ref()).plan(request)?;
        match clone {
            Some(line) => println!("[dry-run] $ {line}"),
            None => println!(
                "[dry-run] reuse existing checkout at {} (repository and branch options ignored)",
                source.display()
            ),
        }

        let total = request.abis().len();
        let mut libraries = Vec::with_capacity(total);
        for (index, &abi) in request.abis().iter().enumerate() {
            println!("[dry-run] [{}/{}] {}", index + 1, total, abi);
            println!(
                "[dry-run] $ {}  # only if `{}` fails",
                render_command(&pull_command(self.settings, abi)),
                render_command(&image_inspect_command(self.settings, abi))
            );
            for cmd in [
                configure_command(self.settings, &source, abi),
                compile_command(self.settings, &source, abi),
            ] {
                println!("[dry-run] $ {}", render_command(&cmd));
            }
            let library = self.settings.library_output(&source, abi);
            let destination = installer.library_destination(abi, &library);
            println!(
                "[dry-run] copy {} -> {}",
                library.display(),
                destination.display()
            );
            libraries.push(InstalledLibrary {
                abi,
                source: library,
                destination,
            });
        }

        let bindings_abi = request.bindings_abi();
        let bindings_src = self.settings.bindings_output(&source, bindings_abi);
        let bindings = installer.bindings_destination(&bindings_src);
        println!(
            "[dry-run] copy {} -> {}",
            bindings_src.display(),
            bindings.display()
        );

        Ok(SyncReport {
            libraries,
            bindings,
            bindings_abi,
            dry_run: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::AndroidLayout;
    use crate::testing::{FakeRunner, Step};
    use tempfile::TempDir;

    fn settings_for(project: &Path) -> SyncSettings {
        SyncSettings {
            layout: AndroidLayout::new(project),
            ..SyncSettings::default()
        }
    }

    fn request(abis: &[Abi]) -> BuildRequest {
        BuildRequest::new("f3d-app/f3d", "master", None, abis.iter().copied()).unwrap()
    }

    fn cloned_source(runner: &FakeRunner) -> PathBuf {
        let clone = runner
            .calls()
            .into_iter()
            .find(|call| call[0] == "git")
            .expect("a clone should have run");
        PathBuf::from(clone.last().unwrap())
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_builds_two_abis_and_installs_bindings_from_first() {
        let project = TempDir::new().unwrap();
        let settings = settings_for(project.path());
        let runner = FakeRunner::new(&settings);

        let report = AndroidLibBuilder::new(&settings)
            .runner(&runner)
            .build(&request(&[Abi::Arm64V8a, Abi::X86_64]))
            .unwrap();

        let jni_libs = project.path().join("app/src/main/jniLibs");
        assert_eq!(entries(&jni_libs), vec!["arm64-v8a", "x86_64"]);
        assert_eq!(
            std::fs::read_to_string(jni_libs.join("arm64-v8a/libf3d-java.so")).unwrap(),
            "so for arm64-v8a"
        );
        assert_eq!(
            std::fs::read_to_string(jni_libs.join("x86_64/libf3d-java.so")).unwrap(),
            "so for x86_64"
        );

        let libs = project.path().join("app/libs");
        assert_eq!(entries(&libs), vec!["f3d.jar"]);
        assert_eq!(
            std::fs::read_to_string(libs.join("f3d.jar")).unwrap(),
            "jar from arm64-v8a"
        );

        assert_eq!(report.libraries.len(), 2);
        assert_eq!(report.bindings_abi, Abi::Arm64V8a);
        assert_eq!(report.bindings, libs.join("f3d.jar"));
        assert!(!report.dry_run);
        assert!(
            !cloned_source(&runner).exists(),
            "temporary checkout should be removed"
        );
    }

    #[test]
    fn test_default_selection_builds_all_four_in_order() {
        let project = TempDir::new().unwrap();
        let settings = settings_for(project.path());
        let runner = FakeRunner::new(&settings);

        let report = AndroidLibBuilder::new(&settings)
            .runner(&runner)
            .build(&request(&[]))
            .unwrap();

        let built: Vec<Abi> = report.libraries.iter().map(|l| l.abi).collect();
        assert_eq!(built, Abi::ALL.to_vec());
        assert_eq!(runner.count("docker", "pull"), 4);
    }

    #[test]
    fn test_missing_library_is_fatal_and_not_installed() {
        let project = TempDir::new().unwrap();
        let settings = settings_for(project.path());
        let mut runner = FakeRunner::new(&settings);
        runner.skip_library_for = Some(Abi::X86_64);

        let err = AndroidLibBuilder::new(&settings)
            .runner(&runner)
            .build(&request(&[Abi::Arm64V8a, Abi::X86_64]))
            .unwrap_err();

        let source = cloned_source(&runner);
        match &err {
            SyncError::MissingOutput { abi, path } => {
                assert_eq!(*abi, Abi::X86_64);
                assert_eq!(path, &source.join("build_x86_64/lib/libf3d-java.so"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("build_x86_64/lib/libf3d-java.so"));

        let layout = &settings.layout;
        assert!(layout.abi_dir(Abi::Arm64V8a).join("libf3d-java.so").is_file());
        assert!(!layout.abi_dir(Abi::X86_64).exists());
        assert!(!layout.bindings_dir().exists());
        assert!(!source.exists());
    }

    #[test]
    fn test_build_failure_stops_remaining_abis() {
        let project = TempDir::new().unwrap();
        let settings = settings_for(project.path());
        let mut runner = FakeRunner::new(&settings);
        runner.fail_step = Some((Abi::Arm64V8a, Step::Build));

        let err = AndroidLibBuilder::new(&settings)
            .runner(&runner)
            .build(&request(&[Abi::Arm64V8a, Abi::X86_64]))
            .unwrap_err();

        assert!(matches!(
            err,
            SyncError::Environment {
                abi: Abi::Arm64V8a,
                ..
            }
        ));
        let x86_image = settings.image(Abi::X86_64);
        assert!(
            runner.calls().iter().all(|call| !call.contains(&x86_image)),
            "x86_64 must not be attempted after arm64-v8a fails"
        );
        assert!(!project.path().join("app").exists());
        assert!(!cloned_source(&runner).exists());
    }

    #[test]
    fn test_pull_failure_is_environment_error() {
        let project = TempDir::new().unwrap();
        let settings = settings_for(project.path());
        let mut runner = FakeRunner::new(&settings);
        runner.fail_step = Some((Abi::X86, Step::Pull));

        let err = AndroidLibBuilder::new(&settings)
            .runner(&runner)
            .build(&request(&[Abi::X86]))
            .unwrap_err();
        assert!(matches!(err, SyncError::Environment { abi: Abi::X86, .. }));
        assert_eq!(runner.count("docker", "run"), 0);
    }

    #[test]
    fn test_present_image_is_not_pulled() {
        let project = TempDir::new().unwrap();
        let settings = settings_for(project.path());
        let mut runner = FakeRunner::new(&settings);
        runner.image_present = true;

        AndroidLibBuilder::new(&settings)
            .runner(&runner)
            .build(&request(&[Abi::X86, Abi::ArmeabiV7a]))
            .unwrap();
        assert_eq!(runner.count("docker", "image"), 2);
        assert_eq!(runner.count("docker", "pull"), 0);
        assert_eq!(runner.count("docker", "run"), 4);
    }

    #[test]
    fn test_existing_checkout_is_built_in_place() {
        let project = TempDir::new().unwrap();
        let checkout = TempDir::new().unwrap();
        std::fs::create_dir(checkout.path().join(".git")).unwrap();
        let settings = settings_for(project.path());
        let runner = FakeRunner::new(&settings);

        let req = BuildRequest::new(
            "nobody/nothing",
            "no-such-branch",
            Some(checkout.path().to_path_buf()),
            [Abi::X86],
        )
        .unwrap();
        AndroidLibBuilder::new(&settings)
            .runner(&runner)
            .build(&req)
            .unwrap();

        assert_eq!(runner.count("git", "clone"), 0);
        assert!(checkout.path().join("build_x86/lib/libf3d-java.so").is_file());
    }

    #[test]
    fn test_container_commands_mount_source_per_abi_build_dir() {
        let settings = SyncSettings {
            forward_env: vec!["PATH".into(), "LIBSYNC_TEST_SURELY_UNSET".into()],
            ..SyncSettings::default()
        };
        let source = Path::new("/work/f3d");

        let configure = render_command(&configure_command(&settings, source, Abi::X86));
        assert!(configure.starts_with(
            "docker run --rm -v /work/f3d:/src -w /src -e PATH \
             ghcr.io/f3d-app/f3d-android-x86:latest cmake -S . -B build_x86 "
        ));
        assert!(configure.contains("-DF3D_BINDINGS_JAVA=ON"));
        assert!(!configure.contains("LIBSYNC_TEST_SURELY_UNSET"));

        let compile = render_command(&compile_command(&settings, source, Abi::X86));
        assert!(compile.ends_with("cmake --build build_x86"));
    }

    #[test]
    fn test_dry_run_executes_and_writes_nothing() {
        let project = TempDir::new().unwrap();
        let settings = settings_for(project.path());
        let runner = FakeRunner::new(&settings);

        let report = AndroidLibBuilder::new(&settings)
            .runner(&runner)
            .dry_run(true)
            .build(&request(&[Abi::Arm64V8a, Abi::X86_64]))
            .unwrap();

        assert!(report.dry_run);
        assert_eq!(report.libraries.len(), 2);
        let jni_libs = project.path().join("app/src/main/jniLibs");
        assert_eq!(report.libraries[1].destination, jni_libs.join("x86_64/libf3d-java.so"));
        assert!(runner.calls().is_empty());
        assert!(entries(project.path()).is_empty());
    }

    #[test]
    fn test_dry_run_rejects_unusable_clone_dir_like_real_run() {
        let project = TempDir::new().unwrap();
        let clone_dir = TempDir::new().unwrap();
        std::fs::write(clone_dir.path().join("notes.txt"), "not a checkout").unwrap();
        let settings = settings_for(project.path());
        let runner = FakeRunner::new(&settings);
        let req = BuildRequest::new(
            "f3d-app/f3d",
            "master",
            Some(clone_dir.path().to_path_buf()),
            [Abi::X86],
        )
        .unwrap();

        let planned = AndroidLibBuilder::new(&settings)
            .runner(&runner)
            .dry_run(true)
            .build(&req)
            .unwrap_err();
        let real = AndroidLibBuilder::new(&settings)
            .runner(&runner)
            .build(&req)
            .unwrap_err();

        assert!(matches!(planned, SyncError::InvalidRequest(_)));
        assert!(matches!(real, SyncError::InvalidRequest(_)));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_configure_failure_skips_compile_and_cleans_up() {
        let project = TempDir::new().unwrap();
        let settings = settings_for(project.path());
        let mut runner = FakeRunner::new(&settings);
        runner.fail_step = Some((Abi::X86, Step::Configure));

        let err = AndroidLibBuilder::new(&settings)
            .runner(&runner)
            .build(&request(&[Abi::X86, Abi::Arm64V8a]))
            .unwrap_err();

        assert!(matches!(err, SyncError::Environment { abi: Abi::X86, .. }));
        assert!(
            runner.calls().iter().all(|call| !call.iter().any(|a| a == "--build")),
            "compile must not run after a failed configure"
        );
        assert_eq!(runner.count("docker", "run"), 1);
        assert!(!project.path().join("app").exists());
        assert!(!cloned_source(&runner).exists());
    }

    #[test]
    fn test_interrupt_stops_pipeline_and_cleans_up() {
        let project = TempDir::new().unwrap();
        let settings = settings_for(project.path());
        let mut runner = FakeRunner::new(&settings);
        runner.interrupt_at = Some((Abi::Arm64V8a, Step::Build));

        let err = AndroidLibBuilder::new(&settings)
            .runner(&runner)
            .build(&request(&[Abi::Arm64V8a, Abi::X86_64]))
            .unwrap_err();

        assert!(matches!(err, SyncError::Interrupted));
        let x86_image = settings.image(Abi::X86_64);
        assert!(runner.calls().iter().all(|call| !call.contains(&x86_image)));
        assert!(!project.path().join("app").exists());
        assert!(!cloned_source(&runner).exists());
    }
}
