//! Recording stand-in for git and the container engine.

use std::cell::RefCell;
use std::path::PathBuf;
use std::process::Command;

use crate::builders::common::{CommandFailure, CommandRunner};
use crate::settings::SyncSettings;
use crate::types::Abi;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Pull,
    Configure,
    Build,
}

/// Simulates a clone by creating `.git` and a build by creating the expected
/// outputs under the mounted source tree.
pub(crate) struct FakeRunner {
    settings: SyncSettings,
    calls: RefCell<Vec<Vec<String>>>,
    pub(crate) image_present: bool,
    pub(crate) fail_clone: bool,
    pub(crate) fail_step: Option<(Abi, Step)>,
    pub(crate) interrupt_at: Option<(Abi, Step)>,
    pub(crate) skip_library_for: Option<Abi>,
}

impl FakeRunner {
    pub(crate) fn new(settings: &SyncSettings) -> Self {
        Self {
            settings: settings.clone(),
            calls: RefCell::new(Vec::new()),
            image_present: false,
            fail_clone: false,
            fail_step: None,
            interrupt_at: None,
            skip_library_for: None,
        }
    }

    pub(crate) fn calls(&self) -> Vec<Vec<String>> {
        self.calls.borrow().clone()
    }

    pub(crate) fn count(&self, program: &str, subcommand: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call[0] == program && call.get(1).is_some_and(|s| s == subcommand))
            .count()
    }

    fn abi_of(&self, args: &[String]) -> Option<Abi> {
        Abi::ALL
            .into_iter()
            .find(|abi| args.contains(&self.settings.image(*abi)))
    }

    fn mounted_source(args: &[String]) -> Option<PathBuf> {
        let pos = args.iter().position(|a| a == "-v")?;
        let (host, _) = args.get(pos + 1)?.rsplit_once(':')?;
        Some(PathBuf::from(host))
    }

    fn fail(&self, args: &[String], description: &str, step: Step) -> Result<(), CommandFailure> {
        let current = self.abi_of(args).map(|abi| (abi, step));
        if current.is_some() && current == self.interrupt_at {
            return Err(CommandFailure::Interrupted {
                description: description.to_string(),
            });
        }
        if current.is_some() && current == self.fail_step {
            return Err(CommandFailure::Status {
                description: description.to_string(),
                code: Some(1),
            });
        }
        Ok(())
    }
}

fn collect(cmd: &Command) -> Vec<String> {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|a| a.to_string_lossy().into_owned())
        .collect()
}

impl CommandRunner for FakeRunner {
    fn run(&self, cmd: &mut Command, description: &str) -> Result<(), CommandFailure> {
        let args = collect(cmd);
        self.calls.borrow_mut().push(args.clone());

        match (args[0].as_str(), args.get(1).map(String::as_str)) {
            ("git", Some("clone")) => {
                if self.fail_clone {
                    return Err(CommandFailure::Status {
                        description: description.to_string(),
                        code: Some(128),
                    });
                }
                let dest = PathBuf::from(args.last().cloned().unwrap_or_default());
                std::fs::create_dir_all(dest.join(".git")).unwrap();
                Ok(())
            }
            (_, Some("pull")) => self.fail(&args, description, Step::Pull),
            (_, Some("run")) if args.iter().any(|a| a == "--build") => {
                self.fail(&args, description, Step::Build)?;
                let abi = self.abi_of(&args).unwrap();
                let source = Self::mounted_source(&args).unwrap();
                if self.skip_library_for != Some(abi) {
                    let library = self.settings.library_output(&source, abi);
                    std::fs::create_dir_all(library.parent().unwrap()).unwrap();
                    std::fs::write(&library, format!("so for {abi}")).unwrap();
                }
                let bindings = self.settings.bindings_output(&source, abi);
                std::fs::create_dir_all(bindings.parent().unwrap()).unwrap();
                std::fs::write(&bindings, format!("jar from {abi}")).unwrap();
                Ok(())
            }
            (_, Some("run")) => self.fail(&args, description, Step::Configure),
            _ => Ok(()),
        }
    }

    fn succeeds(&self, cmd: &mut Command, _description: &str) -> Result<bool, CommandFailure> {
        self.calls.borrow_mut().push(collect(cmd));
        Ok(self.image_present)
    }
}
