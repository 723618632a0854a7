use std::process::ExitCode;

use libsync::UsageError;

fn main() -> ExitCode {
    match libsync::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<UsageError>() {
                Some(usage) => usage.print(),
                None => eprintln!("Error: {err:#}"),
            }
            ExitCode::from(libsync::exit_code(&err))
        }
    }
}
