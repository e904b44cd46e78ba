//! Container entrypoint: provision credentials, then hand over to the bot
//!
//! The copy is best effort. A missing or unreadable secret (local
//! development, platforms without secret files) never stops the bot from
//! starting; the bot's exit status is the launcher's exit status.

use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use crate::application::errors::LaunchError;

/// Exit code when the entrypoint cannot be started (shell convention)
pub const EXIT_NOT_STARTED: i32 = 127;

/// Copy `secrets_path` into `workdir` under the same file name.
/// Returns the destination on success; failures are logged at debug level only.
pub fn provision_credentials(secrets_path: &Path, workdir: &Path) -> Option<PathBuf> {
    let Some(file_name) = secrets_path.file_name() else {
        tracing::debug!("Secrets path {} has no file name", secrets_path.display());
        return None;
    };
    let destination = workdir.join(file_name);

    match std::fs::copy(secrets_path, &destination) {
        Ok(bytes) => {
            tracing::info!("Copied {} ({} bytes) to {}", secrets_path.display(), bytes, destination.display());
            Some(destination)
        }
        Err(e) => {
            tracing::debug!("No credentials copied from {}: {}", secrets_path.display(), e);
            None
        }
    }
}

/// The command to run: `argv` if given, else this executable with `default_args`
pub fn entrypoint(argv: &[String], default_args: &[String]) -> Result<Command, LaunchError> {
    let command = match argv.split_first() {
        Some((program, args)) => {
            let mut command = Command::new(program);
            command.args(args);
            command
        }
        None => {
            let exe = std::env::current_exe().map_err(LaunchError::Executable)?;
            let mut command = Command::new(exe);
            command.args(default_args);
            command
        }
    };
    Ok(command)
}

fn program_name(command: &Command) -> String {
    command.get_program().to_string_lossy().into_owned()
}

/// Exit code of a finished child; signals map to 128+N on Unix
#[cfg_attr(all(unix, not(test)), allow(dead_code))]
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

/// Run the entrypoint as a child and wait for it
#[cfg_attr(all(unix, not(test)), allow(dead_code))]
pub fn run_child(mut command: Command) -> Result<i32, LaunchError> {
    let program = program_name(&command);
    let status = command
        .status()
        .map_err(|source| LaunchError::Spawn { program, source })?;
    Ok(exit_code(status))
}

/// Replace this process with the entrypoint so the runtime's signals reach it
/// directly. Only returns if the exec itself fails.
#[cfg(unix)]
pub fn exec(mut command: Command) -> LaunchError {
    use std::os::unix::process::CommandExt;
    let program = program_name(&command);
    let source = command.exec();
    LaunchError::Spawn { program, source }
}

/// Provision credentials into the working directory, then run the entrypoint.
/// Returns the process exit code.
pub fn launch(secrets_path: &Path, command: Command) -> i32 {
    provision_credentials(secrets_path, Path::new("."));

    tracing::info!("Starting {}", program_name(&command));
    hand_over(command)
}

#[cfg(unix)]
fn hand_over(command: Command) -> i32 {
    let err = exec(command);
    tracing::error!("{}", err);
    EXIT_NOT_STARTED
}

#[cfg(not(unix))]
fn hand_over(command: Command) -> i32 {
    match run_child(command) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            EXIT_NOT_STARTED
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copies_present_secret() {
        let secrets = tempfile::tempdir().unwrap();
        let workdir = tempfile::tempdir().unwrap();
        let secret = secrets.path().join("service_account.json");
        std::fs::write(&secret, r#"{"client_email":"a@b"}"#).unwrap();

        let copied = provision_credentials(&secret, workdir.path()).unwrap();

        assert_eq!(copied, workdir.path().join("service_account.json"));
        assert_eq!(std::fs::read_to_string(copied).unwrap(), r#"{"client_email":"a@b"}"#);
    }

    #[test]
    fn test_missing_secret_is_not_an_error() {
        let workdir = tempfile::tempdir().unwrap();
        let missing = workdir.path().join("absent").join("service_account.json");

        assert!(provision_credentials(&missing, workdir.path()).is_none());
        assert!(!workdir.path().join("service_account.json").exists());
    }

    #[test]
    fn test_overwrites_stale_copy() {
        let secrets = tempfile::tempdir().unwrap();
        let workdir = tempfile::tempdir().unwrap();
        let secret = secrets.path().join("service_account.json");
        std::fs::write(&secret, "new").unwrap();
        std::fs::write(workdir.path().join("service_account.json"), "old").unwrap();

        provision_credentials(&secret, workdir.path()).unwrap();
        assert_eq!(std::fs::read_to_string(workdir.path().join("service_account.json")).unwrap(), "new");
    }

    #[test]
    fn test_entrypoint_defaults_to_self() {
        let command = entrypoint(&[], &["run".to_string()]).unwrap();
        let exe = std::env::current_exe().unwrap();
        assert_eq!(command.get_program(), exe.as_os_str());
        assert_eq!(command.get_args().collect::<Vec<_>>(), vec!["run"]);

        let argv = vec!["sh".to_string(), "-c".to_string(), "exit 3".to_string()];
        let command = entrypoint(&argv, &["run".to_string()]).unwrap();
        assert_eq!(command.get_program(), "sh");
        assert_eq!(command.get_args().count(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_child_exit_code_propagates() {
        let argv = vec!["sh".to_string(), "-c".to_string(), "exit 3".to_string()];
        let command = entrypoint(&argv, &[]).unwrap();
        assert_eq!(run_child(command).unwrap(), 3);

        let argv = vec!["sh".to_string(), "-c".to_string(), "kill -TERM $$".to_string()];
        let command = entrypoint(&argv, &[]).unwrap();
        assert_eq!(run_child(command).unwrap(), 128 + 15);
    }

    #[test]
    fn test_unknown_program_fails_to_spawn() {
        let argv = vec!["/nonexistent/roulette-entrypoint".to_string()];
        let command = entrypoint(&argv, &[]).unwrap();
        assert!(matches!(run_child(command), Err(LaunchError::Spawn { .. })));
    }
}
