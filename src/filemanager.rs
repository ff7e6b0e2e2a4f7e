//! Hand a filesystem path to the platform file manager.
//!
//! The original bridge fired a view intent and swallowed every failure.
//! Here the outcome is reported back to the caller: the opener's spawn
//! failure or a nonzero exit status both surface as a [`FileManagerError`].
//! The path is forwarded verbatim; whether it exists is the file manager's
//! problem, as it was in the original.

use thiserror::Error;
use tracing::{debug, info};

use crate::command::{CommandError, CommandRunner, SystemCommandRunner};

/// Error specific to the file-manager launch path.
#[derive(Debug, Error)]
pub enum FileManagerError {
    /// The configured opener command line has no program to run.
    #[error("empty file-manager opener command line")]
    EmptyOpener,
    /// The opener ran but refused the path (typically: no application
    /// registered to view it).
    #[error("file manager rejected the path (exit code {code}): {stderr}")]
    Rejected {
        /// Exit code reported by the opener.
        code: i32,
        /// Whatever the opener printed on stderr, trimmed.
        stderr: String,
    },
    #[allow(missing_docs)]
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Launches the platform file manager on a path.
pub struct FileManager {
    /// Opener words the path is appended to, e.g. `["xdg-open"]`.
    opener: Vec<String>,
    /// Command runner for executing the opener (enables mocking in tests)
    runner: Box<dyn CommandRunner>,
}

impl FileManager {
    /// Create a launcher that spawns the real opener.
    pub fn new(opener: Vec<String>) -> Self {
        Self {
            opener,
            runner: Box::new(SystemCommandRunner),
        }
    }

    /// Create a launcher with a custom command runner (for testing)
    #[cfg(test)]
    pub fn with_runner(opener: Vec<String>, runner: Box<dyn CommandRunner>) -> Self {
        Self { opener, runner }
    }

    /// Open `path` with the configured file manager.
    ///
    /// Openers like `xdg-open` return promptly after handing the path to
    /// the chooser, so this waits for the opener itself, not for the
    /// application the user picks.
    pub fn open(&self, path: &str) -> Result<(), FileManagerError> {
        let (program, fixed_args) = self
            .opener
            .split_first()
            .ok_or(FileManagerError::EmptyOpener)?;
        let mut args: Vec<String> = fixed_args.to_vec();
        args.push(path.to_owned());
        debug!("Opening `{}` with `{}`", path, program);
        let output = self.runner.run(program, args, None)?;
        match output.exit_code {
            Some(0) => {
                info!("File manager opened `{}`", path);
                Ok(())
            }
            code => Err(FileManagerError::Rejected {
                code: code.unwrap_or(-1),
                stderr: output.stderr.trim_end().to_owned(),
            }),
        }
    }
}
