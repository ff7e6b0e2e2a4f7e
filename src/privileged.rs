//! Privileged command execution.
//!
//! [`PrivilegedRunner`] wraps a launcher command line (by default `su -c`)
//! around a caller-supplied command string and runs it through a
//! [`CommandRunner`]. The command string is passed verbatim to the
//! privileged shell; no escaping or allow-listing is performed, matching
//! what the UI layer expects on a rooted device.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::command::{CommandError, CommandOutput, CommandRunner, SystemCommandRunner};

/// Error specific to the privileged runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The configured launcher command line has no program to run.
    #[error("empty privileged launcher command line")]
    EmptyLauncher,
    #[allow(missing_docs)]
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Executes one command at a time through a privileged shell.
pub struct PrivilegedRunner {
    /// Launcher words the command string is appended to, e.g. `["su", "-c"]`.
    launcher: Vec<String>,
    /// Optional deadline for the whole spawn/read/wait cycle.
    timeout: Option<Duration>,
    /// Command runner for executing the launcher (enables mocking in tests)
    runner: Box<dyn CommandRunner>,
}

impl PrivilegedRunner {
    /// Create a runner that spawns real processes.
    pub fn new(launcher: Vec<String>, timeout: Option<Duration>) -> Self {
        Self {
            launcher,
            timeout,
            runner: Box::new(SystemCommandRunner),
        }
    }

    /// Create a runner with a custom command runner (for testing)
    #[cfg(test)]
    pub fn with_runner(
        launcher: Vec<String>,
        timeout: Option<Duration>,
        runner: Box<dyn CommandRunner>,
    ) -> Self {
        Self {
            launcher,
            timeout,
            runner,
        }
    }

    /// Run `command` under the privileged launcher and return the typed
    /// outcome.
    ///
    /// The exit status of the child is carried in the output but is not
    /// treated as an error; only spawn, read, wait and timeout failures
    /// surface as [`RunnerError`]. An empty `command` is accepted and
    /// produces whatever the privileged shell does with it.
    pub fn run(&self, command: &str) -> Result<CommandOutput, RunnerError> {
        let (program, fixed_args) = self
            .launcher
            .split_first()
            .ok_or(RunnerError::EmptyLauncher)?;
        let mut args: Vec<String> = fixed_args.to_vec();
        args.push(command.to_owned());
        debug!("Running privileged command `{}`", command);
        Ok(self.runner.run(program, args, self.timeout)?)
    }

    /// Legacy-compatible entry point: combined stdout on success, an
    /// `"Error: <message>"` string on failure, both through the same
    /// string channel.
    ///
    /// Existing callers distinguish the two lexically by the prefix, so
    /// genuine output and error reports must never be mixed up here.
    /// Captured stderr is logged but never included in the payload.
    pub fn run_compat(&self, command: &str) -> String {
        match self.run(command) {
            Ok(output) => {
                if !output.stderr.is_empty() {
                    debug!(
                        "Privileged command wrote to stderr: {}",
                        output.stderr.trim_end()
                    );
                }
                output.stdout
            }
            Err(e) => {
                warn!("Privileged command failed: {}", e);
                format!("Error: {e}")
            }
        }
    }
}
