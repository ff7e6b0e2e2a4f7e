//! Abstraction over external command execution.
//!
//! [`CommandRunner`] allows swapping the real subprocess execution
//! ([`SystemCommandRunner`]) with a mock in tests. This is necessary because
//! the bridge invokes platform binaries (su, xdg-open) that are unavailable
//! or unsafe to run in CI. Injecting a [`CommandRunner`] makes the privileged
//! runner and the file-manager launcher testable without a rooted device.

use std::io::{self, BufRead, BufReader, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

/// Error raised while executing an external command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The child process could not be started at all.
    #[error("failed to launch `{program}`: {source}")]
    Spawn {
        /// Program we attempted to start.
        program: String,
        /// Underlying OS error.
        source: io::Error,
    },
    /// The output stream errored mid-read.
    #[error("error reading command output: {0}")]
    Read(io::Error),
    /// Waiting for the child's exit status failed.
    #[error("error awaiting command termination: {0}")]
    Wait(io::Error),
    /// The child did not terminate within the configured deadline.
    #[error("command timed out after {0:?}")]
    TimedOut(Duration),
}

/// Captured result of a terminated child process.
///
/// Standard output and standard error are kept separate; callers decide
/// what (if anything) to do with stderr. The exit code is `None` when the
/// child was terminated by a signal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Accumulated standard output, one `\n` appended per emitted line.
    pub stdout: String,
    /// Accumulated standard error, captured verbatim.
    pub stderr: String,
    /// Exit code reported by the OS, if any.
    pub exit_code: Option<i32>,
}

/// Trait for running external commands and capturing their output.
#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with the given `args`, block until it terminates and
    /// return its captured [`CommandOutput`].
    ///
    /// When `timeout` is set it covers the whole spawn/read/wait cycle:
    /// a child still running once the deadline set at spawn expires is
    /// killed, reaped and reported as [`CommandError::TimedOut`], whether
    /// it was caught producing output or lingering after closing its
    /// streams. With `timeout` of `None` the call blocks indefinitely.
    fn run(
        &self,
        program: &str,
        args: Vec<String>,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, CommandError>;
}

/// Default implementation that delegates to [`std::process::Command`].
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(
        &self,
        program: &str,
        args: Vec<String>,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, CommandError> {
        debug!("Spawning `{}` with {:?}", program, args);
        let started = Instant::now();
        let mut child = Command::new(program)
            .args(&args)
            // The bridge never feeds the child; a null stdin keeps commands
            // that read from a terminal from blocking forever.
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| CommandError::Spawn {
                program: program.to_owned(),
                source,
            })?;

        let (Some(child_stdout), Some(child_stderr)) =
            (child.stdout.take(), child.stderr.take())
        else {
            // Both streams were requested piped above.
            reap(&mut child);
            return Err(CommandError::Read(io::Error::other(
                "child process pipes unavailable",
            )));
        };

        // Stdout is read line by line on a dedicated thread so the parent
        // can enforce the deadline; the child handle stays here so the
        // timeout path can kill it.
        let (tx, rx) = mpsc::channel();
        let stdout_reader = thread::spawn(move || {
            let mut collected = String::new();
            for line in BufReader::new(child_stdout).lines() {
                match line {
                    Ok(l) => {
                        collected.push_str(&l);
                        collected.push('\n');
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        return;
                    }
                }
            }
            let _ = tx.send(Ok(collected));
        });
        let stderr_reader = thread::spawn(move || {
            let mut collected = String::new();
            let _ = BufReader::new(child_stderr).read_to_string(&mut collected);
            collected
        });

        let collected = match timeout {
            Some(limit) => match rx.recv_timeout(limit.saturating_sub(started.elapsed())) {
                Ok(res) => res,
                Err(RecvTimeoutError::Timeout) => {
                    reap(&mut child);
                    let _ = stdout_reader.join();
                    let _ = stderr_reader.join();
                    return Err(CommandError::TimedOut(limit));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    Err(io::Error::other("output reader ended unexpectedly"))
                }
            },
            None => rx
                .recv()
                .unwrap_or_else(|_| Err(io::Error::other("output reader ended unexpectedly"))),
        };
        let stdout = match collected {
            Ok(s) => s,
            Err(e) => {
                // The child may still be running after a mid-read failure.
                reap(&mut child);
                let _ = stdout_reader.join();
                let _ = stderr_reader.join();
                return Err(CommandError::Read(e));
            }
        };
        let _ = stdout_reader.join();

        let status = match await_exit(&mut child, started, timeout) {
            Ok(status) => status,
            Err(e) => {
                let _ = stderr_reader.join();
                return Err(e);
            }
        };
        let stderr = stderr_reader.join().unwrap_or_default();
        debug!("`{}` terminated with {:?}", program, status.code());
        Ok(CommandOutput {
            stdout,
            stderr,
            exit_code: status.code(),
        })
    }
}

/// Poll interval while waiting out the remainder of the deadline.
const WAIT_POLL: Duration = Duration::from_millis(20);

/// Await the child's exit status, honoring what remains of the deadline.
///
/// Stdout reaching EOF does not imply the child has exited: it may have
/// closed its streams and kept running. The deadline set at spawn
/// therefore covers this wait as well; on expiry the child is killed and
/// reaped, like on the read path.
fn await_exit(
    child: &mut Child,
    started: Instant,
    timeout: Option<Duration>,
) -> Result<ExitStatus, CommandError> {
    let Some(limit) = timeout else {
        return match child.wait() {
            Ok(status) => Ok(status),
            Err(e) => {
                reap(child);
                Err(CommandError::Wait(e))
            }
        };
    };
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {
                let remaining = limit.saturating_sub(started.elapsed());
                if remaining.is_zero() {
                    reap(child);
                    return Err(CommandError::TimedOut(limit));
                }
                thread::sleep(remaining.min(WAIT_POLL));
            }
            Err(e) => {
                reap(child);
                return Err(CommandError::Wait(e));
            }
        }
    }
}

/// Kill and wait the child so no zombie is left behind on failure paths.
fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(test)]
mod run_should {
    use super::*;
    use std::time::Instant;
    use test_log::test; // Automatically trace tests

    fn sh(script: &str) -> Result<CommandOutput, CommandError> {
        SystemCommandRunner.run("sh", vec!["-c".into(), script.into()], None)
    }

    #[test]
    fn accumulate_one_newline_per_line() -> Result<(), CommandError> {
        // No trailing newline on the last line; accumulation adds one.
        let output = sh("printf 'first\\nsecond\\nthird'")?;
        assert_eq!(output.stdout, "first\nsecond\nthird\n");
        assert_eq!(output.exit_code, Some(0));
        Ok(())
    }

    #[test]
    fn return_empty_string_for_silent_command() -> Result<(), CommandError> {
        let output = sh("true")?;
        assert_eq!(output.stdout, "");
        assert_eq!(output.stderr, "");
        Ok(())
    }

    #[test]
    fn keep_stderr_separate_from_stdout() -> Result<(), CommandError> {
        let output = sh("echo visible; echo hidden 1>&2")?;
        assert_eq!(output.stdout, "visible\n");
        assert!(output.stderr.contains("hidden"));
        Ok(())
    }

    #[test]
    fn report_nonzero_exit_code_as_success() -> Result<(), CommandError> {
        let output = sh("exit 3")?;
        assert_eq!(output.exit_code, Some(3));
        Ok(())
    }

    #[test]
    fn fail_to_spawn_unknown_program() {
        let res = SystemCommandRunner.run("no-such-binary-dirstat", vec![], None);
        match res {
            Err(CommandError::Spawn { program, .. }) => {
                assert_eq!(program, "no-such-binary-dirstat")
            }
            other => panic!("expected spawn error, got {:?}", other),
        }
    }

    #[test]
    fn block_until_child_terminates() -> Result<(), CommandError> {
        let start = Instant::now();
        let output = sh("sleep 0.3; echo done")?;
        assert!(start.elapsed() >= Duration::from_millis(300));
        assert_eq!(output.stdout, "done\n");
        Ok(())
    }

    #[test]
    fn kill_child_on_timeout() {
        let start = Instant::now();
        let res = SystemCommandRunner.run(
            "sleep",
            vec!["5".into()],
            Some(Duration::from_millis(200)),
        );
        match res {
            Err(CommandError::TimedOut(limit)) => {
                assert_eq!(limit, Duration::from_millis(200))
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        // Well before the 5 s the child asked for.
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn time_out_child_that_closes_stdout_and_lingers() {
        let start = Instant::now();
        // The child closes both streams right away, so the readers hit
        // EOF long before it exits; the deadline must still apply to the
        // wait phase.
        let res = SystemCommandRunner.run(
            "sh",
            vec!["-c".into(), "exec >&- 2>&-; sleep 5".into()],
            Some(Duration::from_millis(300)),
        );
        match res {
            Err(CommandError::TimedOut(limit)) => {
                assert_eq!(limit, Duration::from_millis(300))
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn reap_child_on_mid_read_failure() {
        let start = Instant::now();
        // Invalid UTF-8 then EOF while the child lingers; the line reader
        // fails mid-stream and the child must be killed, not waited out.
        let res = sh("printf '\\377\\376'; exec >&-; sleep 5");
        match res {
            Err(CommandError::Read(_)) => {}
            other => panic!("expected read error, got {:?}", other),
        }
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn be_idempotent_for_read_only_commands() -> Result<(), CommandError> {
        let first = sh("echo stable")?;
        let second = sh("echo stable")?;
        assert_eq!(first, second);
        Ok(())
    }
}
