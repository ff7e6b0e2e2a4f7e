//! Method-call dispatch between the UI layer and the OS-level operations.
//!
//! The UI issues a [`MethodCall`] (a method name plus string arguments) and
//! receives a [`MethodReply`]. Two methods exist: `runCommand` on the shell
//! channel and `openInFileManager` on the file-manager channel; anything
//! else is answered with [`MethodReply::NotImplemented`], mirroring the
//! platform method-channel convention.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::config::AppConfig;
use crate::filemanager::FileManager;
use crate::privileged::PrivilegedRunner;

/// Path used when `openInFileManager` is called without a `path` argument.
const DEFAULT_PATH: &str = "/";

/// One incoming request from the UI layer.
#[derive(Debug, Deserialize)]
pub struct MethodCall {
    /// Method name, e.g. `runCommand`.
    pub method: String,
    /// String-valued arguments; missing keys fall back to defaults.
    #[serde(default)]
    pub args: HashMap<String, String>,
}

/// Reply sent back for one [`MethodCall`].
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MethodReply {
    /// The method ran; an optional string payload is attached.
    ///
    /// For `runCommand` the payload is always present and carries either
    /// captured output or a legacy `"Error: ..."` string; the transport
    /// level never fails for that method.
    Result(Option<String>),
    /// The method ran and reported a failure (file-manager channel only).
    Error(String),
    /// No such method on this bridge.
    NotImplemented,
}

/// Dispatches method calls to the privileged runner and the file manager.
pub struct Bridge {
    shell: PrivilegedRunner,
    filemanager: FileManager,
}

impl Bridge {
    /// Build a bridge backed by real subprocesses, per `config`.
    pub fn new(config: &AppConfig) -> Self {
        Self {
            shell: PrivilegedRunner::new(config.runner.launcher.clone(), config.runner.timeout),
            filemanager: FileManager::new(config.file_manager.opener.clone()),
        }
    }

    /// Assemble a bridge from already-built parts.
    pub fn with_parts(shell: PrivilegedRunner, filemanager: FileManager) -> Self {
        Self { shell, filemanager }
    }

    /// Handle one method call and produce its reply.
    ///
    /// Blocks the calling thread for the full duration of the underlying
    /// OS operation; interactive callers must invoke this off their
    /// responsive thread.
    pub fn handle(&self, call: &MethodCall) -> MethodReply {
        match call.method.as_str() {
            "runCommand" => {
                let command = call.args.get("command").map(String::as_str).unwrap_or("");
                MethodReply::Result(Some(self.shell.run_compat(command)))
            }
            "openInFileManager" => {
                let path = call
                    .args
                    .get("path")
                    .map(String::as_str)
                    .unwrap_or(DEFAULT_PATH);
                match self.filemanager.open(path) {
                    Ok(()) => MethodReply::Result(None),
                    Err(e) => {
                        error!("Failed to open `{}` in file manager: {}", path, e);
                        MethodReply::Error(e.to_string())
                    }
                }
            }
            other => {
                warn!("Method `{}` is not implemented on this bridge", other);
                MethodReply::NotImplemented
            }
        }
    }
}
