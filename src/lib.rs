#![warn(missing_docs)]
//! Dirstat-bridge main components and helper functions used by `main`
use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use tracing::{debug, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter};

pub mod bridge;
pub mod command;
pub mod config;
pub mod filemanager;
pub mod privileged;

pub use bridge::{Bridge, MethodCall, MethodReply};
pub use command::{CommandError, CommandOutput, CommandRunner, SystemCommandRunner};
pub use config::{AppConfig, Args};
pub use filemanager::{FileManager, FileManagerError};
pub use privileged::{PrivilegedRunner, RunnerError};

/// Setup logging to stderr
///
/// Replies go to stdout, so all diagnostics are kept on stderr.
/// (Tracing is a bit more involving to set up but will provide much more feature if needed)
pub fn setup_tracing(args: &Args) -> Result<()> {
    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let filter_layer =
        EnvFilter::try_new(args.verbose.get_level_filter()).context("Initializing log filter")?;

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
    Ok(())
}

/// Serve method calls over a line-oriented transport.
///
/// Each input line is one JSON [`MethodCall`]; each reply is one JSON
/// [`MethodReply`] line. Calls are handled strictly one at a time, in
/// order: the next line is not read before the previous command has
/// terminated. Blank lines are skipped; a malformed line yields an error
/// reply rather than tearing the loop down. The loop ends at end of input.
pub fn serve(bridge: &Bridge, input: impl BufRead, output: &mut impl Write) -> Result<()> {
    for line in input.lines() {
        let line = line.context("Reading request line")?;
        if line.trim().is_empty() {
            continue;
        }
        let reply = match serde_json::from_str::<MethodCall>(&line) {
            Ok(call) => {
                debug!("Dispatching method `{}`", call.method);
                bridge.handle(&call)
            }
            Err(e) => {
                warn!("Malformed request line: {}", e);
                MethodReply::Error(format!("malformed request: {e}"))
            }
        };
        serde_json::to_writer(&mut *output, &reply).context("Encoding reply")?;
        output.write_all(b"\n").context("Writing reply")?;
        output.flush().context("Flushing reply")?;
    }
    Ok(())
}
