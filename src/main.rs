#![doc = include_str!("../README.md")]
use anyhow::Result;
use std::io;
use tracing::{debug, info};

use ::lib::config::{default_config_file, merge_args};
use ::lib::{serve, setup_tracing, Args, Bridge};

#[paw::main]
fn main(args: Args) -> Result<()> {
    setup_tracing(&args)?;
    // Merge config Default → Config File → command line args
    let args = merge_args(args, default_config_file())?;
    debug!("Merged config and parameters : {:#?}", args);

    let config = args.validate()?;
    let bridge = Bridge::new(&config);
    info!(
        "dirstat-bridge ready (launcher: {:?}, timeout: {:?})",
        config.runner.launcher, config.runner.timeout
    );

    let stdin = io::stdin();
    let stdout = io::stdout();
    serve(&bridge, stdin.lock(), &mut stdout.lock())?;
    info!("Input closed, shutting down");
    Ok(())
}
