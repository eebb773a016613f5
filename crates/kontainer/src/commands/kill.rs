//! Contains functionality of the kill container command
use std::convert::TryInto;
use std::path::PathBuf;

use anyhow::{Context, Result};
use libkontainer::signal::Signal;

use crate::cli::Kill;
use crate::commands::load_container;

pub fn kill(args: Kill, root_path: PathBuf) -> Result<()> {
    let mut container = load_container(root_path, &args.container_id)?;
    let signal: Signal = args.signal.as_str().try_into()?;
    container
        .kill(signal)
        .with_context(|| format!("failed to kill container {}", args.container_id))
}
