//! Contains functionality of the delete container command
use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use crate::cli::Delete;
use crate::commands::load_container;

pub fn delete(args: Delete, root_path: PathBuf) -> Result<()> {
    log::debug!("start deleting {}", args.container_id);

    // a forced delete of an id that does not exist is a success, callers
    // use it as an idempotent cleanup
    if !root_path.join(&args.container_id).exists() {
        if args.force {
            log::debug!("container {} does not exist, nothing to do", args.container_id);
            return Ok(());
        }
        bail!("container {} does not exist", args.container_id);
    }

    let mut container = load_container(root_path, &args.container_id)?;
    container
        .delete(args.force)
        .with_context(|| format!("failed to delete container {}", args.container_id))
}
