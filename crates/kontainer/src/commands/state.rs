//! Prints the state of the container, refreshed against /proc
use std::path::PathBuf;

use anyhow::Result;

use crate::cli::State;
use crate::commands::load_container;

pub fn state(args: State, root_path: PathBuf) -> Result<()> {
    let container = load_container(root_path, &args.container_id)?;
    println!("{}", serde_json::to_string_pretty(&container.state)?);

    Ok(())
}
