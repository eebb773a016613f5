//! Handles the creation of a new container
use std::path::PathBuf;

use anyhow::Result;
use libkontainer::container::builder::ContainerBuilder;
use libkontainer::syscall::syscall::create_syscall;

use crate::cli::Create;

// In the end a container is just another process in Linux; it has a
// specific control group and namespaces, so the program executing in it
// believes it runs on a complete system of its own, but on the host it has
// a pid, file descriptors, etc. like any other process.
pub fn create(args: Create, root_path: PathBuf) -> Result<()> {
    let syscall = create_syscall();
    ContainerBuilder::new(args.container_id, syscall.as_ref())
        .with_pid_file(args.pid_file)
        .with_root_path(root_path)
        .with_preserved_fds(args.preserve_fds)
        .as_init(&args.bundle)
        .build()?;

    Ok(())
}
