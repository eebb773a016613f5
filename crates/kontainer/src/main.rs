//! # Kontainer
//!
//! A minimal OCI container runtime. The binary is run by a higher-level
//! container manager with various flags passed; this parses the flags and
//! drives the container lifecycle through libkontainer.
mod cli;
mod commands;
mod logger;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use libkontainer::utils::create_dir_all_with_mode;
use nix::sys::stat::Mode;
use nix::unistd::getuid;

const DEFAULT_ROOT_PATH: &str = "/run/kontainer";

#[derive(Parser, Debug)]
#[clap(version, about)]
struct Opts {
    #[clap(flatten)]
    global: cli::GlobalOpts,

    #[clap(subcommand)]
    subcmd: SubCommand,
}

// Subcommands conforming with the OCI runtime command line interface, see
// https://github.com/opencontainers/runtime-tools/blob/master/docs/command-line-interface.md
#[derive(Subcommand, Debug)]
enum SubCommand {
    Create(cli::Create),
    Start(cli::Start),
    State(cli::State),
    Kill(cli::Kill),
    Delete(cli::Delete),
    Ps(cli::Ps),
}

fn main() -> Result<()> {
    let opts = Opts::parse();

    if let Err(e) = logger::init(opts.global.debug, opts.global.log, opts.global.log_format) {
        eprintln!("log init failed: {e:?}");
    }

    log::debug!(
        "started by user {} with {:?}",
        nix::unistd::geteuid(),
        std::env::args_os()
    );

    if opts.global.systemd_cgroup {
        log::debug!("--systemd-cgroup is accepted for compatibility and ignored");
    }

    let root_path = determine_root_path(opts.global.root)?;

    match opts.subcmd {
        SubCommand::Create(create) => commands::create::create(create, root_path),
        SubCommand::Start(start) => commands::start::start(start, root_path),
        SubCommand::State(state) => commands::state::state(state, root_path),
        SubCommand::Kill(kill) => commands::kill::kill(kill, root_path),
        SubCommand::Delete(delete) => commands::delete::delete(delete, root_path),
        SubCommand::Ps(ps) => commands::ps::ps(ps, root_path),
    }
}

fn determine_root_path(root_path: Option<PathBuf>) -> Result<PathBuf> {
    let path = root_path.unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT_PATH));
    if !path.exists() {
        create_dir_all_with_mode(&path, getuid().as_raw(), Mode::S_IRWXU)
            .with_context(|| format!("failed to create root directory {}", path.display()))?;
    }
    let path = path
        .canonicalize()
        .with_context(|| format!("failed to canonicalize root directory {}", path.display()))?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_determine_root_path_creates_directory() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let wanted = tmp.path().join("kontainer-root");
        let path = determine_root_path(Some(wanted.clone()))?;
        assert_eq!(path, wanted.canonicalize()?);
        assert!(path.is_dir());
        Ok(())
    }
}
