use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use nix::sys::statfs;
use nix::unistd::Pid;

pub const CGROUP_PROCS: &str = "cgroup.procs";
pub const CGROUP_SUBTREE_CONTROL: &str = "cgroup.subtree_control";
pub const CGROUP_CONTROLLERS: &str = "cgroup.controllers";
pub const DEFAULT_CGROUP_ROOT: &str = "/sys/fs/cgroup";

#[inline]
pub fn write_cgroup_file_str<P: AsRef<Path>>(path: P, data: &str) -> Result<()> {
    let path = path.as_ref();

    fs::OpenOptions::new()
        .create(false)
        .write(true)
        .truncate(false)
        .open(path)
        .with_context(|| format!("failed to open {path:?}"))?
        .write_all(data.as_bytes())
        .with_context(|| format!("failed to write {data} to {path:?}"))?;

    Ok(())
}

#[inline]
pub fn write_cgroup_file<P: AsRef<Path>, T: ToString>(path: P, data: T) -> Result<()> {
    write_cgroup_file_str(path, &data.to_string())
}

#[inline]
pub fn read_cgroup_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    fs::read_to_string(path).with_context(|| format!("failed to read {path:?}"))
}

/// Reads the pids currently enrolled in the cgroup.
pub fn get_pids(cgroup_path: &Path) -> Result<Vec<Pid>> {
    let procs = read_cgroup_file(cgroup_path.join(CGROUP_PROCS))?;
    let mut pids = Vec::new();
    for line in procs.lines() {
        let pid: i32 = line
            .trim()
            .parse()
            .with_context(|| format!("unexpected pid entry {line:?} in cgroup.procs"))?;
        pids.push(Pid::from_raw(pid));
    }

    Ok(pids)
}

/// True when /sys/fs/cgroup is a cgroup v2 (unified) mount.
pub fn is_cgroup2_unified() -> bool {
    match statfs::statfs(DEFAULT_CGROUP_ROOT) {
        Ok(info) => info.filesystem_type() == statfs::CGROUP2_SUPER_MAGIC,
        Err(_) => false,
    }
}
