//! Utility functionality
use anyhow::{bail, Context, Result};
use nix::sys::stat::Mode;
use nix::sys::statfs;
use nix::unistd;
use std::collections::HashMap;
use std::ffi::CString;
use std::fs::{self, DirBuilder};
use std::os::linux::fs::MetadataExt;
use std::os::unix::fs::DirBuilderExt;
use std::os::unix::prelude::{AsRawFd, OsStrExt};
use std::path::{Path, PathBuf};

pub fn parse_env(envs: &[String]) -> HashMap<String, String> {
    envs.iter()
        .filter_map(|e| {
            let mut split = e.split('=');

            split.next().map(|key| {
                let value = split.collect::<Vec<&str>>().join("=");
                (key.into(), value)
            })
        })
        .collect()
}

pub fn do_exec(path: impl AsRef<Path>, args: &[String]) -> Result<()> {
    let p = CString::new(path.as_ref().as_os_str().as_bytes())
        .with_context(|| format!("failed to convert path {:?} to cstring", path.as_ref()))?;
    let a: Vec<CString> = args
        .iter()
        .map(|s| CString::new(s.as_bytes()).unwrap_or_default())
        .collect();
    unistd::execvp(&p, &a)?;
    Ok(())
}

/// If the spec does not name a cgroup path, fabricate one from the pid of
/// the process that gets enrolled first.
pub fn get_cgroup_path(cgroups_path: &Option<PathBuf>, pid: i32) -> PathBuf {
    match cgroups_path {
        Some(cpath) => cpath.clone(),
        None => PathBuf::from(format!("kontainer-{pid}")),
    }
}

pub fn write_file<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, contents).with_context(|| format!("failed to write to {path:?}"))?;
    Ok(())
}

pub fn create_dir_all<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    fs::create_dir_all(path).with_context(|| format!("failed to create directory {path:?}"))
}

/// Creates the specified directory and all parent directories with the
/// specified mode. Ensures that the directory has been created with the
/// correct mode and that the owner of the directory is the owner that has
/// been specified.
pub fn create_dir_all_with_mode<P: AsRef<Path>>(path: P, owner: u32, mode: Mode) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        DirBuilder::new()
            .recursive(true)
            .mode(mode.bits())
            .create(path)
            .with_context(|| format!("failed to create directory {}", path.display()))?;
    }

    let metadata = path
        .metadata()
        .with_context(|| format!("failed to get metadata for {}", path.display()))?;

    if metadata.is_dir()
        && metadata.st_uid() == owner
        && metadata.st_mode() & mode.bits() == mode.bits()
    {
        Ok(())
    } else {
        bail!(
            "metadata for {} does not possess the expected attributes",
            path.display()
        );
    }
}

// Make sure a given path is on procfs. This is to avoid the security risk
// that /proc path is mounted over. Ref: CVE-2019-16884
pub fn ensure_procfs(path: &Path) -> Result<()> {
    let procfs_fd = fs::File::open(path)?;
    let fstat_info = statfs::fstatfs(&procfs_fd.as_raw_fd())?;

    if fstat_info.filesystem_type() != statfs::PROC_SUPER_MAGIC {
        bail!(format!("{path:?} is not on the procfs"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env() {
        let envs = vec![
            "PATH=/usr/bin:/bin".to_string(),
            "TERM=xterm".to_string(),
            "WITH_EQUALS=a=b=c".to_string(),
        ];
        let parsed = parse_env(&envs);
        assert_eq!(parsed.get("PATH"), Some(&"/usr/bin:/bin".to_string()));
        assert_eq!(parsed.get("TERM"), Some(&"xterm".to_string()));
        assert_eq!(parsed.get("WITH_EQUALS"), Some(&"a=b=c".to_string()));
    }

    #[test]
    fn test_get_cgroup_path() {
        assert_eq!(
            get_cgroup_path(&None, 345),
            PathBuf::from("kontainer-345")
        );
        assert_eq!(
            get_cgroup_path(&Some(PathBuf::from("/kontainer/test")), 345),
            PathBuf::from("/kontainer/test")
        );
    }

    #[test]
    fn test_ensure_procfs() -> Result<()> {
        ensure_procfs(Path::new("/proc/self"))?;
        assert!(ensure_procfs(Path::new("/tmp")).is_err());
        Ok(())
    }

    #[test]
    fn test_create_dir_all_with_mode() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("test_dir");
        create_dir_all_with_mode(&path, nix::unistd::getuid().as_raw(), Mode::S_IRWXU)?;
        assert!(path.is_dir());
        Ok(())
    }
}
