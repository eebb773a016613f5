//! Prepares the container root filesystem: the fixed set of API
//! filesystems, the bind-mounted device nodes and the read-only root
//! remount. mknod is not available inside a user namespace, so device
//! nodes are always bind mounts of the host's nodes over empty files.
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use nix::mount::MsFlags;
use nix::sys::stat::{umask, Mode};
use nix::sys::statvfs::{statvfs, FsFlags};

use crate::syscall::Syscall;

const BIND_DEVICES: &[&str] = &["null", "zero", "random", "urandom"];

pub fn prepare_rootfs(rootfs: &Path, syscall: &dyn Syscall) -> Result<()> {
    log::debug!("prepare rootfs: {:?}", rootfs);

    // Decouple from the host propagation so none of the mounts below leak
    // out of the new mount namespace.
    syscall
        .mount(
            None,
            Path::new("/"),
            None,
            MsFlags::MS_SLAVE | MsFlags::MS_REC,
            None,
        )
        .context("failed to mount rootfs")?;

    // Turn the rootfs directory into a mount point, pivot_root requires
    // one.
    syscall
        .mount(
            Some(rootfs),
            rootfs,
            None,
            MsFlags::MS_BIND | MsFlags::MS_REC,
            None,
        )
        .context("failed to bind mount rootfs onto itself")?;

    mount_proc(rootfs, syscall)?;
    mount_dev(rootfs, syscall)?;
    mount_sysfs(rootfs, syscall)?;
    mount_cgroup(rootfs, syscall)?;

    Ok(())
}

fn mount_proc(rootfs: &Path, syscall: &dyn Syscall) -> Result<()> {
    let target = create_target(rootfs, "proc")?;
    syscall
        .mount(
            Some(Path::new("proc")),
            &target,
            Some("proc"),
            MsFlags::MS_NOSUID | MsFlags::MS_NODEV | MsFlags::MS_NOEXEC,
            None,
        )
        .context("failed to mount /proc")?;

    Ok(())
}

fn mount_dev(rootfs: &Path, syscall: &dyn Syscall) -> Result<()> {
    let dev = create_target(rootfs, "dev")?;
    syscall
        .mount(
            Some(Path::new("tmpfs")),
            &dev,
            Some("tmpfs"),
            MsFlags::MS_NOSUID | MsFlags::MS_NOEXEC,
            Some("mode=755"),
        )
        .context("failed to mount /dev")?;

    bind_devices(rootfs, syscall)?;

    let shm = create_target(rootfs, "dev/shm")?;
    syscall
        .mount(
            Some(Path::new("tmpfs")),
            &shm,
            Some("tmpfs"),
            MsFlags::MS_NOSUID | MsFlags::MS_NOEXEC | MsFlags::MS_NODEV,
            Some("mode=1777,size=64k"),
        )
        .context("failed to mount /dev/shm")?;

    setup_default_symlinks(rootfs, syscall)?;

    Ok(())
}

fn bind_devices(rootfs: &Path, syscall: &dyn Syscall) -> Result<()> {
    let old_mode = umask(Mode::from_bits_truncate(0o000));
    for name in BIND_DEVICES {
        let host_path = PathBuf::from("/dev").join(name);
        let container_path = rootfs.join("dev").join(name);
        // the bind target must exist as a regular file
        OpenOptions::new()
            .create(true)
            .write(true)
            .open(&container_path)
            .with_context(|| format!("failed to create {}", container_path.display()))?;
        syscall
            .mount(
                Some(&host_path),
                &container_path,
                None,
                MsFlags::MS_BIND,
                None,
            )
            .with_context(|| format!("failed to bind mount {}", host_path.display()))?;
    }
    umask(old_mode);

    Ok(())
}

fn setup_default_symlinks(rootfs: &Path, syscall: &dyn Syscall) -> Result<()> {
    let defaults = [
        ("/proc/self/fd", "dev/fd"),
        ("/proc/self/fd/0", "dev/stdin"),
        ("/proc/self/fd/1", "dev/stdout"),
        ("/proc/self/fd/2", "dev/stderr"),
    ];
    for (src, dst) in defaults {
        syscall
            .symlink(Path::new(src), &rootfs.join(dst))
            .context("failed to create default symlink")?;
    }

    Ok(())
}

fn mount_sysfs(rootfs: &Path, syscall: &dyn Syscall) -> Result<()> {
    let target = create_target(rootfs, "sys")?;
    syscall
        .mount(
            Some(Path::new("sysfs")),
            &target,
            Some("sysfs"),
            MsFlags::MS_RDONLY | MsFlags::MS_NOSUID | MsFlags::MS_NODEV | MsFlags::MS_NOEXEC,
            None,
        )
        .context("failed to mount /sys")?;

    Ok(())
}

// The cgroup v2 hierarchy is handed into the container as a read-only bind
// mount of the host's. Skipped when the host is not unified.
fn mount_cgroup(rootfs: &Path, syscall: &dyn Syscall) -> Result<()> {
    if !crate::cgroups::common::is_cgroup2_unified() {
        log::warn!("host has no unified cgroup hierarchy, skipping /sys/fs/cgroup");
        return Ok(());
    }

    let target = create_target(rootfs, "sys/fs/cgroup")?;
    syscall
        .mount(
            Some(Path::new("/sys/fs/cgroup")),
            &target,
            None,
            MsFlags::MS_BIND,
            None,
        )
        .context("failed to bind mount /sys/fs/cgroup")?;
    syscall
        .mount(
            None,
            &target,
            None,
            MsFlags::MS_BIND
                | MsFlags::MS_REMOUNT
                | MsFlags::MS_RDONLY
                | MsFlags::MS_NOSUID
                | MsFlags::MS_NODEV
                | MsFlags::MS_NOEXEC,
            None,
        )
        .context("failed to remount /sys/fs/cgroup read only")?;

    Ok(())
}

/// Remounts the already pivoted root read-only. The first attempt carries
/// only the read-only flags; if the kernel refuses, the flags already on
/// the mount are picked up via statvfs and OR'd in for a second attempt.
pub fn set_rootfs_read_only(syscall: &dyn Syscall) -> Result<()> {
    let base = MsFlags::MS_BIND | MsFlags::MS_REMOUNT | MsFlags::MS_RDONLY;
    if syscall
        .mount(None, Path::new("/"), None, base, None)
        .is_ok()
    {
        return Ok(());
    }

    let stat = statvfs("/").context("failed to statvfs /")?;
    let mut flags = base;
    if stat.flags().contains(FsFlags::ST_NOSUID) {
        flags |= MsFlags::MS_NOSUID;
    }
    if stat.flags().contains(FsFlags::ST_NODEV) {
        flags |= MsFlags::MS_NODEV;
    }
    if stat.flags().contains(FsFlags::ST_NOEXEC) {
        flags |= MsFlags::MS_NOEXEC;
    }
    syscall
        .mount(None, Path::new("/"), None, flags, None)
        .context("failed to remount / read only")?;

    Ok(())
}

fn create_target(rootfs: &Path, relative: &str) -> Result<PathBuf> {
    let target = rootfs.join(relative);
    fs::create_dir_all(&target)
        .with_context(|| format!("failed to create mount target {}", target.display()))?;

    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syscall::syscall::create_syscall;
    use crate::syscall::test::{MountArgs, TestHelperSyscall};
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_prepare_rootfs_mount_plan() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let rootfs = tmp.path().join("rootfs");
        fs::create_dir_all(&rootfs)?;

        let syscall = create_syscall();
        prepare_rootfs(&rootfs, syscall.as_ref())?;

        let got = syscall
            .as_any()
            .downcast_ref::<TestHelperSyscall>()
            .unwrap()
            .get_mount_args();

        // propagation decouple, rootfs bind, proc, dev, 4 devices, shm and
        // sysfs are always present
        assert_eq!(
            got[0],
            MountArgs {
                source: None,
                target: PathBuf::from("/"),
                fstype: None,
                flags: MsFlags::MS_SLAVE | MsFlags::MS_REC,
                data: None,
            }
        );
        assert_eq!(
            got[1],
            MountArgs {
                source: Some(rootfs.clone()),
                target: rootfs.clone(),
                fstype: None,
                flags: MsFlags::MS_BIND | MsFlags::MS_REC,
                data: None,
            }
        );
        assert_eq!(got[2].fstype.as_deref(), Some("proc"));
        assert_eq!(got[3].target, rootfs.join("dev"));
        assert_eq!(got[3].data.as_deref(), Some("mode=755"));

        let device_mounts: Vec<_> = got
            .iter()
            .filter(|m| m.flags == MsFlags::MS_BIND && m.target.starts_with(rootfs.join("dev")))
            .collect();
        assert_eq!(device_mounts.len(), BIND_DEVICES.len());
        for (mount, name) in device_mounts.iter().zip(BIND_DEVICES) {
            assert_eq!(mount.source, Some(PathBuf::from("/dev").join(name)));
            assert!(rootfs.join("dev").join(name).is_file());
        }

        let shm = got
            .iter()
            .find(|m| m.target == rootfs.join("dev/shm"))
            .unwrap();
        assert_eq!(shm.data.as_deref(), Some("mode=1777,size=64k"));

        let sys = got.iter().find(|m| m.target == rootfs.join("sys")).unwrap();
        assert!(sys.flags.contains(MsFlags::MS_RDONLY));

        Ok(())
    }

    #[test]
    #[serial]
    fn test_prepare_rootfs_creates_symlinks() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let rootfs = tmp.path().join("rootfs");
        fs::create_dir_all(&rootfs)?;

        let syscall = create_syscall();
        prepare_rootfs(&rootfs, syscall.as_ref())?;

        let links = syscall
            .as_any()
            .downcast_ref::<TestHelperSyscall>()
            .unwrap()
            .get_symlink_args();
        assert_eq!(links.len(), 4);
        assert_eq!(links[0].0, PathBuf::from("/proc/self/fd"));
        assert_eq!(links[0].1, rootfs.join("dev/fd"));
        Ok(())
    }

    #[test]
    #[serial]
    fn test_set_rootfs_read_only_records_remount() -> Result<()> {
        let syscall = create_syscall();
        set_rootfs_read_only(syscall.as_ref())?;

        let got = syscall
            .as_any()
            .downcast_ref::<TestHelperSyscall>()
            .unwrap()
            .get_mount_args();
        assert_eq!(got.len(), 1);
        assert!(got[0]
            .flags
            .contains(MsFlags::MS_BIND | MsFlags::MS_REMOUNT | MsFlags::MS_RDONLY));
        Ok(())
    }
}
