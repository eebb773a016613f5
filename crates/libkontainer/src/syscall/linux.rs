//! Implements the Syscall trait for Linux systems
use std::any::Any;
use std::path::Path;

use anyhow::{anyhow, bail, Result};
use caps::{CapSet, Capability, CapsHashSet};
use nix::errno::Errno;
use nix::fcntl::{open, OFlag};
use nix::mount::{mount, umount2, MntFlags, MsFlags};
use nix::sched::{unshare, CloneFlags};
use nix::sys::stat::Mode;
use nix::unistd::{self, fchdir, pivot_root, setgroups, sethostname, Gid, Uid};

use super::Syscall;
use crate::capabilities;
use crate::spec::LinuxRlimit;

const CLOSE_RANGE_CLOEXEC: libc::c_uint = 1 << 2;

/// Empty structure to implement the Syscall trait for
#[derive(Clone)]
pub struct LinuxSyscall;

impl Syscall for LinuxSyscall {
    /// To enable dynamic typing,
    /// see <https://doc.rust-lang.org/std/any/index.html> for more information
    fn as_any(&self) -> &dyn Any {
        self
    }

    /// Function to set given path as root path inside process
    fn pivot_rootfs(&self, path: &Path) -> Result<()> {
        // open the path as directory and read only
        let newroot = open(path, OFlag::O_DIRECTORY | OFlag::O_RDONLY, Mode::empty())?;

        // pivot root usually changes the root directory to first argument,
        // and then mounts the original root directory at second argument.
        // Giving same path for both stacks mapping of the original root
        // directory above the new directory at the same path, then the call
        // to umount unmounts the original root directory from this path.
        // See the notes in pivot_root(2).
        pivot_root(path, path)?;

        // Make the original root directory rslave to avoid propagating
        // unmount event to the host mount namespace. MS_SLAVE, not
        // MS_PRIVATE, per opencontainers/runc#1500.
        mount(
            None::<&str>,
            "/",
            None::<&str>,
            MsFlags::MS_SLAVE | MsFlags::MS_REC,
            None::<&str>,
        )?;

        // MNT_DETACH makes the mount point unavailable to new accesses, but
        // waits till the original mount point is free of activity to
        // actually unmount it.
        umount2("/", MntFlags::MNT_DETACH)?;
        fchdir(newroot)?;
        unistd::chdir("/")?;
        let _ = unistd::close(newroot);
        Ok(())
    }

    /// Disassociate parts of the execution context
    fn unshare(&self, flags: CloneFlags) -> Result<()> {
        unshare(flags)?;
        Ok(())
    }

    /// Set uid and gid for process, keeping the permitted capability set
    /// across the transition
    fn set_id(&self, uid: Uid, gid: Gid) -> Result<()> {
        if let Err(e) = prctl::set_keep_capabilities(true) {
            bail!("set keep capabilities returned {}", e);
        };
        // args: real *id, effective *id, saved set *id respectively
        unistd::setresgid(gid, gid, gid)?;
        unistd::setresuid(uid, uid, uid)?;

        // if not the root user, reset capabilities to effective capabilities,
        // which are used by kernel to perform checks
        // see https://man7.org/linux/man-pages/man7/capabilities.7.html for more information
        if uid != Uid::from_raw(0) {
            capabilities::reset_effective(self)?;
        }
        if let Err(e) = prctl::set_keep_capabilities(false) {
            bail!("set keep capabilities returned {}", e);
        };
        Ok(())
    }

    /// Sets hostname for process
    fn set_hostname(&self, hostname: &str) -> Result<()> {
        if let Err(e) = sethostname(hostname) {
            bail!("failed to set {} as hostname: {:?}", hostname, e)
        }
        Ok(())
    }

    /// Sets resource limit for the calling process
    fn set_rlimit(&self, rlimit: &LinuxRlimit) -> Result<()> {
        let rlim = &libc::rlimit {
            rlim_cur: rlimit.soft,
            rlim_max: rlimit.hard,
        };
        let res = unsafe { libc::setrlimit(rlimit.typ as u32, rlim) };
        if let Err(e) = Errno::result(res).map(drop) {
            bail!("failed to set {:?}: {:?}", rlimit.typ, e)
        }
        Ok(())
    }

    /// Set capabilities for the container process
    fn set_capability(&self, cset: CapSet, value: &CapsHashSet) -> Result<()> {
        match cset {
            // caps::set cannot set capabilities in the bounding set, so
            // every capability not in the wanted set is dropped one by one
            CapSet::Bounding => {
                let all = caps::all();
                for c in all.difference(value) {
                    match c {
                        Capability::CAP_PERFMON
                        | Capability::CAP_CHECKPOINT_RESTORE
                        | Capability::CAP_BPF => {
                            log::warn!("{:?} is not supported.", c);
                            continue;
                        }
                        _ => caps::drop(None, CapSet::Bounding, *c)?,
                    }
                }
            }
            _ => {
                caps::set(None, cset, value)?;
            }
        }
        Ok(())
    }

    fn set_groups(&self, groups: &[Gid]) -> Result<()> {
        match setgroups(groups) {
            Ok(_) => Ok(()),
            Err(e) => Err(anyhow!(e)),
        }
    }

    fn mount(
        &self,
        source: Option<&Path>,
        target: &Path,
        fstype: Option<&str>,
        flags: MsFlags,
        data: Option<&str>,
    ) -> Result<()> {
        match mount(source, target, fstype, flags, data) {
            Ok(_) => Ok(()),
            Err(e) => Err(anyhow!(e)),
        }
    }

    fn umount2(&self, target: &Path, flags: MntFlags) -> Result<()> {
        match umount2(target, flags) {
            Ok(_) => Ok(()),
            Err(e) => Err(anyhow!(e)),
        }
    }

    fn symlink(&self, original: &Path, link: &Path) -> Result<()> {
        match std::os::unix::fs::symlink(original, link) {
            Ok(_) => Ok(()),
            Err(e) => Err(anyhow!(e)),
        }
    }

    /// Mark every fd from 3 + preserve_fds upwards close-on-exec. Callers
    /// fall back to walking /proc/self/fd when the kernel lacks
    /// close_range(2), so ENOSYS/EINVAL must stay distinguishable.
    fn close_range(&self, preserve_fds: i32) -> Result<()> {
        let first = 3 + preserve_fds as libc::c_uint;
        let res = unsafe {
            libc::syscall(
                libc::SYS_close_range,
                first,
                libc::c_uint::MAX,
                CLOSE_RANGE_CLOEXEC,
            )
        };
        match Errno::result(res) {
            Ok(_) => Ok(()),
            Err(e) => Err(anyhow!(e)),
        }
    }
}
