//! An interface trait so that the rest of kontainer can call the necessary
//! kernel functions without having to worry about their implementation
//! details.
use std::any::Any;
use std::path::Path;

use anyhow::Result;
use caps::{CapSet, CapsHashSet};
use nix::mount::{MntFlags, MsFlags};
use nix::sched::CloneFlags;
use nix::unistd::{Gid, Uid};

use crate::spec::LinuxRlimit;
use crate::syscall::linux::LinuxSyscall;
use crate::syscall::test::TestHelperSyscall;

/// This specifies the kernel functionality required for container
/// management.
pub trait Syscall {
    fn as_any(&self) -> &dyn Any;
    fn pivot_rootfs(&self, path: &Path) -> Result<()>;
    fn unshare(&self, flags: CloneFlags) -> Result<()>;
    fn set_id(&self, uid: Uid, gid: Gid) -> Result<()>;
    fn set_hostname(&self, hostname: &str) -> Result<()>;
    fn set_rlimit(&self, rlimit: &LinuxRlimit) -> Result<()>;
    fn set_capability(&self, cset: CapSet, value: &CapsHashSet) -> Result<()>;
    fn set_groups(&self, groups: &[Gid]) -> Result<()>;
    fn mount(
        &self,
        source: Option<&Path>,
        target: &Path,
        fstype: Option<&str>,
        flags: MsFlags,
        data: Option<&str>,
    ) -> Result<()>;
    fn umount2(&self, target: &Path, flags: MntFlags) -> Result<()>;
    fn symlink(&self, original: &Path, link: &Path) -> Result<()>;
    fn close_range(&self, preserve_fds: i32) -> Result<()>;
}

pub fn create_syscall() -> Box<dyn Syscall> {
    if cfg!(test) {
        Box::<TestHelperSyscall>::default()
    } else {
        Box::new(LinuxSyscall)
    }
}
