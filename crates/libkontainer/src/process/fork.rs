//! Process creation for the bootstrap stages. The intermediate process is
//! cloned as a *sibling* of the main process so that its exit is reaped by
//! the main process's parent, keeping the init process's grandparent chain
//! clean. The init process is created with a plain fork, the PID namespace
//! was already unshared by then.
use anyhow::{bail, Context, Result};
use libc::c_int;
use libc::c_void;
use nix::errno::Errno;
use nix::sched::CloneFlags;
use nix::sys::signal::Signal;
use nix::unistd;
use nix::unistd::Pid;
use std::mem;
use std::ptr;

pub type CloneCb<'a> = Box<dyn FnMut() -> isize + 'a>;

/// Execute the cb in a forked child process. Compared to a raw clone call,
/// fork takes care of all the variable copying, which keeps the borrow
/// checker happy.
pub fn container_fork<F: FnOnce() -> Result<i32>>(cb: F) -> Result<Pid> {
    match unsafe { unistd::fork()? } {
        unistd::ForkResult::Parent { child } => Ok(child),
        unistd::ForkResult::Child => {
            let ret = match cb() {
                Err(error) => {
                    log::debug!("failed to run fork: {:?}", error);
                    -1
                }
                Ok(ec) => ec,
            };
            std::process::exit(ret);
        }
    }
}

/// Clone a new process as a sibling of the calling process
/// (CLONE_PARENT), with SIGCHLD so the new process is reaped like a
/// regular child by our own parent.
pub fn container_clone_sibling(cb: CloneCb) -> Result<Pid> {
    clone(cb, CloneFlags::CLONE_PARENT)
}

/// clone uses syscall clone(2) to create a new process. Using the clone
/// syscall gives better control over the created process than fork, at the
/// price of managing the child stack ourselves.
fn clone(mut cb: CloneCb, clone_flags: CloneFlags) -> Result<Pid> {
    extern "C" fn callback(data: *mut CloneCb) -> c_int {
        let cb: &mut CloneCb = unsafe { &mut *data };
        (*cb)() as c_int
    }

    // Use sysconf to find the page size. If there is an error, we assume
    // the default 4K page size.
    let page_size: usize = unsafe {
        match libc::sysconf(libc::_SC_PAGE_SIZE) {
            -1 => 4 * 1024,
            x => x as usize,
        }
    };

    // Find out the default stack max size through getrlimit.
    let mut rlimit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    unsafe { Errno::result(libc::getrlimit(libc::RLIMIT_STACK, &mut rlimit))? };
    let default_stack_size = rlimit.rlim_cur as usize;

    // The clone syscall requires us to create the stack space for the
    // child process, unlike fork. mmap only reserves the address space
    // upfront, the stack grows as needed up to the reserved size, so
    // reserving the rlimit default (8MB on most systems) wastes nothing.
    // The stack is released when the child execs or terminates. Do not use
    // MAP_GROWSDOWN since it is not well supported.
    let child_stack = unsafe {
        libc::mmap(
            ptr::null_mut(),
            default_stack_size,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_STACK,
            -1,
            0,
        )
    };
    if child_stack == libc::MAP_FAILED {
        bail!("failed to allocate child stack: {}", Errno::last());
    }

    // Adds SIGCHLD flag to mimic the same behavior as fork.
    let combined = clone_flags.bits() | Signal::SIGCHLD as c_int;
    let res = unsafe {
        // Consistent with how pthread_create sets up the stack, create a
        // guard page of 1 page to protect against child stack collision.
        // The child stack grows downward, so the bottom of the stack is in
        // the beginning of the mapping.
        Errno::result(libc::mprotect(child_stack, page_size, libc::PROT_NONE))
            .context("failed to create guard page")?;

        // Since the child stack for clone grows downward, we need to pass
        // in the top of the stack address.
        let child_stack_top = child_stack.add(default_stack_size);

        libc::clone(
            mem::transmute(callback as extern "C" fn(*mut CloneCb) -> i32),
            child_stack_top,
            combined,
            &mut cb as *mut _ as *mut c_void,
        )
    };
    let pid = Errno::result(res).map(Pid::from_raw)?;

    Ok(pid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use nix::sys::wait::{waitpid, WaitStatus};
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_container_fork() -> Result<()> {
        let pid = container_fork(|| Ok(0))?;
        match waitpid(pid, None).expect("wait pid failed.") {
            WaitStatus::Exited(p, status) => {
                assert_eq!(pid, p);
                assert_eq!(status, 0);
                Ok(())
            }
            _ => bail!("test failed"),
        }
    }

    #[test]
    #[serial]
    fn test_container_err_fork() -> Result<()> {
        let pid = container_fork(|| bail!(""))?;
        match waitpid(pid, None).expect("wait pid failed.") {
            WaitStatus::Exited(p, status) => {
                assert_eq!(pid, p);
                assert_eq!(status, 255);
                Ok(())
            }
            _ => bail!("test failed"),
        }
    }

    #[test]
    #[serial]
    fn test_clone_stack_allocation() -> Result<()> {
        let pid = clone(
            Box::new(|| {
                let mut array_on_stack = [0u8; 4096];
                array_on_stack.iter_mut().for_each(|x| *x = 0);

                0
            }),
            CloneFlags::empty(),
        )?;

        match waitpid(pid, None)? {
            WaitStatus::Exited(_, exit_code) => {
                assert_eq!(0, exit_code);
                Ok(())
            }
            status => bail!("process did not exit correctly: {:?}", status),
        }
    }

    #[test]
    #[serial]
    fn test_clone_sibling_is_not_our_child() -> Result<()> {
        // A sibling is reaped by our parent, so waiting for it from here
        // must fail with ECHILD.
        let pid = container_clone_sibling(Box::new(|| 0))?;
        assert!(pid.as_raw() > 0);
        match waitpid(pid, None) {
            Err(Errno::ECHILD) => Ok(()),
            other => bail!("expected ECHILD, got {:?}", other),
        }
    }
}
