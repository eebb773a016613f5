//! Stage-2 of the bootstrap pipeline, the container init process. Runs
//! exactly once inside the freshly created namespaces and walks the fixed
//! finalizer sequence: cgroup, security knobs, rootfs, credentials,
//! seccomp, the start rendezvous and finally the exec of the container
//! payload. The ordering is load-bearing.
use std::path::Path;
use std::{env, fs};

use anyhow::{bail, Context, Result};
use nix::errno::Errno;
use nix::fcntl;
use nix::unistd::{self, Gid, Pid, Uid};

use super::args::ContainerArgs;
use crate::process::channel;
use crate::process::sync::{self, SyncSocket};
use crate::spec::{LinuxNamespaceType, User};
use crate::syscall::Syscall;
use crate::namespaces::Namespaces;
use crate::{capabilities, cgroups, rootfs, seccomp, utils};

// Get a list of open fds for the calling process.
fn get_open_fds() -> Result<Vec<i32>> {
    const PROCFS_FD_PATH: &str = "/proc/self/fd";
    utils::ensure_procfs(Path::new(PROCFS_FD_PATH))
        .with_context(|| format!("{PROCFS_FD_PATH} is not the actual procfs"))?;

    let fds: Vec<i32> = fs::read_dir(PROCFS_FD_PATH)?
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.path()),
            Err(_) => None,
        })
        .filter_map(|path| path.file_name().map(|file_name| file_name.to_owned()))
        .filter_map(|file_name| file_name.to_str().map(String::from))
        .filter_map(|file_name| -> Option<i32> {
            // Anything in /proc/self/fd that is not a number can be
            // ignored, we are only interested in opened fds.
            file_name.parse().ok()
        })
        .collect();

    Ok(fds)
}

// Cleanup any extra file descriptors, so the new container process will
// not leak a file descriptor from before execve gets executed. The first 3
// fds (stdio) stay open, plus the next `preserve_fds` fds. Everything else
// is marked CLOEXEC rather than closed, some of them are still needed
// until the exec (CVE-2024-21626 is about exactly such a leak).
fn cleanup_file_descriptors(syscall: &dyn Syscall, preserve_fds: i32) -> Result<()> {
    match syscall.close_range(preserve_fds) {
        Ok(()) => return Ok(()),
        Err(err) => match err.downcast_ref::<Errno>() {
            // close_range unsupported (pre-5.9 kernel or missing
            // CLOSE_RANGE_CLOEXEC), fall back to walking /proc/self/fd
            Some(Errno::ENOSYS) | Some(Errno::EINVAL) => {
                log::warn!("close_range is unavailable: {:?}", err);
            }
            _ => return Err(err).context("failed to cleanup extra fds via close_range"),
        },
    }

    let open_fds = get_open_fds().context("failed to obtain opened fds")?;
    let min_fd = preserve_fds + 3;
    let to_be_cleaned_up_fds: Vec<i32> = open_fds
        .iter()
        .filter_map(|&fd| if fd >= min_fd { Some(fd) } else { None })
        .collect();

    for fd in to_be_cleaned_up_fds {
        // the fallback is mandatory, so a failure here is fatal
        fcntl::fcntl(fd, fcntl::F_SETFD(fcntl::FdFlag::FD_CLOEXEC))
            .with_context(|| format!("failed to mark fd {fd} as CLOEXEC"))?;
    }

    Ok(())
}

// Before kernel 3.19 an unprivileged user could enter a user namespace,
// become root and call setgroups to drop membership in supplementary
// groups, gaining access to files that deny access based on those groups
// (CVE-2014-8989). Once "deny" has been written to /proc/<pid>/setgroups
// the call is disabled for the whole namespace, so honor it here.
fn set_supplementary_gids(user: &User, syscall: &dyn Syscall) -> Result<()> {
    if let Some(additional_gids) = user.additional_gids.as_ref() {
        if additional_gids.is_empty() {
            return Ok(());
        }

        let setgroups =
            fs::read_to_string("/proc/self/setgroups").context("failed to read setgroups")?;
        if setgroups.trim() == "deny" {
            bail!("cannot set supplementary gids, setgroups is disabled");
        }

        let gids: Vec<Gid> = additional_gids
            .iter()
            .map(|gid| Gid::from_raw(*gid))
            .collect();

        syscall
            .set_groups(&gids)
            .with_context(|| format!("failed to set supplementary gids {gids:?}"))?;
    }

    Ok(())
}

fn sync_seccomp(
    fd: Option<i32>,
    main_sender: &mut channel::MainSender,
    init_receiver: &mut channel::InitReceiver,
) -> Result<()> {
    if let Some(fd) = fd {
        log::debug!("init process sync seccomp, notify fd: {}", fd);
        main_sender.seccomp_notify_request(fd)?;
        init_receiver.wait_for_seccomp_request_done()?;
        // The fd is duplicated into the main process and sent onwards to
        // the seccomp listener, our copy can go.
        let _ = unistd::close(fd);
    }

    Ok(())
}

pub fn container_init_process(
    args: &ContainerArgs,
    cgroup_path: &Path,
    sync_socket: &mut SyncSocket,
    main_sender: &mut channel::MainSender,
    init_receiver: &mut channel::InitReceiver,
) -> Result<()> {
    // Session setup handshake: the intermediate process releases us once
    // it has reported our pid, then we become the session leader.
    sync_socket
        .wait_for_token(sync::SYNC_GRANDCHILD)
        .context("failed to wait for the grandchild token")?;
    unistd::setsid().context("failed to create session")?;
    sync_socket
        .write_token(sync::SYNC_CHILD_FINISH)
        .context("failed to report session setup")?;
    sync_socket.close()?;

    let syscall = args.syscall;
    let spec = args.spec;
    let linux = spec.linux.as_ref().context("no linux in spec")?;
    let proc = spec.process.as_ref().context("no process in spec")?;
    let mut envs: Vec<String> = proc.env.clone().unwrap_or_default();
    let rootfs_path = args.rootfs;
    let namespaces = Namespaces::from(linux.namespaces.as_ref());
    let in_user_ns = args.user_ns_config.is_some();
    let no_new_privs = matches!(proc.no_new_privileges, Some(true));

    log::debug!("container init process started, pid {}", unistd::getpid());
    if namespaces.get(LinuxNamespaceType::Pid).is_some() && unistd::getpid() != Pid::from_raw(1) {
        bail!("the init process is not pid 1 in the new pid namespace");
    }

    // With a user namespace the cgroup work was done by the main process
    // while it still had host root and we inherited the membership across
    // the fork. Otherwise create and join the cgroup here.
    if !in_user_ns {
        let cmanager = cgroups::Manager::new(cgroup_path);
        // pid 0 enrolls the writing process
        cmanager
            .setup(Pid::from_raw(0), linux.resources.as_ref())
            .context("failed to set up cgroup")?;
    }

    // The ID mappings are in place since the intermediate process was
    // released from the user-map handshake, so this process must already
    // be root inside the namespace.
    if in_user_ns && (!unistd::geteuid().is_root() || unistd::getegid().as_raw() != 0) {
        bail!("effective uid/gid inside the new user namespace is not 0");
    }

    if no_new_privs {
        prctl::set_no_new_privileges(true)
            .map_err(|errno| anyhow::anyhow!("failed to set no_new_privileges: errno {errno}"))?;
    }

    // Without no_new_privileges, installing the seccomp filter is a
    // privileged operation and has to happen before the capabilities are
    // dropped. Otherwise it is delayed to as close to exec as possible.
    if let Some(seccomp) = linux.seccomp.as_ref() {
        if !no_new_privs {
            let notify_fd =
                seccomp::initialize_seccomp(seccomp).context("failed to execute seccomp")?;
            sync_seccomp(notify_fd, main_sender, init_receiver)
                .context("failed to sync seccomp")?;
        }
    }

    if namespaces.get(LinuxNamespaceType::Uts).is_some() {
        if let Some(hostname) = spec.hostname.as_ref() {
            syscall.set_hostname(hostname)?;
        }
    }

    if namespaces.get(LinuxNamespaceType::Mount).is_some() {
        rootfs::prepare_rootfs(rootfs_path, syscall)
            .with_context(|| format!("failed to prepare rootfs {rootfs_path:?}"))?;

        // Entering the rootfs jail. The mount namespace makes pivot_root
        // safe; scary things would happen on the host mount namespace.
        syscall
            .pivot_rootfs(rootfs_path)
            .with_context(|| format!("failed to pivot root to {rootfs_path:?}"))?;

        if let Some(true) = spec.root.as_ref().and_then(|r| r.readonly) {
            rootfs::set_rootfs_read_only(syscall)
                .context("failed to set rootfs read only")?;
        }
    }

    if !proc.cwd.as_os_str().is_empty() {
        unistd::chdir(&proc.cwd).with_context(|| format!("failed to chdir {:?}", proc.cwd))?;
    }

    // Take care of LISTEN_FDS used for systemd-activated sockets. If the
    // value is present, those fds have to survive into the container and
    // the payload learns about them through LISTEN_FDS/LISTEN_PID.
    let preserve_fds: i32 = match env::var("LISTEN_FDS") {
        Ok(listen_fds_str) => {
            let listen_fds = match listen_fds_str.parse::<i32>() {
                Ok(v) => v,
                Err(error) => {
                    log::warn!("LISTEN_FDS {listen_fds_str} is not a number: {error:?}");
                    0
                }
            };

            // The LISTEN_FDS have to be passed to the container payload.
            // LISTEN_PID is set to 1, our pid inside the pid namespace. If
            // LISTEN_FDS is 0, the variables should stay unset.
            if listen_fds > 0 {
                envs.append(&mut vec![
                    format!("LISTEN_FDS={listen_fds}"),
                    "LISTEN_PID=1".to_string(),
                ]);
            }

            args.preserve_fds + listen_fds
        }
        Err(env::VarError::NotPresent) => args.preserve_fds,
        Err(env::VarError::NotUnicode(value)) => {
            log::warn!("LISTEN_FDS is malformed: {value:?}");
            args.preserve_fds
        }
    };

    // Drop the bounding set while still effective root inside the user
    // namespace, dropping it is impossible after the uid transition.
    if let Some(caps) = proc.capabilities.as_ref() {
        capabilities::drop_bounding(caps, syscall).context("failed to drop bounding caps")?;
    }

    // PR_SET_KEEPCAPS around the uid/gid transition lives inside set_id,
    // so the permitted set survives becoming the container user.
    set_supplementary_gids(&proc.user, syscall).context("failed to set supplementary gids")?;
    syscall
        .set_id(
            Uid::from_raw(proc.user.uid),
            Gid::from_raw(proc.user.gid),
        )
        .context("failed to configure uid and gid")?;

    if let Some(caps) = proc.capabilities.as_ref() {
        capabilities::apply(caps, syscall).context("failed to apply capabilities")?;
    }

    // The unprivileged path: with no_new_privs the filter loads without
    // CAP_SYS_ADMIN, right before exec so as few syscalls as possible run
    // filtered. The notify socket still needs its syscalls allowed.
    if let Some(seccomp) = linux.seccomp.as_ref() {
        if no_new_privs {
            let notify_fd =
                seccomp::initialize_seccomp(seccomp).context("failed to execute seccomp")?;
            sync_seccomp(notify_fd, main_sender, init_receiver)
                .context("failed to sync seccomp")?;
        }
    }

    // Notify the main process that everything is set up and the only thing
    // left is the start rendezvous and the exec.
    main_sender.init_ready()?;

    // Close the private endpoints; the main sender stays, it is CLOEXEC
    // and still carries the exec failure report if the payload cannot be
    // executed.
    init_receiver
        .close()
        .context("failed to close init receiver in the init process")?;
    cleanup_file_descriptors(syscall, preserve_fds).context("failed to clean up extra fds")?;

    // the rendezvous with `start`
    args.notify_listener.wait_for_container_start()?;
    args.notify_listener.close()?;

    // Reset the process env to exactly what the spec defines.
    env::vars().for_each(|(key, _value)| env::remove_var(key));
    utils::parse_env(&envs)
        .iter()
        .for_each(|(key, value)| env::set_var(key, value));

    match proc.args.as_ref() {
        Some(exec_args) if !exec_args.is_empty() => {
            if let Err(err) = utils::do_exec(&exec_args[0], exec_args) {
                let _ = main_sender.exec_failed(err.to_string());
                std::process::exit(127);
            }
        }
        _ => bail!("at least one process arg entry is required"),
    }

    // After do_exec the process is replaced with the container payload, so
    // this point is never reached.
    unreachable!();
}
