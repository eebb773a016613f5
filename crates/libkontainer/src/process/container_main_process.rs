//! Stage-0 of the bootstrap pipeline. Clones the intermediate process as a
//! sibling, services the user-map handshake while it still holds host
//! root, forwards the seccomp notify fd and waits for the init process to
//! report ready.
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use nix::errno::Errno;
use nix::unistd::Pid;

use crate::cgroups;
use crate::process::{args::ContainerArgs, channel, container_intermediate_process, fork, sync};
use crate::process::seccomp_listener;
use crate::spec::LinuxRlimit;
use crate::user_ns::UserNamespaceConfig;
use crate::utils;

pub fn container_main_process(
    container_args: &ContainerArgs,
    resolved_cgroup_path: &mut Option<PathBuf>,
) -> Result<Pid> {
    // We use a set of channels to communicate between the processes. Each
    // channel is uni-directional. Because the channels are duplicated into
    // the cloned processes, any unused endpoint has to be closed
    // diligently, the peers rely on EOF as a liveness signal.
    let (main_sender, main_receiver) = &mut channel::main_channel()?;
    let init_chan = &mut channel::init_channel()?;
    let usermap_chan = &mut sync::sync_socketpair()?;

    let intermediate_pid = fork::container_clone_sibling(Box::new(|| {
        // The fds of the channels are duplicated during clone, so we first
        // close the endpoints not used in the intermediate process. Note,
        // this already runs in the new process.
        if let Err(err) = main_receiver.close() {
            log::debug!("failed to close unused receiver: {:?}", err);
            return -1;
        }

        match container_intermediate_process::container_intermediate_process(
            container_args,
            usermap_chan,
            init_chan,
            main_sender,
        ) {
            Ok(_) => 0,
            Err(err) => {
                log::debug!("failed to run intermediate process: {:?}", err);
                // report the failure to the main process before going down,
                // best effort since the channel may already be gone
                let _ = main_sender.other_error(err.to_string());
                -1
            }
        }
    }))?;

    // Close down the endpoints this process does not own. The
    // corresponding fds were duplicated into the child during clone.
    main_sender
        .close()
        .context("failed to close unused sender")?;
    let (usermap_main, usermap_inter) = usermap_chan;
    usermap_inter
        .close()
        .context("failed to close unused sync socket")?;
    let (init_sender, init_receiver) = init_chan;
    init_receiver
        .close()
        .context("failed to close unused init receiver")?;

    // The cgroup path is fabricated from the pid of the first enrolled
    // process when the spec does not name one. Resolve it here, right
    // after the clone, so create, delete and ps agree on a single path.
    let linux = container_args.spec.linux.as_ref();
    let cgroup_path = utils::get_cgroup_path(
        &linux.and_then(|l| l.cgroups_path.clone()),
        intermediate_pid.as_raw(),
    );
    *resolved_cgroup_path = Some(cgroup_path.clone());

    // If a new user namespace is requested, the intermediate process asks
    // this process to write the uid and gid mappings once it has entered
    // the namespace. The same window is the last chance to do the work
    // that needs host root: cgroup setup and rlimits, both applied to the
    // intermediate process and inherited by the init process it forks.
    if let Some(user_ns_config) = container_args.user_ns_config {
        usermap_main
            .wait_for_token(sync::SYNC_USERMAP_PLS)
            .context("failed to wait for the user-map request")?;
        let reported_pid = usermap_main.read_pid()?;
        if reported_pid != intermediate_pid {
            bail!(
                "user-map request from pid {reported_pid} does not match intermediate pid {intermediate_pid}"
            );
        }

        let cmanager = cgroups::Manager::new(&cgroup_path);
        cmanager
            .setup(
                intermediate_pid,
                linux.and_then(|l| l.resources.as_ref()),
            )
            .context("failed to set up cgroup")?;

        if let Some(rlimits) = container_args
            .spec
            .process
            .as_ref()
            .and_then(|p| p.rlimits.as_ref())
        {
            for rlimit in rlimits {
                apply_rlimit(intermediate_pid, rlimit)
                    .with_context(|| format!("failed to apply rlimit {rlimit:?}"))?;
            }
        }

        setup_mapping(user_ns_config, intermediate_pid)?;
        usermap_main.write_token(sync::SYNC_USERMAP_ACK)?;
    }
    usermap_main
        .close()
        .context("failed to close sync socket")?;

    // The intermediate process sends the init pid once it forks the init
    // process, and exits right after.
    let init_pid = main_receiver.wait_for_intermediate_ready()?;

    if let Some(seccomp) = linux.and_then(|l| l.seccomp.as_ref()) {
        let state = container_args
            .container
            .as_ref()
            .context("container state is required")?
            .state
            .clone();
        seccomp_listener::sync_seccomp(seccomp, &state, init_sender, main_receiver)
            .context("failed to sync seccomp with init")?;
    }

    // Nothing else is sent to the init process, close the sender.
    init_sender
        .close()
        .context("failed to close unused init sender")?;

    main_receiver
        .wait_for_init_ready()
        .context("failed to wait for init ready")?;

    log::debug!("init pid is {:?}", init_pid);

    // The intermediate process is a sibling (CLONE_PARENT), reaped by our
    // own parent, so there is nothing to wait for here.
    Ok(init_pid)
}

fn apply_rlimit(pid: Pid, rlimit: &LinuxRlimit) -> Result<()> {
    let rlim = libc::rlimit {
        rlim_cur: rlimit.soft,
        rlim_max: rlimit.hard,
    };
    let res = unsafe { libc::prlimit(pid.as_raw(), rlimit.typ as u32, &rlim, std::ptr::null_mut()) };
    Errno::result(res).map(drop)?;

    Ok(())
}

fn setup_mapping(config: &UserNamespaceConfig, pid: Pid) -> Result<()> {
    log::debug!("write mapping for pid {:?}", pid);
    if !config.privileged {
        // The main process is running as an unprivileged user and cannot
        // write the mapping until "deny" has been written to setgroups.
        // See CVE-2014-8989.
        utils::write_file(format!("/proc/{pid}/setgroups"), "deny")?;
    }

    config
        .write_uid_mapping(pid)
        .with_context(|| format!("failed to map uid of pid {pid}"))?;
    config
        .write_gid_mapping(pid)
        .with_context(|| format!("failed to map gid of pid {pid}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::LinuxIdMapping;
    use crate::user_ns::IdMapper;
    use nix::sched::{unshare, CloneFlags};
    use nix::sys::wait;
    use nix::unistd::{self, getgid, getuid};
    use serial_test::serial;
    use std::fs;

    #[test]
    #[serial]
    fn test_apply_rlimit_to_self() -> Result<()> {
        let mut current = libc::rlimit {
            rlim_cur: 0,
            rlim_max: 0,
        };
        unsafe { Errno::result(libc::getrlimit(libc::RLIMIT_NOFILE, &mut current))? };

        let rlimit = LinuxRlimit {
            typ: crate::spec::LinuxRlimitType::RlimitNofile,
            soft: current.rlim_cur,
            hard: current.rlim_max,
        };
        // pid 0 addresses the calling process
        apply_rlimit(Pid::from_raw(0), &rlimit)?;
        Ok(())
    }

    #[test]
    #[serial]
    fn test_setup_mapping_in_new_user_ns() -> Result<()> {
        let uid_mapping = LinuxIdMapping {
            container_id: 0,
            host_id: getuid().as_raw(),
            size: 1,
        };
        let gid_mapping = LinuxIdMapping {
            container_id: 0,
            host_id: getgid().as_raw(),
            size: 1,
        };
        let config = UserNamespaceConfig {
            uid_mappings: Some(vec![uid_mapping]),
            gid_mappings: Some(vec![gid_mapping]),
            privileged: getuid().is_root(),
            id_mapper: IdMapper::new(),
        };

        let (mut parent_sync, mut child_sync) = sync::sync_socketpair()?;
        match unsafe { unistd::fork()? } {
            unistd::ForkResult::Parent { child } => {
                if parent_sync.wait_for_token(sync::SYNC_USERMAP_PLS).is_err() {
                    // the child could not create a user namespace here
                    wait::waitpid(child, None)?;
                    return Ok(());
                }
                let reported = parent_sync.read_pid()?;
                assert_eq!(reported, child);
                setup_mapping(&config, child)?;

                let uid_map = fs::read_to_string(format!("/proc/{child}/uid_map"))?;
                let fields: Vec<&str> = uid_map.split_whitespace().collect();
                assert_eq!(fields[0], "0");
                assert_eq!(fields[1], getuid().to_string());
                assert_eq!(fields[2], "1");

                parent_sync.write_token(sync::SYNC_USERMAP_ACK)?;
                wait::waitpid(child, None)?;
            }
            unistd::ForkResult::Child => {
                prctl::set_dumpable(true).unwrap();
                if unshare(CloneFlags::CLONE_NEWUSER).is_err() {
                    // no user namespaces on this kernel/config, drop the
                    // handshake so the parent fails fast instead of hanging
                    child_sync.close().unwrap();
                    std::process::exit(0);
                }
                child_sync.write_token(sync::SYNC_USERMAP_PLS).unwrap();
                child_sync.write_pid(unistd::getpid()).unwrap();
                child_sync.wait_for_token(sync::SYNC_USERMAP_ACK).unwrap();
                std::process::exit(0);
            }
        }
        Ok(())
    }
}
