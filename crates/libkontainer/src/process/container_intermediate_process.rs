//! Stage-1 of the bootstrap pipeline. Runs single-threaded in a fresh
//! process: unshares the user namespace, hands the ID-mapping work to the
//! main process, unshares the remaining namespaces in a fixed order, forks
//! the init process and exits.
use anyhow::{Context, Result};
use nix::sched::CloneFlags;
use nix::unistd::{self, Gid, Uid};

use crate::namespaces::Namespaces;
use crate::process::channel;
use crate::process::fork;
use crate::process::sync::{self, SyncSocket};
use crate::spec::LinuxNamespaceType;
use crate::utils;

use super::args::ContainerArgs;
use super::container_init_process::container_init_process;

pub fn container_intermediate_process(
    args: &ContainerArgs,
    usermap_chan: &mut (SyncSocket, SyncSocket),
    init_chan: &mut (channel::InitSender, channel::InitReceiver),
    main_sender: &mut channel::MainSender,
) -> Result<()> {
    let command = args.syscall;
    let spec = args.spec;
    let linux = spec.linux.as_ref().context("no linux in spec")?;
    let proc = spec.process.as_ref().context("no process in spec")?;
    let namespaces = Namespaces::from(linux.namespaces.as_ref());
    let (usermap_main, usermap_inter) = usermap_chan;
    usermap_main
        .close()
        .context("failed to close unused sync socket")?;

    // if a new user namespace is specified, the process enters it first
    // and then has the main process write the ID mappings, see
    // user_namespaces(7) for why that has to happen from the outside
    if namespaces.get(LinuxNamespaceType::User).is_some() {
        namespaces
            .unshare(CloneFlags::CLONE_NEWUSER)
            .context("failed to unshare user namespace")?;

        // this process needs to be dumpable, otherwise the non root
        // parent is not allowed to write the uid/gid maps
        prctl::set_dumpable(true).unwrap();
        usermap_inter.write_token(sync::SYNC_USERMAP_PLS)?;
        usermap_inter.write_pid(unistd::getpid())?;
        usermap_inter.wait_for_token(sync::SYNC_USERMAP_ACK)?;
        prctl::set_dumpable(false).unwrap();

        // With the mapping in place, continue as root inside the new user
        // namespace. Configuring the container process requires root,
        // even though that root is likely mapped to an unprivileged user
        // on the host.
        command
            .set_id(Uid::from_raw(0), Gid::from_raw(0))
            .context("failed to become root in the new user namespace")?;
    } else {
        // without the user-map window, nobody else can set our limits;
        // the init process inherits them across the fork
        if let Some(rlimits) = proc.rlimits.as_ref() {
            for rlimit in rlimits {
                command.set_rlimit(rlimit).context("failed to set rlimit")?;
            }
        }
    }
    usermap_inter
        .close()
        .context("failed to close sync socket")?;

    // mount, network, uts, ipc and then pid; the pid namespace comes last
    // because it only applies to children forked afterwards
    namespaces
        .apply_namespaces(|flag| flag != CloneFlags::CLONE_NEWUSER)
        .context("failed to unshare namespaces")?;

    // the same path the main process resolved, keyed on our own pid
    let cgroup_path = utils::get_cgroup_path(&linux.cgroups_path, unistd::getpid().as_raw());

    // the grandchild socketpair carries the session-setup handshake
    // between this process and the init process
    let grandchild_chan = &mut sync::sync_socketpair()?;

    // We have to record the pid of the init process here, since the init
    // process is inside the new pid namespace and cannot report a host
    // pid itself.
    let (init_sender, init_receiver) = init_chan;
    let pid = {
        let (grandchild_inter, grandchild_init) = &mut *grandchild_chan;
        fork::container_fork(|| {
            // close the endpoints that belong to the intermediate process,
            // the fds were duplicated by the fork
            if let Err(err) = grandchild_inter.close() {
                log::debug!("failed to close unused sync socket: {:?}", err);
                return Ok(-1);
            }
            if let Err(err) = init_sender.close() {
                log::debug!("failed to close unused init sender: {:?}", err);
                return Ok(-1);
            }

            match container_init_process(
                args,
                &cgroup_path,
                grandchild_init,
                main_sender,
                init_receiver,
            ) {
                Ok(_) => Ok(0),
                Err(err) => {
                    log::debug!("failed to run init process: {:?}", err);
                    let _ = main_sender.other_error(err.to_string());
                    Ok(-1)
                }
            }
        })?
    };

    // Notify the main process about the pid of the init process first, so
    // it observes the pid before the init process starts making progress.
    main_sender
        .intermediate_ready(pid)
        .context("failed to send intermediate ready")?;

    let (grandchild_inter, grandchild_init) = grandchild_chan;
    grandchild_init
        .close()
        .context("failed to close unused sync socket")?;
    grandchild_inter
        .write_token(sync::SYNC_GRANDCHILD)
        .context("failed to send grandchild token")?;
    grandchild_inter
        .wait_for_token(sync::SYNC_CHILD_FINISH)
        .context("failed to wait for the init process session setup")?;
    grandchild_inter.close()?;

    // Close the leftover endpoints so no lingering sockets keep the peers
    // from seeing EOF. The job of the intermediate process is done.
    main_sender
        .close()
        .context("failed to close unused main sender")?;
    init_sender
        .close()
        .context("failed to close unused init sender")?;
    init_receiver
        .close()
        .context("failed to close unused init receiver")?;

    Ok(())
}
