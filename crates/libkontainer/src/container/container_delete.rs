use std::fs;

use anyhow::{bail, Context, Result};
use nix::sys::signal;

use super::{Container, ContainerStatus};
use crate::cgroups;
use crate::notify_socket::notify_socket_path;

impl Container {
    /// Deletes the container: kills the container process where the state
    /// allows it, then removes the cgroup directory, the notify socket and
    /// the state directory.
    pub fn delete(&mut self, force: bool) -> Result<()> {
        self.refresh_status()?;

        log::debug!("container status: {:?}", self.status());

        match self.status() {
            ContainerStatus::Stopped => {}
            ContainerStatus::Created => {
                // The OCI spec does not allow deletion of status `created`
                // without the force flag, but both `runc` and `crun` allow
                // it, so we follow them and kill the blocked init process
                // first.
                self.do_kill(signal::Signal::SIGKILL)?;
                self.set_status(ContainerStatus::Stopped).save()?;
            }
            _ => {
                if force {
                    self.do_kill(signal::Signal::SIGKILL)?;
                    self.set_status(ContainerStatus::Stopped).save()?;
                } else {
                    bail!(
                        "delete requires the container {} to be stopped or created, but it is {}",
                        self.id(),
                        self.status()
                    );
                }
            }
        }

        debug_assert!(self.status().can_delete());

        if self.root.exists() {
            match self.config() {
                Ok(config) => {
                    log::debug!("config: {:?}", config);

                    // remove the cgroup created for the container, see
                    // cgroups(7) on creating and removing cgroups
                    if let Some(cgroup_path) = config.cgroup_path.as_deref() {
                        let cmanager = cgroups::Manager::new(cgroup_path);
                        if let Err(err) = cmanager.remove() {
                            log::warn!("failed to remove cgroup {cgroup_path:?}: {err:?}");
                        }
                    }
                }
                Err(err) => {
                    // There is a brief window where the container state
                    // exists but the kontainer config has not been written
                    // yet. Continue deleting in that case.
                    log::warn!("skipping cgroup cleanup: {err:?}");
                }
            }

            // the rendezvous socket of a container that never started
            let socket_path = notify_socket_path(self.id());
            if let Err(err) = fs::remove_file(&socket_path) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("failed to remove notify socket {socket_path:?}: {err:?}");
                }
            }

            log::debug!("remove dir {:?}", self.root);
            fs::remove_dir_all(&self.root)
                .with_context(|| format!("failed to remove container dir {:?}", self.root))?;
        }

        Ok(())
    }
}
