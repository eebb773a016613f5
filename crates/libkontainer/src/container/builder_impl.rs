use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use nix::unistd::Pid;

use crate::cgroups;
use crate::config::KontainerConfig;
use crate::container::Container;
use crate::notify_socket::NotifyListener;
use crate::process::args::ContainerArgs;
use crate::process::container_main_process;
use crate::spec::Spec;
use crate::syscall::Syscall;
use crate::user_ns::UserNamespaceConfig;

use super::ContainerStatus;

pub(super) struct ContainerBuilderImpl<'a> {
    /// Interface to operating system primitives
    pub syscall: &'a dyn Syscall,
    /// Id of the container
    pub container_id: String,
    /// OCI compliant runtime spec
    pub spec: &'a Spec,
    /// Root filesystem of the container
    pub rootfs: PathBuf,
    /// File which will be used to communicate the pid of the container
    /// process to the higher level runtime
    pub pid_file: Option<PathBuf>,
    /// Options for the new user namespace
    pub user_ns_config: Option<UserNamespaceConfig>,
    /// Path to the Unix Domain Socket to communicate container start
    pub notify_path: PathBuf,
    /// File descriptors preserved/passed to the container init process
    pub preserve_fds: i32,
    /// Container state
    pub container: Option<Container>,
    /// The cgroup path resolved during the bootstrap, kept for both the
    /// persisted config and the failure cleanup
    pub cgroup_path: Option<PathBuf>,
}

impl<'a> ContainerBuilderImpl<'a> {
    pub(super) fn create(&mut self) -> Result<Pid> {
        match self.run_container() {
            Ok(pid) => Ok(pid),
            Err(outer) => {
                if let Err(inner) = self.cleanup_container() {
                    log::warn!("failed to cleanup container after error: {inner:?}");
                }

                Err(outer)
            }
        }
    }

    fn run_container(&mut self) -> Result<Pid> {
        // The notify socket has to be created before any fork, so the init
        // process inherits the listener fd and can block on it from inside
        // the new namespaces.
        let notify_listener = NotifyListener::new(&self.notify_path)?;

        // Make this process non-dumpable before creating namespaces, to
        // avoid race conditions where processes in the namespaces being
        // created access host resources through us. Stage-1 flips the bit
        // back on for the duration of the ID-mapping window.
        if self
            .spec
            .linux
            .as_ref()
            .and_then(|l| l.namespaces.as_ref())
            .is_some()
        {
            prctl::set_dumpable(false)
                .map_err(|e| anyhow::anyhow!("failed to set dumpable to false: errno {e}"))?;
        }

        let container_args = ContainerArgs {
            syscall: self.syscall,
            spec: self.spec,
            rootfs: &self.rootfs,
            notify_listener,
            preserve_fds: self.preserve_fds,
            container: &self.container,
            user_ns_config: &self.user_ns_config,
        };

        let init_pid =
            container_main_process::container_main_process(&container_args, &mut self.cgroup_path)
                .context("failed to run container main process")?;

        // if a file to write the pid to is specified, write the pid of the
        // container process (bare, no trailing newline)
        if let Some(pid_file) = &self.pid_file {
            fs::write(pid_file, format!("{init_pid}")).context("failed to write pid file")?;
        }

        if let Some(container) = &mut self.container {
            KontainerConfig::new(self.cgroup_path.clone())
                .save(&container.root)
                .context("failed to save kontainer config")?;

            container
                .set_status(ContainerStatus::Created)
                .set_pid(init_pid.as_raw())
                .save()?;
        }

        Ok(init_pid)
    }

    fn cleanup_container(&self) -> Result<()> {
        let mut errors = Vec::new();

        if let Some(cgroup_path) = &self.cgroup_path {
            let cmanager = cgroups::Manager::new(cgroup_path);
            if let Err(e) = cmanager.remove() {
                log::error!("failed to remove cgroup {cgroup_path:?}: {e}");
                errors.push(e.to_string());
            }
        }

        if let Err(e) = fs::remove_file(&self.notify_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::error!("failed to remove notify socket {:?}: {e}", self.notify_path);
                errors.push(e.to_string());
            }
        }

        if let Some(container) = &self.container {
            if container.root.exists() {
                if let Err(e) = fs::remove_dir_all(&container.root) {
                    log::error!("failed to remove container dir {:?}: {e}", container.root);
                    errors.push(e.to_string());
                }
            }
        }

        if !errors.is_empty() {
            bail!("failed to cleanup container: {}", errors.join(";"));
        }

        Ok(())
    }
}
