use anyhow::{bail, Context, Result};

use super::{Container, ContainerStatus};
use crate::notify_socket::{notify_socket_path, NotifySocket};

impl Container {
    /// Starts a previously created container by sending the start message
    /// to the notify socket the init process is blocked on.
    pub fn start(&mut self) -> Result<()> {
        self.refresh_status()?;

        if !self.can_start() {
            bail!(
                "cannot start container {} due to incorrect state {}",
                self.id(),
                self.status()
            );
        }

        let mut notify_socket = NotifySocket::new(notify_socket_path(self.id()));
        notify_socket
            .notify_container_start()
            .context("failed to notify container start")?;

        self.set_status(ContainerStatus::Running)
            .save()
            .with_context(|| format!("failed to save state for container {}", self.id()))?;

        Ok(())
    }
}
