use anyhow::{bail, Context, Result};
use nix::sys::signal;

use super::Container;
use crate::signal::Signal;

impl Container {
    /// Sends the specified signal to the container init process. The
    /// persisted status is left alone, reads re-derive it from /proc.
    pub fn kill<S: Into<Signal>>(&mut self, signal: S) -> Result<()> {
        self.refresh_status()?;

        if !self.can_kill() {
            bail!(
                "cannot kill container {} due to incorrect state {}",
                self.id(),
                self.status()
            );
        }

        self.do_kill(signal)
    }

    pub(crate) fn do_kill<S: Into<Signal>>(&self, signal: S) -> Result<()> {
        let signal = signal.into().into_raw();
        let pid = self
            .pid()
            .context("container process pid not found in state")?;

        log::debug!("kill signal {} to {}", signal, pid);

        match signal::kill(pid, signal) {
            Ok(_) => Ok(()),
            // the process does not exist, which is what we want
            Err(nix::errno::Errno::ESRCH) => Ok(()),
            Err(err) => {
                Err(err).with_context(|| format!("failed to send {signal} to pid {pid}"))
            }
        }
    }
}
