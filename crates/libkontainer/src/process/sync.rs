//! The raw synchronization pipes between the bootstrap stages. Each token
//! is a 4-byte little-endian int, pids travel as 4-byte little-endian ints
//! as well. All reads are fixed-size; a short read fails the pipeline.
use std::os::unix::prelude::RawFd;

use anyhow::{bail, Context, Result};
use nix::sys::socket::{self, MsgFlags};
use nix::unistd::{self, Pid};

pub const SYNC_USERMAP_PLS: u32 = 0x40;
pub const SYNC_USERMAP_ACK: u32 = 0x41;
pub const SYNC_GRANDCHILD: u32 = 0x44;
pub const SYNC_CHILD_FINISH: u32 = 0x45;

/// One endpoint of a sync socketpair.
pub struct SyncSocket {
    fd: RawFd,
}

pub fn sync_socketpair() -> Result<(SyncSocket, SyncSocket)> {
    let (first, second) = socket::socketpair(
        socket::AddressFamily::Unix,
        socket::SockType::SeqPacket,
        None,
        socket::SockFlag::SOCK_CLOEXEC,
    )
    .context("failed to create sync socketpair")?;

    Ok((SyncSocket { fd: first }, SyncSocket { fd: second }))
}

impl SyncSocket {
    pub fn write_token(&mut self, token: u32) -> Result<()> {
        write_u32(self.fd, token)
    }

    /// Reads exactly one token and fails on anything but the expected one.
    pub fn wait_for_token(&mut self, expected: u32) -> Result<()> {
        let token = read_u32(self.fd)?;
        if token != expected {
            bail!(
                "unexpected sync token {:#x}, expected {:#x}",
                token,
                expected
            );
        }

        Ok(())
    }

    pub fn write_pid(&mut self, pid: Pid) -> Result<()> {
        write_u32(self.fd, pid.as_raw() as u32)
    }

    pub fn read_pid(&mut self) -> Result<Pid> {
        Ok(Pid::from_raw(read_u32(self.fd)? as i32))
    }

    pub fn close(&self) -> Result<()> {
        unistd::close(self.fd)?;

        Ok(())
    }
}

fn write_u32(fd: RawFd, value: u32) -> Result<()> {
    let buf = value.to_le_bytes();
    let written = socket::send(fd, &buf, MsgFlags::empty())
        .context("failed to write to the sync socket")?;
    if written != buf.len() {
        bail!("short write on the sync socket");
    }

    Ok(())
}

fn read_u32(fd: RawFd) -> Result<u32> {
    let mut buf = [0u8; 4];
    let read =
        socket::recv(fd, &mut buf, MsgFlags::empty()).context("failed to read the sync socket")?;
    if read != buf.len() {
        bail!("short read on the sync socket, peer likely died");
    }

    Ok(u32::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::wait;
    use nix::unistd;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_token_round_trip() -> Result<()> {
        let (mut parent, mut child) = sync_socketpair()?;
        match unsafe { unistd::fork()? } {
            unistd::ForkResult::Parent { child: pid } => {
                parent.wait_for_token(SYNC_USERMAP_PLS)?;
                let reported = parent.read_pid()?;
                assert_eq!(reported, pid);
                parent.write_token(SYNC_USERMAP_ACK)?;
                wait::waitpid(pid, None)?;
            }
            unistd::ForkResult::Child => {
                child.write_token(SYNC_USERMAP_PLS).unwrap();
                child.write_pid(unistd::getpid()).unwrap();
                child.wait_for_token(SYNC_USERMAP_ACK).unwrap();
                std::process::exit(0);
            }
        }

        Ok(())
    }

    #[test]
    #[serial]
    fn test_unexpected_token_fails() -> Result<()> {
        let (mut parent, mut child) = sync_socketpair()?;
        match unsafe { unistd::fork()? } {
            unistd::ForkResult::Parent { child: pid } => {
                assert!(parent.wait_for_token(SYNC_GRANDCHILD).is_err());
                wait::waitpid(pid, None)?;
            }
            unistd::ForkResult::Child => {
                child.write_token(SYNC_CHILD_FINISH).unwrap();
                std::process::exit(0);
            }
        }

        Ok(())
    }

    #[test]
    #[serial]
    fn test_peer_death_is_short_read() -> Result<()> {
        let (mut parent, mut child) = sync_socketpair()?;
        match unsafe { unistd::fork()? } {
            unistd::ForkResult::Parent { child: pid } => {
                // fork duplicated both endpoints, drop the child one here so
                // the child observes EOF once this process closes its end
                child.close()?;
                parent.close()?;
                wait::waitpid(pid, None)?;
            }
            unistd::ForkResult::Child => {
                parent.close().unwrap();
                assert!(child.wait_for_token(SYNC_GRANDCHILD).is_err());
                std::process::exit(0);
            }
        }

        Ok(())
    }
}
