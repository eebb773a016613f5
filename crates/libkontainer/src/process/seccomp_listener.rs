//! Forwards the seccomp notify fd to the listener named in the spec. The
//! wire format is one line of JSON carrying the container state, then a
//! single dummy byte with the fd attached as SCM_RIGHTS.
use std::io::IoSlice;
use std::os::unix::prelude::RawFd;
use std::path::Path;

use anyhow::{Context, Result};
use nix::sys::socket::{self, UnixAddr};
use nix::unistd;

use crate::container::State;
use crate::process::channel;
use crate::seccomp;
use crate::spec::LinuxSeccomp;

pub fn sync_seccomp(
    seccomp: &LinuxSeccomp,
    state: &State,
    init_sender: &mut channel::InitSender,
    main_receiver: &mut channel::MainReceiver,
) -> Result<()> {
    if seccomp::is_notify(seccomp) {
        log::debug!("main process waiting for sync seccomp");
        let seccomp_fd = main_receiver.wait_for_seccomp_request()?;
        let listener_path = seccomp
            .listener_path
            .as_ref()
            .context("notify requires the seccomp listener path to be set")?;
        let encoded_state = serde_json::to_vec(state).context("failed to encode state")?;
        send_to_listener(listener_path, &encoded_state, seccomp_fd)
            .context("failed to send msg to seccomp listener")?;
        init_sender.seccomp_notify_done()?;
        // Once the notify fd reached the listener, our copy can go. The
        // SCM_RIGHTS message duplicated the fd into the receiving process.
        let _ = unistd::close(seccomp_fd);
    }

    Ok(())
}

fn send_to_listener(listener_path: &Path, state: &[u8], fd: RawFd) -> Result<()> {
    let socket = socket::socket(
        socket::AddressFamily::Unix,
        socket::SockType::Stream,
        socket::SockFlag::empty(),
        None,
    )
    .context("failed to create unix domain socket for seccomp listener")?;
    let unix_addr = UnixAddr::new(listener_path).context("failed to create unix addr")?;
    socket::connect(socket, &unix_addr).with_context(|| {
        format!("failed to connect to seccomp notify listener path {listener_path:?}")
    })?;

    // the state first, as one newline-terminated JSON line
    let mut line = state.to_vec();
    line.push(b'\n');
    write_all(socket, &line)?;

    // then the notify fd, riding on a single dummy byte
    let iov = [IoSlice::new(&[0u8])];
    let fds = [fd];
    let cmsgs = socket::ControlMessage::ScmRights(&fds);
    socket::sendmsg::<UnixAddr>(socket, &iov, &[cmsgs], socket::MsgFlags::empty(), None)
        .context("failed to send seccomp notify fd to listener")?;
    let _ = unistd::close(socket);

    Ok(())
}

fn write_all(fd: RawFd, mut buf: &[u8]) -> Result<()> {
    while !buf.is_empty() {
        let written = unistd::write(fd, buf).context("failed to write to seccomp listener")?;
        buf = &buf[written..];
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{LinuxSeccompAction, LinuxSyscall};
    use serial_test::serial;
    use std::io::Read;
    use std::os::unix::io::IntoRawFd;
    use std::os::unix::net::UnixListener;
    use std::thread;

    #[test]
    #[serial]
    fn test_sync_seccomp_forwards_state_and_fd() -> Result<()> {
        let tmp_dir = tempfile::tempdir()?;
        let scmp_file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .open(tmp_dir.path().join("scmp_file"))?;

        let socket_path = tmp_dir.path().join("socket_file.sock");
        let listener = UnixListener::bind(&socket_path)?;

        let (mut main_sender, mut main_receiver) = channel::main_channel()?;
        let (mut init_sender, mut init_receiver) = channel::init_channel()?;

        let state = State::default();
        let want = serde_json::to_string(&state)?;
        let seccomp = LinuxSeccomp {
            default_action: LinuxSeccompAction::ScmpActAllow,
            architectures: None,
            syscalls: Some(vec![LinuxSyscall {
                names: vec!["mkdir".to_string()],
                action: LinuxSeccompAction::ScmpActNotify,
                errno_ret: None,
                args: None,
            }]),
            listener_path: Some(socket_path.clone()),
        };

        let th = thread::spawn(move || {
            sync_seccomp(&seccomp, &state, &mut init_sender, &mut main_receiver).unwrap();
        });

        let fd = scmp_file.into_raw_fd();
        assert!(main_sender.seccomp_notify_request(fd).is_ok());

        let (mut socket, _) = listener.accept()?;
        let mut got = String::new();
        socket.read_to_string(&mut got)?;
        assert!(init_receiver.wait_for_seccomp_request_done().is_ok());

        assert_eq!(format!("{want}\n\0"), got);
        assert!(th.join().is_ok());
        Ok(())
    }
}
