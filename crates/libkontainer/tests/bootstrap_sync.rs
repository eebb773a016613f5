//! Exercises the cross-process synchronization protocol of the bootstrap
//! pipeline with real processes but without creating namespaces: a fake
//! intermediate process walks the user-map handshake and the grandchild
//! session handshake against this process, in the same order the real
//! stages do.
use anyhow::Result;
use libkontainer::process::channel;
use libkontainer::process::sync::{
    sync_socketpair, SYNC_CHILD_FINISH, SYNC_GRANDCHILD, SYNC_USERMAP_ACK, SYNC_USERMAP_PLS,
};
use nix::sys::wait::waitpid;
use nix::unistd::{self, ForkResult};
use serial_test::serial;

#[test]
#[serial]
fn bootstrap_sync_protocol_round_trip() -> Result<()> {
    let (main_sender, main_receiver) = &mut channel::main_channel()?;
    let (usermap_main, usermap_inter) = &mut sync_socketpair()?;

    match unsafe { unistd::fork()? } {
        ForkResult::Parent { child } => {
            // the main-process view: user-map request, ack, then the two
            // ready messages in order
            usermap_main.wait_for_token(SYNC_USERMAP_PLS)?;
            let reported = usermap_main.read_pid()?;
            assert_eq!(reported, child);
            usermap_main.write_token(SYNC_USERMAP_ACK)?;

            let init_pid = main_receiver.wait_for_intermediate_ready()?;
            assert!(init_pid.as_raw() > 0);
            assert_ne!(init_pid, child);

            main_receiver.wait_for_init_ready()?;

            waitpid(child, None)?;
            Ok(())
        }
        ForkResult::Child => {
            let mut run = || -> Result<()> {
                // the intermediate-process view
                usermap_inter.write_token(SYNC_USERMAP_PLS)?;
                usermap_inter.write_pid(unistd::getpid())?;
                usermap_inter.wait_for_token(SYNC_USERMAP_ACK)?;

                let (grand_inter, grand_init) = &mut sync_socketpair()?;
                match unsafe { unistd::fork()? } {
                    ForkResult::Parent { child: init_pid } => {
                        main_sender.intermediate_ready(init_pid)?;
                        grand_inter.write_token(SYNC_GRANDCHILD)?;
                        grand_inter.wait_for_token(SYNC_CHILD_FINISH)?;
                        Ok(())
                    }
                    ForkResult::Child => {
                        // the init-process view: session setup between the
                        // grandchild tokens, then init ready
                        grand_init.wait_for_token(SYNC_GRANDCHILD)?;
                        unistd::setsid()?;
                        grand_init.write_token(SYNC_CHILD_FINISH)?;
                        main_sender.init_ready()?;
                        std::process::exit(0);
                    }
                }
            };
            std::process::exit(if run().is_ok() { 0 } else { 1 });
        }
    }
}

#[test]
#[serial]
fn intermediate_failure_aborts_main_wait() -> Result<()> {
    let (main_sender, main_receiver) = &mut channel::main_channel()?;

    match unsafe { unistd::fork()? } {
        ForkResult::Parent { child } => {
            waitpid(child, None)?;
            let err = main_receiver.wait_for_intermediate_ready().unwrap_err();
            assert!(err.to_string().contains("unshare failed"));
            Ok(())
        }
        ForkResult::Child => {
            let ok = main_sender.other_error("unshare failed".to_string()).is_ok();
            std::process::exit(if ok { 0 } else { 1 });
        }
    }
}
