//! Translates the seccomp section of the spec into a loaded BPF filter via
//! libseccomp.
use anyhow::{bail, Context, Result};
use libseccomp::{
    ScmpAction, ScmpArch, ScmpArgCompare, ScmpCompareOp, ScmpFilterContext, ScmpSyscall,
};
use std::os::unix::prelude::RawFd;

use crate::spec::{
    Arch, LinuxSeccomp, LinuxSeccompAction, LinuxSeccompArg, LinuxSeccompOperator,
};

fn translate_action(action: LinuxSeccompAction, errno: Option<u32>) -> ScmpAction {
    let errno = errno.unwrap_or(libc::EPERM as u32);
    match action {
        LinuxSeccompAction::ScmpActKill => ScmpAction::KillThread,
        LinuxSeccompAction::ScmpActKillThread => ScmpAction::KillThread,
        LinuxSeccompAction::ScmpActKillProcess => ScmpAction::KillProcess,
        LinuxSeccompAction::ScmpActTrap => ScmpAction::Trap,
        LinuxSeccompAction::ScmpActErrno => ScmpAction::Errno(errno as i32),
        LinuxSeccompAction::ScmpActTrace => ScmpAction::Trace(errno as u16),
        LinuxSeccompAction::ScmpActAllow => ScmpAction::Allow,
        LinuxSeccompAction::ScmpActLog => ScmpAction::Log,
        LinuxSeccompAction::ScmpActNotify => ScmpAction::Notify,
    }
}

fn translate_op(op: LinuxSeccompOperator) -> ScmpCompareOp {
    match op {
        LinuxSeccompOperator::ScmpCmpNe => ScmpCompareOp::NotEqual,
        LinuxSeccompOperator::ScmpCmpLt => ScmpCompareOp::Less,
        LinuxSeccompOperator::ScmpCmpLe => ScmpCompareOp::LessOrEqual,
        LinuxSeccompOperator::ScmpCmpEq => ScmpCompareOp::Equal,
        LinuxSeccompOperator::ScmpCmpGe => ScmpCompareOp::GreaterEqual,
        LinuxSeccompOperator::ScmpCmpGt => ScmpCompareOp::Greater,
        // handled separately, the mask is part of the operator
        LinuxSeccompOperator::ScmpCmpMaskedEq => ScmpCompareOp::MaskedEqual(0),
    }
}

fn translate_arch(arch: Arch) -> ScmpArch {
    match arch {
        Arch::ScmpArchNative => ScmpArch::Native,
        Arch::ScmpArchX86 => ScmpArch::X86,
        Arch::ScmpArchX86_64 => ScmpArch::X8664,
        Arch::ScmpArchX32 => ScmpArch::X32,
        Arch::ScmpArchArm => ScmpArch::Arm,
        Arch::ScmpArchAarch64 => ScmpArch::Aarch64,
        Arch::ScmpArchMips => ScmpArch::Mips,
        Arch::ScmpArchMips64 => ScmpArch::Mips64,
        Arch::ScmpArchMips64n32 => ScmpArch::Mips64N32,
        Arch::ScmpArchMipsel => ScmpArch::Mipsel,
        Arch::ScmpArchMipsel64 => ScmpArch::Mipsel64,
        Arch::ScmpArchMipsel64n32 => ScmpArch::Mipsel64N32,
        Arch::ScmpArchPpc => ScmpArch::Ppc,
        Arch::ScmpArchPpc64 => ScmpArch::Ppc64,
        Arch::ScmpArchPpc64le => ScmpArch::Ppc64Le,
        Arch::ScmpArchS390 => ScmpArch::S390,
        Arch::ScmpArchS390x => ScmpArch::S390X,
    }
}

// libseccomp takes the datum for MASKED_EQ as (arg & mask) == datum, where
// the OCI `value` carries the mask and `valueTwo` the datum.
fn translate_compare(arg: &LinuxSeccompArg) -> ScmpArgCompare {
    match arg.op {
        LinuxSeccompOperator::ScmpCmpMaskedEq => ScmpArgCompare::new(
            arg.index as u32,
            ScmpCompareOp::MaskedEqual(arg.value),
            arg.value_two.unwrap_or(0),
        ),
        op => ScmpArgCompare::new(arg.index as u32, translate_op(op), arg.value),
    }
}

fn check_seccomp(seccomp: &LinuxSeccomp) -> Result<()> {
    // We don't support notify as default action. After the seccomp filter
    // is created with notify, the container process will have to
    // communicate the returned fd to another process. Therefore, we need
    // the write syscall or otherwise the write syscall will be blocked by
    // the seccomp filter causing the container process to hang. `runc`
    // also disallows notify as default action.
    // Note: read and close syscall are also used, because if we can
    // successfully write the fd to another process, the other process can
    // choose to handle read/close syscall and allow read and close to
    // proceed as expected.
    if seccomp.default_action == LinuxSeccompAction::ScmpActNotify {
        bail!("SCMP_ACT_NOTIFY cannot be used as default action");
    }

    for syscall in seccomp.syscalls.iter().flatten() {
        if syscall.action == LinuxSeccompAction::ScmpActNotify {
            for name in &syscall.names {
                if name == "write" {
                    bail!("SCMP_ACT_NOTIFY cannot be used for the write syscall");
                }
            }
        }
    }

    Ok(())
}

pub fn initialize_seccomp(seccomp: &LinuxSeccomp) -> Result<Option<RawFd>> {
    check_seccomp(seccomp)?;

    let default_action = translate_action(seccomp.default_action, None);
    let mut ctx = ScmpFilterContext::new_filter(default_action)
        .context("failed to create seccomp filter context")?;

    for &arch in seccomp.architectures.iter().flatten() {
        ctx.add_arch(translate_arch(arch))
            .context("failed to add arch to seccomp")?;
    }

    // The SCMP_FLTATR_CTL_NNP attribute controls whether loading the filter
    // sets the no-new-privileges bit automatically via prctl. Based on the
    // spec, no_new_privileges is only set when the process section asks for
    // it, so the automatic behavior is disabled here. If the load operation
    // then fails without enough privilege, so be it.
    ctx.set_ctl_nnp(false)
        .context("failed to unset the no new privileges bit for seccomp")?;

    for syscall in seccomp.syscalls.iter().flatten() {
        let action = translate_action(syscall.action, syscall.errno_ret);
        if action == default_action {
            // When the action is the same as the default action, the rule
            // is redundant and libseccomp rejects it.
            log::warn!(
                "detected a seccomp action that is the same as the default action: {:?}",
                syscall
            );
            continue;
        }

        for name in &syscall.names {
            let sc = match ScmpSyscall::from_name(name) {
                Ok(x) => x,
                Err(_) => {
                    // If we failed to resolve the syscall by name, likely
                    // the kernel doesn't support it, so it is safe to skip.
                    log::warn!(
                        "failed to resolve syscall {:?}, likely kernel doesn't support it",
                        name
                    );
                    continue;
                }
            };
            // Multiple args attached to one syscall rule have to be added
            // as one rule per comparator, add_rule returns EINVAL
            // otherwise. runc does the same without an explanation.
            match syscall.args.as_ref() {
                Some(args) if !args.is_empty() => {
                    for arg in args {
                        let comparators = [translate_compare(arg)];
                        ctx.add_rule_conditional(action, sc, &comparators)
                            .with_context(|| {
                                format!("failed to add conditional seccomp rule for {name:?}")
                            })?;
                    }
                }
                _ => {
                    ctx.add_rule(action, sc)
                        .with_context(|| format!("failed to add seccomp rule for {name:?}"))?;
                }
            }
        }
    }

    // In order to use the SECCOMP_SET_MODE_FILTER operation, either the
    // calling thread must have the CAP_SYS_ADMIN capability in its user
    // namespace, or the thread must already have the no_new_privs bit set.
    // Ref: https://man7.org/linux/man-pages/man2/seccomp.2.html
    ctx.load().context("failed to load seccomp context")?;

    let fd = if is_notify(seccomp) {
        Some(
            ctx.get_notify_fd()
                .context("failed to get seccomp notify fd")?,
        )
    } else {
        None
    };

    Ok(fd)
}

pub fn is_notify(seccomp: &LinuxSeccomp) -> bool {
    seccomp
        .syscalls
        .iter()
        .flatten()
        .any(|syscall| syscall.action == LinuxSeccompAction::ScmpActNotify)
}
