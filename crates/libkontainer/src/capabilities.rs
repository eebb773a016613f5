//! Handles management of the five Linux capability sets
use anyhow::{Context, Result};
use caps::{Capability, CapSet, CapsHashSet};

use crate::spec::LinuxCapabilities;
use crate::syscall::Syscall;

fn to_set(caps: &[Capability]) -> CapsHashSet {
    caps.iter().copied().collect()
}

/// Reset the effective capabilities of the calling process to its permitted
/// set. The effective set is what the kernel actually checks, see
/// capabilities(7).
pub fn reset_effective<S: Syscall + ?Sized>(syscall: &S) -> Result<()> {
    log::debug!("reset all caps");
    let permitted = caps::read(None, CapSet::Permitted)?;
    syscall.set_capability(CapSet::Effective, &permitted)?;
    Ok(())
}

/// Drop every bounding-set capability not listed in the spec. Must run
/// while the process is still effective root inside the user namespace,
/// before the uid transition.
pub fn drop_bounding<S: Syscall + ?Sized>(cs: &LinuxCapabilities, syscall: &S) -> Result<()> {
    if let Some(bounding) = cs.bounding.as_ref() {
        log::debug!("dropping bounding capabilities to {:?}", bounding);
        syscall
            .set_capability(CapSet::Bounding, &to_set(bounding))
            .context("failed to drop bounding capabilities")?;
    }

    Ok(())
}

/// Install the effective, permitted and inheritable sets, then clear the
/// ambient set and raise each requested ambient capability. Runs after the
/// uid transition, relying on PR_SET_KEEPCAPS having preserved the
/// permitted set.
pub fn apply<S: Syscall + ?Sized>(cs: &LinuxCapabilities, syscall: &S) -> Result<()> {
    if let Some(effective) = cs.effective.as_ref() {
        syscall
            .set_capability(CapSet::Effective, &to_set(effective))
            .context("failed to set effective capabilities")?;
    }

    if let Some(permitted) = cs.permitted.as_ref() {
        syscall
            .set_capability(CapSet::Permitted, &to_set(permitted))
            .context("failed to set permitted capabilities")?;
    }

    if let Some(inheritable) = cs.inheritable.as_ref() {
        syscall
            .set_capability(CapSet::Inheritable, &to_set(inheritable))
            .context("failed to set inheritable capabilities")?;
    }

    caps::clear(None, CapSet::Ambient).context("failed to clear ambient capabilities")?;
    if let Some(ambient) = cs.ambient.as_ref() {
        for cap in ambient {
            // ambient capabilities might not be available on every kernel
            if let Err(e) = caps::raise(None, CapSet::Ambient, *cap) {
                log::error!("failed to raise ambient capability {:?}: {}", cap, e);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syscall::test::TestHelperSyscall;

    #[test]
    fn test_reset_effective() {
        let test_command = TestHelperSyscall::default();
        let permitted_caps = caps::read(None, CapSet::Permitted).unwrap();
        assert!(reset_effective(&test_command).is_ok());
        let set_capability_args: Vec<_> = test_command
            .get_set_capability_args()
            .into_iter()
            .map(|(_capset, caps)| caps)
            .collect();
        assert_eq!(set_capability_args, vec![permitted_caps]);
    }

    #[test]
    fn test_drop_bounding_records_bounding_set() {
        let test_command = TestHelperSyscall::default();
        let cs = LinuxCapabilities {
            bounding: Some(vec![Capability::CAP_KILL, Capability::CAP_CHOWN]),
            ..LinuxCapabilities::default()
        };

        drop_bounding(&cs, &test_command).unwrap();

        let got = test_command.get_set_capability_args();
        assert_eq!(got.len(), 1);
        assert!(matches!(got[0].0, CapSet::Bounding));
        assert_eq!(
            got[0].1,
            vec![Capability::CAP_KILL, Capability::CAP_CHOWN]
                .into_iter()
                .collect::<CapsHashSet>()
        );
    }

    #[test]
    fn test_apply_sets_remaining_sets() {
        let test_command = TestHelperSyscall::default();
        let cs = LinuxCapabilities::default();

        apply(&cs, &test_command).unwrap();

        let capsets: Vec<CapSet> = test_command
            .get_set_capability_args()
            .into_iter()
            .map(|(capset, _)| capset)
            .collect();
        assert_eq!(capsets.len(), 3);
        assert!(matches!(capsets[0], CapSet::Effective));
        assert!(matches!(capsets[1], CapSet::Permitted));
        assert!(matches!(capsets[2], CapSet::Inheritable));
    }
}
