//! Namespaces provide isolation of resources for processes at a kernel
//! level. The user namespace is unshared first (it needs the ID-mapping
//! handshake), the PID namespace last (it only affects children created
//! after the unshare), and the rest in a fixed order in between.
use std::collections;

use anyhow::{Context, Result};
use nix::sched::CloneFlags;

use crate::spec::{LinuxNamespace, LinuxNamespaceType};
use crate::syscall::{syscall::create_syscall, Syscall};

static ORDERED_NAMESPACES: &[CloneFlags] = &[
    CloneFlags::CLONE_NEWUSER,
    CloneFlags::CLONE_NEWNS,
    CloneFlags::CLONE_NEWNET,
    CloneFlags::CLONE_NEWUTS,
    CloneFlags::CLONE_NEWIPC,
    CloneFlags::CLONE_NEWCGROUP,
    CloneFlags::CLONE_NEWPID,
];

/// Holds information about the requested namespaces
pub struct Namespaces {
    command: Box<dyn Syscall>,
    namespace_map: collections::HashMap<CloneFlags, LinuxNamespace>,
}

pub fn get_clone_flag(namespace_type: LinuxNamespaceType) -> CloneFlags {
    match namespace_type {
        LinuxNamespaceType::User => CloneFlags::CLONE_NEWUSER,
        LinuxNamespaceType::Pid => CloneFlags::CLONE_NEWPID,
        LinuxNamespaceType::Uts => CloneFlags::CLONE_NEWUTS,
        LinuxNamespaceType::Ipc => CloneFlags::CLONE_NEWIPC,
        LinuxNamespaceType::Network => CloneFlags::CLONE_NEWNET,
        LinuxNamespaceType::Cgroup => CloneFlags::CLONE_NEWCGROUP,
        LinuxNamespaceType::Mount => CloneFlags::CLONE_NEWNS,
    }
}

impl From<Option<&Vec<LinuxNamespace>>> for Namespaces {
    fn from(namespaces: Option<&Vec<LinuxNamespace>>) -> Self {
        let command: Box<dyn Syscall> = create_syscall();
        let namespace_map: collections::HashMap<CloneFlags, LinuxNamespace> = namespaces
            .unwrap_or(&vec![])
            .iter()
            .map(|ns| (get_clone_flag(ns.typ), *ns))
            .collect();

        Namespaces {
            command,
            namespace_map,
        }
    }
}

impl Namespaces {
    /// Unshare every requested namespace accepted by the filter, in the
    /// fixed order.
    pub fn apply_namespaces<F: Fn(CloneFlags) -> bool>(&self, filter: F) -> Result<()> {
        let to_enter: Vec<&CloneFlags> = ORDERED_NAMESPACES
            .iter()
            .filter(|c| filter(**c))
            .filter(|c| self.namespace_map.contains_key(c))
            .collect();

        for ns_type in to_enter {
            self.unshare(*ns_type)
                .with_context(|| format!("failed to unshare {ns_type:?} namespace"))?;
        }
        Ok(())
    }

    pub fn unshare(&self, flag: CloneFlags) -> Result<()> {
        log::debug!("unshare namespace: {:?}", flag);
        self.command.unshare(flag)?;

        Ok(())
    }

    pub fn get(&self, k: LinuxNamespaceType) -> Option<&LinuxNamespace> {
        self.namespace_map.get(&get_clone_flag(k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syscall::test::TestHelperSyscall;

    fn gen_sample_linux_namespaces() -> Vec<LinuxNamespace> {
        [
            LinuxNamespaceType::Pid,
            LinuxNamespaceType::Mount,
            LinuxNamespaceType::Ipc,
            LinuxNamespaceType::Uts,
            LinuxNamespaceType::Network,
        ]
        .iter()
        .map(|typ| LinuxNamespace { typ: *typ })
        .collect()
    }

    #[test]
    fn test_apply_namespaces_in_order() {
        let sample_linux_namespaces = gen_sample_linux_namespaces();
        let namespaces = Namespaces::from(Some(&sample_linux_namespaces));
        assert!(namespaces
            .apply_namespaces(|ns_type| ns_type != CloneFlags::CLONE_NEWUSER)
            .is_ok());

        let test_command: &TestHelperSyscall = namespaces.command.as_any().downcast_ref().unwrap();
        let unshare_args = test_command.get_unshare_args();
        assert_eq!(
            unshare_args,
            vec![
                CloneFlags::CLONE_NEWNS,
                CloneFlags::CLONE_NEWNET,
                CloneFlags::CLONE_NEWUTS,
                CloneFlags::CLONE_NEWIPC,
                CloneFlags::CLONE_NEWPID,
            ]
        );
    }

    #[test]
    fn test_apply_namespaces_filter() {
        let sample_linux_namespaces = gen_sample_linux_namespaces();
        let namespaces = Namespaces::from(Some(&sample_linux_namespaces));
        assert!(namespaces
            .apply_namespaces(|ns_type| {
                ns_type != CloneFlags::CLONE_NEWUSER && ns_type != CloneFlags::CLONE_NEWPID
            })
            .is_ok());

        let test_command: &TestHelperSyscall = namespaces.command.as_any().downcast_ref().unwrap();
        let unshare_args = test_command.get_unshare_args();
        assert!(!unshare_args.contains(&CloneFlags::CLONE_NEWPID));
        assert_eq!(unshare_args.len(), 4);
    }

    #[test]
    fn test_get() {
        let sample_linux_namespaces = gen_sample_linux_namespaces();
        let namespaces = Namespaces::from(Some(&sample_linux_namespaces));
        assert!(namespaces.get(LinuxNamespaceType::Pid).is_some());
        assert!(namespaces.get(LinuxNamespaceType::User).is_none());
    }
}
