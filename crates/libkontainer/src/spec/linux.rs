use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Linux contains platform-specific configuration for Linux based
/// containers.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Linux {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// UIDMappings specifies user mappings for supporting user namespaces.
    pub uid_mappings: Option<Vec<LinuxIdMapping>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// GIDMappings specifies group mappings for supporting user namespaces.
    pub gid_mappings: Option<Vec<LinuxIdMapping>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Resources contain cgroup v2 resource restrictions.
    pub resources: Option<LinuxResources>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// CgroupsPath specifies the path to the cgroup relative to the cgroup
    /// v2 mount point. A fabricated path is used when absent.
    pub cgroups_path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Namespaces contains the namespaces that are created and joined by
    /// the container.
    pub namespaces: Option<Vec<LinuxNamespace>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Seccomp specifies the seccomp security settings for the container.
    pub seccomp: Option<LinuxSeccomp>,
}

/// LinuxIdMapping specifies UID/GID mappings.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct LinuxIdMapping {
    #[serde(default, rename = "containerID")]
    /// ContainerID is the starting UID/GID in the container.
    pub container_id: u32,

    #[serde(default, rename = "hostID")]
    /// HostID is the starting UID/GID on the host to be mapped to
    /// `container_id`.
    pub host_id: u32,

    #[serde(default)]
    /// Size is the number of IDs to be mapped.
    pub size: u32,
}

/// Available Linux namespaces.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinuxNamespaceType {
    /// Mount namespace, isolates the mount table.
    Mount,

    /// Cgroup namespace, virtualizes the view of the cgroup hierarchy.
    Cgroup,

    /// UTS namespace, isolates hostname and NIS domain name.
    Uts,

    /// IPC namespace, isolates System V IPC and POSIX message queues.
    Ipc,

    /// User namespace, isolates UIDs, GIDs and capabilities.
    User,

    /// PID namespace, isolates process IDs.
    Pid,

    /// Network namespace, isolates network devices, stacks and ports. Only
    /// the namespace is created, no interfaces are set up.
    Network,
}

/// LinuxNamespace is the configuration for a Linux namespace.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct LinuxNamespace {
    #[serde(rename = "type")]
    /// Type is the type of namespace to create.
    pub typ: LinuxNamespaceType,
}

/// LinuxResources is the subset of cgroup v2 resource restrictions applied
/// by the runtime.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinuxResources {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Memory restriction configuration.
    pub memory: Option<LinuxMemory>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// CPU resource restriction configuration.
    pub cpu: Option<LinuxCpu>,
}

/// LinuxMemory for Linux cgroup v2 memory resource management. A value of
/// -1 means "max".
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinuxMemory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Memory limit in bytes, written to memory.max.
    pub limit: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Memory reservation in bytes, written to memory.low.
    pub reservation: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Total memory plus swap limit in bytes, converted to the independent
    /// v2 memory.swap.max value.
    pub swap: Option<i64>,
}

/// LinuxCpu for Linux cgroup v2 cpu resource management.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinuxCpu {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// CPU shares (relative weight in the v1 sense, converted to
    /// cpu.weight).
    pub shares: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// CPU hardcap limit in usecs per period.
    pub quota: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// CPU period to be used for hardcapping in usecs.
    pub period: Option<u64>,
}

/// LinuxSeccomp represents syscall restrictions.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinuxSeccomp {
    pub default_action: LinuxSeccompAction,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architectures: Option<Vec<Arch>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syscalls: Option<Vec<LinuxSyscall>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Path of the AF_UNIX listener that receives the seccomp notify fd.
    pub listener_path: Option<PathBuf>,
}

/// Available seccomp actions.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum LinuxSeccompAction {
    #[serde(rename = "SCMP_ACT_KILL")]
    ScmpActKill,

    #[serde(rename = "SCMP_ACT_KILL_THREAD")]
    ScmpActKillThread,

    #[serde(rename = "SCMP_ACT_KILL_PROCESS")]
    ScmpActKillProcess,

    #[serde(rename = "SCMP_ACT_TRAP")]
    ScmpActTrap,

    #[serde(rename = "SCMP_ACT_ERRNO")]
    ScmpActErrno,

    #[serde(rename = "SCMP_ACT_TRACE")]
    ScmpActTrace,

    #[serde(rename = "SCMP_ACT_ALLOW")]
    ScmpActAllow,

    #[serde(rename = "SCMP_ACT_LOG")]
    ScmpActLog,

    #[serde(rename = "SCMP_ACT_NOTIFY")]
    ScmpActNotify,
}

/// Available seccomp architectures.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Arch {
    #[serde(rename = "SCMP_ARCH_NATIVE")]
    ScmpArchNative,

    #[serde(rename = "SCMP_ARCH_X86")]
    ScmpArchX86,

    #[serde(rename = "SCMP_ARCH_X86_64")]
    ScmpArchX86_64,

    #[serde(rename = "SCMP_ARCH_X32")]
    ScmpArchX32,

    #[serde(rename = "SCMP_ARCH_ARM")]
    ScmpArchArm,

    #[serde(rename = "SCMP_ARCH_AARCH64")]
    ScmpArchAarch64,

    #[serde(rename = "SCMP_ARCH_MIPS")]
    ScmpArchMips,

    #[serde(rename = "SCMP_ARCH_MIPS64")]
    ScmpArchMips64,

    #[serde(rename = "SCMP_ARCH_MIPS64N32")]
    ScmpArchMips64n32,

    #[serde(rename = "SCMP_ARCH_MIPSEL")]
    ScmpArchMipsel,

    #[serde(rename = "SCMP_ARCH_MIPSEL64")]
    ScmpArchMipsel64,

    #[serde(rename = "SCMP_ARCH_MIPSEL64N32")]
    ScmpArchMipsel64n32,

    #[serde(rename = "SCMP_ARCH_PPC")]
    ScmpArchPpc,

    #[serde(rename = "SCMP_ARCH_PPC64")]
    ScmpArchPpc64,

    #[serde(rename = "SCMP_ARCH_PPC64LE")]
    ScmpArchPpc64le,

    #[serde(rename = "SCMP_ARCH_S390")]
    ScmpArchS390,

    #[serde(rename = "SCMP_ARCH_S390X")]
    ScmpArchS390x,
}

/// Available seccomp comparison operators.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum LinuxSeccompOperator {
    #[serde(rename = "SCMP_CMP_NE")]
    ScmpCmpNe,

    #[serde(rename = "SCMP_CMP_LT")]
    ScmpCmpLt,

    #[serde(rename = "SCMP_CMP_LE")]
    ScmpCmpLe,

    #[serde(rename = "SCMP_CMP_EQ")]
    ScmpCmpEq,

    #[serde(rename = "SCMP_CMP_GE")]
    ScmpCmpGe,

    #[serde(rename = "SCMP_CMP_GT")]
    ScmpCmpGt,

    #[serde(rename = "SCMP_CMP_MASKED_EQ")]
    ScmpCmpMaskedEq,
}

/// LinuxSyscall is used to match syscalls in seccomp.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinuxSyscall {
    pub names: Vec<String>,

    pub action: LinuxSeccompAction,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Errno returned by SCMP_ACT_ERRNO and SCMP_ACT_TRACE, EPERM if
    /// absent.
    pub errno_ret: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<LinuxSeccompArg>>,
}

/// LinuxSeccompArg matches a single syscall argument in seccomp.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinuxSeccompArg {
    pub index: usize,

    pub value: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_two: Option<u64>,

    pub op: LinuxSeccompOperator,
}
