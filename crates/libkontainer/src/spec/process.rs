use caps::Capability;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Process contains information to start a specific application inside the
/// container.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Process {
    /// User specifies user information for the process.
    #[serde(default)]
    pub user: User,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Args specifies the binary and arguments for the application to
    /// execute.
    pub args: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Env populates the process environment for the process.
    pub env: Option<Vec<String>>,

    /// Cwd is the current working directory for the process and must be
    /// relative to the container's root.
    #[serde(default = "default_cwd")]
    pub cwd: PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Capabilities are Linux capabilities that are kept for the process.
    pub capabilities: Option<LinuxCapabilities>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Rlimits specifies rlimit options to apply to the process.
    pub rlimits: Option<Vec<LinuxRlimit>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// NoNewPrivileges controls whether additional privileges could be
    /// gained by processes in the container.
    pub no_new_privileges: Option<bool>,
}

fn default_cwd() -> PathBuf {
    PathBuf::from("/")
}

impl Default for Process {
    fn default() -> Self {
        Process {
            user: Default::default(),
            args: Some(vec!["sh".to_string()]),
            env: Some(vec![
                "PATH=/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin".into(),
                "TERM=xterm".into(),
            ]),
            cwd: default_cwd(),
            capabilities: Some(Default::default()),
            rlimits: None,
            no_new_privileges: Some(true),
        }
    }
}

/// User specifies Linux specific user and group information for the
/// container's main process.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    /// UID is the user id inside the container's user namespace.
    pub uid: u32,

    #[serde(default)]
    /// GID is the group id inside the container's user namespace.
    pub gid: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// AdditionalGids are additional group ids set for the container's
    /// process.
    pub additional_gids: Option<Vec<u32>>,
}

/// LinuxCapabilities specifies the list of allowed capabilities that are
/// kept for the process. See capabilities(7) for the five sets.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinuxCapabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding: Option<Vec<Capability>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective: Option<Vec<Capability>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inheritable: Option<Vec<Capability>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permitted: Option<Vec<Capability>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ambient: Option<Vec<Capability>>,
}

// Default container capabilities, same set docker and runc grant.
impl Default for LinuxCapabilities {
    fn default() -> Self {
        let defaults = vec![
            Capability::CAP_AUDIT_WRITE,
            Capability::CAP_KILL,
            Capability::CAP_NET_BIND_SERVICE,
        ];
        LinuxCapabilities {
            bounding: defaults.clone().into(),
            effective: defaults.clone().into(),
            inheritable: defaults.clone().into(),
            permitted: defaults.clone().into(),
            ambient: defaults.into(),
        }
    }
}

/// Available rlimit types (see getrlimit(2)). The discriminants equal the
/// libc RLIMIT_* resource numbers so the enum can be passed to
/// setrlimit/prlimit directly.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinuxRlimitType {
    /// Limit in seconds of the amount of CPU time that the process can
    /// consume.
    RlimitCpu,

    /// Maximum size in bytes of the files that the process creates.
    RlimitFsize,

    /// Maximum size of the process's data segment in bytes.
    RlimitData,

    /// Maximum size of the process stack in bytes.
    RlimitStack,

    /// Maximum size of a core dump file in bytes.
    RlimitCore,

    /// Limit on the process's resident set in virtual pages.
    RlimitRss,

    /// Limit on number of threads for the real uid calling processes.
    RlimitNproc,

    /// One greater than the maximum number of file descriptors that one
    /// process may open.
    RlimitNofile,

    /// Maximum number of bytes of memory that may be locked into RAM.
    RlimitMemlock,

    /// Maximum size of the process's virtual memory in bytes.
    RlimitAs,

    /// Limit on the number of locks and leases for the process.
    RlimitLocks,

    /// Limit on number of signals that may be queued for the process.
    RlimitSigpending,

    /// Limit on the number of bytes that can be allocated for POSIX
    /// message queues.
    RlimitMsgqueue,

    /// Specifies a ceiling to which the process's nice value can be raised.
    RlimitNice,

    /// Specifies a ceiling on the real-time priority.
    RlimitRtprio,

    /// Limit on the amount of CPU time that a process scheduled under a
    /// real-time scheduling policy may consume without a blocking syscall.
    RlimitRttime,
}

/// LinuxRlimit specifies the soft and hard limit for a resource.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinuxRlimit {
    #[serde(rename = "type")]
    pub typ: LinuxRlimitType,

    #[serde(default)]
    /// Maximum allowed value for this resource.
    pub hard: u64,

    #[serde(default)]
    /// Value currently enforced for this resource.
    pub soft: u64,
}
