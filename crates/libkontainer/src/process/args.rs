use std::path::PathBuf;

use crate::container::Container;
use crate::notify_socket::NotifyListener;
use crate::spec::Spec;
use crate::syscall::Syscall;
use crate::user_ns::UserNamespaceConfig;

pub struct ContainerArgs<'a> {
    /// Interface to operating system primitives
    pub syscall: &'a dyn Syscall,
    /// OCI compliant runtime spec
    pub spec: &'a Spec,
    /// Root filesystem of the container
    pub rootfs: &'a PathBuf,
    /// The Unix Domain Socket to communicate container start
    pub notify_listener: NotifyListener,
    /// File descriptors preserved/passed to the container init process.
    pub preserve_fds: i32,
    /// Container state
    pub container: &'a Option<Container>,
    /// Options for the new user namespace, None when the spec requests no
    /// user namespace
    pub user_ns_config: &'a Option<UserNamespaceConfig>,
}
