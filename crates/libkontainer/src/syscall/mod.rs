//! Contains a wrapper trait over the syscalls needed for container
//! management. This provides a uniform interface for the rest of kontainer
//! and allows unit tests to record syscalls instead of executing them.
pub mod linux;
#[allow(clippy::module_inception)]
pub mod syscall;

pub use syscall::Syscall;
