use std::path::PathBuf;

use crate::syscall::Syscall;

use super::init_builder::InitContainerBuilder;

/// Base configuration for a new container from which the init builder can
/// be chained
pub struct ContainerBuilder<'a> {
    /// Id of the container
    pub(super) container_id: String,
    /// Root directory where the container state is stored
    pub(super) root_path: PathBuf,
    /// Interface to operating system primitives
    pub(super) syscall: &'a dyn Syscall,
    /// File to write the pid of the created container process to
    pub(super) pid_file: Option<PathBuf>,
    /// Number of extra file descriptors past stdio to keep open for the
    /// container process
    pub(super) preserve_fds: i32,
}

impl<'a> ContainerBuilder<'a> {
    pub fn new(container_id: String, syscall: &'a dyn Syscall) -> Self {
        let root_path = PathBuf::from("/run/kontainer");

        Self {
            container_id,
            root_path,
            syscall,
            pid_file: None,
            preserve_fds: 0,
        }
    }

    pub fn with_root_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.root_path = path.into();
        self
    }

    pub fn with_pid_file<P: Into<PathBuf>>(mut self, path: Option<P>) -> Self {
        self.pid_file = path.map(|p| p.into());
        self
    }

    pub fn with_preserved_fds(mut self, preserved_fds: i32) -> Self {
        self.preserve_fds = preserved_fds;
        self
    }

    /// Transforms the builder into one for an init container with the
    /// given bundle directory
    pub fn as_init<P: Into<PathBuf>>(self, bundle: P) -> InitContainerBuilder<'a> {
        InitContainerBuilder::new(self, bundle.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syscall::syscall::create_syscall;

    #[test]
    fn test_builder_defaults() {
        let syscall = create_syscall();
        let builder = ContainerBuilder::new("c1".to_string(), syscall.as_ref());
        assert_eq!(builder.root_path, PathBuf::from("/run/kontainer"));
        assert_eq!(builder.preserve_fds, 0);
        assert!(builder.pid_file.is_none());
    }

    #[test]
    fn test_builder_chaining() {
        let syscall = create_syscall();
        let builder = ContainerBuilder::new("c1".to_string(), syscall.as_ref())
            .with_root_path("/tmp/kontainer-test")
            .with_pid_file(Some("/tmp/pid"))
            .with_preserved_fds(2);
        assert_eq!(builder.root_path, PathBuf::from("/tmp/kontainer-test"));
        assert_eq!(builder.pid_file, Some(PathBuf::from("/tmp/pid")));
        assert_eq!(builder.preserve_fds, 2);
    }
}
