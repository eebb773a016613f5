use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::notify_socket::notify_socket_path;
use crate::spec::Spec;
use crate::user_ns::UserNamespaceConfig;

use super::builder::ContainerBuilder;
use super::builder_impl::ContainerBuilderImpl;
use super::{Container, ContainerStatus};

/// Builder that creates a new container from an OCI bundle
pub struct InitContainerBuilder<'a> {
    base: ContainerBuilder<'a>,
    bundle: PathBuf,
}

impl<'a> InitContainerBuilder<'a> {
    pub(super) fn new(builder: ContainerBuilder<'a>, bundle: PathBuf) -> Self {
        Self {
            base: builder,
            bundle,
        }
    }

    /// Creates a new container
    pub fn build(self) -> Result<Container> {
        let spec = self.load_spec()?;
        let container_dir = self.create_container_dir()?;

        let mut container = self.create_container_state(&container_dir, &spec)?;

        let rootfs = spec
            .root
            .as_ref()
            .context("no root in spec")?
            .path
            .clone();
        let user_ns_config = UserNamespaceConfig::new(&spec)?;
        let notify_path = notify_socket_path(&self.base.container_id);

        let mut builder_impl = ContainerBuilderImpl {
            syscall: self.base.syscall,
            container_id: self.base.container_id.clone(),
            spec: &spec,
            rootfs,
            pid_file: self.base.pid_file.clone(),
            user_ns_config,
            notify_path,
            preserve_fds: self.base.preserve_fds,
            container: Some(container.clone()),
            cgroup_path: None,
        };

        builder_impl.create()?;

        container.refresh_state()?;

        Ok(container)
    }

    fn load_spec(&self) -> Result<Spec> {
        let source_spec_path = self.bundle.join("config.json");
        let mut spec = Spec::load(source_spec_path)?;
        Self::validate_spec(&spec)?;

        spec.canonicalize_rootfs(&self.bundle)
            .with_context(|| format!("failed to canonicalize rootfs for bundle {:?}", self.bundle))?;

        Ok(spec)
    }

    fn validate_spec(spec: &Spec) -> Result<()> {
        if !spec.version.starts_with("1.") {
            bail!(
                "runtime spec has incompatible version '{}', only 1.X.Y is supported",
                spec.version
            );
        }

        if spec.root.is_none() {
            bail!("spec has no root path");
        }

        let args_empty = spec
            .process
            .as_ref()
            .and_then(|p| p.args.as_ref())
            .map(|args| args.is_empty())
            .unwrap_or(true);
        if args_empty {
            bail!("spec has no process args, at least one entry is required");
        }

        Ok(())
    }

    fn create_container_dir(&self) -> Result<PathBuf> {
        let container_dir = self.base.root_path.join(&self.base.container_id);
        log::debug!("container directory will be {:?}", container_dir);

        if container_dir.exists() {
            bail!("container {} already exists", self.base.container_id);
        }

        fs::create_dir_all(&container_dir)
            .with_context(|| format!("failed to create container directory {container_dir:?}"))?;

        Ok(container_dir)
    }

    fn create_container_state(&self, container_dir: &Path, spec: &Spec) -> Result<Container> {
        let mut container = Container::new(
            &self.base.container_id,
            ContainerStatus::Creating,
            None,
            &self.bundle,
            container_dir,
        )?;
        container.set_annotations(spec.annotations.clone());
        container.save()?;
        Ok(container)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::Process;
    use crate::syscall::syscall::create_syscall;

    fn minimal_spec() -> Spec {
        Spec {
            process: Some(Process {
                args: Some(vec!["/bin/true".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_spec_accepts_minimal() {
        assert!(InitContainerBuilder::validate_spec(&minimal_spec()).is_ok());
    }

    #[test]
    fn test_validate_spec_rejects_missing_args() {
        let mut spec = minimal_spec();
        spec.process.as_mut().unwrap().args = Some(vec![]);
        assert!(InitContainerBuilder::validate_spec(&spec).is_err());

        spec.process = None;
        assert!(InitContainerBuilder::validate_spec(&spec).is_err());
    }

    #[test]
    fn test_validate_spec_rejects_unknown_version() {
        let mut spec = minimal_spec();
        spec.version = "2.0.0".to_string();
        assert!(InitContainerBuilder::validate_spec(&spec).is_err());
    }

    #[test]
    fn test_create_container_dir_refuses_existing() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let syscall = create_syscall();
        let builder = ContainerBuilder::new("c1".to_string(), syscall.as_ref())
            .with_root_path(tmp.path())
            .as_init("/bundle");

        let created = builder.create_container_dir()?;
        assert!(created.is_dir());
        assert!(builder.create_container_dir().is_err());
        Ok(())
    }
}
