use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use nix::unistd::Pid;

use super::common::{self, CGROUP_PROCS, CGROUP_SUBTREE_CONTROL, DEFAULT_CGROUP_ROOT};
use super::controller::Controller;
use super::controller_type::{ControllerType, CONTROLLER_TYPES};
use super::cpu::Cpu;
use super::memory::Memory;
use crate::spec::LinuxResources;

pub struct Manager {
    root_path: PathBuf,
    full_path: PathBuf,
}

impl Manager {
    /// Constructs a new cgroup manager with the cgroup path being relative
    /// to the cgroup v2 mount point.
    pub fn new(cgroup_path: &Path) -> Self {
        Self::with_root(PathBuf::from(DEFAULT_CGROUP_ROOT), cgroup_path)
    }

    /// Like `new`, with an explicit root. Used by the unit tests to work in
    /// a scratch directory.
    pub fn with_root(root_path: PathBuf, cgroup_path: &Path) -> Self {
        let relative = cgroup_path
            .strip_prefix("/")
            .unwrap_or(cgroup_path)
            .to_owned();
        let full_path = root_path.join(relative);

        Self {
            root_path,
            full_path,
        }
    }

    pub fn cgroup_path(&self) -> &Path {
        &self.full_path
    }

    /// Creates the cgroup directory, enables the needed controllers,
    /// enrolls the pid and applies the resource limits. Limit writes are
    /// best-effort, the enable of a controller actually needed by the
    /// resources is not.
    pub fn setup(&self, pid: Pid, resources: Option<&LinuxResources>) -> Result<()> {
        self.create_cgroup()?;
        self.enable_controllers(resources)?;
        self.add_task(pid)?;
        if let Some(resources) = resources {
            self.apply(resources);
        }

        Ok(())
    }

    fn create_cgroup(&self) -> Result<()> {
        if !self.full_path.exists() {
            fs::create_dir_all(&self.full_path)
                .with_context(|| format!("failed to create cgroup {:?}", self.full_path))?;
            let mut permissions = fs::metadata(&self.full_path)?.permissions();
            permissions.set_mode(0o755);
            fs::set_permissions(&self.full_path, permissions)?;
        }

        Ok(())
    }

    fn enable_controllers(&self, resources: Option<&LinuxResources>) -> Result<()> {
        let required = required_controllers(resources);
        let subtree_control = self.root_path.join(CGROUP_SUBTREE_CONTROL);
        for controller in CONTROLLER_TYPES {
            if let Err(err) =
                common::write_cgroup_file_str(&subtree_control, &format!("+{controller}"))
            {
                if required.contains(controller) {
                    return Err(err).with_context(|| {
                        format!("required controller {controller} could not be enabled")
                    });
                }
                log::warn!("failed to enable controller {}: {:?}", controller, err);
            }
        }

        Ok(())
    }

    pub fn add_task(&self, pid: Pid) -> Result<()> {
        common::write_cgroup_file(self.full_path.join(CGROUP_PROCS), pid)
            .with_context(|| format!("failed to add {pid} to {:?}", self.full_path))?;

        Ok(())
    }

    /// Resource-limit writes keep the container runnable even when a
    /// particular knob is missing, so each controller failure is only
    /// logged.
    pub fn apply(&self, resources: &LinuxResources) {
        for controller in CONTROLLER_TYPES {
            let result = match controller {
                ControllerType::Cpu => Cpu::apply(resources, &self.full_path),
                ControllerType::Memory => Memory::apply(resources, &self.full_path),
            };
            if let Err(err) = result {
                log::warn!("failed to apply {} limits: {:?}", controller, err);
            }
        }
    }

    /// Removes the cgroup directory. Callers treat a failure as
    /// best-effort cleanup.
    pub fn remove(&self) -> Result<()> {
        if self.full_path.exists() {
            log::debug!("remove cgroup {:?}", self.full_path);
            fs::remove_dir(&self.full_path)
                .with_context(|| format!("failed to remove cgroup {:?}", self.full_path))?;
        }

        Ok(())
    }

    pub fn get_pids(&self) -> Result<Vec<Pid>> {
        common::get_pids(&self.full_path)
    }
}

fn required_controllers(resources: Option<&LinuxResources>) -> Vec<ControllerType> {
    let mut required = Vec::new();
    if let Some(resources) = resources {
        if resources.cpu.is_some() {
            required.push(ControllerType::Cpu);
        }
        if resources.memory.is_some() {
            required.push(ControllerType::Memory);
        }
    }

    required
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cgroups::common::test::set_fixture;
    use crate::spec::{LinuxCpu, LinuxMemory};

    fn fake_cgroup_root() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        set_fixture(tmp.path(), CGROUP_SUBTREE_CONTROL, "").unwrap();
        tmp
    }

    #[test]
    fn test_setup_creates_and_enrolls() -> Result<()> {
        let root = fake_cgroup_root();
        let manager = Manager::with_root(root.path().to_path_buf(), Path::new("kontainer-42"));
        manager.create_cgroup()?;
        set_fixture(&root.path().join("kontainer-42"), CGROUP_PROCS, "")?;

        manager.setup(Pid::from_raw(42), None)?;

        assert!(root.path().join("kontainer-42").is_dir());
        assert_eq!(
            fs::read_to_string(root.path().join("kontainer-42").join(CGROUP_PROCS))?,
            "42"
        );
        Ok(())
    }

    #[test]
    fn test_apply_is_best_effort() {
        let root = fake_cgroup_root();
        let manager = Manager::with_root(root.path().to_path_buf(), Path::new("kontainer-42"));
        manager.create_cgroup().unwrap();

        // none of the limit files exist, apply still succeeds
        let resources = LinuxResources {
            cpu: Some(LinuxCpu {
                shares: Some(1024),
                ..Default::default()
            }),
            memory: Some(LinuxMemory {
                limit: Some(134217728),
                ..Default::default()
            }),
        };
        manager.apply(&resources);
    }

    #[test]
    fn test_required_controller_failure_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        // no cgroup.subtree_control fixture, every enable fails
        let manager = Manager::with_root(tmp.path().to_path_buf(), Path::new("kontainer-42"));
        manager.create_cgroup().unwrap();

        let resources = LinuxResources {
            memory: Some(LinuxMemory {
                limit: Some(134217728),
                ..Default::default()
            }),
            cpu: None,
        };
        assert!(manager.enable_controllers(Some(&resources)).is_err());
        assert!(manager.enable_controllers(None).is_ok());
    }

    #[test]
    fn test_remove_missing_cgroup_is_ok() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = Manager::with_root(tmp.path().to_path_buf(), Path::new("gone"));
        assert!(manager.remove().is_ok());
    }

    #[test]
    fn test_absolute_spec_path_is_made_relative() {
        let manager = Manager::with_root(PathBuf::from("/sys/fs/cgroup"), Path::new("/kontainer/a"));
        assert_eq!(
            manager.cgroup_path(),
            Path::new("/sys/fs/cgroup/kontainer/a")
        );
    }
}
