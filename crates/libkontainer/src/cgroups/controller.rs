use std::path::Path;

use anyhow::Result;

use crate::spec::LinuxResources;

pub trait Controller {
    /// Applies the controller's slice of the resource restrictions to the
    /// cgroup at `cgroup_path`.
    fn apply(resources: &LinuxResources, cgroup_path: &Path) -> Result<()>;
}
