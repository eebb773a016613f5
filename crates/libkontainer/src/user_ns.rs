//! Composes and writes the UID/GID mappings for a new user namespace. The
//! mappings must be written by the main process from outside the namespace
//! while the target process is dumpable, see user_namespaces(7).
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use nix::unistd::Pid;

use crate::spec::{LinuxIdMapping, LinuxNamespaceType, Spec};
use crate::namespaces::Namespaces;

// Wrap the uid/gid path lookup into a struct for dependency injection. This
// allows the unit tests to use a base path other than `/proc`.
#[derive(Debug, Clone)]
pub struct IdMapper {
    base_path: PathBuf,
}

impl Default for IdMapper {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("/proc"),
        }
    }
}

impl IdMapper {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn get_uid_path(&self, pid: &Pid) -> PathBuf {
        self.base_path.join(pid.to_string()).join("uid_map")
    }

    pub fn get_gid_path(&self, pid: &Pid) -> PathBuf {
        self.base_path.join(pid.to_string()).join("gid_map")
    }

    #[cfg(test)]
    pub fn new_test(path: PathBuf) -> Self {
        Self { base_path: path }
    }

    #[cfg(test)]
    pub fn ensure_paths(&self, pid: &Pid) -> std::result::Result<(), std::io::Error> {
        std::fs::create_dir_all(self.get_uid_path(pid).parent().unwrap())?;
        Ok(())
    }
}

/// Holds the information needed to set up a new user namespace for the
/// container.
#[derive(Debug, Clone)]
pub struct UserNamespaceConfig {
    /// Mappings for user ids
    pub uid_mappings: Option<Vec<LinuxIdMapping>>,
    /// Mappings for group ids
    pub gid_mappings: Option<Vec<LinuxIdMapping>>,
    /// Is the new user namespace requested by a privileged caller
    pub privileged: bool,
    /// Path lookup for the mapping files
    pub id_mapper: IdMapper,
}

impl Default for UserNamespaceConfig {
    fn default() -> Self {
        Self {
            uid_mappings: None,
            gid_mappings: None,
            privileged: nix::unistd::geteuid().is_root(),
            id_mapper: IdMapper::new(),
        }
    }
}

impl UserNamespaceConfig {
    /// Returns the user-namespace configuration if the spec requests a new
    /// user namespace, None otherwise.
    pub fn new(spec: &Spec) -> Result<Option<Self>> {
        let linux = match spec.linux.as_ref() {
            Some(linux) => linux,
            None => return Ok(None),
        };
        let namespaces = Namespaces::from(linux.namespaces.as_ref());
        if namespaces.get(LinuxNamespaceType::User).is_none() {
            log::debug!("this container does not use a new user namespace");
            return Ok(None);
        }

        Ok(Some(Self {
            uid_mappings: linux.uid_mappings.clone(),
            gid_mappings: linux.gid_mappings.clone(),
            ..Default::default()
        }))
    }

    pub fn write_uid_mapping(&self, target_pid: Pid) -> Result<()> {
        log::debug!("write UID mapping for {:?}", target_pid);
        let mappings = compose_mappings(
            self.uid_mappings.as_deref(),
            nix::unistd::geteuid().as_raw(),
        );
        write_id_mapping(&self.id_mapper.get_uid_path(&target_pid), &mappings)
            .with_context(|| format!("failed to map uid of pid {target_pid}"))
    }

    pub fn write_gid_mapping(&self, target_pid: Pid) -> Result<()> {
        log::debug!("write GID mapping for {:?}", target_pid);
        let mappings = compose_mappings(
            self.gid_mappings.as_deref(),
            nix::unistd::getegid().as_raw(),
        );
        write_id_mapping(&self.id_mapper.get_gid_path(&target_pid), &mappings)
            .with_context(|| format!("failed to map gid of pid {target_pid}"))
    }
}

// With no mappings in the spec, the caller's own id becomes root inside the
// namespace.
fn compose_mappings(mappings: Option<&[LinuxIdMapping]>, host_id: u32) -> Vec<LinuxIdMapping> {
    match mappings {
        Some(m) if !m.is_empty() => m.to_vec(),
        _ => vec![LinuxIdMapping {
            container_id: 0,
            host_id,
            size: 1,
        }],
    }
}

fn write_id_mapping(map_file: &std::path::Path, mappings: &[LinuxIdMapping]) -> Result<()> {
    if mappings.is_empty() {
        bail!("at least one id mapping needs to be defined");
    }

    let mut content = String::new();
    for m in mappings {
        writeln!(content, "{} {} {}", m.container_id, m.host_id, m.size)?;
    }
    fs::write(map_file, &content)
        .with_context(|| format!("failed to write {}", map_file.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{Linux, LinuxNamespace};

    fn userns_spec(mappings: Option<Vec<LinuxIdMapping>>) -> Spec {
        Spec {
            linux: Some(Linux {
                namespaces: Some(vec![LinuxNamespace {
                    typ: LinuxNamespaceType::User,
                }]),
                uid_mappings: mappings.clone(),
                gid_mappings: mappings,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_config_requires_user_namespace() -> Result<()> {
        let spec = Spec::default();
        assert!(UserNamespaceConfig::new(&spec)?.is_none());

        let spec = userns_spec(None);
        assert!(UserNamespaceConfig::new(&spec)?.is_some());
        Ok(())
    }

    #[test]
    fn test_write_uid_mapping_from_spec() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let mappings = vec![LinuxIdMapping {
            container_id: 0,
            host_id: 100000,
            size: 65536,
        }];
        let spec = userns_spec(Some(mappings));
        let mut config = UserNamespaceConfig::new(&spec)?.unwrap();
        config.id_mapper = IdMapper::new_test(tmp.path().to_path_buf());

        let pid = Pid::from_raw(1234);
        config.id_mapper.ensure_paths(&pid)?;
        config.write_uid_mapping(pid)?;

        let written = fs::read_to_string(config.id_mapper.get_uid_path(&pid))?;
        assert_eq!(written, "0 100000 65536\n");
        Ok(())
    }

    #[test]
    fn test_write_gid_mapping_fallback() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let spec = userns_spec(None);
        let mut config = UserNamespaceConfig::new(&spec)?.unwrap();
        config.id_mapper = IdMapper::new_test(tmp.path().to_path_buf());

        let pid = Pid::from_raw(1234);
        config.id_mapper.ensure_paths(&pid)?;
        config.write_gid_mapping(pid)?;

        let written = fs::read_to_string(config.id_mapper.get_gid_path(&pid))?;
        assert_eq!(
            written,
            format!("0 {} 1\n", nix::unistd::getegid().as_raw())
        );
        Ok(())
    }
}
