//! The subset of the OCI runtime configuration consumed by kontainer.
//! `config.json` is deserialized leniently: unknown keys are ignored so
//! bundles produced for richer runtimes still load.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

mod linux;
mod process;

// re-export for ease of use
pub use linux::*;
pub use process::*;

/// Base configuration for the container.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Spec {
    #[serde(default = "default_version", rename = "ociVersion")]
    /// Version of the Open Container Initiative Runtime Specification with
    /// which the bundle complies.
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Specifies the container's root filesystem.
    pub root: Option<Root>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Specifies the container process.
    pub process: Option<Process>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Specifies the container's hostname as seen by processes running
    /// inside the container. Only applied when a new UTS namespace is
    /// requested.
    pub hostname: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Arbitrary metadata for the container, carried into the state file.
    pub annotations: Option<HashMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Platform-specific configuration for Linux based containers.
    pub linux: Option<Linux>,
}

fn default_version() -> String {
    String::from("1.0.2")
}

impl Default for Spec {
    fn default() -> Self {
        Spec {
            version: default_version(),
            root: Some(Default::default()),
            process: Some(Default::default()),
            hostname: Some("kontainer".into()),
            annotations: None,
            linux: Some(Default::default()),
        }
    }
}

impl Spec {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        let spec: Spec = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to parse {}", path.display()))?;

        Ok(spec)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file =
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(file, self)
            .with_context(|| format!("failed to write {}", path.display()))?;

        Ok(())
    }

    /// A non-absolute root path is relative to the bundle directory.
    pub fn canonicalize_rootfs<P: AsRef<Path>>(&mut self, bundle: P) -> Result<()> {
        let root = self
            .root
            .as_mut()
            .context("no root path provided in spec")?;
        let path = if root.path.is_absolute() {
            root.path.clone()
        } else {
            bundle.as_ref().join(&root.path)
        };
        root.path = std::fs::canonicalize(&path)
            .with_context(|| format!("failed to canonicalize rootfs {}", path.display()))?;

        Ok(())
    }
}

/// Root contains information about the container's root filesystem on the
/// host.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Root {
    #[serde(default)]
    /// Path to the rootfs directory, absolute or relative to the bundle.
    pub path: PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Makes the container root filesystem read-only before the user
    /// process runs.
    pub readonly: Option<bool>,
}

impl Default for Root {
    fn default() -> Self {
        Root {
            path: PathBuf::from("rootfs"),
            readonly: Some(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_ignores_unknown_fields() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let config = tmp.path().join("config.json");
        std::fs::write(
            &config,
            r#"{
                "ociVersion": "1.0.2",
                "root": {"path": "rootfs", "readonly": true},
                "process": {"args": ["/bin/true"], "cwd": "/"},
                "mounts": [{"destination": "/proc", "type": "proc"}],
                "unknownTopLevelKey": 42
            }"#,
        )?;

        let spec = Spec::load(&config)?;
        assert_eq!(spec.version, "1.0.2");
        assert_eq!(spec.root.as_ref().unwrap().readonly, Some(true));
        assert_eq!(
            spec.process.as_ref().unwrap().args,
            Some(vec!["/bin/true".to_string()])
        );
        Ok(())
    }

    #[test]
    fn test_load_missing_file() {
        assert!(Spec::load("/does/not/exist/config.json").is_err());
    }

    #[test]
    fn test_canonicalize_rootfs_relative_to_bundle() -> Result<()> {
        let bundle = tempfile::tempdir()?;
        std::fs::create_dir(bundle.path().join("rootfs"))?;

        let mut spec = Spec::default();
        spec.canonicalize_rootfs(bundle.path())?;

        let root = spec.root.unwrap();
        assert!(root.path.is_absolute());
        assert_eq!(root.path, bundle.path().canonicalize()?.join("rootfs"));
        Ok(())
    }

    #[test]
    fn test_spec_json_round_trip() -> Result<()> {
        let spec = Spec::default();
        let serialized = serde_json::to_string(&spec)?;
        let decoded: Spec = serde_json::from_str(&serialized)?;
        assert_eq!(spec, decoded);
        Ok(())
    }
}
