//! The bundle-independent configuration persisted next to the state file,
//! so cleanup keeps working even when the bundle directory is gone.
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to save config: {msg}")]
    SaveFailed { msg: String, path: PathBuf },
    #[error("failed to load config: {msg}")]
    LoadFailed { msg: String, path: PathBuf },
}

type Result<T> = std::result::Result<T, ConfigError>;

const KONTAINER_CONFIG_NAME: &str = "kontainer_config.json";

/// Information obtained during container creation that later commands
/// need. Keeping this to a minimum improves performance.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct KontainerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cgroup_path: Option<PathBuf>,
}

impl KontainerConfig {
    pub fn new(cgroup_path: Option<PathBuf>) -> Self {
        Self { cgroup_path }
    }

    pub fn save<P: AsRef<Path>>(&self, container_root: P) -> Result<()> {
        let path = container_root.as_ref().join(KONTAINER_CONFIG_NAME);
        let file = fs::File::create(&path).map_err(|err| ConfigError::SaveFailed {
            msg: err.to_string(),
            path: path.clone(),
        })?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self).map_err(|err| {
            ConfigError::SaveFailed {
                msg: err.to_string(),
                path: path.clone(),
            }
        })?;
        writer.flush().map_err(|err| ConfigError::SaveFailed {
            msg: err.to_string(),
            path,
        })?;

        Ok(())
    }

    pub fn load<P: AsRef<Path>>(container_root: P) -> Result<Self> {
        let path = container_root.as_ref().join(KONTAINER_CONFIG_NAME);
        let file = fs::File::open(&path).map_err(|err| ConfigError::LoadFailed {
            msg: err.to_string(),
            path: path.clone(),
        })?;
        let reader = BufReader::new(file);
        let config = serde_json::from_reader(reader).map_err(|err| ConfigError::LoadFailed {
            msg: err.to_string(),
            path,
        })?;

        Ok(config)
    }
}
