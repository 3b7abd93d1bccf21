// file: src/config/loader.rs
// version: 1.0.0
// guid: e7c2a9f1-4b8d-4365-9210-fedcba098765

//! Configuration file loading

use crate::Result;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default configuration file name, looked up in the working directory and
/// then under the user config directory.
const CONFIG_FILE_NAME: &str = "provision.toml";

/// One section of the configuration file; every field optional so the merge
/// with CLI flags can distinguish "set" from "absent".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileSection {
    pub ssh_user: Option<String>,
    pub authorized_keys: Option<String>,
    pub hostname: Option<String>,
    pub location: Option<String>,
    pub run_url: Option<String>,
    pub image_url: Option<String>,
    pub installer_config_dir: Option<String>,
    pub post_provision: Option<String>,
    pub api_user: Option<String>,
    pub api_password: Option<String>,
}

impl FileSection {
    /// Layer another section on top of this one; set fields win.
    pub fn apply(&mut self, other: &FileSection) {
        macro_rules! take {
            ($field:ident) => {
                if other.$field.is_some() {
                    self.$field = other.$field.clone();
                }
            };
        }
        take!(ssh_user);
        take!(authorized_keys);
        take!(hostname);
        take!(location);
        take!(run_url);
        take!(image_url);
        take!(installer_config_dir);
        take!(post_provision);
        take!(api_user);
        take!(api_password);
    }
}

/// Parsed configuration file: a `[default]` section plus an optional
/// `[provider]` section layered on top in provider mode.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    pub default: Option<FileSection>,
    pub provider: Option<FileSection>,
}

/// Loads the TOML configuration file
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load the configuration from an explicit path.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<FileConfig> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            crate::error::ProvisionError::config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config: FileConfig = toml::from_str(&content).map_err(|e| {
            crate::error::ProvisionError::config(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load the configuration from the default locations, or start from an
    /// empty configuration when no file exists (CLI flags may still satisfy
    /// the required settings).
    pub fn load_default() -> Result<FileConfig> {
        for candidate in Self::default_paths() {
            if candidate.exists() {
                return Self::load(&candidate);
            }
        }
        debug!("No configuration file found; relying on CLI flags");
        Ok(FileConfig::default())
    }

    fn default_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("baremetal-provision-agent").join(CONFIG_FILE_NAME));
        }
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_sections() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[default]
ssh_user = "admin"
authorized_keys = "https://example.com/keys"
run_url = "https://example.com/run.sh"

[provider]
api_user = "robot"
api_password = "secret"
"#
        )
        .unwrap();

        let config = ConfigLoader::load(file.path()).unwrap();
        let default = config.default.unwrap();
        assert_eq!(default.ssh_user.as_deref(), Some("admin"));
        assert_eq!(default.run_url.as_deref(), Some("https://example.com/run.sh"));
        let provider = config.provider.unwrap();
        assert_eq!(provider.api_user.as_deref(), Some("robot"));
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let err = ConfigLoader::load("/nonexistent/provision.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_apply_prefers_set_fields() {
        let mut base = FileSection {
            ssh_user: Some("base".to_string()),
            hostname: Some("base-host".to_string()),
            ..FileSection::default()
        };
        let layer = FileSection {
            hostname: Some("layer-host".to_string()),
            ..FileSection::default()
        };
        base.apply(&layer);
        assert_eq!(base.ssh_user.as_deref(), Some("base"));
        assert_eq!(base.hostname.as_deref(), Some("layer-host"));
    }
}
