// file: src/config/mod.rs
// version: 1.0.0
// guid: d5a8b1c4-3e6f-4972-a085-1b2c3d4e5f60

//! Configuration for the provision agent
//!
//! Settings are resolved exactly once at startup by merging the TOML
//! configuration file with command-line flags (a flag that was explicitly
//! supplied wins over the file) and are passed by reference into every
//! component afterwards. Nothing reads process-wide state.

pub mod loader;
pub mod template;

pub use loader::{ConfigLoader, FileConfig};

use crate::Result;
use std::path::PathBuf;

/// Immutable merged configuration for one provisioning run
#[derive(Debug, Clone)]
pub struct Settings {
    /// User created on the target system; also used for the handoff endpoint
    pub ssh_user: String,
    /// Authorized-keys reference handed to the rescue bootstrap script
    pub authorized_keys: String,
    /// Hostname written to the provider and rendered into the installer config
    pub hostname: String,
    /// Provider location for new orders
    pub location: String,
    /// URL of the rescue bootstrap script
    pub run_url: Option<String>,
    /// Optional installer image mirror; changes the bootstrap invocation shape
    pub image_url: Option<String>,
    /// Directory holding the installer config template and rendered files
    pub installer_config_dir: PathBuf,
    /// Optional URL of a script executed on the target after handoff
    pub post_provision: Option<String>,
    /// Provider API credentials (absent in direct mode)
    pub api_user: Option<String>,
    pub api_password: Option<String>,
}

/// Values explicitly supplied on the command line; `None` means the flag
/// was not given and the file value (or default) applies.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub ssh_user: Option<String>,
    pub authorized_keys: Option<String>,
    pub hostname: Option<String>,
    pub location: Option<String>,
    pub post_provision: Option<String>,
    pub api_user: Option<String>,
    pub api_password: Option<String>,
}

impl Settings {
    /// Merge the file configuration with CLI overrides and validate.
    ///
    /// In provider mode the `[provider]` section is layered over `[default]`
    /// before the CLI flags are applied.
    pub fn resolve(
        file: &FileConfig,
        overrides: &SettingsOverrides,
        provider_mode: bool,
    ) -> Result<Self> {
        let mut section = file.default.clone().unwrap_or_default();
        if provider_mode {
            if let Some(provider) = &file.provider {
                section.apply(provider);
            }
        }

        let pick = |cli: &Option<String>, file: &Option<String>| -> Option<String> {
            cli.clone().or_else(|| file.clone())
        };

        let ssh_user = pick(&overrides.ssh_user, &section.ssh_user).ok_or_else(|| {
            crate::error::ProvisionError::config(
                "ssh_user is required; supply --ssh-user or set it in the config file",
            )
        })?;
        let authorized_keys =
            pick(&overrides.authorized_keys, &section.authorized_keys).ok_or_else(|| {
                crate::error::ProvisionError::config(
                    "authorized_keys is required; supply --authorized-keys or set it in the config file",
                )
            })?;

        Ok(Self {
            ssh_user,
            authorized_keys,
            hostname: pick(&overrides.hostname, &section.hostname)
                .unwrap_or_else(|| "metal".to_string()),
            location: pick(&overrides.location, &section.location)
                .unwrap_or_else(|| "FSN1".to_string()),
            run_url: section.run_url.clone(),
            image_url: section.image_url.clone(),
            installer_config_dir: section
                .installer_config_dir
                .as_deref()
                .map(|p| PathBuf::from(shellexpand::tilde(p).into_owned()))
                .unwrap_or_else(|| PathBuf::from("installerconfig")),
            post_provision: pick(&overrides.post_provision, &section.post_provision),
            api_user: pick(&overrides.api_user, &section.api_user),
            api_password: pick(&overrides.api_password, &section.api_password),
        })
    }

    /// Provider API credentials, or a configuration error in their absence
    pub fn api_credentials(&self) -> Result<(&str, &str)> {
        match (&self.api_user, &self.api_password) {
            (Some(user), Some(password)) => Ok((user, password)),
            _ => Err(crate::error::ProvisionError::config(
                "provider mode needs api_user and api_password; set them in the [provider] \
                 section or pass --api-user/--api-password",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::loader::FileSection;
    use super::*;

    fn file_with(ssh_user: &str, keys: &str) -> FileConfig {
        FileConfig {
            default: Some(FileSection {
                ssh_user: Some(ssh_user.to_string()),
                authorized_keys: Some(keys.to_string()),
                ..FileSection::default()
            }),
            provider: None,
        }
    }

    #[test]
    fn test_cli_flag_wins_over_file() {
        let file = file_with("fileuser", "https://example.com/keys");
        let overrides = SettingsOverrides {
            ssh_user: Some("cliuser".to_string()),
            ..SettingsOverrides::default()
        };

        let settings = Settings::resolve(&file, &overrides, false).unwrap();
        assert_eq!(settings.ssh_user, "cliuser");
        assert_eq!(settings.authorized_keys, "https://example.com/keys");
    }

    #[test]
    fn test_file_value_used_when_flag_absent() {
        let file = file_with("filduser", "keys.pub");
        let settings = Settings::resolve(&file, &SettingsOverrides::default(), false).unwrap();
        assert_eq!(settings.ssh_user, "filduser");
        assert_eq!(settings.hostname, "metal");
        assert_eq!(settings.location, "FSN1");
    }

    #[test]
    fn test_missing_ssh_user_is_config_error() {
        let file = FileConfig {
            default: Some(FileSection {
                authorized_keys: Some("keys.pub".to_string()),
                ..FileSection::default()
            }),
            provider: None,
        };
        let err = Settings::resolve(&file, &SettingsOverrides::default(), false).unwrap_err();
        assert!(err.to_string().contains("ssh_user"));
    }

    #[test]
    fn test_missing_authorized_keys_is_config_error() {
        let file = FileConfig {
            default: Some(FileSection {
                ssh_user: Some("admin".to_string()),
                ..FileSection::default()
            }),
            provider: None,
        };
        let err = Settings::resolve(&file, &SettingsOverrides::default(), false).unwrap_err();
        assert!(err.to_string().contains("authorized_keys"));
    }

    #[test]
    fn test_provider_section_layered_in_provider_mode_only() {
        let mut file = file_with("admin", "keys.pub");
        file.provider = Some(FileSection {
            api_user: Some("robot".to_string()),
            api_password: Some("secret".to_string()),
            hostname: Some("provider-host".to_string()),
            ..FileSection::default()
        });

        let direct = Settings::resolve(&file, &SettingsOverrides::default(), false).unwrap();
        assert!(direct.api_user.is_none());
        assert_eq!(direct.hostname, "metal");

        let provider = Settings::resolve(&file, &SettingsOverrides::default(), true).unwrap();
        assert_eq!(provider.api_user.as_deref(), Some("robot"));
        assert_eq!(provider.hostname, "provider-host");
        assert!(provider.api_credentials().is_ok());
    }
}
