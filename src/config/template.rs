// file: src/config/template.rs
// version: 1.0.0
// guid: f8d3b6a2-5c1e-4790-8b43-2a1f0e9d8c7b

//! Installer configuration rendering
//!
//! The installer config template lives in the configured template directory
//! and uses `${name}` placeholders for the server's network facts. Rendering
//! is a pure text substitution; the orchestrator only needs the path of the
//! rendered file before staging it on the rescue system.

use crate::Result;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Template file name inside the installer config directory
pub const TEMPLATE_FILE_NAME: &str = "installer_template.txt";

/// Network facts substituted into the installer config template
#[derive(Debug, Clone)]
pub struct InstallFacts {
    pub ip: String,
    pub gateway: String,
    pub ip6: String,
    pub name: String,
    pub user: String,
}

/// Substitute `${placeholder}` references in the template. A placeholder
/// without a matching fact is a configuration error.
pub fn render(template: &str, facts: &InstallFacts) -> Result<String> {
    let values = [
        ("ip", facts.ip.as_str()),
        ("gateway", facts.gateway.as_str()),
        ("ip6", facts.ip6.as_str()),
        ("name", facts.name.as_str()),
        ("user", facts.user.as_str()),
    ];

    let re = Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| crate::error::ProvisionError::config(format!("Invalid regex pattern: {}", e)))?;

    let mut result = template.to_string();
    let mut unknown = Vec::new();
    for cap in re.captures_iter(template) {
        let key = &cap[1];
        let placeholder = &cap[0];
        match values.iter().find(|(k, _)| *k == key) {
            Some((_, value)) => result = result.replace(placeholder, value),
            None => unknown.push(key.to_string()),
        }
    }

    if !unknown.is_empty() {
        return Err(crate::error::ProvisionError::config(format!(
            "Unknown template placeholders: {}",
            unknown.join(", ")
        )));
    }

    Ok(result)
}

/// Render the installer config template to `install_<ip>.txt` in the
/// template directory and return the rendered file's path.
pub fn render_to_file(dir: &Path, facts: &InstallFacts) -> Result<PathBuf> {
    let template_path = dir.join(TEMPLATE_FILE_NAME);
    let template = fs::read_to_string(&template_path).map_err(|e| {
        crate::error::ProvisionError::config(format!(
            "Failed to read installer template {}: {}",
            template_path.display(),
            e
        ))
    })?;

    let content = render(&template, facts)?;
    let out_path = dir.join(format!("install_{}.txt", facts.ip));
    fs::write(&out_path, content)?;
    info!("Wrote {} as installer config", out_path.display());
    Ok(out_path)
}
