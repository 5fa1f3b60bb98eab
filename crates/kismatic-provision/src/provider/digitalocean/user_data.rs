//! Cloud-init user data for the bootstrap droplet
//!
//! The bootstrap node receives the plan file and the cluster key under the
//! install directory, so that directory (and its `ssh/` subdirectory) must
//! exist before staging.

use anyhow::{Result, bail};

/// Validate that a value is safe for interpolation into a double-quoted
/// bash string.
fn validate_shell_input(value: &str, field_name: &str) -> Result<()> {
    const FORBIDDEN: &[char] = &['"', '\\', '`', '$', '\n', '\r'];
    if let Some(bad) = value.chars().find(|c| FORBIDDEN.contains(c)) {
        bail!("{field_name} contains forbidden character: {bad:?}");
    }
    if value.is_empty() {
        bail!("{field_name} cannot be empty");
    }
    Ok(())
}

/// Generate the user-data script for the bootstrap droplet.
pub fn bootstrap_user_data(install_dir: &str) -> Result<String> {
    validate_shell_input(install_dir, "install directory")?;
    let dir = install_dir.trim_end_matches('/');
    Ok(format!(
        r#"#!/bin/bash
set -euo pipefail

INSTALL_DIR="{dir}"

mkdir -p "${{INSTALL_DIR}}/ssh"
chmod 700 "${{INSTALL_DIR}}/ssh"
"#
    ))
}
