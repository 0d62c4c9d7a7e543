//! Environment to credential mapping and transient auth files.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::PromoteConfig;
use crate::environment::Environment;
use crate::error::{PromoteError, Result};
use crate::shell::make_private;

/// Credential id for `environment`.
///
/// The id names the environment variable through which the CI secret
/// store injects the org's SFDX auth URL.
pub fn credential_for(config: &PromoteConfig, environment: Environment) -> &str {
    let credentials = &config.org.credentials;
    match environment {
        Environment::Dev => &credentials.dev,
        Environment::Qa => &credentials.qa,
        Environment::Uat => &credentials.uat,
        Environment::Production => &credentials.production,
    }
}

/// Look up the secret behind `credential`.
///
/// # Errors
///
/// Returns `MissingCredential` if the variable is unset or blank.
pub fn read_secret(credential: &str, env: &HashMap<String, String>) -> Result<String> {
    env.get(credential)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| PromoteError::MissingCredential {
            credential: credential.to_string(),
        })
}

/// Write `secret` to `<dir>/<credential>.auth`, readable only by the owner.
pub fn write_credential_file(dir: &Path, credential: &str, secret: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.auth", credential.to_ascii_lowercase()));

    fs::write(&path, "")?;
    make_private(&path)?;
    fs::write(&path, secret)?;

    Ok(path)
}

/// Delete a credential file; a file that is already gone is fine.
pub fn remove_credential_file(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
