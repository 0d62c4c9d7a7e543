//! The authenticated org session of a run.

use std::path::{Path, PathBuf};

use super::credentials::{remove_credential_file, write_credential_file};
use crate::config::{resolve_string, InterpolationContext};
use crate::error::{PromoteError, Result};
use crate::shell::CommandResult;

/// What a login is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginTarget {
    /// The org being deployed to.
    Target,
    /// The dev hub used for scratch orgs and packaging.
    DevHub,
}

/// Tracks the one org session a run may hold.
///
/// Credential files written for a login are deleted right after the login
/// attempt and remembered so cleanup can retry anything left behind.
#[derive(Debug)]
pub struct OrgSession {
    alias: String,
    credential_dir: PathBuf,
    established: bool,
    credential_files: Vec<PathBuf>,
}

impl OrgSession {
    /// A session that will log in under `alias`, writing transient
    /// credential files to `credential_dir`.
    pub fn new(alias: &str, credential_dir: &Path) -> Self {
        Self {
            alias: alias.to_string(),
            credential_dir: credential_dir.to_path_buf(),
            established: false,
            credential_files: Vec::new(),
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Alias the dev hub is stored under.
    pub fn devhub_alias(&self) -> String {
        format!("{}-devhub", self.alias)
    }

    pub fn is_established(&self) -> bool {
        self.established
    }

    /// Every credential file written during this session.
    pub fn credential_files(&self) -> &[PathBuf] {
        &self.credential_files
    }

    /// Log in with `secret`.
    ///
    /// The secret is written to a private file, `template` is resolved with
    /// `auth_file` pointing at it and handed to `run`, and the file is
    /// deleted whatever the outcome.
    pub fn login<F>(
        &mut self,
        target: LoginTarget,
        credential: &str,
        secret: &str,
        template: &str,
        context: &InterpolationContext,
        run: F,
    ) -> Result<CommandResult>
    where
        F: FnOnce(&str) -> Result<CommandResult>,
    {
        if target == LoginTarget::Target && self.established {
            return Err(PromoteError::Other(anyhow::anyhow!(
                "org session '{}' is already established",
                self.alias
            )));
        }

        let auth_file = write_credential_file(&self.credential_dir, credential, secret)?;
        self.credential_files.push(auth_file.clone());

        let mut context = context.clone();
        context.set("auth_file", auth_file.to_string_lossy());
        context.set("org_alias", self.alias.clone());
        context.set("devhub_alias", self.devhub_alias());

        let result = resolve_string(template, &context).and_then(|command| run(&command));

        if let Err(e) = remove_credential_file(&auth_file) {
            tracing::warn!(
                "failed to delete credential file {}: {}",
                auth_file.display(),
                e
            );
        }

        if target == LoginTarget::Target && matches!(&result, Ok(r) if r.success) {
            self.established = true;
            tracing::info!(alias = %self.alias, "org session established");
        }

        result
    }

    /// Note that the session was logged out.
    pub fn end(&mut self) {
        self.established = false;
    }
}
