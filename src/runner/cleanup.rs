//! End-of-run cleanup.
//!
//! Runs once per invocation whatever happened before it. Nothing here can
//! change the run status: every failure is a warning.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::config::{resolve_string, InterpolationContext};
use crate::org::{remove_credential_file, OrgSession};
use crate::ui::UserInterface;

use super::invoke::StageShell;

/// What cleanup did.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CleanupReport {
    pub logout_attempted: bool,
    pub credential_files_removed: usize,
    pub dirs_removed: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

/// Everything cleanup needs besides the session and shell.
pub struct CleanupPlan<'a> {
    pub logout: &'a str,
    pub context: &'a InterpolationContext,
    pub credential_dir: &'a Path,
    pub project_root: &'a Path,
    pub ephemeral_dirs: &'a [PathBuf],
}

/// Log out, delete credential files and ephemeral directories.
pub fn cleanup(
    plan: &CleanupPlan<'_>,
    session: &mut OrgSession,
    shell: &mut StageShell<'_>,
    ui: &mut dyn UserInterface,
) -> CleanupReport {
    let mut report = CleanupReport::default();
    shell.console().section("Cleanup");

    logout(plan, session, shell, &mut report);
    remove_credentials(plan, session, &mut report);
    remove_ephemeral_dirs(plan, &mut report);

    for warning in &report.warnings {
        tracing::warn!("cleanup: {}", warning);
        shell.console().line(&format!("warning: {}", warning));
        ui.warning(&format!("Cleanup: {}", warning));
    }

    report
}

fn logout(
    plan: &CleanupPlan<'_>,
    session: &mut OrgSession,
    shell: &mut StageShell<'_>,
    report: &mut CleanupReport,
) {
    let mut context = plan.context.clone();
    context.set("org_alias", session.alias());

    report.logout_attempted = true;
    match resolve_string(plan.logout, &context) {
        Ok(command) if command.trim().is_empty() => {}
        Ok(command) => {
            let result = shell.run(&command);
            if !result.success && session.is_established() {
                report
                    .warnings
                    .push(format!("logout of '{}' failed", session.alias()));
            }
        }
        Err(e) => report.warnings.push(format!("logout not run: {}", e)),
    }
    session.end();
}

fn remove_credentials(
    plan: &CleanupPlan<'_>,
    session: &OrgSession,
    report: &mut CleanupReport,
) {
    for file in session.credential_files() {
        match remove_credential_file(file) {
            Ok(()) => report.credential_files_removed += 1,
            Err(e) => report
                .warnings
                .push(format!("cannot delete {}: {}", file.display(), e)),
        }
    }

    // Only removes the directory once it is empty.
    let _ = fs::remove_dir(plan.credential_dir);
}

/// Relative paths that stay inside the project.
fn is_contained(path: &Path) -> bool {
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn remove_ephemeral_dirs(plan: &CleanupPlan<'_>, report: &mut CleanupReport) {
    for dir in plan.ephemeral_dirs {
        if !is_contained(dir) {
            report
                .warnings
                .push(format!("refusing to delete {} outside the project", dir.display()));
            continue;
        }

        let path = plan.project_root.join(dir);
        if !path.exists() {
            continue;
        }
        match fs::remove_dir_all(&path) {
            Ok(()) => report.dirs_removed.push(dir.clone()),
            Err(e) => report
                .warnings
                .push(format!("cannot delete {}: {}", dir.display(), e)),
        }
    }
}
