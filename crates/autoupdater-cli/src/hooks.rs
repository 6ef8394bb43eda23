//! # Script-Directory Hooks
//!
//! Runs the executables in `<hook_dir>/download.d`, `abort.d` and
//! `upgrade.d` in lexical order, run-parts style. Scripts see their context
//! in the environment:
//!
//! | Variable | Value |
//! |---|---|
//! | `AUTOUPDATER_MIRROR` | mirror being tried (download and upgrade) |
//! | `AUTOUPDATER_BRANCH` | configured branch |
//! | `AUTOUPDATER_OLD_VERSION` | installed version, if known |
//! | `AUTOUPDATER_MANIFEST` | path where download writes the manifest |
//!
//! The download stage must leave a manifest document at
//! `AUTOUPDATER_MANIFEST`; it is parsed and must name the configured branch.
//! A failing abort script does not stop the remaining abort scripts.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use autoupdater_core::{Manifest, Settings};
use autoupdater_engine::{HookError, Stage, UpdateHooks};

/// File name of the manifest document inside the work directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// [`UpdateHooks`] backed by directories of executables.
#[derive(Debug, Clone)]
pub struct ScriptHooks {
    hook_dir: PathBuf,
    work_dir: PathBuf,
    branch: String,
    previous_version: Option<String>,
}

impl ScriptHooks {
    /// Hooks for one run of `settings`.
    pub fn new(hook_dir: impl Into<PathBuf>, work_dir: impl Into<PathBuf>, settings: &Settings) -> Self {
        Self {
            hook_dir: hook_dir.into(),
            work_dir: work_dir.into(),
            branch: settings.branch().to_string(),
            previous_version: settings.previous_version().map(str::to_string),
        }
    }

    /// Where the download stage is expected to write the manifest.
    pub fn manifest_path(&self) -> PathBuf {
        self.work_dir.join(MANIFEST_FILE)
    }

    fn stage_dir(&self, stage: Stage) -> PathBuf {
        self.hook_dir.join(format!("{stage}.d"))
    }

    fn scripts(&self, stage: Stage) -> Result<Vec<PathBuf>, HookError> {
        let dir = self.stage_dir(stage);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(dir = %dir.display(), "no hook directory");
                return Ok(Vec::new());
            }
            Err(source) => return Err(HookError::Io { stage, source }),
        };

        let mut scripts = Vec::new();
        for entry in entries {
            let path = entry.map_err(|source| HookError::Io { stage, source })?.path();
            if is_executable(&path) {
                scripts.push(path);
            }
        }
        scripts.sort();
        Ok(scripts)
    }

    fn run_script(&self, script: &Path, stage: Stage, mirror: Option<&str>) -> Result<(), HookError> {
        let mut cmd = Command::new(script);
        cmd.env("AUTOUPDATER_BRANCH", &self.branch)
            .env("AUTOUPDATER_MANIFEST", self.manifest_path());
        if let Some(mirror) = mirror {
            cmd.env("AUTOUPDATER_MIRROR", mirror);
        }
        if let Some(version) = &self.previous_version {
            cmd.env("AUTOUPDATER_OLD_VERSION", version);
        }

        tracing::debug!(%stage, script = %script.display(), "running hook");
        let status = cmd.status().map_err(|source| HookError::Io { stage, source })?;
        if status.success() {
            Ok(())
        } else {
            Err(HookError::Failed {
                stage,
                reason: format!("{} exited with {status}", script.display()),
            })
        }
    }

    fn run_stage(&self, stage: Stage, mirror: Option<&str>) -> Result<(), HookError> {
        let mut first_failure = None;
        for script in self.scripts(stage)? {
            match self.run_script(&script, stage, mirror) {
                Ok(()) => {}
                Err(e) if stage == Stage::Abort => {
                    tracing::warn!(error = %e, "abort hook failed");
                    first_failure.get_or_insert(e);
                }
                Err(e) => return Err(e),
            }
        }
        first_failure.map_or(Ok(()), Err)
    }
}

impl UpdateHooks for ScriptHooks {
    fn download(&mut self, mirror: &str) -> Result<Manifest, HookError> {
        let stage = Stage::Download;
        std::fs::create_dir_all(&self.work_dir).map_err(|source| HookError::Io { stage, source })?;

        let path = self.manifest_path();
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => return Err(HookError::Io { stage, source }),
        }

        self.run_stage(stage, Some(mirror))?;

        let bytes = std::fs::read(&path).map_err(|source| HookError::Io { stage, source })?;
        let manifest = Manifest::from_json(&bytes)?;
        if manifest.branch() != self.branch {
            return Err(HookError::Failed {
                stage,
                reason: format!(
                    "manifest is for branch '{}', expected '{}'",
                    manifest.branch(),
                    self.branch
                ),
            });
        }
        Ok(manifest)
    }

    fn abort(&mut self, manifest: &Manifest) -> Result<(), HookError> {
        tracing::debug!(digest = %manifest.digest(), "running abort stage");
        self.run_stage(Stage::Abort, None)
    }

    fn apply(&mut self, mirror: &str, manifest: Manifest) -> Result<(), HookError> {
        tracing::debug!(digest = %manifest.digest(), "running upgrade stage");
        self.run_stage(Stage::Upgrade, Some(mirror))
    }
}

fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}
