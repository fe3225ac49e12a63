// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sandbox command executor.
//!
//! Runs shell commands inside a workspace with a timeout, capturing
//! stdout/stderr/exit code/duration into an ordered history. File mutations
//! performed through the executor are recorded as [`FileChange`]s. Both
//! histories are per-executor and cleared between tasks.

use crate::error::EngineError;
use sbx_core::{
    ChangeType, Clock, CommandInfo, FileChange, Workspace, EXIT_INTERNAL_FAILURE, EXIT_TIMEOUT,
};
use sbx_workspace::{ScopedFs, WorkspaceError};
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;

/// Default command timeout when neither the call nor the config supplies one.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// Package manager used by [`SandboxExecutor::install_package`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Pip,
    Npm,
    Yarn,
    /// Choose by workspace marker files: `package.json` selects npm,
    /// `requirements.txt`/`pyproject.toml` select pip, otherwise pip.
    Auto,
}

/// Executor configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Default timeout; `None` disables timeouts entirely
    pub default_timeout: Option<Duration>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_timeout: Some(DEFAULT_COMMAND_TIMEOUT),
        }
    }
}

/// Runs commands and file operations inside one workspace.
pub struct SandboxExecutor<C: Clock> {
    fs: ScopedFs,
    clock: C,
    config: Mutex<ExecutorConfig>,
    commands: Mutex<Vec<CommandInfo>>,
    changes: Mutex<Vec<FileChange>>,
}

impl<C: Clock> SandboxExecutor<C> {
    /// Bind to a workspace, honouring its isolation setting.
    pub fn for_workspace(workspace: &Workspace, clock: C) -> Result<Self, EngineError> {
        Self::new(
            &workspace.sandbox_path,
            workspace.isolation.enabled,
            clock,
            ExecutorConfig::default(),
        )
    }

    pub fn new(
        root: &Path,
        isolation_enabled: bool,
        clock: C,
        config: ExecutorConfig,
    ) -> Result<Self, EngineError> {
        let fs = ScopedFs::new(root, isolation_enabled)?;
        Ok(Self {
            fs,
            clock,
            config: Mutex::new(config),
            commands: Mutex::new(Vec::new()),
            changes: Mutex::new(Vec::new()),
        })
    }

    pub fn workspace_root(&self) -> &Path {
        self.fs.root()
    }

    pub fn fs(&self) -> &ScopedFs {
        &self.fs
    }

    /// The workspace must exist, be a directory, and be writable.
    pub fn validate_environment(&self) -> Result<(), EngineError> {
        let root = self.fs.root();
        if !root.is_dir() {
            return Err(EngineError::Workspace(WorkspaceError::SourceNotFound(
                root.to_path_buf(),
            )));
        }
        let probe = root.join(".sandbox_probe");
        std::fs::write(&probe, b"ok")?;
        std::fs::remove_file(&probe)?;
        Ok(())
    }

    /// Resolve the effective timeout: explicit argument wins, then the
    /// configured default. Zero means no timeout.
    fn effective_timeout(&self, timeout_secs: Option<u64>) -> Option<Duration> {
        match timeout_secs {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => self.config.lock().default_timeout,
        }
    }

    /// Run a shell command, capturing output. Never errors: failures are
    /// encoded in the returned [`CommandInfo`] via the sentinel exit codes.
    pub async fn execute(
        &self,
        command: &str,
        working_dir: Option<&Path>,
        timeout_secs: Option<u64>,
    ) -> CommandInfo {
        let cwd = match working_dir {
            None => self.fs.root().to_path_buf(),
            Some(dir) => match self.fs.resolve(dir) {
                Ok(resolved) if resolved.is_dir() => resolved,
                Ok(resolved) => {
                    return self.record_internal_failure(
                        command,
                        resolved,
                        "working directory does not exist",
                    );
                }
                Err(err) => {
                    return self.record_internal_failure(
                        command,
                        dir.to_path_buf(),
                        &err.to_string(),
                    );
                }
            },
        };

        let timeout = self.effective_timeout(timeout_secs);
        let start = self.clock.now();

        let mut cmd = tokio::process::Command::new("bash");
        cmd.arg("-c")
            .arg(command)
            .current_dir(&cwd)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        let outcome = match cmd.spawn() {
            Err(err) => Err(err.to_string()),
            Ok(child) => {
                let wait = child.wait_with_output();
                match timeout {
                    // Child is killed on drop when the timeout wins the race
                    Some(limit) => match tokio::time::timeout(limit, wait).await {
                        Ok(Ok(output)) => Ok(output),
                        Ok(Err(err)) => Err(err.to_string()),
                        Err(_elapsed) => {
                            let info = CommandInfo {
                                command: command.to_string(),
                                working_directory: cwd,
                                stdout: String::new(),
                                stderr: "Command timed out".to_string(),
                                exit_code: EXIT_TIMEOUT,
                                duration_seconds: self.clock.now().duration_since(start).as_secs_f64(),
                                at_epoch_ms: self.clock.epoch_ms(),
                            };
                            tracing::warn!(
                                command,
                                timeout_secs = limit.as_secs(),
                                "command timed out"
                            );
                            self.commands.lock().push(info.clone());
                            return info;
                        }
                    },
                    None => wait.await.map_err(|err| err.to_string()),
                }
            }
        };

        let info = match outcome {
            Ok(output) => CommandInfo {
                command: command.to_string(),
                working_directory: cwd,
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                exit_code: output.status.code().unwrap_or(EXIT_INTERNAL_FAILURE),
                duration_seconds: self.clock.now().duration_since(start).as_secs_f64(),
                at_epoch_ms: self.clock.epoch_ms(),
            },
            Err(message) => CommandInfo {
                command: command.to_string(),
                working_directory: cwd,
                stdout: String::new(),
                stderr: message,
                exit_code: EXIT_INTERNAL_FAILURE,
                duration_seconds: self.clock.now().duration_since(start).as_secs_f64(),
                at_epoch_ms: self.clock.epoch_ms(),
            },
        };

        tracing::debug!(
            command,
            exit_code = info.exit_code,
            duration_ms = (info.duration_seconds * 1000.0) as u64,
            "command finished"
        );
        self.commands.lock().push(info.clone());
        info
    }

    fn record_internal_failure(
        &self,
        command: &str,
        cwd: PathBuf,
        reason: &str,
    ) -> CommandInfo {
        let info = CommandInfo {
            command: command.to_string(),
            working_directory: cwd,
            stdout: String::new(),
            stderr: reason.to_string(),
            exit_code: EXIT_INTERNAL_FAILURE,
            duration_seconds: 0.0,
            at_epoch_ms: self.clock.epoch_ms(),
        };
        tracing::warn!(command, reason, "command rejected");
        self.commands.lock().push(info.clone());
        info
    }

    /// Create a file that does not yet exist, recording the change.
    pub fn create_file(
        &self,
        path: impl AsRef<Path>,
        content: &str,
    ) -> Result<(), EngineError> {
        let resolved = self.fs.resolve(path.as_ref())?;
        if resolved.exists() {
            return Err(EngineError::Workspace(WorkspaceError::FileExists(
                path.as_ref().to_path_buf(),
            )));
        }
        self.fs.write(path.as_ref(), content)?;
        self.changes.lock().push(
            FileChange::new(resolved, ChangeType::Create, self.clock.epoch_ms())
                .with_after(content),
        );
        Ok(())
    }

    /// Overwrite an existing file, recording before and after content.
    pub fn modify_file(
        &self,
        path: impl AsRef<Path>,
        content: &str,
    ) -> Result<(), EngineError> {
        let resolved = self.fs.resolve(path.as_ref())?;
        if !resolved.exists() {
            return Err(EngineError::Workspace(WorkspaceError::FileNotFound(
                path.as_ref().to_path_buf(),
            )));
        }
        let before = std::fs::read_to_string(&resolved)?;
        self.fs.write(path.as_ref(), content)?;
        self.changes.lock().push(
            FileChange::new(resolved, ChangeType::Modify, self.clock.epoch_ms())
                .with_before(before)
                .with_after(content),
        );
        Ok(())
    }

    /// Delete an existing file, recording its final content.
    pub fn delete_file(&self, path: impl AsRef<Path>) -> Result<(), EngineError> {
        let resolved = self.fs.resolve(path.as_ref())?;
        if !resolved.exists() {
            return Err(EngineError::Workspace(WorkspaceError::FileNotFound(
                path.as_ref().to_path_buf(),
            )));
        }
        let before = std::fs::read_to_string(&resolved).unwrap_or_default();
        std::fs::remove_file(&resolved)?;
        self.changes.lock().push(
            FileChange::new(resolved, ChangeType::Delete, self.clock.epoch_ms())
                .with_before(before),
        );
        Ok(())
    }

    /// Install a package with the given manager, resolving `Auto` from
    /// workspace marker files.
    pub async fn install_package(
        &self,
        package: &str,
        manager: PackageManager,
    ) -> CommandInfo {
        let manager = match manager {
            PackageManager::Auto => self.detect_package_manager(),
            other => other,
        };
        let command = match manager {
            PackageManager::Pip | PackageManager::Auto => format!("pip install {}", package),
            PackageManager::Npm => format!("npm install {}", package),
            PackageManager::Yarn => format!("yarn add {}", package),
        };
        self.execute(&command, None, None).await
    }

    /// Package manager implied by workspace marker files.
    pub fn detect_package_manager(&self) -> PackageManager {
        let root = self.fs.root();
        if root.join("package.json").exists() {
            PackageManager::Npm
        } else if root.join("requirements.txt").exists() || root.join("pyproject.toml").exists() {
            PackageManager::Pip
        } else {
            PackageManager::Pip
        }
    }

    /// Multiply the default timeout; used by timeout recovery so later
    /// attempts get more headroom.
    pub fn raise_default_timeout(&self, factor: f64) {
        let mut config = self.config.lock();
        if let Some(current) = config.default_timeout {
            let raised = current.as_secs_f64() * factor;
            config.default_timeout = Some(Duration::from_secs_f64(raised));
        }
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.config.lock().default_timeout
    }

    /// Ordered command history since the last clear.
    pub fn commands_executed(&self) -> Vec<CommandInfo> {
        self.commands.lock().clone()
    }

    /// Ordered file-change history since the last clear.
    pub fn file_changes(&self) -> Vec<FileChange> {
        self.changes.lock().clone()
    }

    /// Clear both histories (between tasks and before retries).
    pub fn clear_history(&self) {
        self.commands.lock().clear();
        self.changes.lock().clear();
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
