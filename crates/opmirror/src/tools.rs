//! External collaborators
//!
//! The dependency-lock tool and the version-control system sit behind narrow
//! traits so the pipeline can run against fakes. The production
//! implementations shell out to `go` and `git` synchronously.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;

/// Errors raised by external tools
#[derive(Debug, Error)]
pub enum ToolError {
    /// The program could not be started
    #[error("failed to run `{command}` in {}: {source}", .dir.display())]
    Spawn {
        command: String,
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The program exited unsuccessfully
    #[error("`{command}` failed in {} ({}){}", .dir.display(), exit_label(.code), stderr_suffix(.stderr))]
    Failed {
        command: String,
        dir: PathBuf,
        code: Option<i32>,
        stderr: Option<String>,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit={}", code),
        None => "terminated by signal".to_string(),
    }
}

fn stderr_suffix(stderr: &Option<String>) -> String {
    match stderr.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => format!(": {}", text),
        _ => String::new(),
    }
}

fn command_line(program: &str, args: &[&str]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

fn effective_dir(dir: Option<&Path>) -> PathBuf {
    match dir {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Makes a module's dependency manifest consistent with its imports
pub trait DependencyLocker {
    /// Synchronously update the manifest of the module rooted at `dir`.
    fn resolve_dependencies(&self, dir: &Path) -> Result<(), ToolError>;
}

/// Runs `go mod tidy`, passing its output through
#[derive(Debug, Clone)]
pub struct GoModTidy {
    program: String,
}

impl Default for GoModTidy {
    fn default() -> Self {
        Self::new()
    }
}

impl GoModTidy {
    pub fn new() -> Self {
        Self {
            program: "go".to_string(),
        }
    }

    /// Use a different `go` executable
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl DependencyLocker for GoModTidy {
    fn resolve_dependencies(&self, dir: &Path) -> Result<(), ToolError> {
        let args = ["mod", "tidy"];
        let command = command_line(&self.program, &args);
        let status = Command::new(&self.program)
            .args(args)
            .current_dir(dir)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|source| ToolError::Spawn {
                command: command.clone(),
                dir: dir.to_path_buf(),
                source,
            })?;

        if !status.success() {
            return Err(ToolError::Failed {
                command,
                dir: dir.to_path_buf(),
                code: status.code(),
                stderr: None,
            });
        }
        Ok(())
    }
}

/// Leaves the manifest as written (offline runs)
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipLock;

impl DependencyLocker for SkipLock {
    fn resolve_dependencies(&self, _dir: &Path) -> Result<(), ToolError> {
        Ok(())
    }
}

/// Version-control tag namespace
pub trait TagStore {
    /// Whether `name` exists as a tag
    fn tag_exists(&self, name: &str) -> Result<bool, ToolError>;

    /// Create the tag `name` at the current revision
    fn create_tag(&self, name: &str) -> Result<(), ToolError>;
}

/// Exit status of `git show-ref --verify` for a missing ref
const SHOW_REF_NOT_FOUND: i32 = 1;

/// Tags managed through the `git` executable
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
    repo_dir: Option<PathBuf>,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

impl GitCli {
    /// Operate on the repository of the process's working directory
    pub fn new() -> Self {
        Self {
            program: "git".to_string(),
            repo_dir: None,
        }
    }

    /// Operate on the repository at `dir`
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            program: "git".to_string(),
            repo_dir: Some(dir.into()),
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(args);
        if let Some(dir) = &self.repo_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    fn spawn_error(&self, args: &[&str], source: io::Error) -> ToolError {
        ToolError::Spawn {
            command: command_line(&self.program, args),
            dir: effective_dir(self.repo_dir.as_deref()),
            source,
        }
    }
}

impl TagStore for GitCli {
    fn tag_exists(&self, name: &str) -> Result<bool, ToolError> {
        let reference = format!("refs/tags/{}", name);
        let args = ["show-ref", "--tags", "--verify", "--quiet", reference.as_str()];
        let out = self
            .command(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.spawn_error(&args, e))?;

        match out.status.code() {
            Some(0) => Ok(true),
            Some(SHOW_REF_NOT_FOUND) => Ok(false),
            code => Err(ToolError::Failed {
                command: command_line(&self.program, &args),
                dir: effective_dir(self.repo_dir.as_deref()),
                code,
                stderr: Some(String::from_utf8_lossy(&out.stderr).into_owned()),
            }),
        }
    }

    fn create_tag(&self, name: &str) -> Result<(), ToolError> {
        let args = ["tag", name];
        let status = self
            .command(&args)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| self.spawn_error(&args, e))?;

        if !status.success() {
            return Err(ToolError::Failed {
                command: command_line(&self.program, &args),
                dir: effective_dir(self.repo_dir.as_deref()),
                code: status.code(),
                stderr: None,
            });
        }
        Ok(())
    }
}
