//! Local filesystem and shell sinks.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::plan::{ArtifactWriter, CommandRunner, SinkError};

/// Writes plan files below a build directory, creating it on first use.
#[derive(Debug, Clone)]
pub struct DirectoryWriter {
    root: PathBuf,
}

impl DirectoryWriter {
    /// Writer rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The build directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArtifactWriter for DirectoryWriter {
    fn write(&mut self, filename: &str, content: &str) -> Result<(), SinkError> {
        let path = self.root.join(filename);
        let failed = |source| SinkError::Write {
            filename: filename.to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(failed)?;
        }
        fs::write(&path, content).map_err(failed)?;
        debug!(path = %path.display(), bytes = content.len(), "artifact written");
        Ok(())
    }
}

/// Runs build scripts with `sh` from inside the build directory.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    dir: PathBuf,
}

impl ShellRunner {
    /// Runner working in `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl CommandRunner for ShellRunner {
    fn run(&mut self, script: &str) -> Result<(), SinkError> {
        debug!(script, dir = %self.dir.display(), "launching build script");
        let status = Command::new("sh")
            .arg(script)
            .current_dir(&self.dir)
            .status()
            .map_err(|source| SinkError::Launch {
                script: script.to_string(),
                source,
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(SinkError::Failed {
                script: script.to_string(),
                status: status.to_string(),
            })
        }
    }
}
