//! Generated build plans and the sinks that consume them.
//!
//! A [`BuildPlan`] is plain data. Writing files and running the script are
//! delegated to an [`ArtifactWriter`] and a [`CommandRunner`] supplied by
//! the caller.

use std::io;

use thiserror::Error;
use tracing::info;

/// One generated file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanFile {
    /// File name relative to the build directory.
    pub name: String,
    /// Rendered content.
    pub content: String,
}

/// Ordered generated files plus the name of the script that builds them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    name: String,
    script: String,
    files: Vec<PlanFile>,
}

impl BuildPlan {
    pub(crate) const fn new(name: String, script: String, files: Vec<PlanFile>) -> Self {
        Self {
            name,
            script,
            files,
        }
    }

    /// Output name the plan was generated for.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// File name of the build script.
    #[must_use]
    pub fn script(&self) -> &str {
        &self.script
    }

    /// Files in emission order.
    #[must_use]
    pub fn files(&self) -> &[PlanFile] {
        &self.files
    }

    /// Content of the file named `name`.
    #[must_use]
    pub fn file(&self, name: &str) -> Option<&str> {
        self.files
            .iter()
            .find(|file| file.name == name)
            .map(|file| file.content.as_str())
    }

    /// Hands every file to `writer` in order.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first [`SinkError`].
    pub fn write_files(&self, writer: &mut dyn ArtifactWriter) -> Result<(), SinkError> {
        for file in &self.files {
            writer.write(&file.name, &file.content)?;
        }
        info!(plan = %self.name, files = self.files.len(), "build plan written");
        Ok(())
    }

    /// Writes every file, then runs the build script.
    ///
    /// # Errors
    ///
    /// Returns the first [`SinkError`]. The script is not run when a write
    /// fails.
    pub fn execute(
        &self,
        writer: &mut dyn ArtifactWriter,
        runner: &mut dyn CommandRunner,
    ) -> Result<(), SinkError> {
        self.write_files(writer)?;
        info!(plan = %self.name, script = %self.script, "running build script");
        runner.run(&self.script)
    }
}

/// Destination for generated files.
pub trait ArtifactWriter {
    /// Stores `content` under `filename`.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Write`] when the file cannot be stored.
    fn write(&mut self, filename: &str, content: &str) -> Result<(), SinkError>;
}

/// Executor for a written build script.
pub trait CommandRunner {
    /// Runs the script previously written as `script`.
    ///
    /// # Errors
    ///
    /// Returns a [`SinkError`] when the script cannot start or fails.
    fn run(&mut self, script: &str) -> Result<(), SinkError>;
}

/// Failure reported by an artifact or command sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// A file could not be written.
    #[error("failed to write '{filename}': {source}")]
    Write {
        /// File being written.
        filename: String,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The script could not be started.
    #[error("failed to launch '{script}': {source}")]
    Launch {
        /// Script being run.
        script: String,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The script ran and failed.
    #[error("'{script}' failed ({status})")]
    Failed {
        /// Script that failed.
        script: String,
        /// Exit status as reported by the runner.
        status: String,
    },
}
