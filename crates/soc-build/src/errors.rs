//! Unified error type for the build pipeline.
//!
//! # Error Format
//!
//! Errors print on one line, with the failing template located by
//! identifier and line where one is involved:
//! ```text
//! error: undefined variable 'nowhere' (at <command#2>:1)
//! error: peripheral 'uart': 'uart' at 0x10005000..0x10006000 overlaps 'sram' at 0x10004f00..0x10005100
//! ```

use thiserror::Error;

use crate::config::ConfigError;
use crate::plan::SinkError;
use crate::template::RenderError;

/// Any failure between reading a description and running its build.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The system description could not be loaded or applied.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A template failed to parse or render.
    #[error(transparent)]
    Render(#[from] RenderError),
    /// Writing artifacts or running the script failed.
    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl BuildError {
    /// Process exit status for this failure.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Render(_) => 1,
            Self::Sink(_) => 2,
        }
    }
}
