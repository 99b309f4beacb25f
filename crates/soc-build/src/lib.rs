//! Build-plan generation for a composed system memory map.

use tracing_subscriber as _;

/// Simulation blackbox declarations and their support table.
pub mod blackbox;
/// TOML system descriptions and system assembly.
pub mod config;
/// Unified error type for the CLI.
pub mod errors;
/// Rendering of frozen memory maps into build plans.
pub mod generator;
/// Build plans and the sink traits that consume them.
pub mod plan;
/// Local filesystem and shell sinks.
pub mod sinks;
/// The template mini-language.
pub mod template;

pub use blackbox::{render_blackbox, BlackboxPort, SupportTable};
pub use config::{ConfigError, SystemConfig};
pub use errors::BuildError;
pub use generator::{BuildPlanGenerator, AUTOGENERATED, RESOURCE_TABLE_HEADER};
pub use plan::{ArtifactWriter, BuildPlan, CommandRunner, PlanFile, SinkError};
pub use sinks::{DirectoryWriter, ShellRunner};
pub use template::{Context, RenderError, RenderErrorKind, Template, Value};
