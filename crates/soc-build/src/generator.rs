//! Rendering of a frozen memory map into a [`BuildPlan`].
//!
//! Every registered file is a pair of templates: one for the file name and
//! one for its content. Command fragments are templates too. They are
//! rendered first, each collapsed onto a single line, and exposed to the
//! file templates as `commands`.
//!
//! Render context:
//!
//! | name            | value                                           |
//! |-----------------|-------------------------------------------------|
//! | `name`          | output name                                     |
//! | `autogenerated` | do-not-edit banner                              |
//! | `build_dir`     | build directory                                 |
//! | `resources`     | leaf resources: `name`, `start`, `end`, `width` |
//! | `windows`       | top-level windows: `name`, `start`, `end`, and  |
//! |                 | `resources` (the window's own leaf resources,   |
//! |                 | named within the window, absolute addresses)    |
//! | `commands`      | rendered command fragments (files only)         |

use soc_core::{AddressRegistry, MappedResource, MappedWindow};
use tracing::{debug, info};

use crate::blackbox::{BlackboxPort, SupportTable};
use crate::plan::{BuildPlan, PlanFile};
use crate::template::{Context, RenderError, Template, Value};

/// Banner placed at the top of generated files.
pub const AUTOGENERATED: &str = "Automatically generated by socgen. Do not edit.";

/// First line of the resource table.
pub const RESOURCE_TABLE_HEADER: &str =
    "# <resource name>,<start address>,<end address>,<access width>";

const SCRIPT_NAME_TEMPLATE: &str = "build_{{ name }}.sh";

const SCRIPT_TEMPLATE: &str = r"
    # {{ autogenerated }}
    set -e
    {% for command in commands %}
    {{ command }}
    {% endfor %}
";

const RESOURCE_TABLE_NAME_TEMPLATE: &str = "{{ name }}_resources.csv";

const RESOURCE_TABLE_TEMPLATE: &str = r"
    # <resource name>,<start address>,<end address>,<access width>
    {% for resource in resources %}
    {{ resource.name }},{{ resource.start | hex }},{{ resource.end | hex }},{{ resource.width }}
    {% endfor %}
";

/// Renders build plans from frozen memory maps.
#[derive(Debug, Clone)]
pub struct BuildPlanGenerator {
    files: Vec<(String, String)>,
    commands: Vec<String>,
    support: SupportTable,
    build_dir: String,
}

impl Default for BuildPlanGenerator {
    fn default() -> Self {
        Self {
            files: vec![
                (SCRIPT_NAME_TEMPLATE.to_string(), SCRIPT_TEMPLATE.to_string()),
                (
                    RESOURCE_TABLE_NAME_TEMPLATE.to_string(),
                    RESOURCE_TABLE_TEMPLATE.to_string(),
                ),
            ],
            commands: Vec::new(),
            support: SupportTable::new(),
            build_dir: "build".to_string(),
        }
    }
}

impl BuildPlanGenerator {
    /// Creates a generator with the build script and resource table
    /// templates and no commands.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a command fragment to the build script.
    pub fn add_command(&mut self, template: impl Into<String>) -> &mut Self {
        self.commands.push(template.into());
        self
    }

    /// Adds a generated file. Both arguments are templates.
    pub fn add_file(
        &mut self,
        name_template: impl Into<String>,
        content_template: impl Into<String>,
    ) -> &mut Self {
        self.files
            .push((name_template.into(), content_template.into()));
        self
    }

    /// Sets the directory exposed to templates as `build_dir`.
    pub fn set_build_dir(&mut self, dir: impl Into<String>) -> &mut Self {
        self.build_dir = dir.into();
        self
    }

    /// Declares a simulation blackbox. Returns `false` when the module was
    /// already declared.
    pub fn add_blackbox(&mut self, module: &str, ports: &[BlackboxPort]) -> bool {
        self.support.register(module, ports)
    }

    /// Declared blackboxes.
    #[must_use]
    pub const fn support(&self) -> &SupportTable {
        &self.support
    }

    /// Forgets every declared blackbox.
    pub fn reset(&mut self) {
        self.support.reset();
    }

    /// Renders every template against `registry`.
    ///
    /// Either a complete plan is returned or nothing is.
    ///
    /// # Errors
    ///
    /// Returns the first [`RenderError`] raised by any template.
    ///
    /// # Panics
    ///
    /// Panics when `registry` is not frozen.
    pub fn generate(
        &self,
        registry: &AddressRegistry,
        name: &str,
    ) -> Result<BuildPlan, RenderError> {
        assert!(
            registry.is_frozen(),
            "programming error: build plan requested for unfrozen map '{}'",
            registry.name()
        );

        let mut context = Context::new();
        context
            .insert("name", name)
            .insert("autogenerated", AUTOGENERATED)
            .insert("build_dir", self.build_dir.as_str())
            .insert(
                "resources",
                registry
                    .resources()
                    .map(|r| resource_value(&r, 0))
                    .collect::<Vec<_>>(),
            )
            .insert(
                "windows",
                registry.windows().map(|w| window_value(&w)).collect::<Vec<_>>(),
            );

        let commands = self
            .commands
            .iter()
            .enumerate()
            .map(|(index, source)| {
                let rendered = Template::parse(format!("<command#{}>", index + 1), source)?
                    .render(&context)?;
                Ok(rendered.split_whitespace().collect::<Vec<_>>().join(" "))
            })
            .collect::<Result<Vec<_>, RenderError>>()?;
        debug!(commands = commands.len(), "command fragments rendered");
        context.insert("commands", commands);

        let mut files = Vec::with_capacity(self.files.len() + 1);
        for (name_source, content_source) in &self.files {
            let filename = Template::parse(name_source.as_str(), name_source)?.render(&context)?;
            let content = Template::parse(name_source.as_str(), content_source)?.render(&context)?;
            files.push(PlanFile {
                name: filename.trim_end().to_string(),
                content,
            });
        }
        if !self.support.is_empty() {
            files.push(PlanFile {
                name: format!("{name}_blackboxes.v"),
                content: self.support.render(),
            });
        }

        info!(plan = name, files = files.len(), "build plan generated");
        Ok(BuildPlan::new(
            name.to_string(),
            format!("build_{name}.sh"),
            files,
        ))
    }
}

fn resource_value(mapped: &MappedResource<'_>, offset: u64) -> Value {
    Value::record([
        ("name", Value::from(mapped.qualified_name())),
        ("start", Value::from(offset + mapped.start)),
        ("end", Value::from(offset + mapped.end)),
        ("width", Value::from(mapped.granularity())),
    ])
}

fn window_value(mapped: &MappedWindow<'_>) -> Value {
    Value::record([
        ("name", Value::from(mapped.window.name())),
        ("start", Value::from(mapped.start)),
        ("end", Value::from(mapped.end)),
        (
            "resources",
            Value::from(
                mapped
                    .window
                    .map()
                    .resources()
                    .map(|r| resource_value(&r, mapped.start))
                    .collect::<Vec<_>>(),
            ),
        ),
    ])
}
