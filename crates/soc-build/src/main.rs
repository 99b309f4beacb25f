//! CLI entry point for the socgen build-plan generator.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde as _;
use soc_build::{
    BuildError, BuildPlanGenerator, DirectoryWriter, ShellRunner, SystemConfig,
};
use soc_core as _;
use thiserror as _;
use toml as _;
use tracing::info;
use tracing_subscriber::EnvFilter;
#[cfg(test)]
use rstest as _;
#[cfg(test)]
use tempfile as _;

const USAGE_TEXT: &str = "\
Usage: socgen <command> [options]

Commands:
  map   [<config>]                                      Print the resource table
  build [<config>] [-o <dir>] [--name <name>] [--no-run]  Generate and run the build plan

Options:
  -o, --output <dir>  Build directory (default: build)
  -n, --name <name>   Output name (default: [system] name)
      --no-run        Write the plan without running its script
  -h, --help          Show this help message

Without <config>, the reference board layout is used.

Examples:
  socgen map board.toml
  socgen build board.toml -o build/soc --no-run
";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Map(MapArgs),
    Build(BuildArgs),
}

#[derive(Debug, PartialEq, Eq)]
struct MapArgs {
    config: Option<PathBuf>,
}

#[derive(Debug, PartialEq, Eq)]
struct BuildArgs {
    config: Option<PathBuf>,
    output: PathBuf,
    name: Option<String>,
    run: bool,
}

#[derive(Debug)]
enum ParseResult {
    Command(Command),
    Help,
}

fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let first = args.next().ok_or_else(|| "missing command".to_string())?;

    if first == "--help" || first == "-h" {
        return Ok(ParseResult::Help);
    }

    let command_str = first.to_string_lossy().to_string();

    match command_str.as_str() {
        "map" => parse_map_args(args)
            .map(Command::Map)
            .map(ParseResult::Command),
        "build" => parse_build_args(args)
            .map(Command::Build)
            .map(ParseResult::Command),
        other => Err(format!("unknown command: {other}")),
    }
}

fn parse_map_args(args: impl Iterator<Item = OsString>) -> Result<MapArgs, String> {
    let mut config: Option<PathBuf> = None;

    for arg in args {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }

        if arg.to_string_lossy().starts_with('-') {
            return Err(format!("unknown option: {}", arg.to_string_lossy()));
        }

        if config.is_some() {
            return Err("multiple config paths provided".to_string());
        }
        config = Some(PathBuf::from(arg));
    }

    Ok(MapArgs { config })
}

#[allow(clippy::while_let_on_iterator)]
fn parse_build_args(mut args: impl Iterator<Item = OsString>) -> Result<BuildArgs, String> {
    let mut config: Option<PathBuf> = None;
    let mut output = PathBuf::from("build");
    let mut name: Option<String> = None;
    let mut run = true;

    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }

        if arg == "--no-run" {
            run = false;
            continue;
        }

        if arg == "-o" || arg == "--output" {
            let value = args
                .next()
                .ok_or_else(|| "missing value for -o".to_string())?;
            output = PathBuf::from(value);
            continue;
        }

        if arg == "-n" || arg == "--name" {
            let value = args
                .next()
                .ok_or_else(|| "missing value for --name".to_string())?;
            name = Some(value.to_string_lossy().to_string());
            continue;
        }

        if arg.to_string_lossy().starts_with('-') {
            return Err(format!("unknown option: {}", arg.to_string_lossy()));
        }

        if config.is_some() {
            return Err("multiple config paths provided".to_string());
        }
        config = Some(PathBuf::from(arg));
    }

    Ok(BuildArgs {
        config,
        output,
        name,
        run,
    })
}

fn load_config(path: Option<&Path>) -> Result<SystemConfig, BuildError> {
    match path {
        Some(path) => {
            info!(config = %path.display(), "loading system description");
            Ok(SystemConfig::load(path)?)
        }
        None => Ok(SystemConfig::default_layout()),
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    }
}

fn run_map(args: &MapArgs) -> Result<(), BuildError> {
    let config = load_config(args.config.as_deref())?;
    let system = config.build_system()?;
    let name = &config.system.name;
    let plan = BuildPlanGenerator::new().generate(system.memory_map(), name)?;
    if let Some(table) = plan.file(&format!("{name}_resources.csv")) {
        print!("{table}");
    }
    Ok(())
}

fn run_build(args: BuildArgs) -> Result<(), BuildError> {
    let config = load_config(args.config.as_deref())?;
    let system = config.build_system()?;
    let name = args.name.unwrap_or_else(|| config.system.name.clone());
    let build_dir = absolute(&args.output);

    let mut generator = config.plan_generator()?;
    generator.set_build_dir(build_dir.to_string_lossy());
    let plan = generator.generate(system.memory_map(), &name)?;

    let mut writer = DirectoryWriter::new(&build_dir);
    if args.run {
        plan.execute(&mut writer, &mut ShellRunner::new(&build_dir))?;
    } else {
        plan.write_files(&mut writer)?;
    }

    println!(
        "Generated {} ({} files) -> {}",
        plan.name(),
        plan.files().len(),
        build_dir.display()
    );
    Ok(())
}

fn report(result: Result<(), BuildError>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(error) => {
            eprintln!("error: {error}");
            error.exit_code()
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Command(Command::Map(args))) => report(run_map(&args)),
        Ok(ParseResult::Command(Command::Build(args))) => report(run_build(args)),
        Err(error) => {
            if error.starts_with("Usage:") {
                println!("{error}");
            } else {
                eprintln!("error: {error}");
                eprintln!("{USAGE_TEXT}");
            }
            1
        }
    };

    std::process::exit(exit_code);
}
