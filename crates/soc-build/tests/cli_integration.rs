//! Integration tests for the socgen CLI.

use rstest as _;
use serde as _;
use soc_build as _;
use soc_core as _;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use thiserror as _;
use toml as _;
use tracing as _;
use tracing_subscriber as _;

fn binary_path() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    path.pop();
    path.join("socgen")
}

fn create_temp_file(dir: &std::path::Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

const BOARD: &str = r#"
[system]
name = "board"

[[peripheral]]
name = "sram"
base = 0x1000
size = 0x10

[[peripheral]]
name = "uart"
base = 0x2000
size = 0x10
irq = 1
registers = [{ name = "divisor" }, { name = "tx_data" }]
blackbox = { module = "uart_model", pins = [{ name = "tx" }, { name = "rx" }] }

[build]
commands = [
    "echo {{ name }} > stamp.txt",
    """
    cp {{ name }}_resources.csv
       copy.csv
    """,
]
"#;

#[test]
fn map_prints_resource_table() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = create_temp_file(temp_dir.path(), "board.toml", BOARD);

    let output = Command::new(binary_path())
        .args(["map", config.to_str().unwrap()])
        .output()
        .expect("failed to run socgen");

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8(output.stdout).unwrap(),
        "# <resource name>,<start address>,<end address>,<access width>\n\
         sram.mem,0x1000,0x1010,1\n\
         uart.divisor,0x2000,0x2004,4\n\
         uart.tx_data,0x2004,0x2008,4\n"
    );
}

#[test]
fn map_without_config_uses_reference_layout() {
    let output = Command::new(binary_path())
        .arg("map")
        .output()
        .expect("failed to run socgen");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("\nrom.mem,0x0,0x1000000,1\n"));
    assert!(stdout.contains("\nhram.mem,0x20000000,0x20800000,1\n"));
}

#[test]
fn build_writes_plan_and_runs_script() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = create_temp_file(temp_dir.path(), "board.toml", BOARD);
    let build_dir = temp_dir.path().join("out");

    let status = Command::new(binary_path())
        .args([
            "build",
            config.to_str().unwrap(),
            "-o",
            build_dir.to_str().unwrap(),
        ])
        .status()
        .expect("failed to run socgen");

    assert!(status.success());
    let script = fs::read_to_string(build_dir.join("build_board.sh")).unwrap();
    assert!(script.starts_with("# Automatically generated by socgen. Do not edit.\nset -e\n"));
    assert!(script.contains("\ncp board_resources.csv copy.csv\n"));
    assert_eq!(
        fs::read_to_string(build_dir.join("stamp.txt")).unwrap(),
        "board\n"
    );
    assert_eq!(
        fs::read_to_string(build_dir.join("copy.csv")).unwrap(),
        fs::read_to_string(build_dir.join("board_resources.csv")).unwrap()
    );
    let boxes = fs::read_to_string(build_dir.join("board_blackboxes.v")).unwrap();
    assert!(boxes.contains("module uart_model ("));
}

#[test]
fn build_no_run_only_writes_files() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = create_temp_file(temp_dir.path(), "board.toml", BOARD);
    let build_dir = temp_dir.path().join("plan");

    let status = Command::new(binary_path())
        .args([
            "build",
            config.to_str().unwrap(),
            "-o",
            build_dir.to_str().unwrap(),
            "--name",
            "sim",
            "--no-run",
        ])
        .status()
        .expect("failed to run socgen");

    assert!(status.success());
    assert!(build_dir.join("build_sim.sh").exists());
    assert!(build_dir.join("sim_resources.csv").exists());
    assert!(!build_dir.join("stamp.txt").exists());
}

#[test]
fn overlapping_layout_reports_conflict() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = create_temp_file(
        temp_dir.path(),
        "bad.toml",
        "[system]\nname = \"bad\"\n\n\
         [[peripheral]]\nname = \"a\"\nbase = 0x0\nsize = 0x100\n\n\
         [[peripheral]]\nname = \"b\"\nbase = 0x80\nsize = 0x100\n",
    );

    let output = Command::new(binary_path())
        .args(["map", config.to_str().unwrap()])
        .output()
        .expect("failed to run socgen");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("error: peripheral 'b': 'b' at 0x80..0x180 overlaps 'a'"));
}

#[test]
fn template_errors_name_command_and_line() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = create_temp_file(
        temp_dir.path(),
        "broken.toml",
        "[system]\nname = \"broken\"\n\n[build]\ncommands = [\"true\", \"echo {{ missing }}\"]\n",
    );

    let output = Command::new(binary_path())
        .args([
            "build",
            config.to_str().unwrap(),
            "-o",
            temp_dir.path().join("out").to_str().unwrap(),
        ])
        .output()
        .expect("failed to run socgen");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("undefined variable 'missing' (at <command#2>:1)"));
    assert!(!temp_dir.path().join("out").exists());
}

#[test]
fn failing_script_exits_with_two() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = create_temp_file(
        temp_dir.path(),
        "fail.toml",
        "[system]\nname = \"fail\"\n\n[build]\ncommands = [\"false\"]\n",
    );

    let status = Command::new(binary_path())
        .args([
            "build",
            config.to_str().unwrap(),
            "-o",
            temp_dir.path().join("out").to_str().unwrap(),
        ])
        .status()
        .expect("failed to run socgen");

    assert_eq!(status.code(), Some(2));
}

#[test]
fn unknown_command_shows_usage() {
    let output = Command::new(binary_path())
        .arg("assemble")
        .output()
        .expect("failed to run socgen");

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("unknown command: assemble"));
    assert!(stderr.contains("Usage: socgen"));
}
