//! E2E tests for the `cordon` binary.
//!
//! Each test runs against a fresh temp directory used as project root and
//! `HOME`, so no global config or `CORDON_*` variable leaks in.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

const TIMEOUT: Duration = Duration::from_secs(10);

const CORDON_VARS: &[&str] = &[
    "CORDON_DEFAULT_PRINCIPAL",
    "CORDON_ENFORCEMENT",
    "CORDON_ROOT_PATHS",
    "CORDON_EXTENSION",
    "CORDON_PARENT_ORIGIN",
    "CORDON_MANIFEST",
    "CORDON_LOG_LEVEL",
];

/// Builds a command rooted in a fresh project directory.
///
/// Returns (command, project). The project must outlive the command.
fn cordon_cmd() -> (assert_cmd::Command, TempDir) {
    let project = tempfile::tempdir().expect("create project dir");
    let mut cmd: assert_cmd::Command = cargo_bin_cmd!("cordon");
    cmd.timeout(TIMEOUT);
    for var in CORDON_VARS {
        cmd.env_remove(var);
    }
    cmd.env_remove("RUST_LOG");
    cmd.env("HOME", project.path());
    cmd.arg("-C").arg(project.path());
    (cmd, project)
}

fn write(project: &TempDir, name: &str, contents: &str) {
    let path = project.path().join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    fs::write(path, contents).expect("write file");
}

// ─── Commands ──────────────────────────────────────────────────────

#[test]
fn run_prints_exports_as_json() {
    let (mut cmd, project) = cordon_cmd();
    write(&project, "lib/beets.lua", "print('hi from beets')\nexports.beets = 5");
    write(&project, "cordon.toml", "root_paths = [\"lib\"]\n");

    cmd.args(["run", "beets"])
        .assert()
        .success()
        .stdout(contains("\"beets\": 5"))
        .stderr(contains("hi from beets"));
}

#[test]
fn eval_prints_values() {
    let (mut cmd, project) = cordon_cmd();
    cmd.arg("--root")
        .arg(project.path())
        .args(["eval", "1 + 1"])
        .assert()
        .success()
        .stdout(contains("2"));
}

#[test]
fn script_requires_modules() {
    let (mut cmd, project) = cordon_cmd();
    write(&project, "lib/util.lua", "exports.double = function(x) return x * 2 end");
    write(&project, "main.lua", "return { answer = require('util').double(21) }");

    cmd.arg("--root")
        .arg(project.path().join("lib"))
        .arg("script")
        .arg(project.path().join("main.lua"))
        .assert()
        .success()
        .stdout(contains("\"answer\": 42"));
}

// ─── Failures ──────────────────────────────────────────────────────

#[test]
fn missing_module_fails() {
    let (mut cmd, project) = cordon_cmd();
    cmd.arg("--root")
        .arg(project.path())
        .args(["run", "nope"])
        .assert()
        .failure()
        .stderr(contains("LOADER_NOT_FOUND").and(contains("module \"nope\" not found")));
}

#[test]
fn missing_roots_fail() {
    let (mut cmd, _project) = cordon_cmd();
    cmd.args(["eval", "1"])
        .assert()
        .failure()
        .stderr(contains("need a root path for module filesystem"));
}

#[test]
fn deny_enforces_the_manifest() {
    let (mut cmd, project) = cordon_cmd();
    write(&project, "lib/main.lua", "require('extra')");
    write(&project, "lib/extra.lua", "exports.x = 1");
    write(&project, "manifest.toml", "[modules.main]\ndependencies = {}\n");

    cmd.arg("--root")
        .arg(project.path().join("lib"))
        .arg("--manifest")
        .arg(project.path().join("manifest.toml"))
        .args(["--deny", "run", "main"])
        .assert()
        .failure()
        .stderr(contains("access denied to execute module: extra"));
}

#[test]
fn restricted_modules_lack_host_facilities() {
    let (mut cmd, project) = cordon_cmd();
    write(&project, "lib/probe.lua", "exports.os = os ~= nil");

    cmd.arg("--root")
        .arg(project.path().join("lib"))
        .args(["run", "probe"])
        .assert()
        .success()
        .stdout(contains("\"os\": false"));
}

#[test]
fn elevated_flag_grants_host_facilities() {
    let (mut cmd, project) = cordon_cmd();
    write(&project, "lib/probe.lua", "exports.os = os ~= nil");

    cmd.arg("--root")
        .arg(project.path().join("lib"))
        .args(["--elevated", "run", "probe"])
        .assert()
        .success()
        .stdout(contains("\"os\": true"));
}
