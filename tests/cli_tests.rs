#![cfg(unix)]

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};

const PASSING_PLAN: &str = r#"
test:
  suites:
  - name: shell suite
    cases:
    - name: echo works
      spec:
      - call: {target: echo, args: [{literal: hello}]}
      - assert_contains: [{literal: hello}]
"#;

const FAILING_PLAN: &str = r#"
test:
  suites:
  - name: failing suite
    cases:
    - name: false fails
      spec:
      - call: {target: "false"}
"#;

fn write(dir: &Path, name: &str, contents: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path.to_string_lossy().to_string()
}

fn sampletester() -> Command {
    let mut cmd = Command::cargo_bin("sampletester").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn passing_plan_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let plan = write(dir.path(), "plan.yaml", PASSING_PLAN);
    sampletester()
        .arg(&plan)
        .assert()
        .code(0)
        .stdout(contains("Tests passed"))
        .stderr(contains("PASSED: Test case: \"echo works\""));
}

#[test]
fn failing_plan_exits_one_and_shows_output() {
    let dir = tempfile::tempdir().unwrap();
    let plan = write(dir.path(), "plan.yaml", FAILING_PLAN);
    sampletester()
        .arg(&plan)
        .arg("--no-color")
        .assert()
        .code(1)
        .stdout(contains("Tests failed"))
        .stderr(contains("FAILED: Test case: \"false fails\"").and(contains("| # FAILED ASSERTION")));
}

#[test]
fn suppressed_quiet_failure_prints_nothing_on_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let plan = write(dir.path(), "plan.yaml", FAILING_PLAN);
    sampletester()
        .args(["-v", "quiet", "-f", &plan])
        .assert()
        .code(1)
        .stdout(contains("Tests failed").not());
}

#[test]
fn directory_of_plans_is_discovered() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "one.yaml", PASSING_PLAN);
    sampletester()
        .arg(dir.path())
        .assert()
        .code(0)
        .stderr(contains("shell suite"));
}

#[test]
fn environment_file_templates_commands() {
    let dir = tempfile::tempdir().unwrap();
    let envs = write(
        dir.path(),
        "local.env.yaml",
        r#"
environments:
- name: shouty
  command: "echo SHOUT-{target}"
"#,
    );
    let plan = write(
        dir.path(),
        "plan.yaml",
        r#"
test:
  suites:
  - name: templated
    cases:
    - name: uses template
      spec:
      - call: {target: product}
      - assert_contains: [{literal: SHOUT-product}]
"#,
    );
    sampletester()
        .args([&envs, &plan])
        .assert()
        .code(0)
        .stderr(contains("Test environment: \"shouty\""));
}

#[test]
fn env_filter_skips_environment() {
    let dir = tempfile::tempdir().unwrap();
    let plan = write(dir.path(), "plan.yaml", FAILING_PLAN);
    sampletester()
        .args(["--envs", "^nomatch$", &plan])
        .assert()
        .code(0)
        .stderr(contains("SKIPPED: Test environment: \"default\""));
}

#[test]
fn unknown_file_type_is_setup_error() {
    let dir = tempfile::tempdir().unwrap();
    let notes = write(dir.path(), "notes.txt", "");
    sampletester()
        .arg(&notes)
        .assert()
        .code(3)
        .stderr(contains("unknown file type"));
}

#[test]
fn invalid_filter_is_flag_error() {
    let dir = tempfile::tempdir().unwrap();
    let plan = write(dir.path(), "plan.yaml", PASSING_PLAN);
    sampletester()
        .args(["--suites", "(", &plan])
        .assert()
        .code(2)
        .stderr(contains("invalid suites filter"));
}

#[test]
fn unknown_flag_is_flag_error() {
    sampletester().args(["--bogus", "plan.yaml"]).assert().code(2);
}

#[test]
fn no_arguments_prints_help() {
    sampletester()
        .assert()
        .code(3)
        .stdout(contains("CONFIGS"));
}

#[test]
fn timeout_kills_hung_call() {
    let dir = tempfile::tempdir().unwrap();
    let plan = write(
        dir.path(),
        "plan.yaml",
        r#"
test:
  suites:
  - name: slow
    cases:
    - name: sleeps
      spec:
      - shell: ["sleep 5"]
"#,
    );
    sampletester()
        .args(["--timeout", "1", &plan])
        .assert()
        .code(1)
        .stderr(contains("CALL ERROR in stage TEST"));
}
