#![cfg(unix)]

mod common;

use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use pretty_assertions::assert_eq;
use sampletester::cancel::CancellationToken;
use sampletester::caserunner::{
    CaseRunner, RunOptions, Segment, Value, STATUS_FAILED_ASSERTION, STATUS_FAILED_EXPECTATION,
};
use sampletester::SampleError;
use sampletester::environment::format_call_args;

use common::ScriptedEnvironment;

fn segments(yaml: &str) -> Vec<Segment> {
    serde_yaml::from_str(yaml).unwrap()
}

fn env() -> Rc<ScriptedEnvironment> {
    Rc::new(
        ScriptedEnvironment::new("scripted")
            .target("greet", "echo hello")
            .target("boom", "sh -c 'echo broken; exit 2'")
            .target("print_id", "echo id:")
            .target("slow", "sleep 0.5; exit 130"),
    )
}

fn case(env: &Rc<ScriptedEnvironment>, idx: usize, setup: &str, test: &str, teardown: &str) -> CaseRunner {
    CaseRunner::new(
        env.clone(),
        idx,
        format!("case {}", idx),
        segments(setup),
        segments(test),
        segments(teardown),
    )
}

#[test]
fn teardown_runs_after_aborted_setup_and_test() {
    let env = env();
    let mut runner = case(
        &env,
        0,
        "[{call: {target: boom}}, {log: [setup-after-abort]}]",
        "[{frobnicate: {}}, {log: [test-after-error]}]",
        "[{log: [teardown-ran]}]",
    );
    let count = runner.run().unwrap();

    assert_eq!(count, 2);
    let output = runner.output();
    let setup = output.find("### Test case SETUP").unwrap();
    let test = output.find("### Test case TEST").unwrap();
    let teardown = output.find("### Test case TEARDOWN").unwrap();
    assert!(setup < test && test < teardown);
    assert!(output.contains("teardown-ran"));
    assert!(!output.contains("setup-after-abort"));
    assert!(!output.contains("test-after-error"));
}

#[test]
fn unregistered_directive_halts_stage_and_records_error() {
    let env = env();
    let mut runner = case(
        &env,
        0,
        "[]",
        "[{call: {target: greet}}, {not_a_directive: 1}, {call: {target: greet}}]",
        "[]",
    );
    assert_eq!(runner.run().unwrap(), 1);
    assert_eq!(env.resolved.borrow().len(), 1);
    let errors = runner.get_errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].0.starts_with("UNHANDLED EXCEPTION in stage TEST"));
}

#[test]
fn nonzero_call_is_failure_naming_the_invocation() {
    let env = env();
    let mut runner = case(
        &env,
        0,
        "[]",
        "[{call: {target: boom, args: [{literal: x}]}}]",
        "[]",
    );
    assert!(runner.run().unwrap() >= 1);
    let failures = runner.get_failures();
    assert_eq!(failures[0].0, STATUS_FAILED_ASSERTION);
    assert_eq!(failures[0].1, "call failed: \"boom \"x\"\"");
    assert!(runner.output().contains("# ... call did not succeed  broken"));
}

#[test]
fn call_may_fail_keeps_going_and_exposes_result() {
    let env = env();
    let mut runner = case(
        &env,
        0,
        "[]",
        r#"
- call_may_fail: {target: boom}
- assert_failure: ["boom should fail"]
- assert_contains: [{literal: broken}]
- log: ["last output was {}", _last_call_output]
"#,
        "[]",
    );
    assert_eq!(runner.run().unwrap(), 0);
    assert!(runner.output().contains("last output was broken"));
    assert!(runner.get_failures().is_empty());
    assert_eq!(runner.last_return_code(), 2);
    assert_eq!(runner.last_call_output(), "broken\n");
}

#[test]
fn call_may_fail_result_is_usable_from_code() {
    let env = env();
    let mut runner = case(
        &env,
        0,
        "[]",
        r#"
- code: |
    (set! result (call_may_fail "boom"))
    (expect (eq? (nth result 0) 2) "unexpected code {}" (nth result 0))
    (assert_that (contains? (nth result 1) "broken") "missing output")
"#,
        "[]",
    );
    assert_eq!(runner.run().unwrap(), 0);
    assert_eq!(
        runner.scope().get("result"),
        Some(&Value::List(vec![Value::Int(2), Value::from("broken\n")]))
    );
}

#[test]
fn extract_match_without_match_clears_targets() {
    let env = env();
    let mut runner = case(
        &env,
        0,
        r#"[{code: '(set! id "stale") (set! a "stale")'}]"#,
        r#"
- call: {target: greet}
- extract_match: {pattern: 'id=(\d+)', variable: id}
- extract_match: {pattern: 'x(.)y(.)', groups: [a, b]}
"#,
        "[]",
    );
    assert_eq!(runner.run().unwrap(), 0);
    assert_eq!(runner.scope().get("id"), Some(&Value::Nil));
    assert_eq!(runner.scope().get("a"), Some(&Value::Nil));
    assert_eq!(runner.scope().get("b"), Some(&Value::Nil));
}

#[test]
fn extract_match_binds_capture() {
    let env = env();
    let mut runner = case(
        &env,
        7,
        "[]",
        r#"
- call: {target: print_id, args: [{variable: testcase_num}]}
- extract_match: {pattern: 'id: (\d+)', variable: id}
- log: ["extracted {}", id]
"#,
        "[]",
    );
    assert_eq!(runner.run().unwrap(), 0);
    assert_eq!(runner.scope().get("id"), Some(&Value::from("7")));
    assert!(runner.output().contains("extracted 7"));
}

#[test]
fn uuids_are_unique_across_cases() {
    let env = env();
    let mut seen = HashSet::new();
    for idx in 0..1000 {
        let mut runner = case(&env, idx, "[{uuid: id}]", "[]", "[]");
        assert_eq!(runner.run().unwrap(), 0);
        let id = runner.scope().get("id").and_then(Value::as_str).unwrap().to_string();
        assert!(uuid::Uuid::parse_str(&id).is_ok());
        seen.insert(id);
    }
    assert_eq!(seen.len(), 1000);
}

#[test]
fn call_formatting_orders_named_then_positional() {
    let kwargs: BTreeMap<String, String> = [("x", "1"), ("_2", "b"), ("_1", "a")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    assert_eq!(
        format_call_args(&["extra".to_string()], &kwargs),
        r#"--x="1" "a" "b" "extra""#
    );
}

#[test]
fn call_params_reach_the_environment_formatted() {
    let env = env();
    let mut runner = case(
        &env,
        0,
        "[{uuid: product}]",
        r#"
- call:
    target: greet
    params:
      region: {literal: us}
      _1: {variable: testcase_id}
    args: [{literal: last}]
"#,
        "[]",
    );
    assert_eq!(runner.run().unwrap(), 0);
    assert_eq!(
        *env.resolved.borrow(),
        vec![r#"echo hello --region="us" "case 0" "last""#.to_string()]
    );
}

#[test]
fn abort_from_code_fails_the_case() {
    let env = env();
    let mut runner = case(&env, 0, "[]", "[{code: \"(abort)\"}, {log: [after]}]", "[]");
    assert!(runner.run().unwrap() >= 1);
    assert_eq!(
        runner.get_failures(),
        vec![(STATUS_FAILED_ASSERTION.to_string(), "abort called".to_string())]
    );
    assert!(runner.output().contains("# FAILED ASSERTION: abort called"));
    assert!(!runner.output().contains("\nafter\n"));
}

#[test]
fn fail_from_code_records_message_and_continues() {
    let env = env();
    let mut runner = case(&env, 0, "[]", "[{code: \"(fail)\"}, {log: [after]}]", "[]");
    assert_eq!(runner.run().unwrap(), 1);
    assert_eq!(
        runner.get_failures(),
        vec![(STATUS_FAILED_EXPECTATION.to_string(), "failure".to_string())]
    );
    assert!(runner.output().contains("# FAILED EXPECTATION: failure"));
    assert!(runner.output().contains("\nafter\n"));
}

#[test]
fn shell_appends_each_argument_as_a_word() {
    let env = env();
    let mut runner = case(
        &env,
        0,
        "[]",
        "[{shell: [echo, hello]}, {assert_success: ~}, {assert_contains: [{literal: hello}]}]",
        "[]",
    );
    assert_eq!(runner.run().unwrap(), 0);
    assert_eq!(runner.last_return_code(), 0);
    assert_eq!(runner.last_call_output(), "hello\n");
    assert!(runner.output().contains("# Calling: echo \"hello\""));
}

#[test]
fn env_binds_process_variable() {
    std::env::set_var("SAMPLETESTER_CASE_REGION", "eu-west");
    let env = env();
    let mut runner = case(
        &env,
        0,
        "[{env: {var: region, what: SAMPLETESTER_CASE_REGION}}]",
        "[{shell: [echo, region]}, {assert_contains: [{literal: eu-west}]}]",
        "[]",
    );
    assert_eq!(runner.run().unwrap(), 0);
    assert_eq!(runner.scope().get("region"), Some(&Value::from("eu-west")));
    assert_eq!(runner.last_call_output(), "eu-west\n");
}

#[test]
fn interrupt_during_final_call_is_not_a_failure() {
    let env = env();
    let cancel = CancellationToken::new();
    let mut runner = case(&env, 0, "[]", "[{call: {target: slow}}]", "[]").with_options(RunOptions {
        timeout: None,
        cancel: cancel.clone(),
    });

    let trigger = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        cancel.cancel();
    });
    let result = runner.run();
    trigger.join().unwrap();

    assert!(matches!(result, Err(SampleError::Interrupted)));
    assert!(runner.failures().is_empty());
    assert!(runner.errors().is_empty());
    assert!(runner.output().contains("KEYBOARD INTERRUPT in stage TEST"));
}
