#![cfg(unix)]

mod common;

use std::rc::Rc;

use pretty_assertions::assert_eq;
use sampletester::plan::{Filters, Manager, MultiVisitor, Visitor};
use sampletester::runner::RunnerVisitor;
use sampletester::summary::{Detail, SummaryVisitor};

use common::{manager, registry, suites, ScriptedEnvironment};

fn scripted() -> Rc<ScriptedEnvironment> {
    Rc::new(
        ScriptedEnvironment::new("scripted")
            .target("echo_args", "echo")
            .target("fails", "false"),
    )
}

/// Descends everywhere and returns a fixed verdict.
struct Verdict(bool);

impl Visitor for Verdict {
    fn end_visit(&mut self) -> bool {
        self.0
    }
}

#[test]
fn uuid_and_literal_contains_suite_succeeds() {
    let env = scripted();
    let mut manager = manager(
        &[env.clone()],
        r#"
test:
  suites:
  - name: uuid suite
    setup:
    - uuid: id
    cases:
    - name: contains injected literal
      spec:
      - call: {target: echo_args, args: [{literal: injected}]}
      - assert_contains: [{literal: injected}]
"#,
    );
    let mut runner = RunnerVisitor::new(false);
    assert!(manager.accept(&mut runner).unwrap());

    let env_plan = &manager.environments()[0];
    let suite = &env_plan.suites[0];
    assert!(suite.state.success());
    assert_eq!(suite.state.node.num_failures, 0);
    assert_eq!(suite.state.node.num_errors, 0);
    assert!(suite.state.node.completed);
    assert!(suite.cases[0].node.completed);
    assert!(suite.cases[0].runner.as_ref().unwrap().scope().has("id"));
    assert_eq!(env.setups.get(), 1);
    assert_eq!(env.teardowns.get(), 1);
}

#[test]
fn unresolved_call_counts_one_error() {
    let env = scripted();
    let mut manager = manager(
        &[env],
        r#"
test:
  suites:
  - name: broken
    cases:
    - name: unknown target
      spec:
      - call: {target: nowhere}
      - log: [never]
"#,
    );
    let mut runner = RunnerVisitor::new(false);
    assert!(!manager.accept(&mut runner).unwrap());

    let env_plan = &manager.environments()[0];
    let suite = &env_plan.suites[0];
    let case = &suite.cases[0];
    assert_eq!(case.node.num_errors, 1);
    assert_eq!(suite.state.node.num_errors, 1);
    assert_eq!(suite.state.node.num_failures, 0);
    assert_eq!(suite.state.num_erroring_cases, 1);
    assert_eq!(env_plan.state.node.num_errors, 1);
    assert_eq!(env_plan.state.num_erroring_suites, 1);
    assert_eq!(env_plan.state.num_failing_suites, 0);
    let errors = case.runner.as_ref().unwrap().get_errors();
    assert!(errors[0].0.starts_with("CALL ERROR in stage TEST"));
}

#[test]
fn only_failing_suites_widen_the_environment_window() {
    let env = scripted();
    let mut manager = manager(
        &[env],
        r#"
test:
  suites:
  - name: passing
    cases:
    - name: echoes
      spec:
      - call: {target: echo_args}
  - name: failing
    cases:
    - name: exits nonzero
      spec:
      - call: {target: fails}
"#,
    );
    let mut runner = RunnerVisitor::new(false);
    assert!(!manager.accept(&mut runner).unwrap());

    let env_plan = &manager.environments()[0];
    let passing = &env_plan.suites[0].state.node;
    let failing = &env_plan.suites[1].state.node;
    assert!(passing.start_time.is_some() && passing.completed);
    assert_eq!(env_plan.state.node.start_time, failing.start_time);
    assert_eq!(env_plan.state.node.end_time, failing.end_time);
    assert!(env_plan.state.node.start_time > passing.start_time);
}

#[test]
fn multi_visitor_verdict_is_conjunction() {
    for (a, b) in [(true, true), (true, false), (false, true), (false, false)] {
        let mut manager = manager(&[scripted()], "test: {suites: [{name: s, cases: [{name: c}]}]}");
        let mut first = Verdict(a);
        let mut second = Verdict(b);
        let mut multi = MultiVisitor::new().with(&mut first).with(&mut second);
        assert_eq!(manager.accept(&mut multi).unwrap(), a && b);
    }
}

#[test]
fn fail_fast_preempts_remaining_nodes() {
    let first_env = scripted();
    let second_env = Rc::new(ScriptedEnvironment::new("second").target("echo_args", "echo"));
    let mut manager = manager(
        &[first_env.clone(), second_env.clone()],
        r#"
test:
  suites:
  - name: first
    cases:
    - name: failing
      spec:
      - call: {target: fails}
    - name: after failure
      spec:
      - log: [should not run]
  - name: second
    cases:
    - name: never
"#,
    );
    let mut runner = RunnerVisitor::new(true);
    assert!(!manager.accept(&mut runner).unwrap());
    assert!(runner.encountered_failure());

    let env_plan = &manager.environments()[0];
    let first = &env_plan.suites[0];
    assert!(first.cases[0].node.attempted);
    assert!(!first.cases[1].node.attempted);
    assert!(first.cases[1].runner.is_none());
    assert!(!env_plan.suites[1].state.node.attempted);
    assert!(!env_plan.suites[1].cases[0].node.attempted);

    let second_plan = &manager.environments()[1];
    assert!(!second_plan.state.node.attempted);
    assert_eq!(second_env.setups.get(), 0);
    assert_eq!(first_env.teardowns.get(), 1);
}

#[test]
fn filters_deselect_without_running() {
    let env = scripted();
    let mut manager = Manager::new(
        &registry(&[env.clone()]),
        &suites(
            r#"
test:
  suites:
  - name: kept
    cases:
    - name: create product
      spec: [{call: {target: echo_args}}]
    - name: delete product
      spec: [{call: {target: echo_args}}]
  - name: disabled
    enabled: false
    cases:
    - name: create other
"#,
        ),
        &Filters::new(None, None, Some("^create")).unwrap(),
    );
    let mut runner = RunnerVisitor::new(false);
    let mut summary = SummaryVisitor::new(Detail::Brief, true);
    {
        let mut multi = MultiVisitor::new().with(&mut runner).with(&mut summary);
        assert!(manager.accept(&mut multi).unwrap());
    }
    assert_eq!(env.resolved.borrow().len(), 1);
    assert_eq!(
        summary.output(),
        [
            "RUNNING: Test environment: \"scripted\"",
            "  RUNNING: Test suite: \"kept\"",
            "    PASSED: Test case: \"create product\"",
            "    SKIPPED: Test case: \"delete product\"",
            "  SKIPPED: Test suite: \"disabled\"",
            "    SKIPPED: Test case: \"create other\"",
        ]
        .join("\n")
    );
}

#[test]
fn summary_attaches_output_of_failing_cases() {
    let mut manager = manager(
        &[scripted()],
        r#"
test:
  suites:
  - name: s
    cases:
    - name: bad
      spec:
      - call: {target: fails}
"#,
    );
    let mut runner = RunnerVisitor::new(false);
    let mut summary = SummaryVisitor::new(Detail::Brief, true);
    {
        let mut multi = MultiVisitor::new().with(&mut runner).with(&mut summary);
        assert!(!manager.accept(&mut multi).unwrap());
    }
    let output = summary.output();
    assert!(output.contains("    FAILED: Test case: \"bad\""));
    assert!(output.contains("      | # FAILED ASSERTION: call failed: \"fails\""));
}

#[test]
fn quiet_summary_hides_passing_environments() {
    let mut manager = manager(&[scripted()], "test: {suites: [{name: s, cases: [{name: c}]}]}");
    let mut runner = RunnerVisitor::new(false);
    let mut summary = SummaryVisitor::new(Detail::None, true);
    {
        let mut multi = MultiVisitor::new().with(&mut runner).with(&mut summary);
        assert!(manager.accept(&mut multi).unwrap());
    }
    assert!(summary.lines().is_empty());
}
