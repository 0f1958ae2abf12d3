//! The executing visitor.
//!
//! [`RunnerVisitor`] runs every selected case through a fresh [`CaseRunner`] and folds the
//! resulting counts up into its suite and environment. In fail-fast mode, once any case
//! fails or errors, every node visited afterwards is left unattempted.

use tracing::info;

use crate::caserunner::{CaseRunner, RunOptions};
use crate::plan::{EnvironmentState, PlanCase, SuiteState, Visit, Visitor};
use crate::SampleError;

pub struct RunnerVisitor {
    fail_fast: bool,
    options: RunOptions,
    run_passed: bool,
    encountered_failure: bool,
}

impl RunnerVisitor {
    pub fn new(fail_fast: bool) -> Self {
        Self {
            fail_fast,
            options: RunOptions::default(),
            run_passed: true,
            encountered_failure: false,
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn success(&self) -> bool {
        self.run_passed
    }

    pub fn encountered_failure(&self) -> bool {
        self.encountered_failure
    }

    fn preempted(&self) -> bool {
        self.fail_fast && self.encountered_failure
    }
}

impl Visitor for RunnerVisitor {
    fn start_visit(&mut self) -> Visit {
        info!("========== Running test!");
        Visit::Descend
    }

    fn enter_environment(
        &mut self,
        env: &mut EnvironmentState,
        doit: bool,
    ) -> Result<Visit, SampleError> {
        if !doit {
            info!("skipping environment \"{}\"", env.name());
            return Ok(Visit::Skip);
        }
        if self.preempted() {
            info!("fail fast: not running environment \"{}\"", env.name());
            return Ok(Visit::Skip);
        }

        env.node.attempted = true;
        env.environment.setup()?;
        Ok(Visit::Descend)
    }

    fn enter_suite(
        &mut self,
        env: &mut EnvironmentState,
        idx: usize,
        suite: &mut SuiteState,
        doit: bool,
    ) -> Result<Visit, SampleError> {
        if !doit {
            info!("skipping suite \"{}\"", suite.name);
            return Ok(Visit::Skip);
        }
        if self.preempted() {
            info!("fail fast: not running suite \"{}\"", suite.name);
            return Ok(Visit::Skip);
        }

        suite.node.attempted = true;
        info!(
            "\n==== SUITE {}:{}:{} START  ==========================================",
            env.name(),
            idx,
            suite.name
        );
        info!("     {}", suite.source.display());
        Ok(Visit::Descend)
    }

    fn visit_case(
        &mut self,
        env: &mut EnvironmentState,
        suite: &mut SuiteState,
        idx: usize,
        case: &mut PlanCase,
        doit: bool,
    ) -> Result<(), SampleError> {
        if !doit {
            info!("skipping case \"{}\"", case.name);
            return Ok(());
        }
        if self.preempted() {
            info!("fail fast: not running case \"{}\"", case.name);
            return Ok(());
        }

        case.node.attempted = true;
        let runner = case.runner.insert(
            CaseRunner::new(
                env.environment.clone(),
                idx,
                case.name.as_str(),
                suite.setup.clone(),
                case.spec.clone(),
                suite.teardown.clone(),
            )
            .with_options(self.options.clone()),
        );
        runner.run()?;

        let num_failures = runner.failures().len();
        case.node.num_failures += num_failures;
        suite.node.num_failures += num_failures;
        if num_failures > 0 {
            suite.num_failing_cases += 1;
        }

        let num_errors = runner.errors().len();
        case.node.num_errors += num_errors;
        suite.node.num_errors += num_errors;
        if num_errors > 0 {
            suite.num_erroring_cases += 1;
        }

        case.node.update_times(runner.start_time(), runner.end_time());
        suite.node.update_times(runner.start_time(), runner.end_time());
        self.encountered_failure = self.encountered_failure || num_failures > 0 || num_errors > 0;
        case.node.completed = true;
        Ok(())
    }

    fn exit_suite(
        &mut self,
        env: &mut EnvironmentState,
        idx: usize,
        suite: &mut SuiteState,
        _doit: bool,
    ) -> Result<(), SampleError> {
        if suite.success() {
            info!(
                "==== SUITE {}:{}:{} SUCCESS ========================================",
                env.name(),
                idx,
                suite.name
            );
        } else {
            env.node.num_failures += suite.node.num_failures;
            env.num_failing_cases += suite.num_failing_cases;
            if suite.node.num_failures > 0 {
                env.num_failing_suites += 1;
            }

            env.node.num_errors += suite.node.num_errors;
            env.num_erroring_cases += suite.num_erroring_cases;
            if suite.node.num_errors > 0 {
                env.num_erroring_suites += 1;
            }
            env.node.update_times(suite.node.start_time, suite.node.end_time);

            info!(
                "==== SUITE {}:{}:{} FAILURE ========================================",
                env.name(),
                idx,
                suite.name
            );
        }
        suite.node.completed = true;
        Ok(())
    }

    fn exit_environment(&mut self, env: &mut EnvironmentState, _doit: bool) -> Result<(), SampleError> {
        if !env.success() {
            self.run_passed = false;
        }
        env.node.completed = true;
        env.environment.teardown()
    }

    fn end_visit(&mut self) -> bool {
        info!("========== Finished running test");
        self.success()
    }
}
