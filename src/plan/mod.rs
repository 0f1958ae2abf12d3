//! The plan tree: environments, suites and cases as they are selected and executed.
//!
//! ## Structure
//!
//! [`Manager`] builds one [`PlanEnvironment`] per registered environment, each with its
//! own copy of every suite. Each level splits into a `state` (the node's own data) and
//! its children, so a visitor can hold the parent state mutably while visiting a child.
//!
//! ## Selection
//!
//! Every node is selected once, at construction, by searching its name with the
//! matching filter regex. A suite additionally has to be `enabled`.

use std::rc::Rc;
use std::time::{Duration, SystemTime};

use regex::Regex;
use tracing::debug;

use crate::caserunner::{CaseRunner, Segment};
use crate::environment::{Environment, EnvironmentRegistry};
use crate::SampleError;

pub mod config;
pub mod visitor;

pub use config::{discover_plan_files, is_environment_file, suite_configs_from, CaseConfig, SuiteConfig};
pub use visitor::{MultiVisitor, Visit, Visitor};

// ============================================================================
// FILTERS
// ============================================================================

/// Name filters for environments, suites and cases. `None` selects everything.
#[derive(Debug, Clone, Default)]
pub struct Filters {
    pub environments: Option<Regex>,
    pub suites: Option<Regex>,
    pub cases: Option<Regex>,
}

impl Filters {
    pub fn new(
        environments: Option<&str>,
        suites: Option<&str>,
        cases: Option<&str>,
    ) -> Result<Self, SampleError> {
        Ok(Self {
            environments: compile_filter("envs", environments)?,
            suites: compile_filter("suites", suites)?,
            cases: compile_filter("cases", cases)?,
        })
    }
}

fn compile_filter(kind: &str, pattern: Option<&str>) -> Result<Option<Regex>, SampleError> {
    match pattern.filter(|p| !p.is_empty()) {
        None => Ok(None),
        Some(pattern) => Regex::new(pattern).map(Some).map_err(|e| {
            err_msg!(Config, "invalid {} filter \"{}\"", kind, pattern).with_source(e)
        }),
    }
}

/// An absent filter passes every name; otherwise the regex must match somewhere in it.
pub fn passes_filter(filter: Option<&Regex>, name: &str) -> bool {
    filter.map_or(true, |re| re.is_match(name))
}

// ============================================================================
// PLAN NODES
// ============================================================================

/// Bookkeeping shared by every plan node.
#[derive(Debug, Clone)]
pub struct PlanNode {
    pub start_time: Option<SystemTime>,
    pub end_time: Option<SystemTime>,
    pub num_errors: usize,
    pub num_failures: usize,
    pub selected: bool,
    /// Set when a visitor actually entered the node.
    pub attempted: bool,
    /// Set when the node's subtree finished, errors included. Stays false on interrupt.
    pub completed: bool,
}

impl PlanNode {
    pub fn new(selected: bool) -> Self {
        Self {
            start_time: None,
            end_time: None,
            num_errors: 0,
            num_failures: 0,
            selected,
            attempted: false,
            completed: false,
        }
    }

    /// Widens the node's time window to cover `[starting, ending]`.
    pub fn update_times(&mut self, starting: Option<SystemTime>, ending: Option<SystemTime>) {
        if let Some(starting) = starting {
            if self.start_time.map_or(true, |current| starting < current) {
                self.start_time = Some(starting);
            }
        }
        if let Some(ending) = ending {
            if self.end_time.map_or(true, |current| ending > current) {
                self.end_time = Some(ending);
            }
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        let (start, end) = (self.start_time?, self.end_time?);
        end.duration_since(start).ok()
    }

    pub fn success(&self) -> bool {
        self.num_errors == 0 && self.num_failures == 0
    }
}

pub struct EnvironmentState {
    pub node: PlanNode,
    pub environment: Rc<dyn Environment>,
    pub num_failing_cases: usize,
    pub num_failing_suites: usize,
    pub num_erroring_cases: usize,
    pub num_erroring_suites: usize,
}

impl EnvironmentState {
    pub fn name(&self) -> &str {
        self.environment.name()
    }

    pub fn success(&self) -> bool {
        self.node.success()
    }
}

pub struct PlanEnvironment {
    pub state: EnvironmentState,
    pub suites: Vec<PlanSuite>,
}

impl PlanEnvironment {
    pub fn new(environment: Rc<dyn Environment>, suites: &[SuiteConfig], filters: &Filters) -> Self {
        let selected = passes_filter(filters.environments.as_ref(), environment.name());
        Self {
            state: EnvironmentState {
                node: PlanNode::new(selected),
                environment,
                num_failing_cases: 0,
                num_failing_suites: 0,
                num_erroring_cases: 0,
                num_erroring_suites: 0,
            },
            suites: suites
                .iter()
                .map(|config| PlanSuite::new(config, filters))
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        self.state.name()
    }
}

pub struct SuiteState {
    pub node: PlanNode,
    pub name: String,
    pub source: std::path::PathBuf,
    pub enabled: bool,
    pub setup: Vec<Segment>,
    pub teardown: Vec<Segment>,
    pub num_failing_cases: usize,
    pub num_erroring_cases: usize,
}

impl SuiteState {
    /// Enabled and passing the suite filter.
    pub fn selected(&self) -> bool {
        self.enabled && self.node.selected
    }

    pub fn success(&self) -> bool {
        self.node.success()
    }
}

pub struct PlanSuite {
    pub state: SuiteState,
    pub cases: Vec<PlanCase>,
}

impl PlanSuite {
    pub fn new(config: &SuiteConfig, filters: &Filters) -> Self {
        Self {
            state: SuiteState {
                node: PlanNode::new(passes_filter(filters.suites.as_ref(), &config.name)),
                name: config.name.clone(),
                source: config.source.clone(),
                enabled: config.enabled,
                setup: config.setup.clone(),
                teardown: config.teardown.clone(),
                num_failing_cases: 0,
                num_erroring_cases: 0,
            },
            cases: config
                .cases
                .iter()
                .map(|case| PlanCase::new(case, filters))
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }
}

pub struct PlanCase {
    pub node: PlanNode,
    pub name: String,
    pub spec: Vec<Segment>,
    /// The interpreter that ran this case, once it has run.
    pub runner: Option<CaseRunner>,
}

impl PlanCase {
    pub fn new(config: &CaseConfig, filters: &Filters) -> Self {
        Self {
            node: PlanNode::new(passes_filter(filters.cases.as_ref(), &config.name)),
            name: config.name.clone(),
            spec: config.spec.clone(),
            runner: None,
        }
    }

    pub fn success(&self) -> bool {
        self.node.success()
    }
}

// ============================================================================
// MANAGER
// ============================================================================

/// Owns the plan tree and drives visitors over it.
pub struct Manager {
    environments: Vec<PlanEnvironment>,
}

impl Manager {
    pub fn new(registry: &EnvironmentRegistry, suites: &[SuiteConfig], filters: &Filters) -> Self {
        debug!("envs: {:?}", registry.get_names());
        Self {
            environments: registry
                .list()
                .iter()
                .map(|env| PlanEnvironment::new(Rc::clone(env), suites, filters))
                .collect(),
        }
    }

    pub fn environments(&self) -> &[PlanEnvironment] {
        &self.environments
    }

    /// Walks the tree depth-first in declaration order and returns `visitor.end_visit()`.
    ///
    /// A node is visited with `doit` true only when it and all its ancestors are selected.
    /// Exit hooks run only for levels whose enter hook returned [`Visit::Descend`]. An
    /// error from any hook (in practice, an interrupt) aborts the walk.
    pub fn accept(&mut self, visitor: &mut dyn Visitor) -> Result<bool, SampleError> {
        if visitor.start_visit() == Visit::Skip {
            return Ok(visitor.end_visit());
        }

        for env in &mut self.environments {
            let PlanEnvironment { state: env_state, suites } = env;
            let do_env = env_state.node.selected;
            if visitor.enter_environment(env_state, do_env)? == Visit::Skip {
                continue;
            }

            for (suite_num, suite) in suites.iter_mut().enumerate() {
                let PlanSuite { state: suite_state, cases } = suite;
                let do_suite = do_env && suite_state.selected();
                if visitor.enter_suite(env_state, suite_num, suite_state, do_suite)? == Visit::Skip {
                    continue;
                }

                for (idx, case) in cases.iter_mut().enumerate() {
                    let do_case = do_suite && case.node.selected;
                    visitor.visit_case(env_state, suite_state, idx, case, do_case)?;
                }

                visitor.exit_suite(env_state, suite_num, suite_state, do_suite)?;
            }

            visitor.exit_environment(env_state, do_env)?;
        }

        Ok(visitor.end_visit())
    }
}
