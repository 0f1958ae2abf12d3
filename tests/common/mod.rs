//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

use sampletester::environment::{format_call_args, Environment, EnvironmentRegistry, ResolvedCall};
use sampletester::plan::config::parse_suites;
use sampletester::plan::{Filters, Manager, SuiteConfig};
use sampletester::{err_msg, SampleError};

/// An environment resolving targets through a fixed table of shell commands.
///
/// Counts lifecycle calls and records every resolved command line.
pub struct ScriptedEnvironment {
    name: String,
    targets: BTreeMap<String, String>,
    pub setups: Cell<usize>,
    pub teardowns: Cell<usize>,
    pub resolved: RefCell<Vec<String>>,
}

impl ScriptedEnvironment {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            targets: BTreeMap::new(),
            setups: Cell::new(0),
            teardowns: Cell::new(0),
            resolved: RefCell::new(Vec::new()),
        }
    }

    pub fn target(mut self, name: &str, command: &str) -> Self {
        self.targets.insert(name.to_string(), command.to_string());
        self
    }
}

impl Environment for ScriptedEnvironment {
    fn name(&self) -> &str {
        &self.name
    }

    fn setup(&self) -> Result<(), SampleError> {
        self.setups.set(self.setups.get() + 1);
        Ok(())
    }

    fn teardown(&self) -> Result<(), SampleError> {
        self.teardowns.set(self.teardowns.get() + 1);
        Ok(())
    }

    fn get_call(
        &self,
        invocation: &str,
        args: &[String],
        kwargs: &BTreeMap<String, String>,
    ) -> Result<ResolvedCall, SampleError> {
        let base = self
            .targets
            .get(invocation)
            .ok_or_else(|| err_msg!(Call, "no artifact \"{}\" in {}", invocation, self.name))?;
        let rendered = format_call_args(args, kwargs);
        let command = if rendered.is_empty() {
            base.clone()
        } else {
            format!("{} {}", base, rendered)
        };
        self.resolved.borrow_mut().push(command.clone());
        Ok(ResolvedCall::new(command))
    }
}

pub fn suites(yaml: &str) -> Vec<SuiteConfig> {
    parse_suites(yaml, Path::new("inline.yaml")).expect("valid test plan")
}

pub fn registry(envs: &[Rc<ScriptedEnvironment>]) -> EnvironmentRegistry {
    let mut registry = EnvironmentRegistry::new();
    for env in envs {
        registry.add_environment(env.clone());
    }
    registry
}

pub fn manager(envs: &[Rc<ScriptedEnvironment>], yaml: &str) -> Manager {
    Manager::new(&registry(envs), &suites(yaml), &Filters::default())
}
