//! Visitors over the plan tree.
//!
//! [`Manager::accept`](super::Manager::accept) calls the hooks of a [`Visitor`] in this
//! order for every environment, suite and case:
//!
//! ```text
//! start_visit
//!   enter_environment
//!     enter_suite
//!       visit_case ...
//!     exit_suite
//!   exit_environment
//! end_visit
//! ```
//!
//! Returning [`Visit::Skip`] from an enter hook skips the subtree *and* its exit hook.
//! Returning [`Visit::Descend`] guarantees the matching exit hook is called, whatever
//! the `doit` flag, unless the walk is aborted by an error.

use super::{EnvironmentState, PlanCase, SuiteState};
use crate::SampleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Descend,
    Skip,
}

impl Visit {
    pub fn is_descend(self) -> bool {
        self == Visit::Descend
    }
}

#[allow(unused_variables)]
pub trait Visitor {
    fn start_visit(&mut self) -> Visit {
        Visit::Descend
    }

    fn enter_environment(
        &mut self,
        env: &mut EnvironmentState,
        doit: bool,
    ) -> Result<Visit, SampleError> {
        Ok(Visit::Descend)
    }

    fn enter_suite(
        &mut self,
        env: &mut EnvironmentState,
        idx: usize,
        suite: &mut SuiteState,
        doit: bool,
    ) -> Result<Visit, SampleError> {
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
        Ok(())
    }

    fn exit_suite(
        &mut self,
        env: &mut EnvironmentState,
        idx: usize,
        suite: &mut SuiteState,
        doit: bool,
    ) -> Result<(), SampleError> {
        Ok(())
    }

    fn exit_environment(&mut self, env: &mut EnvironmentState, doit: bool) -> Result<(), SampleError> {
        Ok(())
    }

    /// The visitor's verdict for the whole walk.
    fn end_visit(&mut self) -> bool {
        true
    }
}

// ============================================================================
// MULTI VISITOR
// ============================================================================

/// Applies several visitors in registration order at every level of one walk.
///
/// Each sub-visitor sees exactly the hooks it would see if it walked alone: it is only
/// called below a level it chose to descend into, and its exit hooks pair with its own
/// enter hooks.
pub struct MultiVisitor<'a> {
    visitors: Vec<&'a mut dyn Visitor>,
    started: Vec<bool>,
    env_active: Vec<bool>,
    suite_active: Vec<bool>,
}

impl<'a> MultiVisitor<'a> {
    pub fn new() -> Self {
        Self {
            visitors: Vec::new(),
            started: Vec::new(),
            env_active: Vec::new(),
            suite_active: Vec::new(),
        }
    }

    /// Registers another visitor after the existing ones.
    pub fn with(mut self, visitor: &'a mut dyn Visitor) -> Self {
        self.visitors.push(visitor);
        self.started.push(false);
        self.env_active.push(false);
        self.suite_active.push(false);
        self
    }
}

impl Default for MultiVisitor<'_> {
    fn default() -> Self {
        Self::new()
    }
}

fn any_descend(active: &[bool]) -> Visit {
    if active.iter().any(|a| *a) {
        Visit::Descend
    } else {
        Visit::Skip
    }
}

impl Visitor for MultiVisitor<'_> {
    fn start_visit(&mut self) -> Visit {
        for (visitor, started) in self.visitors.iter_mut().zip(self.started.iter_mut()) {
            *started = visitor.start_visit().is_descend();
        }
        any_descend(&self.started)
    }

    fn enter_environment(
        &mut self,
        env: &mut EnvironmentState,
        doit: bool,
    ) -> Result<Visit, SampleError> {
        for (i, visitor) in self.visitors.iter_mut().enumerate() {
            self.env_active[i] = self.started[i] && visitor.enter_environment(env, doit)?.is_descend();
        }
        Ok(any_descend(&self.env_active))
    }

    fn enter_suite(
        &mut self,
        env: &mut EnvironmentState,
        idx: usize,
        suite: &mut SuiteState,
        doit: bool,
    ) -> Result<Visit, SampleError> {
        for (i, visitor) in self.visitors.iter_mut().enumerate() {
            self.suite_active[i] =
                self.env_active[i] && visitor.enter_suite(env, idx, suite, doit)?.is_descend();
        }
        Ok(any_descend(&self.suite_active))
    }

    fn visit_case(
        &mut self,
        env: &mut EnvironmentState,
        suite: &mut SuiteState,
        idx: usize,
        case: &mut PlanCase,
        doit: bool,
    ) -> Result<(), SampleError> {
        for (i, visitor) in self.visitors.iter_mut().enumerate() {
            if self.suite_active[i] {
                visitor.visit_case(env, suite, idx, case, doit)?;
            }
        }
        Ok(())
    }

    fn exit_suite(
        &mut self,
        env: &mut EnvironmentState,
        idx: usize,
        suite: &mut SuiteState,
        doit: bool,
    ) -> Result<(), SampleError> {
        for (i, visitor) in self.visitors.iter_mut().enumerate() {
            if self.suite_active[i] {
                visitor.exit_suite(env, idx, suite, doit)?;
            }
        }
        self.suite_active.iter_mut().for_each(|a| *a = false);
        Ok(())
    }

    fn exit_environment(&mut self, env: &mut EnvironmentState, doit: bool) -> Result<(), SampleError> {
        for (i, visitor) in self.visitors.iter_mut().enumerate() {
            if self.env_active[i] {
                visitor.exit_environment(env, doit)?;
            }
        }
        self.env_active.iter_mut().for_each(|a| *a = false);
        Ok(())
    }

    /// True only if every sub-visitor's verdict is true. All of them are asked.
    fn end_visit(&mut self) -> bool {
        let verdicts: Vec<bool> = self.visitors.iter_mut().map(|v| v.end_visit()).collect();
        verdicts.into_iter().all(|v| v)
    }
}
