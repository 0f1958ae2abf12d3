//! Execution environments and call resolution.
//!
//! An [`Environment`] is a named execution context (typically one sample language or
//! deployment target). The core never builds environments itself: it receives them through
//! an [`EnvironmentRegistry`] and only uses the capability surface defined here.
//!
//! ## Call formatting
//!
//! Every environment that turns an invocation into a command line must render arguments
//! with [`format_call_args`], so that the same test plan yields byte-identical command
//! lines across environments.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::rc::Rc;

use tracing::{debug, info};

use crate::SampleError;

pub mod template;

pub use template::{
    load_environment_file, TemplateEnvironment, TemplateEnvironmentConfig, DEFAULT_ENVIRONMENT,
};

/// Keyword arguments whose name starts with this sentinel are rendered positionally.
pub const POSITIONAL_KWARG_PREFIX: char = '_';

// ============================================================================
// CORE TYPES
// ============================================================================

/// A command line produced by [`Environment::get_call`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCall {
    pub command: String,
    pub working_dir: Option<PathBuf>,
}

impl ResolvedCall {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            working_dir: None,
        }
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

/// The capability a test case runs against.
///
/// `setup` and `teardown` are called exactly once per run, bracketing every suite
/// executed against the environment. `get_call` must fail with a `Call` error when the
/// invocation does not name a known artifact.
pub trait Environment {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn setup(&self) -> Result<(), SampleError> {
        info!("{}: setup", self.name());
        Ok(())
    }

    fn teardown(&self) -> Result<(), SampleError> {
        info!("{}: teardown", self.name());
        Ok(())
    }

    fn get_call(
        &self,
        invocation: &str,
        args: &[String],
        kwargs: &BTreeMap<String, String>,
    ) -> Result<ResolvedCall, SampleError>;
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Stores the registered environments in registration order.
#[derive(Default)]
pub struct EnvironmentRegistry {
    envs: Vec<Rc<dyn Environment>>,
}

impl EnvironmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `environment`, replacing (in place) any environment with the same name.
    pub fn add_environment(&mut self, environment: Rc<dyn Environment>) {
        debug!("registering environment \"{}\"", environment.name());
        match self
            .envs
            .iter_mut()
            .find(|existing| existing.name() == environment.name())
        {
            Some(slot) => *slot = environment,
            None => self.envs.push(environment),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Rc<dyn Environment>> {
        self.envs.iter().find(|env| env.name() == name)
    }

    pub fn get_names(&self) -> Vec<String> {
        self.envs.iter().map(|env| env.name().to_string()).collect()
    }

    pub fn list(&self) -> &[Rc<dyn Environment>] {
        &self.envs
    }

    pub fn len(&self) -> usize {
        self.envs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.envs.is_empty()
    }
}

// ============================================================================
// CALL FORMATTING
// ============================================================================

pub fn quote(s: &str) -> String {
    format!("\"{}\"", s)
}

/// Renders call arguments in canonical order.
///
/// Named kwargs come first as `--name="value"`, sorted by name. Kwargs whose name starts
/// with `_` follow as quoted values only, also sorted by name. Plain positional arguments
/// close the line in their original order.
pub fn format_call_args(args: &[String], kwargs: &BTreeMap<String, String>) -> String {
    let (positional_kwargs, named_kwargs): (Vec<_>, Vec<_>) = kwargs
        .iter()
        .partition(|(name, _)| name.starts_with(POSITIONAL_KWARG_PREFIX));

    let mut cmd_args = Vec::with_capacity(kwargs.len() + args.len());
    for (name, value) in named_kwargs {
        cmd_args.push(format!("--{}={}", name, quote(value)));
    }
    for (_, value) in positional_kwargs {
        cmd_args.push(quote(value));
    }
    cmd_args.extend(args.iter().map(|a| quote(a)));
    cmd_args.join(" ")
}

/// Splits an invocation into its artifact name and the rendered argument string.
pub fn process_args(
    invocation: &[String],
    kwargs: &BTreeMap<String, String>,
) -> Result<(String, String), SampleError> {
    let (artifact, rest) = invocation
        .split_first()
        .ok_or_else(|| err_msg!(Call, "call requires an artifact name"))?;
    Ok((artifact.clone(), format_call_args(rest, kwargs)))
}
