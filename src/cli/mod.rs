//! The sample tester command-line interface.
//!
//! This module is the main entry point of the binary and orchestrates the library: it
//! classifies the given files, loads environments and test plans, and walks the plan
//! with the runner and summary visitors.

use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use termcolor::StandardStream;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cancel::CancellationToken;
use crate::caserunner::RunOptions;
use crate::environment::{load_environment_file, EnvironmentRegistry, TemplateEnvironment};
use crate::plan::{
    discover_plan_files, is_environment_file, suite_configs_from, Filters, Manager, MultiVisitor,
};
use crate::runner::RunnerVisitor;
use crate::summary::{Detail, SummaryVisitor};
use crate::SampleError;

pub mod args;
pub mod output;

pub use args::{LogLevel, SampleTesterArgs, Verbosity};

pub const EXITCODE_SUCCESS: i32 = 0;
pub const EXITCODE_TEST_FAILURE: i32 = 1;
pub const EXITCODE_FLAG_ERROR: i32 = 2;
pub const EXITCODE_SETUP_ERROR: i32 = 3;
pub const EXITCODE_USER_ABORT: i32 = 4;

/// The main entry point for the CLI. Returns the process exit code.
pub fn run() -> i32 {
    let args = match SampleTesterArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = if e.use_stderr() {
                EXITCODE_FLAG_ERROR
            } else {
                EXITCODE_SUCCESS
            };
            let _ = e.print();
            return code;
        }
    };
    if args.files.is_empty() {
        let _ = SampleTesterArgs::command().print_help();
        return EXITCODE_SETUP_ERROR;
    }

    init_logging(args.logging);
    info!("argv: {:?}", std::env::args().collect::<Vec<_>>());
    run_with(&args)
}

/// Runs the tests described by already-parsed arguments.
pub fn run_with(args: &SampleTesterArgs) -> i32 {
    let usage = SampleTesterArgs::command().render_usage().to_string();
    let color = args.color_choice();

    let filters = match Filters::new(args.envs.as_deref(), args.suites.as_deref(), args.cases.as_deref()) {
        Ok(filters) => filters,
        Err(e) => {
            output::print_setup_error(e, &usage);
            return EXITCODE_FLAG_ERROR;
        }
    };

    let mut manager = match build_manager(&args.files, &filters) {
        Ok(Some(manager)) => manager,
        Ok(None) => return EXITCODE_SUCCESS,
        Err(e) => {
            output::print_setup_error(e, &usage);
            return EXITCODE_SETUP_ERROR;
        }
    };

    let cancel = CancellationToken::new();
    install_interrupt_handler(&cancel);
    let options = RunOptions {
        timeout: args.timeout.map(Duration::from_secs),
        cancel,
    };

    let detail = args.verbosity.detail();
    let mut runner = RunnerVisitor::new(args.fail_fast).with_options(options);
    let mut summary = SummaryVisitor::new(detail, !args.suppress_failures)
        .with_debug(args.logging == LogLevel::Debug)
        .with_progress(Box::new(StandardStream::stderr(color)));

    let result = {
        let mut visitor = MultiVisitor::new().with(&mut runner).with(&mut summary);
        manager.accept(&mut visitor)
    };

    let success = match result {
        Ok(success) => success,
        Err(SampleError::Interrupted) => {
            output::print_interrupt();
            return EXITCODE_USER_ABORT;
        }
        Err(e) => {
            output::print_setup_error(e, &usage);
            return EXITCODE_SETUP_ERROR;
        }
    };

    let quiet = detail == Detail::None;
    if !quiet || (!success && !args.suppress_failures) {
        output::print_verdict(success, color);
    }
    if success {
        EXITCODE_SUCCESS
    } else {
        EXITCODE_TEST_FAILURE
    }
}

// ============================================================================
// SETUP
// ============================================================================

/// Test plans and environment files named on the command line.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct InputFiles {
    pub plans: Vec<PathBuf>,
    pub environments: Vec<PathBuf>,
}

/// Sorts the given paths into plans and environment files, expanding directories.
pub fn classify_files(paths: &[PathBuf]) -> Result<InputFiles, SampleError> {
    let mut files = InputFiles::default();
    for path in paths {
        if path.is_dir() {
            files.plans.extend(discover_plan_files(path));
        } else if is_environment_file(path) {
            files.environments.push(path.clone());
        } else if has_yaml_extension(path) {
            files.plans.push(path.clone());
        } else {
            return Err(err_msg!(Config, "unknown file type: \"{}\"", path.display()));
        }
    }
    Ok(files)
}

fn has_yaml_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext == "yaml" || ext == "yml")
        .unwrap_or(false)
}

/// Registers every environment in `files`, or the passthrough environment if there are none.
pub fn build_registry(files: &[PathBuf]) -> Result<EnvironmentRegistry, SampleError> {
    let mut registry = EnvironmentRegistry::new();
    if files.is_empty() {
        registry.add_environment(Rc::new(TemplateEnvironment::passthrough()));
        return Ok(registry);
    }
    for file in files {
        for env in load_environment_file(file)? {
            registry.add_environment(Rc::new(env));
        }
    }
    if registry.is_empty() {
        return Err(err_msg!(Plan, "no environments defined in the given environment files"));
    }
    Ok(registry)
}

/// Builds the plan tree, or `None` when there are no suites to run.
fn build_manager(paths: &[PathBuf], filters: &Filters) -> Result<Option<Manager>, SampleError> {
    let files = classify_files(paths)?;
    let registry = build_registry(&files.environments)?;
    let suites = suite_configs_from(&files.plans)?;
    if suites.is_empty() {
        warn!("no test suites found");
        return Ok(None);
    }
    Ok(Some(Manager::new(&registry, &suites, filters)))
}

fn install_interrupt_handler(cancel: &CancellationToken) {
    let token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || token.cancel()) {
        warn!("could not install interrupt handler: {}", e);
    }
}

fn init_logging(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directive()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
