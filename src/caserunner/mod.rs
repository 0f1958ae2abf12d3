//! The test-case interpreter.
//!
//! A [`CaseRunner`] executes one test case: its SETUP, TEST and TEARDOWN stages in that
//! order, each a list of single-key YAML segments. Every segment names a directive from
//! the closed table in [`directives`]; the runner resolves its arguments through the
//! directive's YAML adapter and dispatches the resulting [`Directive`] to a handler.
//!
//! ## Stage termination
//!
//! A stage stops early on the first of:
//!
//! - a soft abort (a failed assertion, or an explicit `abort` from embedded code)
//! - a `Call` error, recorded as a CALL ERROR for the stage
//! - any other error, recorded as an UNHANDLED EXCEPTION for the stage
//!
//! TEARDOWN is attempted regardless of how SETUP and TEST ended. The only thing that
//! unwinds past a stage is [`SampleError::Interrupted`].

use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, SystemTime};

use regex::Regex;
use tracing::{debug, info};

use crate::cancel::CancellationToken;
use crate::environment::{Environment, ResolvedCall};
use crate::SampleError;

pub mod directives;
pub mod format;
pub mod process;
pub mod scope;

pub use directives::{Adapted, Directive, DirectiveKind, Invocation, MatchTarget, Segment};
pub use format::{format_string, reindent};
pub use process::CallOutput;
pub use scope::{Scope, Value};

pub const STATUS_FAILED_ASSERTION: &str = "FAILED ASSERTION";
pub const STATUS_FAILED_EXPECTATION: &str = "FAILED EXPECTATION";

/// Symbols every case scope is seeded with.
pub const SYMBOL_CASE_NUM: &str = "testcase_num";
pub const SYMBOL_CASE_ID: &str = "testcase_id";
pub const SYMBOL_LAST_CALL_OUTPUT: &str = "_last_call_output";

const MSG_EXPECT_SUCCESS: &str = "expected last call to succeed";
const MSG_EXPECT_FAILURE: &str = "expected last call to fail";
const MSG_FAIL: &str = "failure";
const MSG_ABORT: &str = "abort called";

// ============================================================================
// STAGES AND OUTCOMES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Setup,
    Test,
    Teardown,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Setup, Stage::Test, Stage::Teardown];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Setup => "SETUP",
            Stage::Test => "TEST",
            Stage::Teardown => "TEARDOWN",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Running(Stage),
    Done,
}

/// What a handler tells the stage loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Proceed with the next segment; carries the directive's result.
    Continue(Value),
    /// Stop the current stage without recording anything further.
    SoftAbort,
}

impl Outcome {
    pub fn is_abort(&self) -> bool {
        matches!(self, Outcome::SoftAbort)
    }
}

/// A recorded failure or error: a status label and an unformatted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub status: String,
    pub message: String,
    pub args: Vec<Value>,
}

impl Record {
    pub fn new(status: impl Into<String>, message: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            status: status.into(),
            message: message.into(),
            args,
        }
    }

    /// `(status, formatted message)`; a template that cannot be formatted is returned as is.
    pub fn formatted(&self) -> (String, String) {
        let message =
            format_string(&self.message, &self.args).unwrap_or_else(|_| self.message.clone());
        (self.status.clone(), message)
    }
}

/// Settings shared by every case of one run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Kill calls still running after this long. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    pub cancel: CancellationToken,
}

// ============================================================================
// CASE RUNNER
// ============================================================================

pub struct CaseRunner {
    environment: Rc<dyn Environment>,
    idx: usize,
    label: String,
    setup: Vec<Segment>,
    test: Vec<Segment>,
    teardown: Vec<Segment>,
    options: RunOptions,

    scope: Scope,
    state: RunState,
    failures: Vec<Record>,
    errors: Vec<Record>,
    output: String,
    last_return_code: i32,
    last_call_output: String,
    start_time: Option<SystemTime>,
    end_time: Option<SystemTime>,
}

impl CaseRunner {
    pub fn new(
        environment: Rc<dyn Environment>,
        idx: usize,
        label: impl Into<String>,
        setup: Vec<Segment>,
        test: Vec<Segment>,
        teardown: Vec<Segment>,
    ) -> Self {
        let label = label.into();
        let mut scope = Scope::new();
        scope.set(SYMBOL_CASE_NUM, idx as i64);
        scope.set(SYMBOL_CASE_ID, label.as_str());
        scope.set(SYMBOL_LAST_CALL_OUTPUT, "");
        Self {
            environment,
            idx,
            label,
            setup,
            test,
            teardown,
            options: RunOptions::default(),
            scope,
            state: RunState::NotStarted,
            failures: Vec::new(),
            errors: Vec::new(),
            output: String::new(),
            last_return_code: 0,
            last_call_output: String::new(),
            start_time: None,
            end_time: None,
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Runs every stage and returns the number of failures plus errors.
    ///
    /// Only an interrupt is returned as `Err`; the case is then left unfinished.
    pub fn run(&mut self) -> Result<usize, SampleError> {
        self.start_time = Some(SystemTime::now());
        for stage in Stage::ALL {
            self.state = RunState::Running(stage);
            self.log_line(&format!("\n### Test case {}", stage));

            let segments = std::mem::take(self.segments_mut(stage));
            let result = self
                .run_stage(stage, &segments)
                .and_then(|()| self.options.cancel.check());
            *self.segments_mut(stage) = segments;

            if let Err(err) = result {
                self.log_line(&format!("KEYBOARD INTERRUPT in stage {}", stage));
                self.end_time = Some(SystemTime::now());
                return Err(err);
            }
        }
        self.state = RunState::Done;
        self.end_time = Some(SystemTime::now());
        self.log_status();
        Ok(self.failures.len() + self.errors.len())
    }

    fn segments_mut(&mut self, stage: Stage) -> &mut Vec<Segment> {
        match stage {
            Stage::Setup => &mut self.setup,
            Stage::Test => &mut self.test,
            Stage::Teardown => &mut self.teardown,
        }
    }

    fn run_stage(&mut self, stage: Stage, segments: &[Segment]) -> Result<(), SampleError> {
        for segment in segments {
            self.options.cancel.check()?;
            match self.run_segment(segment) {
                Ok(Outcome::Continue(_)) => {}
                Ok(Outcome::SoftAbort) => break,
                Err(SampleError::Interrupted) => return Err(SampleError::Interrupted),
                Err(err @ SampleError::Call { .. }) => {
                    let status = format!("CALL ERROR in stage {} ", stage);
                    let message = err.message();
                    self.log_line(&format!("{}: {}", status, message));
                    self.errors.push(Record::new(status, message, Vec::new()));
                    break;
                }
                Err(err) => {
                    let status = format!("UNHANDLED EXCEPTION in stage {} ", stage);
                    debug!("case {} stage {}: {}", self.idx, stage, err.describe());
                    self.log_line(&format!("# EXCEPTION!! {}", err));
                    self.errors.push(Record::new(status, err.describe(), Vec::new()));
                    break;
                }
            }
        }
        Ok(())
    }

    fn run_segment(&mut self, segment: &Segment) -> Result<Outcome, SampleError> {
        let mapping = segment.as_mapping().ok_or_else(|| {
            err_msg!(
                Config,
                "each segment must be a single-key map, got: {}",
                describe_yaml(segment)
            )
        })?;
        if mapping.len() != 1 {
            return Err(err_msg!(
                Config,
                "each segment must contain exactly one directive, got {} keys",
                mapping.len()
            ));
        }
        let Some((key, value)) = mapping.iter().next() else {
            return Err(err_msg!(Config, "empty segment"));
        };
        let name = key
            .as_str()
            .ok_or_else(|| err_msg!(Config, "directive names must be strings"))?;
        let kind = DirectiveKind::lookup(name)
            .ok_or_else(|| err_msg!(Config, "unknown YAML directive: {}", name))?;
        let adapter = kind.yaml_adapter().ok_or_else(|| {
            err_msg!(
                Config,
                "directive only available inside a code directive: {}",
                name
            )
        })?;
        match adapter(value, &mut self.scope)? {
            Adapted::Done => Ok(Outcome::Continue(Value::Nil)),
            Adapted::Invoke(directive) => self.invoke(directive),
        }
    }

    /// Dispatches a directive to its handler.
    pub fn invoke(&mut self, directive: Directive) -> Result<Outcome, SampleError> {
        debug!("case {}: {}", self.idx, directive.kind());
        match directive {
            Directive::Code(source) => crate::snippet::execute(&source, self),
            Directive::Call(invocation) => self.call_no_error(&invocation),
            Directive::CallMayFail(invocation) => {
                let result = self.call_allow_error(&invocation)?;
                Ok(Outcome::Continue(Value::List(vec![
                    Value::Int(i64::from(result.return_code)),
                    Value::Str(result.output),
                ])))
            }
            Directive::Shell { template, args } => self.shell(&template, &args),
            Directive::Uuid { variable } => {
                let id = directives::new_uuid();
                if let Some(variable) = variable {
                    self.scope.set(variable, id.as_str());
                }
                Ok(Outcome::Continue(Value::Str(id)))
            }
            Directive::Env { variable, name } => {
                let value = directives::get_env(&name)?;
                if let Some(variable) = variable {
                    self.scope.set(variable, value.as_str());
                }
                Ok(Outcome::Continue(Value::Str(value)))
            }
            Directive::ExtractMatch { pattern, target } => self.extract_match(&pattern, &target),
            Directive::Log { template, args } => {
                self.print_out(&template, &args)?;
                Ok(Outcome::Continue(Value::Nil))
            }
            Directive::AssertContains { message, values } => {
                self.contain_check(true, &message, &values)
            }
            Directive::AssertNotContains { message, values } => {
                self.contain_check(false, &message, &values)
            }
            Directive::AssertSuccess { message, args } => {
                let message = non_empty_or(message, MSG_EXPECT_SUCCESS);
                self.assert_that(self.last_return_code == 0, &message, args)
            }
            Directive::AssertFailure { message, args } => {
                let message = non_empty_or(message, MSG_EXPECT_FAILURE);
                self.assert_that(self.last_return_code != 0, &message, args)
            }
            Directive::Fail => {
                self.fail()?;
                Ok(Outcome::Continue(Value::Nil))
            }
            Directive::Expect {
                condition,
                message,
                args,
            } => {
                self.expect(condition, &message, args)?;
                Ok(Outcome::Continue(Value::Bool(condition)))
            }
            Directive::AssertThat {
                condition,
                message,
                args,
            } => self.assert_that(condition, &message, args),
            Directive::Abort => self.assert_that(false, MSG_ABORT, Vec::new()),
        }
    }

    // ------------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------------

    /// Resolves and runs an invocation, leaving judgement of the exit code to the caller.
    pub fn call_allow_error(&mut self, invocation: &Invocation) -> Result<CallOutput, SampleError> {
        let call = self
            .environment
            .get_call(
                &invocation.target,
                &invocation.arg_strings(),
                &invocation.param_strings(),
            )
            .map_err(|err| match err {
                e @ (SampleError::Interrupted | SampleError::Call { .. }) => e,
                other => err_msg!(Call, "could not resolve call: {}", other.message()).with_source(other),
            })?;
        self.call_external(&call)
    }

    /// Runs an invocation and soft-aborts the stage if it exits non-zero.
    pub fn call_no_error(&mut self, invocation: &Invocation) -> Result<Outcome, SampleError> {
        let result = self.call_allow_error(invocation)?;
        let outcome = self.assert_that(
            result.return_code == 0,
            "call failed: \"{}\"",
            vec![Value::Str(invocation.describe())],
        )?;
        Ok(match outcome {
            Outcome::Continue(_) => Outcome::Continue(Value::Str(result.output)),
            Outcome::SoftAbort => Outcome::SoftAbort,
        })
    }

    /// Runs `template` through the shell with each argument appended as its own word.
    fn shell(&mut self, template: &str, args: &[Value]) -> Result<Outcome, SampleError> {
        let command = format_string(&format!("{}{}", template, " {}".repeat(args.len())), args)?;
        let result = self.call_external(&ResolvedCall::new(command))?;
        Ok(Outcome::Continue(Value::Str(result.output)))
    }

    fn call_external(&mut self, call: &ResolvedCall) -> Result<CallOutput, SampleError> {
        self.last_return_code = 0;
        self.last_call_output.clear();
        self.log_line(&format!("\n# Calling: {}", call.command));

        let result = process::run_command(call, self.options.timeout);
        // A child killed by the interrupt must not be judged as a failed call.
        self.options.cancel.check()?;
        let result = result?;
        if result.return_code != 0 {
            self.output.push_str("# ... call did not succeed  ");
        }
        self.output.push_str(&result.output);

        self.last_return_code = result.return_code;
        self.last_call_output = result.output.clone();
        self.scope
            .set(SYMBOL_LAST_CALL_OUTPUT, self.last_call_output.as_str());
        Ok(result)
    }

    // ------------------------------------------------------------------------
    // Output inspection
    // ------------------------------------------------------------------------

    fn extract_match(&mut self, pattern: &str, target: &MatchTarget) -> Result<Outcome, SampleError> {
        let names = target.names();
        for name in &names {
            self.scope.set(*name, Value::Nil);
        }
        let regex = Regex::new(pattern).map_err(|e| {
            err_msg!(Config, "invalid extract_match pattern \"{}\"", pattern).with_source(e)
        })?;

        let Some(captures) = regex.captures(&self.last_call_output) else {
            return Ok(Outcome::Continue(Value::Bool(false)));
        };
        let groups: Vec<Value> = captures
            .iter()
            .skip(1)
            .map(|group| group.map_or(Value::Nil, |m| Value::Str(m.as_str().to_string())))
            .collect();
        for (name, value) in names.into_iter().zip(groups) {
            self.scope.set(name, value);
        }
        Ok(Outcome::Continue(Value::Bool(true)))
    }

    fn contain_check(
        &mut self,
        expect_present: bool,
        message: &str,
        values: &[Value],
    ) -> Result<Outcome, SampleError> {
        for value in values {
            let needle = value.to_string();
            let present = self.last_call_output.contains(&needle);
            let message = if !message.is_empty() {
                message.to_string()
            } else if expect_present {
                format!("required \"{}\" absent in preceding output", needle)
            } else {
                format!("forbidden \"{}\" present in preceding output", needle)
            };
            let outcome = self.assert_that(present == expect_present, &message, Vec::new())?;
            if outcome.is_abort() {
                return Ok(outcome);
            }
        }
        Ok(Outcome::Continue(Value::Bool(true)))
    }

    // ------------------------------------------------------------------------
    // Recording
    // ------------------------------------------------------------------------

    /// Records a failed expectation without stopping the stage.
    pub fn expect(&mut self, condition: bool, message: &str, args: Vec<Value>) -> Result<(), SampleError> {
        if !condition {
            self.print_out(&format!("# FAILED EXPECTATION: {}", message), &args)?;
            self.failures
                .push(Record::new(STATUS_FAILED_EXPECTATION, message, args));
        }
        Ok(())
    }

    /// Records a failed assertion and soft-aborts the stage.
    pub fn assert_that(
        &mut self,
        condition: bool,
        message: &str,
        args: Vec<Value>,
    ) -> Result<Outcome, SampleError> {
        if condition {
            return Ok(Outcome::Continue(Value::Bool(true)));
        }
        self.print_out(&format!("# FAILED ASSERTION: {}", message), &args)?;
        self.failures
            .push(Record::new(STATUS_FAILED_ASSERTION, message, args));
        Ok(Outcome::SoftAbort)
    }

    /// Records an unconditional failed expectation.
    pub fn fail(&mut self) -> Result<(), SampleError> {
        self.expect(false, MSG_FAIL, Vec::new())
    }

    /// Appends a formatted line to the transcript.
    pub fn print_out(&mut self, template: &str, args: &[Value]) -> Result<(), SampleError> {
        let line = format_string(template, args)?;
        self.log_line(&line);
        Ok(())
    }

    fn log_line(&mut self, line: &str) {
        self.output.push_str(line);
        self.output.push('\n');
    }

    fn log_status(&self) {
        let prefix = format!("---- Test case {}: \"{}\"", self.idx, self.label);
        if !self.failures.is_empty() {
            info!("{} FAILED --------------------", prefix);
            for (status, message) in self.get_failures() {
                info!("    {}: {}", status, message);
            }
        } else if !self.errors.is_empty() {
            info!("{} ERRORED ---------------------------", prefix);
            for (status, message) in self.get_errors() {
                info!(
                    "    {}: (check state: clean-up did not finish) {}",
                    status, message
                );
            }
        } else {
            info!("{} PASSED ------------------------------", prefix);
        }
        info!("    Output:\n{}\n", self.get_output(4, "| "));
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn get_output(&self, indent: usize, prefix: &str) -> String {
        reindent(&self.output, indent, prefix)
    }

    pub fn get_failures(&self) -> Vec<(String, String)> {
        self.failures.iter().map(Record::formatted).collect()
    }

    pub fn get_errors(&self) -> Vec<(String, String)> {
        self.errors.iter().map(Record::formatted).collect()
    }

    pub fn failures(&self) -> &[Record] {
        &self.failures
    }

    pub fn errors(&self) -> &[Record] {
        &self.errors
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn scope_mut(&mut self) -> &mut Scope {
        &mut self.scope
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn index(&self) -> usize {
        self.idx
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn last_return_code(&self) -> i32 {
        self.last_return_code
    }

    pub fn last_call_output(&self) -> &str {
        &self.last_call_output
    }

    pub fn start_time(&self) -> Option<SystemTime> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<SystemTime> {
        self.end_time
    }

    /// Names of every directive usable in YAML segments.
    pub fn yaml_directive_names() -> BTreeSet<&'static str> {
        DirectiveKind::ALL
            .into_iter()
            .filter(|kind| kind.yaml_adapter().is_some())
            .map(DirectiveKind::name)
            .collect()
    }
}

fn non_empty_or(message: String, default: &str) -> String {
    if message.is_empty() {
        default.to_string()
    } else {
        message
    }
}

fn describe_yaml(yaml: &Segment) -> String {
    serde_yaml::to_string(yaml)
        .map(|s| s.trim_end().to_string())
        .unwrap_or_else(|_| format!("{:?}", yaml))
}
