//! The closed directive table.
//!
//! Every directive a test plan or snippet can name is a [`DirectiveKind`]. Its typed
//! arguments travel in a [`Directive`] value, which the case runner dispatches with a single
//! `match`. A kind with no YAML adapter can only be invoked from embedded code.
//!
//! ## YAML argument shapes
//!
//! - `call`, `call_may_fail`: `{target, params: {name: ref}, args: [ref]}`
//! - `shell`, `log`, `assert_success`, `assert_failure`: `[template, symbol-or-literal...]`
//! - `uuid`: `variable`
//! - `env`: `{var, what}`
//! - `extract_match`: `{pattern, variable | groups}`
//! - `assert_contains`, `assert_not_contains`: `[{message}?, ref...]`
//! - `code`: snippet source
//!
//! where `ref` is a single-key map `{variable: NAME}` or `{literal: VALUE}`.

use std::collections::BTreeMap;

use serde_yaml::Value as Yaml;

use super::scope::{Scope, Value};
use crate::SampleError;

/// One step of a stage: a single-key map from directive name to its arguments.
pub type Segment = Yaml;

/// Converts the YAML value of a segment into a directive, or completes it on the spot.
pub type YamlAdapter = fn(&Yaml, &mut Scope) -> Result<Adapted, SampleError>;

const KEY_TARGET: &str = "target";
const KEY_PARAMS: &str = "params";
const KEY_ARGS: &str = "args";
const KEY_MESSAGE: &str = "message";
const KEY_VARIABLE: &str = "variable";
const KEY_LITERAL: &str = "literal";
const KEY_PATTERN: &str = "pattern";
const KEY_GROUPS: &str = "groups";
const KEY_SET_VARIABLE: &str = "var";
const KEY_SET_WHAT: &str = "what";

// ============================================================================
// DIRECTIVE KINDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    Code,
    Call,
    CallMayFail,
    Shell,
    Uuid,
    Env,
    ExtractMatch,
    Log,
    AssertContains,
    AssertNotContains,
    AssertSuccess,
    AssertFailure,
    Fail,
    Expect,
    AssertThat,
    Abort,
}

impl DirectiveKind {
    pub const ALL: [DirectiveKind; 16] = [
        DirectiveKind::Code,
        DirectiveKind::Call,
        DirectiveKind::CallMayFail,
        DirectiveKind::Shell,
        DirectiveKind::Uuid,
        DirectiveKind::Env,
        DirectiveKind::ExtractMatch,
        DirectiveKind::Log,
        DirectiveKind::AssertContains,
        DirectiveKind::AssertNotContains,
        DirectiveKind::AssertSuccess,
        DirectiveKind::AssertFailure,
        DirectiveKind::Fail,
        DirectiveKind::Expect,
        DirectiveKind::AssertThat,
        DirectiveKind::Abort,
    ];

    /// Canonical (snake_case) name.
    pub fn name(self) -> &'static str {
        match self {
            DirectiveKind::Code => "code",
            DirectiveKind::Call => "call",
            DirectiveKind::CallMayFail => "call_may_fail",
            DirectiveKind::Shell => "shell",
            DirectiveKind::Uuid => "uuid",
            DirectiveKind::Env => "env",
            DirectiveKind::ExtractMatch => "extract_match",
            DirectiveKind::Log => "log",
            DirectiveKind::AssertContains => "assert_contains",
            DirectiveKind::AssertNotContains => "assert_not_contains",
            DirectiveKind::AssertSuccess => "assert_success",
            DirectiveKind::AssertFailure => "assert_failure",
            DirectiveKind::Fail => "fail",
            DirectiveKind::Expect => "expect",
            DirectiveKind::AssertThat => "assert_that",
            DirectiveKind::Abort => "abort",
        }
    }

    /// camelCase spelling accepted alongside the canonical name.
    pub fn alias(self) -> Option<&'static str> {
        match self {
            DirectiveKind::CallMayFail => Some("callMayFail"),
            DirectiveKind::ExtractMatch => Some("extractMatch"),
            DirectiveKind::AssertContains => Some("assertContains"),
            DirectiveKind::AssertNotContains => Some("assertNotContains"),
            DirectiveKind::AssertSuccess => Some("assertSuccess"),
            DirectiveKind::AssertFailure => Some("assertFailure"),
            DirectiveKind::AssertThat => Some("assertThat"),
            _ => None,
        }
    }

    pub fn lookup(name: &str) -> Option<DirectiveKind> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == name || kind.alias() == Some(name))
    }

    /// The adapter used when the directive appears directly in a YAML segment.
    pub fn yaml_adapter(self) -> Option<YamlAdapter> {
        let adapter: YamlAdapter = match self {
            DirectiveKind::Code => adapt_code,
            DirectiveKind::Call => adapt_call,
            DirectiveKind::CallMayFail => adapt_call_may_fail,
            DirectiveKind::Shell => adapt_shell,
            DirectiveKind::Uuid => adapt_uuid,
            DirectiveKind::Env => adapt_env,
            DirectiveKind::ExtractMatch => adapt_extract_match,
            DirectiveKind::Log => adapt_log,
            DirectiveKind::AssertContains => adapt_assert_contains,
            DirectiveKind::AssertNotContains => adapt_assert_not_contains,
            DirectiveKind::AssertSuccess => adapt_assert_success,
            DirectiveKind::AssertFailure => adapt_assert_failure,
            DirectiveKind::Fail
            | DirectiveKind::Expect
            | DirectiveKind::AssertThat
            | DirectiveKind::Abort => return None,
        };
        Some(adapter)
    }
}

impl std::fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// TYPED ARGUMENTS
// ============================================================================

/// An artifact invocation: target name, positional arguments and keyword parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Invocation {
    pub target: String,
    pub args: Vec<Value>,
    pub params: BTreeMap<String, Value>,
}

impl Invocation {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    pub fn arg_strings(&self) -> Vec<String> {
        self.args.iter().map(Value::to_string).collect()
    }

    pub fn param_strings(&self) -> BTreeMap<String, String> {
        self.params
            .iter()
            .map(|(name, value)| (name.clone(), value.to_string()))
            .collect()
    }

    /// The invocation as the target followed by its canonically formatted arguments.
    pub fn describe(&self) -> String {
        let rendered =
            crate::environment::format_call_args(&self.arg_strings(), &self.param_strings());
        if rendered.is_empty() {
            self.target.clone()
        } else {
            format!("{} {}", self.target, rendered)
        }
    }
}

/// Where `extract_match` stores its captures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchTarget {
    Variable(String),
    Groups(Vec<String>),
}

impl MatchTarget {
    /// Exactly one of `variable` and `groups` must be given.
    pub fn from_parts(
        variable: Option<String>,
        groups: Option<Vec<String>>,
    ) -> Result<MatchTarget, SampleError> {
        let groups = groups.filter(|g| !g.is_empty());
        let variable = variable.filter(|v| !v.is_empty());
        match (variable, groups) {
            (Some(variable), None) => Ok(MatchTarget::Variable(variable)),
            (None, Some(groups)) => Ok(MatchTarget::Groups(groups)),
            (None, None) => Err(err_msg!(Config, "extract_match requires variable or groups")),
            (Some(_), Some(_)) => Err(err_msg!(
                Config,
                "extract_match cannot accept both variables and groups"
            )),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        match self {
            MatchTarget::Variable(name) => vec![name.as_str()],
            MatchTarget::Groups(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

/// A directive together with its typed arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Code(String),
    Call(Invocation),
    CallMayFail(Invocation),
    Shell { template: String, args: Vec<Value> },
    /// Generates an identifier, binding it to `variable` when one is named.
    Uuid { variable: Option<String> },
    /// Reads process variable `name`, binding it to `variable` when one is named.
    Env { variable: Option<String>, name: String },
    ExtractMatch { pattern: String, target: MatchTarget },
    Log { template: String, args: Vec<Value> },
    AssertContains { message: String, values: Vec<Value> },
    AssertNotContains { message: String, values: Vec<Value> },
    AssertSuccess { message: String, args: Vec<Value> },
    AssertFailure { message: String, args: Vec<Value> },
    Fail,
    Expect { condition: bool, message: String, args: Vec<Value> },
    AssertThat { condition: bool, message: String, args: Vec<Value> },
    Abort,
}

impl Directive {
    pub fn kind(&self) -> DirectiveKind {
        match self {
            Directive::Code(_) => DirectiveKind::Code,
            Directive::Call(_) => DirectiveKind::Call,
            Directive::CallMayFail(_) => DirectiveKind::CallMayFail,
            Directive::Shell { .. } => DirectiveKind::Shell,
            Directive::Uuid { .. } => DirectiveKind::Uuid,
            Directive::Env { .. } => DirectiveKind::Env,
            Directive::ExtractMatch { .. } => DirectiveKind::ExtractMatch,
            Directive::Log { .. } => DirectiveKind::Log,
            Directive::AssertContains { .. } => DirectiveKind::AssertContains,
            Directive::AssertNotContains { .. } => DirectiveKind::AssertNotContains,
            Directive::AssertSuccess { .. } => DirectiveKind::AssertSuccess,
            Directive::AssertFailure { .. } => DirectiveKind::AssertFailure,
            Directive::Fail => DirectiveKind::Fail,
            Directive::Expect { .. } => DirectiveKind::Expect,
            Directive::AssertThat { .. } => DirectiveKind::AssertThat,
            Directive::Abort => DirectiveKind::Abort,
        }
    }
}

/// Result of running a YAML adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Adapted {
    /// Hand the directive to its handler.
    Invoke(Directive),
    /// The adapter already performed the directive's effect.
    Done,
}

// ============================================================================
// ADAPTERS
// ============================================================================

fn adapt_code(yaml: &Yaml, _scope: &mut Scope) -> Result<Adapted, SampleError> {
    let source = yaml
        .as_str()
        .ok_or_else(|| err_msg!(Config, "code requires a string snippet"))?;
    Ok(Adapted::Invoke(Directive::Code(source.to_string())))
}

fn adapt_call(yaml: &Yaml, scope: &mut Scope) -> Result<Adapted, SampleError> {
    Ok(Adapted::Invoke(Directive::Call(params_for_call(yaml, scope)?)))
}

fn adapt_call_may_fail(yaml: &Yaml, scope: &mut Scope) -> Result<Adapted, SampleError> {
    Ok(Adapted::Invoke(Directive::CallMayFail(params_for_call(yaml, scope)?)))
}

fn adapt_assert_contains(yaml: &Yaml, scope: &mut Scope) -> Result<Adapted, SampleError> {
    let (message, values) = params_for_contains(yaml, scope)?;
    Ok(Adapted::Invoke(Directive::AssertContains { message, values }))
}

fn adapt_assert_not_contains(yaml: &Yaml, scope: &mut Scope) -> Result<Adapted, SampleError> {
    let (message, values) = params_for_contains(yaml, scope)?;
    Ok(Adapted::Invoke(Directive::AssertNotContains { message, values }))
}

fn adapt_assert_success(yaml: &Yaml, scope: &mut Scope) -> Result<Adapted, SampleError> {
    let (message, args) = args_string(yaml, scope)?;
    Ok(Adapted::Invoke(Directive::AssertSuccess {
        message: message.unwrap_or_default(),
        args,
    }))
}

fn adapt_assert_failure(yaml: &Yaml, scope: &mut Scope) -> Result<Adapted, SampleError> {
    let (message, args) = args_string(yaml, scope)?;
    Ok(Adapted::Invoke(Directive::AssertFailure {
        message: message.unwrap_or_default(),
        args,
    }))
}

fn adapt_shell(yaml: &Yaml, scope: &mut Scope) -> Result<Adapted, SampleError> {
    let (template, args) = args_string(yaml, scope)?;
    let template = template.ok_or_else(|| err_msg!(Config, "shell requires a command"))?;
    Ok(Adapted::Invoke(Directive::Shell { template, args }))
}

fn adapt_log(yaml: &Yaml, scope: &mut Scope) -> Result<Adapted, SampleError> {
    let (template, args) = args_string(yaml, scope)?;
    let template = template.ok_or_else(|| err_msg!(Config, "log requires a message"))?;
    Ok(Adapted::Invoke(Directive::Log { template, args }))
}

fn adapt_uuid(yaml: &Yaml, scope: &mut Scope) -> Result<Adapted, SampleError> {
    let variable = yaml
        .as_str()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| err_msg!(Config, "uuid requires a variable name"))?;
    scope.set(variable, new_uuid());
    Ok(Adapted::Done)
}

fn adapt_env(yaml: &Yaml, scope: &mut Scope) -> Result<Adapted, SampleError> {
    let (variable, name) = params_for_set(yaml)?;
    scope.set(variable, get_env(&name)?);
    Ok(Adapted::Done)
}

fn adapt_extract_match(yaml: &Yaml, _scope: &mut Scope) -> Result<Adapted, SampleError> {
    let parts = yaml
        .as_mapping()
        .ok_or_else(|| err_msg!(Config, "extract_match expects a map of pattern and variable"))?;
    let pattern = parts
        .get(KEY_PATTERN)
        .and_then(Yaml::as_str)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| err_msg!(Config, "extract_match requires pattern to match"))?;
    let variable = parts
        .get(KEY_VARIABLE)
        .and_then(Yaml::as_str)
        .map(str::to_string);
    let groups = match parts.get(KEY_GROUPS) {
        None | Some(Yaml::Null) => None,
        Some(Yaml::Sequence(items)) => Some(
            items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        err_msg!(Config, "extract_match groups must be variable names")
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Some(_) => return Err(err_msg!(Config, "extract_match groups must be a list")),
    };
    Ok(Adapted::Invoke(Directive::ExtractMatch {
        pattern: pattern.to_string(),
        target: MatchTarget::from_parts(variable, groups)?,
    }))
}

// ============================================================================
// ARGUMENT HELPERS
// ============================================================================

pub fn new_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub fn get_env(name: &str) -> Result<String, SampleError> {
    std::env::var(name)
        .map_err(|e| err_msg!(Environment, "environment variable \"{}\" is not set", name).with_source(e))
}

fn params_for_set(yaml: &Yaml) -> Result<(String, String), SampleError> {
    let missing = || {
        err_msg!(
            Config,
            "need both \"{}\" and \"{}\"",
            KEY_SET_WHAT,
            KEY_SET_VARIABLE
        )
    };
    let parts = yaml.as_mapping().ok_or_else(missing)?;
    let variable = parts.get(KEY_SET_VARIABLE).and_then(Yaml::as_str).ok_or_else(missing)?;
    let what = parts.get(KEY_SET_WHAT).and_then(Yaml::as_str).ok_or_else(missing)?;
    Ok((variable.to_string(), what.to_string()))
}

/// Reads a `[template, symbol-or-literal...]` list.
///
/// Each trailing entry resolves to the value of the symbol it names when that symbol is
/// bound, else to the entry itself wrapped in double quotes.
pub fn args_string(yaml: &Yaml, scope: &Scope) -> Result<(Option<String>, Vec<Value>), SampleError> {
    let parts = match yaml {
        Yaml::Null => return Ok((None, Vec::new())),
        Yaml::Sequence(parts) => parts.as_slice(),
        Yaml::String(template) => return Ok((Some(template.clone()), Vec::new())),
        _ => return Err(err_msg!(Config, "expected a list of [template, arguments...]")),
    };
    let Some((head, rest)) = parts.split_first() else {
        return Ok((None, Vec::new()));
    };
    let template = scalar_text(head)
        .ok_or_else(|| err_msg!(Config, "the first list entry must be a string"))?;
    let values = rest
        .iter()
        .map(|part| {
            let text = scalar_text(part)
                .ok_or_else(|| err_msg!(Config, "arguments must be symbol names or literals"))?;
            Ok(match scope.get(&text) {
                Some(value) => value.clone(),
                None => Value::Str(format!("\"{}\"", text)),
            })
        })
        .collect::<Result<Vec<_>, SampleError>>()?;
    Ok((Some(template), values))
}

fn params_for_call(yaml: &Yaml, scope: &Scope) -> Result<Invocation, SampleError> {
    let parts = yaml.as_mapping().ok_or_else(|| {
        err_msg!(
            Config,
            "when calling artifacts, the first parameter must be \"- {}: TARGET\"",
            KEY_TARGET
        )
    })?;
    let target = parts
        .get(KEY_TARGET)
        .and_then(scalar_text)
        .ok_or_else(|| {
            err_msg!(
                Config,
                "when calling artifacts, the first parameter must be \"- {}: TARGET\"",
                KEY_TARGET
            )
        })?;

    let mut invocation = Invocation::new(target);
    for (key, val) in parts {
        match key.as_str() {
            Some(KEY_TARGET) => continue,
            Some(KEY_PARAMS) => {
                let params = val
                    .as_mapping()
                    .ok_or_else(|| err_msg!(Config, "\"{}\" must be a map", KEY_PARAMS))?;
                for (name, value) in params {
                    let name = scalar_text(name)
                        .ok_or_else(|| err_msg!(Config, "parameter names must be strings"))?;
                    invocation
                        .params
                        .insert(name, variable_or_literal(value, scope)?);
                }
            }
            Some(KEY_ARGS) => {
                let args = val
                    .as_sequence()
                    .ok_or_else(|| err_msg!(Config, "\"{}\" must be a list", KEY_ARGS))?;
                for value in args {
                    invocation.args.push(variable_or_literal(value, scope)?);
                }
            }
            _ => {
                return Err(err_msg!(
                    Config,
                    "unknown argument to function call \"- {}\"",
                    scalar_text(key).unwrap_or_default()
                ))
            }
        }
    }
    Ok(invocation)
}

fn params_for_contains(yaml: &Yaml, scope: &Scope) -> Result<(String, Vec<Value>), SampleError> {
    let parts = match yaml {
        Yaml::Null => return Ok((String::new(), Vec::new())),
        Yaml::Sequence(parts) => parts.as_slice(),
        _ => return Err(err_msg!(Config, "expected a list of variables and literals")),
    };
    let explicit = parts
        .first()
        .and_then(Yaml::as_mapping)
        .and_then(|first| first.get(KEY_MESSAGE))
        .map(|message| {
            scalar_text(message).ok_or_else(|| err_msg!(Config, "\"{}\" must be a string", KEY_MESSAGE))
        })
        .transpose()?;
    let (message, rest) = match explicit {
        Some(message) => (message, &parts[1..]),
        None => (String::new(), parts),
    };
    let values = rest
        .iter()
        .map(|part| variable_or_literal(part, scope))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((message, values))
}

/// Resolves a `{variable: NAME}` or `{literal: VALUE}` entry.
pub fn variable_or_literal(yaml: &Yaml, scope: &Scope) -> Result<Value, SampleError> {
    let map = yaml.as_mapping().ok_or_else(|| {
        err_msg!(Config, "expected \"{}\" or \"{}\" entry", KEY_VARIABLE, KEY_LITERAL)
    })?;
    if map.len() != 1 {
        return Err(err_msg!(
            Config,
            "expected each element to contain only one of \"{}\", \"{}\", but got {} keys",
            KEY_VARIABLE,
            KEY_LITERAL,
            map.len()
        ));
    }
    let Some((kind, item)) = map.iter().next() else {
        return Err(err_msg!(Config, "empty argument entry"));
    };
    match kind.as_str() {
        Some(KEY_VARIABLE) => {
            let name = scalar_text(item)
                .ok_or_else(|| err_msg!(Config, "variable names must be strings"))?;
            scope
                .get(&name)
                .cloned()
                .ok_or_else(|| err_msg!(Config, "undefined variable \"{}\"", name))
        }
        Some(KEY_LITERAL) => Value::from_yaml(item)
            .ok_or_else(|| err_msg!(Config, "literal values must be scalars or lists")),
        other => Err(err_msg!(
            Config,
            "expected \"{}\" or \"{}\", got \"{}\"",
            KEY_VARIABLE,
            KEY_LITERAL,
            other.unwrap_or("?")
        )),
    }
}

fn scalar_text(yaml: &Yaml) -> Option<String> {
    match yaml {
        Yaml::String(s) => Some(s.clone()),
        Yaml::Number(n) => Some(n.to_string()),
        Yaml::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
