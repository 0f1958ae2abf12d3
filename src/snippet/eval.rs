//! Snippet evaluator.
//!
//! Evaluation borrows the running case mutably: symbol reads and writes go to the case
//! scope and directive forms are dispatched through [`CaseRunner::invoke`].

use std::collections::BTreeMap;

use super::Expr;
use crate::caserunner::{
    format_string, CaseRunner, Directive, DirectiveKind, Invocation, MatchTarget, Outcome, Value,
};
use crate::SampleError;

/// Why evaluation stopped before producing a value.
#[derive(Debug)]
pub enum Halt {
    /// A failed assertion or explicit `abort`; the stage ends quietly.
    Abort,
    Error(SampleError),
}

impl From<SampleError> for Halt {
    fn from(err: SampleError) -> Self {
        Halt::Error(err)
    }
}

type EvalResult = Result<Value, Halt>;

/// Positional values and `:keyword value` pairs of a form.
#[derive(Debug, Default)]
struct Args {
    positional: Vec<Value>,
    keywords: BTreeMap<String, Value>,
}

impl Args {
    fn keyword_str(&self, name: &str) -> Result<Option<String>, SampleError> {
        match self.keywords.get(name) {
            None | Some(Value::Nil) => Ok(None),
            Some(Value::Str(s)) => Ok(Some(s.clone())),
            Some(other) => Err(err_msg!(
                Snippet,
                ":{} expects a string, got {}",
                name,
                other.type_name()
            )),
        }
    }

    fn reject_keywords(&self, form: &str) -> Result<(), SampleError> {
        match self.keywords.keys().next() {
            Some(name) => Err(err_msg!(Snippet, "{} does not accept :{}", form, name)),
            None => Ok(()),
        }
    }
}

pub struct Evaluator<'r> {
    runner: &'r mut CaseRunner,
}

impl<'r> Evaluator<'r> {
    pub fn new(runner: &'r mut CaseRunner) -> Self {
        Self { runner }
    }

    /// Evaluates every expression in order and returns the last value.
    pub fn eval_program(&mut self, program: &[Expr]) -> EvalResult {
        let mut last = Value::Nil;
        for expr in program {
            last = self.eval(expr)?;
        }
        Ok(last)
    }

    pub fn eval(&mut self, expr: &Expr) -> EvalResult {
        match expr {
            Expr::Nil => Ok(Value::Nil),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Int(i) => Ok(Value::Int(*i)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Symbol(name) => self
                .runner
                .scope()
                .get(name)
                .cloned()
                .ok_or_else(|| err_msg!(Snippet, "unbound symbol: {}", name).into()),
            Expr::Keyword(name) => Err(err_msg!(
                Snippet,
                "keyword :{} is only valid as a form argument",
                name
            )
            .into()),
            Expr::List(items) => match items.split_first() {
                None => Ok(Value::List(Vec::new())),
                Some((Expr::Symbol(head), tail)) => self.eval_form(head, tail),
                Some((head, _)) => Err(err_msg!(
                    Snippet,
                    "cannot call a {} value",
                    describe_expr(head)
                )
                .into()),
            },
        }
    }

    // ========================================================================
    // SPECIAL FORMS AND BUILTINS
    // ========================================================================

    fn eval_form(&mut self, head: &str, tail: &[Expr]) -> EvalResult {
        match head {
            "set!" => {
                let [Expr::Symbol(name), value] = tail else {
                    return Err(err_msg!(Snippet, "set! expects a symbol and a value").into());
                };
                let value = self.eval(value)?;
                self.runner.scope_mut().set(name.as_str(), value.clone());
                Ok(value)
            }
            "do" => self.eval_program(tail),
            "if" => {
                let (cond, then, otherwise) = match tail {
                    [cond, then] => (cond, then, None),
                    [cond, then, otherwise] => (cond, then, Some(otherwise)),
                    _ => return Err(err_msg!(Snippet, "if expects a condition and one or two branches").into()),
                };
                if self.eval(cond)?.is_truthy() {
                    self.eval(then)
                } else {
                    otherwise.map_or(Ok(Value::Nil), |e| self.eval(e))
                }
            }
            "and" => {
                let mut last = Value::Bool(true);
                for expr in tail {
                    last = self.eval(expr)?;
                    if !last.is_truthy() {
                        break;
                    }
                }
                Ok(last)
            }
            "or" => {
                let mut last = Value::Bool(false);
                for expr in tail {
                    last = self.eval(expr)?;
                    if last.is_truthy() {
                        break;
                    }
                }
                Ok(last)
            }
            _ => {
                let args = self.eval_args(tail)?;
                match DirectiveKind::lookup(head) {
                    Some(kind) => self.eval_directive(kind, args),
                    None => eval_builtin(head, args).map_err(Halt::from),
                }
            }
        }
    }

    fn eval_args(&mut self, tail: &[Expr]) -> Result<Args, Halt> {
        let mut args = Args::default();
        let mut items = tail.iter();
        while let Some(item) = items.next() {
            if let Expr::Keyword(name) = item {
                let value = items.next().ok_or_else(|| {
                    Halt::from(err_msg!(Snippet, "keyword :{} is missing its value", name))
                })?;
                let value = self.eval(value)?;
                args.keywords.insert(name.clone(), value);
            } else {
                let value = self.eval(item)?;
                args.positional.push(value);
            }
        }
        Ok(args)
    }

    // ========================================================================
    // DIRECTIVES
    // ========================================================================

    fn eval_directive(&mut self, kind: DirectiveKind, args: Args) -> EvalResult {
        let directive = build_directive(kind, args)?;
        match self.runner.invoke(directive)? {
            Outcome::Continue(value) => Ok(value),
            Outcome::SoftAbort => Err(Halt::Abort),
        }
    }
}

fn build_directive(kind: DirectiveKind, args: Args) -> Result<Directive, SampleError> {
    let name = kind.name();
    let directive = match kind {
        DirectiveKind::Code => {
            args.reject_keywords(name)?;
            let [source] = positional_strings::<1>(name, args.positional)?;
            Directive::Code(source)
        }
        DirectiveKind::Call | DirectiveKind::CallMayFail => {
            let mut positional = args.positional.into_iter();
            let target = match positional.next() {
                Some(Value::Str(target)) => target,
                _ => return Err(err_msg!(Snippet, "{} expects a target name first", name)),
            };
            let invocation = Invocation {
                target,
                args: positional.collect(),
                params: args.keywords,
            };
            if kind == DirectiveKind::Call {
                Directive::Call(invocation)
            } else {
                Directive::CallMayFail(invocation)
            }
        }
        DirectiveKind::Shell | DirectiveKind::Log => {
            args.reject_keywords(name)?;
            let (template, rest) = template_and_args(name, args.positional)?;
            if kind == DirectiveKind::Shell {
                Directive::Shell { template, args: rest }
            } else {
                Directive::Log { template, args: rest }
            }
        }
        DirectiveKind::Uuid => {
            let variable = args.keyword_str("variable")?;
            if !args.positional.is_empty() {
                return Err(err_msg!(Snippet, "uuid takes no positional arguments"));
            }
            Directive::Uuid { variable }
        }
        DirectiveKind::Env => {
            let variable = args.keyword_str("variable")?;
            let [what] = positional_strings::<1>(name, args.positional)?;
            Directive::Env {
                variable,
                name: what,
            }
        }
        DirectiveKind::ExtractMatch => {
            let variable = args.keyword_str("variable")?;
            let groups = match args.keywords.get("groups") {
                None | Some(Value::Nil) => None,
                Some(Value::List(items)) => Some(
                    items
                        .iter()
                        .map(|item| {
                            item.as_str().map(str::to_string).ok_or_else(|| {
                                err_msg!(Snippet, ":groups must be a list of strings")
                            })
                        })
                        .collect::<Result<Vec<_>, _>>()?,
                ),
                Some(_) => return Err(err_msg!(Snippet, ":groups must be a list of strings")),
            };
            let [pattern] = positional_strings::<1>(name, args.positional)?;
            Directive::ExtractMatch {
                pattern,
                target: MatchTarget::from_parts(variable, groups)?,
            }
        }
        DirectiveKind::AssertContains | DirectiveKind::AssertNotContains => {
            let message = args.keyword_str("message")?.unwrap_or_default();
            if kind == DirectiveKind::AssertContains {
                Directive::AssertContains {
                    message,
                    values: args.positional,
                }
            } else {
                Directive::AssertNotContains {
                    message,
                    values: args.positional,
                }
            }
        }
        DirectiveKind::AssertSuccess | DirectiveKind::AssertFailure => {
            args.reject_keywords(name)?;
            let (message, rest) = if args.positional.is_empty() {
                (String::new(), Vec::new())
            } else {
                template_and_args(name, args.positional)?
            };
            if kind == DirectiveKind::AssertSuccess {
                Directive::AssertSuccess { message, args: rest }
            } else {
                Directive::AssertFailure { message, args: rest }
            }
        }
        DirectiveKind::Expect | DirectiveKind::AssertThat => {
            args.reject_keywords(name)?;
            let mut positional = args.positional.into_iter();
            let condition = positional
                .next()
                .ok_or_else(|| err_msg!(Snippet, "{} expects a condition", name))?
                .is_truthy();
            let (message, rest) = match positional.next() {
                None => (String::new(), Vec::new()),
                Some(Value::Str(message)) => (message, positional.collect()),
                Some(other) => {
                    return Err(err_msg!(
                        Snippet,
                        "{} expects a message string, got {}",
                        name,
                        other.type_name()
                    ))
                }
            };
            if kind == DirectiveKind::Expect {
                Directive::Expect {
                    condition,
                    message,
                    args: rest,
                }
            } else {
                Directive::AssertThat {
                    condition,
                    message,
                    args: rest,
                }
            }
        }
        DirectiveKind::Fail | DirectiveKind::Abort => {
            args.reject_keywords(name)?;
            if !args.positional.is_empty() {
                return Err(err_msg!(Snippet, "{} takes no arguments", name));
            }
            if kind == DirectiveKind::Fail {
                Directive::Fail
            } else {
                Directive::Abort
            }
        }
    };
    Ok(directive)
}

fn template_and_args(form: &str, positional: Vec<Value>) -> Result<(String, Vec<Value>), SampleError> {
    let mut positional = positional.into_iter();
    match positional.next() {
        Some(Value::Str(template)) => Ok((template, positional.collect())),
        _ => Err(err_msg!(Snippet, "{} expects a template string first", form)),
    }
}

fn positional_strings<const N: usize>(
    form: &str,
    positional: Vec<Value>,
) -> Result<[String; N], SampleError> {
    let count = positional.len();
    let strings = positional
        .into_iter()
        .map(|value| match value {
            Value::Str(s) => Ok(s),
            other => Err(err_msg!(
                Snippet,
                "{} expects string arguments, got {}",
                form,
                other.type_name()
            )),
        })
        .collect::<Result<Vec<_>, _>>()?;
    strings.try_into().map_err(|_| {
        err_msg!(
            Snippet,
            "{} expects {} argument(s), got {}",
            form,
            N,
            count
        )
    })
}

// ============================================================================
// PURE BUILTINS
// ============================================================================

fn eval_builtin(name: &str, args: Args) -> Result<Value, SampleError> {
    args.reject_keywords(name)?;
    let values = args.positional;
    match (name, values.as_slice()) {
        ("not", [value]) => Ok(Value::Bool(!value.is_truthy())),
        ("eq?", [a, b]) => Ok(Value::Bool(a == b)),
        ("nil?", [value]) => Ok(Value::Bool(value.is_nil())),
        ("contains?", [Value::Str(haystack), needle]) => {
            Ok(Value::Bool(haystack.contains(&needle.to_string())))
        }
        ("contains?", [Value::List(items), needle]) => Ok(Value::Bool(items.contains(needle))),
        ("str", _) => Ok(Value::Str(values.iter().map(Value::to_string).collect())),
        ("format", [Value::Str(template), rest @ ..]) => {
            format_string(template, rest).map(Value::Str)
        }
        ("list", _) => Ok(Value::List(values.to_vec())),
        ("nth", [Value::List(items), Value::Int(index)]) => Ok(usize::try_from(*index)
            .ok()
            .and_then(|i| items.get(i))
            .cloned()
            .unwrap_or(Value::Nil)),
        ("not" | "eq?" | "nil?" | "contains?" | "format" | "nth", _) => Err(err_msg!(
            Snippet,
            "invalid arguments to {}: ({})",
            name,
            values
                .iter()
                .map(Value::type_name)
                .collect::<Vec<_>>()
                .join(" ")
        )),
        _ => Err(err_msg!(Snippet, "unknown form: {}", name)),
    }
}

fn describe_expr(expr: &Expr) -> &'static str {
    match expr {
        Expr::Nil => "nil",
        Expr::Bool(_) => "boolean",
        Expr::Int(_) => "integer",
        Expr::Str(_) => "string",
        Expr::Symbol(_) => "symbol",
        Expr::Keyword(_) => "keyword",
        Expr::List(_) => "list",
    }
}
