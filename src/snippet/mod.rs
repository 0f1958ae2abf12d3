//! The embedded snippet language behind the `code` directive.
//!
//! Snippets are small s-expression programs evaluated against a running case. They can
//! read and bind symbols in the case scope and invoke every directive by name, including
//! the code-only ones (`fail`, `expect`, `assert_that`, `abort`).
//!
//! ```text
//! (set! out (call "list_products" :region "us"))
//! (assert_that (contains? out "widget") "no widget in {}" out)
//! (if (eq? testcase_num 0) (log "first case") (abort))
//! ```
//!
//! Directive arguments are positional values followed by `:keyword value` pairs. A failed
//! assertion inside a snippet stops the snippet and the enclosing stage.

use crate::caserunner::{CaseRunner, Outcome};
use crate::SampleError;

pub mod eval;
pub mod parser;

pub use eval::{Evaluator, Halt};
pub use parser::parse;

/// A parsed snippet expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Nil,
    Bool(bool),
    Int(i64),
    Str(String),
    Symbol(String),
    Keyword(String),
    List(Vec<Expr>),
}

/// Parses and evaluates `source` against `runner`.
///
/// Returns the value of the last top-level expression, or `SoftAbort` when the snippet
/// hit a failed assertion or an explicit `abort`.
pub fn execute(source: &str, runner: &mut CaseRunner) -> Result<Outcome, SampleError> {
    let program = parse(source)?;
    let mut evaluator = Evaluator::new(runner);
    match evaluator.eval_program(&program) {
        Ok(value) => Ok(Outcome::Continue(value)),
        Err(Halt::Abort) => Ok(Outcome::SoftAbort),
        Err(Halt::Error(err)) => Err(err),
    }
}
