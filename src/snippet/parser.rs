//! Snippet parser: source text to [`Expr`] trees.
//!
//! Purely syntactic. Symbol resolution and form checking happen in the evaluator.

use pest::{error::Error, iterators::Pair, Parser};
use pest_derive::Parser;

use super::Expr;
use crate::SampleError;

#[derive(Parser)]
#[grammar = "snippet/grammar.pest"]
struct SnippetParser;

// ============================================================================
// PUBLIC API
// ============================================================================

/// Parses a snippet into its top-level expressions.
pub fn parse(source: &str) -> Result<Vec<Expr>, SampleError> {
    if source.trim().is_empty() {
        return Ok(vec![]);
    }

    let pairs = SnippetParser::parse(Rule::program, source).map_err(convert_parse_error)?;

    let mut exprs = Vec::new();
    for program in pairs {
        for pair in program.into_inner() {
            if pair.as_rule() == Rule::EOI {
                continue;
            }
            exprs.push(build_expr(pair)?);
        }
    }
    Ok(exprs)
}

// ============================================================================
// BUILDERS
// ============================================================================

fn build_expr(pair: Pair<Rule>) -> Result<Expr, SampleError> {
    let text = pair.as_str();
    match pair.as_rule() {
        Rule::list => pair
            .into_inner()
            .map(build_expr)
            .collect::<Result<Vec<_>, _>>()
            .map(Expr::List),
        Rule::nil => Ok(Expr::Nil),
        Rule::boolean => Ok(Expr::Bool(text == "true")),
        Rule::integer => text
            .parse::<i64>()
            .map(Expr::Int)
            .map_err(|e| err_msg!(Snippet, "invalid integer literal: {}", text).with_source(e)),
        Rule::string => Ok(Expr::Str(unescape_string(text))),
        Rule::keyword => Ok(Expr::Keyword(text[1..].to_string())),
        Rule::symbol => Ok(Expr::Symbol(text.to_string())),
        other => Err(err_msg!(Snippet, "unexpected syntax element {:?}: {}", other, text)),
    }
}

fn unescape_string(text: &str) -> String {
    let inner = &text[1..text.len() - 1];
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('\\') => result.push('\\'),
            Some('"') => result.push('"'),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }
    result
}

fn convert_parse_error(error: Error<Rule>) -> SampleError {
    let location = match error.line_col {
        pest::error::LineColLocation::Pos((line, col)) => format!("{}:{}", line, col),
        pest::error::LineColLocation::Span((line, col), _) => format!("{}:{}", line, col),
    };
    err_msg!(Snippet, "could not parse code at {}", location).with_source(error)
}
