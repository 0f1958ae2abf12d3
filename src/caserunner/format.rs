//! Message formatting shared by the case runner and its reporting surface.

use super::scope::Value;
use crate::SampleError;

const PLACEHOLDER: &str = "{}";

/// Formats `template` with `args`, auto-padding missing placeholders.
///
/// With no arguments the template is returned untouched. When the template holds fewer
/// `{}` markers than there are arguments, `": "` plus one `"{} "` per missing marker is
/// appended before substitution. `{{` and `}}` render literal braces and `{N}` selects an
/// argument by index.
pub fn format_string(template: &str, args: &[Value]) -> Result<String, SampleError> {
    if args.is_empty() {
        return Ok(template.to_string());
    }

    let count = template.matches(PLACEHOLDER).count();
    let mut padded = template.to_string();
    if args.len() > count {
        padded.push_str(": ");
        padded.push_str(&"{} ".repeat(args.len() - count));
    }
    substitute(&padded, args)
}

fn substitute(template: &str, args: &[Value]) -> Result<String, SampleError> {
    let mut out = String::with_capacity(template.len());
    let mut next_auto = 0;
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => return Err(err_msg!(Format, "single '}}' encountered in \"{}\"", template)),
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => field.push(ch),
                        None => {
                            return Err(err_msg!(
                                Format,
                                "single '{{' encountered in \"{}\"",
                                template
                            ))
                        }
                    }
                }
                let index = if field.is_empty() {
                    next_auto += 1;
                    next_auto - 1
                } else {
                    field.parse::<usize>().map_err(|_| {
                        err_msg!(Format, "unsupported replacement field {{{}}}", field)
                    })?
                };
                let arg = args.get(index).ok_or_else(|| {
                    err_msg!(
                        Format,
                        "replacement index {} out of range for {} argument(s)",
                        index,
                        args.len()
                    )
                })?;
                out.push_str(&arg.to_string());
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

/// Prefixes every line of `s` with `indent` spaces followed by `prompt`.
pub fn reindent(s: &str, indent: usize, prompt: &str) -> String {
    let prefix = format!("{}{}", " ".repeat(indent), prompt);
    s.split('\n')
        .map(|line| format!("{}{}", prefix, line))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strs(values: &[&str]) -> Vec<Value> {
        values.iter().map(|v| Value::from(*v)).collect()
    }

    #[test]
    fn test_no_args_returns_template_verbatim() {
        assert_eq!(format_string("literal {} and }", &[]).unwrap(), "literal {} and }");
    }

    #[test]
    fn test_exact_placeholder_count() {
        assert_eq!(
            format_string("{} and {}", &strs(&["a", "b"])).unwrap(),
            "a and b"
        );
    }

    #[test]
    fn test_missing_placeholders_are_padded() {
        assert_eq!(
            format_string("call failed", &strs(&["a", "b"])).unwrap(),
            "call failed: a b "
        );
        assert_eq!(format_string("got {}", &strs(&["a", "b"])).unwrap(), "got a: b ");
    }

    #[test]
    fn test_partial_padding_order() {
        assert_eq!(
            format_string("x={}", &strs(&["1", "2", "3"])).unwrap(),
            "x=1: 2 3 "
        );
    }

    #[test]
    fn test_escaped_braces() {
        assert_eq!(format_string("{{{}}}", &strs(&["a"])).unwrap(), "{a}");
    }

    #[test]
    fn test_too_few_args_is_error() {
        let err = format_string("{} {} {}", &strs(&["a"])).unwrap_err();
        assert_eq!(err.error_type(), crate::ErrorType::Format);
    }

    #[test]
    fn test_reindent() {
        assert_eq!(reindent("a\nb", 2, "| "), "  | a\n  | b");
        assert_eq!(reindent("", 0, ""), "");
    }
}
