//! Running status summary of a plan walk.
//!
//! [`SummaryVisitor`] emits one status line per environment, suite and case as the walk
//! proceeds, indented by level, and keeps every line for [`SummaryVisitor::output`].
//! Combined with the runner in a [`MultiVisitor`](crate::plan::MultiVisitor) after it,
//! each case's line is printed as soon as that case has run.

use std::io::Write;

use termcolor::{Color, ColorSpec, WriteColor};

use crate::plan::{EnvironmentState, PlanCase, PlanNode, SuiteState, Visit, Visitor};
use crate::SampleError;

const INDENT: &str = "  ";

/// How much to show for passing nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detail {
    None,
    Brief,
    Full,
}

pub struct SummaryVisitor {
    verbosity: Detail,
    show_errors: bool,
    debug: bool,
    progress: Option<Box<dyn WriteColor>>,
    lines: Vec<String>,
}

impl SummaryVisitor {
    /// A summary that only records lines; see [`SummaryVisitor::with_progress`].
    pub fn new(verbosity: Detail, show_errors: bool) -> Self {
        Self {
            verbosity,
            show_errors,
            debug: false,
            progress: None,
            lines: Vec::new(),
        }
    }

    /// Also writes every line to `out` as it is recorded.
    pub fn with_progress(mut self, out: Box<dyn WriteColor>) -> Self {
        self.progress = Some(out);
        self
    }

    /// Appends every recorded error of each case after its output.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn output(&self) -> String {
        self.lines.join("\n")
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// The status to print for a node, or `None` when this verbosity hides it.
    pub fn status_str(&self, node: &PlanNode, doit: bool) -> Option<&'static str> {
        if !doit {
            return Some("SKIPPED");
        }
        if !node.attempted {
            return (self.verbosity == Detail::Full).then_some("PREEMPTED");
        }
        if !node.completed {
            return Some("RUNNING");
        }
        Some(if node.success() { "PASSED" } else { "FAILED" })
    }

    fn append_status(&mut self, indent: usize, status: &str, rest: &str) {
        if let Some(out) = self.progress.as_mut() {
            let _ = write!(out, "{}", INDENT.repeat(indent));
            let _ = out.set_color(ColorSpec::new().set_fg(Some(status_color(status))).set_bold(true));
            let _ = write!(out, "{}", status);
            let _ = out.reset();
            let _ = writeln!(out, "{}", rest);
        }
        self.lines
            .push(format!("{}{}{}", INDENT.repeat(indent), status, rest));
    }

    fn append_lines(&mut self, text: String) {
        if let Some(out) = self.progress.as_mut() {
            let _ = writeln!(out, "{}", text);
        }
        self.lines.push(text);
    }
}

fn status_color(status: &str) -> Color {
    match status {
        "PASSED" => Color::Green,
        "FAILED" => Color::Red,
        "RUNNING" => Color::Cyan,
        _ => Color::Yellow,
    }
}

impl Visitor for SummaryVisitor {
    fn enter_environment(
        &mut self,
        env: &mut EnvironmentState,
        doit: bool,
    ) -> Result<Visit, SampleError> {
        if self.verbosity == Detail::None && (env.success() || !self.show_errors) {
            return Ok(Visit::Skip);
        }
        let Some(status) = self.status_str(&env.node, doit) else {
            return Ok(Visit::Skip);
        };
        self.append_status(0, status, &format!(": Test environment: \"{}\"", env.name()));
        Ok(Visit::Descend)
    }

    fn enter_suite(
        &mut self,
        _env: &mut EnvironmentState,
        _idx: usize,
        suite: &mut SuiteState,
        doit: bool,
    ) -> Result<Visit, SampleError> {
        let Some(status) = self.status_str(&suite.node, doit) else {
            return Ok(Visit::Skip);
        };
        self.append_status(1, status, &format!(": Test suite: \"{}\"", suite.name));
        Ok(Visit::Descend)
    }

    fn visit_case(
        &mut self,
        _env: &mut EnvironmentState,
        _suite: &mut SuiteState,
        _idx: usize,
        case: &mut PlanCase,
        doit: bool,
    ) -> Result<(), SampleError> {
        let Some(status) = self.status_str(&case.node, doit) else {
            return Ok(());
        };
        self.append_status(2, status, &format!(": Test case: \"{}\"", case.name));

        let Some(runner) = case.runner.as_ref() else {
            return Ok(());
        };
        if self.verbosity == Detail::Full || (self.show_errors && !case.success()) {
            self.append_lines(runner.get_output(6, "| "));
        }
        if self.debug {
            for (status, message) in runner.get_errors() {
                self.append_lines(format!("DEBUGGING: Error \"{}\":\n{}", status, message));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_str() {
        let brief = SummaryVisitor::new(Detail::Brief, true);
        let full = SummaryVisitor::new(Detail::Full, true);
        let mut node = PlanNode::new(true);

        assert_eq!(brief.status_str(&node, false), Some("SKIPPED"));
        assert_eq!(brief.status_str(&node, true), None);
        assert_eq!(full.status_str(&node, true), Some("PREEMPTED"));

        node.attempted = true;
        assert_eq!(brief.status_str(&node, true), Some("RUNNING"));
        node.completed = true;
        assert_eq!(brief.status_str(&node, true), Some("PASSED"));
        node.num_failures = 1;
        assert_eq!(brief.status_str(&node, true), Some("FAILED"));
    }

    #[test]
    fn test_progress_is_written() {
        let buffer = termcolor::Buffer::no_color();
        let mut summary = SummaryVisitor::new(Detail::Brief, true).with_progress(Box::new(buffer));
        summary.append_status(1, "PASSED", ": Test suite: \"s\"");
        assert_eq!(summary.output(), "  PASSED: Test suite: \"s\"");
    }
}
