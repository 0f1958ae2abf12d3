//! Handles the user-facing output of the CLI that is not part of the running summary.

use std::io::Write;

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::SampleError;

/// Prints the final verdict of the run to stdout.
pub fn print_verdict(success: bool, color: ColorChoice) {
    let mut stdout = StandardStream::stdout(color);
    let (text, fg) = if success {
        ("Tests passed", Color::Green)
    } else {
        ("Tests failed", Color::Red)
    };
    let _ = writeln!(stdout);
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(fg)).set_bold(true));
    let _ = writeln!(stdout, "{}", text);
    let _ = stdout.reset();
}

/// Reports an error that kept the tests from running, with its diagnostic rendering.
pub fn print_setup_error(err: SampleError, usage: &str) {
    eprintln!("\nERROR: could not run tests because {}\n", err.message());
    eprintln!("{:?}", miette::Report::new(err));
    eprintln!("{}", usage);
}

pub fn print_interrupt() {
    eprintln!("\nkeyboard interrupt; aborting");
}
