//! Defines the command-line arguments of the sample tester.
//!
//! This module uses the `clap` crate with its "derive" feature to create a
//! declarative and type-safe argument parsing structure.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use termcolor::ColorChoice;

use crate::summary::Detail;

const EPILOG: &str = "CONFIGS consists of any number of the following, in any order:

  TEST.yaml files: the test plans to execute against every environment
  ENV.env.yaml files: environment definitions (default: a single `default`
    environment that runs each call target as a shell command)
  directories: searched recursively for test plans";

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "sampletester",
    version,
    about = "A tool to run tests on equivalent samples in different languages",
    after_help = EPILOG
)]
pub struct SampleTesterArgs {
    /// Test plans, environment files and directories of test plans.
    #[arg(value_name = "CONFIGS")]
    pub files: Vec<PathBuf>,

    /// Regex filtering test environments to execute.
    #[arg(long, value_name = "TESTENV_FILTER")]
    pub envs: Option<String>,

    /// Regex filtering test suites to execute.
    #[arg(long, value_name = "SUITE_FILTER")]
    pub suites: Option<String>,

    /// Regex filtering test cases to execute.
    #[arg(long, value_name = "CASE_FILTER")]
    pub cases: Option<String>,

    /// Stop execution as soon as any test case fails, preempting additional
    /// test cases/suites/environments from running.
    #[arg(long)]
    pub fail_fast: bool,

    /// How much output to show for passing tests.
    #[arg(short, long, value_enum, default_value_t = Verbosity::Summary)]
    pub verbosity: Verbosity,

    /// Suppress showing output for failing cases.
    #[arg(short = 'f', long, alias = "suppress_failures")]
    pub suppress_failures: bool,

    /// Show logs at the specified level. `RUST_LOG` overrides it.
    #[arg(short, long, value_enum, default_value_t = LogLevel::None)]
    pub logging: LogLevel,

    /// Kill any call still running after this many seconds.
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Always colorize the summary.
    #[arg(long, overrides_with = "no_color")]
    pub color: bool,

    /// Never colorize the summary.
    #[arg(long, overrides_with = "color")]
    pub no_color: bool,
}

impl SampleTesterArgs {
    pub fn color_choice(&self) -> ColorChoice {
        if self.no_color {
            ColorChoice::Never
        } else if self.color {
            ColorChoice::Always
        } else if atty::is(atty::Stream::Stderr) {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Verbosity {
    Quiet,
    Summary,
    Detailed,
}

impl Verbosity {
    pub fn detail(self) -> Detail {
        match self {
            Verbosity::Quiet => Detail::None,
            Verbosity::Summary => Detail::Brief,
            Verbosity::Detailed => Detail::Full,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    None,
    Info,
    Debug,
}

impl LogLevel {
    /// The default `EnvFilter` directive for this level.
    pub fn directive(self) -> &'static str {
        match self {
            LogLevel::None => "off",
            LogLevel::Info => "sampletester=info",
            LogLevel::Debug => "sampletester=debug",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = SampleTesterArgs::try_parse_from(["sampletester", "plan.yaml"]).unwrap();
        assert_eq!(args.files, vec![PathBuf::from("plan.yaml")]);
        assert_eq!(args.verbosity, Verbosity::Summary);
        assert_eq!(args.logging, LogLevel::None);
        assert!(!args.fail_fast && !args.suppress_failures);
        assert_eq!(args.timeout, None);
    }

    #[test]
    fn test_flags() {
        let args = SampleTesterArgs::try_parse_from([
            "sampletester",
            "-v",
            "detailed",
            "-l",
            "debug",
            "-f",
            "--fail-fast",
            "--cases",
            "^create",
            "--timeout",
            "30",
            "--no-color",
            "a.yaml",
            "b.env.yaml",
        ])
        .unwrap();
        assert_eq!(args.verbosity.detail(), Detail::Full);
        assert_eq!(args.logging.directive(), "sampletester=debug");
        assert!(args.suppress_failures && args.fail_fast);
        assert_eq!(args.cases.as_deref(), Some("^create"));
        assert_eq!(args.timeout, Some(30));
        assert_eq!(args.color_choice(), ColorChoice::Never);
        assert_eq!(args.files.len(), 2);
    }

    #[test]
    fn test_bad_verbosity_is_rejected() {
        assert!(SampleTesterArgs::try_parse_from(["sampletester", "-v", "loud"]).is_err());
    }
}
