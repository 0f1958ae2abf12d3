//! A static, file-configured environment.
//!
//! `TemplateEnvironment` resolves an invocation either through its explicit `targets`
//! table or, failing that, through its `command` template, where `{target}` stands for
//! the invocation name. Canonically formatted arguments are appended to the resolved
//! command. Environment files look like:
//!
//! ```yaml
//! environments:
//!   - name: python
//!     command: "python3 samples/{target}.py"
//!     targets:
//!       quickstart:
//!         command: "python3 quickstart/main.py"
//!         working_dir: quickstart
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use super::{format_call_args, Environment, ResolvedCall};
use crate::SampleError;

const TARGET_PLACEHOLDER: &str = "{target}";

/// Name of the environment registered when no environment file is supplied.
pub const DEFAULT_ENVIRONMENT: &str = "default";

#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    pub command: String,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateEnvironmentConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    #[serde(default)]
    pub targets: BTreeMap<String, TargetConfig>,
}

#[derive(Debug, Deserialize)]
struct EnvironmentFile {
    environments: Vec<TemplateEnvironmentConfig>,
}

#[derive(Debug, Clone)]
pub struct TemplateEnvironment {
    config: TemplateEnvironmentConfig,
}

impl TemplateEnvironment {
    pub fn new(config: TemplateEnvironmentConfig) -> Self {
        Self { config }
    }

    /// The environment used when no environment file is given: the invocation name is
    /// the command itself.
    pub fn passthrough() -> Self {
        Self::new(TemplateEnvironmentConfig {
            name: DEFAULT_ENVIRONMENT.to_string(),
            description: "runs invocations as shell commands".to_string(),
            command: Some(TARGET_PLACEHOLDER.to_string()),
            working_dir: None,
            targets: BTreeMap::new(),
        })
    }

    pub fn config(&self) -> &TemplateEnvironmentConfig {
        &self.config
    }

    fn resolve_base(&self, invocation: &str) -> Result<(String, Option<PathBuf>), SampleError> {
        if let Some(target) = self.config.targets.get(invocation) {
            let dir = target
                .working_dir
                .clone()
                .or_else(|| self.config.working_dir.clone());
            return Ok((target.command.clone(), dir));
        }
        match &self.config.command {
            Some(template) => Ok((
                template.replace(TARGET_PLACEHOLDER, invocation),
                self.config.working_dir.clone(),
            )),
            None => Err(err_msg!(
                Call,
                "environment \"{}\" has no artifact \"{}\"",
                self.config.name,
                invocation
            )),
        }
    }
}

impl Environment for TemplateEnvironment {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn description(&self) -> &str {
        &self.config.description
    }

    fn get_call(
        &self,
        invocation: &str,
        args: &[String],
        kwargs: &BTreeMap<String, String>,
    ) -> Result<ResolvedCall, SampleError> {
        let (base, dir) = self.resolve_base(invocation)?;
        let cli_args = format_call_args(args, kwargs);
        let command = if cli_args.is_empty() {
            base
        } else {
            format!("{} {}", base, cli_args)
        };
        Ok(ResolvedCall {
            command,
            working_dir: dir,
        })
    }
}

/// Loads every environment declared in `path`.
///
/// Relative working directories are resolved against the file's directory.
pub fn load_environment_file(path: &Path) -> Result<Vec<TemplateEnvironment>, SampleError> {
    info!("Reading environment file \"{}\"", path.display());
    let content = fs::read_to_string(path).map_err(|e| {
        err_msg!(Plan, "could not read environment file \"{}\"", path.display()).with_source(e)
    })?;
    let file: EnvironmentFile = serde_yaml::from_str(&content).map_err(|e| {
        err_msg!(Plan, "malformed environment file \"{}\"", path.display()).with_source(e)
    })?;

    let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok(file
        .environments
        .into_iter()
        .map(|mut config| {
            config.working_dir = config.working_dir.map(|dir| base.join(dir));
            for target in config.targets.values_mut() {
                target.working_dir = target.working_dir.take().map(|dir| base.join(dir));
            }
            TemplateEnvironment::new(config)
        })
        .collect())
}
