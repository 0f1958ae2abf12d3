//! Test-plan files.
//!
//! A plan file holds a top-level `test` mapping with an ordered `suites` list:
//!
//! ```yaml
//! test:
//!   suites:
//!   - name: "product search"
//!     setup:
//!     - uuid: product_id
//!     cases:
//!     - name: "create a product"
//!       spec:
//!       - call: {target: create_product, params: {id: {variable: product_id}}}
//!       - assert_contains: [{variable: product_id}]
//!     teardown:
//!     - call_may_fail: {target: delete_product}
//! ```
//!
//! Suites keep their declaration order, across files in the order the files are given.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};
use tracing::info;
use walkdir::WalkDir;

use crate::caserunner::Segment;
use crate::SampleError;

const MISSING_CASE_NAME: &str = "(missing name)";
const ENVIRONMENT_FILE_SUFFIX: &str = ".env.yaml";

#[derive(Debug, Clone, Deserialize)]
pub struct SuiteConfig {
    #[serde(default)]
    pub name: String,
    /// The plan file this suite was read from; set on load.
    #[serde(skip)]
    pub source: PathBuf,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub setup: Vec<Segment>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub teardown: Vec<Segment>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub cases: Vec<CaseConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaseConfig {
    #[serde(default = "missing_case_name")]
    pub name: String,
    /// The TEST stage of the case.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub spec: Vec<Segment>,
}

#[derive(Debug, Deserialize)]
struct PlanFile {
    test: PlanSection,
}

#[derive(Debug, Deserialize)]
struct PlanSection {
    #[serde(default, deserialize_with = "null_as_empty")]
    suites: Vec<SuiteConfig>,
}

fn default_enabled() -> bool {
    true
}

fn missing_case_name() -> String {
    MISSING_CASE_NAME.to_string()
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// LOADING
// ============================================================================

/// Parses the suites of one plan document, tagging each with `source`.
pub fn parse_suites(text: &str, source: &Path) -> Result<Vec<SuiteConfig>, SampleError> {
    let plan: PlanFile = serde_yaml::from_str(text).map_err(|e| {
        err_msg!(Plan, "could not parse test plan \"{}\": {}", source.display(), e).with_source(e)
    })?;
    let mut suites = plan.test.suites;
    for suite in &mut suites {
        suite.source = source.to_path_buf();
    }
    Ok(suites)
}

/// Reads every plan file in order and concatenates their suites.
pub fn suite_configs_from<P: AsRef<Path>>(files: &[P]) -> Result<Vec<SuiteConfig>, SampleError> {
    let mut all_suites = Vec::new();
    for file in files {
        let path = file.as_ref();
        info!("Reading test file \"{}\"", path.display());
        let text = fs::read_to_string(path).map_err(|e| {
            err_msg!(Plan, "could not read test plan \"{}\"", path.display()).with_source(e)
        })?;
        all_suites.extend(parse_suites(&text, path)?);
    }
    Ok(all_suites)
}

/// Whether `path` names an environment file rather than a test plan.
pub fn is_environment_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.ends_with(ENVIRONMENT_FILE_SUFFIX))
        .unwrap_or(false)
}

/// Finds all plan files recursively under `root`, in sorted order.
pub fn discover_plan_files<P: AsRef<Path>>(root: P) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_type().is_file()
                && e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
                && !is_environment_file(e.path())
        })
        .map(|e| e.path().to_path_buf())
        .collect()
}
