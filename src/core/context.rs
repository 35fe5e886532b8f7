//! Per-instance execution context - environment, working directory, templating

use crate::core::matrix::JobInstance;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

fn matrix_expr() -> &'static Regex {
    static MATRIX_EXPR: OnceLock<Regex> = OnceLock::new();
    MATRIX_EXPR.get_or_init(|| {
        Regex::new(r"\$\{\{\s*matrix\.([A-Za-z0-9_-]+)\s*\}\}")
            .expect("matrix expression pattern is valid")
    })
}

/// Replace `${{ matrix.<axis> }}` with the instance's value for that axis.
///
/// References to axes the instance does not have are left untouched.
pub fn render_template(template: &str, instance: &JobInstance) -> String {
    matrix_expr()
        .replace_all(template, |caps: &regex::Captures| {
            instance
                .get(&caps[1])
                .map(str::to_string)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Matrix axes referenced through `${{ matrix.<axis> }}` in a template
pub fn template_axes(template: &str) -> Vec<String> {
    matrix_expr()
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Environment variable name a matrix axis is exported under
pub fn matrix_env_name(axis: &str) -> String {
    let sanitized: String = axis
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("MATRIX_{}", sanitized)
}

/// Everything a command needs to run on behalf of one job instance
#[derive(Debug, Clone)]
pub struct StepContext {
    /// Directory the command runs in
    pub working_dir: PathBuf,

    /// Environment variables layered as: CI, matrix, job env, step env
    pub env: BTreeMap<String, String>,

    /// Timeout in seconds (None = wait indefinitely)
    pub timeout_secs: Option<u64>,

    /// Label used when streaming output
    pub label: String,
}

impl StepContext {
    /// Base context for an instance: workspace directory plus CI and matrix variables
    pub fn for_instance(instance: &JobInstance, workspace: &Path, job_env: &BTreeMap<String, String>) -> Self {
        let mut env = BTreeMap::new();
        env.insert("CI".to_string(), "true".to_string());
        env.insert("MATRIX_JOB".to_string(), instance.job.clone());
        for (axis, value) in &instance.values {
            env.insert(matrix_env_name(axis), value.clone());
        }
        for (key, value) in job_env {
            env.insert(key.clone(), render_template(value, instance));
        }

        Self {
            working_dir: workspace.to_path_buf(),
            env,
            timeout_secs: None,
            label: instance.label(),
        }
    }

    /// Derive the context for a single step
    pub fn with_step(
        &self,
        step_env: BTreeMap<String, String>,
        working_directory: Option<&str>,
        timeout_secs: Option<u64>,
    ) -> Self {
        let mut ctx = self.clone();
        ctx.env.extend(step_env);
        if let Some(dir) = working_directory {
            ctx.working_dir = self.working_dir.join(dir);
        }
        ctx.timeout_secs = timeout_secs.or(self.timeout_secs);
        ctx
    }
}
