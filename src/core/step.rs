//! Step domain model

use crate::core::{
    action::Action,
    condition::Guard,
    context::render_template,
    error::ConfigError,
    matrix::JobInstance,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which part of a job a step belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Environment provisioning before the source is fetched
    Setup,
    /// Source checkout
    Fetch,
    /// Job body
    Run,
}

/// Shell used to interpret a `run` body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Shell {
    #[default]
    Bash,
    Sh,
}

impl Shell {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "bash" => Some(Shell::Bash),
            "sh" => Some(Shell::Sh),
            _ => None,
        }
    }

    /// Program and leading arguments; the script follows as the last argument
    pub fn command(&self) -> (&'static str, &'static [&'static str]) {
        match self {
            Shell::Bash => ("bash", &["--noprofile", "--norc", "-eo", "pipefail", "-c"]),
            Shell::Sh => ("sh", &["-e", "-c"]),
        }
    }
}

/// What a step does when it runs
#[derive(Debug, Clone, PartialEq)]
pub enum StepBody {
    /// Literal multi-line script handed to a shell
    Run { script: String, shell: Shell },
    /// Built-in action reference with its inputs
    Uses {
        action: String,
        with: BTreeMap<String, String>,
    },
}

/// A single step in a job
#[derive(Debug, Clone)]
pub struct Step {
    /// 1-based position in the job
    pub index: usize,

    /// Optional step id (unique within the job)
    pub id: Option<String>,

    /// Display name template
    pub name: String,

    pub body: StepBody,

    /// Guard gating execution per instance
    pub guard: Option<Guard>,

    pub phase: Phase,

    /// Step-level environment
    pub env: BTreeMap<String, String>,

    /// Directory relative to the instance workspace
    pub working_directory: Option<String>,

    /// Timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// A step with every `${{ matrix.* }}` expression substituted for one instance
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedBody {
    Script { script: String, shell: Shell },
    Checkout(Action),
}

impl Step {
    /// Default display name when `name:` is omitted
    pub fn default_name(body: &StepBody) -> String {
        match body {
            StepBody::Run { script, .. } => {
                let first_line = script.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
                format!("Run {}", first_line.trim())
            }
            StepBody::Uses { action, .. } => format!("Run {}", action),
        }
    }

    /// Whether the guard allows this step to run for the instance
    pub fn should_run(&self, instance: &JobInstance) -> bool {
        self.guard.as_ref().map_or(true, |g| g.evaluate(instance))
    }

    /// Rendered display name
    pub fn display_name(&self, instance: &JobInstance) -> String {
        render_template(&self.name, instance)
    }

    /// Render the body for an instance
    pub fn resolve(&self, instance: &JobInstance) -> Result<ResolvedBody, ConfigError> {
        match &self.body {
            StepBody::Run { script, shell } => Ok(ResolvedBody::Script {
                script: render_template(script, instance),
                shell: *shell,
            }),
            StepBody::Uses { action, with } => {
                let rendered: BTreeMap<String, String> = with
                    .iter()
                    .map(|(k, v)| (k.clone(), render_template(v, instance)))
                    .collect();
                let action = Action::resolve(action, &rendered)?;
                match action.script() {
                    Some(script) => Ok(ResolvedBody::Script {
                        script,
                        shell: Shell::Bash,
                    }),
                    None => Ok(ResolvedBody::Checkout(action)),
                }
            }
        }
    }

    /// Rendered step environment
    pub fn render_env(&self, instance: &JobInstance) -> BTreeMap<String, String> {
        self.env
            .iter()
            .map(|(k, v)| (k.clone(), render_template(v, instance)))
            .collect()
    }
}
