//! Workflow domain model

use crate::core::{
    action::Action,
    condition::Guard,
    config::{scalar_map, JobConfig, StepConfig, WorkflowConfig},
    context::{render_template, template_axes},
    error::ConfigError,
    matrix::{JobInstance, Matrix},
    step::{Phase, Shell, Step, StepBody},
};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Largest `timeout-minutes` whose value in seconds fits in a `u64`
pub const MAX_TIMEOUT_MINUTES: u64 = u64::MAX / 60;

/// Event kinds that can start a run
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// Manual dispatch
    WorkflowDispatch,
    /// Push to the repository
    Push,
    /// Any other event name, accepted but never raised by this tool itself
    Other(String),
}

impl Trigger {
    pub fn parse(name: &str) -> Self {
        match name {
            "workflow_dispatch" => Trigger::WorkflowDispatch,
            "push" => Trigger::Push,
            other => Trigger::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Trigger::WorkflowDispatch => "workflow_dispatch",
            Trigger::Push => "push",
            Trigger::Other(name) => name,
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated workflow
#[derive(Debug, Clone)]
pub struct Workflow {
    pub name: String,

    /// Events that start this workflow
    pub triggers: Vec<Trigger>,

    /// Jobs in declaration order
    pub jobs: Vec<JobDefinition>,
}

/// Immutable job template: matrix plus ordered steps
#[derive(Debug, Clone)]
pub struct JobDefinition {
    /// Key in the `jobs` mapping
    pub id: String,

    /// Display name
    pub name: String,

    /// Runner label template
    pub runs_on: String,

    pub matrix: Matrix,

    /// Job-level environment (templates)
    pub env: BTreeMap<String, String>,

    /// Concurrency cap for this job's instances
    pub max_parallel: Option<usize>,

    /// Default step timeout in seconds
    pub timeout_secs: Option<u64>,

    pub steps: Vec<Step>,
}

impl Workflow {
    /// Build and validate a workflow from configuration
    pub fn from_config(config: &WorkflowConfig) -> Result<Self, ConfigError> {
        if config.jobs.is_empty() {
            return Err(ConfigError::NoJobs);
        }

        let mut seen = HashSet::new();
        let mut jobs = Vec::with_capacity(config.jobs.len());
        for (id, job) in &config.jobs {
            if !seen.insert(id.as_str()) {
                return Err(ConfigError::InvalidJob {
                    job: id.clone(),
                    message: "duplicate job id".to_string(),
                });
            }
            jobs.push(JobDefinition::from_config(id, job)?);
        }

        let triggers = match &config.on {
            Some(on) => on.events().iter().map(|e| Trigger::parse(e)).collect(),
            None => vec![Trigger::WorkflowDispatch],
        };

        Ok(Workflow {
            name: config.name.clone().unwrap_or_else(|| "workflow".to_string()),
            triggers,
            jobs,
        })
    }

    /// Whether an event starts this workflow
    pub fn is_triggered_by(&self, event: &Trigger) -> bool {
        self.triggers.contains(event)
    }

    /// Get a job by ID
    pub fn job(&self, id: &str) -> Option<&JobDefinition> {
        self.jobs.iter().find(|j| j.id == id)
    }

    /// Expand every job's matrix, in job declaration order
    pub fn expand(&self) -> Result<Vec<(&JobDefinition, JobInstance)>, ConfigError> {
        let mut instances = Vec::new();
        for job in &self.jobs {
            for instance in job.expand()? {
                instances.push((job, instance));
            }
        }
        Ok(instances)
    }
}

impl JobDefinition {
    /// Build and validate a job from configuration
    pub fn from_config(id: &str, config: &JobConfig) -> Result<Self, ConfigError> {
        let invalid_job = |message: String| ConfigError::InvalidJob {
            job: id.to_string(),
            message,
        };

        if config.steps.is_empty() {
            return Err(invalid_job("job has no steps".to_string()));
        }
        if config.max_parallel() == Some(0) {
            return Err(invalid_job("max-parallel must be at least 1".to_string()));
        }
        let timeout_secs = minutes_to_secs(config.timeout_minutes).map_err(&invalid_job)?;

        let matrix = config.parse_matrix(id)?;
        // Surface an unsatisfiable matrix at load time
        let instances = matrix.expand(id)?;

        let axes: HashSet<&str> = matrix.axes.iter().map(|a| a.name.as_str()).collect();

        let runs_on = config.runs_on_label();
        check_template_axes(&runs_on, &axes).map_err(invalid_job)?;

        let env = scalar_map(&config.env).map_err(|m| invalid_job(format!("env {}", m)))?;
        for value in env.values() {
            check_template_axes(value, &axes).map_err(invalid_job)?;
        }

        let phases = infer_phases(&config.steps);
        let mut steps = Vec::with_capacity(config.steps.len());
        let mut step_ids = HashSet::new();

        for (i, (step_config, phase)) in config.steps.iter().zip(phases).enumerate() {
            let step = build_step(id, i + 1, step_config, phase, &axes, &instances)?;
            if let Some(step_id) = &step.id {
                if !step_ids.insert(step_id.clone()) {
                    return Err(ConfigError::InvalidStep {
                        job: id.to_string(),
                        index: step.index,
                        step: step.name.clone(),
                        message: format!("duplicate step id '{}'", step_id),
                    });
                }
            }
            steps.push(step);
        }

        for pair in steps.windows(2) {
            if pair[1].phase < pair[0].phase {
                return Err(ConfigError::InvalidStep {
                    job: id.to_string(),
                    index: pair[1].index,
                    step: pair[1].name.clone(),
                    message: format!(
                        "{:?} step cannot follow a {:?} step",
                        pair[1].phase, pair[0].phase
                    ),
                });
            }
        }

        Ok(JobDefinition {
            id: id.to_string(),
            name: config.name.clone().unwrap_or_else(|| id.to_string()),
            runs_on,
            matrix,
            env,
            max_parallel: config.max_parallel(),
            timeout_secs,
            steps,
        })
    }

    /// Expand this job's matrix into instances
    pub fn expand(&self) -> Result<Vec<JobInstance>, ConfigError> {
        self.matrix.expand(&self.id)
    }

    /// Rendered runner label for an instance
    pub fn runs_on_for(&self, instance: &JobInstance) -> String {
        render_template(&self.runs_on, instance)
    }

    /// Steps of one phase, in order
    pub fn steps_in_phase(&self, phase: Phase) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(move |s| s.phase == phase)
    }
}

/// Explicit phases win; otherwise a checkout is Fetch, steps before the first
/// fetch are Setup and everything else is Run.
fn infer_phases(steps: &[StepConfig]) -> Vec<Phase> {
    let is_fetch = |s: &StepConfig| match s.phase {
        Some(phase) => phase == Phase::Fetch,
        None => s.uses.as_deref().is_some_and(is_checkout_ref),
    };
    let first_fetch = steps.iter().position(is_fetch);

    steps
        .iter()
        .enumerate()
        .map(|(i, s)| match s.phase {
            Some(phase) => phase,
            None if s.uses.as_deref().is_some_and(is_checkout_ref) => Phase::Fetch,
            None => match first_fetch {
                Some(fetch) if i < fetch => Phase::Setup,
                _ => Phase::Run,
            },
        })
        .collect()
}

/// Convert `timeout-minutes` to seconds, rejecting zero and overflow
fn minutes_to_secs(minutes: Option<u64>) -> Result<Option<u64>, String> {
    match minutes {
        None => Ok(None),
        Some(0) => Err("timeout-minutes must be at least 1".to_string()),
        Some(m) if m > MAX_TIMEOUT_MINUTES => Err(format!(
            "timeout-minutes must be at most {}, got {}",
            MAX_TIMEOUT_MINUTES, m
        )),
        Some(m) => Ok(Some(m * 60)),
    }
}

fn is_checkout_ref(uses: &str) -> bool {
    uses.split('@').next() == Some("actions/checkout")
}

fn check_template_axes(template: &str, axes: &HashSet<&str>) -> Result<(), String> {
    match template_axes(template).into_iter().find(|a| !axes.contains(a.as_str())) {
        Some(axis) => Err(format!("references unknown matrix axis '{}'", axis)),
        None => Ok(()),
    }
}

fn build_step(
    job: &str,
    index: usize,
    config: &StepConfig,
    phase: Phase,
    axes: &HashSet<&str>,
    instances: &[JobInstance],
) -> Result<Step, ConfigError> {
    let label = config
        .name
        .clone()
        .or_else(|| config.id.clone())
        .unwrap_or_else(|| format!("#{}", index));
    let invalid = |message: String| ConfigError::InvalidStep {
        job: job.to_string(),
        index,
        step: label.clone(),
        message,
    };

    let body = match (&config.run, &config.uses) {
        (Some(script), None) => {
            let shell = match config.shell.as_deref() {
                None => Shell::default(),
                Some(name) => Shell::parse(name)
                    .ok_or_else(|| invalid(format!("unsupported shell '{}'", name)))?,
            };
            check_template_axes(script, axes).map_err(&invalid)?;
            StepBody::Run {
                script: script.clone(),
                shell,
            }
        }
        (None, Some(uses)) => {
            let with = scalar_map(&config.with).map_err(|m| invalid(format!("with {}", m)))?;
            for value in with.values() {
                check_template_axes(value, axes).map_err(&invalid)?;
            }
            // Inputs may be templated, so check them as each instance will see them
            for instance in instances {
                let rendered: BTreeMap<String, String> = with
                    .iter()
                    .map(|(k, v)| (k.clone(), render_template(v, instance)))
                    .collect();
                Action::resolve(uses, &rendered).map_err(|e| invalid(e.to_string()))?;
            }
            StepBody::Uses {
                action: uses.clone(),
                with,
            }
        }
        _ => return Err(invalid("step must define exactly one of `run` or `uses`".to_string())),
    };

    let guard = match config.condition_text() {
        Some(expression) => {
            let guard = Guard::parse(&expression).map_err(|e| invalid(e.to_string()))?;
            if let Some(axis) = guard
                .referenced_axes()
                .into_iter()
                .find(|a| !axes.contains(a.as_str()))
            {
                return Err(invalid(format!(
                    "guard '{}' references unknown matrix axis '{}'",
                    expression, axis
                )));
            }
            Some(guard)
        }
        None => None,
    };

    let env = scalar_map(&config.env).map_err(|m| invalid(format!("env {}", m)))?;
    for value in env.values() {
        check_template_axes(value, axes).map_err(&invalid)?;
    }

    let timeout_secs = minutes_to_secs(config.timeout_minutes).map_err(&invalid)?;

    let name = match &config.name {
        Some(name) => {
            check_template_axes(name, axes).map_err(&invalid)?;
            name.clone()
        }
        None => Step::default_name(&body),
    };

    Ok(Step {
        index,
        id: config.id.clone(),
        name,
        body,
        guard,
        phase,
        env,
        working_directory: config.working_directory.clone(),
        timeout_secs,
    })
}
