//! Workflow configuration from YAML

use crate::core::{error::ConfigError, matrix::{Matrix, MatrixAxis}, pipeline::Workflow, step::Phase};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::path::Path;
use anyhow::{Context, Result};

/// Workflow written by `init`: provision, fetch, test, then check formatting
pub const DEFAULT_WORKFLOW: &str = r#"name: CI

on: [workflow_dispatch, push]

jobs:
  test:
    runs-on: ${{ matrix.os }}
    strategy:
      matrix:
        os: [ubuntu-latest]
    steps:
      - name: install-tools
        if: matrix.os == 'ubuntu-latest'
        run: |
          sudo apt-get update
          sudo apt-get install -y libcairo2-dev libpango1.0-dev
          rustup component add rustfmt
      - name: checkout
        uses: actions/checkout@v4
      - name: run-tests
        run: cargo test --verbose
      - name: run-format-check
        run: cargo fmt --all -- --check
"#;

/// Top-level workflow configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Workflow name
    #[serde(default)]
    pub name: Option<String>,

    /// Events that start a run
    #[serde(default, rename = "on")]
    pub on: Option<TriggerConfig>,

    /// Jobs in declaration order
    #[serde(with = "ordered_map")]
    pub jobs: Vec<(String, JobConfig)>,
}

/// `on:` accepts a single event, a list, or a mapping of event settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TriggerConfig {
    Single(String),
    List(Vec<String>),
    Detailed(Mapping),
}

impl TriggerConfig {
    /// Event names in declaration order
    pub fn events(&self) -> Vec<String> {
        match self {
            TriggerConfig::Single(event) => vec![event.clone()],
            TriggerConfig::List(events) => events.clone(),
            TriggerConfig::Detailed(map) => map
                .keys()
                .filter_map(|k| k.as_str().map(str::to_string))
                .collect(),
        }
    }
}

/// Job configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Human-readable job name
    #[serde(default)]
    pub name: Option<String>,

    /// Runner label, may reference `${{ matrix.<axis> }}`
    #[serde(default, rename = "runs-on")]
    pub runs_on: Option<Value>,

    #[serde(default)]
    pub strategy: Option<StrategyConfig>,

    /// Shorthand for `strategy.matrix`
    #[serde(default)]
    pub matrix: Option<Mapping>,

    #[serde(default)]
    pub env: BTreeMap<String, Value>,

    #[serde(default, rename = "timeout-minutes")]
    pub timeout_minutes: Option<u64>,

    pub steps: Vec<StepConfig>,
}

/// Matrix strategy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    #[serde(default)]
    pub matrix: Option<Mapping>,

    /// Maximum number of instances of this job running at once
    #[serde(default, rename = "max-parallel")]
    pub max_parallel: Option<usize>,
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Optional step identifier
    #[serde(default)]
    pub id: Option<String>,

    /// Display name
    #[serde(default)]
    pub name: Option<String>,

    /// Guard expression over matrix values
    #[serde(default, rename = "if")]
    pub condition: Option<Value>,

    /// Literal multi-line command body
    #[serde(default)]
    pub run: Option<String>,

    /// Built-in action reference (`owner/name@ref`)
    #[serde(default)]
    pub uses: Option<String>,

    /// Action inputs
    #[serde(default)]
    pub with: BTreeMap<String, Value>,

    #[serde(default)]
    pub env: BTreeMap<String, Value>,

    /// `bash` (default) or `sh`
    #[serde(default)]
    pub shell: Option<String>,

    #[serde(default, rename = "working-directory")]
    pub working_directory: Option<String>,

    #[serde(default, rename = "timeout-minutes")]
    pub timeout_minutes: Option<u64>,

    /// Explicit phase, overriding position-based inference
    #[serde(default)]
    pub phase: Option<Phase>,
}

impl JobConfig {
    /// The matrix mapping, from `strategy.matrix` or the `matrix` shorthand
    pub fn matrix_mapping(&self) -> Option<&Mapping> {
        self.strategy
            .as_ref()
            .and_then(|s| s.matrix.as_ref())
            .or(self.matrix.as_ref())
    }

    pub fn max_parallel(&self) -> Option<usize> {
        self.strategy.as_ref().and_then(|s| s.max_parallel)
    }

    /// Runner label template; lists are joined with commas
    pub fn runs_on_label(&self) -> String {
        match &self.runs_on {
            Some(Value::Sequence(labels)) => labels
                .iter()
                .filter_map(scalar_to_string)
                .collect::<Vec<_>>()
                .join(","),
            Some(value) => scalar_to_string(value).unwrap_or_default(),
            None => "local".to_string(),
        }
    }

    /// Parse the matrix mapping into axes and exclusions
    pub fn parse_matrix(&self, job_id: &str) -> Result<Matrix, ConfigError> {
        let Some(mapping) = self.matrix_mapping() else {
            return Ok(Matrix::default());
        };

        let invalid = |message: String| ConfigError::InvalidJob {
            job: job_id.to_string(),
            message,
        };

        let mut axes = Vec::new();
        let mut exclude = Vec::new();

        for (key, value) in mapping {
            let name = key
                .as_str()
                .ok_or_else(|| invalid("matrix axis names must be strings".to_string()))?;

            match name {
                "exclude" => {
                    let entries = value
                        .as_sequence()
                        .ok_or_else(|| invalid("matrix exclude must be a list".to_string()))?;
                    for entry in entries {
                        let entry = entry
                            .as_mapping()
                            .ok_or_else(|| invalid("matrix exclude entries must be mappings".to_string()))?;
                        let mut partial = Vec::new();
                        for (axis, value) in entry {
                            let axis = axis.as_str().ok_or_else(|| {
                                invalid("matrix exclude keys must be strings".to_string())
                            })?;
                            let value = scalar_to_string(value).ok_or_else(|| {
                                invalid(format!("matrix exclude value for '{}' must be a scalar", axis))
                            })?;
                            partial.push((axis.to_string(), value));
                        }
                        exclude.push(partial);
                    }
                }
                "include" => {
                    return Err(invalid("matrix include is not supported".to_string()));
                }
                _ => {
                    let values = value.as_sequence().ok_or_else(|| {
                        invalid(format!("matrix axis '{}' must be a list of values", name))
                    })?;
                    let values = values
                        .iter()
                        .map(|v| {
                            scalar_to_string(v).ok_or_else(|| {
                                invalid(format!("matrix axis '{}' values must be scalars", name))
                            })
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    axes.push(MatrixAxis::new(name, values));
                }
            }
        }

        Ok(Matrix::new(axes).with_exclude(exclude))
    }
}

impl StepConfig {
    /// Guard expression text; YAML booleans become `true`/`false`
    pub fn condition_text(&self) -> Option<String> {
        self.condition.as_ref().and_then(scalar_to_string)
    }
}

/// Render a YAML scalar as a string
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Render a mapping of YAML scalars; non-scalars are reported by key
pub fn scalar_map(map: &BTreeMap<String, Value>) -> Result<BTreeMap<String, String>, String> {
    map.iter()
        .map(|(k, v)| {
            scalar_to_string(v)
                .map(|s| (k.clone(), s))
                .ok_or_else(|| format!("value for '{}' must be a scalar", k))
        })
        .collect()
}

impl WorkflowConfig {
    /// Load workflow configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read workflow file {}", path.display()))?;
        Ok(Self::from_yaml(&content)?)
    }

    /// Parse and validate workflow configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: WorkflowConfig =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate by building the domain model
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.to_workflow().map(|_| ())
    }

    /// Convert config to a Workflow domain model
    pub fn to_workflow(&self) -> Result<Workflow, ConfigError> {
        Workflow::from_config(self)
    }

    /// Total number of steps across jobs
    pub fn step_count(&self) -> usize {
        self.jobs.iter().map(|(_, job)| job.steps.len()).sum()
    }
}

/// (De)serialize a YAML mapping as an ordered list of entries
mod ordered_map {
    use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
    use serde::ser::{Serialize, Serializer};
    use std::fmt;
    use std::marker::PhantomData;

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S, T>(entries: &Vec<(String, T)>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        serializer.collect_map(entries.iter().map(|(k, v)| (k, v)))
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Vec<(String, T)>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        struct EntriesVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for EntriesVisitor<T> {
            type Value = Vec<(String, T)>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::new();
                while let Some((key, value)) = map.next_entry::<String, T>()? {
                    entries.push((key, value));
                }
                Ok(entries)
            }
        }

        deserializer.deserialize_map(EntriesVisitor(PhantomData))
    }
}
