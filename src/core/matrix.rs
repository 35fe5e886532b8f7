//! Matrix expansion - turns declared axes into concrete job instances

use crate::core::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A named axis and its ordered values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixAxis {
    pub name: String,
    pub values: Vec<String>,
}

impl MatrixAxis {
    pub fn new(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// Matrix specification of a job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matrix {
    /// Axes in declaration order
    pub axes: Vec<MatrixAxis>,

    /// Partial combinations removed after expansion
    #[serde(default)]
    pub exclude: Vec<Vec<(String, String)>>,
}

/// One concrete combination of matrix values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInstance {
    /// Owning job id
    pub job: String,

    /// 1-based position in the expansion
    pub ordinal: usize,

    /// Axis values in axis declaration order
    pub values: Vec<(String, String)>,
}

impl JobInstance {
    /// Value of an axis for this instance
    pub fn get(&self, axis: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(name, _)| name == axis)
            .map(|(_, value)| value.as_str())
    }

    /// `os=ubuntu-latest, toolchain=stable`
    pub fn combination(&self) -> String {
        self.values
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Human-readable label such as `test (os=ubuntu-latest)`
    pub fn label(&self) -> String {
        if self.values.is_empty() {
            self.job.clone()
        } else {
            format!("{} ({})", self.job, self.combination())
        }
    }

    fn matches(&self, partial: &[(String, String)]) -> bool {
        partial
            .iter()
            .all(|(axis, value)| self.get(axis) == Some(value.as_str()))
    }
}

impl fmt::Display for JobInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl Matrix {
    pub fn new(axes: Vec<MatrixAxis>) -> Self {
        Self {
            axes,
            exclude: Vec::new(),
        }
    }

    pub fn with_exclude(mut self, exclude: Vec<Vec<(String, String)>>) -> Self {
        self.exclude = exclude;
        self
    }

    pub fn axis(&self, name: &str) -> Option<&MatrixAxis> {
        self.axes.iter().find(|a| a.name == name)
    }

    /// Number of combinations before exclusions
    pub fn cardinality(&self) -> usize {
        self.axes.iter().map(|a| a.values.len()).product()
    }

    /// Expand into the ordered cross-product of instances.
    ///
    /// Axes are iterated in declaration order with the last axis varying
    /// fastest. No axes yields one instance with no values.
    pub fn expand(&self, job: &str) -> Result<Vec<JobInstance>, ConfigError> {
        let mut combinations: Vec<Vec<(String, String)>> = vec![Vec::new()];

        for axis in &self.axes {
            if axis.values.is_empty() {
                return Err(ConfigError::EmptyAxis {
                    axis: axis.name.clone(),
                });
            }

            combinations = combinations
                .into_iter()
                .flat_map(|prefix| {
                    axis.values.iter().map(move |value| {
                        let mut combo = prefix.clone();
                        combo.push((axis.name.clone(), value.clone()));
                        combo
                    })
                })
                .collect();
        }

        for entry in &self.exclude {
            if let Some((axis, _)) = entry.iter().find(|(axis, _)| self.axis(axis).is_none()) {
                return Err(ConfigError::UnknownExcludeAxis { axis: axis.clone() });
            }
        }

        let instances: Vec<JobInstance> = combinations
            .into_iter()
            .map(|values| JobInstance {
                job: job.to_string(),
                ordinal: 0,
                values,
            })
            .filter(|instance| !self.exclude.iter().any(|entry| instance.matches(entry)))
            .enumerate()
            .map(|(i, mut instance)| {
                instance.ordinal = i + 1;
                instance
            })
            .collect();

        if instances.is_empty() {
            return Err(ConfigError::AllCombinationsExcluded);
        }

        Ok(instances)
    }
}
