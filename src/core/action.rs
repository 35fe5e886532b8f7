//! Built-in `uses:` actions

use crate::core::error::ConfigError;
use std::collections::BTreeMap;

/// A resolved `uses:` reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Version-control checkout into the instance working directory
    Checkout {
        reference: Option<String>,
        fetch_depth: Option<u32>,
        path: Option<String>,
    },
    /// Rust toolchain and component registration through rustup
    RustToolchain {
        toolchain: String,
        components: Vec<String>,
        targets: Vec<String>,
    },
}

impl Action {
    /// Resolve `owner/name@ref` with its `with:` inputs
    pub fn resolve(uses: &str, with: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let (name, version) = match uses.split_once('@') {
            Some((name, version)) => (name, Some(version)),
            None => (uses, None),
        };

        match name {
            "actions/checkout" => {
                let fetch_depth = match with.get("fetch-depth") {
                    Some(depth) => Some(depth.parse::<u32>().map_err(|_| {
                        ConfigError::InvalidActionInput {
                            action: uses.to_string(),
                            message: format!("fetch-depth must be a number, got '{}'", depth),
                        }
                    })?),
                    None => None,
                };
                Ok(Action::Checkout {
                    reference: with.get("ref").cloned(),
                    fetch_depth,
                    path: with.get("path").cloned(),
                })
            }
            "dtolnay/rust-toolchain" => {
                // The ref names the toolchain unless it is a branch of the action itself
                let toolchain = with.get("toolchain").cloned().or_else(|| {
                    version
                        .filter(|v| !matches!(*v, "master" | "main" | "v1"))
                        .map(str::to_string)
                });
                Ok(Action::RustToolchain {
                    toolchain: toolchain.unwrap_or_else(|| "stable".to_string()),
                    components: split_list(with.get("components")),
                    targets: split_list(with.get("targets").or_else(|| with.get("target"))),
                })
            }
            "actions-rs/toolchain" => Ok(Action::RustToolchain {
                toolchain: with
                    .get("toolchain")
                    .cloned()
                    .unwrap_or_else(|| "stable".to_string()),
                components: split_list(with.get("components")),
                targets: split_list(with.get("target")),
            }),
            _ => Err(ConfigError::UnsupportedAction(uses.to_string())),
        }
    }

    /// Shell script implementing the action, if it is command-backed
    pub fn script(&self) -> Option<String> {
        match self {
            Action::Checkout { .. } => None,
            Action::RustToolchain {
                toolchain,
                components,
                targets,
            } => {
                let mut install = format!("rustup toolchain install {} --profile minimal", toolchain);
                if !components.is_empty() {
                    install.push_str(&format!(" --component {}", components.join(",")));
                }
                if !targets.is_empty() {
                    install.push_str(&format!(" --target {}", targets.join(",")));
                }
                Some(format!("{}\nrustup default {}", install, toolchain))
            }
        }
    }
}

fn split_list(value: Option<&String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
