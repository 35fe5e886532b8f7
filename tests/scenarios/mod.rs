//! Scenario tests for matrix-ci
//!
//! Each module exercises one behavior of a full run against mock runners.

mod default_workflow;
mod fail_fast;
mod guards;
mod matrix_expansion;
mod scheduling;
