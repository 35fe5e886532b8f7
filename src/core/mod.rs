//! Core domain models for matrix-ci
//!
//! This module defines the fundamental data structures that represent
//! workflows, matrices, steps, and the results of running them.

pub mod action;
pub mod condition;
pub mod config;
pub mod context;
pub mod error;
pub mod matrix;
pub mod pipeline;
pub mod state;
pub mod step;

pub use context::*;
pub use error::*;
pub use matrix::*;
pub use pipeline::*;
pub use state::*;
pub use step::*;
