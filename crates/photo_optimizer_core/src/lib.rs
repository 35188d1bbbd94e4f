//! Shared photo optimization domain primitives.
//!
//! This crate owns the deterministic re-encode pipeline and the
//! trigger/outcome contracts. It intentionally excludes AWS SDK and Lambda
//! runtime concerns; those live in `crates/photo_optimizer_lambda`.

pub mod contract;
pub mod encode;
