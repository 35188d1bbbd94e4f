//! AWS-oriented adapters and handlers for the photo optimization pipeline.
//!
//! This crate owns runtime integration details (the Lambda entry point and
//! the object-store adapter) around the pure re-encode pipeline exposed by
//! `photo_optimizer_core`.

pub mod adapters;
pub mod handlers;
