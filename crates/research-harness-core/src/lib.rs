//! # Research Harness Core
//!
//! Shared, I/O-free logic for Research Harness: data models, the store
//! abstraction with an in-memory backend, and the digest and summary
//! renderers that read a subject's collected corpus back out.
//!
//! This crate contains no tokio, sqlx, HTTP clients, or other runtime
//! dependencies.

pub mod digest;
pub mod models;
pub mod store;
pub mod summary;
