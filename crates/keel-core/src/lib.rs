//! Core data types for the keel restore engine.
//!
//! This crate defines the fundamental types of a resolution: library
//! identities and ranges, version constraints, target frameworks, project
//! manifests, and the durable lock snapshot.
//!
//! This crate is intentionally free of async code and network I/O.

pub mod framework;
pub mod library;
pub mod project;
pub mod snapshot;
pub mod version;
