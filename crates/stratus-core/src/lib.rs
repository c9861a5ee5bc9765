//! Core specification model for Stratus.
//!
//! A specification is an ordered collection of resource descriptors plus an
//! optional topology policy. Property values may be literals, symbolic
//! references (`ref(...)`, `fact(...)`, `secret(...)`), or late-bound Tera
//! templates. This crate defines the model, the reference syntax, and the
//! JSON/YAML loader; it never interprets resource `type` tags.

pub mod error;
pub mod loader;
pub mod model;
pub mod reference;

pub use error::{CoreError, Result};
pub use loader::{load_spec, spec_from_json, spec_from_yaml};
pub use model::{ResourceSpec, Specification, TopologyPolicy, Visibility};
pub use reference::Reference;
