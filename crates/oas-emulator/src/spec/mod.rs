//! OpenAPI spec handling: loading, normalisation, operation lookup, and
//! spec-derived example bodies.
//!
//! Swagger 2.0 documents are converted into the OpenAPI-3 shape at load
//! time; the rest of the system only ever sees the normalised [`model`]
//! types with every `$ref` already dereferenced.

pub mod example;
pub mod loader;
pub mod model;
pub mod swagger2;
pub mod validator;

pub use loader::SpecProvider;
