//! OpenAPI/Swagger-driven HTTP emulator.
//!
//! Serves canned JSON responses for every operation a spec declares,
//! layering per-endpoint stateful scenarios over on-disk sample files over
//! examples synthesised from the spec itself.

pub mod config;
pub mod error;
pub mod router;
pub mod samples;
pub mod scenario;
pub mod server;
pub mod spec;

pub use error::EmulatorError;
pub use server::EmulatorServer;
