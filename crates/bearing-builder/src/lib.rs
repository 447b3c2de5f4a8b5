//! Parametric ball bearing: configuration, staged construction against a
//! geometry kernel, and export of the finished parts.

pub mod builder;
pub mod config;
pub mod errors;
pub mod part;

pub use builder::{BearingBuilder, DEFAULT_TOLERANCE};
pub use config::BearingConfig;
pub use errors::{BuildError, ConfigError};
pub use part::{BuildStage, Part};
