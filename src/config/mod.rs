//! Configuration: the YAML model, semantic validation, platform
//! compatibility checks and the lock file engine.

pub mod compatibility;
pub mod lockfile;
pub mod model;
pub mod validation;
