//! CLI command implementations

pub mod run;
pub mod transform;
pub mod validate;
