//! Core infrastructure shared by the agent.
//!
//! - **Configuration** (`config`): loading, dotted-path lookup, atomic reload
//! - **Environment interpolation** (`env`): `${VAR}` substitution in config values
//! - **I/O** (`io`): document reading and validation

pub mod config;
pub mod env;
pub mod io;

pub use config::{ConfigFormat, ConfigManager};
