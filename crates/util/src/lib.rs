//! Shared helpers for the `ttml` binary: configuration loading and path handling.

pub mod config;
pub mod path_processing;

pub use config::{CONFIG_PATH_ENV, ConfigError, TtmlConfig, default_config_path};
pub use path_processing::expand_tilde;
