//! Utility functions and helpers

pub mod cmd;
pub mod env;
pub mod paths;

pub use cmd::{capture_stdout, log_cmd};
pub use env::env_var_as_bool;
pub use paths::user_profile_dir;
