//! Command-line interface module.

mod apps;
mod args;
mod check;

pub use apps::list_apps;
pub use args::{Cli, Commands};
pub use check::check_config;
