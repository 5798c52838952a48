//! Command handlers: bridge CLI args -> engine -> output formatting.

pub mod config_cmd;
pub mod parse;
pub mod replay;
pub mod run;

use vigil_config::Config;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Load and validate the config selected by `--config`.
pub(crate) fn load_config(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(vigil_config::load_config(global.config.as_deref())?)
}
