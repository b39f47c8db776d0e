//! Command-line interface.

use argh::FromArgs;
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_FILE;
use crate::gateway::StartupOptions;

#[derive(Debug, FromArgs)]
/// OpenWeatherMap gateway for Zenoh
pub struct Args {
    /// display the version and exit
    #[argh(switch, short = 'v')]
    pub version: bool,

    /// path to the configuration file
    #[argh(option, short = 'c', default = "PathBuf::from(DEFAULT_CONFIG_FILE)")]
    pub config: PathBuf,

    /// zenoh router endpoint to connect to
    #[argh(option, short = 'e')]
    pub endpoint: Option<String>,
}

impl Args {
    pub fn startup_options(&self) -> StartupOptions {
        StartupOptions {
            config_path: self.config.clone(),
            endpoint: self.endpoint.clone(),
        }
    }
}

/// `{version} - {build timestamp} (commit {hash})`
pub fn version_string() -> String {
    format!(
        "{} - {} (commit {})",
        crate::VERSION,
        env!("OWM_GATEWAY_BUILD_TIMESTAMP"),
        env!("OWM_GATEWAY_GIT_COMMIT")
    )
}
