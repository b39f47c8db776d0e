//! Startup error taxonomy.
//!
//! Each module owns its own error enum. `GatewayError` is what startup
//! returns to the binary, which turns it into a log line and an exit code.

use std::path::PathBuf;

use crate::bus::BusError;
use crate::config::ConfigError;
use crate::registry::RegistryError;
use crate::weather::WeatherError;

/// Fatal errors raised while bringing the gateway up.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// No config file existed; a default one was written for the operator to fill in.
    #[error(
        "config file {} did not exist and was created with defaults; \
         set `api_key` and `place`, then restart",
        .path.display()
    )]
    ConfigMissing { path: PathBuf },

    #[error("invalid config: {0}")]
    ConfigInvalid(#[source] ConfigError),

    #[error("cannot generate device address: {0}")]
    IdentityGeneration(#[from] RegistryError),

    #[error("weather client init failed: {0}")]
    WeatherInit(#[source] WeatherError),

    #[error("bus engine init failed: {0}")]
    EngineInit(#[source] BusError),
}

impl GatewayError {
    /// Process exit code for this error kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            GatewayError::ConfigMissing { .. } => 2,
            GatewayError::ConfigInvalid(_) => 3,
            GatewayError::IdentityGeneration(_) => 4,
            GatewayError::WeatherInit(_) => 5,
            GatewayError::EngineInit(_) => 6,
        }
    }
}

impl From<ConfigError> for GatewayError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Missing { path } => GatewayError::ConfigMissing { path },
            other => GatewayError::ConfigInvalid(other),
        }
    }
}
