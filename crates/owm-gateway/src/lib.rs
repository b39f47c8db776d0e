//! OpenWeatherMap gateway.
//!
//! Polls current weather for one place and republishes it as a set of
//! virtual sensors (thermometer, hygrometer, barometer, wind gauge) plus a
//! gateway device on a Zenoh bus.
//!
//! Device addresses are allocated once and persisted in the config file,
//! so the devices keep their identity across restarts.

pub mod bus;
pub mod cli;
pub mod config;
pub mod device;
pub mod error;
pub mod gateway;
pub mod registry;
pub mod scheduler;
pub mod sync;
pub mod weather;

pub use bus::{AliveHeartbeat, BusError, BusLocation, DeviceBus, ZenohBus};
pub use config::{ConfigError, ConfigStore, Settings, StoredConfig, DEFAULT_CONFIG_FILE};
pub use device::{AttributeValue, Device, DeviceError, DeviceInfo, DeviceRole, DeviceSet};
pub use error::GatewayError;
pub use gateway::{Gateway, StartupOptions};
pub use registry::{Address, AddressRegistry, RegistryError};
pub use scheduler::{run_scheduler, Repeat, Schedule, SchedulerStats};
pub use sync::{wind_speed_kmh, CycleReport, CycleValues, SyncContext};
pub use weather::{OpenWeatherMapClient, UnitSystem, WeatherError, WeatherProvider, WeatherSnapshot};

/// Crate version; `cli::version_string` adds the build stamp.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
