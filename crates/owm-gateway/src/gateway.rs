//! Startup and steady-state wiring.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::bus::{self, AliveHeartbeat, BusLocation, DeviceBus, ZenohBus};
use crate::config::{ConfigStore, Settings};
use crate::device::{DeviceInfo, DeviceSet};
use crate::error::GatewayError;
use crate::registry::AddressRegistry;
use crate::scheduler::{run_scheduler, Schedule, SchedulerStats};
use crate::sync::SyncContext;
use crate::weather::OpenWeatherMapClient;

const ALIVE_INTERVAL: Duration = Duration::from_secs(60);

/// Startup inputs taken from the command line.
#[derive(Debug, Clone)]
pub struct StartupOptions {
    pub config_path: PathBuf,
    pub endpoint: Option<String>,
}

/// Resolve every device address and persist the map if any were new.
pub fn prepare_devices(store: &mut ConfigStore, info: &DeviceInfo) -> Result<DeviceSet, GatewayError> {
    let mut registry = AddressRegistry::new(store.devices_mut());
    let devices = DeviceSet::build(&mut registry, info)?;
    let allocated = registry.allocated();
    drop(registry);

    if allocated > 0 {
        store.save()?;
        log::info!(
            "Saved {} new device address(es) to {}",
            allocated,
            store.path().display()
        );
    }
    Ok(devices)
}

/// Register every device with the bus, sensors first, then the gateway.
pub async fn register_devices<B: DeviceBus>(bus: &B, devices: &DeviceSet) -> Result<(), GatewayError> {
    for device in devices.iter() {
        bus.register_device(device)
            .await
            .map_err(GatewayError::EngineInit)?;
    }
    Ok(())
}

/// A started gateway, ready to poll.
pub struct Gateway {
    ctx: SyncContext<OpenWeatherMapClient, Arc<ZenohBus>>,
    bus: Arc<ZenohBus>,
    heartbeat: AliveHeartbeat,
    session: Arc<zenoh::Session>,
    settings: Settings,
}

/// Wait for the heartbeat task, reporting whether it ended cleanly.
pub async fn join_heartbeat(handle: JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Alive heartbeat task ended abnormally: {}", e);
            false
        }
    }
}

async fn close_session(session: &zenoh::Session) {
    if let Err(e) = session.close().await {
        log::warn!("Zenoh close failed: {}", e);
    }
}

impl Gateway {
    /// Load config, build devices, connect to the bus and register devices.
    pub async fn init(options: &StartupOptions) -> Result<Self, GatewayError> {
        let mut store = ConfigStore::open(&options.config_path)?;
        let settings = store.config().validate()?;
        log::info!(
            "Config loaded from {}: place='{}' unit={} lang={} rate={}s",
            store.path().display(),
            settings.place,
            settings.unit,
            settings.lang,
            settings.poll_interval.as_secs()
        );

        let client = OpenWeatherMapClient::new(&settings.unit, &settings.lang, &settings.api_key)
            .map_err(GatewayError::WeatherInit)?;

        let devices = prepare_devices(&mut store, &DeviceInfo::default())?;

        let endpoint =
            bus::resolve_endpoint(options.endpoint.as_deref(), settings.zenoh_endpoint.as_deref());
        let session = bus::open_session(&endpoint)
            .await
            .map_err(GatewayError::EngineInit)?;
        let location = BusLocation::from_env();
        log::info!("Scope: {}, Machine ID: {}", location.scope, location.machine_id);

        let bus = Arc::new(ZenohBus::new(session.clone(), location));
        let setup = async {
            register_devices(&bus, &devices).await?;
            bus.declare_alive(devices.gateway().address(), ALIVE_INTERVAL)
                .await
                .map_err(GatewayError::EngineInit)
        };
        let heartbeat = match setup.await {
            Ok(heartbeat) => heartbeat,
            Err(e) => {
                close_session(&session).await;
                return Err(e);
            }
        };

        let ctx = SyncContext::new(devices, client, bus.clone(), settings.place.clone());
        Ok(Self {
            ctx,
            bus,
            heartbeat,
            session,
            settings,
        })
    }

    /// Poll until shutdown, then close the bus session.
    pub async fn run(mut self, shutdown_rx: watch::Receiver<()>) -> SchedulerStats {
        let heartbeat = self.heartbeat.spawn(shutdown_rx.clone());

        let schedule = Schedule::every(self.settings.poll_interval);
        let stats = run_scheduler(&mut self.ctx, schedule, shutdown_rx).await;

        join_heartbeat(heartbeat).await;
        drop(self.ctx);
        drop(self.bus);
        close_session(&self.session).await;

        log::info!(
            "Gateway stopped after {} cycles ({} failed)",
            stats.cycles,
            stats.failed_cycles
        );
        stats
    }
}
