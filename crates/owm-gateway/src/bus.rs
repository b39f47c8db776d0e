//! Device bus: registration and attribute-change notifications.
//!
//! Devices live under `xaal/{scope}/{machine_id}/devices/{address}`:
//! - `.../description` queryable serving the device description (JSON)
//! - `.../attributes` attribute updates (JSON)
//! - `.../alive` periodic liveness announcement of the gateway

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use zenoh::pubsub::Publisher;
use zenoh::query::Queryable;
use zenoh::Wait;

use crate::device::{AttributeValue, Device};
use crate::registry::Address;

const DEFAULT_ENDPOINT: &str = "tcp/127.0.0.1:7447";

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Zenoh error: {0}")]
    Zenoh(String),

    #[error("device {0} is not registered")]
    NotRegistered(Address),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// What the sync loop needs from the bus engine.
#[async_trait]
pub trait DeviceBus: Send + Sync {
    /// Announce a device. Called once per device before polling starts.
    async fn register_device(&self, device: &Device) -> Result<(), BusError>;

    /// Publish the device's current attribute values.
    async fn notify_attributes_change(&self, device: &Device) -> Result<(), BusError>;
}

#[async_trait]
impl<T: DeviceBus + ?Sized> DeviceBus for Arc<T> {
    async fn register_device(&self, device: &Device) -> Result<(), BusError> {
        (**self).register_device(device).await
    }

    async fn notify_attributes_change(&self, device: &Device) -> Result<(), BusError> {
        (**self).notify_attributes_change(device).await
    }
}

#[derive(Debug, Serialize)]
struct AttributesMessage<'a> {
    address: &'a Address,
    dev_type: &'static str,
    attributes: &'a std::collections::BTreeMap<&'static str, AttributeValue>,
}

#[derive(Debug, Serialize)]
struct AliveMessage<'a> {
    address: &'a Address,
    /// Seconds until the next announcement is due
    timeout: u64,
}

/// Where the bus lives.
#[derive(Debug, Clone, PartialEq)]
pub struct BusLocation {
    pub scope: String,
    pub machine_id: String,
}

impl BusLocation {
    /// Resolve scope and machine id from `OWM_GATEWAY_SCOPE` /
    /// `OWM_GATEWAY_MACHINE_ID`, defaulting to `local` and the hostname.
    pub fn from_env() -> Self {
        let scope = std::env::var("OWM_GATEWAY_SCOPE").unwrap_or_else(|_| "local".to_string());
        let machine_id = std::env::var("OWM_GATEWAY_MACHINE_ID")
            .unwrap_or_else(|_| {
                hostname::get()
                    .map(|h| h.to_string_lossy().to_string())
                    .unwrap_or_else(|_| "unknown".to_string())
            })
            .replace('-', "_");
        Self { scope, machine_id }
    }

    /// `xaal/{scope}/{machine_id}/devices/{address}/{suffix}`
    pub fn device_key(&self, address: &Address, suffix: &str) -> String {
        format!(
            "xaal/{}/{}/devices/{}/{}",
            self.scope, self.machine_id, address, suffix
        )
    }
}

/// Pick the Zenoh endpoint: `ZENOH_ENDPOINT` env, then CLI flag, then
/// config file, then the local router.
pub fn resolve_endpoint(cli: Option<&str>, config: Option<&str>) -> String {
    std::env::var("ZENOH_ENDPOINT")
        .ok()
        .or_else(|| cli.map(str::to_string))
        .or_else(|| config.map(str::to_string))
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
}

/// Open a Zenoh session in client mode with scouting disabled.
pub async fn open_session(endpoint: &str) -> Result<Arc<zenoh::Session>, BusError> {
    log::info!("Opening bus session towards {}", endpoint);

    let settings = [
        ("mode", r#""client""#.to_string()),
        ("connect/endpoints", format!(r#"["{}"]"#, endpoint)),
        ("scouting/multicast/enabled", "false".to_string()),
        ("scouting/gossip/enabled", "false".to_string()),
    ];
    let mut config = zenoh::Config::default();
    for (key, value) in &settings {
        config
            .insert_json5(key, value)
            .map_err(|e| BusError::Zenoh(format!("bad bus setting {}={}: {}", key, value, e)))?;
    }

    let session = zenoh::open(config)
        .await
        .map_err(|e| BusError::Zenoh(format!("bus unreachable at {}: {}", endpoint, e)))?;

    log::info!("Bus session open");
    Ok(Arc::new(session))
}

/// Zenoh-backed device bus.
pub struct ZenohBus {
    session: Arc<zenoh::Session>,
    location: BusLocation,
    publishers: Mutex<HashMap<Address, Publisher<'static>>>,
    queryables: Mutex<Vec<Queryable<()>>>,
}

impl ZenohBus {
    pub fn new(session: Arc<zenoh::Session>, location: BusLocation) -> Self {
        Self {
            session,
            location,
            publishers: Mutex::new(HashMap::new()),
            queryables: Mutex::new(Vec::new()),
        }
    }

    pub fn location(&self) -> &BusLocation {
        &self.location
    }

    /// Declare the gateway's alive publisher.
    ///
    /// Nothing is sent until the returned heartbeat is spawned.
    pub async fn declare_alive(
        &self,
        gateway: &Address,
        interval: Duration,
    ) -> Result<AliveHeartbeat, BusError> {
        let key = self.location.device_key(gateway, "alive");
        let payload = serde_json::to_vec(&AliveMessage {
            address: gateway,
            timeout: interval.as_secs() * 2,
        })?;
        let publisher = self
            .session
            .declare_publisher(key.clone())
            .await
            .map_err(|e| {
                BusError::Zenoh(format!("cannot declare alive publisher on {}: {}", key, e))
            })?;

        Ok(AliveHeartbeat {
            key,
            publisher,
            payload,
            interval,
        })
    }
}

/// Periodic liveness announcement for the gateway device.
pub struct AliveHeartbeat {
    key: String,
    publisher: Publisher<'static>,
    payload: Vec<u8>,
    interval: Duration,
}

impl AliveHeartbeat {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Announce once per interval until shutdown fires.
    pub fn spawn(self, mut shutdown_rx: watch::Receiver<()>) -> tokio::task::JoinHandle<()> {
        log::info!("Alive heartbeat: {}", self.key);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => {
                        log::debug!("Alive heartbeat stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = self.publisher.put(self.payload.clone()).await {
                            log::warn!("Alive heartbeat failed: {}", e);
                        }
                    }
                }
            }
        })
    }
}

#[async_trait]
impl DeviceBus for ZenohBus {
    async fn register_device(&self, device: &Device) -> Result<(), BusError> {
        let address = device.address();
        let description = serde_json::to_vec(&device.description())?;

        let description_key = self.location.device_key(address, "description");
        let queryable = self
            .session
            .declare_queryable(description_key.clone())
            .callback(move |query| {
                log::debug!("Description query on {}", query.key_expr());
                if let Err(e) = query
                    .reply(query.key_expr().clone(), description.clone())
                    .wait()
                {
                    log::warn!("Failed to answer description query: {}", e);
                }
            })
            .await
            .map_err(|e| {
                BusError::Zenoh(format!(
                    "cannot declare description queryable on {}: {}",
                    description_key, e
                ))
            })?;

        let attributes_key = self.location.device_key(address, "attributes");
        let publisher = self
            .session
            .declare_publisher(attributes_key.clone())
            .await
            .map_err(|e| {
                BusError::Zenoh(format!(
                    "cannot declare attributes publisher on {}: {}",
                    attributes_key, e
                ))
            })?;

        self.queryables.lock().await.push(queryable);
        self.publishers.lock().await.insert(address.clone(), publisher);

        log::info!(
            "Registered {} {} ({})",
            device.identity().dev_type,
            address,
            attributes_key
        );
        Ok(())
    }

    async fn notify_attributes_change(&self, device: &Device) -> Result<(), BusError> {
        let payload = serde_json::to_vec(&AttributesMessage {
            address: device.address(),
            dev_type: device.identity().dev_type,
            attributes: device.attributes(),
        })?;

        let publishers = self.publishers.lock().await;
        let publisher = publishers
            .get(device.address())
            .ok_or_else(|| BusError::NotRegistered(device.address().clone()))?;
        publisher
            .put(payload)
            .await
            .map_err(|e| BusError::Zenoh(e.to_string()))
    }
}
