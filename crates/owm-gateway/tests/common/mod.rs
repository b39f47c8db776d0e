//! In-memory provider and bus for driving the sync loop without a network.

#![allow(dead_code)]

use async_trait::async_trait;
use owm_gateway::{
    AddressRegistry, AttributeValue, BusError, Device, DeviceBus, DeviceInfo, DeviceRole,
    DeviceSet, WeatherError, WeatherProvider, WeatherSnapshot,
};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Mutex;

/// Provider returning scripted results, repeating the last one when drained.
pub struct ScriptedProvider {
    results: Mutex<VecDeque<Result<WeatherSnapshot, WeatherError>>>,
    last: Mutex<Option<WeatherSnapshot>>,
    pub places: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(results: Vec<Result<WeatherSnapshot, WeatherError>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            last: Mutex::new(None),
            places: Mutex::new(Vec::new()),
        }
    }

    pub fn always(snapshot: WeatherSnapshot) -> Self {
        let provider = Self::new(Vec::new());
        *provider.last.lock().unwrap() = Some(snapshot);
        provider
    }

    pub fn calls(&self) -> usize {
        self.places.lock().unwrap().len()
    }
}

#[async_trait]
impl WeatherProvider for ScriptedProvider {
    async fn current_by_name(&self, place: &str) -> Result<WeatherSnapshot, WeatherError> {
        self.places.lock().unwrap().push(place.to_string());
        let next = self.results.lock().unwrap().pop_front();
        match next {
            Some(Ok(snapshot)) => {
                *self.last.lock().unwrap() = Some(snapshot);
                Ok(snapshot)
            }
            Some(Err(e)) => Err(e),
            None => self
                .last
                .lock()
                .unwrap()
                .ok_or_else(|| api_error("no scripted result")),
        }
    }
}

pub fn api_error(message: &str) -> WeatherError {
    WeatherError::Api {
        status: 404,
        message: message.to_string(),
    }
}

/// One notification as seen by the bus.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub role: DeviceRole,
    pub address: String,
    pub attributes: BTreeMap<&'static str, AttributeValue>,
}

/// Bus that records registrations and notifications.
#[derive(Default)]
pub struct RecordingBus {
    pub registered: Mutex<Vec<DeviceRole>>,
    pub notifications: Mutex<Vec<Notification>>,
    fail_notify: Mutex<HashSet<DeviceRole>>,
    fail_register: Mutex<bool>,
}

impl RecordingBus {
    pub fn failing_notify_for(role: DeviceRole) -> Self {
        let bus = Self::default();
        bus.fail_notify.lock().unwrap().insert(role);
        bus
    }

    pub fn failing_register() -> Self {
        let bus = Self::default();
        *bus.fail_register.lock().unwrap() = true;
        bus
    }

    pub fn notified_roles(&self) -> Vec<DeviceRole> {
        self.notifications
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.role)
            .collect()
    }
}

#[async_trait]
impl DeviceBus for RecordingBus {
    async fn register_device(&self, device: &Device) -> Result<(), BusError> {
        if *self.fail_register.lock().unwrap() {
            return Err(BusError::Zenoh("router unreachable".into()));
        }
        self.registered.lock().unwrap().push(device.role());
        Ok(())
    }

    async fn notify_attributes_change(&self, device: &Device) -> Result<(), BusError> {
        if self.fail_notify.lock().unwrap().contains(&device.role()) {
            return Err(BusError::NotRegistered(device.address().clone()));
        }
        self.notifications.lock().unwrap().push(Notification {
            role: device.role(),
            address: device.address().to_string(),
            attributes: device.attributes().clone(),
        });
        Ok(())
    }
}

pub fn build_devices() -> DeviceSet {
    let mut addresses = BTreeMap::new();
    let mut registry = AddressRegistry::new(&mut addresses);
    DeviceSet::build(&mut registry, &DeviceInfo::default()).unwrap()
}

pub fn snapshot(
    temperature: f64,
    humidity: f64,
    pressure: f64,
    wind_speed: f64,
    wind_deg: f64,
) -> WeatherSnapshot {
    WeatherSnapshot {
        temperature,
        humidity,
        pressure,
        wind_speed,
        wind_deg,
    }
}
