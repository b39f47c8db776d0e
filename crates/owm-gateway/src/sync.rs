//! One fetch-map-notify pass over the sensor devices.

use crate::bus::DeviceBus;
use crate::device::{
    DeviceError, DeviceRole, DeviceSet, ATTR_HUMIDITY, ATTR_PRESSURE, ATTR_TEMPERATURE,
    ATTR_WIND_ANGLE, ATTR_WIND_STRENGTH,
};
use crate::weather::{WeatherError, WeatherProvider, WeatherSnapshot};

/// m/s to km/h.
///
/// Applied whatever the configured unit system, so imperial speeds are
/// scaled as if they were m/s.
pub fn wind_speed_kmh(speed: f64) -> f64 {
    speed * 3600.0 / 1000.0
}

/// Attribute values derived from one snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleValues {
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub wind_strength: f64,
    pub wind_angle: f64,
}

impl CycleValues {
    pub fn from_snapshot(snapshot: &WeatherSnapshot) -> Self {
        Self {
            temperature: snapshot.temperature,
            humidity: snapshot.humidity,
            pressure: snapshot.pressure,
            wind_strength: wind_speed_kmh(snapshot.wind_speed),
            wind_angle: snapshot.wind_deg,
        }
    }

    /// Attribute writes for a sensor role.
    fn writes(&self, role: DeviceRole) -> Vec<(&'static str, f64)> {
        match role {
            DeviceRole::Thermometer => vec![(ATTR_TEMPERATURE, self.temperature)],
            DeviceRole::Hygrometer => vec![(ATTR_HUMIDITY, self.humidity)],
            DeviceRole::Barometer => vec![(ATTR_PRESSURE, self.pressure)],
            DeviceRole::WindGauge => vec![
                (ATTR_WIND_STRENGTH, self.wind_strength),
                (ATTR_WIND_ANGLE, self.wind_angle),
            ],
            DeviceRole::Gateway => Vec::new(),
        }
    }
}

/// Outcome of a completed cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub values: CycleValues,
    /// Devices whose notification went out
    pub notified: Vec<DeviceRole>,
    /// Devices whose notification failed
    pub failed: Vec<DeviceRole>,
}

/// Everything a cycle touches, owned by the scheduler loop.
pub struct SyncContext<P, B> {
    devices: DeviceSet,
    provider: P,
    bus: B,
    place: String,
}

impl<P: WeatherProvider, B: DeviceBus> SyncContext<P, B> {
    pub fn new(devices: DeviceSet, provider: P, bus: B, place: impl Into<String>) -> Self {
        Self {
            devices,
            provider,
            bus,
            place: place.into(),
        }
    }

    pub fn devices(&self) -> &DeviceSet {
        &self.devices
    }

    pub fn place(&self) -> &str {
        &self.place
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Fetch current weather and publish it on the sensor devices.
    ///
    /// A fetch failure is returned before any device is touched. A failed
    /// notification is logged and the remaining devices are still notified.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, WeatherError> {
        let snapshot = self.provider.current_by_name(&self.place).await?;
        let values = CycleValues::from_snapshot(&snapshot);

        let mut report = CycleReport {
            values,
            notified: Vec::with_capacity(DeviceRole::SENSORS.len()),
            failed: Vec::new(),
        };

        for role in DeviceRole::SENSORS {
            if let Err(e) = self.apply(role, &values) {
                log::warn!("Skipping {:?} update: {}", role, e);
                report.failed.push(role);
                continue;
            }
            let device = self.devices.get(role);
            match self.bus.notify_attributes_change(device).await {
                Ok(()) => report.notified.push(role),
                Err(e) => {
                    log::warn!("Notification failed for {:?} {}: {}", role, device.address(), e);
                    report.failed.push(role);
                }
            }
        }

        log::trace!(
            "Received OWM update: temperature={} humidity={} pressure={} windStrength={} windAngle={}",
            values.temperature,
            values.humidity,
            values.pressure,
            values.wind_strength,
            values.wind_angle
        );

        Ok(report)
    }

    fn apply(&mut self, role: DeviceRole, values: &CycleValues) -> Result<(), DeviceError> {
        let Some(device) = self.devices.sensor_mut(role) else {
            return Ok(());
        };
        for (name, value) in values.writes(role) {
            device.set_attribute(name, value)?;
        }
        Ok(())
    }
}
