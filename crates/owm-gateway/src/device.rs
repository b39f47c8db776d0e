//! Virtual devices exposed on the bus.
//!
//! One device per sensor role plus a gateway device listing the others.
//! Attribute names are fixed per role; unsupported ones are declared as
//! such instead of carrying a placeholder value.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::registry::{Address, AddressRegistry, RegistryError};

pub const ATTR_TEMPERATURE: &str = "temperature";
pub const ATTR_HUMIDITY: &str = "humidity";
pub const ATTR_PRESSURE: &str = "pressure";
pub const ATTR_WIND_STRENGTH: &str = "windStrength";
pub const ATTR_WIND_ANGLE: &str = "windAngle";
pub const ATTR_GUST_STRENGTH: &str = "gustStrength";
pub const ATTR_GUST_ANGLE: &str = "gustAngle";
pub const ATTR_EMBEDDED: &str = "embedded";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DeviceError {
    #[error("{dev_type} has no attribute `{name}`")]
    UnknownAttribute { dev_type: &'static str, name: String },

    #[error("{dev_type} does not support attribute `{name}`")]
    Unsupported { dev_type: &'static str, name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceRole {
    Thermometer,
    Hygrometer,
    Barometer,
    WindGauge,
    Gateway,
}

impl DeviceRole {
    /// Sensor roles in publication order.
    pub const SENSORS: [DeviceRole; 4] = [
        DeviceRole::Thermometer,
        DeviceRole::Hygrometer,
        DeviceRole::Barometer,
        DeviceRole::WindGauge,
    ];

    /// Key of this role in the persisted address map.
    pub fn config_key(self) -> &'static str {
        match self {
            DeviceRole::Thermometer => "temperature",
            DeviceRole::Hygrometer => "humidity",
            DeviceRole::Barometer => "pressure",
            DeviceRole::WindGauge => "wind",
            DeviceRole::Gateway => "addr",
        }
    }

    /// Bus schema name.
    pub fn dev_type(self) -> &'static str {
        match self {
            DeviceRole::Thermometer => "thermometer.basic",
            DeviceRole::Hygrometer => "hygrometer.basic",
            DeviceRole::Barometer => "barometer.basic",
            DeviceRole::WindGauge => "windgauge.basic",
            DeviceRole::Gateway => "gateway.basic",
        }
    }

    fn attribute_names(self) -> &'static [&'static str] {
        match self {
            DeviceRole::Thermometer => &[ATTR_TEMPERATURE],
            DeviceRole::Hygrometer => &[ATTR_HUMIDITY],
            DeviceRole::Barometer => &[ATTR_PRESSURE],
            DeviceRole::WindGauge => &[
                ATTR_WIND_STRENGTH,
                ATTR_WIND_ANGLE,
                ATTR_GUST_STRENGTH,
                ATTR_GUST_ANGLE,
            ],
            DeviceRole::Gateway => &[ATTR_EMBEDDED],
        }
    }

    fn unsupported_attributes(self) -> &'static [&'static str] {
        match self {
            DeviceRole::WindGauge => &[ATTR_GUST_ANGLE, ATTR_GUST_STRENGTH],
            _ => &[],
        }
    }
}

/// Current value of a device attribute. `Null` until first written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Number(v)
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(v: Vec<String>) -> Self {
        AttributeValue::List(v)
    }
}

/// Static metadata shared by every device of the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub vendor_id: String,
    pub product_id: String,
    pub info: String,
    pub url: String,
    pub version: String,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            vendor_id: "ERIA".to_string(),
            product_id: "OpenWeatherMap".to_string(),
            info: "gateway.owm@OpenWeatherMap".to_string(),
            url: "https://www.openweathermap.org".to_string(),
            version: crate::cli::version_string(),
        }
    }
}

/// Who a device is, as announced on the bus.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceIdentity {
    pub role: DeviceRole,
    pub address: Address,
    pub dev_type: &'static str,
    #[serde(flatten)]
    pub info: DeviceInfo,
}

/// A virtual device: identity plus its current attribute values.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    identity: DeviceIdentity,
    attributes: BTreeMap<&'static str, AttributeValue>,
    unsupported: BTreeSet<&'static str>,
}

/// Description document served for a device.
#[derive(Debug, Serialize)]
pub struct DeviceDescription<'a> {
    #[serde(flatten)]
    pub identity: &'a DeviceIdentity,
    pub attributes: Vec<&'static str>,
    pub unsupported_attributes: Vec<&'static str>,
}

impl Device {
    pub fn new(role: DeviceRole, address: Address, info: DeviceInfo) -> Self {
        let unsupported: BTreeSet<_> = role.unsupported_attributes().iter().copied().collect();
        let attributes = role
            .attribute_names()
            .iter()
            .filter(|name| !unsupported.contains(*name))
            .map(|name| (*name, AttributeValue::Null))
            .collect();
        Self {
            identity: DeviceIdentity {
                role,
                address,
                dev_type: role.dev_type(),
                info,
            },
            attributes,
            unsupported,
        }
    }

    pub fn role(&self) -> DeviceRole {
        self.identity.role
    }

    pub fn address(&self) -> &Address {
        &self.identity.address
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn attributes(&self) -> &BTreeMap<&'static str, AttributeValue> {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    pub fn is_unsupported(&self, name: &str) -> bool {
        self.unsupported.contains(name)
    }

    pub fn unsupported_attributes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.unsupported.iter().copied()
    }

    /// Write an attribute. Returns whether the stored value changed.
    pub fn set_attribute(
        &mut self,
        name: &str,
        value: impl Into<AttributeValue>,
    ) -> Result<bool, DeviceError> {
        let dev_type = self.identity.dev_type;
        if self.unsupported.contains(name) {
            return Err(DeviceError::Unsupported {
                dev_type,
                name: name.to_string(),
            });
        }
        let slot = self
            .attributes
            .get_mut(name)
            .ok_or_else(|| DeviceError::UnknownAttribute {
                dev_type,
                name: name.to_string(),
            })?;
        let value = value.into();
        if *slot == value {
            return Ok(false);
        }
        *slot = value;
        Ok(true)
    }

    pub fn description(&self) -> DeviceDescription<'_> {
        DeviceDescription {
            identity: &self.identity,
            attributes: self.attributes.keys().copied().collect(),
            unsupported_attributes: self.unsupported.iter().copied().collect(),
        }
    }
}

/// The fixed set of devices managed by the gateway, keyed by role.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSet {
    thermometer: Device,
    hygrometer: Device,
    barometer: Device,
    wind_gauge: Device,
    gateway: Device,
}

impl DeviceSet {
    /// Resolve every role's address and build the devices.
    ///
    /// Sensors are resolved first, then the gateway, whose `embedded`
    /// attribute lists the sensor addresses in `DeviceRole::SENSORS` order.
    pub fn build(
        registry: &mut AddressRegistry<'_>,
        info: &DeviceInfo,
    ) -> Result<Self, RegistryError> {
        let mut sensor = |role: DeviceRole| -> Result<Device, RegistryError> {
            let address = registry.resolve(role.config_key())?;
            Ok(Device::new(role, address, info.clone()))
        };
        let thermometer = sensor(DeviceRole::Thermometer)?;
        let hygrometer = sensor(DeviceRole::Hygrometer)?;
        let barometer = sensor(DeviceRole::Barometer)?;
        let wind_gauge = sensor(DeviceRole::WindGauge)?;
        let mut gateway = sensor(DeviceRole::Gateway)?;

        let embedded: Vec<String> = [&thermometer, &hygrometer, &barometer, &wind_gauge]
            .iter()
            .map(|d| d.address().to_string())
            .collect();
        gateway
            .attributes
            .insert(ATTR_EMBEDDED, AttributeValue::List(embedded));

        Ok(Self {
            thermometer,
            hygrometer,
            barometer,
            wind_gauge,
            gateway,
        })
    }

    pub fn get(&self, role: DeviceRole) -> &Device {
        match role {
            DeviceRole::Thermometer => &self.thermometer,
            DeviceRole::Hygrometer => &self.hygrometer,
            DeviceRole::Barometer => &self.barometer,
            DeviceRole::WindGauge => &self.wind_gauge,
            DeviceRole::Gateway => &self.gateway,
        }
    }

    /// Mutable access to a sensor. The gateway is fixed after `build`.
    pub fn sensor_mut(&mut self, role: DeviceRole) -> Option<&mut Device> {
        match role {
            DeviceRole::Thermometer => Some(&mut self.thermometer),
            DeviceRole::Hygrometer => Some(&mut self.hygrometer),
            DeviceRole::Barometer => Some(&mut self.barometer),
            DeviceRole::WindGauge => Some(&mut self.wind_gauge),
            DeviceRole::Gateway => None,
        }
    }

    pub fn gateway(&self) -> &Device {
        &self.gateway
    }

    /// Sensors in publication order, then the gateway.
    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        [
            &self.thermometer,
            &self.hygrometer,
            &self.barometer,
            &self.wind_gauge,
            &self.gateway,
        ]
        .into_iter()
    }
}
