//! Stable device addresses.
//!
//! Maps a role key to the address stored in the config file, allocating a
//! random UUID the first time a role is seen. The caller persists the map
//! once every role has been resolved.

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("random source failed: {0}")]
    Random(String),
}

/// Bus address of a device, stored as its string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fresh random (v4) address drawn from the OS random source.
    pub fn random() -> Result<Self, RegistryError> {
        let mut bytes = [0u8; 16];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| RegistryError::Random(e.to_string()))?;
        let uuid = uuid::Builder::from_random_bytes(bytes).into_uuid();
        Ok(Self(uuid.hyphenated().to_string()))
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

type Generator = Box<dyn FnMut() -> Result<Address, RegistryError> + Send>;

/// Read-through view over the persisted role -> address map.
pub struct AddressRegistry<'a> {
    devices: &'a mut BTreeMap<String, String>,
    generate: Generator,
    allocated: usize,
}

impl<'a> AddressRegistry<'a> {
    pub fn new(devices: &'a mut BTreeMap<String, String>) -> Self {
        Self::with_generator(devices, Address::random)
    }

    pub fn with_generator(
        devices: &'a mut BTreeMap<String, String>,
        generate: impl FnMut() -> Result<Address, RegistryError> + Send + 'static,
    ) -> Self {
        Self {
            devices,
            generate: Box::new(generate),
            allocated: 0,
        }
    }

    /// Address for `role_key`, allocating and recording a new one if the
    /// map has none (blank entries count as none).
    pub fn resolve(&mut self, role_key: &str) -> Result<Address, RegistryError> {
        if let Some(existing) = self.devices.get(role_key) {
            let existing = existing.trim();
            if !existing.is_empty() {
                return Ok(Address::from(existing));
            }
        }

        let address = (self.generate)()?;
        self.devices
            .insert(role_key.to_string(), address.as_str().to_string());
        self.allocated += 1;
        log::info!("New device: role={} addr={}", role_key, address);
        Ok(address)
    }

    /// Number of addresses allocated by this registry so far.
    pub fn allocated(&self) -> usize {
        self.allocated
    }
}
