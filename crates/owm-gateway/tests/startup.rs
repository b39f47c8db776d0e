mod common;

use common::*;
use owm_gateway::gateway::{prepare_devices, register_devices};
use owm_gateway::{ConfigStore, DeviceInfo, DeviceRole, GatewayError, StoredConfig};
use std::fs;

fn write_config(dir: &tempfile::TempDir, config: &StoredConfig) -> std::path::PathBuf {
    let path = dir.path().join("gateway-owm.json");
    fs::write(&path, serde_json::to_string_pretty(config).unwrap()).unwrap();
    path
}

fn filled_config() -> StoredConfig {
    StoredConfig {
        api_key: Some("key".into()),
        place: Some("Paris,FR".into()),
        ..StoredConfig::template()
    }
}

#[test]
fn test_first_run_allocates_and_persists_all_addresses() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, &filled_config());

    let mut store = ConfigStore::open(&path).unwrap();
    let devices = prepare_devices(&mut store, &DeviceInfo::default()).unwrap();

    let reloaded = ConfigStore::open(&path).unwrap();
    let saved = &reloaded.config().devices;
    assert_eq!(saved.len(), 5);
    for device in devices.iter() {
        assert_eq!(
            saved[device.role().config_key()],
            device.address().to_string()
        );
    }
}

#[test]
fn test_restart_reuses_persisted_addresses() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, &filled_config());

    let mut store = ConfigStore::open(&path).unwrap();
    let first = prepare_devices(&mut store, &DeviceInfo::default()).unwrap();
    let written = fs::read_to_string(&path).unwrap();

    let mut store = ConfigStore::open(&path).unwrap();
    let second = prepare_devices(&mut store, &DeviceInfo::default()).unwrap();

    assert_eq!(first, second);
    assert_eq!(fs::read_to_string(&path).unwrap(), written);
}

#[test]
fn test_partial_map_only_fills_missing_roles() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = filled_config();
    config
        .devices
        .insert("temperature".into(), "kept-address".into());
    let path = write_config(&dir, &config);

    let mut store = ConfigStore::open(&path).unwrap();
    let devices = prepare_devices(&mut store, &DeviceInfo::default()).unwrap();

    assert_eq!(
        devices.get(DeviceRole::Thermometer).address().as_str(),
        "kept-address"
    );
    assert_eq!(ConfigStore::open(&path).unwrap().config().devices.len(), 5);
}

#[test]
fn test_missing_config_is_reported_as_config_missing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gateway-owm.json");

    let err: GatewayError = ConfigStore::open(&path).unwrap_err().into();
    assert!(matches!(err, GatewayError::ConfigMissing { .. }));
    assert!(path.exists());
}

#[tokio::test]
async fn test_register_devices_registers_all_in_order() {
    let bus = RecordingBus::default();
    register_devices(&bus, &build_devices()).await.unwrap();
    assert_eq!(
        *bus.registered.lock().unwrap(),
        vec![
            DeviceRole::Thermometer,
            DeviceRole::Hygrometer,
            DeviceRole::Barometer,
            DeviceRole::WindGauge,
            DeviceRole::Gateway,
        ]
    );
}

#[tokio::test]
async fn test_registration_failure_is_engine_init_error() {
    let bus = RecordingBus::failing_register();
    let err = register_devices(&bus, &build_devices()).await.unwrap_err();
    assert!(matches!(err, GatewayError::EngineInit(_)));
    assert_eq!(err.exit_code(), 6);
}
