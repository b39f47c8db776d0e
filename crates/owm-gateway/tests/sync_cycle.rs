mod common;

use common::*;
use owm_gateway::device::{
    ATTR_HUMIDITY, ATTR_PRESSURE, ATTR_TEMPERATURE, ATTR_WIND_ANGLE, ATTR_WIND_STRENGTH,
};
use owm_gateway::{AttributeValue, DeviceRole, SyncContext};
use std::sync::Arc;

fn number(device: &owm_gateway::Device, name: &str) -> f64 {
    match device.attribute(name) {
        Some(AttributeValue::Number(v)) => *v,
        other => panic!("expected number for {}, got {:?}", name, other),
    }
}

#[tokio::test]
async fn test_full_cycle_writes_and_notifies_in_order() {
    let provider = ScriptedProvider::always(snapshot(21.5, 60.0, 1013.0, 5.0, 180.0));
    let bus = Arc::new(RecordingBus::default());
    let mut ctx = SyncContext::new(build_devices(), provider, bus.clone(), "Paris,FR");

    let report = ctx.run_cycle().await.unwrap();

    assert_eq!(report.notified, DeviceRole::SENSORS.to_vec());
    assert!(report.failed.is_empty());
    assert_eq!(bus.notified_roles(), DeviceRole::SENSORS.to_vec());

    let devices = ctx.devices();
    assert_eq!(number(devices.get(DeviceRole::Thermometer), ATTR_TEMPERATURE), 21.5);
    assert_eq!(number(devices.get(DeviceRole::Hygrometer), ATTR_HUMIDITY), 60.0);
    assert_eq!(number(devices.get(DeviceRole::Barometer), ATTR_PRESSURE), 1013.0);
    let wind = devices.get(DeviceRole::WindGauge);
    assert!((number(wind, ATTR_WIND_STRENGTH) - 18.0).abs() < 1e-9);
    assert_eq!(number(wind, ATTR_WIND_ANGLE), 180.0);
}

#[tokio::test]
async fn test_notifications_carry_device_address_and_values() {
    let provider = ScriptedProvider::always(snapshot(21.5, 60.0, 1013.0, 10.0, 90.0));
    let bus = Arc::new(RecordingBus::default());
    let mut ctx = SyncContext::new(build_devices(), provider, bus.clone(), "Paris,FR");
    ctx.run_cycle().await.unwrap();

    let notifications = bus.notifications.lock().unwrap().clone();
    let wind = notifications
        .iter()
        .find(|n| n.role == DeviceRole::WindGauge)
        .unwrap();
    assert_eq!(
        wind.address,
        ctx.devices().get(DeviceRole::WindGauge).address().to_string()
    );
    assert_eq!(
        wind.attributes.get(ATTR_WIND_STRENGTH),
        Some(&AttributeValue::Number(36.0))
    );
    assert!(!wind.attributes.contains_key("gustStrength"));
}

#[tokio::test]
async fn test_fetch_failure_leaves_devices_untouched() {
    let provider = ScriptedProvider::new(vec![
        Ok(snapshot(10.0, 50.0, 1000.0, 1.0, 45.0)),
        Err(api_error("city not found")),
    ]);
    let bus = Arc::new(RecordingBus::default());
    let mut ctx = SyncContext::new(build_devices(), provider, bus.clone(), "Nowhere");

    ctx.run_cycle().await.unwrap();
    let before = ctx.devices().clone();
    let notified_before = bus.notifications.lock().unwrap().len();

    let err = ctx.run_cycle().await.unwrap_err();
    assert!(err.to_string().contains("city not found"));
    assert_eq!(ctx.devices(), &before);
    assert_eq!(bus.notifications.lock().unwrap().len(), notified_before);
}

#[tokio::test]
async fn test_notification_failure_does_not_stop_remaining_devices() {
    let provider = ScriptedProvider::always(snapshot(21.5, 60.0, 1013.0, 5.0, 180.0));
    let bus = Arc::new(RecordingBus::failing_notify_for(DeviceRole::Hygrometer));
    let mut ctx = SyncContext::new(build_devices(), provider, bus.clone(), "Paris,FR");

    let report = ctx.run_cycle().await.unwrap();

    assert_eq!(report.failed, vec![DeviceRole::Hygrometer]);
    assert_eq!(
        bus.notified_roles(),
        vec![
            DeviceRole::Thermometer,
            DeviceRole::Barometer,
            DeviceRole::WindGauge
        ]
    );
    // The attribute is still written even though publishing it failed
    assert_eq!(
        ctx.devices()
            .get(DeviceRole::Hygrometer)
            .attribute(ATTR_HUMIDITY),
        Some(&AttributeValue::Number(60.0))
    );
}

#[tokio::test]
async fn test_gateway_is_never_notified() {
    let provider = ScriptedProvider::always(snapshot(1.0, 2.0, 3.0, 4.0, 5.0));
    let bus = Arc::new(RecordingBus::default());
    let mut ctx = SyncContext::new(build_devices(), provider, bus.clone(), "Paris,FR");
    let gateway_before = ctx.devices().gateway().clone();

    ctx.run_cycle().await.unwrap();
    ctx.run_cycle().await.unwrap();

    assert!(!bus.notified_roles().contains(&DeviceRole::Gateway));
    assert_eq!(ctx.devices().gateway(), &gateway_before);
}

#[tokio::test]
async fn test_configured_place_is_requested() {
    let provider = ScriptedProvider::always(snapshot(1.0, 2.0, 3.0, 4.0, 5.0));
    let bus = Arc::new(RecordingBus::default());
    let mut ctx = SyncContext::new(build_devices(), provider, bus, "Lyon,FR");
    ctx.run_cycle().await.unwrap();
    ctx.run_cycle().await.unwrap();
    assert_eq!(
        *ctx.provider().places.lock().unwrap(),
        vec!["Lyon,FR".to_string(), "Lyon,FR".to_string()]
    );
}

#[tokio::test]
async fn test_failed_fetch_still_requested_configured_place() {
    let provider = ScriptedProvider::new(vec![Err(api_error("city not found"))]);
    let bus = Arc::new(RecordingBus::default());
    let mut ctx = SyncContext::new(build_devices(), provider, bus.clone(), "Nowhere,XX");
    assert!(ctx.run_cycle().await.is_err());
    assert_eq!(*ctx.provider().places.lock().unwrap(), vec!["Nowhere,XX".to_string()]);
    assert!(bus.notified_roles().is_empty());
}
