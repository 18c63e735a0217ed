//! Command facade behaviour against an in-memory bridge.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::sleep;

use cosmo_bridge::{
    ActivityLevel, BridgeConfig, CharacteristicTable, ConnectionManager, ConnectionState,
    CosmoClient, DeviceId, Error, LockState,
};

use common::{BridgeEnd, EventLog, MockConnector, accept, init_tracing, wait_for};

const VIBRATE_UUID: &str = "6e400004-b5a3-f393-e0a9-e50e24dcca9e";

type Fixture = (CosmoClient, Arc<MockConnector>, mpsc::UnboundedReceiver<BridgeEnd>);

fn client_with(config: BridgeConfig) -> Fixture {
    init_tracing();
    let (connector, bridges) = MockConnector::new();
    let client = CosmoClient::with_connector(config, connector.clone())
        .unwrap()
        .with_characteristics(CharacteristicTable::new().with("vibrate", VIBRATE_UUID));
    (client, connector, bridges)
}

/// Connects and consumes the initial `getDevices`.
async fn connected(client: &CosmoClient, bridges: &mut mpsc::UnboundedReceiver<BridgeEnd>) -> BridgeEnd {
    client.connect();
    let mut bridge = accept(bridges).await;
    wait_for("connected", || client.is_connected()).await;
    assert_eq!(bridge.next_frame().await, json!({"type": "getDevices"}));
    bridge
}

// ============================================================================
// Devices & Locking
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_get_devices_is_strict() {
    let (client, _connector, mut bridges) = client_with(BridgeConfig::new());

    assert!(matches!(client.get_devices(), Err(Error::NotConnected)));

    let mut bridge = connected(&client, &mut bridges).await;
    client.get_devices().unwrap();
    assert_eq!(bridge.next_frame().await, json!({"type": "getDevices"}));
}

#[tokio::test(start_paused = true)]
async fn test_lock_and_unlock() {
    let (client, _connector, mut bridges) = client_with(BridgeConfig::new());
    let mut bridge = connected(&client, &mut bridges).await;

    assert!(client.lock_devices(["A", "B"]));
    assert_eq!(
        bridge.next_frame().await,
        json!({"type": "lockDevices", "isLocked": true, "deviceIds": ["A", "B"]})
    );
    assert_eq!(
        client.lock_state(),
        LockState {
            is_locked: true,
            device_ids: vec![DeviceId::from("A"), DeviceId::from("B")],
        }
    );

    assert!(client.unlock_devices());
    assert_eq!(
        bridge.next_frame().await,
        json!({"type": "lockDevices", "isLocked": false, "deviceIds": []})
    );
    assert_eq!(client.lock_state(), LockState::default());
}

#[tokio::test(start_paused = true)]
async fn test_lock_while_disconnected_is_logged_not_sent() {
    let (client, connector, _bridges) = client_with(BridgeConfig::new());

    assert!(!client.lock_devices(["A"]));
    assert!(!client.unlock_devices());
    assert!(!client.toggle_lock());

    let activity = client.activity();
    assert_eq!(activity.len(), 3);
    assert!(activity.iter().all(|entry| entry.level == ActivityLevel::Error));
    assert_eq!(activity[0].message, "Cannot lock devices - WebSocket not connected");
    assert_eq!(client.lock_state(), LockState::default());
    assert_eq!(connector.attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_toggle_lock_targets_connected_devices() {
    let (client, _connector, mut bridges) = client_with(BridgeConfig::new());
    let mut bridge = connected(&client, &mut bridges).await;

    bridge.send(
        r#"{"type":"devices","devices":[{"id":"A","connected":true},{"id":"B","connected":false},{"id":"C","connected":true}]}"#,
    );
    wait_for("device list", || client.devices().len() == 3).await;

    assert!(client.toggle_lock());
    assert_eq!(
        bridge.next_frame().await,
        json!({"type": "lockDevices", "isLocked": true, "deviceIds": ["A", "C"]})
    );
    assert!(client.lock_state().is_locked);

    assert!(client.toggle_lock());
    assert_eq!(
        bridge.next_frame().await,
        json!({"type": "lockDevices", "isLocked": false, "deviceIds": []})
    );
    assert!(!client.lock_state().is_locked);
}

// ============================================================================
// Lighting
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_lighting_commands() {
    let (client, _connector, mut bridges) = client_with(BridgeConfig::new());
    let mut bridge = connected(&client, &mut bridges).await;

    client.set_color("A", 4, 2, 0);
    client.set_mode("A", 2);
    assert!(client.set_luminosity("A", 16));

    assert_eq!(
        bridge.next_frame().await,
        json!({"type": "setColor", "deviceId": "A", "color": {"r": 4, "g": 2, "b": 0}})
    );
    assert_eq!(bridge.next_frame().await, json!({"type": "setMode", "deviceId": "A", "data": [2]}));
    assert_eq!(
        bridge.next_frame().await,
        json!({"type": "setLuminosity", "deviceId": "A", "data": [16]})
    );
}

#[tokio::test(start_paused = true)]
async fn test_set_mode_reconnects() {
    let (client, connector, mut bridges) = client_with(BridgeConfig::new());

    client.set_mode("A", 5);
    let mut bridge = accept(&mut bridges).await;

    assert_eq!(bridge.next_frame().await, json!({"type": "getDevices"}));
    assert_eq!(bridge.next_frame().await, json!({"type": "setMode", "deviceId": "A", "data": [5]}));
    assert_eq!(connector.attempts(), 1);
}

// ============================================================================
// Characteristics
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_characteristic_operation_wraps_scalar() {
    let (client, _connector, mut bridges) = client_with(BridgeConfig::new());
    let mut bridge = connected(&client, &mut bridges).await;

    assert!(client.send_characteristic_operation("A", "vibrate", json!(5)));
    assert!(client.send_characteristic_operation("A", "vibrate", json!([1, 2])));

    assert_eq!(
        bridge.next_frame().await,
        json!({"type": "characteristicChanged", "deviceId": "A", "characteristicUUID": VIBRATE_UUID, "value": [5]})
    );
    assert_eq!(
        bridge.next_frame().await,
        json!({"type": "characteristicChanged", "deviceId": "A", "characteristicUUID": VIBRATE_UUID, "value": [1, 2]})
    );
}

#[tokio::test(start_paused = true)]
async fn test_unknown_characteristic_operation_is_not_sent() {
    let (client, _connector, mut bridges) = client_with(BridgeConfig::new());
    let mut bridge = connected(&client, &mut bridges).await;

    assert!(!client.send_characteristic_operation("A", "explode", json!(1)));
    assert!(matches!(
        client.characteristic_uuid("explode"),
        Err(Error::UnknownOperation { .. })
    ));

    sleep(Duration::from_secs(1)).await;
    assert!(bridge.pending_frames().is_empty());

    let last = client.activity().pop().unwrap();
    assert_eq!(last.level, ActivityLevel::Error);
    assert!(last.message.contains("explode"));
}

#[tokio::test(start_paused = true)]
async fn test_characteristic_operation_while_disconnected() {
    let (client, connector, _bridges) = client_with(BridgeConfig::new());

    assert!(!client.send_characteristic_operation("A", "vibrate", json!(1)));
    assert_eq!(connector.attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_raw_characteristic_access_is_strict() {
    let (client, _connector, mut bridges) = client_with(BridgeConfig::new());

    assert!(matches!(
        client.read_characteristic("A", VIBRATE_UUID),
        Err(Error::NotConnected)
    ));

    let mut bridge = connected(&client, &mut bridges).await;
    client.write_characteristic("A", VIBRATE_UUID, Some(json!([1]))).unwrap();
    client.read_characteristic("A", VIBRATE_UUID).unwrap();

    assert_eq!(
        bridge.next_frame().await,
        json!({"type": "writeCharacteristic", "deviceId": "A", "characteristicUUID": VIBRATE_UUID, "value": [1]})
    );
    assert_eq!(
        bridge.next_frame().await,
        json!({"type": "readCharacteristic", "deviceId": "A", "characteristicUUID": VIBRATE_UUID})
    );
}

// ============================================================================
// Activity & Lifecycle
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_activity_log_is_bounded() {
    let (client, _connector, _bridges) =
        client_with(BridgeConfig::new().with_activity_log_capacity(3));

    for _ in 0..5 {
        client.lock_devices(["A"]);
    }

    assert_eq!(client.activity().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_activity_records_connection_events() {
    let (client, _connector, mut bridges) = client_with(BridgeConfig::new());
    let _bridge = connected(&client, &mut bridges).await;

    client.disconnect(true);

    let messages: Vec<String> = client.activity().into_iter().map(|e| e.message).collect();
    assert_eq!(messages, vec!["Connected to bridge", "Disconnected from bridge"]);
}

#[tokio::test(start_paused = true)]
async fn test_auto_connect_after_delay() {
    let (client, connector, mut bridges) =
        client_with(BridgeConfig::new().with_auto_connect(Duration::from_secs(1)));
    let events = EventLog::default();
    client.add_listener(events.listener());

    sleep(Duration::from_millis(900)).await;
    assert_eq!(connector.attempts(), 0);

    let _bridge = accept(&mut bridges).await;
    wait_for("connected", || client.state() == ConnectionState::Connected).await;
    assert_eq!(events.kinds(), vec!["connected"]);
}

#[tokio::test(start_paused = true)]
async fn test_permanent_disconnect_cancels_auto_connect() {
    let (client, connector, _bridges) =
        client_with(BridgeConfig::new().with_auto_connect(Duration::from_secs(1)));

    client.disconnect(true);
    sleep(Duration::from_secs(30)).await;

    assert_eq!(connector.attempts(), 0);
    assert_eq!(client.state(), ConnectionState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_auto_connect_skipped_after_manager_stop() {
    let (client, connector, _bridges) =
        client_with(BridgeConfig::new().with_auto_connect(Duration::from_secs(1)));

    client.manager().disconnect(true);
    sleep(Duration::from_secs(30)).await;

    assert_eq!(connector.attempts(), 0);
    assert_eq!(client.state(), ConnectionState::Stopped);
}

#[test]
fn test_from_manager_outside_runtime_thread() {
    init_tracing();
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap();
    let (connector, mut bridges) = MockConnector::new();
    let config = BridgeConfig::new().with_auto_connect(Duration::from_millis(10));

    let manager = rt
        .block_on(async { ConnectionManager::new(&config, connector.clone()) })
        .unwrap();
    let client = std::thread::spawn(move || CosmoClient::from_manager(manager, &config))
        .join()
        .unwrap();

    rt.block_on(async {
        let _bridge = accept(&mut bridges).await;
        wait_for("connected", || client.is_connected()).await;
        client.disconnect(true);
    });
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_activity_listener_cannot_be_removed() {
    let (client, _connector, _bridges) = client_with(BridgeConfig::new());
    let handle = client.add_listener(|_event| {});

    assert_eq!(client.manager().listener_count(), 2);
    assert!(client.remove_listener(handle.id()));
    assert_eq!(client.manager().listener_count(), 1);
}
