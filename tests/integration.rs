//! Integration tests for the log store.

use logcast::{
    ChannelTransport, ConnectionManager, Frame, LogQuery, QueryGateway, ServerMessage, Store,
    StoreConfig, Timestamp, WireFormat,
};
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(2);

fn test_store() -> Arc<Store> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    Store::shared(StoreConfig::default())
}

fn decode(frame: Frame) -> ServerMessage {
    WireFormat::Json.decode(&frame).unwrap()
}

// --- Realistic Workflow Tests ---

#[test]
fn test_scan_returns_insertion_order() {
    let store = test_store();

    store.insert(200, "OK").unwrap();
    store.insert(404, "Not Found").unwrap();
    store.insert(500, "Internal Server Error").unwrap();

    let logs = store.scan(Timestamp::MIN, Timestamp::MAX);
    let got: Vec<_> = logs
        .iter()
        .map(|r| (r.status_code, r.message.as_str()))
        .collect();
    assert_eq!(
        got,
        vec![(200, "OK"), (404, "Not Found"), (500, "Internal Server Error")]
    );
}

#[test]
fn test_subscription_receives_initial_then_update() {
    let store = test_store();
    let manager = ConnectionManager::new(Arc::clone(&store));

    let (tx, rx) = crossbeam_channel::unbounded();
    let handle = manager.accept(ChannelTransport::new(tx)).unwrap();

    store.insert(404, "Not Found").unwrap();

    let first = decode(rx.recv_timeout(WAIT).unwrap());
    assert!(matches!(first, ServerMessage::Initial(_)));

    match decode(rx.recv_timeout(WAIT).unwrap()) {
        ServerMessage::Update(record) => {
            assert_eq!(record.status_code, 404);
            assert_eq!(record.message, "Not Found");
        }
        other => panic!("Expected update, got {:?}", other),
    }

    // Nothing else arrives.
    assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    handle.close();
}

#[test]
fn test_wire_messages_match_browser_shape() {
    let store = test_store();
    store.insert(500, "Internal Server Error").unwrap();
    let manager = ConnectionManager::new(Arc::clone(&store));

    let (tx, rx) = crossbeam_channel::unbounded();
    let handle = manager.accept(ChannelTransport::new(tx)).unwrap();
    store.insert(201, "Created").unwrap();

    let Frame::Text(initial) = rx.recv_timeout(WAIT).unwrap() else {
        panic!("Expected text frame");
    };
    let initial: serde_json::Value = serde_json::from_str(&initial).unwrap();
    assert_eq!(initial["type"], "initial");
    assert_eq!(initial["data"][0]["statusCode"], 500);
    assert_eq!(initial["data"][0]["id"], 1);
    assert!(initial["data"][0]["timestamp"].is_string());

    let Frame::Text(update) = rx.recv_timeout(WAIT).unwrap() else {
        panic!("Expected text frame");
    };
    let update: serde_json::Value = serde_json::from_str(&update).unwrap();
    assert_eq!(update["type"], "update");
    assert_eq!(update["data"]["statusCode"], 201);
    assert_eq!(update["data"]["message"], "Created");

    handle.close();
}

#[test]
fn test_query_then_live_do_not_overlap() {
    let store = test_store();
    for (code, message) in [(200, "OK"), (400, "Bad Request")] {
        store.insert(code, message).unwrap();
    }

    let manager = ConnectionManager::new(Arc::clone(&store));
    let (tx, rx) = crossbeam_channel::unbounded();
    let handle = manager.accept(ChannelTransport::new(tx)).unwrap();

    store.insert(502, "Bad Gateway").unwrap();

    let ServerMessage::Initial(history) = decode(rx.recv_timeout(WAIT).unwrap()) else {
        panic!("Expected initial message");
    };
    let ServerMessage::Update(live) = decode(rx.recv_timeout(WAIT).unwrap()) else {
        panic!("Expected update message");
    };

    let history_ids: Vec<_> = history.iter().map(|r| r.id).collect();
    assert_eq!(history_ids.len(), 2);
    assert!(!history_ids.contains(&live.id));
    assert!(history_ids.iter().all(|id| *id < live.id));

    handle.close();
}

#[test]
fn test_many_observers_each_get_every_update() {
    let store = test_store();
    let manager = ConnectionManager::new(Arc::clone(&store));

    let mut peers = Vec::new();
    for _ in 0..5 {
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = manager.accept(ChannelTransport::new(tx)).unwrap();
        peers.push((handle, rx));
    }

    for code in [200, 201, 202, 203] {
        store.insert(code, "batch").unwrap();
    }

    for (handle, rx) in &peers {
        assert!(matches!(
            decode(rx.recv_timeout(WAIT).unwrap()),
            ServerMessage::Initial(_)
        ));
        let codes: Vec<_> = (0..4)
            .map(|_| match decode(rx.recv_timeout(WAIT).unwrap()) {
                ServerMessage::Update(record) => record.status_code,
                other => panic!("Expected update, got {:?}", other),
            })
            .collect();
        assert_eq!(codes, vec![200, 201, 202, 203]);
        handle.close();
    }
}

#[test]
fn test_http_query_flow() {
    let store = test_store();
    let gateway = QueryGateway::new(Arc::clone(&store));
    store.seed_samples();

    let logs = gateway.get_logs_from_query(&LogQuery::new()).unwrap();
    assert_eq!(logs.len(), 10);

    let body = QueryGateway::to_json(&logs).unwrap();
    let value: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value.as_array().unwrap().len(), 10);
    assert_eq!(value[0]["statusCode"], 500);
    assert_eq!(value[9]["message"], "Too Many Requests");
}

#[test]
fn test_retention_keeps_newest() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let store = Store::new(StoreConfig {
        max_records: Some(3),
        ..Default::default()
    });

    for code in 200..210 {
        store.insert(code, "kept?").unwrap();
    }

    let codes: Vec<_> = store
        .scan(Timestamp::MIN, Timestamp::MAX)
        .iter()
        .map(|r| r.status_code)
        .collect();
    assert_eq!(codes, vec![207, 208, 209]);
    assert_eq!(store.stats().evicted_count, 7);
}
