use std::sync::{Arc, Mutex};

use serde_json::{Map, Value, json};

use super::*;
use crate::busy::BusyState;
use crate::poll::Poller;
use crate::rpc::RpcClient;
use crate::transport::{RpcTransport, TransportError};

struct ScriptedTransport {
    replies: Mutex<Vec<Result<Value, TransportError>>>,
    calls: Mutex<usize>,
}

impl ScriptedTransport {
    fn new(replies: Vec<Result<Value, TransportError>>) -> Self {
        Self { replies: Mutex::new(replies), calls: Mutex::new(0) }
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl RpcTransport for ScriptedTransport {
    async fn invoke(
        &self,
        _object: &str,
        _method: &str,
        _args: Map<String, Value>,
    ) -> Result<Value, TransportError> {
        *self.calls.lock().unwrap() += 1;
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() { Ok(Value::Object(Map::new())) } else { replies.remove(0) }
    }
}

fn modem_with(
    replies: Vec<Result<Value, TransportError>>,
) -> (ModemClient, Arc<ScriptedTransport>) {
    let transport = Arc::new(ScriptedTransport::new(replies));
    let rpc = RpcClient::new(transport.clone(), Poller::manual(), BusyState::detached());
    (ModemClient::new(rpc, "wan_4g"), transport)
}

fn refresher_with(
    replies: Vec<Result<Value, TransportError>>,
) -> (StatusRefresher, watch::Receiver<ModemStatus>, Arc<ScriptedTransport>) {
    let (modem, transport) = modem_with(replies);
    let (tx, rx) = watch::channel(ModemStatus::Unknown);
    (StatusRefresher { modem, tx }, rx, transport)
}

fn info_reply(vendor: &str) -> Result<Value, TransportError> {
    Ok(json!({"modem": {"vendor": vendor, "model": "E171", "version": "", "imei": ""}}))
}

fn absent_reply() -> Result<Value, TransportError> {
    Err(TransportError::Rpc { code: -32000, message: "Object not found".to_string() })
}

#[tokio::test]
async fn refresh_tracks_ready_absent_and_failed() {
    let (refresher, rx, _) = refresher_with(vec![
        info_reply("Huawei"),
        absent_reply(),
        Err(TransportError::Http("connection reset".to_string())),
    ]);

    assert_eq!(*rx.borrow(), ModemStatus::Unknown);

    assert!(refresher.refresh().await);
    match &*rx.borrow() {
        ModemStatus::Ready(info) => assert_eq!(info.modem.vendor, "Huawei"),
        other => panic!("expected Ready, got {other:?}"),
    }

    assert!(refresher.refresh().await);
    assert_eq!(*rx.borrow(), ModemStatus::Absent);

    assert!(refresher.refresh().await);
    match &*rx.borrow() {
        ModemStatus::Failed(message) => assert!(message.contains("connection reset")),
        other => panic!("expected Failed, got {other:?}"),
    }
}

#[tokio::test]
async fn unchanged_status_does_not_wake_watchers() {
    let (refresher, mut rx, _) = refresher_with(vec![info_reply("Huawei"), info_reply("Huawei")]);

    assert!(refresher.refresh().await);
    let _ = rx.borrow_and_update();

    assert!(refresher.refresh().await);
    assert!(!rx.has_changed().unwrap());
}

#[tokio::test]
async fn refresh_reports_every_receiver_gone_without_fetching() {
    let (refresher, rx, transport) = refresher_with(vec![info_reply("Huawei")]);
    drop(rx);

    assert!(!refresher.refresh().await);
    assert_eq!(transport.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn changed_resolves_on_a_real_transition() {
    let (modem, _) = modem_with(vec![info_reply("Huawei")]);
    let mut monitor = StatusMonitor::start(modem, Duration::from_millis(10));

    assert!(monitor.changed().await);
    assert!(monitor.latest().is_ready());
}

#[tokio::test(start_paused = true)]
async fn stop_halts_the_refresh_loop() {
    let (modem, transport) = modem_with(vec![info_reply("Huawei")]);
    let mut monitor = StatusMonitor::start(modem, Duration::from_millis(10));

    assert!(monitor.changed().await);
    monitor.stop();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.calls(), 1);
    assert!(!monitor.changed().await);
}

#[tokio::test(start_paused = true)]
async fn dropping_every_receiver_winds_the_loop_down() {
    let (modem, transport) = modem_with(vec![info_reply("Huawei")]);
    let monitor = StatusMonitor::start(modem, Duration::from_millis(10));

    drop(monitor);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(transport.calls(), 0);
}

// The daemon may answer `info` itself with a deferred id. Resolving that id
// takes scheduler ticks, so a refresh parked on the reply must leave the
// scheduler free to keep ticking.
#[tokio::test(start_paused = true)]
async fn deferred_info_reply_resolves_through_the_shared_poller() {
    let (modem, transport) = modem_with(vec![
        Ok(json!({"deferred": "d1"})),
        Ok(json!({
            "ready": true,
            "result": {"modem": {"vendor": "Huawei", "model": "E171", "version": "", "imei": ""}}
        })),
    ]);
    let poller = modem.rpc().poller().clone();
    // Period far beyond the test horizon: only the first fetch runs.
    let monitor = StatusMonitor::start(modem, Duration::from_secs(60));

    let status = tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            poller.tick().await;
            let latest = monitor.latest();
            if latest != ModemStatus::Unknown {
                break latest;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("deferred status fetch should have resolved");

    match status {
        ModemStatus::Ready(info) => assert_eq!(info.modem.vendor, "Huawei"),
        other => panic!("expected Ready, got {other:?}"),
    }
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn sms_fetch_retries_transient_failures() {
    let (modem, transport) = modem_with(vec![
        Err(TransportError::Http("connection reset".to_string())),
        Ok(json!({
            "storage": "SM",
            "capacity": {"used": 1, "total": 30},
            "messages": [{"id": 1, "type": 0, "unread": true, "time": 0, "addr": "900", "parts": []}]
        })),
    ]);

    let list = fetch_sms_retrying(&modem, 3, Duration::ZERO).await.unwrap();

    assert_eq!(list.messages.len(), 1);
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn sms_fetch_gives_up_on_daemon_errors() {
    let (modem, transport) = modem_with(vec![Ok(json!({"error": "SIM removed"}))]);

    let err = fetch_sms_retrying(&modem, 3, Duration::ZERO).await.unwrap_err();

    assert!(matches!(err, RpcError::Backend { .. }));
    assert_eq!(transport.calls(), 1);
}
