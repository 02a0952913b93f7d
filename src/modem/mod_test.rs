use std::sync::{Arc, Mutex};

use serde_json::{Map, Value, json};

use super::types::OperatorStatus;
use super::*;
use crate::busy::BusyState;
use crate::poll::Poller;

// ===== SCRIPTED TRANSPORT =====

#[derive(Debug, Clone)]
struct RecordedCall {
    object: String,
    method: String,
    args: Map<String, Value>,
}

struct ScriptedTransport {
    replies: Mutex<Vec<Result<Value, TransportError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    fn new(replies: Vec<Result<Value, TransportError>>) -> Self {
        Self { replies: Mutex::new(replies), calls: Mutex::new(Vec::new()) }
    }

    fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl RpcTransport for ScriptedTransport {
    async fn invoke(
        &self,
        object: &str,
        method: &str,
        args: Map<String, Value>,
    ) -> Result<Value, TransportError> {
        self.calls.lock().unwrap().push(RecordedCall {
            object: object.to_string(),
            method: method.to_string(),
            args,
        });
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

// ===== TESTS =====

#[tokio::test]
async fn info_addresses_the_interface_object() {
    let (modem, transport) = modem_with(vec![Ok(json!({
        "modem": {"vendor": "Huawei", "model": "E171", "version": "", "imei": ""},
        "network_status": {"id": 2, "name": "home"}
    }))]);

    let info = modem.info().await.unwrap();
    assert_eq!(info.modem.vendor, "Huawei");
    assert!(info.network_status.name.is_registered());

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].object, "usbmodem.wan_4g");
    assert_eq!(calls[0].method, "info");
    assert_eq!(calls[0].args.get("async"), Some(&Value::Bool(true)));
}

#[tokio::test]
async fn ussd_query_and_answer_use_distinct_params() {
    let (modem, transport) = modem_with(vec![
        Ok(json!({"code": 1, "response": "1) Balance 2) Tariff"})),
        Ok(json!({"code": 0, "response": "Balance: 10.00"})),
    ]);

    let menu = modem.send_ussd("*100#", 10_000).await.unwrap();
    assert!(menu.wants_reply());

    let done = modem.reply_ussd("1", 10_000).await.unwrap();
    assert!(!done.wants_reply());
    assert_eq!(done.response, "Balance: 10.00");

    let calls = transport.calls();
    assert_eq!(calls[0].method, "send_ussd");
    assert_eq!(calls[0].args.get("query"), Some(&json!("*100#")));
    assert!(!calls[0].args.contains_key("answer"));
    assert_eq!(calls[1].args.get("answer"), Some(&json!("1")));
    assert!(!calls[1].args.contains_key("query"));
    assert_eq!(calls[1].args.get("timeout"), Some(&json!(10_000)));
}

#[tokio::test]
async fn operator_scan_completes_after_polling() {
    let (modem, transport) = modem_with(vec![
        Ok(json!({"deferred": 3})),
        Ok(json!({"exists": true})),
        Ok(json!({
            "ready": true,
            "result": {"list": [
                {"id": "25001", "name": "MTS", "status": "registered", "tech": {"id": 9, "name": "4G (LTE)"}},
                {"id": 25002, "name": "MegaFon", "status": "forbidden", "tech": {"id": 4, "name": "3G (UMTS)"}}
            ]}
        })),
    ]);

    let (result, ()) = tokio::join!(modem.search_operators(), async {
        modem.rpc().poller().tick().await;
        modem.rpc().poller().tick().await;
    });

    let operators = result.unwrap();
    assert_eq!(operators.len(), 2);
    assert_eq!(operators[0].status, OperatorStatus::Registered);
    assert_eq!(operators[1].id, "25002");

    let calls = transport.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[1].method, "getDeferredResult");
    assert_eq!(calls[1].args.get("id"), Some(&json!("3")));
    assert!(!calls[1].args.contains_key("async"));
}

#[tokio::test]
async fn delete_sms_sends_the_id_list() {
    let (modem, transport) = modem_with(vec![Ok(json!({}))]);

    modem.delete_sms(&[4, 5]).await.unwrap();

    let calls = transport.calls();
    assert_eq!(calls[0].method, "delete_sms");
    assert_eq!(calls[0].args.get("ids"), Some(&json!([4, 5])));
}

#[tokio::test]
async fn automatic_selection_sends_the_auto_id() {
    let (modem, transport) = modem_with(vec![Ok(json!({}))]);

    modem.set_operator_auto().await.unwrap();

    let calls = transport.calls();
    assert_eq!(calls[0].method, "set_operator");
    assert_eq!(calls[0].args.get("id"), Some(&json!("auto")));
    assert_eq!(calls[0].args.get("tech"), Some(&json!(0)));
}

#[tokio::test]
async fn mistyped_reply_surfaces_as_decode_error() {
    let (modem, _) = modem_with(vec![Ok(json!({"success": "yes", "response": ""}))]);

    let err = modem.send_command("ATI", 1_000).await.unwrap_err();
    assert!(matches!(err, RpcError::Transport(TransportError::Decode(_))));
}

#[tokio::test]
async fn unplugged_modem_reads_as_device_absent() {
    let (modem, _) = modem_with(vec![Err(TransportError::Rpc {
        code: -32000,
        message: "Object not found".to_string(),
    })]);

    let err = modem.info().await.unwrap_err();
    assert!(err.is_device_absent());
}

#[tokio::test]
async fn discovery_keeps_only_modem_interfaces() {
    let transport = Arc::new(ScriptedTransport::new(vec![Ok(json!({
        "interface": [
            {"interface": "loopback", "proto": "loopback", "up": true},
            {"interface": "wan_4g", "proto": "usbmodem", "up": true, "l3_device": "wwan0"},
            {"interface": "lan", "proto": "static", "up": true}
        ]
    }))]));

    let interfaces = list_modem_interfaces(transport.as_ref()).await.unwrap();

    assert_eq!(interfaces.len(), 1);
    assert_eq!(interfaces[0].interface, "wan_4g");
    assert_eq!(interfaces[0].l3_device.as_deref(), Some("wwan0"));

    let calls = transport.calls();
    assert_eq!(calls[0].object, "network.interface");
    assert_eq!(calls[0].method, "dump");
}
