//! Typed facade over one modem's RPC object.
//!
//! [`ModemClient`] wraps the deferred-call engine with one method per daemon
//! operation, decoding replies into the structs in [`types`]. Interface
//! discovery goes through netifd's `network.interface dump` and keeps only
//! interfaces running the modem proto.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use crate::error::RpcError;
use crate::rpc::RpcClient;
use crate::transport::{RpcTransport, TransportError};

pub mod types;

use types::{
    CommandReply, ModemInfo, ModemSettings, NetInterface, NetworkInfo, Operator,
    OperatorSearchResult, SimInfo, SmsList, UssdReply,
};

// =============================================================================
// METHOD NAMES
// =============================================================================

const METHOD_INFO: &str = "info";
const METHOD_SIM_INFO: &str = "sim_info";
const METHOD_NETWORK_INFO: &str = "network_info";
const METHOD_SEND_COMMAND: &str = "send_command";
const METHOD_SEND_USSD: &str = "send_ussd";
const METHOD_CANCEL_USSD: &str = "cancel_ussd";
const METHOD_READ_SMS: &str = "read_sms";
const METHOD_DELETE_SMS: &str = "delete_sms";
const METHOD_SEARCH_OPERATORS: &str = "search_operators";
const METHOD_SET_OPERATOR: &str = "set_operator";
const METHOD_GET_SETTINGS: &str = "get_settings";
const METHOD_SET_NETWORK_MODE: &str = "set_network_mode";

/// Operator id that asks the modem to pick a network itself.
pub const AUTO_OPERATOR_ID: &str = "auto";

/// netifd proto name claimed by the modem daemon.
pub const USBMODEM_PROTO: &str = "usbmodem";

const NETWORK_INTERFACE_OBJECT: &str = "network.interface";
const METHOD_DUMP: &str = "dump";

// =============================================================================
// CLIENT
// =============================================================================

/// Client for a single modem interface. Cloning is cheap; clones share the
/// underlying engine and its busy counter.
#[derive(Clone)]
pub struct ModemClient {
    rpc: RpcClient,
    interface: String,
}

impl ModemClient {
    pub fn new(rpc: RpcClient, interface: impl Into<String>) -> Self {
        Self { rpc, interface: interface.into() }
    }

    /// netifd interface name this client addresses.
    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    // ===== STATUS =====

    /// Full modem status snapshot.
    ///
    /// # Errors
    ///
    /// Returns an [`RpcError`] if the call fails or the reply does not decode.
    pub async fn info(&self) -> Result<ModemInfo, RpcError> {
        self.call_decoded(METHOD_INFO, Map::new()).await
    }

    /// SIM card details only.
    ///
    /// # Errors
    ///
    /// Returns an [`RpcError`] if the call fails or the reply does not decode.
    pub async fn sim_info(&self) -> Result<SimInfo, RpcError> {
        self.call_decoded(METHOD_SIM_INFO, Map::new()).await
    }

    /// Registration, operator, technology and signal levels.
    ///
    /// # Errors
    ///
    /// Returns an [`RpcError`] if the call fails or the reply does not decode.
    pub async fn network_info(&self) -> Result<NetworkInfo, RpcError> {
        self.call_decoded(METHOD_NETWORK_INFO, Map::new()).await
    }

    // ===== COMMANDS =====

    /// Run a raw AT command on the modem's control channel.
    ///
    /// `timeout_ms` bounds execution on the daemon side; the call itself
    /// waits for as long as the daemon keeps the deferred slot alive.
    ///
    /// # Errors
    ///
    /// Returns an [`RpcError`] if the call fails or the reply does not decode.
    pub async fn send_command(
        &self,
        command: &str,
        timeout_ms: u64,
    ) -> Result<CommandReply, RpcError> {
        self.call_decoded(
            METHOD_SEND_COMMAND,
            params(json!({ "command": command, "timeout": timeout_ms })),
        )
        .await
    }

    // ===== USSD =====

    /// Open a USSD session with `query` (for example `*100#`).
    ///
    /// # Errors
    ///
    /// Returns an [`RpcError`] if the call fails or the reply does not decode.
    pub async fn send_ussd(&self, query: &str, timeout_ms: u64) -> Result<UssdReply, RpcError> {
        self.call_decoded(
            METHOD_SEND_USSD,
            params(json!({ "query": query, "timeout": timeout_ms })),
        )
        .await
    }

    /// Answer a USSD menu that is waiting for input.
    ///
    /// # Errors
    ///
    /// Returns an [`RpcError`] if the call fails or the reply does not decode.
    pub async fn reply_ussd(&self, answer: &str, timeout_ms: u64) -> Result<UssdReply, RpcError> {
        self.call_decoded(
            METHOD_SEND_USSD,
            params(json!({ "answer": answer, "timeout": timeout_ms })),
        )
        .await
    }

    /// Drop the current USSD session, if any.
    ///
    /// # Errors
    ///
    /// Returns an [`RpcError`] if the call fails.
    pub async fn cancel_ussd(&self) -> Result<(), RpcError> {
        self.call_unit(METHOD_CANCEL_USSD, Map::new()).await
    }

    // ===== SMS =====

    /// Read all stored messages.
    ///
    /// # Errors
    ///
    /// Returns an [`RpcError`] if the call fails or the reply does not decode.
    pub async fn read_sms(&self) -> Result<SmsList, RpcError> {
        self.call_decoded(METHOD_READ_SMS, Map::new()).await
    }

    /// Delete messages by database id ([`types::SmsMessage::id`]); the
    /// daemon drops every stored part of each message.
    ///
    /// # Errors
    ///
    /// Returns an [`RpcError`] if the call fails.
    pub async fn delete_sms(&self, ids: &[i64]) -> Result<(), RpcError> {
        self.call_unit(METHOD_DELETE_SMS, params(json!({ "ids": ids }))).await
    }

    // ===== OPERATORS =====

    /// Scan for visible networks. The daemon defers this call; expect it to
    /// take tens of seconds on a live modem.
    ///
    /// # Errors
    ///
    /// Returns an [`RpcError`] if the call fails or the reply does not decode.
    pub async fn search_operators(&self) -> Result<Vec<Operator>, RpcError> {
        let result: OperatorSearchResult =
            self.call_decoded(METHOD_SEARCH_OPERATORS, Map::new()).await?;
        Ok(result.list)
    }

    /// Register with a specific network. `tech` is the raw technology id
    /// reported by the scan.
    ///
    /// # Errors
    ///
    /// Returns an [`RpcError`] if the call fails.
    pub async fn set_operator(&self, id: &str, tech: i32) -> Result<(), RpcError> {
        self.call_unit(METHOD_SET_OPERATOR, params(json!({ "id": id, "tech": tech }))).await
    }

    /// Return to automatic network selection.
    ///
    /// # Errors
    ///
    /// Returns an [`RpcError`] if the call fails.
    pub async fn set_operator_auto(&self) -> Result<(), RpcError> {
        self.set_operator(AUTO_OPERATOR_ID, 0).await
    }

    // ===== SETTINGS =====

    /// Supported network modes and the currently active one.
    ///
    /// # Errors
    ///
    /// Returns an [`RpcError`] if the call fails or the reply does not decode.
    pub async fn get_settings(&self) -> Result<ModemSettings, RpcError> {
        self.call_decoded(METHOD_GET_SETTINGS, Map::new()).await
    }

    /// Switch the preferred network mode; `roaming` is passed only when the
    /// caller wants to change it.
    ///
    /// # Errors
    ///
    /// Returns an [`RpcError`] if the call fails.
    pub async fn set_network_mode(
        &self,
        mode: i64,
        roaming: Option<bool>,
    ) -> Result<(), RpcError> {
        let mut args = params(json!({ "mode": mode }));
        if let Some(roaming) = roaming {
            args.insert("roaming".into(), Value::Bool(roaming));
        }
        self.call_unit(METHOD_SET_NETWORK_MODE, args).await
    }

    // ===== PLUMBING =====

    async fn call_decoded<T: DeserializeOwned>(
        &self,
        method: &str,
        args: Map<String, Value>,
    ) -> Result<T, RpcError> {
        let payload = self.rpc.call(&self.interface, method, args).await?;
        serde_json::from_value(payload)
            .map_err(|e| TransportError::Decode(e.to_string()).into())
    }

    async fn call_unit(&self, method: &str, args: Map<String, Value>) -> Result<(), RpcError> {
        self.rpc.call(&self.interface, method, args).await?;
        Ok(())
    }
}

fn params(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

// =============================================================================
// DISCOVERY
// =============================================================================

/// List netifd interfaces whose proto is handled by the modem daemon.
///
/// Goes straight to the transport because `network.interface` is a plain ubus
/// object with no deferred replies.
///
/// # Errors
///
/// Returns a [`TransportError`] if the dump call fails or does not decode.
pub async fn list_modem_interfaces(
    transport: &dyn RpcTransport,
) -> Result<Vec<NetInterface>, TransportError> {
    #[derive(Deserialize)]
    struct Dump {
        #[serde(default)]
        interface: Vec<NetInterface>,
    }

    let payload = transport.invoke(NETWORK_INTERFACE_OBJECT, METHOD_DUMP, Map::new()).await?;
    let dump: Dump =
        serde_json::from_value(payload).map_err(|e| TransportError::Decode(e.to_string()))?;

    let interfaces: Vec<NetInterface> =
        dump.interface.into_iter().filter(|row| row.proto == USBMODEM_PROTO).collect();
    tracing::debug!(count = interfaces.len(), "discovered modem interfaces");
    Ok(interfaces)
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
