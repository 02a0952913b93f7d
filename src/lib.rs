//! Client library for the OpenWrt usbmodem daemon.
//!
//! The daemon exposes one ubus object per modem interface. Slow operations
//! (AT commands, USSD, operator scans) do not block their ubus call: the
//! daemon parks them and hands back a deferred id, which the caller polls
//! with `getDeferredResult` until the real result lands. This crate hides
//! that dance behind ordinary async methods: [`rpc::RpcClient`] drives the
//! deferral protocol over a pluggable transport, and [`modem::ModemClient`]
//! puts a typed API on top of it.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`rpc`] | Deferred-call engine: issue, park, poll, settle |
//! | [`wire`] | Reply classification for call and poll payloads |
//! | [`poll`] | Shared poll scheduler driving all pending deferrals |
//! | [`busy`] | Edge-triggered busy counter for activity indicators |
//! | [`transport`] | Transport seam and its error taxonomy |
//! | [`ubus`] | Production transport: JSON-RPC over uhttpd's `/ubus` |
//! | [`modem`] | Typed facade over one modem object, plus discovery |
//! | [`monitor`] | Background status polling and SMS fetch retries |
//! | [`error`] | Top-level error type and the [`error::ErrorCode`] trait |

pub mod busy;
pub mod error;
pub mod modem;
pub mod monitor;
pub mod poll;
pub mod rpc;
pub mod transport;
pub mod ubus;
pub mod wire;
