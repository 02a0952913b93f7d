//! Reply decoding for the deferred call protocol.
//!
//! The daemon multiplexes three meanings onto one reply map: an explicit
//! error, a deferral marker, or the payload itself. Poll replies do the same
//! with ready/exists flags. Both shapes are decoded exactly once, here, into
//! tagged enums; nothing outside this module inspects raw reply maps for
//! protocol fields.
//!
//! Field truthiness follows the daemon's front-end conventions: absent,
//! null, `false`, `0` and `""` all count as unset.

use serde_json::Value;

const KEY_ERROR: &str = "error";
const KEY_DEFERRED: &str = "deferred";
const KEY_READY: &str = "ready";
const KEY_EXISTS: &str = "exists";
const KEY_RESULT: &str = "result";

// =============================================================================
// REPLY SHAPES
// =============================================================================

/// Decoded immediate reply to a modem method call.
#[derive(Debug, Clone, PartialEq)]
pub enum CallReply {
    /// The daemon rejected the call outright.
    Failed(String),

    /// The daemon parked the result under a deferred id; the caller must
    /// poll for it.
    Deferred(String),

    /// The result arrived synchronously.
    Done(Value),
}

/// Decoded reply to a `getDeferredResult` poll.
#[derive(Debug, Clone, PartialEq)]
pub enum PollReply {
    /// The deferred operation finished: either its payload or the error it
    /// was packaged with.
    Ready(Result<Value, String>),

    /// The operation is still running; keep polling.
    Pending,

    /// The daemon no longer knows the id; the record was evicted.
    Expired,
}

// =============================================================================
// DECODING
// =============================================================================

/// Decode the immediate reply to a modem method call.
///
/// Precedence: an `error` field fails the call even if a deferral marker is
/// also present; then a truthy `deferred` field carries the id; anything
/// else is the payload. Deferred ids arrive as strings or numbers and
/// normalize to strings; a truthy marker of any other shape is treated as a
/// malformed rejection.
pub fn decode_call(reply: Value) -> CallReply {
    let obj = match reply {
        Value::Object(obj) => obj,
        other => return CallReply::Done(other),
    };
    if let Some(err) = obj.get(KEY_ERROR) {
        if truthy(err) {
            return CallReply::Failed(error_message(err));
        }
    }
    match obj.get(KEY_DEFERRED) {
        Some(Value::String(id)) if !id.is_empty() => return CallReply::Deferred(id.clone()),
        Some(Value::Number(n)) if n.as_f64().is_some_and(|f| f != 0.0) => {
            return CallReply::Deferred(n.to_string());
        }
        Some(v) if truthy(v) => {
            return CallReply::Failed("deferred reply carried no id".to_owned());
        }
        _ => {}
    }
    CallReply::Done(Value::Object(obj))
}

/// Decode one `getDeferredResult` poll reply.
///
/// Precedence: `ready` wins, then a truthy `exists` keeps the poll alive,
/// and everything else means the record is gone. A ready reply resolves
/// with its `result` payload unless that payload carries an `error` field;
/// a ready reply with no `result` at all resolves with null.
pub fn decode_poll(reply: Value) -> PollReply {
    let mut obj = match reply {
        Value::Object(obj) => obj,
        _ => return PollReply::Expired,
    };
    if obj.get(KEY_READY).is_some_and(truthy) {
        return match obj.remove(KEY_RESULT) {
            Some(Value::Object(result)) => match result.get(KEY_ERROR) {
                Some(err) if truthy(err) => PollReply::Ready(Err(error_message(err))),
                _ => PollReply::Ready(Ok(Value::Object(result))),
            },
            Some(other) => PollReply::Ready(Ok(other)),
            None => PollReply::Ready(Ok(Value::Null)),
        };
    }
    if obj.get(KEY_EXISTS).is_some_and(truthy) {
        return PollReply::Pending;
    }
    PollReply::Expired
}

// =============================================================================
// HELPERS
// =============================================================================

/// Loose truthiness matching what the daemon's own front-end applies to
/// these flags.
fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Render an `error` field as a message: strings pass through, anything
/// else is shown as compact JSON.
fn error_message(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "wire_test.rs"]
mod tests;
