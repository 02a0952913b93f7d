//! Background status polling for one modem.
//!
//! [`StatusMonitor`] spawns a refresh loop: every `period` it fetches a
//! fresh [`ModemInfo`] and publishes it on a watch channel, so any number
//! of consumers can render the latest state or wait for it to change. The
//! loop runs beside the deferred-result scheduler rather than inside it:
//! a status fetch may itself come back deferred, and resolving that id
//! needs scheduler ticks to keep flowing while the fetch waits.
//! An unplugged modem is reported as [`ModemStatus::Absent`] rather than an
//! error, since a missing device is an expected state on a router.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::{ErrorCode, RpcError};
use crate::modem::ModemClient;
use crate::modem::types::{ModemInfo, SmsList};

// =============================================================================
// STATUS
// =============================================================================

/// Latest known state of a modem.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ModemStatus {
    /// No poll has completed yet.
    #[default]
    Unknown,
    /// The daemon answered; full snapshot attached.
    Ready(Box<ModemInfo>),
    /// The modem's ubus object is gone, typically an unplugged device.
    Absent,
    /// The last poll failed for another reason.
    Failed(String),
}

impl ModemStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

// =============================================================================
// MONITOR
// =============================================================================

/// Handle to a running status refresh loop. Dropping every receiver lets
/// the loop wind down on its next cycle; [`StatusMonitor::stop`] halts it
/// immediately.
pub struct StatusMonitor {
    rx: watch::Receiver<ModemStatus>,
    task: JoinHandle<()>,
}

impl StatusMonitor {
    /// Spawn a refresh loop fetching `modem`'s status every `period`. The
    /// first fetch starts right away.
    pub fn start(modem: ModemClient, period: Duration) -> Self {
        let (tx, rx) = watch::channel(ModemStatus::Unknown);
        let refresher = StatusRefresher { modem, tx };
        let task = tokio::spawn(refresher.run(period));
        Self { rx, task }
    }

    /// Snapshot of the most recent status.
    pub fn latest(&self) -> ModemStatus {
        self.rx.borrow().clone()
    }

    /// Wait until the status differs from the last one seen through this
    /// handle. Returns `false` once the monitor has stopped.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Independent receiver for another consumer.
    pub fn subscribe(&self) -> watch::Receiver<ModemStatus> {
        self.rx.clone()
    }

    /// Halt the refresh loop. Receivers keep the last status they saw.
    pub fn stop(&self) {
        self.task.abort();
    }
}

struct StatusRefresher {
    modem: ModemClient,
    tx: watch::Sender<ModemStatus>,
}

impl StatusRefresher {
    async fn run(self, period: Duration) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if !self.refresh().await {
                break;
            }
        }
        tracing::debug!(
            interface = self.modem.interface(),
            "status monitor stopped: all receivers dropped"
        );
    }

    /// One fetch-and-publish cycle. Returns `false` once every receiver is
    /// gone.
    async fn refresh(&self) -> bool {
        if self.tx.is_closed() {
            return false;
        }

        let status = match self.modem.info().await {
            Ok(info) => ModemStatus::Ready(Box::new(info)),
            Err(e) if e.is_device_absent() => ModemStatus::Absent,
            Err(e) => {
                tracing::debug!(
                    interface = self.modem.interface(),
                    error = %e,
                    "status poll failed"
                );
                ModemStatus::Failed(e.to_string())
            }
        };

        // Watchers wake only when the status actually differs.
        self.tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
        true
    }
}

// =============================================================================
// SMS RETRY
// =============================================================================

/// Read stored SMS, retrying transient transport failures.
///
/// Makes at most `attempts` calls (a zero count still makes one), sleeping
/// `delay` between them. Daemon-reported errors are returned immediately.
///
/// # Errors
///
/// Returns the last [`RpcError`] once retries are exhausted, or the first
/// non-retryable one.
pub async fn fetch_sms_retrying(
    modem: &ModemClient,
    attempts: u32,
    delay: Duration,
) -> Result<SmsList, RpcError> {
    let mut attempt = 1;
    loop {
        match modem.read_sms().await {
            Ok(list) => return Ok(list),
            Err(e) if attempt < attempts && e.retryable() => {
                tracing::warn!(error = %e, attempt, "sms fetch failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
#[path = "monitor_test.rs"]
mod tests;
