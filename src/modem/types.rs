//! Typed payloads and domain enums for the daemon's RPC surface.
//!
//! Field names follow the daemon's JSON exactly. Every section is decoded
//! with defaults because daemon revisions differ in which sections they
//! report; enums keep an `Unknown` catch-all so a newer daemon never breaks
//! decoding.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

// =============================================================================
// STATUS PAYLOADS
// =============================================================================

/// Full `info` payload: everything the daemon knows about one modem.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ModemInfo {
    #[serde(default)]
    pub daemon: DaemonInfo,
    #[serde(default)]
    pub modem: ModemIdentity,
    #[serde(default)]
    pub network_status: NetworkStatus,
    #[serde(default)]
    pub operator: OperatorInfo,
    #[serde(default)]
    pub tech: TechInfo,
    #[serde(default)]
    pub levels: SignalLevels,
    #[serde(default)]
    pub sim: SimInfo,
    #[serde(default)]
    pub ipv4: IpInfo,
    #[serde(default)]
    pub ipv6: IpInfo,
}

/// `network_info` payload: the network-facing subset of [`ModemInfo`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NetworkInfo {
    #[serde(default)]
    pub network_status: NetworkStatus,
    #[serde(default)]
    pub operator: OperatorInfo,
    #[serde(default)]
    pub tech: TechInfo,
    #[serde(default)]
    pub levels: SignalLevels,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DaemonInfo {
    /// Daemon uptime in milliseconds.
    #[serde(default)]
    pub uptime: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ModemIdentity {
    #[serde(default)]
    pub vendor: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub imei: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NetworkStatus {
    #[serde(default)]
    pub id: i32,
    #[serde(default)]
    pub name: NetworkReg,
}

/// Network registration state, as the daemon names it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkReg {
    NotRegistered,
    Searching,
    Home,
    Roaming,
    #[default]
    #[serde(other)]
    Unknown,
}

impl NetworkReg {
    pub fn label(self) -> &'static str {
        match self {
            Self::NotRegistered => "Not registered",
            Self::Searching => "Searching network...",
            Self::Home => "Home network",
            Self::Roaming => "Roaming network",
            Self::Unknown => "Unknown",
        }
    }

    pub fn is_registered(self) -> bool {
        matches!(self, Self::Home | Self::Roaming)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OperatorInfo {
    /// MCC+MNC code; some daemon revisions report it as a number.
    #[serde(default, deserialize_with = "flex_string")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub registration: OperatorRegistration,
}

/// How the current operator was selected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatorRegistration {
    Auto,
    Manual,
    #[default]
    #[serde(other)]
    Unknown,
}

impl OperatorRegistration {
    pub fn is_manual(self) -> bool {
        matches!(self, Self::Manual)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TechInfo {
    #[serde(default = "TechInfo::unknown_id")]
    pub id: i32,
    #[serde(default)]
    pub name: String,
}

impl TechInfo {
    fn unknown_id() -> i32 {
        NetworkTech::Unknown.id()
    }

    pub fn tech(&self) -> NetworkTech {
        NetworkTech::from_id(self.id)
    }
}

impl Default for TechInfo {
    fn default() -> Self {
        Self { id: NetworkTech::Unknown.id(), name: String::new() }
    }
}

/// Radio access technology ids as the daemon numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkTech {
    Unknown,
    NoService,
    Gsm,
    Gprs,
    Edge,
    Umts,
    Hsdpa,
    Hsupa,
    Hspa,
    HspaPlus,
    Lte,
}

impl NetworkTech {
    pub fn from_id(id: i32) -> Self {
        match id {
            0 => Self::NoService,
            1 => Self::Gsm,
            2 => Self::Gprs,
            3 => Self::Edge,
            4 => Self::Umts,
            5 => Self::Hsdpa,
            6 => Self::Hsupa,
            7 => Self::Hspa,
            8 => Self::HspaPlus,
            9 => Self::Lte,
            _ => Self::Unknown,
        }
    }

    pub fn id(self) -> i32 {
        match self {
            Self::Unknown => -1,
            Self::NoService => 0,
            Self::Gsm => 1,
            Self::Gprs => 2,
            Self::Edge => 3,
            Self::Umts => 4,
            Self::Hsdpa => 5,
            Self::Hsupa => 6,
            Self::Hspa => 7,
            Self::HspaPlus => 8,
            Self::Lte => 9,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::NoService => "No service",
            Self::Gsm => "GSM",
            Self::Gprs => "2G (GPRS)",
            Self::Edge => "2G (EDGE)",
            Self::Umts => "3G (UMTS)",
            Self::Hsdpa => "3G (HSDPA)",
            Self::Hsupa => "3G (HSUPA)",
            Self::Hspa => "3G (HSPA)",
            Self::HspaPlus => "3G (HSPA+)",
            Self::Lte => "4G (LTE)",
        }
    }

    pub fn generation(self) -> Generation {
        match self {
            Self::Gsm | Self::Gprs | Self::Edge => Generation::Gsm2g,
            Self::Umts | Self::Hsdpa | Self::Hsupa | Self::Hspa | Self::HspaPlus => {
                Generation::Umts3g
            }
            Self::Lte => Generation::Lte4g,
            Self::Unknown | Self::NoService => Generation::Unknown,
        }
    }
}

/// Coarse technology generation, for icons and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    Gsm2g,
    Umts3g,
    Lte4g,
    Unknown,
}

impl Generation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gsm2g => "2g",
            Self::Umts3g => "3g",
            Self::Lte4g => "4g",
            Self::Unknown => "unknown",
        }
    }
}

/// Signal measurements. The daemon reports null for metrics the current
/// radio mode does not expose.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SignalLevels {
    #[serde(default)]
    pub rssi_dbm: Option<f64>,
    /// Signal quality in percent, derived by the daemon from rssi.
    #[serde(default)]
    pub quality: Option<f64>,
    #[serde(default)]
    pub rscp_dbm: Option<f64>,
    #[serde(default, alias = "eclo_db")]
    pub ecio_db: Option<f64>,
    #[serde(default)]
    pub rsrq_db: Option<f64>,
    #[serde(default)]
    pub rsrp_dbm: Option<f64>,
    #[serde(default)]
    pub bit_err_pct: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimInfo {
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub imsi: Option<String>,
    #[serde(default)]
    pub state: SimState,
}

/// SIM card state tokens as the daemon reports them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum SimState {
    #[serde(rename = "READY")]
    Ready,
    #[serde(rename = "PIN1_LOCK")]
    Pin1Lock,
    #[serde(rename = "PIN2_LOCK")]
    Pin2Lock,
    #[serde(rename = "PUK1_LOCK")]
    Puk1Lock,
    #[serde(rename = "PUK2_LOCK")]
    Puk2Lock,
    #[serde(rename = "MEP_LOCK")]
    MepLock,
    #[serde(rename = "OTHER_LOCK")]
    OtherLock,
    #[serde(rename = "ERROR")]
    Error,
    #[serde(rename = "REMOVED")]
    Removed,
    #[default]
    #[serde(other)]
    Unknown,
}

impl SimState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Ready => "Ready",
            Self::Pin1Lock => "PIN1 locked",
            Self::Pin2Lock => "PIN2 locked",
            Self::Puk1Lock => "PUK1 locked",
            Self::Puk2Lock => "PUK2 locked",
            Self::MepLock => "MEP locked",
            Self::OtherLock => "Locked",
            Self::Error => "SIM failure",
            Self::Removed => "SIM removed",
            Self::Unknown => "Unknown",
        }
    }

    /// True for states that make the SIM unusable until the user intervenes.
    pub fn is_error(self) -> bool {
        matches!(
            self,
            Self::Pin1Lock
                | Self::Pin2Lock
                | Self::Puk1Lock
                | Self::Puk2Lock
                | Self::MepLock
                | Self::OtherLock
                | Self::Error
                | Self::Removed
        )
    }
}

/// Addresses for one IP family. Empty strings mean unconfigured.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct IpInfo {
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub mask: String,
    #[serde(default)]
    pub gw: String,
    #[serde(default)]
    pub dns1: String,
    #[serde(default)]
    pub dns2: String,
}

impl IpInfo {
    pub fn is_configured(&self) -> bool {
        !self.ip.is_empty()
    }
}

// =============================================================================
// COMMANDS AND USSD
// =============================================================================

/// Reply to a raw AT command.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CommandReply {
    /// Absent on daemon revisions that report failures via the error field.
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub response: String,
}

/// USSD session outcome codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UssdCode {
    Done,
    WaitReply,
    Canceled,
    Unknown,
}

impl UssdCode {
    pub fn from_id(id: i64) -> Self {
        match id {
            0 => Self::Done,
            1 => Self::WaitReply,
            2 => Self::Canceled,
            _ => Self::Unknown,
        }
    }
}

/// Reply to `send_ussd`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UssdReply {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub response: String,
}

impl UssdReply {
    pub fn code(&self) -> UssdCode {
        UssdCode::from_id(self.code)
    }

    /// The network keeps the session open and expects an answer.
    pub fn wants_reply(&self) -> bool {
        self.code() == UssdCode::WaitReply
    }

    /// The network closed the session without any text.
    pub fn discarded(&self) -> bool {
        self.code() == UssdCode::Canceled && self.response.is_empty()
    }
}

// =============================================================================
// SMS
// =============================================================================

/// Which memory the daemon stores messages in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum SmsStorage {
    #[serde(rename = "MT")]
    Mt,
    #[serde(rename = "ME")]
    Me,
    #[serde(rename = "SM")]
    Sm,
    #[default]
    #[serde(other)]
    Unknown,
}

impl SmsStorage {
    pub fn label(self) -> &'static str {
        match self {
            Self::Sm => "SIM",
            Self::Me => "Modem",
            Self::Mt => "Modem + SIM",
            Self::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct SmsCapacity {
    #[serde(default)]
    pub used: u32,
    #[serde(default)]
    pub total: u32,
}

/// Message kind, numbered as the daemon's database stores it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SmsType {
    #[default]
    Incoming,
    Outgoing,
    Draft,
    Unknown,
}

impl SmsType {
    pub fn from_id(id: i64) -> Self {
        match id {
            0 => Self::Incoming,
            1 => Self::Outgoing,
            2 => Self::Draft,
            _ => Self::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Incoming => "incoming",
            Self::Outgoing => "outgoing",
            Self::Draft => "draft",
            Self::Unknown => "unknown",
        }
    }
}

/// One part of a (possibly multipart) message, addressed by its storage
/// index.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SmsPart {
    #[serde(default = "SmsPart::missing_id")]
    pub id: i64,
    #[serde(default)]
    pub text: String,
}

impl SmsPart {
    fn missing_id() -> i64 {
        -1
    }
}

/// One message as the daemon's database reports it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SmsMessage {
    /// Database id, the handle `delete_sms` takes.
    #[serde(default)]
    pub id: i64,
    #[serde(default, rename = "type", deserialize_with = "de_sms_type")]
    pub kind: SmsType,
    #[serde(default)]
    pub invalid: bool,
    #[serde(default)]
    pub unread: bool,
    /// Unix timestamp of receipt or submission.
    #[serde(default)]
    pub time: i64,
    /// Peer address: sender or recipient number.
    #[serde(default)]
    pub addr: String,
    #[serde(default)]
    pub parts: Vec<SmsPart>,
}

impl SmsMessage {
    /// Message text joined across parts, in part order.
    pub fn text(&self) -> String {
        self.parts.iter().map(|p| p.text.as_str()).collect()
    }
}

/// Reply to `read_sms`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SmsList {
    #[serde(default)]
    pub storage: SmsStorage,
    #[serde(default)]
    pub capacity: SmsCapacity,
    #[serde(default)]
    pub messages: Vec<SmsMessage>,
}

// =============================================================================
// OPERATOR SEARCH
// =============================================================================

/// Result of a network scan.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OperatorSearchResult {
    #[serde(default)]
    pub searching: bool,
    #[serde(default)]
    pub list: Vec<Operator>,
}

/// One network found by a scan.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Operator {
    #[serde(default, deserialize_with = "flex_string")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: OperatorStatus,
    #[serde(default)]
    pub tech: TechInfo,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatorStatus {
    Available,
    Registered,
    Forbidden,
    #[default]
    #[serde(other)]
    Unknown,
}

impl OperatorStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::Registered => "Registered",
            Self::Forbidden => "Forbidden",
            Self::Unknown => "Unknown",
        }
    }
}

// =============================================================================
// SETTINGS
// =============================================================================

/// Reply to `get_settings`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ModemSettings {
    #[serde(default)]
    pub network_modes: Vec<NetworkModeOption>,
    #[serde(default)]
    pub network_mode: Option<i64>,
    #[serde(default)]
    pub allow_roaming: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NetworkModeOption {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

// =============================================================================
// DISCOVERY
// =============================================================================

/// One row of `network.interface dump`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NetInterface {
    #[serde(default)]
    pub interface: String,
    #[serde(default)]
    pub proto: String,
    #[serde(default)]
    pub up: bool,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub l3_device: Option<String>,
}

// =============================================================================
// DESERIALIZE HELPERS
// =============================================================================

/// Accept a string or a number, normalizing to a string.
fn flex_string<'de, D>(de: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(de)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn de_sms_type<'de, D>(de: D) -> Result<SmsType, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(SmsType::from_id(i64::deserialize(de)?))
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
