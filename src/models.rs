//! Core data models for the swap bot

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::Result;

//
// ================= Events =================
//

/// Category of a message travelling over the bus.
///
/// Closed set of the categories the bot acts on; anything else is kept
/// verbatim in `Other` so it can still be logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventCategory {
    PlainText,
    SystemAccountSnapshot,
    AppButtonGroup,
    Other(String),
}

impl EventCategory {
    pub fn as_str(&self) -> &str {
        match self {
            EventCategory::PlainText => "PLAIN_TEXT",
            EventCategory::SystemAccountSnapshot => "SYSTEM_ACCOUNT_SNAPSHOT",
            EventCategory::AppButtonGroup => "APP_BUTTON_GROUP",
            EventCategory::Other(s) => s,
        }
    }
}

impl From<String> for EventCategory {
    fn from(s: String) -> Self {
        match s.as_str() {
            "PLAIN_TEXT" => EventCategory::PlainText,
            "SYSTEM_ACCOUNT_SNAPSHOT" => EventCategory::SystemAccountSnapshot,
            "APP_BUTTON_GROUP" => EventCategory::AppButtonGroup,
            _ => EventCategory::Other(s),
        }
    }
}

impl From<EventCategory> for String {
    fn from(c: EventCategory) -> Self {
        c.as_str().to_string()
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inbound event as delivered by the message bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub category: EventCategory,
    pub user_id: String,
    pub conversation_id: String,
    pub message_id: String,
    /// Base64 payload
    #[serde(default)]
    pub data: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Well-formed user id, or `None` when the id is unparsable or nil.
    pub fn user_uuid(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.user_id).ok().filter(|id| !id.is_nil())
    }

    pub fn decode_data(&self) -> Result<Vec<u8>> {
        Ok(STANDARD.decode(self.data.as_bytes())?)
    }

    /// Text payload. Invalid UTF-8 is replaced rather than rejected, so any
    /// bytes still count as text input.
    pub fn text(&self) -> Result<String> {
        let bytes = self.decode_data()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn transfer_view(&self) -> Result<TransferView> {
        let bytes = self.decode_data()?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Payload of a `SYSTEM_ACCOUNT_SNAPSHOT` event.
///
/// `amount` stays a string: an unparsable amount must surface as
/// `MalformedAmount`, not as a decode failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferView {
    pub asset_id: String,
    pub amount: String,
    #[serde(default)]
    pub snapshot_id: Option<String>,
    #[serde(default)]
    pub opponent_id: Option<String>,
    #[serde(default)]
    pub trace_id: Option<String>,
    #[serde(default)]
    pub memo: Option<String>,
}

/// A reply the bot sends back over the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub conversation_id: String,
    pub recipient_id: String,
    /// Idempotency key, derived from the triggering event
    pub message_id: Uuid,
    pub category: EventCategory,
    pub data: Vec<u8>,
}

impl OutboundMessage {
    /// The `step`-th reply to a source message, keyed for idempotent sends.
    pub fn reply(
        conversation_id: &str,
        recipient_id: &str,
        source_message_id: &str,
        step: u32,
        category: EventCategory,
        data: Vec<u8>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
            recipient_id: recipient_id.to_string(),
            message_id: crate::trace::reply_id(source_message_id, step),
            category,
            data,
        }
    }

    pub fn payload_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }

    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }
}

//
// ================= Sessions =================
//

/// Progress of one user through the choose-then-pay workflow.
///
/// The chosen symbol and asset only exist while awaiting payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Init,
    AwaitingPayment { symbol: String, asset_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    pub user_id: String,
    #[serde(flatten)]
    pub state: SessionState,
}

impl UserSession {
    pub fn init(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            state: SessionState::Init,
        }
    }

    pub fn awaiting_payment(
        user_id: impl Into<String>,
        symbol: impl Into<String>,
        asset_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            state: SessionState::AwaitingPayment {
                symbol: symbol.into(),
                asset_id: asset_id.into(),
            },
        }
    }

    pub fn is_awaiting_payment(&self) -> bool {
        matches!(self.state, SessionState::AwaitingPayment { .. })
    }
}

//
// ================= Assets =================
//

/// Descriptive metadata for an asset (best-effort enrichment).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetInfo {
    pub asset_id: String,
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub price_usd: String,
}

/// Routing group of the swap service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapGroup {
    pub members: Vec<String>,
    pub threshold: u8,
    /// Base64 encoded Ed25519 public key
    pub public_key: String,
}

//
// ================= Transfers =================
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payee {
    User { user_id: String },
    Multisig { receivers: Vec<String>, threshold: u8 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub asset_id: String,
    pub amount: Decimal,
    pub trace_id: Uuid,
    pub memo: String,
    pub payee: Payee,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub snapshot_id: String,
    pub trace_id: Uuid,
}

/// One-shot swap request, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapOrder {
    pub receiver_id: Uuid,
    pub pay_asset_id: String,
    pub fill_asset_id: String,
    pub amount: Decimal,
    /// Empty lets the swap engine pick the route
    pub route_hint: String,
    pub minimum_output: Decimal,
    pub trace_id: Uuid,
    pub memo: String,
}

/// Outcome decided for an incoming payment.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    Refund {
        transfer: TransferRequest,
    },
    ForwardToSwap {
        order: SwapOrder,
        transfer: TransferRequest,
        notice: OutboundMessage,
    },
}

impl Disposition {
    pub fn transfer(&self) -> &TransferRequest {
        match self {
            Disposition::Refund { transfer } => transfer,
            Disposition::ForwardToSwap { transfer, .. } => transfer,
        }
    }

    pub fn is_refund(&self) -> bool {
        matches!(self, Disposition::Refund { .. })
    }
}
