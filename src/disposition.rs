//! Transfer disposition engine
//!
//! Decides what happens to an incoming payment:
//! - no session, or still choosing an asset: refund it, with a trace id
//!   derived from the triggering message so redeliveries cannot double-pay
//! - awaiting payment: forward it to the swap group with an order memo and a
//!   fresh trace id per attempt
//!
//! Nothing is issued when the amount cannot be parsed. Callers must hold the
//! user's session lock while a payment is decided.

use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::SwapBotError;
use crate::gateway::{AssetLookup, GroupSource};
use crate::models::{
    Disposition, Event, EventCategory, OutboundMessage, Payee, SessionState, SwapGroup, SwapOrder,
    TransferRequest, TransferView,
};
use crate::state::SessionStore;
use crate::swap;
use crate::trace::{random_trace_id, refund_trace_id};
use crate::Result;

pub const REFUND_MEMO: &str = "refund";

/// Floor on the swap output. Guards against worthless fills, not a price.
pub fn default_minimum_output() -> Decimal {
    Decimal::new(1, 8)
}

/// A payment as seen by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingPayment {
    pub user_id: String,
    pub conversation_id: String,
    pub message_id: String,
    pub asset_id: String,
    /// Raw amount as delivered; parsed by the engine
    pub amount: String,
}

impl IncomingPayment {
    pub fn from_event(event: &Event, view: &TransferView) -> Self {
        Self {
            user_id: event.user_id.clone(),
            conversation_id: event.conversation_id.clone(),
            message_id: event.message_id.clone(),
            asset_id: view.asset_id.clone(),
            amount: view.amount.clone(),
        }
    }
}

pub fn parse_amount(raw: &str) -> Result<Decimal> {
    let raw = raw.trim();
    let amount = Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map_err(|_| SwapBotError::MalformedAmount(raw.to_string()))?;

    if amount <= Decimal::ZERO {
        return Err(SwapBotError::MalformedAmount(raw.to_string()));
    }

    Ok(amount)
}

pub struct TransferDispositionEngine {
    sessions: Arc<dyn SessionStore>,
    assets: Arc<dyn AssetLookup>,
    groups: Arc<dyn GroupSource>,
    group: OnceCell<SwapGroup>,
    minimum_output: Decimal,
}

impl TransferDispositionEngine {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        assets: Arc<dyn AssetLookup>,
        groups: Arc<dyn GroupSource>,
        minimum_output: Decimal,
    ) -> Self {
        Self {
            sessions,
            assets,
            groups,
            group: OnceCell::new(),
            minimum_output,
        }
    }

    pub async fn handle_payment(&self, payment: &IncomingPayment) -> Result<Disposition> {
        let amount = parse_amount(&payment.amount)?;

        let session = self.sessions.get(&payment.user_id).await?;

        let Some(SessionState::AwaitingPayment { symbol, asset_id }) = session.map(|s| s.state)
        else {
            info!(
                user_id = %payment.user_id,
                message_id = %payment.message_id,
                "No asset chosen, refunding"
            );
            return Ok(self.refund(payment, amount));
        };

        match self.forward(payment, amount, &symbol, &asset_id).await {
            Err(e) if e.is_encoder_failure() => {
                warn!(
                    user_id = %payment.user_id,
                    message_id = %payment.message_id,
                    error = %e,
                    "Swap order could not be encoded, refunding"
                );
                Ok(self.refund(payment, amount))
            }
            other => other,
        }
    }

    fn refund(&self, payment: &IncomingPayment, amount: Decimal) -> Disposition {
        Disposition::Refund {
            transfer: TransferRequest {
                asset_id: payment.asset_id.clone(),
                amount,
                trace_id: refund_trace_id(&payment.message_id),
                memo: REFUND_MEMO.to_string(),
                payee: Payee::User {
                    user_id: payment.user_id.clone(),
                },
            },
        }
    }

    async fn forward(
        &self,
        payment: &IncomingPayment,
        amount: Decimal,
        symbol: &str,
        fill_asset_id: &str,
    ) -> Result<Disposition> {
        let receiver_id = Uuid::parse_str(&payment.user_id)?;
        let group = self
            .group
            .get_or_try_init(|| async { self.groups.read_group().await })
            .await?;

        let order_trace = random_trace_id();
        let memo = swap::encode(
            receiver_id,
            order_trace,
            fill_asset_id,
            "",
            self.minimum_output,
            &group.public_key,
        )?;

        let order = SwapOrder {
            receiver_id,
            pay_asset_id: payment.asset_id.clone(),
            fill_asset_id: fill_asset_id.to_string(),
            amount,
            route_hint: String::new(),
            minimum_output: self.minimum_output,
            trace_id: order_trace,
            memo: memo.clone(),
        };

        let incoming = match self.assets.lookup_asset(&payment.asset_id).await {
            Ok(asset) => asset.symbol,
            Err(e) => {
                warn!(asset_id = %payment.asset_id, error = %e, "Asset metadata unavailable");
                payment.asset_id.clone()
            }
        };

        let notice = OutboundMessage::reply(
            &payment.conversation_id,
            &payment.user_id,
            &payment.message_id,
            1,
            EventCategory::PlainText,
            format!(
                "{} -> {}, swapping at 4swap.\nPlease check @7000103537 for the swap result",
                incoming, symbol
            )
            .into_bytes(),
        );

        let transfer = TransferRequest {
            asset_id: payment.asset_id.clone(),
            amount,
            trace_id: random_trace_id(),
            memo,
            payee: Payee::Multisig {
                receivers: group.members.clone(),
                threshold: group.threshold,
            },
        };

        info!(
            user_id = %payment.user_id,
            pay_asset_id = %order.pay_asset_id,
            fill_asset_id = %order.fill_asset_id,
            amount = %amount,
            order_trace = %order.trace_id,
            "Forwarding payment to swap"
        );

        Ok(Disposition::ForwardToSwap {
            order,
            transfer,
            notice,
        })
    }
}
