//! Conversation state machine
//!
//! Drives the two-step "choose an asset, then pay" workflow from text events:
//!
//! ```text
//! any             --"cancel"-->  Init             (prompt)
//! NoSession       --text------>  Init             (prompt)
//! Init            --symbol---->  AwaitingPayment  (price hint + swap button)
//! Init            --unknown--->  Init             (error reply)
//! AwaitingPayment --text------>  AwaitingPayment  (reminder)
//! ```
//!
//! Callers must hold the user's session lock while a transition runs.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::directory::{normalize_symbol, AssetDirectory};
use crate::error::SwapBotError;
use crate::gateway::AssetLookup;
use crate::models::{Event, EventCategory, OutboundMessage, SessionState, UserSession};
use crate::state::SessionStore;
use crate::Result;

pub const CANCEL_KEYWORD: &str = "CANCEL";

pub const SYMBOL_PROMPT: &str = "Hi, which crypto do you want? Please reply the symbol (BTC, ETH, etc)";
const BUTTON_COLOR: &str = "#00BBFF";

/// Builds replies to one inbound event with step-derived message ids, so a
/// redelivered event yields the same outbound ids.
pub struct ReplyBuilder<'a> {
    event: &'a Event,
    messages: Vec<OutboundMessage>,
}

impl<'a> ReplyBuilder<'a> {
    pub fn new(event: &'a Event) -> Self {
        Self {
            event,
            messages: Vec::new(),
        }
    }

    pub fn push(&mut self, category: EventCategory, data: Vec<u8>) -> &mut Self {
        let step = self.messages.len() as u32 + 1;
        self.messages.push(OutboundMessage::reply(
            &self.event.conversation_id,
            &self.event.user_id,
            &self.event.message_id,
            step,
            category,
            data,
        ));
        self
    }

    pub fn text(&mut self, text: impl Into<String>) -> &mut Self {
        self.push(EventCategory::PlainText, text.into().into_bytes())
    }

    pub fn finish(self) -> Vec<OutboundMessage> {
        self.messages
    }
}

#[derive(Debug, Serialize)]
struct AppButton {
    label: String,
    color: &'static str,
    action: String,
}

pub fn is_cancel(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case(CANCEL_KEYWORD)
}

pub struct ConversationStateMachine {
    bot_id: Uuid,
    directory: Arc<AssetDirectory>,
    assets: Arc<dyn AssetLookup>,
    sessions: Arc<dyn SessionStore>,
}

impl ConversationStateMachine {
    pub fn new(
        bot_id: Uuid,
        directory: Arc<AssetDirectory>,
        assets: Arc<dyn AssetLookup>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            bot_id,
            directory,
            assets,
            sessions,
        }
    }

    /// Apply a text event to the sender's session and compose the replies.
    ///
    /// An unknown symbol is not an error for the caller: it becomes an error
    /// reply and the session is left untouched.
    pub async fn handle_text(&self, event: &Event) -> Result<Vec<OutboundMessage>> {
        let text = event.text()?;

        if is_cancel(&text) {
            debug!(user_id = %event.user_id, "Cancel requested");
            return self.reset(event).await;
        }

        let session = self.sessions.get(&event.user_id).await?;

        match session.map(|s| s.state) {
            None => self.reset(event).await,
            Some(SessionState::Init) => match self.choose_asset(event, &text).await {
                Err(e @ SwapBotError::UnknownAsset(_)) => {
                    info!(user_id = %event.user_id, error = %e, "Symbol not supported");
                    Ok(error_reply(event, &e))
                }
                other => other,
            },
            Some(SessionState::AwaitingPayment { symbol, .. }) => Ok(reminder(event, &symbol)),
        }
    }

    /// Put the user back to `Init` and ask for a symbol.
    pub async fn reset(&self, event: &Event) -> Result<Vec<OutboundMessage>> {
        self.sessions.set(UserSession::init(&event.user_id)).await?;

        let mut replies = ReplyBuilder::new(event);
        replies.text(SYMBOL_PROMPT);
        Ok(replies.finish())
    }

    async fn choose_asset(&self, event: &Event, text: &str) -> Result<Vec<OutboundMessage>> {
        let symbol = normalize_symbol(text);
        let asset_id = self
            .directory
            .resolve(&symbol)
            .ok_or_else(|| SwapBotError::UnknownAsset(symbol.clone()))?
            .to_string();

        let hint = match self.assets.lookup_asset(&asset_id).await {
            Ok(asset) => format!(
                "The price of {} ({}) is ${}, tap the \"swap\" link to continue.",
                symbol, asset.name, asset.price_usd
            ),
            Err(e) => {
                warn!(asset_id = %asset_id, error = %e, "Asset metadata unavailable");
                format!("You chose {}, tap the \"swap\" link to continue.", symbol)
            }
        };

        let buttons = serde_json::to_vec(&[AppButton {
            label: format!("Swap to {}", symbol),
            color: BUTTON_COLOR,
            action: format!("mixin://transfer/{}", self.bot_id),
        }])?;

        self.sessions
            .set(UserSession::awaiting_payment(&event.user_id, &symbol, &asset_id))
            .await?;

        info!(user_id = %event.user_id, symbol = %symbol, asset_id = %asset_id, "Awaiting payment");

        let mut replies = ReplyBuilder::new(event);
        replies.text(hint);
        replies.push(EventCategory::AppButtonGroup, buttons);
        Ok(replies.finish())
    }
}

fn reminder(event: &Event, symbol: &str) -> Vec<OutboundMessage> {
    let text = format!(
        "You choose to swap for {}, please transfer any crypto to the bot.\n\
         If you already transfered, please wait for a moment. It may cost time to swap.\n\
         If you want to cancel the swapping, please reply \"cancel\".",
        symbol
    );

    let mut replies = ReplyBuilder::new(event);
    replies.text(text);
    replies.finish()
}

fn error_reply(event: &Event, error: &SwapBotError) -> Vec<OutboundMessage> {
    let mut replies = ReplyBuilder::new(event);
    replies.text(error.to_string());
    replies.finish()
}
