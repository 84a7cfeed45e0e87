//! Event Classifier
//!
//! Routes an inbound event to one of three handling paths:
//! - Payment: a ledger notification sent by someone other than the bot
//! - Text: a plain text message
//! - Other: everything else (resets the conversation)
//!
//! Events without a well-formed user id, and the bot's own transfers echoed
//! back, are ignored before any handler runs.

use crate::models::{Event, EventCategory};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Payment,
    Text,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    MalformedUserId,
    OwnTransfer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Handle(EventKind),
    Ignore(IgnoreReason),
}

/// Event classifier bound to the bot's own account id
#[derive(Debug, Clone)]
pub struct EventClassifier {
    bot_id: Uuid,
}

impl EventClassifier {
    pub fn new(bot_id: Uuid) -> Self {
        Self { bot_id }
    }

    pub fn bot_id(&self) -> Uuid {
        self.bot_id
    }

    pub fn classify(&self, event: &Event) -> Classification {
        let Some(user_id) = event.user_uuid() else {
            return Classification::Ignore(IgnoreReason::MalformedUserId);
        };

        match event.category {
            EventCategory::SystemAccountSnapshot if user_id == self.bot_id => {
                Classification::Ignore(IgnoreReason::OwnTransfer)
            }
            EventCategory::SystemAccountSnapshot => Classification::Handle(EventKind::Payment),
            EventCategory::PlainText => Classification::Handle(EventKind::Text),
            _ => Classification::Handle(EventKind::Other),
        }
    }
}
