//! Swap Bot
//!
//! A chat bot that sells swaps over a message bus:
//! - Users pick an asset by symbol, then pay the bot with any asset
//! - Payments are forwarded to the swap service's multisig group with an
//!   encoded order memo, or refunded when no asset was chosen
//! - Sessions live in memory and expire ten minutes after the last write
//! - Replies and refunds carry ids derived from the triggering message, so
//!   redelivered events cannot double-send or double-pay
//!
//! EVENT → CLASSIFY → (TEXT → STATE MACHINE | PAYMENT → DISPOSITION) → SEND

pub mod agent;
pub mod api;
pub mod audit;
pub mod classifier;
pub mod config;
pub mod conversational;
pub mod directory;
pub mod disposition;
pub mod error;
pub mod gateway;
pub mod models;
pub mod state;
pub mod swap;
pub mod trace;

#[cfg(test)]
mod proptests;

pub use error::Result;

// Re-export common types
pub use agent::{AgentSettings, Collaborators, EventOutcome, SwapAgent};
pub use classifier::{Classification, EventClassifier, EventKind};
pub use config::Config;
pub use error::SwapBotError;
pub use models::*;
