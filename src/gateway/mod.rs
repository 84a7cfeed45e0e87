//! Collaborator traits and in-process implementations
//!
//! The bot's decision logic only talks to the outside world through these
//! traits: the message bus (events in, messages out), the wallet (transfers),
//! asset metadata and the swap service's routing group. Network-backed
//! implementations live in submodules.

use crate::directory::CatalogAsset;
use crate::error::SwapBotError;
use crate::models::{AssetInfo, Event, OutboundMessage, SwapGroup, TransferReceipt, TransferRequest};
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::sync::{mpsc, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

pub mod fswap;
pub use fswap::FswapClient;

/// Source of inbound events (blocking receive). `None` means the stream ended.
#[async_trait]
pub trait EventSource: Send {
    async fn next_event(&mut self) -> Result<Option<Event>>;
}

#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_message(&self, message: &OutboundMessage) -> Result<()>;
}

#[async_trait]
pub trait Wallet: Send + Sync {
    async fn transfer(&self, request: &TransferRequest) -> Result<TransferReceipt>;
}

/// Best-effort asset metadata
#[async_trait]
pub trait AssetLookup: Send + Sync {
    async fn lookup_asset(&self, asset_id: &str) -> Result<AssetInfo>;
}

#[async_trait]
pub trait GroupSource: Send + Sync {
    async fn read_group(&self) -> Result<SwapGroup>;
}

// =============================
// Event sources
// =============================

/// Events pushed through a tokio channel
pub struct ChannelEventSource {
    receiver: mpsc::Receiver<Event>,
}

pub fn event_channel(buffer: usize) -> (mpsc::Sender<Event>, ChannelEventSource) {
    let (sender, receiver) = mpsc::channel(buffer);
    (sender, ChannelEventSource { receiver })
}

#[async_trait]
impl EventSource for ChannelEventSource {
    async fn next_event(&mut self) -> Result<Option<Event>> {
        Ok(self.receiver.recv().await)
    }
}

/// One JSON event per line. Blank and unparsable lines are skipped.
pub struct NdjsonEventSource<R> {
    lines: Lines<R>,
}

impl<R: AsyncBufRead + Unpin + Send> NdjsonEventSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> EventSource for NdjsonEventSource<R> {
    async fn next_event(&mut self) -> Result<Option<Event>> {
        while let Some(line) = self.lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<Event>(line) {
                Ok(event) => return Ok(Some(event)),
                Err(e) => warn!(error = %e, "Skipping unparsable event line"),
            }
        }

        Ok(None)
    }
}

// =============================
// Transport
// =============================

/// In-process transport: logs and records every send instead of hitting a
/// network. Failures can be switched on to exercise error paths.
#[derive(Clone, Default)]
pub struct LocalTransport {
    messages: Arc<RwLock<Vec<OutboundMessage>>>,
    transfers: Arc<RwLock<Vec<TransferRequest>>>,
    fail_messages: Arc<AtomicBool>,
    fail_transfers: Arc<AtomicBool>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_messages(&self, fail: bool) {
        self.fail_messages.store(fail, Ordering::SeqCst);
    }

    pub fn fail_transfers(&self, fail: bool) {
        self.fail_transfers.store(fail, Ordering::SeqCst);
    }

    pub async fn sent_messages(&self) -> Vec<OutboundMessage> {
        self.messages.read().await.clone()
    }

    pub async fn transfers(&self) -> Vec<TransferRequest> {
        self.transfers.read().await.clone()
    }
}

#[async_trait]
impl MessageSender for LocalTransport {
    async fn send_message(&self, message: &OutboundMessage) -> Result<()> {
        if self.fail_messages.load(Ordering::SeqCst) {
            return Err(SwapBotError::TransportFailure("message send refused".to_string()));
        }

        info!(
            message_id = %message.message_id,
            recipient_id = %message.recipient_id,
            category = %message.category,
            data = %String::from_utf8_lossy(&message.data),
            "Message sent"
        );

        self.messages.write().await.push(message.clone());
        Ok(())
    }
}

#[async_trait]
impl Wallet for LocalTransport {
    async fn transfer(&self, request: &TransferRequest) -> Result<TransferReceipt> {
        if self.fail_transfers.load(Ordering::SeqCst) {
            return Err(SwapBotError::TransportFailure("transfer refused".to_string()));
        }

        info!(
            asset_id = %request.asset_id,
            amount = %request.amount,
            trace_id = %request.trace_id,
            payee = ?request.payee,
            "Transfer submitted"
        );

        self.transfers.write().await.push(request.clone());
        Ok(TransferReceipt {
            snapshot_id: Uuid::new_v4().to_string(),
            trace_id: request.trace_id,
        })
    }
}

// =============================
// Static lookups
// =============================

/// Asset metadata served from a fixed table (e.g. the startup catalog)
#[derive(Debug, Clone, Default)]
pub struct StaticAssetLookup {
    assets: HashMap<String, AssetInfo>,
}

impl StaticAssetLookup {
    pub fn new(assets: impl IntoIterator<Item = AssetInfo>) -> Self {
        Self {
            assets: assets
                .into_iter()
                .map(|asset| (asset.asset_id.clone(), asset))
                .collect(),
        }
    }

    pub fn from_catalog(catalog: &[CatalogAsset]) -> Self {
        Self::new(catalog.iter().map(|asset| AssetInfo {
            asset_id: asset.id.clone(),
            symbol: asset.symbol.clone(),
            name: asset.name.clone(),
            price_usd: asset.price.clone().unwrap_or_default(),
        }))
    }
}

#[async_trait]
impl AssetLookup for StaticAssetLookup {
    async fn lookup_asset(&self, asset_id: &str) -> Result<AssetInfo> {
        self.assets
            .get(asset_id)
            .cloned()
            .ok_or_else(|| SwapBotError::TransportFailure(format!("asset {} not found", asset_id)))
    }
}

/// A routing group fixed at construction
#[derive(Debug, Clone)]
pub struct StaticGroupSource {
    group: SwapGroup,
}

impl StaticGroupSource {
    pub fn new(group: SwapGroup) -> Self {
        Self { group }
    }
}

#[async_trait]
impl GroupSource for StaticGroupSource {
    async fn read_group(&self) -> Result<SwapGroup> {
        Ok(self.group.clone())
    }
}
