#![allow(dead_code)]

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use ed25519_dalek::SigningKey;
use std::sync::Arc;
use std::time::Duration;
use swapbot::{
    agent::{AgentSettings, Collaborators, SwapAgent},
    audit::InterventionLog,
    directory::AssetDirectory,
    disposition::default_minimum_output,
    gateway::{LocalTransport, StaticAssetLookup, StaticGroupSource},
    models::{AssetInfo, Event, EventCategory, SwapGroup},
    state::InMemorySessionStore,
};
use uuid::Uuid;

pub fn group_secret() -> SigningKey {
    SigningKey::from_bytes(&[42u8; 32])
}

pub fn group_key() -> String {
    STANDARD.encode(group_secret().verifying_key().as_bytes())
}

pub struct World {
    pub agent: Arc<SwapAgent>,
    pub sessions: Arc<InMemorySessionStore>,
    pub transport: LocalTransport,
    pub interventions: Arc<InterventionLog>,
    pub bot_id: Uuid,
}

/// BTC is `A1`, XIN is `B2`. Only BTC has metadata.
pub fn world(ttl: Duration) -> World {
    let bot_id = Uuid::new_v4();
    let sessions = Arc::new(InMemorySessionStore::with_ttl(ttl));
    let transport = LocalTransport::new();
    let interventions = Arc::new(InterventionLog::new());
    let directory: AssetDirectory = [("BTC", "A1"), ("XIN", "B2")].into_iter().collect();

    let agent = SwapAgent::new(
        Arc::new(directory),
        sessions.clone(),
        interventions.clone(),
        Collaborators {
            messenger: Arc::new(transport.clone()),
            wallet: Arc::new(transport.clone()),
            assets: Arc::new(StaticAssetLookup::new(vec![AssetInfo {
                asset_id: "A1".to_string(),
                symbol: "BTC".to_string(),
                name: "Bitcoin".to_string(),
                price_usd: "61000".to_string(),
            }])),
            groups: Arc::new(StaticGroupSource::new(SwapGroup {
                members: vec!["m1".to_string(), "m2".to_string(), "m3".to_string()],
                threshold: 2,
                public_key: group_key(),
            })),
        },
        AgentSettings {
            bot_id,
            minimum_output: default_minimum_output(),
            max_in_flight: 1,
        },
    );

    World {
        agent: Arc::new(agent),
        sessions,
        transport,
        interventions,
        bot_id,
    }
}

pub fn text_event(user: Uuid, body: &str) -> Event {
    Event {
        category: EventCategory::PlainText,
        user_id: user.to_string(),
        conversation_id: format!("conv-{}", user),
        message_id: Uuid::new_v4().to_string(),
        data: STANDARD.encode(body),
        created_at: Utc::now(),
    }
}

pub fn payment_event(user: Uuid, asset_id: &str, amount: &str) -> Event {
    let payload = serde_json::json!({
        "asset_id": asset_id,
        "amount": amount,
        "snapshot_id": Uuid::new_v4().to_string(),
    });
    Event {
        category: EventCategory::SystemAccountSnapshot,
        data: STANDARD.encode(payload.to_string()),
        ..text_event(user, "")
    }
}
