//! Property-based tests for the conversation and disposition engines

use proptest::prelude::*;
use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

use crate::conversational::{ConversationStateMachine, SYMBOL_PROMPT};
use crate::directory::AssetDirectory;
use crate::disposition::{default_minimum_output, IncomingPayment, TransferDispositionEngine, REFUND_MEMO};
use crate::gateway::{StaticAssetLookup, StaticGroupSource};
use crate::models::{Disposition, Event, EventCategory, Payee, SessionState, SwapGroup, UserSession};
use crate::state::{InMemorySessionStore, SessionStore};
use crate::swap;
use crate::swap::tests::{group_key, group_secret};
use crate::trace::refund_trace_id;

// ============================================================================
// Test Helpers
// ============================================================================

const KNOWN: [(&str, &str); 2] = [("BTC", "A1"), ("ETH", "A2")];

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

fn machine(sessions: Arc<InMemorySessionStore>) -> ConversationStateMachine {
    let directory: AssetDirectory = KNOWN.into_iter().collect();
    ConversationStateMachine::new(
        Uuid::new_v4(),
        Arc::new(directory),
        Arc::new(StaticAssetLookup::new(vec![])),
        sessions,
    )
}

fn engine(sessions: Arc<InMemorySessionStore>) -> TransferDispositionEngine {
    let group = SwapGroup {
        members: vec!["m1".to_string(), "m2".to_string(), "m3".to_string()],
        threshold: 2,
        public_key: group_key(11),
    };
    TransferDispositionEngine::new(
        sessions,
        Arc::new(StaticAssetLookup::new(vec![])),
        Arc::new(StaticGroupSource::new(group)),
        default_minimum_output(),
    )
}

fn text_event(user_id: &str, text: &str) -> Event {
    use base64::Engine as _;

    Event {
        category: EventCategory::PlainText,
        user_id: user_id.to_string(),
        conversation_id: Uuid::new_v4().to_string(),
        message_id: Uuid::new_v4().to_string(),
        data: base64::engine::general_purpose::STANDARD.encode(text),
        created_at: chrono::Utc::now(),
    }
}

fn payment(user_id: &str, asset_id: &str, amount: &str) -> IncomingPayment {
    IncomingPayment {
        user_id: user_id.to_string(),
        conversation_id: Uuid::new_v4().to_string(),
        message_id: Uuid::new_v4().to_string(),
        asset_id: asset_id.to_string(),
        amount: amount.to_string(),
    }
}

fn is_reserved(text: &str) -> bool {
    let upper = text.trim().to_uppercase();
    upper == "CANCEL" || KNOWN.iter().any(|(symbol, _)| *symbol == upper)
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

/// `word` with each letter's case picked independently
fn arb_any_case(word: &'static str) -> impl Strategy<Value = String> {
    proptest::collection::vec(any::<bool>(), word.len()).prop_map(move |upper| {
        word.chars()
            .zip(upper)
            .map(|(c, up)| if up { c.to_ascii_uppercase() } else { c.to_ascii_lowercase() })
            .collect()
    })
}

fn arb_padding() -> impl Strategy<Value = String> {
    "[ \t]{0,3}"
}

fn arb_unknown_symbol() -> impl Strategy<Value = String> {
    "[A-Za-z0-9]{1,8}".prop_filter("symbol must not be listed", |s| !is_reserved(s))
}

fn arb_known_symbol() -> impl Strategy<Value = (String, &'static str)> {
    prop_oneof![
        arb_any_case("btc").prop_map(|s| (s, "A1")),
        arb_any_case("eth").prop_map(|s| (s, "A2")),
    ]
}

fn arb_prior_session() -> impl Strategy<Value = Option<SessionState>> {
    prop_oneof![
        Just(None),
        Just(Some(SessionState::Init)),
        Just(Some(SessionState::AwaitingPayment {
            symbol: "BTC".to_string(),
            asset_id: "A1".to_string(),
        })),
    ]
}

/// Positive amounts with up to eight decimal places
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000_000, 0u32..=8).prop_map(|(mantissa, scale)| Decimal::new(mantissa, scale))
}

fn arb_asset_id() -> impl Strategy<Value = String> {
    "[a-f0-9]{8}"
}

// ============================================================================
// Conversation
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_text_without_session_only_prompts(text in ".{0,40}") {
        let sessions = Arc::new(InMemorySessionStore::new());
        let machine = machine(sessions.clone());

        let replies = block_on(machine.handle_text(&text_event("u1", &text))).unwrap();

        prop_assert_eq!(replies.len(), 1);
        prop_assert_eq!(replies[0].text(), Some(SYMBOL_PROMPT));
        prop_assert_eq!(block_on(sessions.get("u1")).unwrap(), Some(UserSession::init("u1")));
    }

    #[test]
    fn prop_unknown_symbol_keeps_init(symbol in arb_unknown_symbol()) {
        let sessions = Arc::new(InMemorySessionStore::new());
        block_on(sessions.set(UserSession::init("u1"))).unwrap();
        let machine = machine(sessions.clone());

        let replies = block_on(machine.handle_text(&text_event("u1", &symbol))).unwrap();

        prop_assert_eq!(replies.len(), 1);
        let expected = format!("Can't find asset ({})", symbol.trim().to_uppercase());
        prop_assert_eq!(replies[0].text(), Some(expected.as_str()));
        prop_assert_eq!(block_on(sessions.get("u1")).unwrap(), Some(UserSession::init("u1")));
    }

    #[test]
    fn prop_known_symbol_in_any_case_awaits_payment(
        (symbol, asset_id) in arb_known_symbol(),
        left in arb_padding(),
        right in arb_padding(),
    ) {
        let sessions = Arc::new(InMemorySessionStore::new());
        block_on(sessions.set(UserSession::init("u1"))).unwrap();
        let machine = machine(sessions.clone());

        let text = format!("{}{}{}", left, symbol, right);
        let replies = block_on(machine.handle_text(&text_event("u1", &text))).unwrap();

        prop_assert_eq!(replies.len(), 2);
        prop_assert_eq!(replies[1].category.clone(), EventCategory::AppButtonGroup);
        prop_assert_eq!(
            block_on(sessions.get("u1")).unwrap(),
            Some(UserSession::awaiting_payment("u1", symbol.to_uppercase(), asset_id))
        );
    }

    #[test]
    fn prop_cancel_in_any_case_resets(
        cancel in arb_any_case("cancel"),
        left in arb_padding(),
        right in arb_padding(),
        prior in arb_prior_session(),
    ) {
        let sessions = Arc::new(InMemorySessionStore::new());
        if let Some(state) = prior {
            block_on(sessions.set(UserSession { user_id: "u1".to_string(), state })).unwrap();
        }
        let machine = machine(sessions.clone());

        let text = format!("{}{}{}", left, cancel, right);
        let replies = block_on(machine.handle_text(&text_event("u1", &text))).unwrap();

        prop_assert_eq!(replies.len(), 1);
        prop_assert_eq!(replies[0].text(), Some(SYMBOL_PROMPT));
        prop_assert_eq!(block_on(sessions.get("u1")).unwrap(), Some(UserSession::init("u1")));
    }
}

// ============================================================================
// Disposition
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_refund_returns_what_was_paid(
        amount in arb_amount(),
        asset_id in arb_asset_id(),
        init_session in any::<bool>(),
    ) {
        let sessions = Arc::new(InMemorySessionStore::new());
        let user = Uuid::new_v4().to_string();
        if init_session {
            block_on(sessions.set(UserSession::init(&user))).unwrap();
        }
        let engine = engine(sessions);
        let p = payment(&user, &asset_id, &amount.to_string());

        let first = block_on(engine.handle_payment(&p)).unwrap();
        let again = block_on(engine.handle_payment(&p)).unwrap();

        prop_assert!(first.is_refund());
        let transfer = first.transfer();
        prop_assert_eq!(&transfer.asset_id, &asset_id);
        prop_assert_eq!(transfer.amount, amount);
        prop_assert_eq!(transfer.memo.as_str(), REFUND_MEMO);
        prop_assert_eq!(transfer.trace_id, refund_trace_id(&p.message_id));
        prop_assert_eq!(&transfer.payee, &Payee::User { user_id: user.clone() });
        prop_assert_eq!(again.transfer().trace_id, transfer.trace_id);
    }

    #[test]
    fn prop_forward_carries_a_positive_floor(
        amount in arb_amount(),
        asset_id in arb_asset_id(),
        (symbol, fill_asset_id) in arb_known_symbol(),
    ) {
        let sessions = Arc::new(InMemorySessionStore::new());
        let user = Uuid::new_v4().to_string();
        block_on(sessions.set(UserSession::awaiting_payment(&user, symbol.to_uppercase(), fill_asset_id))).unwrap();
        let engine = engine(sessions);

        let disposition = block_on(engine.handle_payment(&payment(&user, &asset_id, &amount.to_string()))).unwrap();
        let Disposition::ForwardToSwap { order, transfer, .. } = disposition else {
            return Err(TestCaseError::fail("expected a swap"));
        };

        prop_assert!(order.minimum_output > Decimal::ZERO);
        prop_assert_eq!(transfer.amount, amount);
        prop_assert_eq!(order.fill_asset_id.as_str(), fill_asset_id);

        let record = swap::decode(&transfer.memo, &group_secret(11)).unwrap();
        prop_assert_eq!(record.minimum_output, order.minimum_output);
        prop_assert_eq!(record.trace_id, order.trace_id);
        prop_assert_eq!(record.fill_asset_id.as_str(), fill_asset_id);
    }
}
