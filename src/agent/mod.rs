//! Swap agent - the handling entrypoint
//!
//! EVENT → CLASSIFY → LOCK USER → (TEXT | PAYMENT | OTHER) → SEND
//!
//! `handle_event` processes one event end to end. `run` drains an event
//! source with a bounded number of events in flight; a failed event is
//! logged and never stops the loop.

use crate::audit::InterventionLog;
use crate::classifier::{Classification, EventClassifier, EventKind, IgnoreReason};
use crate::conversational::ConversationStateMachine;
use crate::directory::AssetDirectory;
use crate::disposition::{IncomingPayment, TransferDispositionEngine};
use crate::error::SwapBotError;
use crate::gateway::{AssetLookup, EventSource, GroupSource, MessageSender, Wallet};
use crate::models::{Disposition, Event, OutboundMessage, TransferReceipt};
use crate::state::SessionStore;
use crate::Result;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Outside-world collaborators of the agent
#[derive(Clone)]
pub struct Collaborators {
    pub messenger: Arc<dyn MessageSender>,
    pub wallet: Arc<dyn Wallet>,
    pub assets: Arc<dyn AssetLookup>,
    pub groups: Arc<dyn GroupSource>,
}

#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub bot_id: Uuid,
    pub minimum_output: Decimal,
    pub max_in_flight: usize,
}

/// What handling an event amounted to
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    Ignored(IgnoreReason),
    Replied(usize),
    Refunded(TransferReceipt),
    Forwarded {
        order_trace_id: Uuid,
        receipt: TransferReceipt,
    },
    /// Payment could not be decided; see the intervention log
    HeldForIntervention(Uuid),
}

pub struct SwapAgent {
    classifier: EventClassifier,
    conversation: ConversationStateMachine,
    disposition: TransferDispositionEngine,
    sessions: Arc<dyn SessionStore>,
    messenger: Arc<dyn MessageSender>,
    wallet: Arc<dyn Wallet>,
    interventions: Arc<InterventionLog>,
    max_in_flight: usize,
}

impl SwapAgent {
    pub fn new(
        directory: Arc<AssetDirectory>,
        sessions: Arc<dyn SessionStore>,
        interventions: Arc<InterventionLog>,
        collaborators: Collaborators,
        settings: AgentSettings,
    ) -> Self {
        Self {
            classifier: EventClassifier::new(settings.bot_id),
            conversation: ConversationStateMachine::new(
                settings.bot_id,
                directory,
                collaborators.assets.clone(),
                sessions.clone(),
            ),
            disposition: TransferDispositionEngine::new(
                sessions.clone(),
                collaborators.assets,
                collaborators.groups,
                settings.minimum_output,
            ),
            sessions,
            messenger: collaborators.messenger,
            wallet: collaborators.wallet,
            interventions,
            max_in_flight: settings.max_in_flight.max(1),
        }
    }

    /// Handle one inbound event.
    ///
    /// Transport failures surface to the caller; the session has already been
    /// written by then, so a redelivery reuses the same derived ids.
    pub async fn handle_event(&self, event: &Event) -> Result<EventOutcome> {
        let kind = match self.classifier.classify(event) {
            Classification::Ignore(reason) => {
                debug!(
                    user_id = %event.user_id,
                    message_id = %event.message_id,
                    reason = ?reason,
                    "Event ignored"
                );
                return Ok(EventOutcome::Ignored(reason));
            }
            Classification::Handle(kind) => kind,
        };

        let _guard = self.sessions.lock(&event.user_id).await;

        match kind {
            EventKind::Text => {
                let replies = self.conversation.handle_text(event).await?;
                self.send_all(&replies).await?;
                Ok(EventOutcome::Replied(replies.len()))
            }
            EventKind::Other => {
                debug!(user_id = %event.user_id, category = %event.category, "Resetting conversation");
                let replies = self.conversation.reset(event).await?;
                self.send_all(&replies).await?;
                Ok(EventOutcome::Replied(replies.len()))
            }
            EventKind::Payment => self.handle_payment(event).await,
        }
    }

    async fn handle_payment(&self, event: &Event) -> Result<EventOutcome> {
        let view = event.transfer_view()?;
        let payment = IncomingPayment::from_event(event, &view);

        let disposition = match self.disposition.handle_payment(&payment).await {
            Err(e @ SwapBotError::MalformedAmount(_)) => {
                let id = self.interventions.record(&payment, e.to_string()).await?;
                error!(
                    user_id = %payment.user_id,
                    message_id = %payment.message_id,
                    asset_id = %payment.asset_id,
                    amount = %payment.amount,
                    intervention_id = %id,
                    "Payment held for manual handling"
                );
                return Ok(EventOutcome::HeldForIntervention(id));
            }
            other => other?,
        };

        match disposition {
            Disposition::Refund { transfer } => {
                let receipt = self.wallet.transfer(&transfer).await?;
                info!(
                    user_id = %payment.user_id,
                    trace_id = %receipt.trace_id,
                    amount = %transfer.amount,
                    "Payment refunded"
                );
                Ok(EventOutcome::Refunded(receipt))
            }
            Disposition::ForwardToSwap {
                order,
                transfer,
                notice,
            } => {
                self.messenger.send_message(&notice).await?;
                let receipt = self.wallet.transfer(&transfer).await?;
                info!(
                    user_id = %payment.user_id,
                    order_trace = %order.trace_id,
                    trace_id = %receipt.trace_id,
                    "Payment forwarded to swap"
                );
                Ok(EventOutcome::Forwarded {
                    order_trace_id: order.trace_id,
                    receipt,
                })
            }
        }
    }

    async fn send_all(&self, messages: &[OutboundMessage]) -> Result<()> {
        for message in messages {
            self.messenger.send_message(message).await?;
        }
        Ok(())
    }

    /// Drain `source` until it ends.
    ///
    /// Events of different users run concurrently. One user's events are
    /// handled in source order: each waits for that user's previous event.
    ///
    /// Returns an error only when the source itself fails; the caller decides
    /// whether to restart.
    pub async fn run<S>(self: &Arc<Self>, source: &mut S) -> Result<()>
    where
        S: EventSource + ?Sized,
    {
        let permits = Arc::new(Semaphore::new(self.max_in_flight));
        let mut tasks = JoinSet::new();
        // Completion signal of each user's latest unfinished event
        let mut tails: HashMap<String, oneshot::Receiver<()>> = HashMap::new();

        info!(max_in_flight = self.max_in_flight, "Agent loop started");

        let result = loop {
            let event = match source.next_event().await {
                Ok(Some(event)) => event,
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            };

            let permit = permits
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| SwapBotError::TransportFailure(format!("worker pool closed: {}", e)))?;

            tails.retain(|_, done| matches!(done.try_recv(), Err(TryRecvError::Empty)));

            let (done, tail) = oneshot::channel();
            let previous = tails.insert(event.user_id.clone(), tail);

            let agent = Arc::clone(self);
            tasks.spawn(async move {
                let _permit = permit;
                if let Some(previous) = previous {
                    // A closed channel means the previous event's task died
                    let _ = previous.await;
                }
                agent.process(event).await;
                let _ = done.send(());
            });

            while let Some(joined) = tasks.try_join_next() {
                log_join(joined);
            }
        };

        while let Some(joined) = tasks.join_next().await {
            log_join(joined);
        }

        match &result {
            Ok(()) => info!("Event source ended"),
            Err(e) => warn!(error = %e, "Event source failed"),
        }
        result
    }

    async fn process(&self, event: Event) {
        let start = Instant::now();

        match self.handle_event(&event).await {
            Ok(outcome) => debug!(
                message_id = %event.message_id,
                outcome = ?outcome,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Event handled"
            ),
            Err(e) => error!(
                user_id = %event.user_id,
                message_id = %event.message_id,
                category = %event.category,
                error = %e,
                "Event handling failed"
            ),
        }
    }
}

fn log_join(joined: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "Event task aborted");
    }
}
