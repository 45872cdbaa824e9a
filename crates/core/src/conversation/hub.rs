//! Webhook-driven conversation completion.
//!
//! The provider's status callbacks and the media pipeline's end-of-conversation
//! notifications arrive over HTTP. [`CallEventHub`] routes them to the attempt
//! waiting on the matching call identifier. Events that arrive before anyone
//! waits are held until claimed or until they expire.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::metrics::CALL_EVENTS;
use crate::telephony::{CallContext, PlacedCall};

use super::{ConversationEnd, ConversationPipeline, PipelineError};

type Completion = Result<ConversationEnd, PipelineError>;

/// How long an unclaimed early event is kept.
const EARLY_EVENT_TTL: Duration = Duration::from_secs(3600);

/// Most unclaimed events held at once; the oldest is evicted beyond this.
pub const MAX_HELD_EVENTS: usize = 1024;

enum Slot {
    Waiting(oneshot::Sender<Completion>),
    Ready(Completion, Instant),
}

/// What happened to a delivered event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to a waiting attempt.
    Delivered,
    /// Stored until an attempt asks for it.
    Held,
    /// Not actionable (non-terminal status, or superseded).
    Ignored,
}

impl Delivery {
    pub fn as_str(&self) -> &'static str {
        match self {
            Delivery::Delivered => "delivered",
            Delivery::Held => "held",
            Delivery::Ignored => "ignored",
        }
    }
}

fn record_event(kind: &str, delivery: Delivery) {
    CALL_EVENTS
        .with_label_values(&[kind, delivery.as_str()])
        .inc();
}

/// Map a provider call status to a completion, if it is terminal.
///
/// `completed` is only meaningful when no conversation report exists;
/// callers handle that case separately.
fn terminal_status(status: &str) -> Option<Completion> {
    match status {
        "no-answer" | "busy" => Some(Err(PipelineError::NoAnswer(status.to_string()))),
        "failed" | "canceled" => Some(Err(PipelineError::Failed(format!(
            "provider reported {}",
            status
        )))),
        _ => None,
    }
}

/// Routes completion events to waiting call attempts.
pub struct CallEventHub {
    slots: Mutex<HashMap<String, Slot>>,
    max_held: usize,
}

impl Default for CallEventHub {
    fn default() -> Self {
        Self::with_max_held(MAX_HELD_EVENTS)
    }
}

impl CallEventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hub that holds at most `max_held` unclaimed events (minimum 1).
    pub fn with_max_held(max_held: usize) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            max_held: max_held.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        // Slot operations never panic while holding the lock.
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn prune_expired(slots: &mut HashMap<String, Slot>) {
        slots.retain(|_, slot| match slot {
            Slot::Ready(_, at) => at.elapsed() < EARLY_EVENT_TTL,
            Slot::Waiting(tx) => !tx.is_closed(),
        });
    }

    /// Drop held events until there is room for one more.
    fn make_room(slots: &mut HashMap<String, Slot>, max_held: usize) {
        loop {
            let mut held = 0;
            let mut oldest: Option<(&String, Instant)> = None;
            for (id, slot) in slots.iter() {
                if let Slot::Ready(_, at) = slot {
                    held += 1;
                    if oldest.map_or(true, |(_, t)| *at < t) {
                        oldest = Some((id, *at));
                    }
                }
            }
            if held < max_held {
                return;
            }
            let Some(id) = oldest.map(|(id, _)| id.clone()) else {
                return;
            };
            warn!(call_id = %id, held, "Too many unclaimed call events, dropping oldest");
            slots.remove(&id);
        }
    }

    fn deliver(&self, call_id: &str, completion: Completion, hold_if_unclaimed: bool) -> Delivery {
        let mut slots = self.lock();
        match slots.remove(call_id) {
            Some(Slot::Waiting(tx)) => {
                if tx.send(completion).is_ok() {
                    Delivery::Delivered
                } else {
                    Delivery::Ignored
                }
            }
            Some(ready @ Slot::Ready(..)) => {
                // First report wins.
                slots.insert(call_id.to_string(), ready);
                Delivery::Ignored
            }
            None if hold_if_unclaimed => {
                Self::prune_expired(&mut slots);
                Self::make_room(&mut slots, self.max_held);
                slots.insert(call_id.to_string(), Slot::Ready(completion, Instant::now()));
                Delivery::Held
            }
            None => Delivery::Ignored,
        }
    }

    /// Report that the conversation on `call_id` ended normally.
    pub fn complete(&self, call_id: &str, end: ConversationEnd) -> Delivery {
        let delivery = self.deliver(call_id, Ok(end), true);
        debug!(call_id = %call_id, ?delivery, "Conversation end reported");
        record_event("conversation_end", delivery);
        delivery
    }

    /// Report that the pipeline for `call_id` failed.
    pub fn fail(&self, call_id: &str, reason: impl Into<String>) -> Delivery {
        let delivery = self.deliver(call_id, Err(PipelineError::Failed(reason.into())), true);
        debug!(call_id = %call_id, ?delivery, "Conversation failure reported");
        record_event("conversation_failure", delivery);
        delivery
    }

    /// Apply a provider status callback.
    ///
    /// `no-answer`/`busy` end the wait as unanswered, `failed`/`canceled` as
    /// failed. `completed` ends the wait with an empty conversation only if
    /// an attempt is already waiting and no conversation report arrived.
    pub fn provider_status(&self, call_id: &str, status: &str) -> Delivery {
        let status = status.trim().to_ascii_lowercase();
        let delivery = match terminal_status(&status) {
            Some(completion) => self.deliver(call_id, completion, true),
            None if status == "completed" => self.deliver(
                call_id,
                Ok(ConversationEnd {
                    transcript: Vec::new(),
                    answered: true,
                }),
                false,
            ),
            None => Delivery::Ignored,
        };
        debug!(call_id = %call_id, status = %status, ?delivery, "Provider status received");
        record_event("provider_status", delivery);
        delivery
    }

    /// Number of unclaimed events being held.
    pub fn held(&self) -> usize {
        self.lock()
            .values()
            .filter(|s| matches!(s, Slot::Ready(..)))
            .count()
    }

    /// Number of attempts currently waiting.
    pub fn waiting(&self) -> usize {
        self.lock()
            .values()
            .filter(|s| matches!(s, Slot::Waiting(tx) if !tx.is_closed()))
            .count()
    }
}

/// Removes an abandoned waiter when the wait future is dropped.
struct Registration<'a> {
    hub: &'a CallEventHub,
    call_id: &'a str,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        let mut slots = self.hub.lock();
        if matches!(slots.get(self.call_id), Some(Slot::Waiting(_))) {
            slots.remove(self.call_id);
        }
    }
}

#[async_trait]
impl ConversationPipeline for CallEventHub {
    async fn await_completion(
        &self,
        call: &PlacedCall,
        context: &CallContext,
    ) -> Result<ConversationEnd, PipelineError> {
        let call_id = call.external_call_id.as_str();

        let rx = {
            let mut slots = self.lock();
            match slots.remove(call_id) {
                Some(Slot::Ready(completion, _)) => return completion,
                Some(Slot::Waiting(_)) => {
                    warn!(call_id = %call_id, lead_id = %context.lead_id, "Replacing stale waiter");
                }
                None => {}
            }
            let (tx, rx) = oneshot::channel();
            slots.insert(call_id.to_string(), Slot::Waiting(tx));
            rx
        };

        let _registration = Registration { hub: self, call_id };
        rx.await.unwrap_or(Err(PipelineError::Closed))
    }
}
