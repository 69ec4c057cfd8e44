//! Request multiplexer: client-initiated actions fan in onto the current
//! agent session, replies fan back out through one-shot sinks correlated by
//! request id.
//!
//! A single demultiplexing reader (the session task) owns delivery; the
//! reader, the deadline and the cancellation path all go through a
//! compare-and-remove on the correlation id, so each pending call resolves
//! exactly once.

use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

use tabbridge_core::config::TimeoutsConfig;
use tabbridge_core::wire::{Action, ActionFrame};
use tabbridge_core::{Config, Error, Result};

use crate::cache::SnapshotCache;
use crate::registry::SessionRegistry;

struct PendingCall {
    action: Action,
    session_id: Uuid,
    created: Instant,
    sink: oneshot::Sender<Result<Value>>,
}

pub struct Multiplexer {
    pending: Mutex<HashMap<Uuid, PendingCall>>,
    registry: Arc<SessionRegistry>,
    cache: Arc<SnapshotCache>,
    timeouts: TimeoutsConfig,
    write_timeout: Duration,
}

/// Removes the pending entry on drop unless disarmed. Dropping the dispatch
/// future (client disconnect) therefore cancels the call: a late reply finds
/// no entry and is discarded without touching the cache.
struct PendingGuard<'a> {
    pending: &'a Mutex<HashMap<Uuid, PendingCall>>,
    id: Uuid,
    armed: bool,
}

impl PendingGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.pending.lock().remove(&self.id);
        }
    }
}

impl Multiplexer {
    pub fn new(registry: Arc<SessionRegistry>, cache: Arc<SnapshotCache>, config: &Config) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            registry,
            cache,
            timeouts: config.timeouts.clone(),
            write_timeout: config.liveness.write_timeout(),
        }
    }

    /// One action round-trip. Exactly one of reply, agent error, timeout or
    /// peer-gone is delivered per call.
    pub async fn dispatch(
        &self,
        action: Action,
        tab_id: Option<u32>,
        params: Map<String, Value>,
        timeout_override_ms: Option<u64>,
    ) -> Result<Value> {
        let timeout = self.timeouts.for_action(action, timeout_override_ms);
        let mut session = self.registry.current().await.ok_or(Error::NoAgent)?;

        let frame = ActionFrame::new(action, tab_id, params);
        let wire = frame.to_wire().to_string();
        let (sink, reply) = oneshot::channel();
        self.pending.lock().insert(
            frame.request_id,
            PendingCall {
                action,
                session_id: session.id,
                created: Instant::now(),
                sink,
            },
        );
        let guard = PendingGuard {
            pending: &self.pending,
            id: frame.request_id,
            armed: true,
        };

        // Selection can race with eviction; re-validate once before writing.
        if !session.is_active() {
            session = self.registry.current().await.ok_or(Error::NoAgent)?;
            if let Some(call) = self.pending.lock().get_mut(&frame.request_id) {
                call.session_id = session.id;
            }
        }

        session.send_text(wire, self.write_timeout).await?;

        tokio::select! {
            outcome = reply => match outcome {
                Ok(result) => {
                    guard.disarm();
                    let payload = result?;
                    self.seed_cache(action, tab_id, &payload).await;
                    Ok(payload)
                }
                // Sink dropped without a value: the peer was evicted and the
                // pending table already drained.
                Err(_) => {
                    guard.disarm();
                    Err(Error::AgentGone)
                }
            },
            _ = tokio::time::sleep(timeout) => {
                drop(guard);
                Err(Error::Timeout {
                    action: action.to_string(),
                    seconds: timeout.as_secs().max(1),
                })
            }
        }
    }

    /// Deliver a reply to the matching pending call. Returns false when the
    /// correlation id is unknown (timed out, cancelled, or never existed).
    pub fn resolve(&self, request_id: Uuid, outcome: Result<Value>) -> bool {
        let call = self.pending.lock().remove(&request_id);
        match call {
            Some(call) => {
                debug!(
                    request_id = %request_id,
                    action = %call.action,
                    elapsed_ms = call.created.elapsed().as_millis() as u64,
                    "pending call resolved"
                );
                let _ = call.sink.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Best-effort cancellation. A reply arriving later is dropped.
    pub fn cancel(&self, request_id: Uuid) -> bool {
        self.pending.lock().remove(&request_id).is_some()
    }

    /// Fail every pending call routed to an evicted session. Returns how
    /// many calls were vacated.
    pub fn fail_session(&self, session_id: Uuid) -> usize {
        let drained: Vec<PendingCall> = {
            let mut pending = self.pending.lock();
            let ids: Vec<Uuid> = pending
                .iter()
                .filter(|(_, call)| call.session_id == session_id)
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter().filter_map(|id| pending.remove(&id)).collect()
        };
        let count = drained.len();
        for call in drained {
            let _ = call.sink.send(Err(Error::AgentGone));
        }
        count
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    async fn seed_cache(&self, action: Action, tab_id: Option<u32>, payload: &Value) {
        if !action.seeds_cache() {
            return;
        }
        let tab_id = tab_id.or_else(|| {
            payload
                .get("tabId")
                .and_then(Value::as_u64)
                .map(|v| v as u32)
        });
        if let Some(tab_id) = tab_id {
            self.cache.apply_action_reply(tab_id, action, payload).await;
        }
    }
}
