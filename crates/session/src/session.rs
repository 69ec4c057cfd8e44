//! One WebSocket peer: its reader/writer tasks, liveness probing and
//! lifecycle state machine.
//!
//! States run `Accepting -> Active -> Evicting -> Closed`; `Closed` is
//! absorbing. During eviction no new writes are accepted and every pending
//! call routed to the session is failed with a peer-gone error.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tabbridge_core::config::LivenessConfig;
use tabbridge_core::wire::{ping_frame, pong_frame, AgentFrame};
use tabbridge_core::Error;

use crate::mux::Multiplexer;
use crate::BridgeState;

/// Depth of the per-session writer queue. A full queue for longer than the
/// configured write timeout fails the offending send with `Congested`.
pub const WRITER_QUEUE_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Accepting,
    Active,
    Evicting,
    Closed,
}

pub struct AgentSession {
    pub id: Uuid,
    pub remote_addr: Option<SocketAddr>,
    pub connected_at: Instant,
    writer: mpsc::Sender<String>,
    state: Mutex<SessionState>,
    last_activity: Mutex<Instant>,
    last_pong: Mutex<Instant>,
}

impl AgentSession {
    pub fn new(writer: mpsc::Sender<String>, remote_addr: Option<SocketAddr>) -> Self {
        let now = Instant::now();
        Self {
            id: Uuid::new_v4(),
            remote_addr,
            connected_at: now,
            writer,
            state: Mutex::new(SessionState::Active),
            last_activity: Mutex::new(now),
            last_pong: Mutex::new(now),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    /// Transition into `Evicting`. Returns whether this call performed the
    /// transition, so eviction side effects run exactly once.
    pub fn begin_evict(&self) -> bool {
        let mut state = self.state.lock();
        match *state {
            SessionState::Accepting | SessionState::Active => {
                *state = SessionState::Evicting;
                true
            }
            SessionState::Evicting | SessionState::Closed => false,
        }
    }

    pub fn set_closed(&self) {
        *self.state.lock() = SessionState::Closed;
    }

    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    pub fn last_activity(&self) -> Instant {
        *self.last_activity.lock()
    }

    pub fn note_pong(&self) {
        let now = Instant::now();
        *self.last_pong.lock() = now;
        *self.last_activity.lock() = now;
    }

    pub fn last_pong(&self) -> Instant {
        *self.last_pong.lock()
    }

    /// Queue a frame for the writer task, waiting at most `timeout` for
    /// queue space. Sends to a non-active session are refused.
    pub async fn send_text(&self, text: String, timeout: std::time::Duration) -> Result<(), Error> {
        if !self.is_active() {
            return Err(Error::AgentGone);
        }
        self.writer
            .send_timeout(text, timeout)
            .await
            .map_err(|err| match err {
                mpsc::error::SendTimeoutError::Timeout(_) => Error::Congested,
                mpsc::error::SendTimeoutError::Closed(_) => Error::AgentGone,
            })
    }

    /// Best-effort enqueue for pings and pong echoes.
    pub fn try_send(&self, text: String) -> Result<(), Error> {
        if !self.is_active() {
            return Err(Error::AgentGone);
        }
        self.writer.try_send(text).map_err(|_| Error::Congested)
    }
}

/// Drive one accepted WebSocket until the peer goes away. Owns the reader
/// loop; the writer and liveness probe run as sibling tasks.
pub async fn handle_socket(socket: WebSocket, addr: Option<SocketAddr>, bridge: Arc<BridgeState>) {
    let (mut sink, mut stream) = socket.split();
    let (writer_tx, mut writer_rx) = mpsc::channel::<String>(WRITER_QUEUE_DEPTH);

    let session = Arc::new(AgentSession::new(writer_tx, addr));
    bridge.registry.insert(session.clone()).await;
    info!(session = %session.id, addr = ?addr, "browser agent connected");

    let writer_task = tokio::spawn(async move {
        while let Some(text) = writer_rx.recv().await {
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let liveness_task = tokio::spawn(run_liveness(
        session.clone(),
        bridge.config.liveness.clone(),
        bridge.mux.clone(),
    ));

    while let Some(incoming) = stream.next().await {
        match incoming {
            Ok(Message::Text(text)) => {
                session.touch();
                handle_frame(&session, &bridge, &text).await;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                // Protocol-level keepalive; the in-band liveness probe is
                // what drives eviction.
                session.touch();
            }
            Ok(Message::Close(_)) => {
                debug!(session = %session.id, "peer sent close");
                break;
            }
            Ok(Message::Binary(_)) => {
                debug!(session = %session.id, "unexpected binary frame dropped");
            }
            Err(err) => {
                warn!(session = %session.id, error = %err, "websocket read error");
                break;
            }
        }
    }

    if session.begin_evict() {
        let failed = bridge.mux.fail_session(session.id);
        if failed > 0 {
            debug!(session = %session.id, failed, "failed pending calls on disconnect");
        }
    }
    liveness_task.abort();
    writer_task.abort();
    bridge.registry.remove(session.id).await;
    info!(session = %session.id, "browser agent disconnected");
}

async fn handle_frame(session: &Arc<AgentSession>, bridge: &Arc<BridgeState>, text: &str) {
    let frame = match serde_json::from_str::<AgentFrame>(text) {
        Ok(frame) => frame,
        Err(err) => {
            warn!(session = %session.id, error = %err, "unparseable agent frame dropped");
            return;
        }
    };

    match frame {
        AgentFrame::Connection { status } => {
            info!(session = %session.id, status = ?status, "agent connection notice");
        }
        AgentFrame::Ping { timestamp } => {
            let _ = session.try_send(pong_frame(timestamp.as_ref()).to_string());
        }
        AgentFrame::Pong { .. } => {
            if session.is_active() {
                session.note_pong();
            } else {
                debug!(session = %session.id, "pong after eviction discarded");
            }
        }
        AgentFrame::BrowserData { source, tab_id, url, data } => {
            bridge
                .cache
                .apply_content_update(tab_id, source, url, &data)
                .await;
        }
        AgentFrame::Response { request_id, data } => {
            if !bridge.mux.resolve(request_id, Ok(data)) {
                debug!(session = %session.id, request_id = %request_id, "reply without pending call dropped");
            }
        }
        AgentFrame::Error { request_id, error } => {
            if !bridge.mux.resolve(request_id, Err(Error::Agent(error))) {
                debug!(session = %session.id, request_id = %request_id, "error reply without pending call dropped");
            }
        }
        AgentFrame::DevtoolsMessage { tab_id, data } => {
            if let Some(tab_id) = tab_id {
                bridge.cache.push_debugger_event(tab_id, data).await;
            }
        }
        AgentFrame::DebuggerEvent { tab_id, method, params } => {
            if let Some(tab_id) = tab_id {
                bridge
                    .cache
                    .push_debugger_event(tab_id, json!({"method": method, "params": params}))
                    .await;
            }
        }
    }
}

/// Periodic in-band liveness probe. A tick counts as a failure when the last
/// pong is older than 1.5x the ping interval, or when the previous ping went
/// unanswered past the ping timeout; a healthy tick resets the counter.
/// Hitting the failure threshold evicts the session.
pub async fn run_liveness(session: Arc<AgentSession>, cfg: LivenessConfig, mux: Arc<Multiplexer>) {
    let interval = cfg.ping_interval();
    let grace = interval.mul_f32(1.5);
    let mut failures: u32 = 0;
    let mut last_ping_sent: Option<Instant> = None;

    loop {
        tokio::time::sleep(interval).await;
        if !session.is_active() {
            break;
        }

        let now = Instant::now();
        let last_pong = session.last_pong();
        let pong_stale = now.duration_since(last_pong) > grace;
        let ping_unanswered = last_ping_sent
            .is_some_and(|sent| last_pong < sent && now.duration_since(sent) > cfg.ping_timeout());

        if pong_stale || ping_unanswered {
            failures += 1;
            debug!(session = %session.id, failures, "liveness probe failure");
        } else {
            failures = 0;
        }

        if failures >= cfg.failure_threshold {
            warn!(session = %session.id, failures, "liveness threshold reached, evicting session");
            if session.begin_evict() {
                mux.fail_session(session.id);
            }
            break;
        }

        if session.try_send(ping_frame().to_string()).is_err() {
            warn!(session = %session.id, "ping enqueue failed, evicting session");
            if session.begin_evict() {
                mux.fail_session(session.id);
            }
            break;
        }
        last_ping_sent = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tabbridge_core::Config;
    use crate::BridgeState;

    fn test_session(queue: usize) -> (Arc<AgentSession>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(queue);
        (Arc::new(AgentSession::new(tx, None)), rx)
    }

    fn fast_liveness() -> LivenessConfig {
        LivenessConfig {
            ping_interval_ms: 20,
            ping_timeout_ms: 10,
            failure_threshold: 3,
            ..LivenessConfig::default()
        }
    }

    #[test]
    fn test_state_machine_transitions() {
        let (session, _rx) = test_session(4);
        assert_eq!(session.state(), SessionState::Active);
        assert!(session.begin_evict());
        assert_eq!(session.state(), SessionState::Evicting);
        // A second eviction attempt is a no-op.
        assert!(!session.begin_evict());
        session.set_closed();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(!session.begin_evict());
    }

    #[tokio::test]
    async fn test_send_refused_after_eviction() {
        let (session, _rx) = test_session(4);
        session.begin_evict();
        let err = session
            .send_text("x".to_string(), Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AgentGone));
    }

    #[tokio::test]
    async fn test_full_writer_queue_reports_congestion() {
        let (session, _rx) = test_session(1);
        session.try_send("first".to_string()).unwrap();
        let err = session
            .send_text("second".to_string(), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Congested));
    }

    #[tokio::test]
    async fn test_liveness_evicts_after_three_silent_ticks() {
        let bridge = BridgeState::new(Config::default());
        let (session, mut rx) = test_session(16);
        bridge.registry.insert(session.clone()).await;

        let probe = tokio::spawn(run_liveness(
            session.clone(),
            fast_liveness(),
            bridge.mux.clone(),
        ));
        // Drain pings so the queue never backs up.
        let drain = tokio::spawn(async move { while rx.recv().await.is_some() {} });

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(session.state(), SessionState::Evicting);
        probe.abort();
        drain.abort();
    }

    #[tokio::test]
    async fn test_liveness_keeps_ponging_session_active() {
        let bridge = BridgeState::new(Config::default());
        let (session, mut rx) = test_session(16);
        bridge.registry.insert(session.clone()).await;

        let probe = tokio::spawn(run_liveness(
            session.clone(),
            fast_liveness(),
            bridge.mux.clone(),
        ));
        let ponger = {
            let session = session.clone();
            tokio::spawn(async move {
                while rx.recv().await.is_some() {
                    session.note_pong();
                }
            })
        };

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(session.state(), SessionState::Active);
        probe.abort();
        ponger.abort();
    }

    #[tokio::test]
    async fn test_fewer_than_threshold_failures_do_not_evict() {
        let bridge = BridgeState::new(Config::default());
        let (session, mut rx) = test_session(16);
        bridge.registry.insert(session.clone()).await;

        let probe = tokio::spawn(run_liveness(
            session.clone(),
            fast_liveness(),
            bridge.mux.clone(),
        ));
        let drain = tokio::spawn(async move { while rx.recv().await.is_some() {} });

        // Two failed ticks at most fit into this window (first tick at 20ms
        // is still inside the 30ms grace period).
        tokio::time::sleep(Duration::from_millis(70)).await;
        assert_eq!(session.state(), SessionState::Active);
        probe.abort();
        drain.abort();
    }
}
