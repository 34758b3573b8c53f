//! Scripted transport double for session controller tests
//!
//! Records every call the controller makes in an ordered journal so tests
//! can assert on call presence and relative ordering (for example that an
//! acknowledge is sent before any data handler runs). Inbound events and
//! connection requests are injected through channels; failures are scripted
//! per call.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use peerlink::{
    ChannelMessage, Error, PeerReadyState, PeerTransport, Result, RosterEntry, TransportEvent,
};

/// Ordered journal of transport calls and test-side markers
pub type Journal = Arc<Mutex<Vec<String>>>;

/// Scripted peer transport double
pub struct ScriptedTransport {
    journal: Journal,
    roster: Mutex<Vec<RosterEntry>>,
    ready: Mutex<PeerReadyState>,
    connect_results: Mutex<VecDeque<Result<()>>>,
    send_results: Mutex<VecDeque<Result<()>>>,
    events_tx: mpsc::UnboundedSender<Result<TransportEvent>>,
    events_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Result<TransportEvent>>>,
    requests_tx: mpsc::UnboundedSender<String>,
    requests_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
    open_count: AtomicU32,
    close_count: AtomicU32,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            journal: Arc::new(Mutex::new(Vec::new())),
            roster: Mutex::new(Vec::new()),
            ready: Mutex::new(PeerReadyState::Online),
            connect_results: Mutex::new(VecDeque::new()),
            send_results: Mutex::new(VecDeque::new()),
            events_tx,
            events_rx: tokio::sync::Mutex::new(events_rx),
            requests_tx,
            requests_rx: tokio::sync::Mutex::new(requests_rx),
            open_count: AtomicU32::new(0),
            close_count: AtomicU32::new(0),
        })
    }

    /// Shared journal; handlers can push their own markers into it
    pub fn journal(&self) -> Journal {
        Arc::clone(&self.journal)
    }

    /// Snapshot of the journal
    pub fn calls(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }

    pub fn set_roster(&self, roster: Vec<RosterEntry>) {
        *self.roster.lock().unwrap() = roster;
    }

    pub fn set_ready_state(&self, state: PeerReadyState) {
        *self.ready.lock().unwrap() = state;
    }

    /// Queue the outcome of the next `connect_to`/`accept_connection` call
    pub fn script_connect_result(&self, result: Result<()>) {
        self.connect_results.lock().unwrap().push_back(result);
    }

    /// Queue the outcome of the next `send` call
    pub fn script_send_result(&self, result: Result<()>) {
        self.send_results.lock().unwrap().push_back(result);
    }

    /// Inject an inbound transport event
    pub fn push_event(&self, event: TransportEvent) {
        self.events_tx.send(Ok(event)).expect("event channel closed");
    }

    /// Inject a failure on the inbound event stream
    pub fn push_event_error(&self, err: Error) {
        self.events_tx.send(Err(err)).expect("event channel closed");
    }

    /// Inject an inbound connection request (passive mode)
    pub fn push_connection_request(&self, peer_id: &str) {
        self.requests_tx
            .send(peer_id.to_string())
            .expect("request channel closed");
    }

    pub fn open_count(&self) -> u32 {
        self.open_count.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> u32 {
        self.close_count.load(Ordering::SeqCst)
    }

    fn record(&self, entry: String) {
        self.journal.lock().unwrap().push(entry);
    }

    fn pop_scripted(queue: &Mutex<VecDeque<Result<()>>>) -> Result<()> {
        queue.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

#[async_trait]
impl PeerTransport for ScriptedTransport {
    async fn open(&self) -> Result<()> {
        self.open_count.fetch_add(1, Ordering::SeqCst);
        self.record("open".to_string());
        Ok(())
    }

    async fn connect_to(&self, remote_id: &str) -> Result<()> {
        self.record(format!("connect_to:{}", remote_id));
        Self::pop_scripted(&self.connect_results)
    }

    async fn listen_connections(&self) -> Result<String> {
        self.record("listen".to_string());
        let mut rx = self.requests_rx.lock().await;
        match rx.recv().await {
            Some(peer_id) => Ok(peer_id),
            None => Err(Error::Transport("request channel closed".to_string())),
        }
    }

    async fn accept_connection(&self) -> Result<()> {
        self.record("accept".to_string());
        Self::pop_scripted(&self.connect_results)
    }

    async fn get_peers(&self) -> Result<Vec<RosterEntry>> {
        self.record("get_peers".to_string());
        Ok(self.roster.lock().unwrap().clone())
    }

    async fn send(&self, message: ChannelMessage) -> Result<()> {
        let entry = match &message {
            ChannelMessage::Acknowledge { rec_time } => {
                format!("send:acknowledge:{}", rec_time)
            }
            other => format!("send:{}", other.tag()),
        };
        self.record(entry);
        Self::pop_scripted(&self.send_results)
    }

    async fn ready_state(&self) -> PeerReadyState {
        *self.ready.lock().unwrap()
    }

    async fn next_event(&self) -> Result<TransportEvent> {
        let mut rx = self.events_rx.lock().await;
        match rx.recv().await {
            Some(result) => result,
            None => Ok(TransportEvent::Closed),
        }
    }

    async fn close(&self) -> Result<()> {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        self.record("close".to_string());
        Ok(())
    }
}
