//! Session controller: the negotiation loop over a peer transport
//!
//! Maintains a continuously available logical connection to a counterpart
//! peer, re-establishing it after every disconnection, and exposes a stable
//! data/metadata interface to the owning application regardless of how many
//! physical reconnects occur underneath.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::config::SessionConfig;
use crate::protocol::{is_data_message, ChannelMessage};
use crate::session::handlers::{DataHandler, FrameHandler, HandlerRegistry};
use crate::session::retry::RetryPolicy;
use crate::session::state::{ConnectionState, PeerSelector};
use crate::transport::{PeerReadyState, PeerTransport, TransportEvent};
use crate::{Error, Result};

/// Handle representing an in-flight metadata send
///
/// Awaiting the handle yields the outcome of the send attempt; dropping it
/// detaches the send without cancelling it. A completed handle is not a
/// delivery guarantee, only confirmation that the transport accepted the
/// message.
pub struct PendingSend {
    handle: JoinHandle<Result<()>>,
}

impl Future for PendingSend {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.handle).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(err)) => Poll::Ready(Err(Error::SendFailed(format!(
                "send task failed: {}",
                err
            )))),
        }
    }
}

/// Resolved counterpart for one negotiation cycle
enum Target {
    /// Connect out to the given peer; `announce` sends a source message
    /// after the handshake (role-filter discovery only)
    Outbound { remote_id: String, announce: bool },
    /// Accept the pending inbound request from the given peer
    Inbound { remote_id: String },
}

/// Drives one logical session against a remote counterpart
///
/// A session cycles through discovery, connect, metadata exchange and an
/// online settle interval indefinitely until [`stop`](Self::stop) is called
/// or the transport reports an unrecoverable fault. Inbound `data` messages
/// are acknowledged before being fanned out to registered handlers.
pub struct SessionController {
    inner: Arc<Inner>,
    drive: Mutex<Option<JoinHandle<Result<()>>>>,
}

struct Inner {
    transport: Arc<dyn PeerTransport>,
    config: SessionConfig,
    local_id: String,
    policy: RetryPolicy,
    state: RwLock<ConnectionState>,
    remote_id: RwLock<Option<String>>,
    handlers: HandlerRegistry,
    running: AtomicBool,
    closed: AtomicBool,
    stop_tx: watch::Sender<bool>,
    /// Fatal error stashed for the drive task to return
    fault: StdMutex<Option<Error>>,
}

impl SessionController {
    /// Create a session controller over the given transport
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the configuration fails
    /// validation.
    pub fn new(config: SessionConfig, transport: Arc<dyn PeerTransport>) -> Result<Self> {
        config.validate()?;

        let local_id = config
            .peer_id
            .clone()
            .unwrap_or_else(|| format!("peer-{}", uuid::Uuid::new_v4()));
        let policy = config.timing.retry_policy();
        let (stop_tx, _) = watch::channel(false);

        info!("Creating session controller: peer_id={}", local_id);

        Ok(Self {
            inner: Arc::new(Inner {
                transport,
                config,
                local_id,
                policy,
                state: RwLock::new(ConnectionState::Idle),
                remote_id: RwLock::new(None),
                handlers: HandlerRegistry::new(),
                running: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                stop_tx,
                fault: StdMutex::new(None),
            }),
            drive: Mutex::new(None),
        })
    }

    /// Local peer identifier for this session
    pub fn local_id(&self) -> &str {
        &self.inner.local_id
    }

    /// Current negotiation state
    pub async fn connection_state(&self) -> ConnectionState {
        *self.inner.state.read().await
    }

    /// Identifier of the currently associated remote peer, if any
    pub async fn remote_peer(&self) -> Option<String> {
        self.inner.remote_id.read().await.clone()
    }

    /// Check if the negotiation cycle has been started
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Register a callback for inbound application-data messages
    ///
    /// Handlers run synchronously in registration order once the session is
    /// online; a failing handler never blocks the handlers after it.
    pub fn add_data_handler(&self, handler: DataHandler) {
        self.inner.handlers.add_data_handler(handler);
    }

    /// Register a callback for inbound decoded media frames
    pub fn add_frame_handler(&self, handler: FrameHandler) {
        self.inner.handlers.add_frame_handler(handler);
    }

    /// Enqueue an asynchronous metadata send to the current remote peer
    ///
    /// Safe to call in any state; if the session is not online the send
    /// fails and the failure surfaces through the returned [`PendingSend`].
    pub fn send_metadata(&self, metadata: serde_json::Value) -> PendingSend {
        let transport = Arc::clone(&self.inner.transport);
        PendingSend {
            handle: tokio::spawn(async move {
                transport.send(ChannelMessage::metadata(metadata)).await
            }),
        }
    }

    /// Open the transport and start the negotiation cycle
    ///
    /// Calling `open` while the session is already running is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] after [`stop`](Self::stop), or the
    /// transport's error if the initial open fails.
    #[instrument(skip(self), fields(peer_id = %self.inner.local_id))]
    pub async fn open(&self) -> Result<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(Error::SessionClosed);
        }
        if self.inner.running.swap(true, Ordering::SeqCst) {
            debug!("open ignored: session already running");
            return Ok(());
        }

        if let Err(err) = self.inner.transport.open().await {
            self.inner.running.store(false, Ordering::SeqCst);
            return Err(err);
        }

        let pump = Arc::clone(&self.inner);
        tokio::spawn(async move { pump.pump_events().await });

        let drive = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move { drive.negotiate().await });
        *self.drive.lock().await = Some(handle);

        Ok(())
    }

    /// Open the session and block until interrupted or a fatal error occurs
    ///
    /// Teardown is guaranteed on every exit path: Ctrl-C, fatal transport
    /// fault, or a concurrent [`stop`](Self::stop). Interrupts return `Ok`;
    /// fatal errors are surfaced to the caller after teardown.
    pub async fn run(&self) -> Result<()> {
        self.open().await?;

        let drive = self.drive.lock().await.take();
        let result = match drive {
            Some(handle) => {
                tokio::select! {
                    res = handle => match res {
                        Ok(outcome) => outcome,
                        Err(err) => Err(Error::Transport(format!("session task failed: {}", err))),
                    },
                    _ = tokio::signal::ctrl_c() => {
                        info!("[{}] interrupt received, shutting down", self.inner.local_id);
                        Ok(())
                    }
                }
            }
            None => Ok(()),
        };

        self.stop().await;
        result
    }

    /// Request teardown and release the transport
    ///
    /// Idempotent and safe to call concurrently with an in-flight
    /// negotiation step: every suspension point observes the stop signal,
    /// and the transport handle is released exactly once.
    pub async fn stop(&self) {
        let _ = self.inner.stop_tx.send(true);

        {
            let mut state = self.inner.state.write().await;
            if !state.is_terminal() {
                *state = ConnectionState::Closing;
            }
        }

        self.inner.shutdown_transport().await;
        self.inner.running.store(false, Ordering::SeqCst);

        let mut state = self.inner.state.write().await;
        if *state != ConnectionState::Failed {
            *state = ConnectionState::Closed;
        }
        self.inner.remote_id.write().await.take();
    }
}

impl Inner {
    fn stop_requested(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Race a future against the stop signal; `None` means stop won
    async fn until_stopped<F: Future>(&self, fut: F) -> Option<F::Output> {
        let mut rx = self.stop_tx.subscribe();
        if *rx.borrow() {
            return None;
        }
        tokio::select! {
            out = fut => Some(out),
            _ = rx.changed() => None,
        }
    }

    /// Release the transport handle, exactly once across all callers
    async fn shutdown_transport(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            if let Err(err) = self.transport.close().await {
                warn!("[{}] transport close failed: {}", self.local_id, err);
            }
        }
    }

    /// Update the negotiation state; terminal states are never overwritten
    async fn set_state(&self, state: ConnectionState) {
        let mut current = self.state.write().await;
        if !current.is_terminal() {
            *current = state;
        }
    }

    async fn set_remote(&self, remote: Option<String>) {
        *self.remote_id.write().await = remote;
    }

    /// Mark the session failed, tear down, and signal the cycle to stop
    ///
    /// The fault is stashed for the drive task to return on exit, so both
    /// negotiation and event-pump failures surface through `run()` instead
    /// of dying with their task.
    async fn fail(&self, err: Error) {
        warn!("[{}] fatal session error: {}", self.local_id, err);
        self.set_remote(None).await;
        self.set_state(ConnectionState::Failed).await;
        self.shutdown_transport().await;
        self.running.store(false, Ordering::SeqCst);
        *self.fault.lock().expect("fault slot poisoned") = Some(err);
        let _ = self.stop_tx.send(true);
    }

    /// Sleep for the discovery backoff; false means stop was requested
    async fn backoff(&self, attempt: u32) -> bool {
        let delay = self.policy.backoff_for(attempt);
        debug!(
            "[{}] discovery retry in {:?} (attempt {})",
            self.local_id,
            delay,
            attempt + 1
        );
        self.until_stopped(tokio::time::sleep(delay)).await.is_some()
    }

    /// The negotiation state machine
    ///
    /// Runs until stop is requested (clean return) or a non-recoverable
    /// transport fault surfaces (error return after teardown). Recoverable
    /// negotiation errors are absorbed: the cycle clears its remote and goes
    /// back to discovery with backoff.
    async fn negotiate(self: Arc<Self>) -> Result<()> {
        let mut attempt: u32 = 0;

        loop {
            if self.stop_requested() {
                break;
            }

            self.set_remote(None).await;
            self.set_state(ConnectionState::Discovering).await;

            // Discovering: resolve a counterpart for this cycle
            let target = match &self.config.selector {
                PeerSelector::Explicit { remote_id } => Target::Outbound {
                    remote_id: remote_id.clone(),
                    announce: false,
                },
                PeerSelector::RoleFilter { role } => {
                    let roster = match self.until_stopped(self.transport.get_peers()).await {
                        None => break,
                        Some(Ok(roster)) => roster,
                        Some(Err(err)) if err.is_recoverable() => {
                            warn!("[{}] roster query failed: {}", self.local_id, err);
                            if !self.backoff(attempt).await {
                                break;
                            }
                            attempt += 1;
                            continue;
                        }
                        Some(Err(err)) => {
                            self.fail(err).await;
                            break;
                        }
                    };

                    // First non-busy match in roster order; no affinity
                    // across cycles.
                    match roster.into_iter().find(|p| p.role == *role && !p.busy) {
                        Some(peer) => Target::Outbound {
                            remote_id: peer.id,
                            announce: true,
                        },
                        None => {
                            debug!(
                                "[{}] no available {} peer in roster",
                                self.local_id, role
                            );
                            if !self.backoff(attempt).await {
                                break;
                            }
                            attempt += 1;
                            continue;
                        }
                    }
                }
                PeerSelector::Passive => {
                    info!("[{}] waiting for peer connections", self.local_id);
                    match self.until_stopped(self.transport.listen_connections()).await {
                        None => break,
                        Some(Ok(requester)) => {
                            info!(
                                "[{}] connection request from peer {}",
                                self.local_id, requester
                            );
                            Target::Inbound {
                                remote_id: requester,
                            }
                        }
                        Some(Err(err)) if err.is_recoverable() => {
                            warn!("[{}] listen failed: {}", self.local_id, err);
                            if !self.backoff(attempt).await {
                                break;
                            }
                            attempt += 1;
                            continue;
                        }
                        Some(Err(err)) => {
                            self.fail(err).await;
                            break;
                        }
                    }
                }
            };

            // Connecting: run the handshake with the resolved remote
            let (remote_id, announce) = match &target {
                Target::Outbound {
                    remote_id,
                    announce,
                } => (remote_id.clone(), *announce),
                Target::Inbound { remote_id } => (remote_id.clone(), false),
            };
            self.set_remote(Some(remote_id.clone())).await;
            self.set_state(ConnectionState::Connecting).await;

            let handshake = match target {
                Target::Outbound { .. } => {
                    self.until_stopped(self.transport.connect_to(&remote_id))
                        .await
                }
                Target::Inbound { .. } => {
                    self.until_stopped(self.transport.accept_connection()).await
                }
            };
            match handshake {
                None => break,
                Some(Ok(())) => {
                    info!("[{}] connected to {}", self.local_id, remote_id);
                }
                Some(Err(err)) if err.is_recoverable() => {
                    warn!(
                        "[{}] handshake with {} failed: {}",
                        self.local_id, remote_id, err
                    );
                    if !self.backoff(attempt).await {
                        break;
                    }
                    attempt += 1;
                    continue;
                }
                Some(Err(err)) => {
                    self.fail(err).await;
                    break;
                }
            }

            if announce {
                let source = ChannelMessage::source(self.local_id.clone());
                match self.until_stopped(self.transport.send(source)).await {
                    None => break,
                    Some(Ok(())) => {}
                    Some(Err(err)) if err.is_recoverable() => {
                        warn!("[{}] source announce failed: {}", self.local_id, err);
                        if !self.backoff(attempt).await {
                            break;
                        }
                        attempt += 1;
                        continue;
                    }
                    Some(Err(err)) => {
                        self.fail(err).await;
                        break;
                    }
                }
            }

            // AwaitingOnline: announce metadata, then wait for readiness
            self.set_state(ConnectionState::AwaitingOnline).await;

            let metadata = ChannelMessage::metadata(self.config.metadata.clone());
            match self.until_stopped(self.transport.send(metadata)).await {
                None => break,
                Some(Ok(())) => {}
                Some(Err(err)) if err.is_recoverable() => {
                    warn!("[{}] metadata send failed: {}", self.local_id, err);
                    if !self.backoff(attempt).await {
                        break;
                    }
                    attempt += 1;
                    continue;
                }
                Some(Err(err)) => {
                    self.fail(err).await;
                    break;
                }
            }

            match self.await_online().await {
                None => break,
                Some(Ok(())) => {}
                Some(Err(err)) if err.is_recoverable() => {
                    warn!(
                        "[{}] transport never came online with {}: {}",
                        self.local_id, remote_id, err
                    );
                    if !self.backoff(attempt).await {
                        break;
                    }
                    attempt += 1;
                    continue;
                }
                Some(Err(err)) => {
                    self.fail(err).await;
                    break;
                }
            }

            // Online: hold for the settle interval, then cycle back to
            // discovery so the endpoint stays available for new peers.
            self.set_state(ConnectionState::Online).await;
            info!("[{}] online with {}", self.local_id, remote_id);
            attempt = 0;

            let settle = Duration::from_millis(self.config.timing.settle_delay_ms);
            if self.until_stopped(tokio::time::sleep(settle)).await.is_none() {
                break;
            }
        }

        debug!("[{}] negotiation cycle stopped", self.local_id);
        match self.fault.lock().expect("fault slot poisoned").take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Bounded wait for the transport to report online
    async fn await_online(&self) -> Option<Result<()>> {
        let deadline = Duration::from_millis(self.config.timing.online_wait_timeout_ms);
        let poll = Duration::from_millis(self.config.timing.online_poll_interval_ms);

        let wait = async {
            loop {
                if self.transport.ready_state().await == PeerReadyState::Online {
                    return;
                }
                tokio::time::sleep(poll).await;
            }
        };

        match self.until_stopped(tokio::time::timeout(deadline, wait)).await {
            None => None,
            Some(Ok(())) => Some(Ok(())),
            Some(Err(_elapsed)) => Some(Err(Error::OnlineTimeout(deadline))),
        }
    }

    /// Inbound event pump: acknowledge, then fan out
    ///
    /// The acknowledge for a `data` message is sent before that message is
    /// handed to any handler, so the counterpart never observes handler
    /// side effects ahead of the acknowledgment.
    async fn pump_events(self: Arc<Self>) {
        loop {
            let event = match self.until_stopped(self.transport.next_event()).await {
                None => break,
                Some(Ok(event)) => event,
                Some(Err(err)) if err.is_recoverable() => {
                    debug!("[{}] event stream ended: {}", self.local_id, err);
                    break;
                }
                Some(Err(err)) => {
                    // A transport fault on the event stream is as fatal as
                    // one on the negotiation path.
                    self.fail(err).await;
                    break;
                }
            };

            match event {
                TransportEvent::Data(value) => {
                    if is_data_message(&value) {
                        let rec_time = value
                            .get("rec_time")
                            .cloned()
                            .unwrap_or(serde_json::Value::Null);
                        let ack = ChannelMessage::acknowledge(rec_time);
                        if let Err(err) = self.transport.send(ack).await {
                            warn!("[{}] acknowledge send failed: {}", self.local_id, err);
                        }
                    }
                    self.handlers.dispatch_data(&value);
                }
                TransportEvent::Frame(frame) => {
                    self.handlers.dispatch_frame(&frame);
                }
                TransportEvent::Closed => {
                    debug!("[{}] transport closed, event pump exiting", self.local_id);
                    break;
                }
            }
        }
    }
}
