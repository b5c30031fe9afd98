// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The single broker connection owned by a client.
//!
//! A [`Connection`] runs one session task at a time. The task opens a
//! session through the [`Connector`], waits for the handshake, replays the
//! [`SubscriptionRegistry`] and then pumps inbound messages into the
//! [`MessageRouter`]. When the session fails, the task consults the
//! [`ReconnectPolicy`](crate::config::ReconnectPolicy) and either sleeps and
//! starts over or stops.
//!
//! The connection is the only writer of its [`ConnectionStatus`]. Every
//! `connect` and `disconnect` starts a new generation, and writes tagged with
//! an older generation are discarded, so a session task that outlives
//! `disconnect` cannot resurrect the connection.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::ConnectOptions;
use crate::error::{ConnectionFailure, Error, ProtocolError};
use crate::event::{ClientEvent, EventBus};
use crate::subscription::{MessageRouter, SubscriptionRegistry};
use crate::types::ConnectionState;

use super::{Connector, Endpoint, Link, Session, SessionEvent};

/// Time `disconnect` lets the session task flush the DISCONNECT packet
/// before aborting it.
const DISCONNECT_GRACE: Duration = Duration::from_millis(500);

/// Observable status of a connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStatus {
    state: ConnectionState,
    endpoint: Option<Endpoint>,
    last_error: Option<ConnectionFailure>,
}

impl ConnectionStatus {
    /// Returns the connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns the endpoint of the current or last session.
    #[must_use]
    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    /// Returns the last connect failure or socket closure.
    ///
    /// Cleared on a successful handshake and on `disconnect`.
    #[must_use]
    pub fn last_error(&self) -> Option<&ConnectionFailure> {
        self.last_error.as_ref()
    }
}

#[derive(Debug, Default)]
struct Tracked {
    status: ConnectionStatus,
    generation: u64,
}

/// Why a session ended.
enum Failure {
    Handshake(String),
    Closed(String),
    Lost(String),
    Superseded,
}

struct Inner<L> {
    status: watch::Sender<Tracked>,
    link: RwLock<Option<(u64, L)>>,
    session: Mutex<Option<JoinHandle<()>>>,
    replay: Mutex<Option<(u64, JoinHandle<()>)>>,
    events: EventBus,
    router: Arc<MessageRouter>,
    registry: Arc<SubscriptionRegistry>,
}

impl<L: Link> Inner<L> {
    fn is_current(&self, generation: u64) -> bool {
        self.status.borrow().generation == generation
    }

    /// Applies a transition on behalf of `generation`. Returns `false` if
    /// the generation is stale or the transition is not allowed.
    fn transition(
        &self,
        generation: u64,
        to: ConnectionState,
        error: Option<ConnectionFailure>,
    ) -> bool {
        self.status.send_if_modified(|tracked| {
            if tracked.generation != generation {
                tracing::debug!(generation, to = %to, "Ignoring state change from stale session");
                return false;
            }
            let from = tracked.status.state;
            if !from.can_transition_to(to) {
                tracing::warn!(from = %from, to = %to, "Rejected invalid state transition");
                return false;
            }
            apply(tracked, &self.events, to, error);
            true
        })
    }

    /// Starts a new generation and moves to `to` unconditionally, provided
    /// the transition is legal. Returns the new generation.
    fn begin(&self, to: ConnectionState, endpoint: Option<Endpoint>) -> u64 {
        let mut generation = 0;
        self.status.send_if_modified(|tracked| {
            tracked.generation += 1;
            generation = tracked.generation;
            if endpoint.is_some() {
                tracked.status.endpoint = endpoint;
            }
            if !tracked.status.state.can_transition_to(to) {
                return false;
            }
            apply(tracked, &self.events, to, None);
            true
        });
        generation
    }

    fn install_link(&self, generation: u64, link: L) -> bool {
        let mut slot = self.link.write();
        if !self.is_current(generation) {
            return false;
        }
        *slot = Some((generation, link));
        true
    }

    fn clear_link(&self, generation: u64) {
        let mut slot = self.link.write();
        if slot.as_ref().is_some_and(|(owner, _)| *owner == generation) {
            *slot = None;
        }
    }

    /// Tracks the subscription replay of `generation`. A replay started by
    /// a superseded session is aborted at once.
    fn track_replay(&self, generation: u64, task: JoinHandle<()>) {
        let mut slot = self.replay.lock();
        if !self.is_current(generation) {
            task.abort();
            return;
        }
        if let Some((_, previous)) = slot.replace((generation, task)) {
            previous.abort();
        }
    }

    /// Aborts the replay task and waits until it has stopped, so it cannot
    /// mark a topic as issued afterwards. With `Some(generation)`, only a
    /// replay of that generation is stopped.
    async fn stop_replay(&self, generation: Option<u64>) {
        let task = {
            let mut slot = self.replay.lock();
            let foreign = matches!(
                (slot.as_ref(), generation),
                (Some((owner, _)), Some(generation)) if *owner != generation
            );
            if foreign { None } else { slot.take() }
        };
        if let Some((_, task)) = task {
            task.abort();
            let _ = task.await;
        }
    }
}

fn apply(
    tracked: &mut Tracked,
    events: &EventBus,
    to: ConnectionState,
    error: Option<ConnectionFailure>,
) {
    let from = tracked.status.state;
    tracked.status.state = to;
    match (&error, to) {
        (Some(failure), _) => tracked.status.last_error = Some(failure.clone()),
        (None, ConnectionState::Connected | ConnectionState::Disconnected) => {
            tracked.status.last_error = None;
        }
        (None, _) => {}
    }
    tracing::debug!(from = %from, to = %to, error = ?error, "Connection state changed");
    events.publish(ClientEvent::StateChanged { from, to, error });
}

/// A broker connection with automatic reconnection.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use thermolink::config::ConnectOptions;
/// use thermolink::event::EventBus;
/// use thermolink::protocol::{Connection, LoopbackBroker};
/// use thermolink::subscription::{MessageRouter, SubscriptionRegistry};
/// use thermolink::types::ConnectionState;
///
/// # #[tokio::main]
/// # async fn main() -> thermolink::Result<()> {
/// let events = EventBus::new();
/// let connection = Connection::new(
///     LoopbackBroker::new(),
///     Arc::new(MessageRouter::new(events.clone())),
///     Arc::new(SubscriptionRegistry::new()),
///     events,
/// );
///
/// connection.connect("mqtt://loopback", ConnectOptions::default())?;
/// connection
///     .wait_for_state(ConnectionState::Connected, Duration::from_secs(1))
///     .await?;
/// connection.send("pi/fan_state", b"ON".to_vec()).await?;
/// connection.disconnect().await;
/// # Ok(())
/// # }
/// ```
pub struct Connection<C: Connector> {
    connector: Arc<C>,
    inner: Arc<Inner<C::Link>>,
}

impl<C: Connector> Connection<C> {
    /// Creates a disconnected connection.
    pub fn new(
        connector: C,
        router: Arc<MessageRouter>,
        registry: Arc<SubscriptionRegistry>,
        events: EventBus,
    ) -> Self {
        let (status, _) = watch::channel(Tracked::default());
        Self {
            connector: Arc::new(connector),
            inner: Arc::new(Inner {
                status,
                link: RwLock::new(None),
                session: Mutex::new(None),
                replay: Mutex::new(None),
                events,
                router,
                registry,
            }),
        }
    }

    /// Starts connecting to `endpoint` and returns immediately.
    ///
    /// Progress is reported through the state and the event bus. Does
    /// nothing if a session is already connecting or connected.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::InvalidAddress` for an unparsable endpoint and
    /// `ProtocolError::NoRuntime` when called outside a tokio runtime.
    pub fn connect(&self, endpoint: &str, options: ConnectOptions) -> Result<(), Error> {
        let endpoint = Endpoint::parse(endpoint)?;
        let handle = Handle::try_current().map_err(|_| ProtocolError::NoRuntime)?;

        let mut session = self.inner.session.lock();
        if self.state().is_active() {
            tracing::debug!(endpoint = %endpoint, "Already connecting or connected");
            return Ok(());
        }
        if let Some(previous) = session.take() {
            previous.abort();
        }

        tracing::info!(endpoint = %endpoint, "Connecting to broker");
        let generation = self
            .inner
            .begin(ConnectionState::Connecting, Some(endpoint.clone()));
        *session = Some(handle.spawn(run_session(
            Arc::clone(&self.connector),
            Arc::clone(&self.inner),
            endpoint,
            options,
            generation,
        )));
        Ok(())
    }

    /// Closes the connection and cancels any pending reconnect.
    ///
    /// Sends a best-effort DISCONNECT when a session is live. Idempotent.
    pub async fn disconnect(&self) {
        let task = {
            let mut session = self.inner.session.lock();
            let task = session.take();
            self.inner.begin(ConnectionState::Disconnected, None);
            task
        };
        let link = self.inner.link.write().take();
        self.inner.stop_replay(None).await;

        if let Some((_, link)) = link {
            if let Err(e) = link.disconnect().await {
                tracing::debug!(error = %e, "DISCONNECT not delivered");
            }
            if let Some(mut task) = task {
                if tokio::time::timeout(DISCONNECT_GRACE, &mut task).await.is_err() {
                    task.abort();
                }
            }
        } else if let Some(task) = task {
            task.abort();
        }

        self.inner.registry.mark_all_pending();
        tracing::info!("Disconnected from broker");
    }

    /// Publishes a payload on the live session.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotConnected` unless the state is `Connected`, and
    /// `Error::Protocol` if the transport rejects the request.
    pub async fn send(&self, topic: &str, payload: Vec<u8>) -> Result<(), Error> {
        let link = self.live_link().ok_or(Error::NotConnected)?;
        link.publish(topic, payload).await?;
        tracing::debug!(topic = %topic, "Message sent");
        Ok(())
    }

    /// Returns the link of the current session while `Connected`.
    pub(crate) fn live_link(&self) -> Option<C::Link> {
        if self.state() != ConnectionState::Connected {
            return None;
        }
        self.inner.link.read().as_ref().map(|(_, link)| link.clone())
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.status.borrow().status.state
    }

    /// Returns a snapshot of the status.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.inner.status.borrow().status.clone()
    }

    /// Waits until the connection reaches `state`.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::Timeout` if the state is not reached in time.
    pub async fn wait_for_state(
        &self,
        state: ConnectionState,
        timeout: Duration,
    ) -> Result<(), Error> {
        let mut rx = self.inner.status.subscribe();
        match tokio::time::timeout(timeout, rx.wait_for(|t| t.status.state == state)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(ProtocolError::ChannelClosed("connection status".to_string()).into()),
            Err(_) => Err(ProtocolError::Timeout(millis(timeout)).into()),
        }
    }
}

impl<C: Connector> Drop for Connection<C> {
    fn drop(&mut self) {
        if let Some(task) = self.inner.session.lock().take() {
            task.abort();
        }
    }
}

impl<C: Connector> std::fmt::Debug for Connection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

async fn run_session<C: Connector>(
    connector: Arc<C>,
    inner: Arc<Inner<C::Link>>,
    endpoint: Endpoint,
    options: ConnectOptions,
    generation: u64,
) {
    let policy = options.reconnect().clone();
    let mut attempt: u32 = 0;

    loop {
        if attempt > 0 && !inner.transition(generation, ConnectionState::Connecting, None) {
            return;
        }

        let failure = match establish(&*connector, &inner, &endpoint, &options, generation).await {
            Ok(session) => {
                attempt = 0;
                pump(&inner, session).await
            }
            Err(failure) => failure,
        };

        inner.clear_link(generation);
        inner.stop_replay(Some(generation)).await;
        if !inner.is_current(generation) {
            return;
        }
        inner.registry.mark_all_pending();

        let applied = match failure {
            Failure::Handshake(reason) => {
                tracing::warn!(endpoint = %endpoint, reason = %reason, "Broker handshake failed");
                let error = ConnectionFailure::ConnectFailure(reason);
                inner.transition(generation, ConnectionState::Error, Some(error))
            }
            Failure::Closed(reason) => {
                tracing::info!(endpoint = %endpoint, reason = %reason, "Broker closed the session");
                let error = ConnectionFailure::SocketClosed(reason);
                inner.transition(generation, ConnectionState::Disconnected, Some(error))
            }
            Failure::Lost(reason) => {
                tracing::error!(endpoint = %endpoint, reason = %reason, "Broker session failed");
                let error = ConnectionFailure::SocketClosed(reason);
                inner.transition(generation, ConnectionState::Error, Some(error))
            }
            Failure::Superseded => false,
        };
        if !applied {
            return;
        }

        attempt = attempt.saturating_add(1);
        let Some(delay) = policy.delay_for(attempt) else {
            tracing::info!(attempts = attempt - 1, "Not reconnecting");
            return;
        };
        tracing::debug!(attempt, delay_ms = millis(delay), "Reconnect scheduled");
        inner
            .events
            .publish(ClientEvent::ReconnectScheduled { attempt, delay });
        tokio::time::sleep(delay).await;
    }
}

async fn establish<C: Connector>(
    connector: &C,
    inner: &Arc<Inner<C::Link>>,
    endpoint: &Endpoint,
    options: &ConnectOptions,
    generation: u64,
) -> Result<C::Session, Failure> {
    let (link, mut session) = connector
        .open(endpoint, options)
        .map_err(|e| Failure::Handshake(e.to_string()))?;

    let handshake = async {
        loop {
            match session.poll().await? {
                SessionEvent::ConnAck => return Ok(()),
                SessionEvent::Closed(reason) => return Err(ProtocolError::Connection(reason)),
                SessionEvent::Message(_) | SessionEvent::Idle => {}
            }
        }
    };
    let outcome = match options.handshake_timeout() {
        Some(limit) => tokio::time::timeout(limit, handshake)
            .await
            .unwrap_or(Err(ProtocolError::Timeout(millis(limit)))),
        None => handshake.await,
    };
    outcome.map_err(|e| Failure::Handshake(e.to_string()))?;

    if !inner.install_link(generation, link.clone()) {
        return Err(Failure::Superseded);
    }
    if !inner.transition(generation, ConnectionState::Connected, None) {
        return Err(Failure::Superseded);
    }
    tracing::info!(endpoint = %endpoint, "Connected to broker");

    // The session task must keep polling for requests to flow, so the
    // replay runs beside it.
    let registry = Arc::clone(&inner.registry);
    let replay = tokio::spawn(async move {
        registry.reconcile(&link).await;
    });
    inner.track_replay(generation, replay);

    Ok(session)
}

async fn pump<L: Link, S: Session>(inner: &Arc<Inner<L>>, mut session: S) -> Failure {
    loop {
        match session.poll().await {
            Ok(SessionEvent::Message(message)) => {
                inner.router.dispatch(&message);
            }
            Ok(SessionEvent::Closed(reason)) => return Failure::Closed(reason),
            Ok(SessionEvent::ConnAck | SessionEvent::Idle) => {}
            Err(e) => return Failure::Lost(e.to_string()),
        }
    }
}
