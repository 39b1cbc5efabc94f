//! # Protocol Worker
//!
//! One tokio task owns the [`SessionCoordinator`]. Commands from
//! [`CoordinatorHandle`]s and notifications from the bus runtime share one
//! unbounded queue, so every protocol-affecting event is applied in a single
//! total order. A second task pumps the notification stream into the queue.
//!
//! ```text
//! CoordinatorHandle ──Command──┐
//!                              ├──► queue ──► worker (SessionCoordinator)
//! NotificationStream ──pump────┘                    │
//!                                                   └──► broadcast<CoordinatorEvent>
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use shared_types::entities::{BusId, SessionId, SessionPort, WellKnownName};
use shared_types::ipc::BusNotification;
use shared_types::policy::AcceptPolicy;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info};

use crate::domain::{CoordinatorEvent, ProtocolError};
use crate::ports::{ChannelApi, ChannelStatus, SendOutcome};
use crate::service::SessionCoordinator;

pub(crate) type Reply<T> = oneshot::Sender<Result<T, ProtocolError>>;

/// A caller request, answered through its reply channel.
pub(crate) enum Command {
    Connect(Reply<BusId>),
    HostChannel(String, Reply<WellKnownName>),
    StopHosting(Reply<()>),
    StartDiscovery(Reply<()>),
    StopDiscovery(Reply<()>),
    UseChannel(WellKnownName, Reply<SessionId>),
    LeaveChannel(Reply<()>),
    Send(Vec<u8>, Reply<SendOutcome>),
    Leave(Reply<()>),
    Disconnect(Reply<()>),
    Status(Reply<ChannelStatus>),
    RequestName(WellKnownName, Reply<()>),
    ReleaseName(WellKnownName, Reply<()>),
    Advertise(WellKnownName, Reply<()>),
    CancelAdvertise(WellKnownName, Reply<()>),
    FindPrefix(String, Reply<()>),
    CancelPrefix(String, Reply<()>),
    BindPort(SessionPort, Arc<dyn AcceptPolicy>, Reply<SessionPort>),
    UnbindPort(SessionPort, Reply<()>),
    JoinSession(WellKnownName, SessionPort, Reply<SessionId>),
    LeaveSession(SessionId, Reply<()>),
}

pub(crate) enum WorkerMessage {
    Command(Command),
    Notification(BusNotification),
    Stop,
}

/// Answer a caller. A caller that gave up waiting is not an error.
fn answer<T>(reply: Reply<T>, result: Result<T, ProtocolError>) {
    let _ = reply.send(result);
}

impl SessionCoordinator {
    async fn execute(&mut self, command: Command) {
        match command {
            Command::Connect(reply) => answer(reply, self.connect().await),
            Command::HostChannel(instance, reply) => answer(reply, self.host_channel(&instance).await),
            Command::StopHosting(reply) => answer(reply, self.stop_hosting().await),
            Command::StartDiscovery(reply) => answer(reply, self.start_discovery().await),
            Command::StopDiscovery(reply) => answer(reply, self.stop_discovery().await),
            Command::UseChannel(name, reply) => answer(reply, self.use_channel(&name).await),
            Command::LeaveChannel(reply) => answer(reply, self.leave_channel().await),
            Command::Send(payload, reply) => answer(reply, self.send(payload).await),
            Command::Leave(reply) => answer(reply, self.leave().await),
            Command::Disconnect(reply) => answer(reply, self.disconnect().await),
            Command::Status(reply) => answer(reply, Ok(self.status())),
            Command::RequestName(name, reply) => answer(reply, self.request_name(name).await),
            Command::ReleaseName(name, reply) => answer(reply, self.release_name(name).await),
            Command::Advertise(name, reply) => answer(reply, self.advertise(name).await),
            Command::CancelAdvertise(name, reply) => {
                answer(reply, self.cancel_advertise(name).await)
            }
            Command::FindPrefix(prefix, reply) => answer(reply, self.find_prefix(prefix).await),
            Command::CancelPrefix(prefix, reply) => answer(reply, self.cancel_prefix(prefix).await),
            Command::BindPort(hint, policy, reply) => {
                answer(reply, self.bind_port(hint, policy).await)
            }
            Command::UnbindPort(port, reply) => answer(reply, self.unbind_port(port).await),
            Command::JoinSession(host, port, reply) => {
                answer(reply, self.join_session(host, port).await)
            }
            Command::LeaveSession(id, reply) => answer(reply, self.leave_session(id).await),
        }
    }
}

/// Start the worker for `coordinator`, fed by `notifications`.
///
/// Must be called inside a tokio runtime. The worker runs until
/// [`CoordinatorHandle::shutdown`] is called or the notification stream
/// ends and every handle is dropped.
pub fn spawn<S>(coordinator: SessionCoordinator, notifications: S) -> (CoordinatorHandle, JoinHandle<()>)
where
    S: Stream<Item = BusNotification> + Send + Unpin + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = CoordinatorHandle {
        tx: tx.clone(),
        events: coordinator.event_sender(),
        unique_name: coordinator.local().clone(),
    };
    let pump = tokio::spawn(pump(notifications, tx));
    let task = tokio::spawn(run(coordinator, rx, pump));
    (handle, task)
}

async fn pump<S>(mut notifications: S, tx: mpsc::UnboundedSender<WorkerMessage>)
where
    S: Stream<Item = BusNotification> + Unpin,
{
    while let Some(notification) = notifications.next().await {
        if tx.send(WorkerMessage::Notification(notification)).is_err() {
            return;
        }
    }
    debug!("Notification stream ended");
}

async fn run(
    mut coordinator: SessionCoordinator,
    mut rx: mpsc::UnboundedReceiver<WorkerMessage>,
    pump: JoinHandle<()>,
) {
    info!(unique_name = %coordinator.local(), "Protocol worker started");
    while let Some(message) = rx.recv().await {
        match message {
            WorkerMessage::Command(command) => coordinator.execute(command).await,
            WorkerMessage::Notification(notification) => {
                coordinator.on_notification(notification).await;
            }
            WorkerMessage::Stop => break,
        }
    }
    pump.abort();
    info!(unique_name = %coordinator.local(), "Protocol worker stopped");
}

/// Cloneable handle to a running protocol worker.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::UnboundedSender<WorkerMessage>,
    events: broadcast::Sender<CoordinatorEvent>,
    unique_name: BusId,
}

impl std::fmt::Debug for CoordinatorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinatorHandle")
            .field("unique_name", &self.unique_name)
            .finish_non_exhaustive()
    }
}

impl CoordinatorHandle {
    async fn call<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T, ProtocolError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(WorkerMessage::Command(command(reply)))
            .map_err(|_| ProtocolError::WorkerStopped)?;
        response.await.map_err(|_| ProtocolError::WorkerStopped)?
    }

    /// Subscribe to coordinator events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.events.subscribe()
    }

    /// Unique name of the peer this handle drives.
    #[must_use]
    pub fn unique_name(&self) -> &BusId {
        &self.unique_name
    }

    /// Stop the worker after the messages already queued. Protocol state is
    /// dropped as is; call [`ChannelApi::leave`] first for a clean exit.
    pub fn shutdown(&self) {
        let _ = self.tx.send(WorkerMessage::Stop);
    }
}

#[async_trait]
impl ChannelApi for CoordinatorHandle {
    async fn connect(&self) -> Result<BusId, ProtocolError> {
        self.call(Command::Connect).await
    }

    async fn host_channel(&self, instance: &str) -> Result<WellKnownName, ProtocolError> {
        let instance = instance.to_string();
        self.call(|reply| Command::HostChannel(instance, reply)).await
    }

    async fn stop_hosting(&self) -> Result<(), ProtocolError> {
        self.call(Command::StopHosting).await
    }

    async fn start_discovery(&self) -> Result<(), ProtocolError> {
        self.call(Command::StartDiscovery).await
    }

    async fn stop_discovery(&self) -> Result<(), ProtocolError> {
        self.call(Command::StopDiscovery).await
    }

    async fn use_channel(&self, name: &WellKnownName) -> Result<SessionId, ProtocolError> {
        let name = name.clone();
        self.call(|reply| Command::UseChannel(name, reply)).await
    }

    async fn leave_channel(&self) -> Result<(), ProtocolError> {
        self.call(Command::LeaveChannel).await
    }

    async fn send(&self, payload: Vec<u8>) -> Result<SendOutcome, ProtocolError> {
        self.call(|reply| Command::Send(payload, reply)).await
    }

    async fn leave(&self) -> Result<(), ProtocolError> {
        self.call(Command::Leave).await
    }

    async fn disconnect(&self) -> Result<(), ProtocolError> {
        self.call(Command::Disconnect).await
    }

    async fn status(&self) -> Result<ChannelStatus, ProtocolError> {
        self.call(Command::Status).await
    }

    async fn request_name(&self, name: WellKnownName) -> Result<(), ProtocolError> {
        self.call(|reply| Command::RequestName(name, reply)).await
    }

    async fn release_name(&self, name: WellKnownName) -> Result<(), ProtocolError> {
        self.call(|reply| Command::ReleaseName(name, reply)).await
    }

    async fn advertise(&self, name: WellKnownName) -> Result<(), ProtocolError> {
        self.call(|reply| Command::Advertise(name, reply)).await
    }

    async fn cancel_advertise(&self, name: WellKnownName) -> Result<(), ProtocolError> {
        self.call(|reply| Command::CancelAdvertise(name, reply)).await
    }

    async fn find_prefix(&self, prefix: String) -> Result<(), ProtocolError> {
        self.call(|reply| Command::FindPrefix(prefix, reply)).await
    }

    async fn cancel_prefix(&self, prefix: String) -> Result<(), ProtocolError> {
        self.call(|reply| Command::CancelPrefix(prefix, reply)).await
    }

    async fn bind_port(
        &self,
        hint: SessionPort,
        policy: Arc<dyn AcceptPolicy>,
    ) -> Result<SessionPort, ProtocolError> {
        self.call(|reply| Command::BindPort(hint, policy, reply)).await
    }

    async fn unbind_port(&self, port: SessionPort) -> Result<(), ProtocolError> {
        self.call(|reply| Command::UnbindPort(port, reply)).await
    }

    async fn join_session(
        &self,
        host: WellKnownName,
        port: SessionPort,
    ) -> Result<SessionId, ProtocolError> {
        self.call(|reply| Command::JoinSession(host, port, reply)).await
    }

    async fn leave_session(&self, session_id: SessionId) -> Result<(), ProtocolError> {
        self.call(|reply| Command::LeaveSession(session_id, reply)).await
    }
}
