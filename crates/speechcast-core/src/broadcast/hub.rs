//! Broadcast hub
//!
//! A single control task owns the client registry. Everything else talks to
//! it over channels through a cloneable [`HubHandle`]:
//!
//! - new clients: registration plus an acknowledgement once inserted
//! - closed clients: unbounded, so deregistration works from `Drop`
//! - publish: message plus an acknowledgement once the hub has taken it
//! - queries: registry snapshots
//!
//! The loop polls these in that priority order and exits once every handle
//! has been dropped.

use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Messages buffered per client before fan-out waits on it
const CLIENT_BUFFER: usize = 1;

/// Identifier of a registered client channel
pub type ClientId = Uuid;

struct Registration {
    id: ClientId,
    sender: mpsc::Sender<String>,
    ack: oneshot::Sender<()>,
}

struct Publication {
    message: String,
    taken: oneshot::Sender<()>,
}

/// Receiving side of one registered client
#[derive(Debug)]
pub struct ClientChannel {
    id: ClientId,
    receiver: mpsc::Receiver<String>,
}

impl ClientChannel {
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Next broadcast message. `None` once the hub has closed this channel.
    pub async fn recv(&mut self) -> Option<String> {
        self.receiver.recv().await
    }
}

/// Cloneable handle to a running hub
#[derive(Clone)]
pub struct HubHandle {
    new_clients: mpsc::UnboundedSender<Registration>,
    closed_clients: mpsc::UnboundedSender<ClientId>,
    publish: mpsc::UnboundedSender<Publication>,
    queries: mpsc::UnboundedSender<oneshot::Sender<Vec<ClientId>>>,
}

impl HubHandle {
    /// Register a fresh client and wait until the hub has inserted it.
    pub async fn register(&self) -> Result<ClientChannel> {
        let (sender, receiver) = mpsc::channel(CLIENT_BUFFER);
        let (ack, acked) = oneshot::channel();
        let id = Uuid::new_v4();

        self.new_clients
            .send(Registration { id, sender, ack })
            .map_err(|_| Error::HubUnavailable)?;
        acked.await.map_err(|_| Error::HubUnavailable)?;

        Ok(ClientChannel { id, receiver })
    }

    /// Ask the hub to drop `id`. Never blocks; unknown ids are ignored.
    pub fn deregister(&self, id: ClientId) {
        if self.closed_clients.send(id).is_err() {
            debug!("Hub already stopped, client {} needs no removal", id);
        }
    }

    /// Send `message` to every client registered when the hub takes it.
    ///
    /// Returns once the hub has taken the message, so a client registered
    /// afterwards never receives it.
    pub async fn publish(&self, message: impl Into<String>) -> Result<()> {
        let (taken, took) = oneshot::channel();
        self.publish
            .send(Publication {
                message: message.into(),
                taken,
            })
            .map_err(|_| Error::HubUnavailable)?;
        took.await.map_err(|_| Error::HubUnavailable)
    }

    /// Snapshot of the registered client ids
    pub async fn clients(&self) -> Result<Vec<ClientId>> {
        let (reply, snapshot) = oneshot::channel();
        self.queries.send(reply).map_err(|_| Error::HubUnavailable)?;
        snapshot.await.map_err(|_| Error::HubUnavailable)
    }

    pub async fn client_count(&self) -> Result<usize> {
        Ok(self.clients().await?.len())
    }
}

/// The registry and its inbound channels, owned by the hub task
pub struct Hub {
    clients: HashMap<ClientId, mpsc::Sender<String>>,
    new_clients: mpsc::UnboundedReceiver<Registration>,
    closed_clients: mpsc::UnboundedReceiver<ClientId>,
    publish: mpsc::UnboundedReceiver<Publication>,
    queries: mpsc::UnboundedReceiver<oneshot::Sender<Vec<ClientId>>>,
}

impl Hub {
    /// Start the hub task on the current runtime.
    pub fn spawn() -> HubHandle {
        let (new_tx, new_rx) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = mpsc::unbounded_channel();
        let (publish_tx, publish_rx) = mpsc::unbounded_channel();
        let (query_tx, query_rx) = mpsc::unbounded_channel();

        let hub = Hub {
            clients: HashMap::new(),
            new_clients: new_rx,
            closed_clients: closed_rx,
            publish: publish_rx,
            queries: query_rx,
        };
        tokio::spawn(hub.listen());

        HubHandle {
            new_clients: new_tx,
            closed_clients: closed_tx,
            publish: publish_tx,
            queries: query_tx,
        }
    }

    async fn listen(mut self) {
        info!("Broadcast hub started");
        loop {
            tokio::select! {
                biased;
                Some(registration) = self.new_clients.recv() => self.add(registration),
                Some(id) = self.closed_clients.recv() => self.remove(id),
                Some(publication) = self.publish.recv() => {
                    let Publication { message, taken } = publication;
                    let _ = taken.send(());
                    self.broadcast(message).await;
                }
                Some(reply) = self.queries.recv() => {
                    self.clients.retain(|_, client| !client.is_closed());
                    let _ = reply.send(self.clients.keys().copied().collect());
                }
                else => break,
            }
        }
        info!("Broadcast hub stopped with {} clients", self.clients.len());
    }

    fn add(&mut self, registration: Registration) {
        let Registration { id, sender, ack } = registration;
        if ack.send(()).is_err() {
            debug!("Client {} abandoned its registration", id);
            return;
        }
        self.clients.insert(id, sender);
        info!("Client added. {} registered clients", self.clients.len());
    }

    fn remove(&mut self, id: ClientId) {
        // Dropping the sender closes the client's receiver.
        if self.clients.remove(&id).is_some() {
            info!("Removed client. {} registered clients", self.clients.len());
        }
    }

    /// Fan `message` out to every client, dropping clients that are gone.
    ///
    /// Each send is awaited in turn, so a client that stops reading stalls
    /// the loop until it reads or goes away.
    async fn broadcast(&mut self, message: String) {
        debug!("Broadcasting to {} clients", self.clients.len());
        let mut gone = Vec::new();
        for (id, client) in &self.clients {
            if client.send(message.clone()).await.is_err() {
                gone.push(*id);
            }
        }
        for id in gone {
            debug!("Client {} went away before the broadcast", id);
            self.remove(id);
        }
    }
}
