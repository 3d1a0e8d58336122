//! The gateway worker: multiplexes outgoing transactions and incoming
//! notifications over one gateway's sessions
// (c) 2026 OpenNetty contributors
//!
//! A `GatewayWorker` owns exactly one long-lived `Event` [`Session`] (opened
//! once, reopened on failure with backoff) plus opens a `Command` session on
//! demand for each outgoing [`Transaction`]. Outgoing requests are serialized
//! through a bounded `mpsc` queue so a slow gateway applies backpressure to
//! callers rather than buffering unboundedly; each transaction's outcome is
//! delivered through a one-shot completion slot, matching the
//! submit-then-await-a-oneshot pattern used for worker-to-caller results
//! elsewhere in this kind of async service.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::TransactionError;
use crate::protocol::{Message, Protocol};
use crate::session::{Credential, Session, SessionType};
use crate::transport::{Connection, TransportDescriptor};

/// Per-protocol retry/timeout tuning, per spec.md §4.5/§7.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// maximum dispatch attempts for one transaction
    pub max_attempts: u32,
    /// backoff before each retry, indexed by attempt number (0-based, clamped
    /// to the last entry once exhausted)
    pub backoff: &'static [Duration],
    /// how long to wait for a response before declaring `TransactionTimeout`
    pub response_timeout: Duration,
}

impl RetryPolicy {
    /// The fixed retry policy for `protocol`, per spec.md §4.5.
    #[must_use]
    pub fn for_protocol(protocol: Protocol) -> Self {
        const SCS_BACKOFF: &[Duration] = &[
            Duration::from_millis(100),
            Duration::from_millis(200),
            Duration::from_millis(400),
        ];
        const NITOO_BACKOFF: &[Duration] = &[
            Duration::from_millis(200),
            Duration::from_millis(400),
            Duration::from_millis(800),
            Duration::from_millis(1600),
            Duration::from_millis(3200),
        ];
        const ZIGBEE_BACKOFF: &[Duration] = &[
            Duration::from_millis(150),
            Duration::from_millis(300),
            Duration::from_millis(600),
            Duration::from_millis(1200),
        ];
        match protocol {
            Protocol::Scs => Self {
                max_attempts: 3,
                backoff: SCS_BACKOFF,
                response_timeout: Duration::from_secs(2),
            },
            Protocol::Nitoo => Self {
                max_attempts: 5,
                backoff: NITOO_BACKOFF,
                response_timeout: Duration::from_secs(4),
            },
            Protocol::Zigbee => Self {
                max_attempts: 4,
                backoff: ZIGBEE_BACKOFF,
                response_timeout: Duration::from_secs(3),
            },
        }
    }

    fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let idx = (attempt as usize).min(self.backoff.len() - 1);
        self.backoff[idx]
    }
}

/// Backoff schedule for reopening a failed event session, per spec.md §4.5.
const OPEN_BACKOFF: &[Duration] = &[
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(5),
    Duration::from_secs(10),
];

/// Static connection and authentication parameters for one gateway.
#[derive(Debug, Clone)]
pub struct GatewayEndpoint {
    /// human-readable name, used in logs/spans
    pub name: String,
    /// dialect this gateway speaks
    pub protocol: Protocol,
    /// how to reach it
    pub transport: TransportDescriptor,
    /// credential, if the gateway requires authentication
    pub credential: Option<Credential>,
    /// per-session-open deadline
    pub open_deadline: Duration,
}

/// A pending outgoing request awaiting resolution.
struct Transaction {
    message: Message,
    /// cancels this transaction specifically, independent of the worker's
    /// own shutdown token
    cancel: CancellationToken,
    completion: oneshot::Sender<Result<Vec<Message>, TransactionError>>,
}

/// Handle to a submitted transaction's eventual outcome: the ordered
/// dimension-read replies observed before the terminating ACK, per spec.md
/// §4.6 (empty for commands that carry no dimension reads).
pub type TransactionHandle = oneshot::Receiver<Result<Vec<Message>, TransactionError>>;

/// Produces a token that is cancelled as soon as either `a` or `b` is,
/// so a per-call cancellation and the worker's own shutdown token can both
/// interrupt a single in-flight dispatch.
fn merge_cancellation(a: &CancellationToken, b: &CancellationToken) -> CancellationToken {
    let merged = CancellationToken::new();
    let merged_task = merged.clone();
    let a = a.clone();
    let b = b.clone();
    tokio::spawn(async move {
        tokio::select! {
            () = a.cancelled() => {}
            () = b.cancelled() => {}
        }
        merged_task.cancel();
    });
    merged
}

/// Owns a gateway's event and command sessions, serializes outgoing
/// transactions, applies the gateway's retry policy, and republishes inbound
/// notifications on a broadcast channel.
pub struct GatewayWorker {
    endpoint: GatewayEndpoint,
    outgoing: mpsc::Sender<Transaction>,
    publish: broadcast::Sender<Message>,
}

impl std::fmt::Debug for GatewayWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayWorker")
            .field("name", &self.endpoint.name)
            .field("protocol", &self.endpoint.protocol)
            .finish()
    }
}

/// Outgoing queue depth: bounded so a stalled gateway applies backpressure
/// rather than growing memory without limit.
const OUTGOING_QUEUE_DEPTH: usize = 64;
/// Publish channel depth: bounded per spec.md §9's drop-oldest slow-consumer
/// policy (native to `broadcast`, surfaced via `RecvError::Lagged`).
const PUBLISH_CHANNEL_DEPTH: usize = 256;

impl GatewayWorker {
    /// Spawns the worker's event-session task and returns a handle plus the
    /// task's `JoinHandle` so the caller can await shutdown.
    pub fn spawn(endpoint: GatewayEndpoint, cancel: CancellationToken) -> (Arc<Self>, tokio::task::JoinHandle<()>) {
        let (outgoing_tx, outgoing_rx) = mpsc::channel(OUTGOING_QUEUE_DEPTH);
        let (publish_tx, _) = broadcast::channel(PUBLISH_CHANNEL_DEPTH);

        let worker = Arc::new(Self {
            endpoint: endpoint.clone(),
            outgoing: outgoing_tx,
            publish: publish_tx.clone(),
        });

        let run_endpoint = endpoint;
        let run_cancel = cancel;
        let handle = tokio::spawn(async move {
            run(run_endpoint, outgoing_rx, publish_tx, run_cancel).await;
        });

        (worker, handle)
    }

    /// Submits a message for dispatch, returning a handle to its eventual
    /// outcome. Fails immediately if the worker's queue is gone (worker
    /// task exited) or if `cancel` is already cancelled. Per spec.md §5,
    /// cancelling `cancel` after this returns still removes the
    /// transaction from the queue if it hasn't been dispatched yet.
    pub async fn submit(
        &self,
        message: Message,
        cancel: CancellationToken,
    ) -> Result<TransactionHandle, TransactionError> {
        if cancel.is_cancelled() {
            return Err(TransactionError::Cancelled);
        }
        let (tx, rx) = oneshot::channel();
        self.outgoing
            .send(Transaction { message, cancel, completion: tx })
            .await
            .map_err(|_| TransactionError::SessionClosed)?;
        Ok(rx)
    }

    /// Subscribes to this gateway's inbound message stream.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.publish.subscribe()
    }

    /// The gateway this worker serves.
    #[must_use]
    pub fn endpoint(&self) -> &GatewayEndpoint {
        &self.endpoint
    }
}

#[instrument(skip(outgoing_rx, publish_tx, cancel), fields(gateway = %endpoint.name))]
async fn run(
    endpoint: GatewayEndpoint,
    mut outgoing_rx: mpsc::Receiver<Transaction>,
    publish_tx: broadcast::Sender<Message>,
    cancel: CancellationToken,
) {
    let policy = RetryPolicy::for_protocol(endpoint.protocol);

    let reader_cancel = cancel.clone();
    let reader_endpoint = endpoint.clone();
    let reader_publish = publish_tx.clone();
    let reader = tokio::spawn(async move {
        event_reader_loop(reader_endpoint, reader_publish, reader_cancel).await;
    });

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                info!("worker shutting down");
                break;
            }
            maybe_txn = outgoing_rx.recv() => {
                let Some(txn) = maybe_txn else { break };
                if txn.cancel.is_cancelled() {
                    let _ = txn.completion.send(Err(TransactionError::Cancelled));
                    continue;
                }
                let dispatch_cancel = merge_cancellation(&cancel, &txn.cancel);
                let outcome = dispatch_with_retries(&endpoint, &policy, &txn.message, &dispatch_cancel).await;
                let _ = txn.completion.send(outcome);
            }
        }
    }
    reader.abort();
}

/// Keeps one long-lived event session open, republishing every inbound
/// message, reopening with [`OPEN_BACKOFF`] on failure.
async fn event_reader_loop(
    endpoint: GatewayEndpoint,
    publish_tx: broadcast::Sender<Message>,
    cancel: CancellationToken,
) {
    let mut backoff_idx = 0usize;
    loop {
        if cancel.is_cancelled() {
            return;
        }
        match open_session(&endpoint, SessionType::Event, &cancel).await {
            Ok(mut session) => {
                backoff_idx = 0;
                loop {
                    tokio::select! {
                        () = cancel.cancelled() => return,
                        result = session.recv_message(&cancel) => {
                            match result {
                                Ok(message) => {
                                    let _ = publish_tx.send(message);
                                }
                                Err(e) => {
                                    warn!(error = %e, "event session lost");
                                    break;
                                }
                            }
                        }
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to open event session");
            }
        }
        let delay = OPEN_BACKOFF[backoff_idx.min(OPEN_BACKOFF.len() - 1)];
        backoff_idx += 1;
        tokio::select! {
            () = cancel.cancelled() => return,
            () = tokio::time::sleep(delay) => {}
        }
    }
}

async fn open_session(
    endpoint: &GatewayEndpoint,
    session_type: SessionType,
    cancel: &CancellationToken,
) -> Result<Session, crate::error::SessionError> {
    let connection = Connection::open(&endpoint.transport, endpoint.open_deadline).await?;
    Session::open(
        connection,
        endpoint.protocol,
        session_type,
        endpoint.credential.as_ref(),
        cancel,
    )
    .await
}

/// Dispatches one message on a fresh command session, retrying per `policy`
/// until it succeeds, is rejected outright, or the attempt budget is spent.
async fn dispatch_with_retries(
    endpoint: &GatewayEndpoint,
    policy: &RetryPolicy,
    message: &Message,
    cancel: &CancellationToken,
) -> Result<Vec<Message>, TransactionError> {
    let mut last_error = TransactionError::TransactionTimeout;
    for attempt in 0..policy.max_attempts {
        if cancel.is_cancelled() {
            return Err(TransactionError::Cancelled);
        }
        match dispatch_once(endpoint, policy, message, cancel).await {
            Ok(reply) => return Ok(reply),
            Err(TransactionError::GatewayRejected) => return Err(TransactionError::GatewayRejected),
            Err(e) => {
                debug!(attempt, error = %e, "transaction attempt failed, may retry");
                last_error = e;
                if !last_error.is_retryable() || attempt + 1 >= policy.max_attempts {
                    break;
                }
                let delay = policy.backoff_for_attempt(attempt);
                tokio::select! {
                    () = cancel.cancelled() => return Err(TransactionError::Cancelled),
                    () = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
    Err(last_error)
}

/// Dispatches `message` on one fresh command session. Per spec.md §4.5 step
/// 3, collects response frames in order until a terminator (ACK/NACK/Busy)
/// is observed: ACK succeeds with the accumulated dimension-read list
/// (possibly empty), NACK and Busy fail without returning the partial list.
async fn dispatch_once(
    endpoint: &GatewayEndpoint,
    policy: &RetryPolicy,
    message: &Message,
    cancel: &CancellationToken,
) -> Result<Vec<Message>, TransactionError> {
    let mut session = open_session(endpoint, SessionType::Command, cancel)
        .await
        .map_err(|_| TransactionError::SessionClosed)?;

    session
        .send_frame(&message.to_frame(), cancel)
        .await
        .map_err(|_| TransactionError::SessionClosed)?;

    let mut responses = Vec::new();
    loop {
        let reply = tokio::time::timeout(policy.response_timeout, session.recv_message(cancel))
            .await
            .map_err(|_| TransactionError::TransactionTimeout)?
            .map_err(|_| TransactionError::SessionClosed)?;

        match reply {
            Message::Ack => {
                session.close().await;
                return Ok(responses);
            }
            Message::Nack => {
                session.close().await;
                return Err(TransactionError::GatewayRejected);
            }
            Message::Busy => {
                session.close().await;
                return Err(TransactionError::GatewayBusy);
            }
            other => responses.push(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// A minimal in-process gateway stub: accepts a command session, replies
    /// with a scripted sequence of frames to successive connections, then
    /// an event session that never sends anything.
    async fn spawn_busy_then_ack_gateway(busy_count: usize) -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut attempts = 0usize;
            loop {
                let (mut sock, _) = listener.accept().await.unwrap();
                let mut buf = [0_u8; 64];
                let n = sock.read(&mut buf).await.unwrap();
                let negotiated = &buf[..n];
                if negotiated == b"*99*1##" {
                    // event session: ack negotiation, then idle forever
                    sock.write_all(b"*#*1##").await.unwrap();
                    let mut idle = [0_u8; 1];
                    let _ = sock.read(&mut idle).await;
                    continue;
                }
                // command session
                sock.write_all(b"*#*1##").await.unwrap();
                let mut cmdbuf = [0_u8; 64];
                let _ = sock.read(&mut cmdbuf).await.unwrap();
                if attempts < busy_count {
                    sock.write_all(&Frame::busy().serialize()).await.unwrap();
                } else {
                    sock.write_all(&Frame::ack().serialize()).await.unwrap();
                }
                attempts += 1;
            }
        });
        addr
    }

    #[tokio::test]
    async fn busy_then_ack_retries_succeed_within_budget() {
        let addr = spawn_busy_then_ack_gateway(1).await;
        let endpoint = GatewayEndpoint {
            name: "test".into(),
            protocol: Protocol::Scs,
            transport: TransportDescriptor::Tcp { host: addr.ip().to_string(), port: addr.port() },
            credential: None,
            open_deadline: Duration::from_secs(1),
        };
        let cancel = CancellationToken::new();
        let (worker, _handle) = GatewayWorker::spawn(endpoint, cancel.clone());
        let msg = Message::BusCommand {
            protocol: Protocol::Scs,
            who: "1".into(),
            command: crate::protocol::message::Command::LightingOn,
            address: crate::protocol::Address::Scs(
                crate::protocol::address::ScsAddress::point_to_point(1, 1).unwrap(),
            ),
            medium: None,
            mode: None,
        };
        let rx = worker.submit(msg, CancellationToken::new()).await.unwrap();
        let outcome = tokio::time::timeout(Duration::from_secs(2), rx).await.unwrap().unwrap();
        assert_eq!(outcome, Ok(Vec::new()));
        cancel.cancel();
    }

    #[tokio::test]
    async fn exhausting_retry_budget_surfaces_busy() {
        let addr = spawn_busy_then_ack_gateway(10).await;
        let endpoint = GatewayEndpoint {
            name: "test".into(),
            protocol: Protocol::Scs,
            transport: TransportDescriptor::Tcp { host: addr.ip().to_string(), port: addr.port() },
            credential: None,
            open_deadline: Duration::from_secs(1),
        };
        let cancel = CancellationToken::new();
        let (worker, _handle) = GatewayWorker::spawn(endpoint, cancel.clone());
        let msg = Message::BusCommand {
            protocol: Protocol::Scs,
            who: "1".into(),
            command: crate::protocol::message::Command::LightingOff,
            address: crate::protocol::Address::Scs(
                crate::protocol::address::ScsAddress::point_to_point(1, 1).unwrap(),
            ),
            medium: None,
            mode: None,
        };
        let rx = worker.submit(msg, CancellationToken::new()).await.unwrap();
        let outcome = tokio::time::timeout(Duration::from_secs(3), rx).await.unwrap().unwrap();
        assert_eq!(outcome, Err(TransactionError::GatewayBusy));
        cancel.cancel();
    }

    #[tokio::test]
    async fn command_session_accumulates_dimension_reads_before_ack() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let (mut sock, _) = listener.accept().await.unwrap();
                let mut buf = [0_u8; 64];
                let n = sock.read(&mut buf).await.unwrap();
                sock.write_all(b"*#*1##").await.unwrap();
                if &buf[..n] == b"*99*1##" {
                    let mut idle = [0_u8; 1];
                    let _ = sock.read(&mut idle).await;
                    continue;
                }
                let mut cmdbuf = [0_u8; 64];
                let _ = sock.read(&mut cmdbuf).await.unwrap();
                // Two DimensionRead frames, then the terminating ACK.
                sock.write_all(&Frame::parse(b"*#4*11*30*50##").unwrap().serialize()).await.unwrap();
                sock.write_all(&Frame::parse(b"*#4*11*30*60##").unwrap().serialize()).await.unwrap();
                sock.write_all(&Frame::ack().serialize()).await.unwrap();
            }
        });
        let endpoint = GatewayEndpoint {
            name: "test".into(),
            protocol: Protocol::Scs,
            transport: TransportDescriptor::Tcp { host: addr.ip().to_string(), port: addr.port() },
            credential: None,
            open_deadline: Duration::from_secs(1),
        };
        let cancel = CancellationToken::new();
        let (worker, _handle) = GatewayWorker::spawn(endpoint, cancel.clone());
        let msg = Message::DimensionRequest {
            protocol: Protocol::Scs,
            who: "4".into(),
            address: crate::protocol::Address::Scs(
                crate::protocol::address::ScsAddress::point_to_point(1, 1).unwrap(),
            ),
            dimension: crate::protocol::message::Dimension::PilotWireSetpointMode,
        };
        let rx = worker.submit(msg, CancellationToken::new()).await.unwrap();
        let outcome = tokio::time::timeout(Duration::from_secs(2), rx).await.unwrap().unwrap().unwrap();
        assert_eq!(outcome.len(), 2);
        assert!(outcome.iter().all(|m| matches!(m, Message::DimensionRead { .. })));
        cancel.cancel();
    }

    #[tokio::test]
    async fn submitting_with_an_already_cancelled_token_is_rejected_before_dispatch() {
        let endpoint = GatewayEndpoint {
            name: "test".into(),
            protocol: Protocol::Scs,
            transport: TransportDescriptor::Tcp { host: "127.0.0.1".into(), port: 1 },
            credential: None,
            open_deadline: Duration::from_millis(50),
        };
        let worker_cancel = CancellationToken::new();
        let (worker, _handle) = GatewayWorker::spawn(endpoint, worker_cancel.clone());
        let call_cancel = CancellationToken::new();
        call_cancel.cancel();
        let msg = Message::BusCommand {
            protocol: Protocol::Scs,
            who: "1".into(),
            command: crate::protocol::message::Command::LightingOn,
            address: crate::protocol::Address::Scs(
                crate::protocol::address::ScsAddress::point_to_point(1, 1).unwrap(),
            ),
            medium: None,
            mode: None,
        };
        let err = worker.submit(msg, call_cancel).await.unwrap_err();
        assert_eq!(err, TransactionError::Cancelled);
        worker_cancel.cancel();
    }
}
