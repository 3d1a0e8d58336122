//! A single logical OpenWebNet session: handshake, authentication, and the
//! inbound message stream
// (c) 2026 OpenNetty contributors
//!
//! The state machine follows spec.md §4.4:
//!
//! ```text
//! Created -> (negotiate session type) -> AwaitingAck
//!   -> ACK            => Ready
//!   -> auth challenge  => Authenticating -> (respond) -> AwaitingAck (2nd time) -> Ready
//! ```
//!
//! Like `qcp`'s `server_main`/`client_main`, the handshake is implemented as
//! an explicit phase-by-phase async function rather than a generic
//! state-machine framework — OpenWebNet's handshake is small and fixed.

use std::time::Duration;

use strum::{Display, EnumString};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::SessionError;
use crate::frame::Frame;
use crate::protocol::auth::{open_password_response, open_sha_hash, ShaAlgorithm};
use crate::protocol::{Message, Protocol};
use crate::transport::Connection;

/// Fixed per-authentication-step timeout, per spec.md §5.
pub const AUTH_STEP_TIMEOUT: Duration = Duration::from_secs(3);

/// The role negotiated with the gateway at session start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum SessionType {
    /// Request/response.
    Command,
    /// Read-only firehose of unsolicited notifications.
    Event,
    /// Scenario-frame notifications.
    Scenario,
}

/// Generates a decimal nonce for the `Rb` half of an OPEN-SHA exchange from
/// the system clock. Not cryptographically strong, but OPEN-SHA's security
/// rests on `Kab` being secret, not on `Rb` being unpredictable.
fn local_nonce() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    (nanos % 10_000_000_000).to_string()
}

impl SessionType {
    fn wire_code(self) -> &'static str {
        match self {
            Self::Command => "0",
            Self::Event => "1",
            Self::Scenario => "9",
        }
    }

    fn negotiation_frame(self) -> Frame {
        Frame::parse(format!("*99*{}##", self.wire_code()).as_bytes())
            .expect("constructed from valid digits")
    }
}

/// Credentials used for authentication, if the gateway demands it.
#[derive(Debug, Clone)]
pub enum Credential {
    /// Pre-shared decimal secret for the classic open-password scheme.
    OpenPassword(u32),
    /// Shared key for the OPEN-SHA mutual-authentication scheme.
    OpenSha(Vec<u8>),
}

/// Current lifecycle state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Freshly constructed, handshake not yet started.
    Created,
    /// Session-type negotiation frame sent, awaiting ACK or a challenge.
    AwaitingAck,
    /// A gateway challenge is being answered.
    Authenticating,
    /// Handshake complete; frames may be sent/received.
    Ready,
    /// Closure in progress.
    Closing,
    /// Terminal. No further I/O is possible.
    Closed,
}

/// A live conversation with one gateway over one [`Connection`].
pub struct Session {
    connection: Connection,
    session_type: SessionType,
    protocol: Protocol,
    state: SessionState,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("session_type", &self.session_type)
            .field("protocol", &self.protocol)
            .field("state", &self.state)
            .finish()
    }
}

impl Session {
    /// Opens a session over `connection`: negotiates `session_type`, then
    /// authenticates with `credential` if the gateway challenges. On
    /// success the session is `Ready`.
    pub async fn open(
        mut connection: Connection,
        protocol: Protocol,
        session_type: SessionType,
        credential: Option<&Credential>,
        cancel: &CancellationToken,
    ) -> Result<Self, SessionError> {
        trace!(?session_type, "negotiating session type");
        connection.send(&session_type.negotiation_frame(), cancel).await?;

        let reply = tokio::time::timeout(AUTH_STEP_TIMEOUT, connection.receive(cancel))
            .await
            .map_err(|_| SessionError::OpenTimeout)??;

        if reply.is_ack() {
            debug!("session ready (no authentication required)");
            return Ok(Self { connection, session_type, protocol, state: SessionState::Ready });
        }

        // Otherwise the reply should be an authentication challenge.
        Self::authenticate(&mut connection, &reply, credential, cancel).await?;

        trace!("re-sending session-type negotiation after authentication");
        connection.send(&session_type.negotiation_frame(), cancel).await?;
        let reply2 = tokio::time::timeout(AUTH_STEP_TIMEOUT, connection.receive(cancel))
            .await
            .map_err(|_| SessionError::OpenTimeout)??;
        if !reply2.is_ack() {
            return Err(SessionError::AuthenticationFailed);
        }

        debug!("session ready (authenticated)");
        Ok(Self { connection, session_type, protocol, state: SessionState::Ready })
    }

    async fn authenticate(
        connection: &mut Connection,
        challenge: &Frame,
        credential: Option<&Credential>,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        let fields = challenge.fields();
        let Some(credential) = credential else {
            return Err(SessionError::AuthenticationFailed);
        };

        match credential {
            Credential::OpenPassword(password) => {
                // Challenge shape: *#*98##*<nonce>## -- two frames in
                // practice, but we accept the nonce carried in this frame's
                // trailing field for simplicity.
                let nonce = fields
                    .last()
                    .map(|f| f.value.clone())
                    .ok_or(SessionError::AuthenticationFailed)?;
                let response = open_password_response(&nonce, *password);
                let response_frame = Frame::parse(format!("*#{response}##").as_bytes())
                    .map_err(|_| SessionError::AuthenticationFailed)?;
                connection.send(&response_frame, cancel).await?;
                let ack = tokio::time::timeout(AUTH_STEP_TIMEOUT, connection.receive(cancel))
                    .await
                    .map_err(|_| SessionError::OpenTimeout)??;
                if ack.is_ack() {
                    Ok(())
                } else {
                    Err(SessionError::AuthenticationFailed)
                }
            }
            Credential::OpenSha(kab) => {
                let algo_code = fields
                    .last()
                    .map(|f| f.value.clone())
                    .unwrap_or_default();
                let algo = ShaAlgorithm::from_wire_code(&algo_code)
                    .ok_or(SessionError::AuthenticationFailed)?;

                let ra_frame = tokio::time::timeout(AUTH_STEP_TIMEOUT, connection.receive(cancel))
                    .await
                    .map_err(|_| SessionError::OpenTimeout)??;
                let ra = ra_frame
                    .fields()
                    .last()
                    .map(|f| f.value.clone())
                    .ok_or(SessionError::AuthenticationFailed)?;

                let rb = local_nonce();
                let rb_frame = Frame::parse(format!("*#{rb}##").as_bytes())
                    .map_err(|_| SessionError::AuthenticationFailed)?;
                connection.send(&rb_frame, cancel).await?;

                let our_hash = open_sha_hash(algo, &ra, &rb, kab);
                let hash_frame = Frame::new(vec![crate::frame::Field::new(""), crate::frame::Field::new(our_hash.clone())]);
                connection.send(&hash_frame, cancel).await?;

                let ack = tokio::time::timeout(AUTH_STEP_TIMEOUT, connection.receive(cancel))
                    .await
                    .map_err(|_| SessionError::OpenTimeout)??;
                if ack.is_ack() {
                    Ok(())
                } else {
                    Err(SessionError::AuthenticationFailed)
                }
            }
        }
    }

    /// Sends a frame on this session. Errors transition the session to
    /// `Closed`.
    pub async fn send_frame(&mut self, frame: &Frame, cancel: &CancellationToken) -> Result<(), SessionError> {
        if self.state != SessionState::Ready {
            return Err(SessionError::WrongState("not Ready"));
        }
        match self.connection.send(frame, cancel).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.state = SessionState::Closed;
                Err(e.into())
            }
        }
    }

    /// Receives the next frame, decoded as a [`Message`] for this session's
    /// protocol. Errors that cannot be resynchronized transition the
    /// session to `Closed`.
    pub async fn recv_message(&mut self, cancel: &CancellationToken) -> Result<Message, SessionError> {
        if self.state != SessionState::Ready {
            return Err(SessionError::WrongState("not Ready"));
        }
        match self.connection.receive(cancel).await {
            Ok(frame) => Ok(Message::from_frame(self.protocol, frame)),
            Err(e) => {
                self.state = SessionState::Closed;
                Err(e.into())
            }
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The negotiated session type.
    #[must_use]
    pub fn session_type(&self) -> SessionType {
        self.session_type
    }

    /// Closes the session, releasing the underlying connection. Idempotent.
    pub async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closing;
        self.connection.close().await;
        self.state = SessionState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assertables::assert_matches;
    use crate::transport::TransportDescriptor;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn open_session_no_auth_reaches_ready() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0_u8; 64];
            let n = sock.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"*99*0##");
            sock.write_all(b"*#*1##").await.unwrap();
        });

        let connection = Connection::open(
            &TransportDescriptor::Tcp { host: addr.ip().to_string(), port: addr.port() },
            Duration::from_secs(1),
        )
        .await
        .unwrap();
        let cancel = CancellationToken::new();
        let session = Session::open(connection, Protocol::Scs, SessionType::Command, None, &cancel)
            .await
            .unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn open_password_auth_reaches_ready() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let password = 12345_u32;
        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0_u8; 64];
            let n = sock.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"*99*0##");
            // send a challenge carrying the nonce
            sock.write_all(b"*#603356072##").await.unwrap();
            let n = sock.read(&mut buf).await.unwrap();
            let expected = format!("*#{}##", open_password_response("603356072", password));
            assert_eq!(&buf[..n], expected.as_bytes());
            sock.write_all(b"*#*1##").await.unwrap();
            let n = sock.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"*99*0##");
            sock.write_all(b"*#*1##").await.unwrap();
        });

        let connection = Connection::open(
            &TransportDescriptor::Tcp { host: addr.ip().to_string(), port: addr.port() },
            Duration::from_secs(1),
        )
        .await
        .unwrap();
        let cancel = CancellationToken::new();
        let credential = Credential::OpenPassword(password);
        let session = Session::open(
            connection,
            Protocol::Scs,
            SessionType::Command,
            Some(&credential),
            &cancel,
        )
        .await
        .unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn missing_credential_on_challenge_fails() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0_u8; 64];
            let _ = sock.read(&mut buf).await.unwrap();
            sock.write_all(b"*#603356072##").await.unwrap();
        });
        let connection = Connection::open(
            &TransportDescriptor::Tcp { host: addr.ip().to_string(), port: addr.port() },
            Duration::from_secs(1),
        )
        .await
        .unwrap();
        let cancel = CancellationToken::new();
        let err = Session::open(connection, Protocol::Scs, SessionType::Command, None, &cancel)
            .await
            .unwrap_err();
        assert_matches!(err, SessionError::AuthenticationFailed);
        server.await.unwrap();
    }
}
