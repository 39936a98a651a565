//! # In-Process Transport
//!
//! Helper and client endpoints connected over in-memory channels. Used when
//! host and helper share a process (integration tests, single-binary
//! deployments); credentials are whatever the connecting side claims, so
//! this adapter is only suitable where the peer is already trusted.

use async_trait::async_trait;
use gatehouse_protocol::{CallerCredentials, ReplyEnvelope, RequestFrame, TransportError};
use tokio::sync::mpsc;

use crate::ports::transport::{HelperConnection, HelperListener};
use gatehouse_client::ClientTransport;

const CHANNEL_CAPACITY: usize = 8;

/// Helper side of an in-process connection.
pub struct LocalHelperConnection {
    credentials: CallerCredentials,
    requests: mpsc::Receiver<RequestFrame>,
    replies: mpsc::Sender<ReplyEnvelope>,
}

/// Client side of an in-process connection.
pub struct LocalClientChannel {
    requests: mpsc::Sender<RequestFrame>,
    replies: mpsc::Receiver<ReplyEnvelope>,
}

/// A connected helper/client endpoint pair. The helper side reports
/// `credentials` as its peer's identity.
#[must_use]
pub fn local_channel(
    credentials: CallerCredentials,
) -> (LocalHelperConnection, LocalClientChannel) {
    let (request_tx, request_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (reply_tx, reply_rx) = mpsc::channel(CHANNEL_CAPACITY);
    (
        LocalHelperConnection {
            credentials,
            requests: request_rx,
            replies: reply_tx,
        },
        LocalClientChannel {
            requests: request_tx,
            replies: reply_rx,
        },
    )
}

#[async_trait]
impl HelperConnection for LocalHelperConnection {
    fn peer_credentials(&self) -> CallerCredentials {
        self.credentials
    }

    async fn next_request(&mut self) -> Result<Option<RequestFrame>, TransportError> {
        Ok(self.requests.recv().await)
    }

    async fn send_reply(&mut self, reply: ReplyEnvelope) -> Result<(), TransportError> {
        self.replies
            .send(reply)
            .await
            .map_err(|_| TransportError::Closed)
    }
}

#[async_trait]
impl ClientTransport for LocalClientChannel {
    async fn roundtrip(&mut self, frame: RequestFrame) -> Result<ReplyEnvelope, TransportError> {
        self.requests
            .send(frame)
            .await
            .map_err(|_| TransportError::Closed)?;
        self.replies.recv().await.ok_or(TransportError::Closed)
    }
}

/// Listener half of an in-process endpoint.
pub struct LocalListener {
    connections: mpsc::Receiver<LocalHelperConnection>,
}

/// Client-side handle that opens connections against a [`LocalListener`].
#[derive(Clone)]
pub struct LocalConnector {
    connections: mpsc::Sender<LocalHelperConnection>,
}

/// A listener and the connector that feeds it.
#[must_use]
pub fn local_listener() -> (LocalListener, LocalConnector) {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    (
        LocalListener { connections: rx },
        LocalConnector { connections: tx },
    )
}

impl LocalConnector {
    /// Open a new connection, presenting `credentials` to the helper.
    pub async fn connect(
        &self,
        credentials: CallerCredentials,
    ) -> Result<LocalClientChannel, TransportError> {
        let (server, client) = local_channel(credentials);
        self.connections
            .send(server)
            .await
            .map_err(|_| TransportError::Closed)?;
        Ok(client)
    }
}

#[async_trait]
impl HelperListener for LocalListener {
    async fn accept(&mut self) -> Result<Option<Box<dyn HelperConnection>>, TransportError> {
        Ok(self
            .connections
            .recv()
            .await
            .map(|connection| Box::new(connection) as Box<dyn HelperConnection>))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_protocol::RequestEnvelope;

    #[tokio::test]
    async fn frames_cross_the_channel_in_order() {
        let (mut server, mut client) = local_channel(CallerCredentials::unknown());

        let helper = tokio::spawn(async move {
            while let Ok(Some(frame)) = server.next_request().await {
                let reply = ReplyEnvelope::for_request(frame.message_id);
                if server.send_reply(reply).await.is_err() {
                    break;
                }
            }
        });

        for _ in 0..3 {
            let frame = RequestFrame::new(RequestEnvelope::default());
            let id = frame.message_id;
            let reply = client.roundtrip(frame).await.expect("roundtrip");
            assert_eq!(reply.in_reply_to, id);
        }

        drop(client);
        helper.await.expect("helper task");
    }

    #[tokio::test]
    async fn dropped_listener_ends_connect() {
        let (listener, connector) = local_listener();
        drop(listener);
        assert!(matches!(
            connector.connect(CallerCredentials::unknown()).await,
            Err(TransportError::Closed)
        ));
    }
}
