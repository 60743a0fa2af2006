use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time;
use tracing::{debug, info, warn};

use crate::common::error::LinkError;
use crate::consensus::acceptor::Acceptor;
use crate::consensus::behavior::Behavior;
use crate::consensus::codec::MessageCodec;
use crate::consensus::message::MessageType;
use crate::consensus::peers::Peers;

use super::link::read_line;

/// What the roster says about a node before it has an address.
#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub node_id: String,
    pub behavior: Arc<dyn Behavior>,
}

impl NodeSpec {
    pub fn new(node_id: impl Into<String>, behavior: impl Behavior + 'static) -> Self {
        NodeSpec {
            node_id: node_id.into(),
            behavior: Arc::new(behavior),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity {
    pub node_id: String,
    pub acceptor_addr: String,
    pub peers: Peers,
}

pub struct Node {
    pub identity: NodeIdentity,
    pub behavior: Arc<dyn Behavior>,
    pub acceptor: Acceptor,
    codec: Arc<dyn MessageCodec>,
    /// How long an inbound peer gets to deliver its request line.
    request_timeout: Duration,
}

impl Node {
    pub fn new(
        identity: NodeIdentity,
        behavior: Arc<dyn Behavior>,
        codec: Arc<dyn MessageCodec>,
        request_timeout: Duration,
    ) -> Self {
        Node {
            acceptor: Acceptor::new(identity.node_id.clone()),
            identity,
            behavior,
            codec,
            request_timeout,
        }
    }

    pub fn id(&self) -> &str {
        &self.identity.node_id
    }

    pub fn peers(&self) -> &Peers {
        &self.identity.peers
    }

    /// Accept loop. Each connection is handled on its own task.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) {
        info!(
            node = %self.id(),
            kind = self.behavior.kind(),
            address = %self.identity.acceptor_addr,
            "acceptor started"
        );
        loop {
            let (stream, remote) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    warn!(node = %self.id(), %err, "failed to accept connection");
                    continue;
                }
            };

            let node = self.clone();
            tokio::spawn(async move {
                if let Err(err) = node.handle_connection(stream).await {
                    warn!(node = %node.id(), %remote, %err, "dropped connection");
                }
            });
        }
    }

    pub async fn handle_connection(&self, stream: TcpStream) -> Result<(), LinkError> {
        if self.behavior.drops_inbound() {
            info!(node = %self.id(), "poor connectivity, skipping this message");
            return Ok(());
        }

        let (reader, mut writer) = stream.into_split();
        let line = time::timeout(self.request_timeout, read_line(reader))
            .await
            .map_err(|_| LinkError::Idle(self.request_timeout))??;
        let Some(line) = line else {
            debug!(node = %self.id(), "peer closed without a request");
            return Ok(());
        };

        let request = self.codec.decode(&line)?;
        let reply = match request.kind {
            MessageType::Prepare => {
                debug!(node = %self.id(), proposal = request.info().unwrap_or_default(), "received proposal");
                self.acceptor
                    .handle_prepare(request.proposal_id, request.info(), self.behavior.as_ref())
                    .await
            }
            MessageType::Accept => {
                debug!(node = %self.id(), result = request.info().unwrap_or_default(), "received result");
                self.acceptor
                    .handle_accept(request.proposal_id, request.info())
                    .await
            }
            other => return Err(LinkError::Unexpected(other)),
        };

        let mut encoded = self.codec.encode(&reply)?;
        encoded.push('\n');
        writer.write_all(encoded.as_bytes()).await?;
        writer.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};

    use super::*;
    use crate::common::config::{LinkConfig, MAX_LINE};
    use crate::consensus::behavior::{claim, Capricious, Flaky, Reliable};
    use crate::consensus::codec::{JsonCodec, TextCodec};
    use crate::consensus::message::Message;
    use crate::network::link::NetworkLink;

    async fn start(behavior: Arc<dyn Behavior>, codec: Arc<dyn MessageCodec>) -> Arc<Node> {
        start_with_timeout(behavior, codec, Duration::from_secs(5)).await
    }

    async fn start_with_timeout(
        behavior: Arc<dyn Behavior>,
        codec: Arc<dyn MessageCodec>,
        request_timeout: Duration,
    ) -> Arc<Node> {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let identity = NodeIdentity {
            node_id: "M1".to_string(),
            acceptor_addr: address.clone(),
            peers: Peers::new(vec![address]),
        };
        let node = Arc::new(Node::new(identity, behavior, codec, request_timeout));
        tokio::spawn(node.clone().serve(listener));
        node
    }

    fn link() -> NetworkLink {
        NetworkLink::new(
            Arc::new(JsonCodec),
            LinkConfig {
                timeout: Duration::from_millis(500),
                max_attempts: 1,
            },
        )
    }

    #[tokio::test]
    async fn test_prepare_and_accept_over_tcp() {
        let node = start(Arc::new(Reliable::new("M1")), Arc::new(JsonCodec)).await;
        let address = node.identity.acceptor_addr.clone();
        let value = claim("M1");

        let reply = link().send(&address, &Message::prepare(1, value.clone())).await.unwrap();
        assert_eq!(reply, Message::agree(1, None));

        let reply = link().send(&address, &Message::accept(1, value.clone())).await.unwrap();
        assert_eq!(reply, Message::accepted(1, value.clone()));

        let state = node.acceptor.snapshot().await;
        assert_eq!(state.watermark, 1);
        assert_eq!(state.accepted, Some(value));
    }

    #[tokio::test]
    async fn test_declined_prepare_still_answers() {
        let node = start(Arc::new(Reliable::new("M1")), Arc::new(JsonCodec)).await;
        let reply = link()
            .send(&node.identity.acceptor_addr, &Message::prepare(1, claim("M2")))
            .await
            .unwrap();
        assert_eq!(reply, Message::reject(1));
    }

    #[tokio::test]
    async fn test_unexpected_message_is_dropped() {
        let node = start(Arc::new(Capricious::with_probability("M1", 1.0)), Arc::new(JsonCodec)).await;
        let address = node.identity.acceptor_addr.clone();

        let err = link().send(&address, &Message::agree(1, None)).await.unwrap_err();
        assert!(matches!(err, LinkError::Closed | LinkError::Io(_)));

        // The listener keeps serving other connections.
        let reply = link().send(&address, &Message::prepare(2, claim("M1"))).await.unwrap();
        assert_eq!(reply, Message::agree(2, None));
    }

    #[tokio::test]
    async fn test_garbage_request_is_dropped() {
        let node = start(Arc::new(Capricious::with_probability("M1", 1.0)), Arc::new(JsonCodec)).await;
        let address = node.identity.acceptor_addr.clone();

        let mut stream = TcpStream::connect(&address).await.unwrap();
        stream.write_all(b"HELLO\n").await.unwrap();
        let mut reply = String::new();
        let read = BufReader::new(&mut stream).read_line(&mut reply).await.unwrap_or(0);
        assert_eq!(read, 0);

        assert_eq!(node.acceptor.snapshot().await.watermark, -1);
    }

    #[tokio::test]
    async fn test_dropping_node_never_replies() {
        let node = start(Arc::new(Flaky::new("M3", true, 1.0)), Arc::new(JsonCodec)).await;
        let err = link()
            .send(&node.identity.acceptor_addr, &Message::prepare(1, claim("M3")))
            .await
            .unwrap_err();
        assert!(matches!(err, LinkError::Closed | LinkError::Io(_)));
        assert_eq!(node.acceptor.snapshot().await.watermark, -1);
    }

    #[tokio::test]
    async fn test_text_codec_node() {
        let node = start(Arc::new(Reliable::new("M1")), Arc::new(TextCodec)).await;
        let mut stream = TcpStream::connect(&node.identity.acceptor_addr).await.unwrap();
        stream
            .write_all(b"PREPARE,3,Suggest M1 to become chairman\n")
            .await
            .unwrap();
        let mut reply = String::new();
        BufReader::new(&mut stream).read_line(&mut reply).await.unwrap();
        assert_eq!(reply, "AGREE,3\n");
    }

    /// Reads until the node closes the connection or `limit` passes.
    async fn closed_within(stream: &mut TcpStream, limit: Duration) -> bool {
        let mut buf = [0u8; 64];
        loop {
            match time::timeout(limit, stream.read(&mut buf)).await {
                Ok(Ok(0)) | Ok(Err(_)) => return true,
                Ok(Ok(_)) => continue,
                Err(_) => return false,
            }
        }
    }

    #[tokio::test]
    async fn test_silent_peer_is_disconnected() {
        let node = start_with_timeout(
            Arc::new(Reliable::new("M1")),
            Arc::new(JsonCodec),
            Duration::from_millis(200),
        )
        .await;

        let mut stream = TcpStream::connect(&node.identity.acceptor_addr).await.unwrap();
        assert!(closed_within(&mut stream, Duration::from_secs(3)).await);

        // Still serving afterwards.
        let reply = link()
            .send(&node.identity.acceptor_addr, &Message::prepare(1, claim("M1")))
            .await
            .unwrap();
        assert_eq!(reply, Message::agree(1, None));
    }

    #[tokio::test]
    async fn test_oversized_request_is_refused() {
        let node = start(Arc::new(Capricious::with_probability("M1", 1.0)), Arc::new(JsonCodec)).await;

        let mut stream = TcpStream::connect(&node.identity.acceptor_addr).await.unwrap();
        let flood = vec![b'a'; MAX_LINE as usize + 1024];
        let _ = stream.write_all(&flood).await;

        // Closed on the length limit, long before the five second request timeout.
        assert!(closed_within(&mut stream, Duration::from_secs(3)).await);
        assert_eq!(node.acceptor.snapshot().await.watermark, -1);
    }

    #[tokio::test]
    async fn test_bounded_read_errors() {
        let (mut client, server) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            let _ = client.write_all(&vec![b'x'; MAX_LINE as usize + 1]).await;
        });
        let err = read_line(server).await.unwrap_err();
        assert!(matches!(err, LinkError::Oversized { limit: MAX_LINE }));

        let (mut client, server) = tokio::io::duplex(64);
        client.write_all(b"PREPARE,1\n").await.unwrap();
        assert_eq!(read_line(server).await.unwrap(), Some("PREPARE,1\n".to_string()));

        let (client, server) = tokio::io::duplex(64);
        drop(client);
        assert_eq!(read_line(server).await.unwrap(), None);
    }
}
