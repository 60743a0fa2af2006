use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time;
use tracing::{debug, warn};

use crate::common::config::{LinkConfig, MAX_LINE};
use crate::common::error::LinkError;
use crate::consensus::codec::MessageCodec;
use crate::consensus::message::Message;

/// One request, one reply, one connection.
///
/// Only timeouts are retried. A refused connection or a garbled reply means the
/// peer is out of this round.
#[derive(Clone)]
pub struct NetworkLink {
    codec: Arc<dyn MessageCodec>,
    config: LinkConfig,
}

impl NetworkLink {
    pub fn new(codec: Arc<dyn MessageCodec>, config: LinkConfig) -> Self {
        NetworkLink { codec, config }
    }

    pub async fn send(&self, address: &str, message: &Message) -> Result<Message, LinkError> {
        let line = self.codec.encode(message)?;
        let max_attempts = self.config.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match time::timeout(self.config.timeout, self.exchange(address, &line)).await {
                Ok(reply) => {
                    let reply = self.codec.decode(&reply?)?;
                    debug!(%address, request = %message, reply = %reply, "exchange complete");
                    return Ok(reply);
                }
                Err(_) if attempt < max_attempts => {
                    warn!(
                        %address,
                        kind = %message.kind,
                        "timeout while sending, retrying... ({attempt}/{max_attempts})"
                    );
                }
                Err(_) => {}
            }
        }

        Err(LinkError::Timeout {
            address: address.to_string(),
            attempts: max_attempts,
        })
    }

    async fn exchange(&self, address: &str, line: &str) -> Result<String, LinkError> {
        let stream = TcpStream::connect(address)
            .await
            .map_err(|source| LinkError::Connect {
                address: address.to_string(),
                source,
            })?;
        let (reader, mut writer) = stream.into_split();

        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;

        read_line(reader).await?.ok_or(LinkError::Closed)
    }
}

/// Reads one line of at most [`MAX_LINE`] bytes. `None` if the peer closed first.
pub(crate) async fn read_line<R>(reader: R) -> Result<Option<String>, LinkError>
where
    R: AsyncRead + Unpin,
{
    let mut line = String::new();
    if BufReader::new(reader.take(MAX_LINE)).read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    if line.len() as u64 >= MAX_LINE && !line.ends_with('\n') {
        return Err(LinkError::Oversized { limit: MAX_LINE });
    }
    Ok(Some(line))
}
