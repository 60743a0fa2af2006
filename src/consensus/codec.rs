//! Line codecs for [`Message`].
//!
//! The transport is line oriented, so an encoded message must never contain a
//! newline. Both codecs here guarantee that on the encode side and tolerate a
//! trailing `\r\n` on the decode side.

use crate::common::error::CodecError;

use super::message::{Message, MessageType, ProposalId};

pub trait MessageCodec: Send + Sync {
    fn name(&self) -> &'static str;

    fn encode(&self, message: &Message) -> Result<String, CodecError>;

    fn decode(&self, line: &str) -> Result<Message, CodecError>;
}

/// One JSON object per line: `{"type":"PREPARE","proposalId":1,"info":"..."}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl MessageCodec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, message: &Message) -> Result<String, CodecError> {
        Ok(serde_json::to_string(message)?)
    }

    fn decode(&self, line: &str) -> Result<Message, CodecError> {
        let value: serde_json::Value = serde_json::from_str(line.trim_end())?;

        // Report an unknown type by name instead of a generic serde error.
        if let Some(kind) = value.get("type").and_then(|kind| kind.as_str()) {
            if MessageType::parse(kind).is_none() {
                return Err(CodecError::UnknownType(kind.to_string()));
            }
        }

        Ok(serde_json::from_value(value)?)
    }
}

/// Comma separated `TYPE,proposalId[,info]`.
///
/// The info field is everything after the second comma, so it may itself
/// contain commas.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec;

impl MessageCodec for TextCodec {
    fn name(&self) -> &'static str {
        "text"
    }

    fn encode(&self, message: &Message) -> Result<String, CodecError> {
        match message.info() {
            Some(info) if info.contains(['\n', '\r']) => Err(CodecError::Malformed(
                "info must fit on a single line".to_string(),
            )),
            Some(info) => Ok(format!("{},{},{}", message.kind, message.proposal_id, info)),
            None => Ok(format!("{},{}", message.kind, message.proposal_id)),
        }
    }

    fn decode(&self, line: &str) -> Result<Message, CodecError> {
        let mut parts = line.trim_end_matches(['\r', '\n']).splitn(3, ',');

        let kind = parts.next().unwrap_or_default();
        let kind = MessageType::parse(kind)
            .ok_or_else(|| CodecError::UnknownType(kind.to_string()))?;

        let proposal_id = parts
            .next()
            .ok_or_else(|| CodecError::Malformed(format!("missing proposal id in {line:?}")))?;
        let proposal_id: ProposalId = proposal_id
            .trim()
            .parse()
            .map_err(|_| CodecError::Malformed(format!("bad proposal id {proposal_id:?}")))?;

        let info = parts.next().map(str::to_string);
        Ok(Message::new(kind, proposal_id, info))
    }
}
