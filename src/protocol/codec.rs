//! Byte-level framing.
//!
//! Consumer -> producer messages are a bare opcode byte. Producer -> consumer
//! messages are `opcode | length | payload`, big-endian.
use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::opcode::{ConsumerOpcode, ProducerOpcode};
use crate::error::{ProtocolError, Result};

/// Payload length of a TIME message (one i64)
pub const TIME_PAYLOAD_LEN: u8 = 8;
/// Full size of an encoded TIME message
pub const TIME_PACKET_LEN: usize = 2 + TIME_PAYLOAD_LEN as usize;

/// A message sent by the producer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProducerMessage {
    /// Current time in milliseconds since the Unix epoch
    Time(i64),
}

impl ProducerMessage {
    pub fn opcode(&self) -> ProducerOpcode {
        match self {
            ProducerMessage::Time(_) => ProducerOpcode::Time,
        }
    }

    pub fn encode(&self) -> Bytes {
        match self {
            ProducerMessage::Time(millis) => {
                let mut buf = BytesMut::with_capacity(TIME_PACKET_LEN);
                buf.put_u8(ProducerOpcode::Time.opcode());
                buf.put_u8(TIME_PAYLOAD_LEN);
                buf.put_i64(*millis);
                buf.freeze()
            }
        }
    }

    /// Decode one complete message from the front of `data`.
    ///
    /// Returns the message and the number of bytes it occupied, or `None`
    /// when `data` does not yet hold a whole message.
    pub fn decode(data: &[u8]) -> Result<Option<(Self, usize)>> {
        let (op, len) = match data {
            [op, len, ..] => (*op, *len),
            _ => return Ok(None),
        };
        let opcode = ProducerOpcode::try_from(op)?;
        check_length(opcode, len)?;

        let end = 2 + len as usize;
        if data.len() < end {
            return Ok(None);
        }
        Ok(Some((Self::from_payload(opcode, &data[2..end]), end)))
    }

    fn from_payload(opcode: ProducerOpcode, payload: &[u8]) -> Self {
        match opcode {
            ProducerOpcode::Time => {
                let mut raw = [0u8; TIME_PAYLOAD_LEN as usize];
                raw.copy_from_slice(payload);
                ProducerMessage::Time(i64::from_be_bytes(raw))
            }
        }
    }
}

fn check_length(opcode: ProducerOpcode, found: u8) -> std::result::Result<(), ProtocolError> {
    let expected = match opcode {
        ProducerOpcode::Time => TIME_PAYLOAD_LEN,
    };
    if found != expected {
        return Err(ProtocolError::InvalidLength { expected, found });
    }
    Ok(())
}

/// Read one opcode sent by a consumer
pub async fn read_consumer_opcode<R>(reader: &mut R) -> Result<ConsumerOpcode>
where
    R: AsyncRead + Unpin,
{
    let byte = reader.read_u8().await?;
    Ok(ConsumerOpcode::try_from(byte)?)
}

/// Write one opcode to the producer and flush it
pub async fn write_consumer_opcode<W>(writer: &mut W, opcode: ConsumerOpcode) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&[opcode.opcode()]).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed message sent by the producer
pub async fn read_producer_message<R>(reader: &mut R) -> Result<ProducerMessage>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 2];
    reader.read_exact(&mut header).await?;
    let opcode = ProducerOpcode::try_from(header[0])?;
    check_length(opcode, header[1])?;

    let mut payload = vec![0u8; header[1] as usize];
    reader.read_exact(&mut payload).await?;
    Ok(ProducerMessage::from_payload(opcode, &payload))
}
