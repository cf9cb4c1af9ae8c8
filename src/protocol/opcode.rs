//! Opcodes for both directions of the wire protocol.
//!
//! Opcodes are a single byte, so each direction has room for 256 of them.
use crate::error::ProtocolError;

/// Messages a consumer sends to the producer. These carry no length byte and
/// no payload: the opcode is the whole message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConsumerOpcode {
    Register = 0x00,
    KeepAlive = 0x01,
}

/// Messages the producer sends to a consumer. These are length-prefixed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ProducerOpcode {
    Time = 0x00,
}

impl ConsumerOpcode {
    pub fn opcode(self) -> u8 {
        self as u8
    }
}

impl ProducerOpcode {
    pub fn opcode(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for ConsumerOpcode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(ConsumerOpcode::Register),
            0x01 => Ok(ConsumerOpcode::KeepAlive),
            other => Err(ProtocolError::UnknownOpcode(other)),
        }
    }
}

impl TryFrom<u8> for ProducerOpcode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(ProducerOpcode::Time),
            other => Err(ProtocolError::UnknownOpcode(other)),
        }
    }
}

impl std::fmt::Display for ConsumerOpcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsumerOpcode::Register => write!(f, "REGISTER"),
            ConsumerOpcode::KeepAlive => write!(f, "KEEP_ALIVE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consumer_opcode_values() {
        assert_eq!(ConsumerOpcode::Register.opcode(), 0x00);
        assert_eq!(ConsumerOpcode::KeepAlive.opcode(), 0x01);
        assert_eq!(ConsumerOpcode::try_from(0x01), Ok(ConsumerOpcode::KeepAlive));
        assert_eq!(
            ConsumerOpcode::try_from(0x02),
            Err(ProtocolError::UnknownOpcode(0x02))
        );
        assert_eq!(
            ConsumerOpcode::try_from(0xff),
            Err(ProtocolError::UnknownOpcode(0xff))
        );
    }

    #[test]
    fn test_producer_opcode_values() {
        assert_eq!(ProducerOpcode::Time.opcode(), 0x00);
        assert_eq!(ProducerOpcode::try_from(0x00), Ok(ProducerOpcode::Time));
        assert!(ProducerOpcode::try_from(0x01).is_err());
    }
}
