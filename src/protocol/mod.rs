//! Wire protocol shared by the producer and its consumers
pub mod codec;
pub mod opcode;

pub use codec::{
    read_consumer_opcode, read_producer_message, write_consumer_opcode, ProducerMessage,
    TIME_PACKET_LEN, TIME_PAYLOAD_LEN,
};
pub use opcode::{ConsumerOpcode, ProducerOpcode};
