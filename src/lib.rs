//! Heartbeat-gated timestamp broadcast.
//!
//! A [`producer::Producer`] accepts consumers over TCP, keeps the ones that
//! registered and keep sending keep-alives in a membership registry, and on a
//! fixed interval evicts the silent ones and sends everyone else the current
//! time. A [`consumer::Consumer`] is the matching client.
pub mod cli;
pub mod clock;
pub mod consumer;
pub mod error;
pub mod producer;
pub mod protocol;
pub mod settings;

pub use consumer::{Consumer, ConsumerHandle};
pub use error::{ProtocolError, Result, TimecastError};
pub use producer::Producer;
