//! Timecast application settings
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::config_error;
use crate::error::Result;

pub const STANDARD_PORT: u16 = 29999;
pub const DEFAULT_PORT: &str = "29999";
pub const DEFAULT_LISTEN_ADDRESS: &str = "127.0.0.1";

pub const DEFAULT_BROADCAST_INTERVAL_MS: &str = "1000";
pub const DEFAULT_KEEP_ALIVE_TIMEOUT_MS: &str = "10000";
pub const DEFAULT_KEEP_ALIVE_INTERVAL_MS: &str = "5000";
pub const DEFAULT_MAX_KEEP_ALIVES: &str = "12";
pub const DEFAULT_WRITE_TIMEOUT_MS: &str = "1000";

/// Producer side: where to listen and how often to sweep and broadcast
#[derive(Clone, Debug)]
pub struct ProducerSettings {
    pub listen_address: SocketAddr,

    // Every broadcast_interval the registry is swept and a TIME message sent
    pub broadcast_interval: Duration,

    // Members silent for longer than this are evicted
    pub keep_alive_timeout: Duration,

    // A single broadcast write slower than this counts as a failed write
    pub write_timeout: Duration,
}

impl Default for ProducerSettings {
    fn default() -> Self {
        Self {
            listen_address: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), STANDARD_PORT),
            broadcast_interval: Duration::from_millis(1000),
            keep_alive_timeout: Duration::from_millis(10000),
            write_timeout: Duration::from_millis(1000),
        }
    }
}

impl ProducerSettings {
    pub fn keep_alive_timeout_ms(&self) -> i64 {
        i64::try_from(self.keep_alive_timeout.as_millis()).unwrap_or(i64::MAX)
    }

    pub fn validate(&self) -> Result<()> {
        if self.broadcast_interval.is_zero() {
            return Err(config_error!("broadcast interval must be greater than zero"));
        }
        if self.write_timeout.is_zero() {
            return Err(config_error!("write timeout must be greater than zero"));
        }
        if self.keep_alive_timeout <= self.broadcast_interval {
            return Err(config_error!(
                "keep-alive timeout ({}ms) must exceed the broadcast interval ({}ms)",
                self.keep_alive_timeout.as_millis(),
                self.broadcast_interval.as_millis()
            ));
        }
        Ok(())
    }
}

/// Consumer side: where to connect and how the keep-alive schedule looks
#[derive(Clone, Debug)]
pub struct ConsumerSettings {
    pub server_address: SocketAddr,

    // Gap between consecutive KEEP_ALIVE signals
    pub keep_alive_interval: Duration,

    // Upper bound (inclusive) of the random keep-alive count
    pub max_keep_alives: u32,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            server_address: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), STANDARD_PORT),
            keep_alive_interval: Duration::from_millis(5000),
            max_keep_alives: 12,
        }
    }
}

impl ConsumerSettings {
    pub fn validate(&self) -> Result<()> {
        if self.keep_alive_interval.is_zero() {
            return Err(config_error!("keep-alive interval must be greater than zero"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct Settings {
    // Number of consumers started in-process next to the producer
    pub consumers: u32,

    pub producer: ProducerSettings,

    pub consumer: ConsumerSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.consumers == 0 {
            return Err(config_error!("at least one consumer is required"));
        }
        self.producer.validate()?;
        self.consumer.validate()
    }
}
