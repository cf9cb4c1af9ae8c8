//! CLI for this application
//!
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::config_error;
use crate::error::Result;
use crate::settings;

pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Clone, Debug, clap::Parser)]
#[command(name = APP_NAME, version = APP_VERSION)]
#[command(about = "Broadcast timestamps to consumers that keep sending heartbeats")]
pub struct Cli {
    // Number of consumers to start in-process
    #[arg(
        value_parser = clap::value_parser!(u32).range(1..),
        help = "Number of consumers to start (positive integer)"
    )]
    pub consumers: u32,

    // Server listen address
    #[arg(
        long,
        default_value = settings::DEFAULT_LISTEN_ADDRESS,
        help = "IP Address to listen on"
    )]
    pub listen_address: String,

    // TCP listen port
    #[arg(
        long,
        default_value = settings::DEFAULT_PORT,
        help = "Port to bind the producer to"
    )]
    pub port: u16,

    #[arg(
        long,
        default_value = settings::DEFAULT_BROADCAST_INTERVAL_MS,
        help = "Milliseconds between TIME broadcasts"
    )]
    pub broadcast_interval_ms: u64,

    #[arg(
        long,
        default_value = settings::DEFAULT_KEEP_ALIVE_TIMEOUT_MS,
        help = "Milliseconds of silence before a consumer is evicted"
    )]
    pub keep_alive_timeout_ms: u64,

    #[arg(
        long,
        default_value = settings::DEFAULT_KEEP_ALIVE_INTERVAL_MS,
        help = "Milliseconds between a consumer's KEEP_ALIVE signals"
    )]
    pub keep_alive_interval_ms: u64,

    #[arg(
        long,
        default_value = settings::DEFAULT_MAX_KEEP_ALIVES,
        help = "Upper bound of the random number of KEEP_ALIVE signals per consumer"
    )]
    pub max_keep_alives: u32,

    #[arg(
        long,
        default_value = settings::DEFAULT_WRITE_TIMEOUT_MS,
        help = "Milliseconds a broadcast write may take before the consumer is dropped"
    )]
    pub write_timeout_ms: u64,
}

impl Cli {
    pub fn into_settings(self) -> Result<settings::Settings> {
        let ip: IpAddr = self
            .listen_address
            .parse()
            .map_err(|e| config_error!("Invalid listen address '{}': {}", self.listen_address, e))?;
        let address = SocketAddr::new(ip, self.port);

        Ok(settings::Settings {
            consumers: self.consumers,
            producer: settings::ProducerSettings {
                listen_address: address,
                broadcast_interval: Duration::from_millis(self.broadcast_interval_ms),
                keep_alive_timeout: Duration::from_millis(self.keep_alive_timeout_ms),
                write_timeout: Duration::from_millis(self.write_timeout_ms),
            },
            consumer: settings::ConsumerSettings {
                server_address: address,
                keep_alive_interval: Duration::from_millis(self.keep_alive_interval_ms),
                max_keep_alives: self.max_keep_alives,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn test_positional_consumer_count() {
        let cli = Cli::try_parse_from(["timecast", "10"]).unwrap();
        assert_eq!(cli.consumers, 10);
        assert_eq!(cli.port, settings::STANDARD_PORT);

        let settings = cli.into_settings().unwrap();
        assert_eq!(settings.consumers, 10);
        assert_eq!(settings.producer.listen_address.port(), 29999);
        assert_eq!(settings.consumer.server_address, settings.producer.listen_address);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_rejects_missing_zero_and_garbage() {
        assert!(Cli::try_parse_from(["timecast"]).is_err());
        assert!(Cli::try_parse_from(["timecast", "0"]).is_err());
        assert!(Cli::try_parse_from(["timecast", "-3"]).is_err());
        assert!(Cli::try_parse_from(["timecast", "many"]).is_err());
    }

    #[test]
    fn test_invalid_listen_address() {
        let cli =
            Cli::try_parse_from(["timecast", "1", "--listen-address", "not-an-ip"]).unwrap();
        assert!(cli.into_settings().is_err());
    }
}
