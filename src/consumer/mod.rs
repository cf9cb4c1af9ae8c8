//! A consumer: connects to the producer, registers, keeps itself alive for a
//! random number of rounds and prints the TIME messages it receives.
//!
//! The sending and receiving sides run as two independent tasks over the
//! two halves of one TCP stream.
use rand::Rng;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub mod receiver;
pub mod sender;

use crate::error::{Result, TimecastError};
use crate::settings::ConsumerSettings;
pub use receiver::receive_times;
pub use sender::{connection_ended, send_heartbeats};

pub struct Consumer {
    name: String,
    settings: ConsumerSettings,
    forward_times: bool,
}

/// A connected consumer whose tasks are running
pub struct ConsumerHandle {
    pub name: String,
    pub keep_alives: u32,
    sender: JoinHandle<Result<u32>>,
    receiver: JoinHandle<Result<u64>>,
    times: Option<mpsc::UnboundedReceiver<i64>>,
}

/// How a consumer's two tasks ended
#[derive(Debug)]
pub struct ConsumerOutcome {
    pub keep_alives_sent: Result<u32>,
    pub times_received: Result<u64>,
}

impl Consumer {
    pub fn new(name: impl Into<String>, settings: ConsumerSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            forward_times: true,
        }
    }

    /// Only print received TIME values; [`ConsumerHandle::next_time`] then
    /// always returns `None` and nothing is queued.
    pub fn print_only(mut self) -> Self {
        self.forward_times = false;
        self
    }

    /// Draw how many keep-alives to send, uniformly from `0..=max_keep_alives`
    pub fn draw_keep_alive_count<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        rng.gen_range(0..=self.settings.max_keep_alives)
    }

    /// Connect with a randomly drawn keep-alive count
    pub async fn connect(self) -> Result<ConsumerHandle> {
        let keep_alives = self.draw_keep_alive_count(&mut rand::thread_rng());
        self.connect_with_keep_alives(keep_alives).await
    }

    /// Connect and start both tasks with a fixed keep-alive count.
    ///
    /// Whichever way the receiving side ends, the sending side stops and
    /// drops its write half, so the connection is released as a whole.
    pub async fn connect_with_keep_alives(self, keep_alives: u32) -> Result<ConsumerHandle> {
        let address = self.settings.server_address;
        let stream = TcpStream::connect(address).await.map_err(|e| {
            TimecastError::Transport(format!("Failed to connect to {}: {}", address, e))
        })?;
        let _ = stream.set_nodelay(true);
        info!(
            "[Consumer {}] Connected to {}, will send {} keep-alives",
            self.name, address, keep_alives
        );

        let (mut read_half, mut write_half) = stream.into_split();
        let (times_tx, times_rx) = mpsc::unbounded_channel();
        let times = self.forward_times.then_some(times_rx);
        let (ended_tx, mut ended) = watch::channel(false);

        let name = self.name.clone();
        let interval = self.settings.keep_alive_interval;
        let sender = tokio::spawn(async move {
            let result =
                send_heartbeats(&name, &mut write_half, keep_alives, interval, &mut ended).await;
            if let Err(e) = &result {
                warn!("[Consumer {}] Sending stopped: {}", name, e);
                return result;
            }
            // Dropping the write half would end the stream for the producer,
            // so hold it until the receiving side sees the connection end.
            connection_ended(&mut ended).await;
            debug!("[Consumer {}] Sender done", name);
            result
        });

        let name = self.name.clone();
        let receiver = tokio::spawn(async move {
            let result = receive_times(&name, &mut read_half, times_tx).await;
            if let Err(e) = &result {
                warn!("[Consumer {}] Receiving stopped: {}", name, e);
            }
            let _ = ended_tx.send(true);
            result
        });

        Ok(ConsumerHandle {
            name: self.name,
            keep_alives,
            sender,
            receiver,
            times,
        })
    }
}

impl ConsumerHandle {
    /// Next TIME value received, or `None` once the receiving side has ended
    /// or when the consumer was built with [`Consumer::print_only`]
    pub async fn next_time(&mut self) -> Option<i64> {
        match self.times.as_mut() {
            Some(times) => times.recv().await,
            None => None,
        }
    }

    pub fn abort(&self) {
        self.sender.abort();
        self.receiver.abort();
    }

    /// Wait for both tasks to end
    pub async fn join(self) -> ConsumerOutcome {
        let keep_alives_sent = match self.sender.await {
            Ok(result) => result,
            Err(e) => Err(e.into()),
        };
        let times_received = match self.receiver.await {
            Ok(result) => result,
            Err(e) => Err(e.into()),
        };
        ConsumerOutcome {
            keep_alives_sent,
            times_received,
        }
    }
}
