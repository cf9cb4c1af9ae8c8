//! Consumer sending side: one REGISTER, then a fixed number of KEEP_ALIVE
//! signals on an absolute schedule.
use std::time::Duration;

use tokio::io::AsyncWrite;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use crate::error::Result;
use crate::protocol::{write_consumer_opcode, ConsumerOpcode};

/// Resolve once the receiving side has flagged the connection as ended, or
/// has gone away without flagging it.
pub async fn connection_ended(ended: &mut watch::Receiver<bool>) {
    loop {
        if *ended.borrow() {
            return;
        }
        if ended.changed().await.is_err() {
            return;
        }
    }
}

/// Send REGISTER, then `keep_alives` KEEP_ALIVE signals spaced `interval`
/// apart, the first one `interval` after registering.
///
/// Returns the number of keep-alives sent. Stops early, without error, when
/// `ended` reports that the connection is over, and at the first write
/// failure with that error.
pub async fn send_heartbeats<W>(
    name: &str,
    writer: &mut W,
    keep_alives: u32,
    interval: Duration,
    ended: &mut watch::Receiver<bool>,
) -> Result<u32>
where
    W: AsyncWrite + Unpin,
{
    write_consumer_opcode(writer, ConsumerOpcode::Register).await?;
    debug!("[Consumer {}] Registered, {} keep-alives to send", name, keep_alives);

    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

    for sent in 0..keep_alives {
        let next_keep_alive = async {
            ticker.tick().await;
            write_consumer_opcode(writer, ConsumerOpcode::KeepAlive).await
        };
        tokio::select! {
            _ = connection_ended(ended) => {
                debug!(
                    "[Consumer {}] Connection ended after {} keep-alives",
                    name, sent
                );
                return Ok(sent);
            }
            written = next_keep_alive => written?,
        }
        debug!(
            "[Consumer {}] Sent keep-alive, {} remaining",
            name,
            keep_alives - sent - 1
        );
    }
    Ok(keep_alives)
}
