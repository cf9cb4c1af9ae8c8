//! Consumer receiving side: prints every TIME the producer sends.
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::Result;
use crate::protocol::{read_producer_message, ProducerMessage};

/// Read producer messages until the stream ends.
///
/// Each TIME is printed and forwarded to `times`; a dropped observer does not
/// stop the loop. End of stream returns `Ok`, any other read failure
/// (including an unknown opcode) is returned as the error.
pub async fn receive_times<R>(
    name: &str,
    reader: &mut R,
    times: mpsc::UnboundedSender<i64>,
) -> Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut received = 0u64;
    loop {
        match read_producer_message(reader).await {
            Ok(ProducerMessage::Time(millis)) => {
                received += 1;
                println!("[{}] CurrentTime: {}", name, millis);
                let _ = times.send(millis);
            }
            Err(e) if e.is_disconnect() => {
                info!(
                    "[Consumer {}] Producer closed the connection after {} TIME messages",
                    name, received
                );
                return Ok(received);
            }
            Err(e) => {
                debug!("[Consumer {}] Receive failed: {}", name, e);
                return Err(e);
            }
        }
    }
}
