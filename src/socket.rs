//! # Summary
//!
//! This module abstracts over connections to peer members.
//!
//! Messages travel one per line over short-lived TCP connections: each send
//! opens a connection, writes a single line through `tokio-util`'s
//! `LinesCodec`, and closes it. Failed sends are retried a bounded number of
//! times and then abandoned, which the protocol treats like any other loss.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};

use crate::config::NodeContext;
use crate::directory::{Address, PeerDirectory};
use crate::engine::Engine;
use crate::state;

/// Longest line accepted from a peer.
const MAX_LINE: usize = 64 * 1024;

/// Outbound half of the network as seen by the engine.
pub trait Transport: Send + Sync + 'static {
    /// Fire-and-forget delivery of one encoded message to `member`.
    fn send_to(&self, member: &str, line: String);
}

/// Sends each message over a fresh TCP connection to the member's address.
#[derive(Clone, Debug)]
pub struct TcpTransport {
    id: String,
    directory: Arc<PeerDirectory>,
    attempts: usize,
    backoff: Duration,
}

impl TcpTransport {
    pub fn new(context: &NodeContext) -> Self {
        TcpTransport {
            id: context.id().to_string(),
            directory: context.directory().clone(),
            attempts: context.send_attempts(),
            backoff: context.send_backoff(),
        }
    }
}

impl Transport for TcpTransport {
    /// Spawns the send onto the current Tokio runtime and returns immediately.
    fn send_to(&self, member: &str, line: String) {
        let address = match self.directory.address(member) {
        | Ok(address) => address.clone(),
        | Err(err) => {
            warn!("[{}] cannot send to {}: {}", self.id, member, err);
            return
        }
        };

        let id = self.id.clone();
        let member = member.to_string();
        let attempts = self.attempts;
        let backoff = self.backoff;

        tokio::spawn(async move {
            for attempt in 1..=attempts {
                match deliver(&address, &line).await {
                | Ok(()) => return,
                | Err(err) => {
                    debug!("[{}] send to {} at {} failed (attempt {}/{}): {}", id, member, address, attempt, attempts, err);
                    if attempt < attempts {
                        tokio::time::sleep(backoff * attempt as u32).await;
                    }
                }
                }
            }
            error!("[{}] abandoned message to {} after {} attempts", id, member, attempts);
        });
    }
}

async fn deliver(address: &Address, line: &str) -> Result<(), LinesCodecError> {
    let stream = TcpStream::connect((address.host.as_str(), address.port)).await?;
    let mut tx = FramedWrite::new(stream, LinesCodec::new());
    tx.send(line).await?;
    SinkExt::<&str>::close(&mut tx).await
}

/// Accepts peer connections forever, handing every received line to `engine`
/// on its own task so a delayed message never holds up the ones behind it.
pub async fn serve<V: state::Value>(listener: TcpListener, engine: Engine<V>) {
    loop {
        let (stream, peer) = match listener.accept().await {
        | Ok(connection) => connection,
        | Err(err) => {
            warn!("[{}] failed to accept connection: {}", engine.id(), err);
            continue
        }
        };

        trace!("[{}] connection from {}", engine.id(), peer);
        let engine = engine.clone();
        tokio::spawn(async move {
            let mut rx = FramedRead::new(stream, LinesCodec::new_with_max_length(MAX_LINE));
            while let Some(line) = rx.next().await {
                match line {
                | Ok(line) => {
                    let engine = engine.clone();
                    tokio::spawn(async move { engine.handle_message(&line).await });
                }
                | Err(err) => {
                    warn!("[{}] dropping connection from {}: {}", engine.id(), peer, err);
                    break
                }
                }
            }
        });
    }
}
