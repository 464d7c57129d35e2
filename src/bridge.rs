//! UDP listener for the external control-event bridge
//!
//! Each datagram holds one or more newline-separated control strings.
//! Strings are queued as-is; parsing happens inside the tick.

use crate::control::split_messages;
use anyhow::{Context, Result};
use crossbeam::channel::Sender;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

/// Largest datagram accepted from the bridge
const MAX_DATAGRAM: usize = 4096;

pub struct ControlBridge {
    socket: UdpSocket,
    queue: Sender<String>,
}

impl ControlBridge {
    pub async fn bind(listen: &str, queue: Sender<String>) -> Result<Self> {
        let addr: SocketAddr = listen
            .parse()
            .with_context(|| format!("Invalid bridge address: {}", listen))?;
        let socket = UdpSocket::bind(addr)
            .await
            .with_context(|| format!("Failed to bind control bridge on {}", addr))?;
        info!("✅ Control bridge listening on {}", socket.local_addr()?);
        Ok(Self { socket, queue })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive datagrams until the tick side drops its queue
    pub async fn run(self) -> Result<()> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            let (len, peer) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    warn!("Control bridge receive failed: {}", e);
                    continue;
                }
            };

            let text = String::from_utf8_lossy(&buf[..len]);
            for message in split_messages(&text) {
                debug!("📥 {} from {}", message, peer);
                if self.queue.send(message.to_string()).is_err() {
                    info!("Control queue closed, stopping bridge");
                    return Ok(());
                }
            }
        }
    }
}
