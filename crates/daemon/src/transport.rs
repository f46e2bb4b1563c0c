//! Transport seam: the wireless stack as a narrow collaborator.
//!
//! The pipeline only ever asks the transport to advertise, serve one
//! peer at a time, deliver fixed-size notifications, hand over one-byte
//! command writes and report disconnects. [`TcpTransport`] realizes
//! that contract over TCP for hosts without a radio stack.

use std::net::SocketAddr;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no peer connected")]
    NotConnected,
    #[error("peer disconnected")]
    Disconnected,
}

/// Narrow interface to the wireless stack. One peer at a time; commands
/// are single bytes; notifications are fixed-size frames with no
/// end-to-end acknowledgment.
#[async_trait]
pub trait Transport: Send {
    /// Make the service visible so exactly one peer can connect.
    async fn advertise(&mut self) -> Result<(), TransportError>;

    /// Wait until a peer connects.
    async fn wait_for_peer(&mut self) -> Result<(), TransportError>;

    /// True while the accepted peer is still connected.
    fn is_connected(&self) -> bool;

    /// Take the next command byte the peer wrote, if any. Non-blocking;
    /// the service loop consumes at most one per pass.
    fn take_command(&mut self) -> Option<u8>;

    /// Deliver one fixed-size frame to the peer.
    async fn notify(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    /// Cooperative yield for the transport's own protocol work; called
    /// once per service-loop pass.
    async fn housekeeping(&mut self);

    /// Drop the current peer, if any.
    async fn close_peer(&mut self);
}

/// TCP stand-in for the notify-style wireless transport.
///
/// A bound listener is "advertising"; an accepted socket is the connect
/// event; inbound bytes are command writes; `write_all` of a frame is a
/// notification; EOF or a write error is the disconnect event.
pub struct TcpTransport {
    listener: TcpListener,
    peer: Option<Peer>,
}

struct Peer {
    addr: SocketAddr,
    writer: OwnedWriteHalf,
    commands: mpsc::UnboundedReceiver<u8>,
    /// Flips false when the reader task observes EOF or a write fails.
    alive: bool,
}

impl TcpTransport {
    /// Bind the listener. Failure here is fatal at startup: the
    /// advertising invariant cannot be established.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await?;
        info!("transport listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            peer: None,
        })
    }

    /// Actual bound address, for tests binding port 0.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn advertise(&mut self) -> Result<(), TransportError> {
        self.peer = None;
        info!("advertising, ready for one peer");
        Ok(())
    }

    async fn wait_for_peer(&mut self) -> Result<(), TransportError> {
        let (stream, addr) = self.listener.accept().await?;
        stream.set_nodelay(true)?;
        let (mut read_half, writer) = stream.into_split();

        // The reader task owns the socket's read side and forwards
        // command bytes; dropping the sender is the disconnect signal
        // the service loop observes.
        let (tx, commands) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut byte = [0u8; 1];
            loop {
                match read_half.read(&mut byte).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        if tx.send(byte[0]).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        info!("peer connected from {addr}");
        self.peer = Some(Peer {
            addr,
            writer,
            commands,
            alive: true,
        });
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.peer.as_ref().map_or(false, |p| p.alive)
    }

    fn take_command(&mut self) -> Option<u8> {
        let peer = self.peer.as_mut()?;
        match peer.commands.try_recv() {
            Ok(byte) => Some(byte),
            Err(mpsc::error::TryRecvError::Empty) => None,
            Err(mpsc::error::TryRecvError::Disconnected) => {
                peer.alive = false;
                None
            }
        }
    }

    async fn notify(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let peer = self.peer.as_mut().ok_or(TransportError::NotConnected)?;
        if let Err(e) = peer.writer.write_all(frame).await {
            warn!("notify to {} failed, treating as disconnect: {e}", peer.addr);
            peer.alive = false;
            return Err(TransportError::Disconnected);
        }
        Ok(())
    }

    async fn housekeeping(&mut self) {
        tokio::task::yield_now().await;
    }

    async fn close_peer(&mut self) {
        if let Some(peer) = self.peer.take() {
            debug!("closing peer {}", peer.addr);
        }
    }
}
