//! Native Messaging host relaying between the browser and CLI invocations.
//!
//! The browser starts the host and talks to it over framed stdin/stdout (see
//! [`framing`](crate::framing)). CLI invocations connect over TCP on loopback. Every frame coming
//! from the browser is broadcast, newline terminated, to every connected CLI. Each CLI sends at
//! most one request, which is forwarded to the browser as one frame.
//!
//! Three threads do the work:
//!
//! - the stdin reader, broadcasting frames through the [`ClientRegistry`]
//! - the acceptor, registering clients and reading their request
//! - the upstream writer, sole owner of stdout, fed through a bounded channel
//!
//! [`Bridge::run`] returns as soon as the stdin reader or the writer stops, with the reason.
//! There is no other way to stop the bridge.

mod registry;
pub mod relay;

use std::{
    io::{self, Read, Write},
    net::{SocketAddr, TcpListener},
};

use tracing::{error, info};

pub use registry::{ClientId, ClientRegistry};

use crate::error::{AtmError, Result};

/// Capacity of the channel between the acceptor and the upstream writer.
pub const UPSTREAM_CAPACITY: usize = 64;

/// Why the bridge stopped.
#[derive(Debug)]
pub enum BridgeExit {
    /// The browser closed stdin. Clean shutdown.
    PeerClosed,
    /// Reading stdin failed.
    ReadFailed(io::Error),
    /// Writing to stdout failed (browser gone).
    WriteFailed(io::Error),
}

impl BridgeExit {
    pub fn exit_code(&self) -> i32 {
        match self {
            BridgeExit::PeerClosed => 0,
            BridgeExit::ReadFailed(_) | BridgeExit::WriteFailed(_) => 1,
        }
    }
}

/// Bind the client listener. Failing here is fatal for the host.
pub fn bind(addr: SocketAddr) -> Result<TcpListener> {
    let listener =
        TcpListener::bind(addr).map_err(|e| AtmError::io(format!("failed to bind {addr}"), e))?;
    info!("socket server listening on {addr}");
    Ok(listener)
}

/// The relay itself. See the module documentation.
#[derive(Debug, Clone, Default)]
pub struct Bridge {
    registry: ClientRegistry,
}

impl Bridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle on the set of connected clients.
    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// Relay until the browser side goes away.
    pub fn run<R, W>(self, input: R, output: W, listener: TcpListener) -> Result<BridgeExit>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let (control_tx, control_rx) = crossbeam_channel::bounded::<BridgeExit>(2);
        let (upstream_tx, upstream_rx) = crossbeam_channel::bounded(UPSTREAM_CAPACITY);
        let spawn_error = |e: io::Error| AtmError::io("could not spawn bridge thread", e);

        relay::spawn_reporting("upstream-writer", control_tx.clone(), move || {
            relay::forward_upstream(output, upstream_rx)
                .err()
                .map(BridgeExit::WriteFailed)
        })
        .map_err(spawn_error)?;

        let registry = self.registry.clone();
        std::thread::Builder::new()
            .name("socket-server".to_owned())
            .spawn(move || relay::accept_clients(listener, registry, upstream_tx))
            .map_err(spawn_error)?;

        let registry = self.registry.clone();
        relay::spawn_reporting("stdin-reader", control_tx, move || {
            Some(relay::receive_frames(input, &registry))
        })
        .map_err(spawn_error)?;

        let exit = control_rx.recv().unwrap_or(BridgeExit::PeerClosed);
        match &exit {
            BridgeExit::PeerClosed => info!("browser closed the channel"),
            BridgeExit::ReadFailed(e) => error!("stdin failed: {e}"),
            BridgeExit::WriteFailed(e) => error!("stdout failed: {e}"),
        }
        Ok(exit)
    }
}
