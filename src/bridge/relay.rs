//! The three loops of the native host.
//!
//! - [`receive_frames`]: framed stdin → every registered client (one line per frame)
//! - [`accept_clients`]: TCP listener → registry, plus one request per connection
//! - [`forward_upstream`]: client requests → framed stdout, single writer

use std::{
    io::{self, Read, Write},
    net::{TcpListener, TcpStream},
    thread,
    time::Duration,
};

use crossbeam_channel::{Receiver, Sender};
use serde::de::IgnoredAny;
use serde_json::Value;
use tracing::{debug, error, info, instrument, trace, warn};

use super::{registry::ClientId, BridgeExit, ClientRegistry};
use crate::framing::{read_frame, send_message};

/// Upper bound of the request read on each client connection.
pub const MAX_REQUEST_LEN: usize = 1024 * 1024;

const INITIAL_REQUEST_LEN: usize = 8 * 1024;

/// How long the end of a request may lag behind its first bytes.
const REQUEST_TAIL_TIMEOUT: Duration = Duration::from_millis(200);

/// Read frames until the browser closes the channel, broadcasting each one.
pub fn receive_frames<R: Read>(mut input: R, registry: &ClientRegistry) -> BridgeExit {
    loop {
        match read_frame(&mut input) {
            Ok(Some(mut frame)) => {
                trace!(
                    "received from extension: {}",
                    String::from_utf8_lossy(&frame)
                );
                frame.push(b'\n');
                let delivered = registry.broadcast(&frame);
                debug!(delivered, "frame broadcast");
            }
            Ok(None) => {
                info!("EOF from stdin, exiting");
                return BridgeExit::PeerClosed;
            }
            Err(e) => {
                error!("error reading from stdin: {e}");
                return BridgeExit::ReadFailed(e);
            }
        }
    }
}

/// Write every payload received on `requests` as one frame. Returns on the first write error,
/// or with `Ok` once every sender is gone.
pub fn forward_upstream<W: Write>(mut output: W, requests: Receiver<Value>) -> io::Result<()> {
    for payload in requests {
        send_message(&mut output, &payload).inspect_err(|e| {
            error!("failed to send message to the browser: {e}");
        })?;
        debug!("request forwarded to the browser");
    }
    Ok(())
}

/// Accept clients forever. Each connection is registered before its request is read, so it
/// receives every frame that arrives after it connected.
pub fn accept_clients(listener: TcpListener, registry: ClientRegistry, upstream: Sender<Value>) {
    for conn in listener.incoming() {
        let stream = match conn {
            Ok(stream) => stream,
            Err(e) => {
                warn!("error accepting client: {e}");
                continue;
            }
        };
        info!(peer = ?stream.peer_addr().ok(), "client connected");

        let for_registry = match stream.try_clone() {
            Ok(clone) => clone,
            Err(e) => {
                warn!("could not clone client socket: {e}");
                continue;
            }
        };
        let id = registry.register(for_registry);

        let registry = registry.clone();
        let upstream = upstream.clone();
        let spawned = thread::Builder::new()
            .name(format!("client-{id}"))
            .spawn(move || read_request(stream, id, &registry, &upstream));
        if let Err(e) = spawned {
            warn!("could not spawn reader for client {id}: {e}");
        }
    }
}

/// Reads the request of a client connection and hands it to the upstream writer.
#[instrument(skip(stream, registry, upstream))]
fn read_request(
    mut stream: TcpStream,
    id: ClientId,
    registry: &ClientRegistry,
    upstream: &Sender<Value>,
) {
    let buf = match read_payload(&mut stream) {
        Ok(buf) if buf.is_empty() => {
            debug!("client closed without sending a request");
            registry.remove(id);
            return;
        }
        Ok(buf) => buf,
        Err(e) => {
            warn!("error reading client request: {e}");
            registry.remove(id);
            return;
        }
    };

    match serde_json::from_slice::<Value>(&buf) {
        Ok(payload) => {
            info!("received from CLI, sending to extension");
            if upstream.send(payload).is_err() {
                error!("upstream writer is gone, request dropped");
            }
        }
        Err(e) => warn!("ignoring malformed request ({} bytes): {e}", buf.len()),
    }
}

/// Read one request of at most [`MAX_REQUEST_LEN`] bytes.
///
/// The buffer starts at [`INITIAL_REQUEST_LEN`] and doubles while the bytes read so far are not
/// a complete JSON value. Once the first bytes are in, the rest must follow within
/// [`REQUEST_TAIL_TIMEOUT`]; whatever arrived by then is the request.
fn read_payload(stream: &mut TcpStream) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; INITIAL_REQUEST_LEN];
    let mut len = 0;
    loop {
        if len == buf.len() {
            if len == MAX_REQUEST_LEN {
                break;
            }
            buf.resize((len * 2).min(MAX_REQUEST_LEN), 0);
        }
        match stream.read(&mut buf[len..]) {
            Ok(0) => break,
            Ok(n) => {
                if len == 0 {
                    stream.set_read_timeout(Some(REQUEST_TAIL_TIMEOUT))?;
                }
                len += n;
            }
            Err(e) if len > 0 && is_timeout(&e) => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
        if serde_json::from_slice::<IgnoredAny>(&buf[..len]).is_ok() {
            break;
        }
    }
    buf.truncate(len);
    Ok(buf)
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

/// Spawn a named thread whose result is reported on `control`.
pub(super) fn spawn_reporting<F>(
    name: &str,
    control: Sender<BridgeExit>,
    f: F,
) -> io::Result<thread::JoinHandle<()>>
where
    F: FnOnce() -> Option<BridgeExit> + Send + 'static,
{
    thread::Builder::new().name(name.to_owned()).spawn(move || {
        if let Some(exit) = f() {
            let _ = control.send(exit);
        }
    })
}
