//! Transport used by CLI invocations to talk to the native host.
//!
//! One connection, one request, then a stream of newline-delimited JSON events until the
//! request's final reply or EOF. Reads block without timeout: a host that never answers keeps the
//! CLI waiting until the connection is closed.

mod line_buffer;

use std::{
    collections::VecDeque,
    io::{Read, Write},
    net::{SocketAddr, TcpStream},
};

use tracing::{debug, instrument, trace};

pub use line_buffer::LineBuffer;

use crate::{
    error::{AtmError, Result},
    message::{Event, Request, SamplePair},
    samples::SampleSource,
};

/// Size of a single socket read.
const CHUNK_SIZE: usize = 4096;

/// Connection to the native host.
#[derive(Debug)]
pub struct BridgeClient {
    stream: TcpStream,
}

impl BridgeClient {
    /// Connect to the host. No retry: a refused connection means the host is not running.
    #[instrument]
    pub fn connect(addr: SocketAddr) -> Result<BridgeClient> {
        let stream =
            TcpStream::connect(addr).map_err(|source| AtmError::ConnectionUnavailable {
                addr: addr.to_string(),
                source,
            })?;
        debug!("connected to native host");
        Ok(BridgeClient { stream })
    }

    /// Send `request` in a single write. Streamed requests get a trailing newline.
    pub fn send(&mut self, request: &Request) -> Result<()> {
        let mut bytes = serde_json::to_vec(request)
            .map_err(|e| AtmError::Protocol(format!("could not encode request: {e}")))?;
        if request.expects_stream() {
            bytes.push(b'\n');
        }
        self.stream
            .write_all(&bytes)
            .map_err(|e| AtmError::io("could not send request to native host", e))
    }

    /// Turn the connection into a stream of events.
    pub fn events(self) -> EventStream {
        EventStream {
            stream: self.stream,
            buffer: LineBuffer::new(),
            ready: VecDeque::new(),
            closed: false,
        }
    }

    /// Connect, send `request` and feed every event to `on_event` until the final reply.
    ///
    /// Returns the final reply, or `None` if the host closed the connection first.
    pub fn exchange<F>(addr: SocketAddr, request: &Request, on_event: F) -> Result<Option<Event>>
    where
        F: FnMut(&Event),
    {
        let mut client = BridgeClient::connect(addr)?;
        client.send(request)?;
        client
            .events()
            .until(|event| request.is_final_reply(event), on_event)
    }
}

/// Events read from the host, in arrival order. Lines that are not JSON objects are skipped.
#[derive(Debug)]
pub struct EventStream {
    stream: TcpStream,
    buffer: LineBuffer,
    ready: VecDeque<Event>,
    closed: bool,
}

impl EventStream {
    /// Consume events until one satisfies `is_last`, which is returned. `None` on EOF.
    pub fn until<P, F>(self, is_last: P, mut on_event: F) -> Result<Option<Event>>
    where
        P: Fn(&Event) -> bool,
        F: FnMut(&Event),
    {
        for event in self {
            let event = event?;
            on_event(&event);
            if is_last(&event) {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }
}

impl Iterator for EventStream {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Some(Ok(event));
            }
            if self.closed {
                return None;
            }

            let mut chunk = [0u8; CHUNK_SIZE];
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    debug!("native host closed the connection");
                    self.closed = true;
                }
                Ok(n) => {
                    for line in self.buffer.push(&chunk[..n]) {
                        match Event::parse(&line) {
                            Some(event) => self.ready.push_back(event),
                            None => trace!("skipping non JSON line: {line}"),
                        }
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => {
                    self.closed = true;
                    return Some(Err(AtmError::io("error reading from native host", e)));
                }
            }
        }
    }
}

/// Fetches the samples of the task opened in the browser through the native host.
#[derive(Debug, Clone, Copy)]
pub struct BridgeContextSource {
    addr: SocketAddr,
}

impl BridgeContextSource {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }
}

impl SampleSource for BridgeContextSource {
    fn fetch_samples(&self) -> Result<Vec<SamplePair>> {
        let terminal = BridgeClient::exchange(self.addr, &Request::GetContext, |event| {
            if let Event::GenLog(message) = event {
                println!("[CLI] {message}");
            }
        })?;
        match terminal {
            Some(Event::ContextResult(samples)) => Ok(samples),
            Some(Event::GenError(error)) => Err(AtmError::Agent(error)),
            Some(other) => Err(AtmError::Protocol(format!(
                "unexpected reply to context request: {other:?}"
            ))),
            None => Err(AtmError::Protocol(
                "native host closed the connection before sending samples".to_owned(),
            )),
        }
    }
}
