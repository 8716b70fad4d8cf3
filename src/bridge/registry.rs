use std::{
    io::Write,
    net::{SocketAddr, TcpStream},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tracing::{debug, warn};

/// Identifier handed out by [`ClientRegistry::register`].
pub type ClientId = u64;

#[derive(Debug)]
struct ClientConnection {
    id: ClientId,
    peer: Option<SocketAddr>,
    stream: TcpStream,
}

#[derive(Debug, Default)]
struct Clients {
    next_id: ClientId,
    connections: Vec<ClientConnection>,
}

/// Set of CLI connections currently receiving broadcasts.
///
/// Cloning is cheap and every clone sees the same set. The lock is held for a whole broadcast,
/// so a connection registered while a frame is being delivered only gets the following frames.
#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    inner: Arc<Mutex<Clients>>,
}

impl ClientRegistry {
    /// A client that stops reading is dropped after this long instead of stalling everyone.
    pub const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Clients> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add `stream` to the broadcast set.
    pub fn register(&self, stream: TcpStream) -> ClientId {
        if let Err(e) = stream.set_write_timeout(Some(Self::WRITE_TIMEOUT)) {
            warn!("could not set write timeout on client socket: {e}");
        }
        let peer = stream.peer_addr().ok();

        let mut clients = self.lock();
        let id = clients.next_id;
        clients.next_id += 1;
        clients.connections.push(ClientConnection { id, peer, stream });
        debug!(id, ?peer, total = clients.connections.len(), "client registered");
        id
    }

    /// Remove a client. Returns false if it was already gone.
    pub fn remove(&self, id: ClientId) -> bool {
        let mut clients = self.lock();
        let before = clients.connections.len();
        clients.connections.retain(|c| c.id != id);
        before != clients.connections.len()
    }

    pub fn len(&self) -> usize {
        self.lock().connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write `bytes` to every registered client, dropping the ones that fail.
    ///
    /// Returns the number of clients the bytes were delivered to.
    pub fn broadcast(&self, bytes: &[u8]) -> usize {
        let mut clients = self.lock();
        clients.connections.retain_mut(|client| {
            match client.stream.write_all(bytes).and_then(|_| client.stream.flush()) {
                Ok(()) => true,
                Err(e) => {
                    warn!(id = client.id, peer = ?client.peer, "dropping client: {e}");
                    false
                }
            }
        });
        clients.connections.len()
    }
}

#[cfg(test)]
mod registry_tests {
    use std::{
        io::{BufRead, BufReader},
        net::TcpListener,
    };

    use super::*;

    fn socket_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        (server, client)
    }

    #[test]
    fn test_register_and_remove() {
        let registry = ClientRegistry::new();
        let (a, _a) = socket_pair();
        let (b, _b) = socket_pair();
        let id_a = registry.register(a);
        let id_b = registry.register(b);
        assert_ne!(id_a, id_b);
        assert_eq!(registry.len(), 2);

        assert!(registry.remove(id_a));
        assert!(!registry.remove(id_a));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_broadcast_reaches_every_client() {
        let registry = ClientRegistry::new();
        let mut readers = vec![];
        for _ in 0..3 {
            let (server, client) = socket_pair();
            registry.register(server);
            readers.push(BufReader::new(client));
        }

        assert_eq!(registry.broadcast(b"{\"action\":\"gen_log\"}\n"), 3);
        for reader in &mut readers {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            assert_eq!(line, "{\"action\":\"gen_log\"}\n");
        }
    }

    #[test]
    fn test_clones_share_clients() {
        let registry = ClientRegistry::new();
        let clone = registry.clone();
        let (server, _client) = socket_pair();
        clone.register(server);
        assert!(!registry.is_empty());
    }
}
