use std::{
    io::{self, BufRead, BufReader, Cursor, Read, Write},
    net::{SocketAddr, TcpListener, TcpStream},
    sync::{Arc, Mutex},
    thread,
    time::{Duration, Instant},
};

use atcoder_tools_mini::{
    bridge::{Bridge, BridgeExit, ClientRegistry},
    framing::{read_frame, write_frame},
};
use crossbeam_channel::{Receiver, Sender};

/// Stdin stand-in: every chunk sent on the channel is readable, EOF once the sender is dropped.
struct ChannelReader {
    chunks: Receiver<Vec<u8>>,
    current: Cursor<Vec<u8>>,
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let n = self.current.read(buf)?;
            if n > 0 {
                return Ok(n);
            }
            match self.chunks.recv() {
                Ok(chunk) => self.current = Cursor::new(chunk),
                Err(_) => return Ok(0),
            }
        }
    }
}

/// Stdout stand-in shared with the test.
#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct Harness {
    addr: SocketAddr,
    registry: ClientRegistry,
    stdin: Option<Sender<Vec<u8>>>,
    stdout: SharedBuf,
    bridge: thread::JoinHandle<BridgeExit>,
}

impl Harness {
    fn start() -> Harness {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        let stdout = SharedBuf::default();

        let bridge = Bridge::new();
        let registry = bridge.registry().clone();
        let reader = ChannelReader {
            chunks: rx,
            current: Cursor::new(vec![]),
        };
        let writer = stdout.clone();
        let bridge = thread::spawn(move || bridge.run(reader, writer, listener).unwrap());

        Harness {
            addr,
            registry,
            stdin: Some(tx),
            stdout,
            bridge,
        }
    }

    fn connect(&self, expected_clients: usize) -> BufReader<TcpStream> {
        let stream = TcpStream::connect(self.addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        wait_for(|| self.registry.len() == expected_clients);
        BufReader::new(stream)
    }

    /// Send one framed message from the "browser", split in two chunks.
    fn send_frame(&self, json: &str) {
        let mut frame = vec![];
        write_frame(&mut frame, json.as_bytes()).unwrap();
        let tail = frame.split_off(3);
        let stdin = self.stdin.as_ref().unwrap();
        stdin.send(frame).unwrap();
        stdin.send(tail).unwrap();
    }

    fn upstream_frames(&self) -> Vec<serde_json::Value> {
        let bytes = self.stdout.0.lock().unwrap().clone();
        let mut cursor = Cursor::new(bytes);
        let mut frames = vec![];
        while let Some(frame) = read_frame(&mut cursor).unwrap() {
            frames.push(serde_json::from_slice(&frame).unwrap());
        }
        frames
    }

    fn close(mut self) -> BridgeExit {
        self.stdin.take();
        self.bridge.join().unwrap()
    }
}

fn wait_for(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met in time");
        thread::sleep(Duration::from_millis(5));
    }
}

fn read_line(client: &mut BufReader<TcpStream>) -> String {
    let mut line = String::new();
    client.read_line(&mut line).unwrap();
    line
}

#[test]
fn frames_reach_every_client_in_order() {
    let harness = Harness::start();
    let mut clients = (1..=3).map(|k| harness.connect(k)).collect::<Vec<_>>();

    harness.send_frame(r#"{"action":"gen_log","message":"one"}"#);
    harness.send_frame(r#"{"action":"gen_log","message":"two"}"#);

    for client in &mut clients {
        assert_eq!(read_line(client), "{\"action\":\"gen_log\",\"message\":\"one\"}\n");
        assert_eq!(read_line(client), "{\"action\":\"gen_log\",\"message\":\"two\"}\n");
    }
    assert!(matches!(harness.close(), BridgeExit::PeerClosed));
}

#[test]
fn request_is_forwarded_as_one_frame() {
    let harness = Harness::start();
    let mut client = harness.connect(1);
    client
        .get_mut()
        .write_all(b"{\"action\":\"gen\",\"contest_id\":\"abc300\"}\n")
        .unwrap();

    wait_for(|| !harness.upstream_frames().is_empty());
    assert_eq!(
        harness.upstream_frames(),
        vec![serde_json::json!({"action": "gen", "contest_id": "abc300"})]
    );
    harness.close();
}

#[test]
fn large_request_is_forwarded_whole() {
    let harness = Harness::start();
    let mut client = harness.connect(1);
    let source_code = "int main() {}\n".repeat(20_000);
    let request = serde_json::json!({
        "action": "submit",
        "contest_id": "abc300",
        "task_screen_name": "abc300_a",
        "language_id": "5001",
        "source_code": source_code,
    });
    client
        .get_mut()
        .write_all(&serde_json::to_vec(&request).unwrap())
        .unwrap();

    wait_for(|| !harness.upstream_frames().is_empty());
    assert_eq!(harness.upstream_frames(), vec![request]);
    harness.close();
}

#[test]
fn malformed_request_is_ignored() {
    let harness = Harness::start();
    let mut bad = harness.connect(1);
    bad.get_mut().write_all(b"this is not json").unwrap();

    let mut good = harness.connect(2);
    good.get_mut()
        .write_all(b"{\"action\":\"get_context\"}\n")
        .unwrap();

    wait_for(|| !harness.upstream_frames().is_empty());
    // give the bad request time to be (not) forwarded
    thread::sleep(Duration::from_millis(50));
    assert_eq!(
        harness.upstream_frames(),
        vec![serde_json::json!({"action": "get_context"})]
    );
    harness.close();
}

#[test]
fn disconnected_client_does_not_block_others() {
    let harness = Harness::start();
    let gone = harness.connect(1);
    let mut alive = harness.connect(2);
    drop(gone);

    harness.send_frame(r#"{"action":"gen_log","message":"still here"}"#);
    assert_eq!(
        read_line(&mut alive),
        "{\"action\":\"gen_log\",\"message\":\"still here\"}\n"
    );
    wait_for(|| harness.registry.len() == 1);
    harness.close();
}

#[test]
fn late_client_misses_earlier_frames() {
    let harness = Harness::start();
    let mut early = harness.connect(1);
    harness.send_frame(r#"{"n":1}"#);
    assert_eq!(read_line(&mut early), "{\"n\":1}\n");

    let mut late = harness.connect(2);
    harness.send_frame(r#"{"n":2}"#);
    assert_eq!(read_line(&mut late), "{\"n\":2}\n");
    assert_eq!(read_line(&mut early), "{\"n\":2}\n");
    harness.close();
}

#[test]
fn stdin_eof_stops_the_bridge() {
    let harness = Harness::start();
    let exit = harness.close();
    assert!(matches!(exit, BridgeExit::PeerClosed));
    assert_eq!(exit.exit_code(), 0);
}
