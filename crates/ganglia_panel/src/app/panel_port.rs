use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};

use ganglia_engine::{CommandSink, ConsoleCommand};
use tracing::{debug, info, warn};

const MAX_PENDING_BYTES_PER_CLIENT: usize = 256 * 1024;
const MAX_PARTIAL_LINE_BYTES_PER_CLIENT: usize = 64 * 1024;
const REPLY_PREFIX: &str = "C ";
const BROADCAST_PREFIX: &str = "T ";

pub(crate) type ClientId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InboundLine {
    pub(crate) client: ClientId,
    pub(crate) line: String,
}

/// Collects what the console emits until the loop broadcasts it.
#[derive(Debug, Default)]
pub(crate) struct OutboundLines {
    lines: Vec<String>,
}

impl OutboundLines {
    pub(crate) fn take_lines(&mut self) -> Vec<String> {
        std::mem::take(&mut self.lines)
    }
}

impl CommandSink for OutboundLines {
    fn emit(&mut self, command: &ConsoleCommand) {
        self.lines.push(format!("emit {command}"));
    }

    fn request_snapshot(&mut self, seq: u64) {
        self.lines.push(format!("poll.request seq:{seq}"));
    }
}

#[derive(Debug)]
struct ClientConn {
    id: ClientId,
    peer: SocketAddr,
    stream: TcpStream,
    read_buf: Vec<u8>,
    pending: Vec<u8>,
}

/// Localhost line transport. Replies go to one client as `C ` lines;
/// console output is broadcast to every client as `T ` lines.
#[derive(Debug)]
pub(crate) struct PanelPort {
    listener: TcpListener,
    bound_port: u16,
    clients: Vec<ClientConn>,
    next_client_id: ClientId,
}

impl PanelPort {
    pub(crate) fn bind_localhost(port: u16) -> io::Result<Self> {
        let listener = TcpListener::bind(localhost_bind_addr(port))?;
        listener.set_nonblocking(true)?;
        let bound_port = listener.local_addr()?.port();
        Ok(Self {
            listener,
            bound_port,
            clients: Vec::new(),
            next_client_id: 1,
        })
    }

    pub(crate) fn bound_port(&self) -> u16 {
        self.bound_port
    }

    pub(crate) fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub(crate) fn poll_lines(&mut self, out: &mut Vec<InboundLine>) {
        self.accept_pending_clients();
        self.read_client_lines(out);
        self.flush();
    }

    pub(crate) fn send_reply(&mut self, client: ClientId, line: &str) {
        if let Some(conn) = self.clients.iter_mut().find(|conn| conn.id == client) {
            enqueue_line(conn, REPLY_PREFIX, line);
        }
    }

    pub(crate) fn broadcast(&mut self, line: &str) {
        for conn in &mut self.clients {
            enqueue_line(conn, BROADCAST_PREFIX, line);
        }
    }

    /// Writes as much pending output as each socket accepts. Clients that
    /// error or fall too far behind are dropped.
    pub(crate) fn flush(&mut self) {
        self.clients.retain_mut(|conn| {
            if conn.pending.len() > MAX_PENDING_BYTES_PER_CLIENT {
                warn!(
                    client = conn.id,
                    peer = %conn.peer,
                    pending_bytes = conn.pending.len(),
                    "panel_client_backlog_dropped"
                );
                return false;
            }
            match flush_pending(&mut conn.pending, |payload| conn.stream.write(payload)) {
                Ok(()) => true,
                Err(err) => {
                    warn!(
                        client = conn.id,
                        peer = %conn.peer,
                        error = %err,
                        "panel_client_write_failed"
                    );
                    false
                }
            }
        });
    }

    fn accept_pending_clients(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(err) = stream.set_nonblocking(true) {
                        warn!(error = %err, "panel_client_nonblocking_failed");
                        continue;
                    }
                    if let Err(err) = stream.set_nodelay(true) {
                        warn!(error = %err, "panel_client_nodelay_failed");
                    }
                    let mut conn = ClientConn {
                        id: self.next_client_id,
                        peer,
                        stream,
                        read_buf: Vec::new(),
                        pending: Vec::new(),
                    };
                    self.next_client_id = self.next_client_id.saturating_add(1);
                    enqueue_line(&mut conn, REPLY_PREFIX, &ready_line_text(self.bound_port));
                    info!(client = conn.id, peer = %peer, "panel_client_connected");
                    self.clients.push(conn);
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) => {
                    warn!(error = %err, "panel_accept_failed");
                    break;
                }
            }
        }
    }

    fn read_client_lines(&mut self, out: &mut Vec<InboundLine>) {
        self.clients.retain_mut(|conn| {
            let mut chunk = [0u8; 1024];
            let mut lines = Vec::new();
            let connected = loop {
                match conn.stream.read(&mut chunk) {
                    Ok(0) => break false,
                    Ok(bytes_read) => {
                        conn.read_buf.extend_from_slice(&chunk[..bytes_read]);
                        drain_complete_lines(&mut conn.read_buf, &mut lines);
                        if conn.read_buf.len() > MAX_PARTIAL_LINE_BYTES_PER_CLIENT {
                            warn!(
                                client = conn.id,
                                peer = %conn.peer,
                                buffered_bytes = conn.read_buf.len(),
                                "panel_client_line_too_long_dropped"
                            );
                            break false;
                        }
                    }
                    Err(err) if err.kind() == io::ErrorKind::WouldBlock => break true,
                    Err(err) => {
                        warn!(client = conn.id, error = %err, "panel_client_read_failed");
                        break false;
                    }
                }
            };
            out.extend(lines.into_iter().map(|line| InboundLine {
                client: conn.id,
                line,
            }));
            if !connected {
                info!(client = conn.id, peer = %conn.peer, "panel_client_disconnected");
            }
            connected
        });
    }
}

pub(crate) fn ready_line_text(port: u16) -> String {
    format!("panel.ready v1 port:{port}")
}

fn localhost_bind_addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

fn enqueue_line(conn: &mut ClientConn, prefix: &str, line: &str) {
    conn.pending.extend_from_slice(prefix.as_bytes());
    conn.pending.extend_from_slice(line.as_bytes());
    conn.pending.push(b'\n');
}

fn drain_complete_lines(buffer: &mut Vec<u8>, out: &mut Vec<String>) {
    while let Some(newline_index) = buffer.iter().position(|byte| *byte == b'\n') {
        let mut line_bytes = buffer.drain(..=newline_index).collect::<Vec<u8>>();
        line_bytes.pop(); // newline
        if line_bytes.last().copied() == Some(b'\r') {
            line_bytes.pop();
        }

        match String::from_utf8(line_bytes) {
            Ok(line) => {
                debug!(line = %line, "panel_line_read");
                out.push(line);
            }
            Err(err) => warn!(error = %err, "panel_invalid_utf8_line_dropped"),
        }
    }
}

fn flush_pending<F>(pending: &mut Vec<u8>, mut write_payload: F) -> io::Result<()>
where
    F: FnMut(&[u8]) -> io::Result<usize>,
{
    let mut written = 0usize;
    let result = loop {
        if written >= pending.len() {
            break Ok(());
        }
        match write_payload(&pending[written..]) {
            Ok(0) => {
                break Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "panel_write_zero",
                ))
            }
            Ok(bytes_written) => written = written.saturating_add(bytes_written),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => break Ok(()),
            Err(err) => break Err(err),
        }
    };
    pending.drain(..written.min(pending.len()));
    result
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpStream;
    use std::thread;
    use std::time::Duration;

    use ganglia_engine::{BayId, ConsoleCommand};

    use super::*;

    fn poll_until_lines(port: &mut PanelPort, out: &mut Vec<InboundLine>) {
        for _ in 0..50 {
            port.poll_lines(out);
            if !out.is_empty() {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn drain_complete_lines_keeps_partial_tail() {
        let mut buffer = b"plug 0 1 red\r\nshield\nsyn".to_vec();
        let mut out = Vec::new();
        drain_complete_lines(&mut buffer, &mut out);

        assert_eq!(out, vec!["plug 0 1 red".to_string(), "shield".to_string()]);
        assert_eq!(buffer, b"syn".to_vec());
    }

    #[test]
    fn invalid_utf8_line_is_dropped() {
        let mut buffer = vec![0xff, 0xfe, b'\n', b'o', b'k', b'\n'];
        let mut out = Vec::new();
        drain_complete_lines(&mut buffer, &mut out);
        assert_eq!(out, vec!["ok".to_string()]);
    }

    #[test]
    fn flush_keeps_unwritten_tail_on_would_block() {
        let mut pending = b"C ok: sync\n".to_vec();
        let mut calls = 0;
        flush_pending(&mut pending, |payload| {
            calls += 1;
            if calls == 1 {
                Ok(payload.len().min(4))
            } else {
                Err(io::Error::new(io::ErrorKind::WouldBlock, "full"))
            }
        })
        .expect("would block is not an error");
        assert_eq!(pending, b": sync\n".to_vec());

        let err = flush_pending(&mut pending, |_| Ok(0)).expect_err("write zero");
        assert_eq!(err.kind(), io::ErrorKind::WriteZero);
    }

    #[test]
    fn outbound_lines_format_emits_and_poll_requests() {
        let mut sink = OutboundLines::default();
        sink.emit(&ConsoleCommand::SubsystemLevel {
            bay: BayId(0),
            level: None,
        });
        sink.request_snapshot(4);
        assert_eq!(
            sink.take_lines(),
            vec![
                "emit subsystem_level bay:0 level:none".to_string(),
                "poll.request seq:4".to_string()
            ]
        );
        assert!(sink.take_lines().is_empty());
    }

    #[test]
    fn bind_address_is_localhost_only() {
        let addr = localhost_bind_addr(46101);
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 46101);
    }

    #[test]
    fn client_without_newline_is_dropped_past_the_read_cap() {
        let mut port = PanelPort::bind_localhost(0).expect("bind");
        let addr = port.listener.local_addr().expect("local addr");
        let mut client = TcpStream::connect(addr).expect("connect");
        let writer = thread::spawn(move || {
            let payload = vec![b'x'; MAX_PARTIAL_LINE_BYTES_PER_CLIENT + 1024];
            let _ = client.write_all(&payload);
            client
        });

        let mut out = Vec::new();
        for _ in 0..200 {
            port.poll_lines(&mut out);
            if port.next_client_id > 1 && port.client_count() == 0 {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(port.next_client_id, 2, "client was accepted");
        assert_eq!(port.client_count(), 0);
        assert!(out.is_empty());
        drop(writer.join().expect("writer thread"));
    }

    #[test]
    fn client_gets_ready_line_replies_and_broadcasts() {
        let mut port = PanelPort::bind_localhost(0).expect("bind");
        let addr = port.listener.local_addr().expect("local addr");
        let mut client = TcpStream::connect(addr).expect("connect");
        client
            .set_read_timeout(Some(Duration::from_secs(2)))
            .expect("read timeout");
        client.write_all(b"sync\n").expect("write");

        let mut out = Vec::new();
        poll_until_lines(&mut port, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].line, "sync");
        assert_eq!(port.client_count(), 1);

        port.send_reply(out[0].client, "ok: sync");
        port.broadcast("emit shield on");
        port.flush();

        let mut reader = BufReader::new(client);
        let mut lines = Vec::new();
        for _ in 0..3 {
            let mut line = String::new();
            reader.read_line(&mut line).expect("read line");
            lines.push(line.trim_end().to_string());
        }
        assert_eq!(
            lines,
            vec![
                format!("C {}", ready_line_text(port.bound_port())),
                "C ok: sync".to_string(),
                "T emit shield on".to_string(),
            ]
        );
    }
}
