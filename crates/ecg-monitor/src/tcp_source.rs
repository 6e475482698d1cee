//! Newline-delimited TCP sample source
//!
//! Each line carries one decimal sample. The task connects on start, reports
//! the link lifecycle as [`TransportEvent`]s and stays idle after the peer
//! closes until asked to connect again.

use ecg_core::{EcgError, EcgResult, RawSample, TransportEvent};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Longest accepted line, terminator included
pub const MAX_LINE_BYTES: usize = 64;

/// Commands accepted by the TCP source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcpCommand {
    /// Open a new connection, closing the current one first
    Connect,
    /// Close the current connection
    Disconnect,
}

/// How a connection ended
enum SessionEnd {
    Idle,
    Reconnect,
    Shutdown,
}

pub struct TcpSource {
    addr: String,
    events: mpsc::Sender<TransportEvent>,
    commands: mpsc::Receiver<TcpCommand>,
    lines_skipped: u64,
}

impl TcpSource {
    pub fn new(
        addr: impl Into<String>,
        buffer_size: usize,
    ) -> (Self, mpsc::Receiver<TransportEvent>, mpsc::Sender<TcpCommand>) {
        let (events, event_receiver) = mpsc::channel(buffer_size.max(1));
        let (command_sender, commands) = mpsc::channel(8);

        let source = TcpSource {
            addr: addr.into(),
            events,
            commands,
            lines_skipped: 0,
        };
        (source, event_receiver, command_sender)
    }

    /// Run until the command channel closes or the event receiver is dropped
    pub async fn run(mut self) {
        let mut connect = true;

        loop {
            if connect {
                match self.session().await {
                    Ok(SessionEnd::Idle) => connect = false,
                    Ok(SessionEnd::Reconnect) => {}
                    Ok(SessionEnd::Shutdown) => break,
                    Err(e) => {
                        debug!(addr = %self.addr, error = %e, "TCP source stopping");
                        break;
                    }
                }
            } else {
                match self.commands.recv().await {
                    Some(TcpCommand::Connect) => connect = true,
                    Some(TcpCommand::Disconnect) => {}
                    None => break,
                }
            }
        }

        debug!(addr = %self.addr, skipped = self.lines_skipped, "TCP source finished");
    }

    async fn session(&mut self) -> EcgResult<SessionEnd> {
        self.emit(TransportEvent::Connecting).await?;

        let addr = self.addr.clone();
        let stream = tokio::select! {
            connected = TcpStream::connect(addr.as_str()) => match connected {
                Ok(stream) => stream,
                Err(e) => {
                    let error = transport_error("connect", &e);
                    warn!(addr = %self.addr, error = %error, "TCP connect failed");
                    return self.end(TransportEvent::Errored(error.to_string()), SessionEnd::Idle).await;
                }
            },

            command = self.commands.recv() => return self.interrupted(command).await,
        };

        info!(addr = %self.addr, "TCP link opened");
        self.emit(TransportEvent::Opened).await?;

        let mut reader = BufReader::new(stream);
        let mut line = Vec::with_capacity(MAX_LINE_BYTES);
        loop {
            tokio::select! {
                read = read_line(&mut reader, &mut line) => match read {
                    Ok(Some(text)) => {
                        let Some(sample) = parse_sample(&text) else {
                            if !text.trim().is_empty() {
                                self.lines_skipped += 1;
                                warn!(line = %text.trim(), "Skipping unparseable sample line");
                            }
                            continue;
                        };
                        self.emit(TransportEvent::Sample(sample)).await?;
                    }
                    Ok(None) => {
                        info!(addr = %self.addr, "TCP peer closed the link");
                        return self.end(TransportEvent::Closed, SessionEnd::Idle).await;
                    }
                    Err(e) => {
                        warn!(addr = %self.addr, error = %e, "TCP read failed");
                        return self.end(TransportEvent::Errored(e.to_string()), SessionEnd::Idle).await;
                    }
                },

                command = self.commands.recv() => return self.interrupted(command).await,
            }
        }
    }

    /// A command arrived while connecting or streaming
    async fn interrupted(&self, command: Option<TcpCommand>) -> EcgResult<SessionEnd> {
        match command {
            Some(TcpCommand::Disconnect) => {
                info!(addr = %self.addr, "TCP link closed on request");
                self.end(TransportEvent::Closed, SessionEnd::Idle).await
            }
            Some(TcpCommand::Connect) => self.end(TransportEvent::Closed, SessionEnd::Reconnect).await,
            None => Ok(SessionEnd::Shutdown),
        }
    }

    async fn end(&self, event: TransportEvent, end: SessionEnd) -> EcgResult<SessionEnd> {
        self.emit(event).await?;
        Ok(end)
    }

    async fn emit(&self, event: TransportEvent) -> EcgResult<()> {
        self.events
            .send(event)
            .await
            .map_err(|_| EcgError::ChannelClosed { channel: "TCP events" })
    }
}

fn transport_error(action: &str, e: &std::io::Error) -> EcgError {
    EcgError::TransportError {
        reason: format!("{} failed: {}", action, e),
    }
}

/// Read one line into `buf`, refusing lines longer than [`MAX_LINE_BYTES`]
///
/// Returns `None` at end of stream. Bytes already read stay in `buf` if the
/// future is dropped, so the next call picks up the same line.
async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> EcgResult<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let limit = (MAX_LINE_BYTES + 1).saturating_sub(buf.len()) as u64;
        let read = (&mut *reader)
            .take(limit)
            .read_until(b'\n', buf)
            .await
            .map_err(|e| transport_error("read", &e))?;

        if buf.last() == Some(&b'\n') {
            break;
        }
        if buf.len() > MAX_LINE_BYTES {
            buf.clear();
            return Err(EcgError::TransportError {
                reason: format!("line longer than {} bytes", MAX_LINE_BYTES),
            });
        }
        if read == 0 {
            if buf.is_empty() {
                return Ok(None);
            }
            break;
        }
    }

    let text = String::from_utf8_lossy(buf).into_owned();
    buf.clear();
    Ok(Some(text))
}

/// Parse one line of device output
pub fn parse_sample(line: &str) -> Option<RawSample> {
    line.trim().parse().ok()
}

/// Spawn a TCP source that connects immediately
pub fn start_tcp_source(
    addr: impl Into<String>,
    buffer_size: usize,
) -> (mpsc::Receiver<TransportEvent>, mpsc::Sender<TcpCommand>) {
    let (source, events, commands) = TcpSource::new(addr, buffer_size);
    tokio::spawn(source.run());
    (events, commands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;
    use tokio::time::{timeout, Duration};

    async fn next_event(events: &mut mpsc::Receiver<TransportEvent>) -> TransportEvent {
        timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("timed out waiting for an event")
            .expect("source ended")
    }

    #[test]
    fn test_parse_sample() {
        assert_eq!(parse_sample("512"), Some(512));
        assert_eq!(parse_sample("  0\r"), Some(0));
        assert_eq!(parse_sample("-4"), Some(-4));
        assert_eq!(parse_sample("abc"), None);
        assert_eq!(parse_sample("51.2"), None);
        assert_eq!(parse_sample(""), None);
    }

    #[tokio::test]
    async fn test_streams_lines_then_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"500\nnoise\n\n510\r\n0\n").await.unwrap();
        });

        let (mut events, _commands) = start_tcp_source(addr.to_string(), 16);
        assert_eq!(next_event(&mut events).await, TransportEvent::Connecting);
        assert_eq!(next_event(&mut events).await, TransportEvent::Opened);
        assert_eq!(next_event(&mut events).await, TransportEvent::Sample(500));
        assert_eq!(next_event(&mut events).await, TransportEvent::Sample(510));
        assert_eq!(next_event(&mut events).await, TransportEvent::Sample(0));
        assert_eq!(next_event(&mut events).await, TransportEvent::Closed);
    }

    #[tokio::test]
    async fn test_refused_connection_reports_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (mut events, _commands) = start_tcp_source(addr.to_string(), 16);
        assert_eq!(next_event(&mut events).await, TransportEvent::Connecting);
        match next_event(&mut events).await {
            TransportEvent::Errored(reason) => assert!(reason.starts_with("Transport error: connect")),
            other => panic!("expected an error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_line_splits_and_caps() {
        let mut reader: &[u8] = b"12\n 34\r\n56";
        let mut buf = Vec::new();
        assert_eq!(read_line(&mut reader, &mut buf).await, Ok(Some("12\n".to_string())));
        assert_eq!(read_line(&mut reader, &mut buf).await, Ok(Some(" 34\r\n".to_string())));
        assert_eq!(read_line(&mut reader, &mut buf).await, Ok(Some("56".to_string())));
        assert_eq!(read_line(&mut reader, &mut buf).await, Ok(None));

        let exact = format!("{}\n", "7".repeat(MAX_LINE_BYTES - 1));
        let mut reader = exact.as_bytes();
        assert_eq!(read_line(&mut reader, &mut buf).await, Ok(Some(exact.clone())));

        let long = "9".repeat(MAX_LINE_BYTES * 4);
        let mut reader = long.as_bytes();
        assert!(matches!(
            read_line(&mut reader, &mut buf).await,
            Err(EcgError::TransportError { .. })
        ));
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn test_endless_line_reports_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"512\n").await.unwrap();
            let digits = vec![b'1'; 4096];
            let _ = socket.write_all(&digits).await;
            // Keep the link open so only the length cap can end it
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let (mut events, _commands) = start_tcp_source(addr.to_string(), 16);
        assert_eq!(next_event(&mut events).await, TransportEvent::Connecting);
        assert_eq!(next_event(&mut events).await, TransportEvent::Opened);
        assert_eq!(next_event(&mut events).await, TransportEvent::Sample(512));
        match next_event(&mut events).await {
            TransportEvent::Errored(reason) => assert!(reason.contains("longer than")),
            other => panic!("expected an error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_disconnect_while_connecting() {
        // Unroutable address: the connect either hangs or fails fast
        let (mut events, commands) = start_tcp_source("10.255.255.1:9", 16);
        assert_eq!(next_event(&mut events).await, TransportEvent::Connecting);

        commands.send(TcpCommand::Disconnect).await.unwrap();
        assert!(matches!(
            next_event(&mut events).await,
            TransportEvent::Closed | TransportEvent::Errored(_)
        ));
    }

    #[tokio::test]
    async fn test_emit_fails_once_receiver_dropped() {
        let (source, events, _commands) = TcpSource::new("127.0.0.1:9", 1);
        drop(events);
        assert_eq!(
            source.emit(TransportEvent::Opened).await,
            Err(EcgError::ChannelClosed { channel: "TCP events" })
        );
    }

    #[tokio::test]
    async fn test_disconnect_and_reconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let (mut events, commands) = start_tcp_source(addr.to_string(), 16);
        assert_eq!(next_event(&mut events).await, TransportEvent::Connecting);
        assert_eq!(next_event(&mut events).await, TransportEvent::Opened);

        commands.send(TcpCommand::Disconnect).await.unwrap();
        assert_eq!(next_event(&mut events).await, TransportEvent::Closed);

        commands.send(TcpCommand::Connect).await.unwrap();
        assert_eq!(next_event(&mut events).await, TransportEvent::Connecting);
        assert_eq!(next_event(&mut events).await, TransportEvent::Opened);
    }
}
