//! Push channel over Server-Sent Events from the record server's `GET /events`.
//! Outbound hints go to `POST /events`.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::{
    error::{AppError, Result},
    sync::{OutboundHint, PushChannel, PushMessage},
};

const INBOX_CAPACITY: usize = 256;

pub struct SseChannel {
    client: Client,
    base_url: String,
    reader: Mutex<Option<JoinHandle<()>>>,
    disposed: AtomicBool,
}

impl SseChannel {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            reader: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }
    }

    fn events_url(&self) -> String {
        format!("{}/events", self.base_url)
    }
}

#[async_trait]
impl PushChannel for SseChannel {
    async fn connect(&self) -> Result<mpsc::Receiver<PushMessage>> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(AppError::Transport("channel disposed".to_string()));
        }

        let response = self
            .client
            .get(self.events_url())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AppError::Transport(format!(
                "GET /events returned {}",
                response.status()
            )));
        }

        let (tx, inbox) = mpsc::channel(INBOX_CAPACITY);
        let mut stream = response.bytes_stream();
        let handle = tokio::spawn(async move {
            let mut decoder = FrameDecoder::default();
            while let Some(chunk) = stream.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        tracing::warn!("Push stream interrupted: {}", e);
                        break;
                    }
                };
                for message in decoder.push(&chunk) {
                    if tx.send(message).await.is_err() {
                        return;
                    }
                }
            }
            tracing::info!("Push stream closed");
        });

        // The previous stream stays up until the new one is established.
        if let Some(previous) = self.reader.lock().await.replace(handle) {
            previous.abort();
        }
        Ok(inbox)
    }

    async fn disconnect(&self) {
        if let Some(handle) = self.reader.lock().await.take() {
            handle.abort();
        }
    }

    async fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        self.disconnect().await;
    }

    async fn emit(&self, hint: OutboundHint) -> Result<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(AppError::Transport("channel disposed".to_string()));
        }
        let response = self
            .client
            .post(self.events_url())
            .json(&hint.to_message())
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AppError::Transport(format!(
                "POST /events returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Splits a byte stream into SSE frames. Bytes are buffered raw and only
/// whole frames are decoded, so a multi-byte character or a `\r\n` split
/// across network chunks survives intact.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<PushMessage> {
        self.buffer.extend_from_slice(chunk);
        self.normalize_line_endings();

        let mut messages = Vec::new();
        while let Some(end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let frame: Vec<u8> = self.buffer.drain(..end + 2).collect();
            match std::str::from_utf8(&frame) {
                Ok(text) => messages.extend(parse_frame(text)),
                Err(e) => tracing::warn!("Dropping push frame with invalid UTF-8: {}", e),
            }
        }
        messages
    }

    // `\r\n` and lone `\r` become `\n`. A trailing `\r` waits for the next
    // chunk since it may be the first half of `\r\n`.
    fn normalize_line_endings(&mut self) {
        if !self.buffer.contains(&b'\r') {
            return;
        }
        let mut normalized = Vec::with_capacity(self.buffer.len());
        let mut bytes = self.buffer.iter().copied().peekable();
        while let Some(byte) = bytes.next() {
            if byte != b'\r' {
                normalized.push(byte);
                continue;
            }
            match bytes.peek() {
                Some(b'\n') => {}
                Some(_) => normalized.push(b'\n'),
                None => normalized.push(b'\r'),
            }
        }
        self.buffer = normalized;
    }
}

/// Parses one `event:`/`data:` block. Comment-only frames (keep-alives) and
/// frames whose data is not JSON yield `None`.
pub fn parse_frame(frame: &str) -> Option<PushMessage> {
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();
    for line in frame.lines() {
        if line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data.push(value),
            _ => {}
        }
    }
    if data.is_empty() {
        return None;
    }
    let payload: Value = match serde_json::from_str(&data.join("\n")) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!("Dropping push frame with invalid data: {}", e);
            return None;
        }
    };
    Some(PushMessage::new(
        event.unwrap_or_else(|| "message".to_string()),
        payload,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::oneshot;

    const STREAM_HEAD: &[u8] =
        b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n";

    async fn read_request(socket: &mut TcpStream) {
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                return;
            }
            request.extend_from_slice(&buf[..n]);
        }
    }

    async fn write_chunk(socket: &mut TcpStream, bytes: &[u8]) {
        socket.write_all(bytes).await.unwrap();
        socket.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
    }

    async fn next_message(inbox: &mut mpsc::Receiver<PushMessage>) -> PushMessage {
        tokio::time::timeout(Duration::from_secs(5), inbox.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_parse_named_frame() {
        let message = parse_frame("event: newAnnouncement\ndata: {\"id\":\"a1\"}\n\n").unwrap();
        assert_eq!(message.event, "newAnnouncement");
        assert_eq!(message.payload["id"], "a1");
    }

    #[test]
    fn test_multiline_data_is_joined() {
        let message = parse_frame("event: x\ndata: {\"a\":\ndata: 1}\n\n").unwrap();
        assert_eq!(message.payload["a"], 1);
    }

    #[test]
    fn test_keep_alive_yields_nothing() {
        assert!(parse_frame(":\n\n").is_none());
        assert!(parse_frame(": keep-alive\n\n").is_none());
        assert!(parse_frame("event: x\ndata: not json\n\n").is_none());
    }

    #[test]
    fn test_character_split_across_chunks_is_preserved() {
        let frame = "event: newAnnouncement\ndata: {\"id\":\"a1\",\"title\":\"Niño\"}\n\n".as_bytes();
        let split = frame.iter().position(|&b| b == 0xC3).unwrap() + 1;

        let mut decoder = FrameDecoder::default();
        assert!(decoder.push(&frame[..split]).is_empty());
        let messages = decoder.push(&frame[split..]);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].payload["title"], "Niño");
    }

    #[test]
    fn test_crlf_split_across_chunks() {
        let mut decoder = FrameDecoder::default();
        assert!(decoder.push(b"event: x\r\ndata: {\"a\":1}\r").is_empty());
        assert!(decoder.push(b"\n\r").is_empty());
        let messages = decoder.push(b"\nevent: y\rdata: {\"b\":2}\r\n\r\n");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].event, "x");
        assert_eq!(messages[1].event, "y");
        assert_eq!(messages[1].payload["b"], 2);
    }

    #[tokio::test]
    async fn test_stream_delivers_split_utf8_intact() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let frame = "event: newAnnouncement\ndata: {\"id\":\"a1\",\"title\":\"Niño\"}\n\n".as_bytes();
        let split = frame.iter().position(|&b| b == 0xC3).unwrap() + 1;
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;
            write_chunk(&mut socket, STREAM_HEAD).await;
            write_chunk(&mut socket, &frame[..split]).await;
            write_chunk(&mut socket, &frame[split..]).await;
            tokio::time::sleep(Duration::from_secs(1)).await;
        });

        let channel = SseChannel::new(base_url);
        let mut inbox = channel.connect().await.unwrap();
        let message = next_message(&mut inbox).await;
        assert_eq!(message.event, "newAnnouncement");
        assert_eq!(message.payload["title"], "Niño");
        channel.dispose().await;
    }

    #[tokio::test]
    async fn test_failed_reconnect_keeps_current_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let (release, released) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let (mut first, _) = listener.accept().await.unwrap();
            read_request(&mut first).await;
            write_chunk(&mut first, STREAM_HEAD).await;
            write_chunk(&mut first, b"event: newAnnouncement\ndata: {\"id\":\"a1\"}\n\n").await;

            let (mut second, _) = listener.accept().await.unwrap();
            read_request(&mut second).await;
            write_chunk(
                &mut second,
                b"HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
            )
            .await;
            drop(second);

            released.await.ok();
            write_chunk(&mut first, b"event: newAnnouncement\ndata: {\"id\":\"a2\"}\n\n").await;
            tokio::time::sleep(Duration::from_secs(1)).await;
        });

        let channel = SseChannel::new(base_url);
        let mut inbox = channel.connect().await.unwrap();
        assert_eq!(next_message(&mut inbox).await.payload["id"], "a1");

        let err = channel.connect().await.unwrap_err();
        assert!(err.is_transport());

        release.send(()).unwrap();
        assert_eq!(next_message(&mut inbox).await.payload["id"], "a2");
        channel.dispose().await;
    }
}
