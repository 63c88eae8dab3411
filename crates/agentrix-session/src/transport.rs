//! Transport channel: one bidirectional socket per attach cycle.
//!
//! The receive loop runs on its own task and never touches reconciler
//! state. It forwards decoded events, tagged with the attach generation,
//! to the owner over an mpsc channel.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, info, warn};
use url::Url;

use agentrix_core::{
    ConnectionError, ConnectionErrorKind, Error, Result, ServerSettings, SessionId,
};

use crate::protocol::{ClientFrame, Payload, ServerEvent};

/// What the receive loop reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// A decoded server event
    Frame(ServerEvent),
    /// The loop failed; no further events follow
    Failed(ConnectionError),
    /// The socket closed after the server announced `exit`
    Closed,
}

/// A channel event stamped with the attach generation that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedEvent {
    /// Attach cycle the event belongs to
    pub generation: u64,
    /// The event
    pub event: ChannelEvent,
}

/// Sending half used by receive loops.
pub type EventSender = mpsc::UnboundedSender<TaggedEvent>;

/// Opens channels to session endpoints.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to `session_id` and start a receive loop that reports on
    /// `events`, tagging everything with `generation`.
    async fn open(
        &self,
        session_id: &SessionId,
        generation: u64,
        events: EventSender,
    ) -> Result<ChannelHandle>;
}

/// Handle to a live channel. Dropping it cancels the receive loop.
#[derive(Debug)]
pub struct ChannelHandle {
    generation: u64,
    outbound: mpsc::UnboundedSender<ClientFrame>,
    task: Option<JoinHandle<()>>,
}

impl ChannelHandle {
    /// Wrap an outbound queue and the task that drains it.
    pub fn new(
        generation: u64,
        outbound: mpsc::UnboundedSender<ClientFrame>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            generation,
            outbound,
            task: Some(task),
        }
    }

    /// Attach cycle this channel belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Queue a frame. Returns false when the channel is already gone;
    /// a send racing a close is not an error.
    pub fn send(&self, frame: ClientFrame) -> bool {
        self.outbound.send(frame).is_ok()
    }

    /// Whether the receive loop has stopped.
    pub fn is_closed(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Cancel the receive loop without waiting for in-flight sends.
    pub fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!(generation = self.generation, "Channel closed");
        }
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Map a socket error onto the connection taxonomy.
pub fn classify_socket_error(err: &tungstenite::Error) -> ConnectionError {
    let kind = match err {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            ConnectionErrorKind::Lost
        }
        tungstenite::Error::Io(io) => classify_io(io.kind()),
        tungstenite::Error::Http(response) => {
            return ConnectionError::new(
                ConnectionErrorKind::Other,
                format!("HTTP error: {}", response.status()),
            )
        }
        _ => ConnectionErrorKind::Other,
    };
    ConnectionError::new(kind, err.to_string())
}

fn classify_io(kind: std::io::ErrorKind) -> ConnectionErrorKind {
    use std::io::ErrorKind;
    match kind {
        ErrorKind::TimedOut | ErrorKind::WouldBlock => ConnectionErrorKind::Timeout,
        ErrorKind::ConnectionRefused => ConnectionErrorKind::Refused,
        ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::BrokenPipe
        | ErrorKind::UnexpectedEof => ConnectionErrorKind::Lost,
        ErrorKind::NotConnected | ErrorKind::AddrNotAvailable => ConnectionErrorKind::NotConnected,
        _ => ConnectionErrorKind::Other,
    }
}

fn to_message(frame: &ClientFrame) -> Message {
    match frame.encode() {
        Payload::Text(text) => Message::Text(text),
        Payload::Binary(bytes) => Message::Binary(bytes),
    }
}

/// Drive one channel until the socket ends or the owner goes away.
///
/// Outbound frames go to `sink`; a failed send is logged and the loop keeps
/// reading, since the read side reports the disconnect on its own.
async fn run_channel<S, T>(
    mut sink: S,
    mut stream: T,
    mut outbound_rx: mpsc::UnboundedReceiver<ClientFrame>,
    generation: u64,
    events: EventSender,
) where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
    T: Stream<Item = std::result::Result<Message, tungstenite::Error>> + Unpin,
{
    let emit = |event: ChannelEvent| events.send(TaggedEvent { generation, event }).is_ok();
    let mut saw_exit = false;

    loop {
        tokio::select! {
            frame = outbound_rx.recv() => {
                let Some(frame) = frame else {
                    let _ = sink.close().await;
                    break;
                };
                if let Err(e) = sink.send(to_message(&frame)).await {
                    if frame.is_resize() {
                        debug!("Resize send failed: {}", e);
                    } else {
                        warn!("Input send failed: {}", e);
                    }
                }
            }
            message = stream.next() => {
                let payload = match message {
                    Some(Ok(Message::Text(text))) => Payload::Text(text),
                    Some(Ok(Message::Binary(bytes))) => Payload::Binary(bytes),
                    Some(Ok(Message::Close(_))) | None => {
                        let event = if saw_exit {
                            ChannelEvent::Closed
                        } else {
                            ChannelEvent::Failed(ConnectionError::new(
                                ConnectionErrorKind::Lost,
                                "socket closed before exit",
                            ))
                        };
                        emit(event);
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        let event = if saw_exit {
                            ChannelEvent::Closed
                        } else {
                            ChannelEvent::Failed(classify_socket_error(&e))
                        };
                        emit(event);
                        break;
                    }
                };

                match ServerEvent::decode(payload) {
                    Ok(event) => {
                        saw_exit |= event == ServerEvent::Exit;
                        if !emit(ChannelEvent::Frame(event)) {
                            break;
                        }
                    }
                    Err(e) => debug!("Dropping frame: {}", e),
                }
            }
        }
    }
    debug!(generation, "Receive loop finished");
}

/// WebSocket transport against the dashboard server.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    base_url: Url,
    connect_timeout: Duration,
}

impl WebSocketTransport {
    /// Build from server settings.
    pub fn new(settings: &ServerSettings) -> Result<Self> {
        let base_url = Url::parse(settings.base_url.trim())
            .map_err(|e| Error::Config(format!("invalid server.base_url: {e}")))?;
        Ok(Self {
            base_url,
            connect_timeout: settings.connect_timeout(),
        })
    }

    /// Socket URL for a session: the base URL with `http→ws` / `https→wss`,
    /// plus `/api/terminal/socket?sessionId=<id>`.
    pub fn socket_url(&self, session_id: &SessionId) -> Result<Url> {
        let mut url = self.base_url.clone();
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(Error::Config(format!(
                    "unsupported server scheme '{other}'"
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| Error::Config(format!("cannot use scheme '{scheme}'")))?;
        url.path_segments_mut()
            .map_err(|_| Error::Config("server.base_url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["api", "terminal", "socket"]);
        url.set_query(None);
        url.query_pairs_mut()
            .append_pair("sessionId", session_id.as_str());
        Ok(url)
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(
        &self,
        session_id: &SessionId,
        generation: u64,
        events: EventSender,
    ) -> Result<ChannelHandle> {
        let url = self.socket_url(session_id)?;
        debug!(%url, generation, "Connecting session socket");

        let connect = tokio_tungstenite::connect_async(url.as_str());
        let (socket, _response) = match tokio::time::timeout(self.connect_timeout, connect).await
        {
            Err(_) => {
                return Err(ConnectionError::new(
                    ConnectionErrorKind::Timeout,
                    format!("no handshake within {}ms", self.connect_timeout.as_millis()),
                )
                .into())
            }
            Ok(Err(e)) => return Err(classify_socket_error(&e).into()),
            Ok(Ok(pair)) => pair,
        };
        info!(session_id = %session_id, generation, "Session socket connected");

        let (sink, stream) = socket.split();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<ClientFrame>();
        let task = tokio::spawn(run_channel(sink, stream, outbound_rx, generation, events));

        Ok(ChannelHandle::new(generation, outbound_tx, task))
    }
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;
    use std::task::{Context as TaskContext, Poll};

    use agentrix_core::Dimensions;

    use super::*;

    fn transport(base: &str) -> WebSocketTransport {
        let settings = ServerSettings {
            base_url: base.to_string(),
            ..ServerSettings::default()
        };
        WebSocketTransport::new(&settings).unwrap()
    }

    #[test]
    fn test_socket_url_http() {
        let url = transport("http://localhost:3414")
            .socket_url(&SessionId::new("abc"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "ws://localhost:3414/api/terminal/socket?sessionId=abc"
        );
    }

    #[test]
    fn test_socket_url_https_with_prefix() {
        let url = transport("https://example.com/dash/")
            .socket_url(&SessionId::new("a b"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "wss://example.com/dash/api/terminal/socket?sessionId=a+b"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let settings = ServerSettings {
            base_url: "not a url".to_string(),
            ..ServerSettings::default()
        };
        assert!(matches!(
            WebSocketTransport::new(&settings),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_classify_io_errors() {
        assert_eq!(
            classify_io(std::io::ErrorKind::ConnectionRefused),
            ConnectionErrorKind::Refused
        );
        assert_eq!(
            classify_io(std::io::ErrorKind::TimedOut),
            ConnectionErrorKind::Timeout
        );
        assert_eq!(
            classify_io(std::io::ErrorKind::ConnectionReset),
            ConnectionErrorKind::Lost
        );
        assert_eq!(
            classify_io(std::io::ErrorKind::NotConnected),
            ConnectionErrorKind::NotConnected
        );
        assert_eq!(
            classify_io(std::io::ErrorKind::PermissionDenied),
            ConnectionErrorKind::Other
        );
    }

    #[test]
    fn test_classify_closed_socket() {
        let err = classify_socket_error(&tungstenite::Error::ConnectionClosed);
        assert_eq!(err.kind, ConnectionErrorKind::Lost);
    }

    #[tokio::test]
    async fn test_handle_send_after_close_is_silent() {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(async {});
        let mut handle = ChannelHandle::new(7, tx, task);
        assert_eq!(handle.generation(), 7);

        drop(rx);
        handle.close();
        assert!(handle.is_closed());
        assert!(!handle.send(ClientFrame::Resize(Default::default())));
    }

    /// Sink whose socket is already gone.
    struct ClosedSink;

    impl Sink<Message> for ClosedSink {
        type Error = tungstenite::Error;

        fn poll_ready(
            self: Pin<&mut Self>,
            _cx: &mut TaskContext<'_>,
        ) -> Poll<std::result::Result<(), Self::Error>> {
            Poll::Ready(Err(tungstenite::Error::AlreadyClosed))
        }

        fn start_send(
            self: Pin<&mut Self>,
            _item: Message,
        ) -> std::result::Result<(), Self::Error> {
            Err(tungstenite::Error::AlreadyClosed)
        }

        fn poll_flush(
            self: Pin<&mut Self>,
            _cx: &mut TaskContext<'_>,
        ) -> Poll<std::result::Result<(), Self::Error>> {
            Poll::Ready(Err(tungstenite::Error::AlreadyClosed))
        }

        fn poll_close(
            self: Pin<&mut Self>,
            _cx: &mut TaskContext<'_>,
        ) -> Poll<std::result::Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_failed_resize_send_keeps_receiving() {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<Message>();
        let stream = Box::pin(futures_util::stream::unfold(inbound_rx, |mut rx| async move {
            rx.recv()
                .await
                .map(|message| (Ok::<_, tungstenite::Error>(message), rx))
        }));
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_channel(ClosedSink, stream, outbound_rx, 4, events_tx));
        let handle = ChannelHandle::new(4, outbound_tx, task);

        assert!(handle.send(ClientFrame::Resize(Dimensions::new(24, 80))));
        tokio::task::yield_now().await;
        inbound_tx
            .send(Message::Text(r#"{"type":"output","chunk":"ok"}"#.to_string()))
            .unwrap();

        let tagged = events_rx.recv().await.unwrap();
        assert_eq!(
            tagged,
            TaggedEvent {
                generation: 4,
                event: ChannelEvent::Frame(ServerEvent::Output(b"ok".to_vec())),
            }
        );
        assert!(!handle.is_closed());

        // Later resizes are still accepted and swallowed.
        assert!(handle.send(ClientFrame::Resize(Dimensions::new(30, 100))));
        tokio::task::yield_now().await;
        inbound_tx.send(Message::Close(None)).unwrap();
        let tagged = events_rx.recv().await.unwrap();
        match tagged.event {
            ChannelEvent::Failed(err) => assert_eq!(err.kind, ConnectionErrorKind::Lost),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
