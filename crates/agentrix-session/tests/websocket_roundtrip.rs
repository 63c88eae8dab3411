//! Integration tests for the WebSocket transport against an in-process
//! server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

use agentrix_core::{ConnectionErrorKind, Error, ReconcileMode, ServerSettings, SessionId};
use agentrix_session::{
    AttachState, ChannelEvent, ClientFrame, InputData, Reconciler, ServerEvent, TaggedEvent,
    Transport, WebSocketTransport,
};

fn transport(port: u16) -> WebSocketTransport {
    let settings = ServerSettings {
        base_url: format!("http://127.0.0.1:{port}"),
        connect_timeout_ms: 2_000,
        ..ServerSettings::default()
    };
    WebSocketTransport::new(&settings).unwrap()
}

async fn collect_until_end(
    rx: &mut mpsc::UnboundedReceiver<TaggedEvent>,
) -> Vec<TaggedEvent> {
    let mut events = Vec::new();
    loop {
        let tagged = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("receive loop stalled")
            .expect("event channel closed");
        let done = !matches!(tagged.event, ChannelEvent::Frame(_));
        events.push(tagged);
        if done {
            return events;
        }
    }
}

#[tokio::test]
async fn test_session_roundtrip() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let request_uri = Arc::new(Mutex::new(String::new()));

    let uri = Arc::clone(&request_uri);
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let record_uri = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            *uri.lock().unwrap() = req.uri().to_string();
            Ok(resp)
        };
        let mut ws = tokio_tungstenite::accept_hdr_async(stream, record_uri)
            .await
            .unwrap();

        ws.send(Message::Text(r#"{"type":"init","log":"$ "}"#.to_string()))
            .await
            .unwrap();
        ws.send(Message::Text("not json".to_string())).await.unwrap();
        ws.send(Message::Text(r#"{"type":"output","chunk":"hi"}"#.to_string()))
            .await
            .unwrap();

        // Echo the first input frame back as output.
        let echoed = loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
                    if value["type"] == "input" {
                        break value["data"].as_str().unwrap_or_default().to_string();
                    }
                }
                Some(Ok(_)) => continue,
                other => panic!("client went away: {other:?}"),
            }
        };
        let reply = serde_json::json!({"type": "output", "chunk": echoed}).to_string();
        ws.send(Message::Text(reply)).await.unwrap();
        ws.send(Message::Text(r#"{"type":"exit"}"#.to_string()))
            .await
            .unwrap();
        ws.close(None).await.unwrap();
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = transport(port)
        .open(&SessionId::new("s1"), 3, tx)
        .await
        .unwrap();
    assert!(handle.send(ClientFrame::Input(InputData::Text("l".to_string()))));

    let events = collect_until_end(&mut rx).await;
    server.await.unwrap();

    assert_eq!(
        *request_uri.lock().unwrap(),
        "/api/terminal/socket?sessionId=s1"
    );
    assert!(events.iter().all(|tagged| tagged.generation == 3));
    let events: Vec<ChannelEvent> = events.into_iter().map(|tagged| tagged.event).collect();
    assert_eq!(
        events,
        vec![
            ChannelEvent::Frame(ServerEvent::Init {
                log: Some("$ ".to_string()),
                closed: false
            }),
            ChannelEvent::Frame(ServerEvent::Output(b"hi".to_vec())),
            ChannelEvent::Frame(ServerEvent::Output(b"l".to_vec())),
            ChannelEvent::Frame(ServerEvent::Exit),
            ChannelEvent::Closed,
        ]
    );

    let mut reconciler = Reconciler::with_mode(ReconcileMode::Direct);
    let generation = reconciler.attach_session(SessionId::new("s1"), b"");
    for event in events {
        reconciler.apply(generation, event);
    }
    assert_eq!(reconciler.transcript(), b"$ hil");
    assert_eq!(reconciler.state(), &AttachState::Closed);
}

#[tokio::test]
async fn test_close_without_exit_is_lost_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(Message::Binary(vec![0xff, b'x'])).await.unwrap();
        ws.close(None).await.unwrap();
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _handle = transport(port)
        .open(&SessionId::new("s1"), 1, tx)
        .await
        .unwrap();

    let events = collect_until_end(&mut rx).await;
    server.await.unwrap();

    assert_eq!(
        events[0].event,
        ChannelEvent::Frame(ServerEvent::Output(vec![0xff, b'x']))
    );
    match &events[1].event {
        ChannelEvent::Failed(err) => assert_eq!(err.kind, ConnectionErrorKind::Lost),
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_refused_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let (tx, _rx) = mpsc::unbounded_channel();
    let result = transport(port).open(&SessionId::new("s1"), 1, tx).await;
    match result {
        Err(Error::Connection(err)) => assert_eq!(err.kind, ConnectionErrorKind::Refused),
        other => panic!("expected refused connection, got {other:?}"),
    }
}
