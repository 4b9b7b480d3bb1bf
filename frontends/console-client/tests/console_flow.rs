use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use console_client::{Console, Prompt, RecordedStatus, TerminalEvent, TerminalWidget};
use console_protocol::{ConsoleEndpoint, ConsoleError, Geometry, SessionState};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// How the fake answers the console WebSocket.
#[derive(Clone, Copy, Default)]
enum SocketScript {
    #[default]
    Shell,
    Reject,
    /// Sends some output, then drops the connection without a close frame.
    Vanish,
}

#[derive(Clone, Default)]
struct FakeBroker {
    calls: Arc<Mutex<Vec<String>>>,
    frames: Arc<Mutex<Vec<Vec<u8>>>>,
    servers: Value,
    fail_tokens: bool,
    socket: SocketScript,
}

impl FakeBroker {
    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn grant(&self) -> Response {
        if self.fail_tokens {
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        Json(json!({
            "request_id": "r1",
            "token": "t1",
            "target": {"type": "server", "hostname": "east-1"}
        }))
        .into_response()
    }
}

async fn server_token(Path(id): Path<String>, State(broker): State<FakeBroker>) -> Response {
    broker.record(format!("POST /console/token/server/{id}"));
    broker.grant()
}

async fn application_token(
    Path((app, server)): Path<(String, String)>,
    State(broker): State<FakeBroker>,
) -> Response {
    broker.record(format!("POST /console/token/application/{app}/{server}"));
    broker.grant()
}

async fn application_servers(
    Path(app): Path<String>,
    State(broker): State<FakeBroker>,
) -> Json<Value> {
    broker.record(format!("GET /console/application/{app}/servers"));
    Json(broker.servers.clone())
}

async fn console_ws(
    ws: WebSocketUpgrade,
    Path((request_id, token, rows, cols)): Path<(String, String, String, String)>,
    State(broker): State<FakeBroker>,
) -> Response {
    broker.record(format!("WS /console/ws/{request_id}/{token}/{rows}/{cols}"));
    match broker.socket {
        SocketScript::Shell => ws.on_upgrade(move |socket| scripted_shell(socket, broker)),
        SocketScript::Reject => (StatusCode::FORBIDDEN, "Invalid token").into_response(),
        SocketScript::Vanish => ws.on_upgrade(|mut socket: WebSocket| async move {
            let _ = socket.send(Message::Binary(b"bye".to_vec().into())).await;
        }),
    }
}

/// Sends a stray text frame and some output, collects two client frames, hangs up.
async fn scripted_shell(mut socket: WebSocket, broker: FakeBroker) {
    let _ = socket.send(Message::Text("not terminal data".to_string().into())).await;
    let _ = socket.send(Message::Binary(b"hello".to_vec().into())).await;

    let mut received = 0;
    while received < 2 {
        match socket.recv().await {
            Some(Ok(Message::Binary(data))) => {
                broker.frames.lock().unwrap().push(data.to_vec());
                received += 1;
            }
            Some(Ok(_)) => {}
            _ => return,
        }
    }
    let _ = socket.send(Message::Close(None)).await;
}

async fn serve(broker: FakeBroker) -> String {
    let app = Router::new()
        .route("/console/token/server/{id}", post(server_token))
        .route(
            "/console/token/application/{id}/{server_id}",
            post(application_token),
        )
        .route("/console/application/{id}/servers", get(application_servers))
        .route("/console/ws/{request_id}/{token}/{rows}/{cols}", get(console_ws))
        .with_state(broker);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/console")
}

/// Reports a queue of sizes, one per call, repeating the last.
struct FakeTerminal {
    output: Vec<u8>,
    sizes: RefCell<VecDeque<Geometry>>,
    title: Option<String>,
}

impl FakeTerminal {
    fn new(sizes: &[Geometry]) -> Self {
        Self {
            output: Vec::new(),
            sizes: RefCell::new(sizes.iter().copied().collect()),
            title: None,
        }
    }
}

impl TerminalWidget for FakeTerminal {
    fn write(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.output.extend_from_slice(data);
        Ok(())
    }

    fn geometry(&self) -> Geometry {
        let mut sizes = self.sizes.borrow_mut();
        if sizes.len() > 1 {
            sizes.pop_front().unwrap()
        } else {
            *sizes.front().unwrap()
        }
    }

    fn set_title(&mut self, title: &str) {
        self.title = Some(title.to_string());
    }
}

struct Answers(VecDeque<&'static str>);

impl Prompt for Answers {
    async fn ask(&mut self, _menu: &str) -> Option<String> {
        self.0.pop_front().map(str::to_string)
    }
}

fn typed_events() -> (mpsc::Sender<TerminalEvent>, mpsc::Receiver<TerminalEvent>) {
    let (tx, rx) = mpsc::channel(8);
    tx.try_send(TerminalEvent::Input(b"ls\r".to_vec())).unwrap();
    tx.try_send(TerminalEvent::Resized).unwrap();
    (tx, rx)
}

fn console(page: &str) -> Console<RecordedStatus> {
    Console::new(ConsoleEndpoint::parse(page).unwrap(), RecordedStatus::default()).unwrap()
}

#[tokio::test]
async fn server_console_end_to_end() {
    let broker = FakeBroker::default();
    let page = serve(broker.clone()).await;

    let mut console = console(&format!("{page}?server=srv-1"));
    let mut terminal = FakeTerminal::new(&[Geometry::new(30, 100), Geometry::new(40, 120)]);
    let (_keep_open, mut events) = typed_events();
    let mut prompt = Answers(VecDeque::new());

    let outcome = console.run(&mut prompt, &mut terminal, &mut events).await;

    assert_eq!(outcome, Err(ConsoleError::SocketClosed));
    assert_eq!(console.state(), SessionState::Closed);
    assert_eq!(
        broker.calls(),
        vec![
            "POST /console/token/server/srv-1".to_string(),
            "WS /console/ws/r1/t1/30/100".to_string(),
        ]
    );
    // The text frame was dropped, the binary one rendered
    assert_eq!(terminal.output, b"hello");
    assert_eq!(terminal.title.as_deref(), Some("[Console] east-1"));
    assert_eq!(
        *broker.frames.lock().unwrap(),
        vec![b"ls\r".to_vec(), b"\x04{\"cols\":120,\"rows\":40}".to_vec()]
    );
    assert_eq!(
        console.status().last(),
        Some("Connection lost. Refresh to reconnect.")
    );
    assert!(!console
        .status()
        .history
        .contains(&"Fetching available servers...".to_string()));
}

#[tokio::test]
async fn rejected_handshake_fails_the_console() {
    let broker = FakeBroker {
        socket: SocketScript::Reject,
        ..FakeBroker::default()
    };
    let page = serve(broker.clone()).await;

    let mut console = console(&format!("{page}?server=srv-1"));
    let mut terminal = FakeTerminal::new(&[Geometry::new(24, 80)]);
    let (_keep_open, mut events) = typed_events();
    let mut prompt = Answers(VecDeque::new());

    let outcome = console.run(&mut prompt, &mut terminal, &mut events).await;

    assert!(matches!(outcome, Err(ConsoleError::Socket { .. })));
    assert_eq!(console.state(), SessionState::Failed);
    let status = console.status().last().unwrap();
    assert!(status.starts_with("Error: "), "{status}");
    assert!(status.contains("403"), "{status}");
    assert!(terminal.output.is_empty());
}

#[tokio::test]
async fn connection_dropped_mid_session_fails() {
    let broker = FakeBroker {
        socket: SocketScript::Vanish,
        ..FakeBroker::default()
    };
    let page = serve(broker.clone()).await;

    let mut console = console(&format!("{page}?server=srv-1"));
    let mut terminal = FakeTerminal::new(&[Geometry::new(24, 80)]);
    // Nothing typed; the session only waits on the socket
    let (_keep_open, mut events) = mpsc::channel(1);
    let mut prompt = Answers(VecDeque::new());

    let outcome = console.run(&mut prompt, &mut terminal, &mut events).await;

    assert!(matches!(outcome, Err(ConsoleError::Socket { .. })), "{outcome:?}");
    assert_eq!(console.state(), SessionState::Failed);
    assert_eq!(terminal.output, b"bye");
    assert!(console.status().last().unwrap().starts_with("Error: "));
}

#[tokio::test]
async fn application_console_uses_picked_server() {
    let broker = FakeBroker {
        servers: serde_json::from_str(r#"{"east-1":"srv-a","west-1":"srv-b"}"#).unwrap(),
        ..FakeBroker::default()
    };
    let page = serve(broker.clone()).await;

    let mut console = console(&format!("{page}?application=app-1"));
    let mut terminal = FakeTerminal::new(&[Geometry::new(24, 80)]);
    let (_keep_open, mut events) = typed_events();
    let mut prompt = Answers(["7", "1"].into_iter().collect());

    let _ = console.run(&mut prompt, &mut terminal, &mut events).await;

    assert_eq!(
        broker.calls(),
        vec![
            "GET /console/application/app-1/servers".to_string(),
            "POST /console/token/application/app-1/srv-a".to_string(),
            "WS /console/ws/r1/t1/24/80".to_string(),
        ]
    );
    let history = &console.status().history;
    assert_eq!(history[0], "Fetching available servers...");
    assert_eq!(
        history
            .iter()
            .filter(|line| *line == "Fetching available servers...")
            .count(),
        1
    );
}

#[tokio::test]
async fn token_failure_never_opens_socket() {
    let broker = FakeBroker {
        fail_tokens: true,
        ..FakeBroker::default()
    };
    let page = serve(broker.clone()).await;

    let mut console = console(&format!("{page}?server=srv-1"));
    let mut terminal = FakeTerminal::new(&[Geometry::new(24, 80)]);
    let (_keep_open, mut events) = typed_events();
    let mut prompt = Answers(VecDeque::new());

    let outcome = console.run(&mut prompt, &mut terminal, &mut events).await;

    assert_eq!(
        outcome,
        Err(ConsoleError::Http {
            code: 500,
            reason: "Internal Server Error".into()
        })
    );
    assert_eq!(console.state(), SessionState::Failed);
    assert_eq!(console.status().last(), Some("Error: Internal Server Error"));
    assert!(broker.calls().iter().all(|c| !c.starts_with("WS")));
}

#[tokio::test]
async fn empty_server_list_is_fatal() {
    let broker = FakeBroker {
        servers: json!({}),
        ..FakeBroker::default()
    };
    let page = serve(broker.clone()).await;

    let mut console = console(&format!("{page}?application=app-1"));
    let mut prompt = Answers(VecDeque::new());
    let err = console.establish(&mut prompt).await.unwrap_err();

    assert_eq!(err, ConsoleError::NoServersAvailable);
    assert_eq!(console.status().last(), Some("Error: No servers available"));
}

#[tokio::test]
async fn cancelling_the_picker() {
    let broker = FakeBroker {
        servers: json!({"east-1": 1, "west-1": 2}),
        ..FakeBroker::default()
    };
    let page = serve(broker.clone()).await;

    let mut console = console(&format!("{page}?application=app-1"));
    let mut prompt = Answers(["x"].into_iter().collect());
    let err = console.establish(&mut prompt).await.unwrap_err();

    assert!(err.is_cancellation());
    assert_eq!(console.state(), SessionState::Cancelled);
    assert_eq!(broker.calls().len(), 1);
}

#[tokio::test]
async fn missing_target_makes_no_requests() {
    let broker = FakeBroker::default();
    let page = serve(broker.clone()).await;

    let mut console = console(&format!("{page}?foo=bar"));
    let mut prompt = Answers(VecDeque::new());
    let err = console.establish(&mut prompt).await.unwrap_err();

    assert_eq!(err, ConsoleError::MissingTarget);
    assert_eq!(console.status().last(), Some("Console Info not found"));
    assert!(broker.calls().is_empty());
}

#[tokio::test]
async fn plain_http_to_remote_host_is_refused() {
    let mut console = console("http://panel.example.com/console?server=1");
    let mut prompt = Answers(VecDeque::new());
    let err = console.establish(&mut prompt).await.unwrap_err();
    assert_eq!(err, ConsoleError::InsecureConnection);
}
