use crate::config::BrokerConfig;
use crate::session::{dispatch_frame, PtySession};
use crate::tokens::{IssuedToken, TokenStore, TokenTarget};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use console_protocol::{Geometry, SentinelCodec, TargetInfo};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BrokerConfig>,
    pub tokens: TokenStore,
}

impl AppState {
    pub fn new(config: BrokerConfig) -> Self {
        let tokens = TokenStore::new(config.token_ttl());
        Self {
            config: Arc::new(config),
            tokens,
        }
    }
}

type Rejection = (StatusCode, &'static str);

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/console/token/server/{id}", post(server_token))
        .route(
            "/console/token/application/{id}/{server_id}",
            post(application_token),
        )
        .route("/console/application/{id}/servers", get(application_servers))
        .route(
            "/console/ws/{request_id}/{token}/{rows}/{cols}",
            get(console_ws),
        )
        .with_state(state)
}

fn grant(issued: IssuedToken, target: TargetInfo) -> Response {
    Json(serde_json::json!({
        "request_id": issued.request_id,
        "token": issued.token,
        "target": target,
    }))
    .into_response()
}

async fn server_token(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Response, Rejection> {
    let server = state
        .config
        .server(&id)
        .ok_or((StatusCode::NOT_FOUND, "Server not found"))?;

    let issued = state.tokens.issue(TokenTarget::Server {
        server_id: server.id.clone(),
    });
    Ok(grant(issued, TargetInfo::Server(server.host_info())))
}

/// Hostname to server id for every server running the application.
async fn application_servers(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Map<String, serde_json::Value>>, Rejection> {
    let app = state
        .config
        .application(&id)
        .ok_or((StatusCode::NOT_FOUND, "Application not found"))?;

    let servers = app
        .servers
        .iter()
        .filter_map(|hostname| state.config.server_by_hostname(hostname))
        .map(|server| (server.hostname.clone(), server.id.clone().into()))
        .collect();
    Ok(Json(servers))
}

async fn application_token(
    Path((id, server_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Response, Rejection> {
    let app = state
        .config
        .application(&id)
        .ok_or((StatusCode::NOT_FOUND, "Application not found"))?;
    let server = state
        .config
        .server(&server_id)
        .filter(|server| app.servers.contains(&server.hostname))
        .ok_or((StatusCode::NOT_FOUND, "Server not found"))?;

    let issued = state.tokens.issue(TokenTarget::Application {
        application_id: app.id.clone(),
        server_id: server.id.clone(),
    });
    Ok(grant(
        issued,
        TargetInfo::Application {
            application: app.name.clone(),
            server: server.host_info(),
        },
    ))
}

/// Check the socket path and redeem its token; yields the command to run.
fn authorize(
    state: &AppState,
    request_id: &str,
    token: &str,
    rows: &str,
    cols: &str,
) -> Result<(Vec<String>, Geometry), Rejection> {
    let rows: u16 = rows.parse().map_err(|_| (StatusCode::BAD_REQUEST, "Invalid rows"))?;
    let cols: u16 = cols.parse().map_err(|_| (StatusCode::BAD_REQUEST, "Invalid cols"))?;

    let target = state.tokens.consume(request_id, token).map_err(|e| {
        tracing::warn!("Rejected console {request_id}: {e}");
        (StatusCode::FORBIDDEN, "Invalid token")
    })?;

    let gone = (StatusCode::INTERNAL_SERVER_ERROR, "Failed to connect to server");
    let argv = match target {
        TokenTarget::Server { server_id } => state.config.server(&server_id).ok_or(gone)?.argv(),
        TokenTarget::Application {
            application_id,
            server_id,
        } => {
            let server = state.config.server(&server_id).ok_or(gone)?;
            let app = state.config.application(&application_id).ok_or(gone)?;
            let mut argv = server.argv();
            argv.extend(app.exec.iter().cloned());
            argv
        }
    };
    Ok((argv, Geometry::new(rows, cols)))
}

async fn console_ws(
    ws: WebSocketUpgrade,
    Path((request_id, token, rows, cols)): Path<(String, String, String, String)>,
    State(state): State<AppState>,
) -> Result<Response, Rejection> {
    let (argv, geometry) = authorize(&state, &request_id, &token, &rows, &cols)?;

    let (pty, output_rx) = PtySession::spawn(&argv, geometry).map_err(|e| {
        tracing::error!("{e}");
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to connect to server")
    })?;

    tracing::info!("Console {request_id} attached at {geometry}");
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, pty, output_rx)))
}

async fn handle_socket(
    socket: WebSocket,
    mut pty: PtySession,
    mut output_rx: mpsc::UnboundedReceiver<Vec<u8>>,
) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let codec = SentinelCodec;

    loop {
        tokio::select! {
            // Forward PTY output to WebSocket
            data = output_rx.recv() => {
                match data {
                    Some(data) => {
                        if ws_sender.send(Message::Binary(data.into())).await.is_err() {
                            break;
                        }
                    }
                    None => {
                        tracing::info!("Console process exited");
                        let _ = ws_sender.send(Message::Close(None)).await;
                        break;
                    }
                }
            }

            // Handle incoming WebSocket messages
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Binary(data))) => {
                        if let Err(e) = dispatch_frame(&codec, &data, &mut pty) {
                            tracing::error!("Write error: {e}");
                            break;
                        }
                    }
                    Some(Ok(Message::Text(_))) => {
                        tracing::debug!("Ignoring text frame");
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!("WebSocket error: {e}");
                        break;
                    }
                }
            }
        }
    }

    tracing::info!("WebSocket disconnected, closing console");
}
