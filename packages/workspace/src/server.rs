//! HTTP + WebSocket front for a [`SyncSession`]
//!
//! - `GET /ws` sync socket: `init` on connect, then session broadcasts
//! - `GET /api/config`, `/api/files`, `/api/adapters`, `/api/templates`
//! - `GET /api/preview` last rendered document
//! - `GET /api/preview/events` previews as server-sent events

use crate::error::SessionResult;
use crate::protocol::{display_root, ServerMessage};
use crate::session::{SessionOptions, SyncSession};
use crate::templates::DirTemplateProvider;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Html, IntoResponse, Json, Response,
    },
    routing::get,
    Router,
};
use futures::stream::{self, Stream};
use futures::{SinkExt, StreamExt};
use pen_common::{FileSystem, RealFileSystem};
use pen_compiler::Pipeline;
use serde_json::Value;
use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

pub const DEFAULT_PORT: u16 = 3030;

#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub root: PathBuf,
    pub host: IpAddr,
    pub port: u16,
    /// Quiet period before a burst of file changes is applied
    pub watch_debounce: Duration,
    pub echo_window: Duration,
    pub templates_dir: Option<PathBuf>,
    pub dev: bool,
}

impl ServerOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            watch_debounce: Duration::from_millis(100),
            echo_window: Duration::from_millis(1000),
            templates_dir: None,
            dev: true,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Open the project, start watching it and serve until the listener fails
pub async fn run(options: ServerOptions) -> SessionResult<()> {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let session = SyncSession::open(
        &options.root,
        fs.clone(),
        Pipeline::with_defaults(),
        SessionOptions {
            echo_window: options.echo_window,
            dev: options.dev,
            ..SessionOptions::default()
        },
    )?;
    if let Some(dir) = &options.templates_dir {
        session.set_templates(Arc::new(DirTemplateProvider::new(dir, fs)));
    }

    session.render().await;
    let _watch = session.watch(options.watch_debounce)?;

    serve(session, options.addr()).await
}

pub async fn serve(session: SyncSession, addr: SocketAddr) -> SessionResult<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, root = %session.root().display(), "Sync server listening");
    axum::serve(listener, router(session)).await?;
    Ok(())
}

pub fn router(session: SyncSession) -> Router {
    Router::new()
        .route("/", get(preview_page))
        .route("/ws", get(ws_handler))
        .route("/api/config", get(config_handler))
        .route("/api/files", get(files_handler))
        .route("/api/adapters", get(adapters_handler))
        .route("/api/templates", get(templates_handler))
        .route("/api/preview", get(preview_handler))
        .route("/api/preview/events", get(preview_events_handler))
        .with_state(session)
        .layer(CorsLayer::permissive())
}

async fn ws_handler(ws: WebSocketUpgrade, State(session): State<SyncSession>) -> Response {
    ws.on_upgrade(move |socket| handle_client(socket, session))
}

async fn handle_client(socket: WebSocket, session: SyncSession) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    // subscribe before building init so nothing falls between the two
    let mut rx = session.subscribe();
    let (client, init) = session.connect().await;

    let Some(init) = encode(&init) else {
        return;
    };
    if ws_tx.send(Message::Text(init)).await.is_err() {
        return;
    }
    info!(client, "Client connected");

    let forward = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(envelope) => {
                    if !envelope.is_for(client) {
                        continue;
                    }
                    let Some(text) = encode(&envelope.message) else {
                        continue;
                    };
                    if ws_tx.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(n)) => warn!(client, skipped = n, "Client fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    while let Some(result) = ws_rx.next().await {
        match result {
            Ok(Message::Text(text)) => session.handle_text(client, &text).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(client, error = %e, "Socket error");
                break;
            }
        }
    }

    forward.abort();
    info!(client, "Client disconnected");
}

fn encode(message: &ServerMessage) -> Option<String> {
    match serde_json::to_string(message) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!(kind = message.kind(), error = %e, "Could not encode message");
            None
        }
    }
}

async fn config_handler(State(session): State<SyncSession>) -> Response {
    let config = session.config().await;
    match serde_json::to_value(&config) {
        Ok(mut value) => {
            if let Value::Object(map) = &mut value {
                map.insert("rootPath".into(), Value::String(display_root(session.root())));
            }
            Json(value).into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn files_handler(State(session): State<SyncSession>) -> impl IntoResponse {
    Json(session.files().await)
}

async fn adapters_handler(State(session): State<SyncSession>) -> impl IntoResponse {
    Json(session.adapters())
}

async fn templates_handler(State(session): State<SyncSession>) -> Response {
    let Some(provider) = session.templates() else {
        return Json(Vec::<Value>::new()).into_response();
    };
    match tokio::task::spawn_blocking(move || provider.list()).await {
        Ok(Ok(list)) => Json(list).into_response(),
        Ok(Err(e)) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn preview_handler(State(session): State<SyncSession>) -> Response {
    match session.last_preview().await {
        Some(html) => Html(html).into_response(),
        None => (StatusCode::NOT_FOUND, "No preview rendered yet").into_response(),
    }
}

async fn preview_page(State(session): State<SyncSession>) -> Html<String> {
    Html(session.last_preview().await.unwrap_or_else(|| PLACEHOLDER.to_string()))
}

/// Previews as they are rendered, starting with the current one
async fn preview_events_handler(
    State(session): State<SyncSession>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = session.subscribe();
    let initial = session.last_preview().await;

    let initial_stream = stream::iter(initial.map(|html| Ok::<_, Infallible>(preview_event(&html))));
    let updates = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(envelope) => {
                    if let ServerMessage::Preview { html, .. } = envelope.message {
                        return Some((Ok::<_, Infallible>(preview_event(&html)), rx));
                    }
                }
                Err(RecvError::Lagged(n)) => warn!(skipped = n, "Preview stream lagged"),
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(initial_stream.chain(updates)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

/// SSE data lines cannot carry carriage returns
fn preview_event(html: &str) -> Event {
    Event::default().event("preview").data(html.replace('\r', ""))
}

const PLACEHOLDER: &str = r#"<!DOCTYPE html>
<html>
<head><title>Pen</title></head>
<body>
<p>No preview yet. Fix the errors reported in the editor and save.</p>
</body>
</html>"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = ServerOptions::new("/tmp/project");
        assert_eq!(options.addr(), "127.0.0.1:3030".parse().unwrap());
        assert_eq!(options.watch_debounce, Duration::from_millis(100));
        assert!(options.templates_dir.is_none());
    }
}
