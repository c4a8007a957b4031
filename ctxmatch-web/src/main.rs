//! Servidor web Axum com WebSocket para visualização do matcher contextual em tempo real

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{Html, IntoResponse, Json},
    routing::{get, post},
    Router,
};
use ctxmatch_core::{
    engine::MatchEvent,
    patterns::{builtin_config, demo_texts},
    ContextualMatcher, Document, ResultSpan,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Estado compartilhado da aplicação
struct AppState {
    matcher: ContextualMatcher,
}

#[derive(Deserialize)]
struct AnalyzeRequest {
    text: String,
}

/// Mensagem WebSocket recebida do cliente
#[derive(Deserialize)]
struct WsRequest {
    text: String,
}

#[derive(Serialize)]
struct AnalyzeResponse {
    spans: Vec<ResultSpan>,
    total_anchors: usize,
    processing_ms: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .init();

    let matcher = ContextualMatcher::new(builtin_config())
        .expect("configuração embutida deve ser válida");
    let state = Arc::new(AppState { matcher });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(index_handler))
        .route("/analyze", post(analyze_handler))
        .route("/ws", get(ws_handler))
        .route("/demo-texts", get(demo_texts_handler))
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
    info!("🔎 Servidor do matcher contextual iniciado em http://localhost:3000");
    axum::serve(listener, app).await.unwrap();
}

/// Retorna a página principal HTML
async fn index_handler() -> impl IntoResponse {
    Html(include_str!("templates/index.html"))
}

/// Análise via HTTP POST (sem streaming)
async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeRequest>,
) -> impl IntoResponse {
    if req.text.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "Texto vazio"})),
        )
            .into_response();
    }

    let doc = Document::new(&req.text);
    let (tx, rx) = std::sync::mpsc::channel();
    state.matcher.process_streaming(&doc, tx);

    // O evento final consolida spans e estatísticas
    let mut response = AnalyzeResponse {
        spans: vec![],
        total_anchors: 0,
        processing_ms: 0,
    };
    for event in rx.try_iter() {
        if let MatchEvent::Done {
            spans,
            total_anchors,
            processing_ms,
        } = event
        {
            response = AnalyzeResponse {
                spans,
                total_anchors,
                processing_ms,
            };
        }
    }

    Json(response).into_response()
}

/// Retorna textos de demonstração
async fn demo_texts_handler() -> impl IntoResponse {
    let texts: Vec<serde_json::Value> = demo_texts()
        .iter()
        .map(|(domain, text)| {
            serde_json::json!({
                "domain": domain,
                "text": text
            })
        })
        .collect();
    Json(texts)
}

/// Upgrade HTTP → WebSocket
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Lógica do WebSocket: recebe texto, executa o matcher e envia eventos em tempo real
async fn handle_websocket(mut socket: WebSocket, state: Arc<AppState>) {
    info!("WebSocket conectado");

    while let Some(Ok(msg)) = socket.recv().await {
        match msg {
            Message::Text(text) => {
                // Tenta parsear como JSON {text}; senão usa como texto puro
                let text_str = if let Ok(req) = serde_json::from_str::<WsRequest>(&text) {
                    req.text.trim().to_string()
                } else {
                    text.trim().to_string()
                };

                if text_str.is_empty() {
                    continue;
                }

                info!("Analisando via WebSocket: {} chars", text_str.len());

                // Executa o matcher em tokio::task::spawn_blocking para não bloquear o runtime
                let (tx_std, rx_std) = std::sync::mpsc::channel::<MatchEvent>();
                let matcher_arc = Arc::clone(&state);
                let text_for_thread = text_str.clone();

                let handle = tokio::task::spawn_blocking(move || {
                    let doc = Document::new(&text_for_thread);
                    matcher_arc.matcher.process_streaming(&doc, tx_std);
                });

                handle.await.ok();

                // Coleta todos os eventos numa Vec (o rx_std não é Send)
                let events: Vec<MatchEvent> = rx_std.try_iter().collect();

                for event in &events {
                    if let Ok(json) = serde_json::to_string(event) {
                        if socket.send(Message::Text(json.into())).await.is_err() {
                            return; // cliente desconectou
                        }
                        // Pequena pausa para animação visual (passo a passo)
                        tokio::time::sleep(tokio::time::Duration::from_millis(35)).await;
                    }
                }
            }
            Message::Close(_) => {
                info!("WebSocket desconectado");
                return;
            }
            Message::Ping(payload) => {
                let _ = socket.send(Message::Pong(payload)).await;
            }
            _ => {}
        }
    }
}
