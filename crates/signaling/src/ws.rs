//! WebSocket-Endpunkt `GET /ws?profileId=<id>`
//!
//! Das Profil wird vor dem Upgrade ueber das [`Verzeichnis`] aufgeloest;
//! unbekannte Profile erhalten `401` und keinen Socket.
//!
//! [`Verzeichnis`]: funkhaus_chat::Verzeichnis

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use funkhaus_core::ProfileId;
use serde::Deserialize;

use crate::connection::verbindung_bedienen;
use crate::server_state::SignalingState;

/// Query-Parameter des Upgrades
#[derive(Debug, Deserialize)]
pub struct WsParameter {
    #[serde(rename = "profileId")]
    pub profil_id: ProfileId,
}

/// Axum-Router fuer den `/ws`-Endpunkt
pub fn ws_router(state: Arc<SignalingState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(state)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(parameter): Query<WsParameter>,
    State(state): State<Arc<SignalingState>>,
) -> Response {
    let profil = match state.verzeichnis.profil_laden(parameter.profil_id) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(profil = %parameter.profil_id, fehler = %e, "Upgrade abgelehnt");
            return (StatusCode::UNAUTHORIZED, "Unbekanntes Profil").into_response();
        }
    };

    ws.max_message_size(state.config.max_nachricht_bytes)
        .on_upgrade(move |socket| verbindung_bedienen(socket, state, profil))
}
