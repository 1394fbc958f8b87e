//! Client-Verbindung – Lese- und Schreib-Pumpe eines WebSockets
//!
//! Jede Verbindung besteht aus zwei Haelften:
//! - Die **Lese-Pumpe** liest Text-Frames, dekodiert sie und reicht sie
//!   an den [`Dispatcher`] weiter. Jeder empfangene Frame (auch Pong)
//!   verlaengert die Frist; bleibt der Client laenger als
//!   `pong_wartezeit` stumm, wird getrennt.
//! - Die **Schreib-Pumpe** leert die Send-Queue. Alles, was beim
//!   Aufwachen bereits wartet, geht mit `\n` verbunden in einem Frame
//!   hinaus. Alle `ping_intervall` wird ein Ping gesendet, jeder
//!   Schreibvorgang hat eine Frist von `schreib_frist`.
//!
//! Endet eine Haelfte, wird die Verbindung abgebaut: Voice-Sitzung
//! verlassen, aus dem Hub abmelden, Schreib-Pumpe auslaufen lassen.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use funkhaus_core::models::Profil;
use funkhaus_core::ClientId;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};

use crate::dispatcher::{Dispatcher, VerbindungsKontext};
use crate::server_state::{SignalingConfig, SignalingState};

// ---------------------------------------------------------------------------
// Verbindung
// ---------------------------------------------------------------------------

/// Bedient einen bereits akzeptierten WebSocket bis zur Trennung
pub async fn verbindung_bedienen(socket: WebSocket, state: Arc<SignalingState>, profil: Profil) {
    let client_id = ClientId::new();
    let config = Arc::clone(&state.config);
    tracing::info!(client_id = %client_id, profil = %profil.id, "Neue Verbindung");

    let (mut senke, mut strom) = socket.split();
    let mut rx = state.hub.registrieren(client_id);
    let schreib_config = Arc::clone(&config);
    let mut schreiber = tokio::spawn(async move {
        schreib_pumpe(&mut senke, &mut rx, &schreib_config).await;
    });

    let dispatcher = Dispatcher::neu(Arc::clone(&state));
    let mut ctx = VerbindungsKontext::neu(client_id, profil);
    let mut shutdown = state.shutdown_empfaenger();

    let schreiber_beendet = tokio::select! {
        _ = lese_pumpe(&mut strom, &dispatcher, &mut ctx, config.pong_wartezeit) => false,
        _ = &mut schreiber => {
            tracing::debug!(client_id = %client_id, "Schreib-Pumpe beendet");
            true
        }
        _ = shutdown.changed() => {
            tracing::debug!(client_id = %client_id, "Shutdown-Signal empfangen");
            false
        }
    };

    verbindung_abbauen(&state, client_id).await;

    if !schreiber_beendet && timeout(config.schreib_frist, &mut schreiber).await.is_err() {
        schreiber.abort();
    }
    tracing::info!(client_id = %client_id, "Verbindung getrennt");
}

/// Voice-Sitzung verlassen und aus allen Hub-Tabellen austragen
pub async fn verbindung_abbauen(state: &SignalingState, client_id: ClientId) {
    state.hub.voice_verlassen(client_id).await;
    state.hub.abmelden(client_id);
}

// ---------------------------------------------------------------------------
// Lese-Pumpe
// ---------------------------------------------------------------------------

/// Liest Frames bis zur Trennung, zum Fehler oder zum Heartbeat-Timeout
pub async fn lese_pumpe<S, E>(
    strom: &mut S,
    dispatcher: &Dispatcher,
    ctx: &mut VerbindungsKontext,
    pong_wartezeit: Duration,
) where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    loop {
        let frame = match timeout(pong_wartezeit, strom.next()).await {
            Err(_) => {
                tracing::warn!(client_id = %ctx.client_id, "Heartbeat-Timeout");
                return;
            }
            Ok(None) => {
                tracing::debug!(client_id = %ctx.client_id, "Stream beendet");
                return;
            }
            Ok(Some(Err(e))) => {
                tracing::warn!(client_id = %ctx.client_id, fehler = %e, "Lesefehler");
                return;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            Message::Text(text) => dispatcher.verarbeiten(&text, ctx).await,
            Message::Close(_) => {
                tracing::debug!(client_id = %ctx.client_id, "Close-Frame empfangen");
                return;
            }
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Binary(_) => {
                tracing::debug!(client_id = %ctx.client_id, "Binaer-Frame ignoriert");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Schreib-Pumpe
// ---------------------------------------------------------------------------

/// Leert die Send-Queue in den Socket und sendet periodisch Pings
///
/// Endet, wenn die Queue geschlossen wird (dann mit Close-Frame) oder
/// ein Schreibvorgang scheitert.
pub async fn schreib_pumpe<W>(
    senke: &mut W,
    rx: &mut mpsc::Receiver<Arc<str>>,
    config: &SignalingConfig,
) where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    let mut ping = tokio::time::interval_at(
        Instant::now() + config.ping_intervall,
        config.ping_intervall,
    );

    loop {
        tokio::select! {
            nachricht = rx.recv() => {
                let Some(erste) = nachricht else {
                    let _ = schreiben(senke, Message::Close(None), config.schreib_frist).await;
                    return;
                };
                let mut frame = String::from(&*erste);
                while let Ok(weitere) = rx.try_recv() {
                    frame.push('\n');
                    frame.push_str(&weitere);
                }
                if !schreiben(senke, Message::Text(frame), config.schreib_frist).await {
                    return;
                }
            }
            _ = ping.tick() => {
                if !schreiben(senke, Message::Ping(Vec::new()), config.schreib_frist).await {
                    return;
                }
            }
        }
    }
}

async fn schreiben<W>(senke: &mut W, nachricht: Message, frist: Duration) -> bool
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    match timeout(frist, senke.send(nachricht)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!(fehler = %e, "Schreibfehler");
            false
        }
        Err(_) => {
            tracing::warn!("Schreibfrist abgelaufen");
            false
        }
    }
}
