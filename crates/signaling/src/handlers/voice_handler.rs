//! Voice-Handler – Beitreten, Verlassen und WebRTC-Verhandlung
//!
//! ## Ablauf
//! 1. Client sendet `initializeCall` (oder `joined` mit `channel`)
//! 2. Router legt eine Medien-Sitzung an und schickt ein `offer`
//! 3. Client antwortet mit `answer`, ICE-Kandidaten laufen in beide
//!    Richtungen als `candidate`
//! 4. `leave` oder Verbindungsende baut die Sitzung ab
//!
//! `joined` und `initializeCall` werden nur fuer Mitglieder des Servers
//! zugelassen; der Kanal muss zum Server gehoeren.

use funkhaus_core::{ChannelId, ServerId};
use funkhaus_protocol::{Inhalt, IceKandidat, SitzungsBeschreibung, Umschlag, WebRtcInhalt};
use funkhaus_voice::Teilnehmer;
use serde::de::DeserializeOwned;

use crate::dispatcher::VerbindungsKontext;
use crate::error::{SignalingError, SignalingResult};
use crate::server_state::SignalingState;

/// `joined`: Server-Publikum beitreten und Teilnehmerliste erhalten
pub async fn server_beitreten(
    state: &SignalingState,
    ctx: &mut VerbindungsKontext,
    umschlag: &Umschlag,
) -> SignalingResult<()> {
    let server = server_lesen(umschlag)?;
    state.chat_service.server_zulassen(ctx.profil.id, server)?;
    state.hub.server_beitreten(ctx.client_id, server).await;

    if let Some(kanal) = umschlag.kanal() {
        voice_beitreten(state, ctx, server, kanal).await?;
    }
    Ok(())
}

/// `initializeCall`: Medien-Sitzung anlegen oder ersetzen
pub async fn anruf_starten(
    state: &SignalingState,
    ctx: &mut VerbindungsKontext,
    umschlag: &Umschlag,
) -> SignalingResult<()> {
    let server = server_lesen(umschlag)?;
    let kanal = umschlag
        .kanal()
        .ok_or(SignalingError::FehlendesFeld("channel"))?;

    if let Some(stream_id) = webrtc(umschlag).and_then(|w| w.stream_id.clone()) {
        ctx.stream_id = Some(stream_id);
    }
    voice_beitreten(state, ctx, server, kanal).await
}

async fn voice_beitreten(
    state: &SignalingState,
    ctx: &VerbindungsKontext,
    server: ServerId,
    kanal: ChannelId,
) -> SignalingResult<()> {
    state.chat_service.kanal_zulassen(ctx.profil.id, server, kanal)?;

    let teilnehmer = Teilnehmer {
        client_id: ctx.client_id,
        name: ctx.profil.name.clone(),
        bild_url: ctx.profil.bild_url.clone(),
        stream_id: ctx.stream_id.clone(),
    };
    state.hub.voice_beitreten(teilnehmer, server, kanal).await?;
    Ok(())
}

/// `leave`: Voice-Sitzung abbauen; ohne Sitzung ein No-op
pub async fn verlassen(state: &SignalingState, ctx: &VerbindungsKontext) -> SignalingResult<()> {
    if !state.hub.voice_verlassen(ctx.client_id).await {
        tracing::debug!(client_id = %ctx.client_id, "leave ohne Voice-Sitzung");
    }
    Ok(())
}

/// `answer`: Antwort auf das letzte Server-Angebot
pub async fn antwort(
    state: &SignalingState,
    ctx: &VerbindungsKontext,
    umschlag: Umschlag,
) -> SignalingResult<()> {
    let beschreibung: SitzungsBeschreibung = match umschlag.inhalt {
        Inhalt::WebRtc(WebRtcInhalt {
            answer: Some(a), ..
        }) => a,
        Inhalt::WebRtc(WebRtcInhalt { data: Some(d), .. }) => aus_daten(&d, "answer")?,
        _ => return Err(SignalingError::FehlendesFeld("answer")),
    };
    state
        .hub
        .router()
        .antwort_setzen(ctx.client_id, beschreibung)
        .await?;
    Ok(())
}

/// `candidate`: ICE-Kandidat des Browsers
pub async fn kandidat(
    state: &SignalingState,
    ctx: &VerbindungsKontext,
    umschlag: Umschlag,
) -> SignalingResult<()> {
    let kandidat: IceKandidat = match umschlag.inhalt {
        Inhalt::WebRtc(WebRtcInhalt {
            candidate: Some(k),
            ..
        }) => k,
        Inhalt::WebRtc(WebRtcInhalt { data: Some(d), .. }) => aus_daten(&d, "candidate")?,
        _ => return Err(SignalingError::FehlendesFeld("candidate")),
    };
    state
        .hub
        .router()
        .ice_kandidat_hinzufuegen(ctx.client_id, kandidat)
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Hilfsfunktionen
// ---------------------------------------------------------------------------

fn server_lesen(umschlag: &Umschlag) -> SignalingResult<ServerId> {
    umschlag
        .server()
        .ok_or(SignalingError::FehlendesFeld("serverId"))
}

fn webrtc(umschlag: &Umschlag) -> Option<&WebRtcInhalt> {
    match &umschlag.inhalt {
        Inhalt::WebRtc(w) => Some(w),
        _ => None,
    }
}

/// Liest einen als JSON-String in `data` verpackten Wert
fn aus_daten<T: DeserializeOwned>(daten: &str, feld: &'static str) -> SignalingResult<T> {
    serde_json::from_str(daten).map_err(|_| SignalingError::FehlendesFeld(feld))
}
