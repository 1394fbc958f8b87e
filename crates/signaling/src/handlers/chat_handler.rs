//! Chat-Handler – Abonnements und Weiterleitung von Chat-Ereignissen

use funkhaus_core::KanalSchluessel;
use funkhaus_protocol::Umschlag;

use crate::dispatcher::VerbindungsKontext;
use crate::error::{SignalingError, SignalingResult};
use crate::server_state::SignalingState;

fn schluessel(umschlag: &Umschlag) -> SignalingResult<KanalSchluessel> {
    umschlag
        .channel
        .as_deref()
        .map(KanalSchluessel::neu)
        .filter(|s| !s.ist_leer())
        .ok_or(SignalingError::FehlendesFeld("channel"))
}

/// `subscribe`: Client erhaelt ab jetzt alle Ereignisse des Schluessels
pub fn abonnieren(
    state: &SignalingState,
    ctx: &VerbindungsKontext,
    umschlag: &Umschlag,
) -> SignalingResult<()> {
    let schluessel = schluessel(umschlag)?;
    state.hub.abonnieren(ctx.client_id, schluessel);
    Ok(())
}

pub fn abbestellen(
    state: &SignalingState,
    ctx: &VerbindungsKontext,
    umschlag: &Umschlag,
) -> SignalingResult<()> {
    let schluessel = schluessel(umschlag)?;
    state.hub.abbestellen(ctx.client_id, schluessel);
    Ok(())
}

/// `message`: Umschlag unveraendert an alle Abonnenten von `channel`
pub fn weiterleiten(state: &SignalingState, umschlag: &Umschlag) -> SignalingResult<()> {
    let schluessel = schluessel(umschlag)?;
    state.hub.an_channel_senden(schluessel, umschlag);
    Ok(())
}
