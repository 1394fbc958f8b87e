//! Message-Dispatcher – Routet Umschlaege an die richtigen Handler
//!
//! Fehler eines einzelnen Umschlags beenden nie die Verbindung: sie
//! werden protokolliert und der Umschlag wird verworfen. Unbekannte Typen
//! und Typen, die nur der Server senden darf, werden ebenso ignoriert.

use std::sync::Arc;

use funkhaus_core::models::Profil;
use funkhaus_core::{ClientId, FunkError};
use funkhaus_protocol::{NachrichtenTyp, Umschlag};

use crate::error::{SignalingError, SignalingResult};
use crate::handlers::{chat_handler, voice_handler};
use crate::server_state::SignalingState;

/// Informationen ueber die aktuelle Verbindung
#[derive(Debug, Clone)]
pub struct VerbindungsKontext {
    pub client_id: ClientId,
    pub profil: Profil,
    /// Zuletzt vom Browser gemeldete Stream-ID
    pub stream_id: Option<String>,
}

impl VerbindungsKontext {
    pub fn neu(client_id: ClientId, profil: Profil) -> Self {
        Self {
            client_id,
            profil,
            stream_id: None,
        }
    }
}

/// Zentraler Message-Dispatcher
pub struct Dispatcher {
    state: Arc<SignalingState>,
}

impl Dispatcher {
    pub fn neu(state: Arc<SignalingState>) -> Self {
        Self { state }
    }

    /// Dekodiert einen Text-Frame und verarbeitet ihn
    pub async fn verarbeiten(&self, text: &str, ctx: &mut VerbindungsKontext) {
        let umschlag = match Umschlag::dekodieren(text) {
            Ok(u) => u,
            Err(e) => {
                tracing::warn!(client_id = %ctx.client_id, fehler = %e, "Umschlag verworfen");
                return;
            }
        };

        let typ = umschlag.typ;
        if let Err(e) = self.dispatch(umschlag, ctx).await {
            let fehler = FunkError::from(e);
            if fehler.trennt_verbindung() {
                tracing::warn!(client_id = %ctx.client_id, typ = %typ, fehler = %fehler, "Verarbeitung fehlgeschlagen");
            } else {
                tracing::debug!(client_id = %ctx.client_id, typ = %typ, fehler = %fehler, "Umschlag ignoriert");
            }
        }
    }

    /// Fuehrt einen dekodierten Umschlag aus
    pub async fn dispatch(
        &self,
        umschlag: Umschlag,
        ctx: &mut VerbindungsKontext,
    ) -> SignalingResult<()> {
        match umschlag.typ {
            NachrichtenTyp::Subscribe => chat_handler::abonnieren(&self.state, ctx, &umschlag),
            NachrichtenTyp::Unsubscribe => chat_handler::abbestellen(&self.state, ctx, &umschlag),
            NachrichtenTyp::Message => chat_handler::weiterleiten(&self.state, &umschlag),
            NachrichtenTyp::Joined => voice_handler::server_beitreten(&self.state, ctx, &umschlag).await,
            NachrichtenTyp::InitializeCall => {
                voice_handler::anruf_starten(&self.state, ctx, &umschlag).await
            }
            NachrichtenTyp::Leave => voice_handler::verlassen(&self.state, ctx).await,
            NachrichtenTyp::Answer => voice_handler::antwort(&self.state, ctx, umschlag).await,
            NachrichtenTyp::Candidate => voice_handler::kandidat(&self.state, ctx, umschlag).await,
            NachrichtenTyp::Participants | NachrichtenTyp::Offer | NachrichtenTyp::Participant => {
                Err(SignalingError::NurVomServer(umschlag.typ.als_str()))
            }
        }
    }
}
