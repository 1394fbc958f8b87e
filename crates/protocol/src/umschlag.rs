//! Signaling-Umschlag – die einzige Nachrichtenform auf dem WebSocket
//!
//! ```text
//! {"type": "...", "channel": "...", "serverId": "...", "content": {...}}
//! ```
//!
//! ## Dekodierung
//! Zuerst wird der rohe Umschlag mit `content` als unbestimmtem JSON-Wert
//! gelesen. Danach waehlt `type` die Inhalts-Variante, in die `content`
//! typisiert dekodiert wird. Unbekannte Typen ergeben
//! [`ProtokollFehler::UnbekannterTyp`].

use funkhaus_core::{ChannelId, ServerId};
use serde::{Deserialize, Serialize};

use crate::error::{ProtokollFehler, ProtokollResult};
use crate::inhalt::{ChatInhalt, Inhalt, TeilnehmerInhalt, Teilnehmerliste, WebRtcInhalt};
use crate::sitzung::{IceKandidat, SitzungsBeschreibung};

// ---------------------------------------------------------------------------
// Nachrichtentypen
// ---------------------------------------------------------------------------

/// Alle Werte des `type`-Feldes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NachrichtenTyp {
    Subscribe,
    Unsubscribe,
    Joined,
    Leave,
    Participants,
    Message,
    InitializeCall,
    Answer,
    Candidate,
    /// nur Server -> Client
    Offer,
    /// nur Server -> Client (Teilnehmer-Delta)
    Participant,
}

/// Welche Inhalts-Variante zu einem Typ gehoert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InhaltsArt {
    Keine,
    Chat,
    WebRtc,
    Teilnehmer,
    Teilnehmerliste,
}

impl NachrichtenTyp {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
            Self::Joined => "joined",
            Self::Leave => "leave",
            Self::Participants => "participants",
            Self::Message => "message",
            Self::InitializeCall => "initializeCall",
            Self::Answer => "answer",
            Self::Candidate => "candidate",
            Self::Offer => "offer",
            Self::Participant => "participant",
        }
    }

    pub fn aus_str(s: &str) -> Option<Self> {
        let typ = match s {
            "subscribe" => Self::Subscribe,
            "unsubscribe" => Self::Unsubscribe,
            "joined" => Self::Joined,
            "leave" => Self::Leave,
            "participants" => Self::Participants,
            "message" => Self::Message,
            "initializeCall" => Self::InitializeCall,
            "answer" => Self::Answer,
            "candidate" => Self::Candidate,
            "offer" => Self::Offer,
            "participant" => Self::Participant,
            _ => return None,
        };
        Some(typ)
    }

    pub fn inhalt_art(&self) -> InhaltsArt {
        match self {
            Self::Subscribe | Self::Unsubscribe | Self::Joined | Self::Leave => InhaltsArt::Keine,
            Self::Message => InhaltsArt::Chat,
            Self::InitializeCall | Self::Answer | Self::Candidate | Self::Offer => {
                InhaltsArt::WebRtc
            }
            Self::Participant => InhaltsArt::Teilnehmer,
            Self::Participants => InhaltsArt::Teilnehmerliste,
        }
    }

    /// Typen die nur der Server sendet
    pub fn nur_vom_server(&self) -> bool {
        matches!(self, Self::Offer | Self::Participant | Self::Participants)
    }
}

impl std::fmt::Display for NachrichtenTyp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.als_str())
    }
}

// ---------------------------------------------------------------------------
// Umschlag
// ---------------------------------------------------------------------------

/// Roher Umschlag wie er auf dem Draht steht
#[derive(Debug, Serialize, Deserialize)]
struct RohUmschlag {
    #[serde(rename = "type")]
    typ: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    channel: Option<String>,
    #[serde(rename = "serverId", default, skip_serializing_if = "Option::is_none")]
    server_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<serde_json::Value>,
}

/// Typisierter Signaling-Umschlag
#[derive(Debug, Clone, PartialEq)]
pub struct Umschlag {
    pub typ: NachrichtenTyp,
    /// Chat-Schluessel (`chat:<id>:messages`) oder Voice-Kanal-ID
    pub channel: Option<String>,
    pub server_id: Option<String>,
    pub inhalt: Inhalt,
}

impl Umschlag {
    pub fn neu(typ: NachrichtenTyp, inhalt: Inhalt) -> Self {
        Self {
            typ,
            channel: None,
            server_id: None,
            inhalt,
        }
    }

    pub fn mit_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn mit_server(mut self, server: ServerId) -> Self {
        self.server_id = Some(server.to_string());
        self
    }

    /// Chat-Ereignis an einen Abonnement-Schluessel
    pub fn chat(schluessel: impl Into<String>, inhalt: ChatInhalt) -> Self {
        Self::neu(NachrichtenTyp::Message, Inhalt::Chat(inhalt)).mit_channel(schluessel)
    }

    /// Server-Angebot (Neuverhandlung) fuer eine Medien-Sitzung
    pub fn angebot(
        server: ServerId,
        kanal: ChannelId,
        angebot: &SitzungsBeschreibung,
    ) -> ProtokollResult<Self> {
        Ok(Self::neu(
            NachrichtenTyp::Offer,
            Inhalt::WebRtc(WebRtcInhalt::mit_daten(angebot)?),
        )
        .mit_channel(kanal.to_string())
        .mit_server(server))
    }

    /// Vom Server gefundener ICE-Kandidat
    pub fn kandidat(
        server: ServerId,
        kanal: ChannelId,
        kandidat: &IceKandidat,
    ) -> ProtokollResult<Self> {
        Ok(Self::neu(
            NachrichtenTyp::Candidate,
            Inhalt::WebRtc(WebRtcInhalt::mit_daten(kandidat)?),
        )
        .mit_channel(kanal.to_string())
        .mit_server(server))
    }

    /// Teilnehmer-Delta (`joined`/`left`) an alle Clients eines Servers
    pub fn teilnehmer(server: ServerId, kanal: ChannelId, teilnehmer: TeilnehmerInhalt) -> Self {
        Self::neu(NachrichtenTyp::Participant, Inhalt::Teilnehmer(teilnehmer))
            .mit_channel(kanal.to_string())
            .mit_server(server)
    }

    pub fn teilnehmerliste(server: ServerId, liste: Teilnehmerliste) -> Self {
        Self::neu(NachrichtenTyp::Participants, Inhalt::Teilnehmerliste(liste)).mit_server(server)
    }

    /// `serverId` als typisierte ID, falls vorhanden und gueltig
    pub fn server(&self) -> Option<ServerId> {
        self.server_id.as_deref().and_then(|s| s.parse().ok())
    }

    /// `channel` als Kanal-ID, falls es eine UUID ist
    pub fn kanal(&self) -> Option<ChannelId> {
        self.channel.as_deref().and_then(|s| s.parse().ok())
    }

    /// Dekodiert einen Text-Frame
    pub fn dekodieren(text: &str) -> ProtokollResult<Self> {
        let roh: RohUmschlag = serde_json::from_str(text)?;
        let typ = NachrichtenTyp::aus_str(&roh.typ)
            .ok_or_else(|| ProtokollFehler::UnbekannterTyp(roh.typ.clone()))?;

        let content = roh.content.filter(|c| !c.is_null());
        let inhalt = match (typ.inhalt_art(), content) {
            (InhaltsArt::Keine, _) | (_, None) => Inhalt::Keine,
            (InhaltsArt::Chat, Some(c)) => Inhalt::Chat(inhalt_lesen(typ, c)?),
            (InhaltsArt::WebRtc, Some(c)) => Inhalt::WebRtc(inhalt_lesen(typ, c)?),
            (InhaltsArt::Teilnehmer, Some(c)) => Inhalt::Teilnehmer(inhalt_lesen(typ, c)?),
            (InhaltsArt::Teilnehmerliste, Some(c)) => {
                Inhalt::Teilnehmerliste(inhalt_lesen(typ, c)?)
            }
        };

        Ok(Self {
            typ,
            channel: roh.channel,
            server_id: roh.server_id,
            inhalt,
        })
    }

    /// Kodiert den Umschlag als JSON-Text
    pub fn kodieren(&self) -> ProtokollResult<String> {
        let content = match &self.inhalt {
            Inhalt::Keine => None,
            Inhalt::Chat(c) => Some(serde_json::to_value(c)?),
            Inhalt::WebRtc(w) => Some(serde_json::to_value(w)?),
            Inhalt::Teilnehmer(t) => Some(serde_json::to_value(t)?),
            Inhalt::Teilnehmerliste(l) => Some(serde_json::to_value(l)?),
        };
        let roh = RohUmschlag {
            typ: self.typ.als_str().to_string(),
            channel: self.channel.clone(),
            server_id: self.server_id.clone(),
            content,
        };
        Ok(serde_json::to_string(&roh)?)
    }
}

fn inhalt_lesen<T: serde::de::DeserializeOwned>(
    typ: NachrichtenTyp,
    wert: serde_json::Value,
) -> ProtokollResult<T> {
    serde_json::from_value(wert).map_err(|e| ProtokollFehler::FalscherInhalt {
        typ: typ.als_str(),
        grund: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inhalt::TeilnehmerEreignis;
    use funkhaus_core::ClientId;

    #[test]
    fn subscribe_ohne_inhalt() {
        let u = Umschlag::dekodieren(r#"{"type":"subscribe","channel":"chat:C1:messages"}"#)
            .unwrap();
        assert_eq!(u.typ, NachrichtenTyp::Subscribe);
        assert_eq!(u.channel.as_deref(), Some("chat:C1:messages"));
        assert_eq!(u.inhalt, Inhalt::Keine);
    }

    #[test]
    fn leave_ignoriert_leeren_inhalt() {
        let u = Umschlag::dekodieren(r#"{"type":"leave","channel":"","serverId":"","content":{}}"#)
            .unwrap();
        assert_eq!(u.typ, NachrichtenTyp::Leave);
        assert_eq!(u.inhalt, Inhalt::Keine);
        assert!(u.server().is_none());
    }

    #[test]
    fn unbekannter_typ_ist_protokollfehler() {
        let e = Umschlag::dekodieren(r#"{"type":"tanzen"}"#).unwrap_err();
        assert!(matches!(e, ProtokollFehler::UnbekannterTyp(t) if t == "tanzen"));
    }

    #[test]
    fn kaputtes_json_ist_protokollfehler() {
        assert!(matches!(
            Umschlag::dekodieren("{nicht json").unwrap_err(),
            ProtokollFehler::Ungueltig(_)
        ));
    }

    #[test]
    fn answer_wird_typisiert_dekodiert() {
        let server = ServerId::new();
        let kanal = ChannelId::new();
        let text = format!(
            r#"{{"type":"answer","channel":"{kanal}","serverId":"{server}","content":{{"answer":{{"type":"answer","sdp":"v=0"}}}}}}"#
        );
        let u = Umschlag::dekodieren(&text).unwrap();
        assert_eq!(u.server(), Some(server));
        assert_eq!(u.kanal(), Some(kanal));
        match u.inhalt {
            Inhalt::WebRtc(w) => assert_eq!(w.answer, Some(SitzungsBeschreibung::antwort("v=0"))),
            andere => panic!("Falsche Variante: {andere:?}"),
        }
    }

    #[test]
    fn candidate_mit_falschem_inhalt() {
        let e = Umschlag::dekodieren(r#"{"type":"candidate","content":{"candidate":42}}"#)
            .unwrap_err();
        assert!(matches!(e, ProtokollFehler::FalscherInhalt { typ: "candidate", .. }));
    }

    #[test]
    fn initialize_call_mit_stream_id() {
        let u = Umschlag::dekodieren(
            r#"{"type":"initializeCall","channel":"x","serverId":"y","content":{"streamId":"abc"}}"#,
        )
        .unwrap();
        match u.inhalt {
            Inhalt::WebRtc(w) => assert_eq!(w.stream_id.as_deref(), Some("abc")),
            andere => panic!("Falsche Variante: {andere:?}"),
        }
    }

    #[test]
    fn angebot_kodieren_mit_data_string() {
        let server = ServerId::new();
        let kanal = ChannelId::new();
        let u = Umschlag::angebot(server, kanal, &SitzungsBeschreibung::angebot("v=0")).unwrap();
        let wert: serde_json::Value = serde_json::from_str(&u.kodieren().unwrap()).unwrap();
        assert_eq!(wert["type"], "offer");
        assert_eq!(wert["serverId"], server.to_string());
        assert_eq!(wert["channel"], kanal.to_string());
        let data = wert["content"]["data"].as_str().unwrap();
        assert!(data.contains("\"type\":\"offer\""));
    }

    #[test]
    fn teilnehmer_delta_kodieren() {
        let u = Umschlag::teilnehmer(
            ServerId::new(),
            ChannelId::new(),
            TeilnehmerInhalt {
                data: TeilnehmerEreignis::Left,
                username: "bert".into(),
                stream_id: "s".into(),
                bild_url: String::new(),
                client_id: ClientId::new(),
            },
        );
        let text = u.kodieren().unwrap();
        assert!(text.contains(r#""type":"participant""#));
        assert!(text.contains(r#""data":"left""#));
        assert_eq!(Umschlag::dekodieren(&text).unwrap(), u);
    }

    #[test]
    fn nur_server_typen() {
        assert!(NachrichtenTyp::Offer.nur_vom_server());
        assert!(NachrichtenTyp::Participants.nur_vom_server());
        assert!(!NachrichtenTyp::Answer.nur_vom_server());
    }
}
