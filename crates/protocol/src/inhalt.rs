//! Nutzlasten (`content`) des Signaling-Umschlags
//!
//! Welche Variante in `content` steht, bestimmt allein das `type`-Feld
//! des Umschlags (siehe [`crate::umschlag::NachrichtenTyp::inhalt_art`]).

use chrono::{DateTime, Utc};
use funkhaus_core::models::{DirektNachricht, Nachricht};
use funkhaus_core::{ChannelId, ClientId, ConversationId, MemberId, MessageId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::sitzung::{IceKandidat, SitzungsBeschreibung};

// ---------------------------------------------------------------------------
// Inhalt
// ---------------------------------------------------------------------------

/// Getaggte Nutzlast eines Umschlags
#[derive(Debug, Clone, PartialEq)]
pub enum Inhalt {
    /// Kein oder ignorierter Inhalt (`subscribe`, `unsubscribe`, `joined`, `leave`)
    Keine,
    /// Chat-Nachricht (`message`)
    Chat(ChatInhalt),
    /// WebRTC-Verhandlung (`initializeCall`, `answer`, `candidate`, `offer`)
    WebRtc(WebRtcInhalt),
    /// Teilnehmer-Delta (`participant`)
    Teilnehmer(TeilnehmerInhalt),
    /// Vollstaendige Teilnehmerliste (`participants`)
    Teilnehmerliste(Teilnehmerliste),
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// Nachrichten-Datensatz wie ihn das Frontend erwartet
///
/// Unbekannte Felder (z.B. das eingebettete `member`) bleiben in
/// `weitere` erhalten und werden unveraendert weitergereicht.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatInhalt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(rename = "fileUrl", default, skip_serializing_if = "Option::is_none")]
    pub datei_url: Option<String>,
    #[serde(rename = "memberID", default, skip_serializing_if = "Option::is_none")]
    pub mitglied_id: Option<MemberId>,
    #[serde(rename = "channelID", default, skip_serializing_if = "Option::is_none")]
    pub kanal_id: Option<ChannelId>,
    #[serde(
        rename = "conversationId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub konversation_id: Option<ConversationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub weitere: serde_json::Map<String, serde_json::Value>,
}

impl ChatInhalt {
    /// Baut die Nutzlast aus einer gespeicherten Kanal-Nachricht
    pub fn aus_nachricht(n: &Nachricht) -> Self {
        let mut weitere = serde_json::Map::new();
        if let Some(m) = &n.mitglied {
            if let Ok(wert) = serde_json::to_value(m) {
                weitere.insert("member".into(), wert);
            }
        }
        Self {
            id: Some(n.id),
            content: Some(n.content.clone()),
            datei_url: n.datei_url.clone(),
            mitglied_id: Some(n.mitglied_id),
            kanal_id: Some(n.kanal_id),
            konversation_id: None,
            deleted: Some(n.deleted),
            created_at: Some(n.created_at),
            updated_at: Some(n.updated_at),
            weitere,
        }
    }

    /// Baut die Nutzlast aus einer gespeicherten Direktnachricht
    pub fn aus_direktnachricht(n: &DirektNachricht) -> Self {
        let mut weitere = serde_json::Map::new();
        if let Some(m) = &n.mitglied {
            if let Ok(wert) = serde_json::to_value(m) {
                weitere.insert("member".into(), wert);
            }
        }
        Self {
            id: Some(n.id),
            content: Some(n.content.clone()),
            datei_url: n.datei_url.clone(),
            mitglied_id: Some(n.mitglied_id),
            kanal_id: None,
            konversation_id: Some(n.konversation_id),
            deleted: Some(n.deleted),
            created_at: Some(n.created_at),
            updated_at: Some(n.updated_at),
            weitere,
        }
    }
}

// ---------------------------------------------------------------------------
// WebRTC
// ---------------------------------------------------------------------------

/// Nutzlast der Verhandlungsnachrichten
///
/// Vom Client kommen `answer`, `candidate` und `streamId` strukturiert.
/// Der Server sendet Angebote und Kandidaten als JSON-String in `data`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebRtcInhalt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<SitzungsBeschreibung>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate: Option<IceKandidat>,
    #[serde(rename = "streamId", default, skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,
}

impl WebRtcInhalt {
    /// Verpackt einen serialisierbaren Wert als JSON-String in `data`
    pub fn mit_daten<T: Serialize>(wert: &T) -> serde_json::Result<Self> {
        Ok(Self {
            data: Some(serde_json::to_string(wert)?),
            ..Default::default()
        })
    }
}

// ---------------------------------------------------------------------------
// Teilnehmer
// ---------------------------------------------------------------------------

/// Art eines Teilnehmer-Deltas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeilnehmerEreignis {
    Joined,
    Left,
}

/// Ein Voice-Teilnehmer, wie ihn die Teilnehmerliste im Frontend zeigt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeilnehmerInhalt {
    pub data: TeilnehmerEreignis,
    pub username: String,
    #[serde(rename = "streamId")]
    pub stream_id: String,
    #[serde(rename = "imageURL")]
    pub bild_url: String,
    #[serde(rename = "clientId")]
    pub client_id: ClientId,
}

/// Schnappschuss aller Voice-Teilnehmer eines Servers:
/// Kanal-ID -> Stream-ID -> Teilnehmer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Teilnehmerliste(pub BTreeMap<String, BTreeMap<String, TeilnehmerInhalt>>);

impl Teilnehmerliste {
    pub fn hinzufuegen(&mut self, kanal: ChannelId, teilnehmer: TeilnehmerInhalt) {
        self.0
            .entry(kanal.to_string())
            .or_default()
            .insert(teilnehmer.stream_id.clone(), teilnehmer);
    }

    pub fn anzahl(&self) -> usize {
        self.0.values().map(|k| k.len()).sum()
    }
}
