//! Domaenen-Datensaetze der externen CRUD-Schicht
//!
//! Profile, Server, Kanaele, Mitglieder und Nachrichten werden nicht von
//! Funkhaus gespeichert. Diese Typen sind die Form, in der die
//! Kollaborateure sie zurueckgeben und in der sie an Clients gehen.
//! Die JSON-Feldnamen entsprechen dem bestehenden Web-Frontend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ChannelId, ConversationId, MemberId, MessageId, ProfileId, ServerId};

// ---------------------------------------------------------------------------
// Profil / Server / Kanal
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profil {
    pub id: ProfileId,
    pub name: String,
    #[serde(rename = "imageUrl")]
    pub bild_url: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub id: ServerId,
    pub name: String,
    #[serde(rename = "profileID")]
    pub besitzer: ProfileId,
}

/// Art eines Kanals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KanalTyp {
    Text,
    Audio,
    Video,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KanalInfo {
    pub id: ChannelId,
    pub name: String,
    #[serde(rename = "type")]
    pub typ: KanalTyp,
    #[serde(rename = "serverID")]
    pub server_id: ServerId,
}

// ---------------------------------------------------------------------------
// Mitglieder
// ---------------------------------------------------------------------------

/// Rolle eines Mitglieds innerhalb eines Servers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MitgliedsRolle {
    Admin,
    Moderator,
    Guest,
}

impl MitgliedsRolle {
    /// Darf fremde Nachrichten loeschen
    pub fn ist_moderierend(&self) -> bool {
        matches!(self, Self::Admin | Self::Moderator)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mitglied {
    pub id: MemberId,
    pub role: MitgliedsRolle,
    #[serde(rename = "profileID")]
    pub profil_id: ProfileId,
    #[serde(rename = "serverID")]
    pub server_id: ServerId,
    #[serde(rename = "profile", skip_serializing_if = "Option::is_none")]
    pub profil: Option<Profil>,
}

/// Direktnachrichten-Konversation zwischen zwei Mitgliedern
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Konversation {
    pub id: ConversationId,
    #[serde(rename = "memberOne")]
    pub mitglied_eins: Mitglied,
    #[serde(rename = "memberTwo")]
    pub mitglied_zwei: Mitglied,
}

impl Konversation {
    /// Das Mitglied dieser Konversation, das zu `profil` gehoert
    pub fn mitglied_fuer(&self, profil: ProfileId) -> Option<&Mitglied> {
        if self.mitglied_eins.profil_id == profil {
            Some(&self.mitglied_eins)
        } else if self.mitglied_zwei.profil_id == profil {
            Some(&self.mitglied_zwei)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Nachrichten
// ---------------------------------------------------------------------------

/// Kanal-Nachricht
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nachricht {
    pub id: MessageId,
    pub content: String,
    #[serde(rename = "fileUrl")]
    pub datei_url: Option<String>,
    #[serde(rename = "memberID")]
    pub mitglied_id: MemberId,
    #[serde(rename = "channelID")]
    pub kanal_id: ChannelId,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "member", skip_serializing_if = "Option::is_none")]
    pub mitglied: Option<Mitglied>,
}

/// Direktnachricht innerhalb einer Konversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirektNachricht {
    pub id: MessageId,
    pub content: String,
    #[serde(rename = "fileUrl")]
    pub datei_url: Option<String>,
    #[serde(rename = "memberID")]
    pub mitglied_id: MemberId,
    #[serde(rename = "conversationId")]
    pub konversation_id: ConversationId,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "member", skip_serializing_if = "Option::is_none")]
    pub mitglied: Option<Mitglied>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mitglied(profil: ProfileId, role: MitgliedsRolle) -> Mitglied {
        Mitglied {
            id: MemberId::new(),
            role,
            profil_id: profil,
            server_id: ServerId::new(),
            profil: None,
        }
    }

    #[test]
    fn rolle_serialisiert_grossgeschrieben() {
        let json = serde_json::to_string(&MitgliedsRolle::Moderator).unwrap();
        assert_eq!(json, "\"MODERATOR\"");
    }

    #[test]
    fn moderierende_rollen() {
        assert!(MitgliedsRolle::Admin.ist_moderierend());
        assert!(MitgliedsRolle::Moderator.ist_moderierend());
        assert!(!MitgliedsRolle::Guest.ist_moderierend());
    }

    #[test]
    fn konversation_findet_eigenes_mitglied() {
        let a = ProfileId::new();
        let b = ProfileId::new();
        let k = Konversation {
            id: ConversationId::new(),
            mitglied_eins: mitglied(a, MitgliedsRolle::Guest),
            mitglied_zwei: mitglied(b, MitgliedsRolle::Admin),
        };
        assert_eq!(k.mitglied_fuer(b).map(|m| m.role), Some(MitgliedsRolle::Admin));
        assert!(k.mitglied_fuer(ProfileId::new()).is_none());
    }

    #[test]
    fn nachricht_feldnamen_wie_frontend() {
        let jetzt = Utc::now();
        let n = Nachricht {
            id: MessageId::new(),
            content: "Hallo".into(),
            datei_url: None,
            mitglied_id: MemberId::new(),
            kanal_id: ChannelId::new(),
            deleted: false,
            created_at: jetzt,
            updated_at: jetzt,
            mitglied: None,
        };
        let wert = serde_json::to_value(&n).unwrap();
        assert!(wert.get("memberID").is_some());
        assert!(wert.get("channelID").is_some());
        assert!(wert.get("fileUrl").is_some());
        assert!(wert.get("member").is_none());
    }
}
