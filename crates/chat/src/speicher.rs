//! In-Memory-Kollaborateur
//!
//! Implementiert [`Verzeichnis`] und [`NachrichtenSpeicher`] ueber
//! DashMaps, damit der Server ohne externe CRUD-Schicht lauffaehig ist
//! und Tests deterministische Daten haben. Eine echte Datenbank-Anbindung
//! implementiert dieselben Traits.

use chrono::Utc;
use dashmap::DashMap;
use funkhaus_core::models::{
    DirektNachricht, KanalInfo, KanalTyp, Konversation, Mitglied, MitgliedsRolle, Nachricht,
    Profil, ServerInfo,
};
use funkhaus_core::{
    ChannelId, ConversationId, MemberId, MessageId, ProfileId, ServerId,
};

use crate::error::{ChatError, ChatResult};
use crate::verzeichnis::{NachrichtenSpeicher, NeueNachricht, Verzeichnis, GELOESCHT_INHALT};

/// Fluechtiges Verzeichnis und Nachrichtenspeicher
#[derive(Default)]
pub struct InMemoryVerzeichnis {
    profile: DashMap<ProfileId, Profil>,
    server: DashMap<ServerId, ServerInfo>,
    kanaele: DashMap<ChannelId, KanalInfo>,
    /// (Server, Profil) -> Mitglied
    mitglieder: DashMap<(ServerId, ProfileId), Mitglied>,
    konversationen: DashMap<ConversationId, Konversation>,
    nachrichten: DashMap<MessageId, Nachricht>,
    direktnachrichten: DashMap<MessageId, DirektNachricht>,
}

impl InMemoryVerzeichnis {
    pub fn neu() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Befuellen
    // -----------------------------------------------------------------------

    pub fn profil_anlegen(&self, name: &str, bild_url: &str) -> Profil {
        let profil = Profil {
            id: ProfileId::new(),
            name: name.to_string(),
            bild_url: bild_url.to_string(),
            email: format!("{}@funkhaus.local", name.to_lowercase()),
        };
        self.profile.insert(profil.id, profil.clone());
        profil
    }

    /// Legt einen Server an; der Besitzer wird ADMIN-Mitglied
    pub fn server_anlegen(&self, name: &str, besitzer: ProfileId) -> ServerInfo {
        let server = ServerInfo {
            id: ServerId::new(),
            name: name.to_string(),
            besitzer,
        };
        self.server.insert(server.id, server.clone());
        self.mitglied_hinzufuegen(server.id, besitzer, MitgliedsRolle::Admin);
        server
    }

    pub fn kanal_anlegen(&self, server: ServerId, name: &str, typ: KanalTyp) -> KanalInfo {
        let kanal = KanalInfo {
            id: ChannelId::new(),
            name: name.to_string(),
            typ,
            server_id: server,
        };
        self.kanaele.insert(kanal.id, kanal.clone());
        kanal
    }

    pub fn mitglied_hinzufuegen(
        &self,
        server: ServerId,
        profil: ProfileId,
        rolle: MitgliedsRolle,
    ) -> Mitglied {
        let mitglied = Mitglied {
            id: MemberId::new(),
            role: rolle,
            profil_id: profil,
            server_id: server,
            profil: self.profile.get(&profil).map(|p| p.clone()),
        };
        self.mitglieder.insert((server, profil), mitglied.clone());
        mitglied
    }

    pub fn konversation_anlegen(&self, eins: Mitglied, zwei: Mitglied) -> Konversation {
        let konversation = Konversation {
            id: ConversationId::new(),
            mitglied_eins: eins,
            mitglied_zwei: zwei,
        };
        self.konversationen
            .insert(konversation.id, konversation.clone());
        konversation
    }
}

impl Verzeichnis for InMemoryVerzeichnis {
    fn profil_laden(&self, profil: ProfileId) -> ChatResult<Profil> {
        self.profile
            .get(&profil)
            .map(|p| p.clone())
            .ok_or_else(|| ChatError::MitgliedNichtGefunden(format!("Profil {profil}")))
    }

    fn server_laden(&self, server: ServerId) -> ChatResult<ServerInfo> {
        self.server
            .get(&server)
            .map(|s| s.clone())
            .ok_or_else(|| ChatError::ServerNichtGefunden(server.to_string()))
    }

    fn kanal_laden(&self, kanal: ChannelId) -> ChatResult<KanalInfo> {
        self.kanaele
            .get(&kanal)
            .map(|k| k.clone())
            .ok_or_else(|| ChatError::KanalNichtGefunden(kanal.to_string()))
    }

    fn mitglied_finden(&self, server: ServerId, profil: ProfileId) -> ChatResult<Mitglied> {
        self.mitglieder
            .get(&(server, profil))
            .map(|m| m.clone())
            .ok_or_else(|| ChatError::MitgliedNichtGefunden(format!("Profil {profil} in {server}")))
    }

    fn konversation_laden(
        &self,
        konversation: ConversationId,
        profil: ProfileId,
    ) -> ChatResult<Konversation> {
        let k = self
            .konversationen
            .get(&konversation)
            .map(|k| k.clone())
            .ok_or_else(|| ChatError::KonversationNichtGefunden(konversation.to_string()))?;
        if k.mitglied_fuer(profil).is_none() {
            return Err(ChatError::KonversationNichtGefunden(konversation.to_string()));
        }
        Ok(k)
    }
}

impl NachrichtenSpeicher for InMemoryVerzeichnis {
    fn nachricht_erstellen(
        &self,
        kanal: ChannelId,
        neu: NeueNachricht<'_>,
    ) -> ChatResult<Nachricht> {
        let jetzt = Utc::now();
        let nachricht = Nachricht {
            id: MessageId::new(),
            content: neu.content.to_string(),
            datei_url: neu.datei_url.map(str::to_string),
            mitglied_id: neu.mitglied.id,
            kanal_id: kanal,
            deleted: false,
            created_at: jetzt,
            updated_at: jetzt,
            mitglied: Some(neu.mitglied.clone()),
        };
        self.nachrichten.insert(nachricht.id, nachricht.clone());
        Ok(nachricht)
    }

    fn nachricht_laden(&self, kanal: ChannelId, id: MessageId) -> ChatResult<Nachricht> {
        self.nachrichten
            .get(&id)
            .filter(|n| n.kanal_id == kanal && !n.deleted)
            .map(|n| n.clone())
            .ok_or_else(|| ChatError::NachrichtNichtGefunden(id.to_string()))
    }

    fn nachricht_aktualisieren(
        &self,
        kanal: ChannelId,
        id: MessageId,
        content: &str,
    ) -> ChatResult<Nachricht> {
        let mut eintrag = self
            .nachrichten
            .get_mut(&id)
            .filter(|n| n.kanal_id == kanal && !n.deleted)
            .ok_or_else(|| ChatError::NachrichtNichtGefunden(id.to_string()))?;
        eintrag.content = content.to_string();
        eintrag.updated_at = Utc::now();
        Ok(eintrag.clone())
    }

    fn nachricht_loeschen(&self, kanal: ChannelId, id: MessageId) -> ChatResult<Nachricht> {
        let mut eintrag = self
            .nachrichten
            .get_mut(&id)
            .filter(|n| n.kanal_id == kanal && !n.deleted)
            .ok_or_else(|| ChatError::NachrichtNichtGefunden(id.to_string()))?;
        eintrag.content = GELOESCHT_INHALT.to_string();
        eintrag.datei_url = None;
        eintrag.deleted = true;
        eintrag.updated_at = Utc::now();
        Ok(eintrag.clone())
    }

    fn direktnachricht_erstellen(
        &self,
        konversation: ConversationId,
        neu: NeueNachricht<'_>,
    ) -> ChatResult<DirektNachricht> {
        let jetzt = Utc::now();
        let nachricht = DirektNachricht {
            id: MessageId::new(),
            content: neu.content.to_string(),
            datei_url: neu.datei_url.map(str::to_string),
            mitglied_id: neu.mitglied.id,
            konversation_id: konversation,
            deleted: false,
            created_at: jetzt,
            updated_at: jetzt,
            mitglied: Some(neu.mitglied.clone()),
        };
        self.direktnachrichten
            .insert(nachricht.id, nachricht.clone());
        Ok(nachricht)
    }

    fn direktnachricht_laden(
        &self,
        konversation: ConversationId,
        id: MessageId,
    ) -> ChatResult<DirektNachricht> {
        self.direktnachrichten
            .get(&id)
            .filter(|n| n.konversation_id == konversation && !n.deleted)
            .map(|n| n.clone())
            .ok_or_else(|| ChatError::NachrichtNichtGefunden(id.to_string()))
    }

    fn direktnachricht_aktualisieren(
        &self,
        konversation: ConversationId,
        id: MessageId,
        content: &str,
    ) -> ChatResult<DirektNachricht> {
        let mut eintrag = self
            .direktnachrichten
            .get_mut(&id)
            .filter(|n| n.konversation_id == konversation && !n.deleted)
            .ok_or_else(|| ChatError::NachrichtNichtGefunden(id.to_string()))?;
        eintrag.content = content.to_string();
        eintrag.updated_at = Utc::now();
        Ok(eintrag.clone())
    }

    fn direktnachricht_loeschen(
        &self,
        konversation: ConversationId,
        id: MessageId,
    ) -> ChatResult<DirektNachricht> {
        let mut eintrag = self
            .direktnachrichten
            .get_mut(&id)
            .filter(|n| n.konversation_id == konversation && !n.deleted)
            .ok_or_else(|| ChatError::NachrichtNichtGefunden(id.to_string()))?;
        eintrag.content = GELOESCHT_INHALT.to_string();
        eintrag.datei_url = None;
        eintrag.deleted = true;
        eintrag.updated_at = Utc::now();
        Ok(eintrag.clone())
    }
}
