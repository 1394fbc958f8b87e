//! ChatService – Nachrichten erstellen, editieren, loeschen und verteilen
//!
//! Jede Aktion laeuft in drei Schritten:
//! 1. Zulassung ueber das [`Verzeichnis`] (Server, Kanal, Mitglied)
//! 2. Persistenz ueber den [`NachrichtenSpeicher`]
//! 3. Verteilung als `message`-Umschlag an den Abonnement-Schluessel
//!
//! Neue Nachrichten gehen an `chat:<id>:messages`, Aenderungen und
//! Loeschungen an `chat:<id>:messages:update`.

use std::sync::Arc;

use funkhaus_core::models::{DirektNachricht, Mitglied, Nachricht};
use funkhaus_core::{ChannelId, ConversationId, KanalSchluessel, MessageId, ProfileId, ServerId};
use funkhaus_protocol::{ChatInhalt, Umschlag};

use crate::error::{ChatError, ChatResult};
use crate::verzeichnis::{NachrichtenSpeicher, NeueNachricht, Verzeichnis};

/// Maximale Laenge eines Nachrichteninhalts in Zeichen
pub const MAX_INHALT_ZEICHEN: usize = 4096;

/// Ziel der Chat-Verteilung (implementiert vom Signaling-Hub)
pub trait EreignisVerteiler: Send + Sync {
    fn an_channel_senden(&self, schluessel: KanalSchluessel, umschlag: Umschlag);
}

/// ChatService verwaltet Kanal- und Direktnachrichten
pub struct ChatService {
    verzeichnis: Arc<dyn Verzeichnis>,
    speicher: Arc<dyn NachrichtenSpeicher>,
    verteiler: Arc<dyn EreignisVerteiler>,
}

impl ChatService {
    /// Erstellt einen neuen ChatService
    pub fn neu(
        verzeichnis: Arc<dyn Verzeichnis>,
        speicher: Arc<dyn NachrichtenSpeicher>,
        verteiler: Arc<dyn EreignisVerteiler>,
    ) -> Arc<Self> {
        Arc::new(Self {
            verzeichnis,
            speicher,
            verteiler,
        })
    }

    // -----------------------------------------------------------------------
    // Kanal-Nachrichten
    // -----------------------------------------------------------------------

    /// Nachricht in einem Kanal erstellen und an die Abonnenten verteilen
    pub fn nachricht_erstellen(
        &self,
        profil: ProfileId,
        server: ServerId,
        kanal: ChannelId,
        content: &str,
        datei_url: Option<&str>,
    ) -> ChatResult<Nachricht> {
        inhalt_pruefen(content, datei_url)?;
        let mitglied = self.kanal_zulassen(profil, server, kanal)?;

        let nachricht = self.speicher.nachricht_erstellen(
            kanal,
            NeueNachricht {
                mitglied: &mitglied,
                content,
                datei_url,
            },
        )?;

        tracing::debug!(
            kanal = %kanal,
            nachricht = %nachricht.id,
            "Chat-Nachricht erstellt"
        );
        self.verteilen(
            KanalSchluessel::nachrichten(kanal),
            ChatInhalt::aus_nachricht(&nachricht),
        );
        Ok(nachricht)
    }

    /// Nachricht editieren (nur der Verfasser)
    pub fn nachricht_editieren(
        &self,
        profil: ProfileId,
        server: ServerId,
        kanal: ChannelId,
        nachricht_id: MessageId,
        content: &str,
    ) -> ChatResult<Nachricht> {
        inhalt_pruefen(content, None)?;
        let mitglied = self.kanal_zulassen(profil, server, kanal)?;

        let bestehend = self.speicher.nachricht_laden(kanal, nachricht_id)?;
        if bestehend.mitglied_id != mitglied.id {
            return Err(ChatError::KeineBerechtigung(
                "Nur der Verfasser kann die Nachricht editieren".into(),
            ));
        }

        let nachricht = self
            .speicher
            .nachricht_aktualisieren(kanal, nachricht_id, content)?;
        self.verteilen(
            KanalSchluessel::aktualisierungen(kanal),
            ChatInhalt::aus_nachricht(&nachricht),
        );
        Ok(nachricht)
    }

    /// Nachricht weich loeschen (Verfasser, ADMIN oder MODERATOR)
    pub fn nachricht_loeschen(
        &self,
        profil: ProfileId,
        server: ServerId,
        kanal: ChannelId,
        nachricht_id: MessageId,
    ) -> ChatResult<Nachricht> {
        let mitglied = self.kanal_zulassen(profil, server, kanal)?;

        let bestehend = self.speicher.nachricht_laden(kanal, nachricht_id)?;
        let ist_verfasser = bestehend.mitglied_id == mitglied.id;
        if !ist_verfasser && !mitglied.role.ist_moderierend() {
            return Err(ChatError::KeineBerechtigung(
                "Nur Verfasser, Admins und Moderatoren koennen loeschen".into(),
            ));
        }

        let nachricht = self.speicher.nachricht_loeschen(kanal, nachricht_id)?;
        tracing::debug!(
            kanal = %kanal,
            nachricht = %nachricht_id,
            von = %mitglied.id,
            "Chat-Nachricht geloescht"
        );
        self.verteilen(
            KanalSchluessel::aktualisierungen(kanal),
            ChatInhalt::aus_nachricht(&nachricht),
        );
        Ok(nachricht)
    }

    // -----------------------------------------------------------------------
    // Direktnachrichten
    // -----------------------------------------------------------------------

    pub fn direktnachricht_erstellen(
        &self,
        profil: ProfileId,
        konversation: ConversationId,
        content: &str,
        datei_url: Option<&str>,
    ) -> ChatResult<DirektNachricht> {
        inhalt_pruefen(content, datei_url)?;
        let mitglied = self.konversation_zulassen(profil, konversation)?;

        let nachricht = self.speicher.direktnachricht_erstellen(
            konversation,
            NeueNachricht {
                mitglied: &mitglied,
                content,
                datei_url,
            },
        )?;
        self.verteilen(
            KanalSchluessel::nachrichten(konversation),
            ChatInhalt::aus_direktnachricht(&nachricht),
        );
        Ok(nachricht)
    }

    /// Direktnachricht editieren (nur der Verfasser)
    pub fn direktnachricht_editieren(
        &self,
        profil: ProfileId,
        konversation: ConversationId,
        nachricht_id: MessageId,
        content: &str,
    ) -> ChatResult<DirektNachricht> {
        inhalt_pruefen(content, None)?;
        let mitglied = self.konversation_zulassen(profil, konversation)?;

        let bestehend = self
            .speicher
            .direktnachricht_laden(konversation, nachricht_id)?;
        if bestehend.mitglied_id != mitglied.id {
            return Err(ChatError::KeineBerechtigung(
                "Nur der Verfasser kann die Nachricht editieren".into(),
            ));
        }

        let nachricht =
            self.speicher
                .direktnachricht_aktualisieren(konversation, nachricht_id, content)?;
        self.verteilen(
            KanalSchluessel::aktualisierungen(konversation),
            ChatInhalt::aus_direktnachricht(&nachricht),
        );
        Ok(nachricht)
    }

    /// Direktnachricht weich loeschen (nur der Verfasser)
    pub fn direktnachricht_loeschen(
        &self,
        profil: ProfileId,
        konversation: ConversationId,
        nachricht_id: MessageId,
    ) -> ChatResult<DirektNachricht> {
        let mitglied = self.konversation_zulassen(profil, konversation)?;

        let bestehend = self
            .speicher
            .direktnachricht_laden(konversation, nachricht_id)?;
        if bestehend.mitglied_id != mitglied.id {
            return Err(ChatError::KeineBerechtigung(
                "Nur der Verfasser kann die Nachricht loeschen".into(),
            ));
        }

        let nachricht = self
            .speicher
            .direktnachricht_loeschen(konversation, nachricht_id)?;
        self.verteilen(
            KanalSchluessel::aktualisierungen(konversation),
            ChatInhalt::aus_direktnachricht(&nachricht),
        );
        Ok(nachricht)
    }

    // -----------------------------------------------------------------------
    // Zulassung
    // -----------------------------------------------------------------------

    /// Prueft Server und Mitgliedschaft des Profils
    ///
    /// Nicht-Mitglieder erhalten `KeineBerechtigung`.
    pub fn server_zulassen(&self, profil: ProfileId, server: ServerId) -> ChatResult<Mitglied> {
        self.verzeichnis.server_laden(server)?;
        self.mitglied_pruefen(profil, server)
    }

    /// Wie [`Self::server_zulassen`], zusaetzlich muss der Kanal zum Server gehoeren
    pub fn kanal_zulassen(
        &self,
        profil: ProfileId,
        server: ServerId,
        kanal: ChannelId,
    ) -> ChatResult<Mitglied> {
        self.verzeichnis.server_laden(server)?;
        let kanal_info = self.verzeichnis.kanal_laden(kanal)?;
        if kanal_info.server_id != server {
            return Err(ChatError::KanalNichtGefunden(kanal.to_string()));
        }
        self.mitglied_pruefen(profil, server)
    }

    fn mitglied_pruefen(&self, profil: ProfileId, server: ServerId) -> ChatResult<Mitglied> {
        self.verzeichnis
            .mitglied_finden(server, profil)
            .map_err(|e| match e {
                ChatError::MitgliedNichtGefunden(_) => {
                    ChatError::KeineBerechtigung(format!("Kein Mitglied von {server}"))
                }
                andere => andere,
            })
    }

    // -----------------------------------------------------------------------
    // Intern
    // -----------------------------------------------------------------------

    fn konversation_zulassen(
        &self,
        profil: ProfileId,
        konversation: ConversationId,
    ) -> ChatResult<Mitglied> {
        let k = self.verzeichnis.konversation_laden(konversation, profil)?;
        k.mitglied_fuer(profil)
            .cloned()
            .ok_or_else(|| ChatError::KeineBerechtigung("Nicht Teil der Konversation".into()))
    }

    fn verteilen(&self, schluessel: KanalSchluessel, inhalt: ChatInhalt) {
        let umschlag = Umschlag::chat(schluessel.als_str(), inhalt);
        self.verteiler.an_channel_senden(schluessel, umschlag);
    }
}

fn inhalt_pruefen(content: &str, datei_url: Option<&str>) -> ChatResult<()> {
    let hat_datei = datei_url.map(|u| !u.trim().is_empty()).unwrap_or(false);
    if content.trim().is_empty() && !hat_datei {
        return Err(ChatError::UngueltigeEingabe(
            "Nachrichteninhalt darf nicht leer sein".into(),
        ));
    }

    let zeichen = content.chars().count();
    if zeichen > MAX_INHALT_ZEICHEN {
        return Err(ChatError::UngueltigeEingabe(format!(
            "Nachricht zu lang: {zeichen} Zeichen (Maximum: {MAX_INHALT_ZEICHEN})"
        )));
    }
    Ok(())
}
