//! Schnittstellen zur externen CRUD-Schicht
//!
//! Funkhaus speichert weder Profile noch Nachrichten. Alle Nachschlage-
//! und Schreibvorgaenge laufen ueber diese beiden Traits; sie liefern
//! synchron entweder den Datensatz oder einen Fehler, bevor der Kern die
//! zugehoerige Chat- oder Voice-Aktion zulaesst.

use funkhaus_core::models::{
    DirektNachricht, KanalInfo, Konversation, Mitglied, Nachricht, Profil, ServerInfo,
};
use funkhaus_core::{ChannelId, ConversationId, MessageId, ProfileId, ServerId};

use crate::error::ChatResult;

/// Nachschlagen von Profilen, Servern, Kanaelen und Mitgliedschaften
pub trait Verzeichnis: Send + Sync {
    fn profil_laden(&self, profil: ProfileId) -> ChatResult<Profil>;

    fn server_laden(&self, server: ServerId) -> ChatResult<ServerInfo>;

    fn kanal_laden(&self, kanal: ChannelId) -> ChatResult<KanalInfo>;

    /// Mitglied eines Profils innerhalb eines Servers
    fn mitglied_finden(&self, server: ServerId, profil: ProfileId) -> ChatResult<Mitglied>;

    /// Konversation, an der `profil` beteiligt ist
    fn konversation_laden(
        &self,
        konversation: ConversationId,
        profil: ProfileId,
    ) -> ChatResult<Konversation>;
}

/// Neue Nachricht bevor sie gespeichert ist
#[derive(Debug, Clone)]
pub struct NeueNachricht<'a> {
    pub mitglied: &'a Mitglied,
    pub content: &'a str,
    pub datei_url: Option<&'a str>,
}

/// Persistenz von Kanal- und Direktnachrichten
pub trait NachrichtenSpeicher: Send + Sync {
    fn nachricht_erstellen(&self, kanal: ChannelId, neu: NeueNachricht<'_>)
        -> ChatResult<Nachricht>;

    /// Nicht geloeschte Nachricht eines Kanals
    fn nachricht_laden(&self, kanal: ChannelId, id: MessageId) -> ChatResult<Nachricht>;

    fn nachricht_aktualisieren(
        &self,
        kanal: ChannelId,
        id: MessageId,
        content: &str,
    ) -> ChatResult<Nachricht>;

    /// Weiches Loeschen: Inhalt ersetzt, Datei entfernt, `deleted` gesetzt
    fn nachricht_loeschen(&self, kanal: ChannelId, id: MessageId) -> ChatResult<Nachricht>;

    fn direktnachricht_erstellen(
        &self,
        konversation: ConversationId,
        neu: NeueNachricht<'_>,
    ) -> ChatResult<DirektNachricht>;

    fn direktnachricht_laden(
        &self,
        konversation: ConversationId,
        id: MessageId,
    ) -> ChatResult<DirektNachricht>;

    fn direktnachricht_aktualisieren(
        &self,
        konversation: ConversationId,
        id: MessageId,
        content: &str,
    ) -> ChatResult<DirektNachricht>;

    fn direktnachricht_loeschen(
        &self,
        konversation: ConversationId,
        id: MessageId,
    ) -> ChatResult<DirektNachricht>;
}

/// Ersatzinhalt weich geloeschter Nachrichten
pub const GELOESCHT_INHALT: &str = "This message has been deleted.";

