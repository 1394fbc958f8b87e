//! Fehlertypen fuer das Chat-Crate

use funkhaus_core::FunkError;
use thiserror::Error;

/// Chat-Fehlertypen
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Server nicht gefunden: {0}")]
    ServerNichtGefunden(String),

    #[error("Kanal nicht gefunden: {0}")]
    KanalNichtGefunden(String),

    #[error("Konversation nicht gefunden: {0}")]
    KonversationNichtGefunden(String),

    #[error("Mitglied nicht gefunden: {0}")]
    MitgliedNichtGefunden(String),

    #[error("Nachricht nicht gefunden: {0}")]
    NachrichtNichtGefunden(String),

    #[error("Keine Berechtigung: {0}")]
    KeineBerechtigung(String),

    #[error("Ungueltige Eingabe: {0}")]
    UngueltigeEingabe(String),

    /// Fehler des externen Speichers
    #[error("Speicher-Fehler: {0}")]
    SpeicherFehler(String),
}

pub type ChatResult<T> = Result<T, ChatError>;

impl From<ChatError> for FunkError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::ServerNichtGefunden(_)
            | ChatError::KanalNichtGefunden(_)
            | ChatError::KonversationNichtGefunden(_)
            | ChatError::MitgliedNichtGefunden(_)
            | ChatError::NachrichtNichtGefunden(_) => FunkError::NichtGefunden(e.to_string()),
            ChatError::KeineBerechtigung(_) => FunkError::Autorisierung(e.to_string()),
            ChatError::UngueltigeEingabe(_) => FunkError::Ungueltig(e.to_string()),
            ChatError::SpeicherFehler(_) => FunkError::Intern(e.to_string()),
        }
    }
}
