//! Fehlertypen fuer Medien-Sitzungen und den Spur-Router

use funkhaus_core::FunkError;
use funkhaus_protocol::ProtokollFehler;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MedienFehler {
    /// Die Sitzung wurde bereits geschlossen
    #[error("Medien-Sitzung geschlossen")]
    Geschlossen,

    /// Der Client besitzt keine Medien-Sitzung
    #[error("Keine Medien-Sitzung fuer Client {0}")]
    KeineSitzung(String),

    /// Fehler der nativen WebRTC-Engine
    #[error("WebRTC-Fehler: {0}")]
    Native(String),

    #[error("Ungueltige Sitzungsbeschreibung: {0}")]
    Beschreibung(String),

    #[error(transparent)]
    Protokoll(#[from] ProtokollFehler),
}

pub type MedienResult<T> = Result<T, MedienFehler>;

impl MedienFehler {
    pub fn native(e: impl std::fmt::Display) -> Self {
        Self::Native(e.to_string())
    }
}

impl From<MedienFehler> for FunkError {
    fn from(e: MedienFehler) -> Self {
        match e {
            MedienFehler::Geschlossen | MedienFehler::Native(_) => {
                FunkError::Verbindung(e.to_string())
            }
            MedienFehler::KeineSitzung(_) => FunkError::NichtGefunden(e.to_string()),
            MedienFehler::Beschreibung(_) => FunkError::Ungueltig(e.to_string()),
            MedienFehler::Protokoll(p) => p.into(),
        }
    }
}
