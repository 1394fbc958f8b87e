//! Fehlertypen fuer den Signaling-Service

use funkhaus_chat::ChatError;
use funkhaus_core::FunkError;
use funkhaus_protocol::ProtokollFehler;
use funkhaus_voice::MedienFehler;
use thiserror::Error;

/// Fehlertyp fuer den Signaling-Service
#[derive(Debug, Error)]
pub enum SignalingError {
    /// Umschlag nicht dekodierbar oder unbekannter Typ
    #[error("Protokollfehler: {0}")]
    Protokoll(#[from] ProtokollFehler),

    /// Pflichtfeld im Umschlag fehlt oder ist ungueltig
    #[error("Feld fehlt oder ungueltig: {0}")]
    FehlendesFeld(&'static str),

    /// Client hat einen Typ geschickt, den nur der Server sendet
    #[error("Nachrichtentyp nur vom Server erlaubt: {0}")]
    NurVomServer(&'static str),

    #[error("Medienfehler: {0}")]
    Medien(#[from] MedienFehler),

    #[error("Chat-Fehler: {0}")]
    Chat(#[from] ChatError),

    /// Verbindung wurde getrennt
    #[error("Verbindung getrennt")]
    VerbindungGetrennt,

    /// Ausgangs-Queue voll
    #[error("Send-Queue voll: {0}")]
    QueueVoll(String),

    /// Heartbeat oder Schreibfrist abgelaufen
    #[error("Timeout")]
    Timeout,

    /// Interner Fehler
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl SignalingError {
    /// Erstellt einen internen Fehler
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }
}

/// Result-Typ fuer den Signaling-Service
pub type SignalingResult<T> = Result<T, SignalingError>;

impl From<SignalingError> for FunkError {
    fn from(e: SignalingError) -> Self {
        match e {
            SignalingError::Protokoll(p) => p.into(),
            SignalingError::FehlendesFeld(_) | SignalingError::NurVomServer(_) => {
                FunkError::Protokoll(e.to_string())
            }
            SignalingError::Medien(m) => m.into(),
            SignalingError::Chat(c) => c.into(),
            SignalingError::VerbindungGetrennt | SignalingError::Timeout => {
                FunkError::Verbindung(e.to_string())
            }
            SignalingError::QueueVoll(_) => FunkError::Kapazitaet(e.to_string()),
            SignalingError::Intern(msg) => FunkError::Intern(msg),
        }
    }
}
