//! Fehlertypen fuer das Dekodieren und Kodieren von Umschlaegen

use funkhaus_core::FunkError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtokollFehler {
    /// Kein gueltiges JSON oder Pflichtfeld fehlt
    #[error("Ungueltiger Umschlag: {0}")]
    Ungueltig(#[from] serde_json::Error),

    /// `type` ist keinem bekannten Nachrichtentyp zugeordnet
    #[error("Unbekannter Nachrichtentyp: {0}")]
    UnbekannterTyp(String),

    /// `content` passt nicht zur Variante des Nachrichtentyps
    #[error("Inhalt passt nicht zu '{typ}': {grund}")]
    FalscherInhalt { typ: &'static str, grund: String },
}

pub type ProtokollResult<T> = Result<T, ProtokollFehler>;

impl From<ProtokollFehler> for FunkError {
    fn from(e: ProtokollFehler) -> Self {
        FunkError::Protokoll(e.to_string())
    }
}
