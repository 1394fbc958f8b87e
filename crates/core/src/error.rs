//! Fehlertypen fuer Funkhaus
//!
//! Zentraler Fehler-Enum fuer das Echtzeit-Subsystem. Die Crates
//! `chat`, `voice` und `signaling` definieren eigene Fehler und
//! konvertieren via `From` in diese Taxonomie.
//!
//! Kein Fehler dieser Taxonomie ist fuer den Prozess fatal: er beendet
//! hoechstens die betroffene Verbindung oder Medien-Sitzung.

use thiserror::Error;

/// Globaler Result-Alias fuer Funkhaus
pub type Result<T> = std::result::Result<T, FunkError>;

/// Alle Fehlerklassen des Echtzeit-Kerns
#[derive(Debug, Error)]
pub enum FunkError {
    /// Aktion eines Nicht-Mitglieds oder Nicht-Verfassers
    #[error("Zugriff verweigert: {0}")]
    Autorisierung(String),

    /// Server, Kanal, Mitglied oder Nachricht existiert nicht
    #[error("Nicht gefunden: {0}")]
    NichtGefunden(String),

    /// Fehlerhafter oder unbekannter Umschlag
    #[error("Protokollfehler: {0}")]
    Protokoll(String),

    /// Socket- oder Verhandlungsfehler
    #[error("Verbindungsfehler: {0}")]
    Verbindung(String),

    /// Ausgangs-Queue uebergelaufen
    #[error("Kapazitaet erschoepft: {0}")]
    Kapazitaet(String),

    /// Ungueltige Eingabe (z.B. leerer Nachrichteninhalt)
    #[error("Ungueltige Eingabe: {0}")]
    Ungueltig(String),

    #[error("Interner Fehler: {0}")]
    Intern(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl FunkError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    pub fn nicht_gefunden(was: impl Into<String>) -> Self {
        Self::NichtGefunden(was.into())
    }

    pub fn autorisierung(msg: impl Into<String>) -> Self {
        Self::Autorisierung(msg.into())
    }

    /// Gibt true zurueck wenn der Fehler die Verbindung beenden muss
    ///
    /// Kapazitaetsfehler werden wie Verbindungsfehler behandelt
    /// (erzwungene Trennung).
    pub fn trennt_verbindung(&self) -> bool {
        matches!(self, Self::Verbindung(_) | Self::Kapazitaet(_))
    }
}
