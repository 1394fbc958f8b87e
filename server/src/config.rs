//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use std::time::Duration;

use funkhaus_signaling::SignalingConfig;
use funkhaus_voice::RouterKonfig;
use serde::{Deserialize, Serialize};

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// WebSocket-Hub
    pub signaling: SignalingEinstellungen,
    /// SFU und Neuverhandlung
    pub voice: VoiceEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
    /// Beispieldaten fuer das In-Memory-Verzeichnis
    pub demo: DemoEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers
    pub name: String,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Funkhaus".into(),
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer HTTP und WebSocket
    pub bind_adresse: String,
    /// Port fuer `/ws`
    pub http_port: u16,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            http_port: 8080,
        }
    }
}

/// Einstellungen des WebSocket-Hubs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingEinstellungen {
    /// Kapazitaet der Send-Queue pro Verbindung
    pub queue_groesse: usize,
    /// Maximale Stille vom Client in Sekunden
    pub pong_wartezeit_sek: u64,
    /// Frist pro Schreibvorgang in Sekunden
    pub schreib_frist_sek: u64,
    /// Maximale Groesse einer eingehenden Nachricht
    pub max_nachricht_bytes: usize,
}

impl Default for SignalingEinstellungen {
    fn default() -> Self {
        let standard = SignalingConfig::default();
        Self {
            queue_groesse: standard.queue_groesse,
            pong_wartezeit_sek: standard.pong_wartezeit.as_secs(),
            schreib_frist_sek: standard.schreib_frist.as_secs(),
            max_nachricht_bytes: standard.max_nachricht_bytes,
        }
    }
}

impl SignalingEinstellungen {
    /// Ping-Intervall ist immer 9/10 der Pong-Wartezeit
    pub fn als_config(&self) -> SignalingConfig {
        let pong_wartezeit = Duration::from_secs(self.pong_wartezeit_sek.max(1));
        SignalingConfig {
            queue_groesse: self.queue_groesse.max(1),
            pong_wartezeit,
            schreib_frist: Duration::from_secs(self.schreib_frist_sek.max(1)),
            ping_intervall: pong_wartezeit * 9 / 10,
            max_nachricht_bytes: self.max_nachricht_bytes,
        }
    }
}

/// SFU-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceEinstellungen {
    /// STUN/TURN-URLs fuer neue Peer-Verbindungen
    pub ice_server: Vec<String>,
    /// Verhandlungsdurchlaeufe bevor neu geplant wird
    pub max_verhandlungsversuche: u32,
    /// Wartezeit bis zum neu geplanten Versuch in Sekunden
    pub neuversuch_verzoegerung_sek: u64,
}

impl Default for VoiceEinstellungen {
    fn default() -> Self {
        let standard = RouterKonfig::default();
        Self {
            ice_server: vec!["stun:stun.l.google.com:19302".into()],
            max_verhandlungsversuche: standard.max_versuche,
            neuversuch_verzoegerung_sek: standard.neuversuch_verzoegerung.as_secs(),
        }
    }
}

impl VoiceEinstellungen {
    pub fn router_konfig(&self) -> RouterKonfig {
        RouterKonfig {
            max_versuche: self.max_verhandlungsversuche.max(1),
            neuversuch_verzoegerung: Duration::from_secs(self.neuversuch_verzoegerung_sek),
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen (Metriken + Health-Check)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Aktiviert den Observability-Server
    pub aktiviert: bool,
    /// Port fuer Metriken und Health (Standard: 9300)
    pub port: u16,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            port: 9300,
        }
    }
}

/// Beispieldaten: ein Server mit Text- und Voice-Kanal
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoEinstellungen {
    pub aktiviert: bool,
    /// Anzeigenamen der anzulegenden Profile; das erste wird Besitzer
    pub profile: Vec<String>,
}

impl Default for DemoEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            profile: vec!["Anna".into(), "Bert".into()],
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Bind-Adresse fuer HTTP und WebSocket
    pub fn http_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.http_port)
    }

    /// Bind-Adresse fuer den Observability-Server
    pub fn observability_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.observability.port)
    }
}
