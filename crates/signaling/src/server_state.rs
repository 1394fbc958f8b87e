//! Gemeinsamer Server-Zustand fuer den Signaling-Service
//!
//! Haelt alle geteilten Services als Arc-Referenzen, die sicher zwischen
//! tokio-Tasks geteilt werden koennen.

use std::sync::Arc;
use std::time::{Duration, Instant};

use funkhaus_chat::{ChatService, NachrichtenSpeicher, Verzeichnis};
use funkhaus_voice::{MedienEngine, RouterKonfig};
use tokio::sync::watch;

use crate::broadcast::SEND_QUEUE_GROESSE;
use crate::hub::Hub;

/// Konfiguration fuer den Signaling-Service
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Kapazitaet der Send-Queue pro Verbindung
    pub queue_groesse: usize,
    /// Maximale Stille vom Client bis zur Trennung
    pub pong_wartezeit: Duration,
    /// Frist fuer einen einzelnen Schreibvorgang
    pub schreib_frist: Duration,
    /// Ping-Intervall; muss kleiner als `pong_wartezeit` sein
    pub ping_intervall: Duration,
    /// Maximale Groesse einer eingehenden Nachricht in Bytes
    pub max_nachricht_bytes: usize,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        let pong_wartezeit = Duration::from_secs(60);
        Self {
            queue_groesse: SEND_QUEUE_GROESSE,
            pong_wartezeit,
            schreib_frist: Duration::from_secs(10),
            ping_intervall: pong_wartezeit * 9 / 10,
            max_nachricht_bytes: 64 * 1024,
        }
    }
}

/// Gemeinsamer Server-Zustand (thread-safe, Arc-geteilt)
pub struct SignalingState {
    pub config: Arc<SignalingConfig>,
    pub hub: Hub,
    pub verzeichnis: Arc<dyn Verzeichnis>,
    pub chat_service: Arc<ChatService>,
    /// Startzeitpunkt
    pub start_time: Instant,
    shutdown_tx: watch::Sender<bool>,
}

impl SignalingState {
    /// Baut Hub, Router und Chat-Service auf
    ///
    /// Muss innerhalb einer Tokio-Runtime aufgerufen werden, da der
    /// Register-Task sofort startet.
    pub fn neu(
        config: SignalingConfig,
        engine: Arc<dyn MedienEngine>,
        router_konfig: RouterKonfig,
        verzeichnis: Arc<dyn Verzeichnis>,
        speicher: Arc<dyn NachrichtenSpeicher>,
    ) -> Arc<Self> {
        let hub = Hub::neu(engine, router_konfig, config.queue_groesse);
        let chat_service = ChatService::neu(Arc::clone(&verzeichnis), speicher, hub.verteiler());
        let (shutdown_tx, _) = watch::channel(false);
        Arc::new(Self {
            config: Arc::new(config),
            hub,
            verzeichnis,
            chat_service,
            start_time: Instant::now(),
            shutdown_tx,
        })
    }

    /// Empfaenger fuer das Shutdown-Signal
    pub fn shutdown_empfaenger(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Signalisiert allen Verbindungen das Herunterfahren
    pub fn herunterfahren(&self) {
        self.shutdown_tx.send_replace(true);
    }

    pub fn uptime_sekunden(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
