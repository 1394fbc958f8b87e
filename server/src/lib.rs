//! funkhaus-server – Bibliotheks-Root
//!
//! Baut Verzeichnis, Media-Engine und Hub zusammen und stellt den
//! oeffentlichen Einstiegspunkt fuer Integrationstests bereit.

pub mod config;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use config::{DemoEinstellungen, ServerConfig};
use funkhaus_chat::InMemoryVerzeichnis;
use funkhaus_core::models::{KanalTyp, MitgliedsRolle, Profil, ServerInfo};
use funkhaus_observability::{
    observability_router, request_timing_layer, FunkhausMetrics, HealthState, Momentaufnahme,
    StatistikQuelle,
};
use funkhaus_signaling::{ws_router, SignalingState};
use funkhaus_voice::WebRtcEngine;
use tokio::net::TcpListener;

/// Liefert Hub- und Router-Zahlen an den Metrik-Endpunkt
pub struct HubStatistik(pub Arc<SignalingState>);

#[async_trait]
impl StatistikQuelle for HubStatistik {
    async fn momentaufnahme(&self) -> Momentaufnahme {
        let register = self.0.hub.statistik().await;
        let router = self.0.hub.router().statistik().await;
        Momentaufnahme {
            clients: register.clients as u64,
            abonnements: register.abonnements as u64,
            voice_sitzungen: router.sitzungen as u64,
            spuren: router.spuren as u64,
            zwangstrennungen: register.zwangstrennungen,
            verhandlungs_durchlaeufe: router.verhandlungs_durchlaeufe,
        }
    }
}

/// Legt einen Beispielserver mit Text- und Voice-Kanal an
///
/// Das erste Profil wird Besitzer, alle weiteren Gaeste.
pub fn demo_befuellen(
    verzeichnis: &InMemoryVerzeichnis,
    demo: &DemoEinstellungen,
) -> Option<(ServerInfo, Vec<Profil>)> {
    let mut namen = demo.profile.iter();
    let besitzer_name = namen.next()?;

    let besitzer = verzeichnis.profil_anlegen(besitzer_name, "");
    let server = verzeichnis.server_anlegen("Funkhaus", besitzer.id);
    let text = verzeichnis.kanal_anlegen(server.id, "allgemein", KanalTyp::Text);
    let voice = verzeichnis.kanal_anlegen(server.id, "Lounge", KanalTyp::Audio);
    tracing::info!(
        server_id = %server.id,
        textkanal = %text.id,
        voicekanal = %voice.id,
        "Demo-Server angelegt"
    );
    tracing::info!(name = %besitzer.name, profil_id = %besitzer.id, "Demo-Profil (Admin)");

    let mut profile = vec![besitzer];
    for name in namen {
        let profil = verzeichnis.profil_anlegen(name, "");
        verzeichnis.mitglied_hinzufuegen(server.id, profil.id, MitgliedsRolle::Guest);
        tracing::info!(name = %profil.name, profil_id = %profil.id, "Demo-Profil (Gast)");
        profile.push(profil);
    }
    Some((server, profile))
}

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Server-Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Media-Engine und Verzeichnis erstellen
    /// 2. Hub und Chat-Service aufbauen
    /// 3. Observability-Server starten (falls aktiviert)
    /// 4. `/ws` bedienen bis Ctrl-C
    pub async fn starten(self) -> Result<()> {
        tracing::info!(
            server_name = %self.config.server.name,
            http = %self.config.http_bind_adresse(),
            ice_server = ?self.config.voice.ice_server,
            "Server startet"
        );

        let engine = Arc::new(WebRtcEngine::neu(self.config.voice.ice_server.clone())?);
        let verzeichnis = Arc::new(InMemoryVerzeichnis::neu());
        if self.config.demo.aktiviert {
            let _ = demo_befuellen(&verzeichnis, &self.config.demo);
        }

        let state = SignalingState::neu(
            self.config.signaling.als_config(),
            engine,
            self.config.voice.router_konfig(),
            verzeichnis.clone(),
            verzeichnis,
        );

        let health = HealthState::neu();
        if self.config.observability.aktiviert {
            let metriken = FunkhausMetrics::neu()?;
            let quelle = Arc::new(HubStatistik(Arc::clone(&state)));
            let app = observability_router(metriken, quelle, health.clone());
            let adresse = self.config.observability_bind_adresse();
            let listener = TcpListener::bind(&adresse).await?;
            tracing::info!(adresse = %adresse, "Observability-Server bereit (/metrics, /health)");
            tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, app).await {
                    tracing::error!("Observability-Server beendet: {e}");
                }
            });
        }

        let app = ws_router(Arc::clone(&state)).layer(request_timing_layer());
        let adresse = self.config.http_bind_adresse();
        let listener = TcpListener::bind(&adresse).await?;
        tracing::info!(adresse = %adresse, "WebSocket-Endpunkt bereit (/ws)");

        let shutdown_state = Arc::clone(&state);
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Ctrl-C-Handler fehlgeschlagen: {e}");
                }
                tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
                health.herunterfahren_markieren();
                shutdown_state.herunterfahren();
            })
            .await?;

        tracing::info!(
            uptime_sekunden = state.uptime_sekunden(),
            "Server beendet"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use funkhaus_chat::Verzeichnis;

    #[test]
    fn demo_legt_besitzer_und_gaeste_an() {
        let verzeichnis = InMemoryVerzeichnis::neu();
        let (server, profile) =
            demo_befuellen(&verzeichnis, &DemoEinstellungen::default()).unwrap();
        assert_eq!(profile.len(), 2);

        let admin = verzeichnis.mitglied_finden(server.id, profile[0].id).unwrap();
        assert_eq!(admin.role, MitgliedsRolle::Admin);
        let gast = verzeichnis.mitglied_finden(server.id, profile[1].id).unwrap();
        assert_eq!(gast.role, MitgliedsRolle::Guest);
        assert!(verzeichnis.profil_laden(profile[1].id).is_ok());
    }

    #[test]
    fn demo_ohne_profile_legt_nichts_an() {
        let verzeichnis = InMemoryVerzeichnis::neu();
        let demo = DemoEinstellungen {
            aktiviert: true,
            profile: Vec::new(),
        };
        assert!(demo_befuellen(&verzeichnis, &demo).is_none());
    }

    #[tokio::test]
    async fn hub_statistik_ohne_verbindungen_ist_leer() {
        let verzeichnis = Arc::new(InMemoryVerzeichnis::neu());
        let engine = Arc::new(WebRtcEngine::neu(Vec::new()).unwrap());
        let state = SignalingState::neu(
            ServerConfig::default().signaling.als_config(),
            engine,
            ServerConfig::default().voice.router_konfig(),
            verzeichnis.clone(),
            verzeichnis,
        );

        let aufnahme = HubStatistik(state).momentaufnahme().await;
        assert_eq!(aufnahme, Momentaufnahme::default());
    }

    #[tokio::test]
    async fn hub_statistik_zaehlt_clients() {
        let verzeichnis = Arc::new(InMemoryVerzeichnis::neu());
        let engine = Arc::new(WebRtcEngine::neu(Vec::new()).unwrap());
        let state = SignalingState::neu(
            ServerConfig::default().signaling.als_config(),
            engine,
            ServerConfig::default().voice.router_konfig(),
            verzeichnis.clone(),
            verzeichnis,
        );
        let _rx = state.hub.registrieren(funkhaus_core::ClientId::new());

        let aufnahme = HubStatistik(Arc::clone(&state)).momentaufnahme().await;
        assert_eq!(aufnahme.clients, 1);
        assert_eq!(aufnahme.voice_sitzungen, 0);
    }
}
