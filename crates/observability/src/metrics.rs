//! Prometheus-kompatible Metriken fuer Funkhaus
//!
//! Registrierte Metriken:
//! - `funkhaus_connected_clients` – Gauge: Aktuell verbundene Clients
//! - `funkhaus_subscriptions` – Gauge: Aktive Chat-Abonnements
//! - `funkhaus_voice_sessions` – Gauge: Aktive Medien-Sitzungen
//! - `funkhaus_forwarded_tracks` – Gauge: Weitergeleitete Spuren
//! - `funkhaus_forced_disconnects_total` – Counter: Zwangstrennungen (Queue voll)
//! - `funkhaus_renegotiation_passes_total` – Counter: Verhandlungsdurchlaeufe
//! - `funkhaus_http_requests_total` – Counter: HTTP-Anfragen (method, path, status)
//! - `funkhaus_http_request_duration_seconds` – Histogram: HTTP-Antwortzeit
//!
//! Die Zustandswerte werden nicht laufend gepflegt, sondern beim Scrape
//! ueber eine [`StatistikQuelle`] abgefragt.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Zustandswerte zum Zeitpunkt eines Scrapes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Momentaufnahme {
    pub clients: u64,
    pub abonnements: u64,
    pub voice_sitzungen: u64,
    pub spuren: u64,
    pub zwangstrennungen: u64,
    pub verhandlungs_durchlaeufe: u64,
}

/// Liefert die aktuellen Zustandswerte (implementiert vom Server)
#[async_trait]
pub trait StatistikQuelle: Send + Sync + 'static {
    async fn momentaufnahme(&self) -> Momentaufnahme;
}

/// Alle Funkhaus-Prometheus-Metriken
#[derive(Clone)]
pub struct FunkhausMetrics {
    pub registry: Arc<Registry>,

    // Hub / Voice
    pub connected_clients: IntGauge,
    pub subscriptions: IntGauge,
    pub voice_sessions: IntGauge,
    pub forwarded_tracks: IntGauge,
    pub forced_disconnects_total: IntCounter,
    pub renegotiation_passes_total: IntCounter,

    // HTTP-Metriken
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
}

impl FunkhausMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let connected_clients = IntGauge::with_opts(Opts::new(
            "funkhaus_connected_clients",
            "Anzahl aktuell verbundener Clients",
        ))?;
        registry.register(Box::new(connected_clients.clone()))?;

        let subscriptions = IntGauge::with_opts(Opts::new(
            "funkhaus_subscriptions",
            "Anzahl aktiver Chat-Abonnements",
        ))?;
        registry.register(Box::new(subscriptions.clone()))?;

        let voice_sessions = IntGauge::with_opts(Opts::new(
            "funkhaus_voice_sessions",
            "Anzahl aktiver Medien-Sitzungen",
        ))?;
        registry.register(Box::new(voice_sessions.clone()))?;

        let forwarded_tracks = IntGauge::with_opts(Opts::new(
            "funkhaus_forwarded_tracks",
            "Anzahl weitergeleiteter Medienspuren",
        ))?;
        registry.register(Box::new(forwarded_tracks.clone()))?;

        let forced_disconnects_total = IntCounter::with_opts(Opts::new(
            "funkhaus_forced_disconnects_total",
            "Zwangstrennungen wegen voller Send-Queue",
        ))?;
        registry.register(Box::new(forced_disconnects_total.clone()))?;

        let renegotiation_passes_total = IntCounter::with_opts(Opts::new(
            "funkhaus_renegotiation_passes_total",
            "Durchgefuehrte Verhandlungsdurchlaeufe",
        ))?;
        registry.register(Box::new(renegotiation_passes_total.clone()))?;

        let http_requests_total = IntCounterVec::new(
            Opts::new("funkhaus_http_requests_total", "Gesamtanzahl HTTP-Anfragen"),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "funkhaus_http_request_duration_seconds",
                "HTTP-Antwortzeit in Sekunden",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
            &["method", "path"],
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            connected_clients,
            subscriptions,
            voice_sessions,
            forwarded_tracks,
            forced_disconnects_total,
            renegotiation_passes_total,
            http_requests_total,
            http_request_duration_seconds,
        })
    }

    /// Uebernimmt eine Momentaufnahme in die Metriken
    ///
    /// Zaehler werden nur um die Differenz erhoeht und fallen nie.
    pub fn uebernehmen(&self, m: &Momentaufnahme) {
        self.connected_clients.set(gauge_wert(m.clients));
        self.subscriptions.set(gauge_wert(m.abonnements));
        self.voice_sessions.set(gauge_wert(m.voice_sitzungen));
        self.forwarded_tracks.set(gauge_wert(m.spuren));
        nachziehen(&self.forced_disconnects_total, m.zwangstrennungen);
        nachziehen(&self.renegotiation_passes_total, m.verhandlungs_durchlaeufe);
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

fn gauge_wert(wert: u64) -> i64 {
    i64::try_from(wert).unwrap_or(i64::MAX)
}

fn nachziehen(zaehler: &IntCounter, stand: u64) {
    let bisher = zaehler.get();
    if stand > bisher {
        zaehler.inc_by(stand - bisher);
    }
}

#[derive(Clone)]
struct MetrikZustand {
    metriken: FunkhausMetrics,
    quelle: Arc<dyn StatistikQuelle>,
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: FunkhausMetrics, quelle: Arc<dyn StatistikQuelle>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(MetrikZustand { metriken, quelle })
}

async fn metrics_handler(State(zustand): State<MetrikZustand>) -> impl IntoResponse {
    let aufnahme = zustand.quelle.momentaufnahme().await;
    zustand.metriken.uebernehmen(&aufnahme);

    match zustand.metriken.exportieren() {
        Ok(text) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
