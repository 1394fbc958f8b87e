//! Spur-Router – Verteilung eingehender Spuren an alle Sitzungen eines Kanals
//!
//! Der `SpurRouter` verwaltet alle Medien-Sitzungen, gruppiert nach
//! (Server, Kanal), und die Spur-Tabelle je Kanal. Jede eingehende Spur
//! wird genau einmal als geteilte Ausgangsspur registriert und per
//! Neuverhandlung in jede andere Sitzung des Kanals eingehaengt (SFU-Stil).
//!
//! ## Design-Entscheidungen
//! - Voice-Register und Spur-Tabelle liegen hinter einem einzigen
//!   `tokio::sync::RwLock`
//! - Engine-Callbacks fuehren keine Router-Logik aus; Spur- und
//!   Zustandsereignisse einer Sitzung laufen ueber eine Warteschlange und
//!   werden von genau einem Task in Eingangsreihenfolge abgearbeitet
//! - Signaling-Nachrichten gehen ueber [`SignalZustellung`] (nicht blockierend)
//!
//! ## Neuverhandlung
//! Ein Durchlauf gleicht unter der Schreibsperre fuer jede Sitzung der
//! Gruppe die Sender an die Spur-Tabelle an und verschickt ein neues
//! Angebot. Schlaegt ein Durchlauf fehl, wird er bis zu
//! `max_versuche` mal wiederholt; danach folgt ein neuer Versuch nach
//! `neuversuch_verzoegerung`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use funkhaus_core::{ChannelId, ClientId, ServerId};
use funkhaus_protocol::{
    IceKandidat, SitzungsBeschreibung, TeilnehmerEreignis, Teilnehmerliste, Umschlag,
};
use tokio::sync::{mpsc, RwLock};

use crate::error::{MedienFehler, MedienResult};
use crate::peer::{AusgangsSpur, MedienEngine, PeerEreignisse, PeerZustand};
use crate::sitzung::{MedienSitzung, Teilnehmer};

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Maximale Anzahl direkt aufeinanderfolgender Verhandlungsdurchlaeufe
pub const MAX_VERHANDLUNGSVERSUCHE: u32 = 25;

/// Wartezeit bis zum naechsten Versuch, wenn keine Konvergenz erreicht wurde
pub const NEUVERSUCH_VERZOEGERUNG: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct RouterKonfig {
    pub max_versuche: u32,
    pub neuversuch_verzoegerung: Duration,
}

impl Default for RouterKonfig {
    fn default() -> Self {
        Self {
            max_versuche: MAX_VERHANDLUNGSVERSUCHE,
            neuversuch_verzoegerung: NEUVERSUCH_VERZOEGERUNG,
        }
    }
}

// ---------------------------------------------------------------------------
// Zustellung
// ---------------------------------------------------------------------------

/// Ausgehender Signaling-Weg des Routers (implementiert vom Hub)
///
/// Aufrufe duerfen nicht blockieren.
pub trait SignalZustellung: Send + Sync + 'static {
    fn an_client(&self, client: ClientId, umschlag: Umschlag);

    fn an_server(&self, server: ServerId, umschlag: Umschlag);
}

/// Bezug eines Engine-Ereignisses auf genau eine Sitzung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SitzungsBezug {
    pub client: ClientId,
    pub sitzungs_id: u64,
    pub server: ServerId,
    pub kanal: ChannelId,
}

impl SitzungsBezug {
    pub fn von(sitzung: &MedienSitzung) -> Self {
        Self {
            client: sitzung.client_id(),
            sitzungs_id: sitzung.id(),
            server: sitzung.server(),
            kanal: sitzung.kanal(),
        }
    }
}

/// Kennzahlen fuer Metriken
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStatistik {
    pub sitzungen: usize,
    pub spuren: usize,
    pub verhandlungs_durchlaeufe: u64,
}

// ---------------------------------------------------------------------------
// Interner Zustand
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct VerteilteSpur {
    spur: Arc<dyn AusgangsSpur>,
    herausgeber: ClientId,
}

#[derive(Default)]
struct RouterZustand {
    /// Server -> Kanal -> Client -> Sitzung
    voice: HashMap<ServerId, HashMap<ChannelId, HashMap<ClientId, Arc<MedienSitzung>>>>,
    /// Client -> Sitzung (hoechstens eine pro Client)
    sitzungen: HashMap<ClientId, Arc<MedienSitzung>>,
    /// Kanal -> Spur-ID -> geteilte Ausgangsspur
    spuren: HashMap<ChannelId, HashMap<String, VerteilteSpur>>,
}

impl RouterZustand {
    fn einfuegen(&mut self, sitzung: Arc<MedienSitzung>) {
        self.voice
            .entry(sitzung.server())
            .or_default()
            .entry(sitzung.kanal())
            .or_default()
            .insert(sitzung.client_id(), Arc::clone(&sitzung));
        self.sitzungen.insert(sitzung.client_id(), sitzung);
    }

    /// Entfernt die Sitzung eines Clients, optional nur bei passender ID
    ///
    /// Die vom Client veroeffentlichten Spuren verschwinden mit; leere
    /// Gruppen samt Spur-Tabelle werden aufgeraeumt.
    fn entfernen(&mut self, client: ClientId, sitzungs_id: Option<u64>) -> Option<Arc<MedienSitzung>> {
        let passt = self
            .sitzungen
            .get(&client)
            .map(|s| sitzungs_id.map_or(true, |id| s.id() == id))
            .unwrap_or(false);
        if !passt {
            return None;
        }
        let sitzung = self.sitzungen.remove(&client)?;
        let (server, kanal) = (sitzung.server(), sitzung.kanal());

        if let Some(tabelle) = self.spuren.get_mut(&kanal) {
            tabelle.retain(|_, s| s.herausgeber != client);
        }

        if let Some(kanaele) = self.voice.get_mut(&server) {
            let gruppe_leer = match kanaele.get_mut(&kanal) {
                Some(gruppe) => {
                    gruppe.remove(&client);
                    gruppe.is_empty()
                }
                None => false,
            };
            if gruppe_leer {
                kanaele.remove(&kanal);
                self.spuren.remove(&kanal);
                tracing::debug!(server = %server, kanal = %kanal, "Leere Voice-Gruppe entfernt");
            }
            if kanaele.is_empty() {
                self.voice.remove(&server);
            }
        }
        Some(sitzung)
    }

    fn gruppe(&self, server: ServerId, kanal: ChannelId) -> Vec<Arc<MedienSitzung>> {
        self.voice
            .get(&server)
            .and_then(|k| k.get(&kanal))
            .map(|g| g.values().cloned().collect())
            .unwrap_or_default()
    }

    fn spuren_von(&self, kanal: ChannelId) -> Vec<VerteilteSpur> {
        self.spuren
            .get(&kanal)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// SpurRouter
// ---------------------------------------------------------------------------

/// Zentraler Router fuer alle Medien-Sitzungen
///
/// Thread-safe und `Clone`-faehig (innerer Arc).
#[derive(Clone)]
pub struct SpurRouter {
    inner: Arc<RouterInner>,
}

struct RouterInner {
    engine: Arc<dyn MedienEngine>,
    zustellung: Arc<dyn SignalZustellung>,
    konfig: RouterKonfig,
    naechste_id: AtomicU64,
    durchlaeufe: AtomicU64,
    zustand: RwLock<RouterZustand>,
}

impl SpurRouter {
    pub fn neu(
        engine: Arc<dyn MedienEngine>,
        zustellung: Arc<dyn SignalZustellung>,
        konfig: RouterKonfig,
    ) -> Self {
        Self {
            inner: Arc::new(RouterInner {
                engine,
                zustellung,
                konfig,
                naechste_id: AtomicU64::new(1),
                durchlaeufe: AtomicU64::new(0),
                zustand: RwLock::new(RouterZustand::default()),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Beitreten / Verlassen
    // -----------------------------------------------------------------------

    /// Ein Client tritt dem Voice-Kanal bei
    ///
    /// Besteht bereits eine Sitzung fuer denselben Kanal, bleibt sie
    /// erhalten (nur die Stream-ID wird aktualisiert). Bei einem anderen
    /// Kanal wird sie ersetzt.
    pub async fn beitreten(
        &self,
        teilnehmer: Teilnehmer,
        server: ServerId,
        kanal: ChannelId,
    ) -> MedienResult<()> {
        if let Some(bestehend) = self.sitzung_von(teilnehmer.client_id).await {
            if bestehend.server() == server && bestehend.kanal() == kanal {
                bestehend.stream_id_setzen(teilnehmer.stream_id);
                return Ok(());
            }
            return self.kanal_wechseln(teilnehmer, server, kanal).await;
        }
        self.sitzung_anlegen(teilnehmer, server, kanal).await
    }

    /// Vollstaendiger Abbau der bisherigen Sitzung, dann Neuaufbau
    pub async fn kanal_wechseln(
        &self,
        teilnehmer: Teilnehmer,
        server: ServerId,
        kanal: ChannelId,
    ) -> MedienResult<()> {
        self.verlassen(teilnehmer.client_id).await;
        self.sitzung_anlegen(teilnehmer, server, kanal).await
    }

    /// Entfernt die Sitzung eines Clients; `false` wenn keine bestand
    pub async fn verlassen(&self, client: ClientId) -> bool {
        let entfernt = self.inner.zustand.write().await.entfernen(client, None);
        match entfernt {
            Some(sitzung) => {
                self.abbauen(sitzung).await;
                true
            }
            None => false,
        }
    }

    async fn sitzung_anlegen(
        &self,
        teilnehmer: Teilnehmer,
        server: ServerId,
        kanal: ChannelId,
    ) -> MedienResult<()> {
        let client = teilnehmer.client_id;
        let sitzungs_id = self.inner.naechste_id.fetch_add(1, Ordering::Relaxed);
        let ereignisse = Arc::new(SitzungsEreignisse::starten(
            Arc::downgrade(&self.inner),
            SitzungsBezug {
                client,
                sitzungs_id,
                server,
                kanal,
            },
        ));

        let peer = self.inner.engine.peer_erstellen(ereignisse).await?;
        let sitzung = MedienSitzung::neu(sitzungs_id, peer, teilnehmer.clone(), server, kanal);

        let verdraengt = {
            let mut zustand = self.inner.zustand.write().await;
            let alt = zustand.entfernen(client, None);
            zustand.einfuegen(Arc::clone(&sitzung));
            alt
        };
        if let Some(alt) = verdraengt {
            self.abbauen(alt).await;
        }

        tracing::info!(
            client_id = %client,
            server = %server,
            kanal = %kanal,
            sitzung = sitzungs_id,
            "Voice-Kanal beigetreten"
        );
        self.inner.zustellung.an_server(
            server,
            Umschlag::teilnehmer(server, kanal, teilnehmer.als_inhalt(TeilnehmerEreignis::Joined)),
        );
        self.neu_verhandeln_anstossen(server, kanal);
        Ok(())
    }

    /// Schliesst eine bereits aus dem Register entfernte Sitzung
    async fn abbauen(&self, sitzung: Arc<MedienSitzung>) {
        sitzung.schliessen().await;
        let (server, kanal) = (sitzung.server(), sitzung.kanal());

        tracing::info!(
            client_id = %sitzung.client_id(),
            server = %server,
            kanal = %kanal,
            "Voice-Kanal verlassen"
        );
        self.inner.zustellung.an_server(
            server,
            Umschlag::teilnehmer(
                server,
                kanal,
                sitzung.teilnehmer().als_inhalt(TeilnehmerEreignis::Left),
            ),
        );
        self.neu_verhandeln_anstossen(server, kanal);
    }

    // -----------------------------------------------------------------------
    // Verhandlung vom Client
    // -----------------------------------------------------------------------

    pub async fn ice_kandidat_hinzufuegen(
        &self,
        client: ClientId,
        kandidat: IceKandidat,
    ) -> MedienResult<()> {
        let sitzung = self
            .sitzung_von(client)
            .await
            .ok_or_else(|| MedienFehler::KeineSitzung(client.to_string()))?;
        sitzung.ice_kandidat_hinzufuegen(kandidat).await
    }

    /// Antwort des Browsers auf das letzte Angebot
    pub async fn antwort_setzen(
        &self,
        client: ClientId,
        antwort: SitzungsBeschreibung,
    ) -> MedienResult<()> {
        let sitzung = self
            .sitzung_von(client)
            .await
            .ok_or_else(|| MedienFehler::KeineSitzung(client.to_string()))?;
        sitzung.entfernte_beschreibung_setzen(antwort).await
    }

    // -----------------------------------------------------------------------
    // Neuverhandlung
    // -----------------------------------------------------------------------

    /// Bringt alle Sitzungen einer Gruppe auf den Stand der Spur-Tabelle
    ///
    /// Gibt `true` zurueck, wenn ein Durchlauf ohne Fehler und ohne
    /// Entfernung abgeschlossen wurde.
    pub async fn neu_verhandeln(&self, server: ServerId, kanal: ChannelId) -> bool {
        for versuch in 1..=self.inner.konfig.max_versuche {
            self.inner.durchlaeufe.fetch_add(1, Ordering::Relaxed);
            if self.verhandlungs_durchlauf(server, kanal).await {
                self.keyframes_anfordern(server, kanal).await;
                return true;
            }
            tracing::debug!(server = %server, kanal = %kanal, versuch, "Verhandlungsdurchlauf wiederholt");
        }
        false
    }

    /// Startet die Neuverhandlung im Hintergrund
    pub fn neu_verhandeln_anstossen(&self, server: ServerId, kanal: ChannelId) {
        let router = self.clone();
        tokio::spawn(async move {
            while !router.neu_verhandeln(server, kanal).await {
                tracing::warn!(
                    server = %server,
                    kanal = %kanal,
                    "Neuverhandlung nicht konvergiert – neuer Versuch geplant"
                );
                tokio::time::sleep(router.inner.konfig.neuversuch_verzoegerung).await;
            }
        });
    }

    async fn verhandlungs_durchlauf(&self, server: ServerId, kanal: ChannelId) -> bool {
        let mut zustand = self.inner.zustand.write().await;
        let gruppe = zustand.gruppe(server, kanal);
        let spuren = zustand.spuren_von(kanal);

        for sitzung in gruppe {
            let client = sitzung.client_id();

            if sitzung.peer_zustand() == PeerZustand::Geschlossen {
                if let Some(entfernt) = zustand.entfernen(client, Some(sitzung.id())) {
                    entfernt.schliessen().await;
                    tracing::info!(client_id = %client, kanal = %kanal, "Geschlossene Sitzung entfernt");
                    self.inner.zustellung.an_server(
                        server,
                        Umschlag::teilnehmer(
                            server,
                            kanal,
                            entfernt.teilnehmer().als_inhalt(TeilnehmerEreignis::Left),
                        ),
                    );
                }
                return false;
            }

            let soll: Vec<Arc<dyn AusgangsSpur>> = spuren
                .iter()
                .filter(|s| s.herausgeber != client)
                .map(|s| Arc::clone(&s.spur))
                .collect();
            if let Err(e) = sitzung.spuren_abgleichen(&soll).await {
                tracing::warn!(client_id = %client, fehler = %e, "Spurabgleich fehlgeschlagen");
                return false;
            }

            let angebot = match sitzung.angebot_erstellen().await {
                Ok(a) => a,
                Err(e) => {
                    tracing::warn!(client_id = %client, fehler = %e, "Angebot konnte nicht erstellt werden");
                    return false;
                }
            };
            match Umschlag::angebot(server, kanal, &angebot) {
                Ok(umschlag) => self.inner.zustellung.an_client(client, umschlag),
                Err(e) => {
                    tracing::warn!(client_id = %client, fehler = %e, "Angebot nicht kodierbar");
                    return false;
                }
            }
        }
        true
    }

    async fn keyframes_anfordern(&self, server: ServerId, kanal: ChannelId) {
        let gruppe = self.inner.zustand.read().await.gruppe(server, kanal);
        for sitzung in gruppe {
            if let Err(e) = sitzung.keyframe_anfordern().await {
                tracing::debug!(client_id = %sitzung.client_id(), fehler = %e, "PLI fehlgeschlagen");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Engine-Ereignisse
    // -----------------------------------------------------------------------

    /// Registriert eine neue Ausgangsspur in der Spur-Tabelle des Kanals
    ///
    /// Eine vorhandene Spur mit derselben ID wird ersetzt.
    pub async fn spur_empfangen(&self, bezug: SitzungsBezug, spur: Arc<dyn AusgangsSpur>) {
        {
            let mut zustand = self.inner.zustand.write().await;
            let aktiv = zustand
                .sitzungen
                .get(&bezug.client)
                .map(|s| s.id() == bezug.sitzungs_id)
                .unwrap_or(false);
            if !aktiv {
                tracing::debug!(client_id = %bezug.client, spur = spur.id(), "Spur einer beendeten Sitzung ignoriert");
                return;
            }
            tracing::info!(
                client_id = %bezug.client,
                kanal = %bezug.kanal,
                spur = spur.id(),
                stream = spur.stream_id(),
                "Spur registriert"
            );
            zustand.spuren.entry(bezug.kanal).or_default().insert(
                spur.id().to_string(),
                VerteilteSpur {
                    spur,
                    herausgeber: bezug.client,
                },
            );
        }
        self.neu_verhandeln_anstossen(bezug.server, bezug.kanal);
    }

    /// Entfernt eine Spur, deren Weiterleitung beendet ist
    pub async fn spur_beendet(&self, bezug: SitzungsBezug, spur_id: &str) {
        let entfernt = {
            let mut zustand = self.inner.zustand.write().await;
            match zustand.spuren.get_mut(&bezug.kanal) {
                Some(tabelle) => {
                    let gehoert = tabelle
                        .get(spur_id)
                        .map(|s| s.herausgeber == bezug.client)
                        .unwrap_or(false);
                    if gehoert {
                        tabelle.remove(spur_id);
                    }
                    gehoert
                }
                None => false,
            }
        };
        if entfernt {
            tracing::debug!(kanal = %bezug.kanal, spur = spur_id, "Spur entfernt");
            self.neu_verhandeln_anstossen(bezug.server, bezug.kanal);
        }
    }

    /// Reaktion auf Zustandswechsel der nativen Verbindung
    pub async fn peer_zustand_geaendert(&self, bezug: SitzungsBezug, zustand: PeerZustand) {
        match zustand {
            PeerZustand::Fehlgeschlagen => {
                let sitzung = self
                    .sitzung_von(bezug.client)
                    .await
                    .filter(|s| s.id() == bezug.sitzungs_id);
                if let Some(s) = sitzung {
                    tracing::warn!(client_id = %bezug.client, "Peer-Verbindung fehlgeschlagen – Sitzung wird geschlossen");
                    s.schliessen().await;
                }
            }
            PeerZustand::Geschlossen => {
                let entfernt = self
                    .inner
                    .zustand
                    .write()
                    .await
                    .entfernen(bezug.client, Some(bezug.sitzungs_id));
                if let Some(s) = entfernt {
                    self.abbauen(s).await;
                }
            }
            andere => {
                tracing::debug!(client_id = %bezug.client, zustand = ?andere, "Peer-Zustand");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Abfragen
    // -----------------------------------------------------------------------

    pub async fn sitzung_von(&self, client: ClientId) -> Option<Arc<MedienSitzung>> {
        self.inner.zustand.read().await.sitzungen.get(&client).cloned()
    }

    pub async fn sitzungs_anzahl(&self) -> usize {
        self.inner.zustand.read().await.sitzungen.len()
    }

    pub async fn teilnehmer_anzahl(&self, server: ServerId, kanal: ChannelId) -> usize {
        self.inner.zustand.read().await.gruppe(server, kanal).len()
    }

    pub async fn spuren_anzahl(&self, kanal: ChannelId) -> usize {
        self.inner
            .zustand
            .read()
            .await
            .spuren
            .get(&kanal)
            .map(|t| t.len())
            .unwrap_or(0)
    }

    /// Alle Voice-Teilnehmer eines Servers, gruppiert nach Kanal
    pub async fn teilnehmerliste(&self, server: ServerId) -> Teilnehmerliste {
        let zustand = self.inner.zustand.read().await;
        let mut liste = Teilnehmerliste::default();
        if let Some(kanaele) = zustand.voice.get(&server) {
            for (kanal, gruppe) in kanaele {
                for sitzung in gruppe.values() {
                    liste.hinzufuegen(
                        *kanal,
                        sitzung.teilnehmer().als_inhalt(TeilnehmerEreignis::Joined),
                    );
                }
            }
        }
        liste
    }

    pub async fn statistik(&self) -> RouterStatistik {
        let zustand = self.inner.zustand.read().await;
        RouterStatistik {
            sitzungen: zustand.sitzungen.len(),
            spuren: zustand.spuren.values().map(|t| t.len()).sum(),
            verhandlungs_durchlaeufe: self.inner.durchlaeufe.load(Ordering::Relaxed),
        }
    }
}

// ---------------------------------------------------------------------------
// Ereignisse einer Sitzung
// ---------------------------------------------------------------------------

enum SitzungsEreignis {
    SpurEmpfangen(Arc<dyn AusgangsSpur>),
    SpurBeendet(String),
    Zustand(PeerZustand),
}

/// Leitet Engine-Callbacks einer Sitzung an den Router weiter
///
/// Ein `SpurBeendet` wird erst verarbeitet, nachdem das vorausgehende
/// `SpurEmpfangen` derselben Sitzung abgeschlossen ist.
struct SitzungsEreignisse {
    router: Weak<RouterInner>,
    bezug: SitzungsBezug,
    tx: mpsc::UnboundedSender<SitzungsEreignis>,
}

impl SitzungsEreignisse {
    /// Startet den Abarbeitungs-Task; er endet, sobald der Empfaenger
    /// der Engine verworfen wird
    fn starten(router: Weak<RouterInner>, bezug: SitzungsBezug) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let schwach = router.clone();
        tokio::spawn(async move {
            while let Some(ereignis) = rx.recv().await {
                let Some(inner) = schwach.upgrade() else { break };
                let router = SpurRouter { inner };
                match ereignis {
                    SitzungsEreignis::SpurEmpfangen(spur) => router.spur_empfangen(bezug, spur).await,
                    SitzungsEreignis::SpurBeendet(id) => router.spur_beendet(bezug, &id).await,
                    SitzungsEreignis::Zustand(z) => router.peer_zustand_geaendert(bezug, z).await,
                }
            }
        });
        Self { router, bezug, tx }
    }

    fn router(&self) -> Option<SpurRouter> {
        self.router.upgrade().map(|inner| SpurRouter { inner })
    }

    fn einreihen(&self, ereignis: SitzungsEreignis) {
        if self.tx.send(ereignis).is_err() {
            tracing::debug!(client_id = %self.bezug.client, "Ereignis nach Router-Ende verworfen");
        }
    }
}

impl PeerEreignisse for SitzungsEreignisse {
    fn ice_kandidat_gefunden(&self, kandidat: IceKandidat) {
        let Some(router) = self.router() else { return };
        match Umschlag::kandidat(self.bezug.server, self.bezug.kanal, &kandidat) {
            Ok(umschlag) => router.inner.zustellung.an_client(self.bezug.client, umschlag),
            Err(e) => tracing::warn!(fehler = %e, "ICE-Kandidat nicht kodierbar"),
        }
    }

    fn spur_empfangen(&self, spur: Arc<dyn AusgangsSpur>) {
        self.einreihen(SitzungsEreignis::SpurEmpfangen(spur));
    }

    fn spur_beendet(&self, spur_id: &str) {
        self.einreihen(SitzungsEreignis::SpurBeendet(spur_id.to_string()));
    }

    fn zustand_geaendert(&self, zustand: PeerZustand) {
        self.einreihen(SitzungsEreignis::Zustand(zustand));
    }
}
