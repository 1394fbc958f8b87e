//! Hub-Register – Abonnements, Server-Publikum und Send-Queues
//!
//! Ein einzelner Task besitzt alle drei Tabellen (Schluessel -> Clients,
//! Server -> Clients, Client -> Send-Queue) und arbeitet die Befehle aus
//! einer unbegrenzten Befehls-Queue der Reihe nach ab. Dadurch blockiert
//! kein Aufrufer, auch nicht aus synchronem Code.
//!
//! ## Gegendruck
//! Jede Verbindung hat eine begrenzte Send-Queue. Ist sie beim Verteilen
//! voll, wird der Client sofort zwangsgetrennt: sein Sender wird
//! verworfen (die Schreib-Pumpe schliesst den Socket), er verschwindet
//! aus allen Tabellen und seine Voice-Sitzung wird abgebaut.
//!
//! Nachrichten werden pro Verteilung genau einmal kodiert und als
//! `Arc<str>` an alle Ziele weitergereicht.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use funkhaus_chat::EreignisVerteiler;
use funkhaus_core::{ClientId, KanalSchluessel, ServerId};
use funkhaus_protocol::Umschlag;
use funkhaus_voice::SignalZustellung;
use tokio::sync::{mpsc, oneshot};

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Standardgroesse der Send-Queue pro Client
pub const SEND_QUEUE_GROESSE: usize = 64;

// ---------------------------------------------------------------------------
// ClientSender
// ---------------------------------------------------------------------------

/// Ergebnis eines nicht-blockierenden Sendeversuchs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zustellung {
    Eingereiht,
    QueueVoll,
    Geschlossen,
}

/// Handle auf die Send-Queue eines verbundenen Clients
#[derive(Clone, Debug)]
pub struct ClientSender {
    pub client_id: ClientId,
    tx: mpsc::Sender<Arc<str>>,
}

impl ClientSender {
    pub fn neu(client_id: ClientId, tx: mpsc::Sender<Arc<str>>) -> Self {
        Self { client_id, tx }
    }

    /// Reiht eine kodierte Nachricht nicht-blockierend ein
    pub fn senden(&self, nachricht: Arc<str>) -> Zustellung {
        match self.tx.try_send(nachricht) {
            Ok(()) => Zustellung::Eingereiht,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(client_id = %self.client_id, "Send-Queue voll – Client wird getrennt");
                Zustellung::QueueVoll
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(client_id = %self.client_id, "Send-Queue geschlossen (Client getrennt)");
                Zustellung::Geschlossen
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Voice-Abmeldung
// ---------------------------------------------------------------------------

/// Baut die Voice-Sitzung eines zwangsgetrennten Clients ab
///
/// Wird aus dem Register-Task heraus aufgerufen und darf daher nicht
/// blockieren; Implementierungen starten den Abbau als eigenen Task.
pub trait VoiceAbmeldung: Send + Sync + 'static {
    fn voice_abmelden(&self, client: ClientId);
}

// ---------------------------------------------------------------------------
// Befehle
// ---------------------------------------------------------------------------

/// Zaehlerstaende des Registers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterStatistik {
    pub clients: usize,
    pub abonnements: usize,
    pub server_publikum: usize,
    pub zwangstrennungen: u64,
}

enum Befehl {
    Registrieren(ClientSender),
    Abmelden(ClientId),
    Abonnieren(ClientId, KanalSchluessel),
    Abbestellen(ClientId, KanalSchluessel),
    ServerBeitreten(ClientId, ServerId),
    AnChannel(KanalSchluessel, Arc<str>),
    AnServer(ServerId, Arc<str>),
    AnClient(ClientId, Arc<str>),
    Abonnenten(KanalSchluessel, oneshot::Sender<Vec<ClientId>>),
    Publikum(ServerId, oneshot::Sender<Vec<ClientId>>),
    IstRegistriert(ClientId, oneshot::Sender<bool>),
    Statistik(oneshot::Sender<RegisterStatistik>),
}

// ---------------------------------------------------------------------------
// RegisterHandle
// ---------------------------------------------------------------------------

/// Clone-faehiger Zugang zum Register-Task
///
/// Alle Methoden reihen nur einen Befehl ein und kehren sofort zurueck.
/// Abfragen laufen durch dieselbe Queue und sehen daher alle vorher
/// eingereihten Befehle.
#[derive(Clone)]
pub struct RegisterHandle {
    tx: mpsc::UnboundedSender<Befehl>,
    zwangstrennungen: Arc<AtomicU64>,
}

/// Noch nicht gestarteter Register-Task
pub struct RegisterSchleife {
    rx: mpsc::UnboundedReceiver<Befehl>,
    zwangstrennungen: Arc<AtomicU64>,
}

impl RegisterHandle {
    /// Erzeugt Handle und Schleife; die Schleife wird erst mit
    /// [`RegisterSchleife::starten`] lebendig
    pub fn neu() -> (Self, RegisterSchleife) {
        let (tx, rx) = mpsc::unbounded_channel();
        let zwangstrennungen = Arc::new(AtomicU64::new(0));
        (
            Self {
                tx,
                zwangstrennungen: Arc::clone(&zwangstrennungen),
            },
            RegisterSchleife {
                rx,
                zwangstrennungen,
            },
        )
    }

    fn befehl(&self, befehl: Befehl) {
        if self.tx.send(befehl).is_err() {
            tracing::warn!("Hub-Register beendet – Befehl verworfen");
        }
    }

    pub fn registrieren(&self, sender: ClientSender) {
        self.befehl(Befehl::Registrieren(sender));
    }

    pub fn abmelden(&self, client: ClientId) {
        self.befehl(Befehl::Abmelden(client));
    }

    pub fn abonnieren(&self, client: ClientId, schluessel: KanalSchluessel) {
        self.befehl(Befehl::Abonnieren(client, schluessel));
    }

    pub fn abbestellen(&self, client: ClientId, schluessel: KanalSchluessel) {
        self.befehl(Befehl::Abbestellen(client, schluessel));
    }

    pub fn server_beitreten(&self, client: ClientId, server: ServerId) {
        self.befehl(Befehl::ServerBeitreten(client, server));
    }

    pub fn an_channel(&self, schluessel: KanalSchluessel, umschlag: &Umschlag) {
        if let Some(text) = kodieren(umschlag) {
            self.befehl(Befehl::AnChannel(schluessel, text));
        }
    }

    pub fn an_server(&self, server: ServerId, umschlag: &Umschlag) {
        if let Some(text) = kodieren(umschlag) {
            self.befehl(Befehl::AnServer(server, text));
        }
    }

    pub fn an_client(&self, client: ClientId, umschlag: &Umschlag) {
        if let Some(text) = kodieren(umschlag) {
            self.befehl(Befehl::AnClient(client, text));
        }
    }

    pub async fn abonnenten(&self, schluessel: KanalSchluessel) -> Vec<ClientId> {
        let (tx, rx) = oneshot::channel();
        self.befehl(Befehl::Abonnenten(schluessel, tx));
        rx.await.unwrap_or_default()
    }

    pub async fn publikum(&self, server: ServerId) -> Vec<ClientId> {
        let (tx, rx) = oneshot::channel();
        self.befehl(Befehl::Publikum(server, tx));
        rx.await.unwrap_or_default()
    }

    pub async fn ist_registriert(&self, client: ClientId) -> bool {
        let (tx, rx) = oneshot::channel();
        self.befehl(Befehl::IstRegistriert(client, tx));
        rx.await.unwrap_or(false)
    }

    pub async fn statistik(&self) -> RegisterStatistik {
        let (tx, rx) = oneshot::channel();
        self.befehl(Befehl::Statistik(tx));
        rx.await.unwrap_or_default()
    }

    /// Anzahl Zwangstrennungen seit dem Start (ohne Umweg ueber den Task)
    pub fn zwangstrennungen(&self) -> u64 {
        self.zwangstrennungen.load(Ordering::Relaxed)
    }
}

fn kodieren(umschlag: &Umschlag) -> Option<Arc<str>> {
    match umschlag.kodieren() {
        Ok(text) => Some(Arc::from(text)),
        Err(e) => {
            tracing::warn!(typ = %umschlag.typ, fehler = %e, "Umschlag nicht kodierbar – verworfen");
            None
        }
    }
}

impl SignalZustellung for RegisterHandle {
    fn an_client(&self, client: ClientId, umschlag: Umschlag) {
        RegisterHandle::an_client(self, client, &umschlag);
    }

    fn an_server(&self, server: ServerId, umschlag: Umschlag) {
        RegisterHandle::an_server(self, server, &umschlag);
    }
}

impl EreignisVerteiler for RegisterHandle {
    fn an_channel_senden(&self, schluessel: KanalSchluessel, umschlag: Umschlag) {
        self.an_channel(schluessel, &umschlag);
    }
}

// ---------------------------------------------------------------------------
// Register-Task
// ---------------------------------------------------------------------------

struct Register {
    clients: HashMap<ClientId, ClientSender>,
    abos: HashMap<KanalSchluessel, HashSet<ClientId>>,
    publikum: HashMap<ServerId, HashSet<ClientId>>,
    voice: Arc<dyn VoiceAbmeldung>,
    zwangstrennungen: Arc<AtomicU64>,
}

impl RegisterSchleife {
    /// Startet den Register-Task; er endet, wenn alle Handles verworfen sind
    pub fn starten(self, voice: Arc<dyn VoiceAbmeldung>) -> tokio::task::JoinHandle<()> {
        let RegisterSchleife {
            mut rx,
            zwangstrennungen,
        } = self;
        let mut register = Register {
            clients: HashMap::new(),
            abos: HashMap::new(),
            publikum: HashMap::new(),
            voice,
            zwangstrennungen,
        };
        tokio::spawn(async move {
            while let Some(befehl) = rx.recv().await {
                register.ausfuehren(befehl);
            }
            tracing::debug!("Hub-Register beendet");
        })
    }
}

impl Register {
    fn ausfuehren(&mut self, befehl: Befehl) {
        match befehl {
            Befehl::Registrieren(sender) => {
                tracing::debug!(client_id = %sender.client_id, "Client registriert");
                self.clients.insert(sender.client_id, sender);
            }
            Befehl::Abmelden(client) => {
                if self.entfernen(client) {
                    tracing::debug!(client_id = %client, "Client abgemeldet");
                }
            }
            Befehl::Abonnieren(client, schluessel) => {
                if !self.clients.contains_key(&client) {
                    return;
                }
                tracing::debug!(client_id = %client, schluessel = %schluessel, "Abonniert");
                self.abos.entry(schluessel).or_default().insert(client);
            }
            Befehl::Abbestellen(client, schluessel) => {
                if let Some(menge) = self.abos.get_mut(&schluessel) {
                    menge.remove(&client);
                    if menge.is_empty() {
                        self.abos.remove(&schluessel);
                    }
                }
            }
            Befehl::ServerBeitreten(client, server) => {
                if self.clients.contains_key(&client) {
                    self.publikum.entry(server).or_default().insert(client);
                }
            }
            Befehl::AnChannel(schluessel, text) => {
                let ziele = ziele(self.abos.get(&schluessel));
                self.verteilen(ziele, text);
            }
            Befehl::AnServer(server, text) => {
                let ziele = ziele(self.publikum.get(&server));
                self.verteilen(ziele, text);
            }
            Befehl::AnClient(client, text) => self.verteilen(vec![client], text),
            Befehl::Abonnenten(schluessel, antwort) => {
                let _ = antwort.send(ziele(self.abos.get(&schluessel)));
            }
            Befehl::Publikum(server, antwort) => {
                let _ = antwort.send(ziele(self.publikum.get(&server)));
            }
            Befehl::IstRegistriert(client, antwort) => {
                let _ = antwort.send(self.clients.contains_key(&client));
            }
            Befehl::Statistik(antwort) => {
                let _ = antwort.send(RegisterStatistik {
                    clients: self.clients.len(),
                    abonnements: self.abos.values().map(HashSet::len).sum(),
                    server_publikum: self.publikum.values().map(HashSet::len).sum(),
                    zwangstrennungen: self.zwangstrennungen.load(Ordering::Relaxed),
                });
            }
        }
    }

    fn verteilen(&mut self, ziele: Vec<ClientId>, text: Arc<str>) {
        for client in ziele {
            let Some(sender) = self.clients.get(&client) else {
                continue;
            };
            match sender.senden(Arc::clone(&text)) {
                Zustellung::Eingereiht => {}
                Zustellung::QueueVoll => self.zwangstrennen(client),
                Zustellung::Geschlossen => {
                    self.entfernen(client);
                }
            }
        }
    }

    fn zwangstrennen(&mut self, client: ClientId) {
        self.entfernen(client);
        self.zwangstrennungen.fetch_add(1, Ordering::Relaxed);
        self.voice.voice_abmelden(client);
    }

    /// Entfernt den Client aus allen Tabellen; `false` wenn unbekannt
    fn entfernen(&mut self, client: ClientId) -> bool {
        let bekannt = self.clients.remove(&client).is_some();
        self.abos.retain(|_, menge| {
            menge.remove(&client);
            !menge.is_empty()
        });
        self.publikum.retain(|_, menge| {
            menge.remove(&client);
            !menge.is_empty()
        });
        bekannt
    }
}

fn ziele(menge: Option<&HashSet<ClientId>>) -> Vec<ClientId> {
    menge.map(|m| m.iter().copied().collect()).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
