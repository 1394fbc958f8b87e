//! Attrappen fuer Engine, Peer-Verbindung und Signaling-Zustellung


use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use funkhaus_core::{ClientId, ServerId};
use funkhaus_protocol::{
    IceKandidat, Inhalt, NachrichtenTyp, SitzungsBeschreibung, TeilnehmerEreignis, Umschlag,
};
use parking_lot::Mutex;

use crate::error::{MedienFehler, MedienResult};
use crate::peer::{AusgangsSpur, MedienEngine, PeerEreignisse, PeerVerbindung, PeerZustand};
use crate::router::SignalZustellung;

// ---------------------------------------------------------------------------
// FakeSpur
// ---------------------------------------------------------------------------

pub struct FakeSpur {
    id: String,
}

impl FakeSpur {
    pub fn neu(id: &str) -> Arc<Self> {
        Arc::new(Self { id: id.to_string() })
    }
}

impl AusgangsSpur for FakeSpur {
    fn id(&self) -> &str {
        &self.id
    }

    fn stream_id(&self) -> &str {
        "fake-stream"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// FakePeer
// ---------------------------------------------------------------------------

struct FakePeerZustand {
    kandidaten: Vec<String>,
    sender: Vec<String>,
    angebote: usize,
    keyframes: usize,
    zustand: PeerZustand,
    antwort_ablehnen: bool,
    angebot_ablehnen: bool,
}

pub struct FakePeer {
    inner: Mutex<FakePeerZustand>,
}

impl FakePeer {
    pub fn neu() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(FakePeerZustand {
                kandidaten: Vec::new(),
                sender: Vec::new(),
                angebote: 0,
                keyframes: 0,
                zustand: PeerZustand::Neu,
                antwort_ablehnen: false,
                angebot_ablehnen: false,
            }),
        })
    }

    pub fn angewendete_kandidaten(&self) -> Vec<String> {
        self.inner.lock().kandidaten.clone()
    }

    pub fn sender(&self) -> Vec<String> {
        self.inner.lock().sender.clone()
    }

    pub fn angebote(&self) -> usize {
        self.inner.lock().angebote
    }

    pub fn keyframes(&self) -> usize {
        self.inner.lock().keyframes
    }

    pub fn antwort_ablehnen(&self, ablehnen: bool) {
        self.inner.lock().antwort_ablehnen = ablehnen;
    }

    pub fn angebot_ablehnen(&self, ablehnen: bool) {
        self.inner.lock().angebot_ablehnen = ablehnen;
    }

    pub fn zustand_lesen(&self) -> PeerZustand {
        self.inner.lock().zustand
    }

    pub fn zustand_setzen(&self, zustand: PeerZustand) {
        self.inner.lock().zustand = zustand;
    }
}

#[async_trait]
impl PeerVerbindung for FakePeer {
    async fn angebot_erstellen(&self) -> MedienResult<SitzungsBeschreibung> {
        let mut z = self.inner.lock();
        if z.angebot_ablehnen {
            return Err(MedienFehler::Native("Angebot abgelehnt".into()));
        }
        z.angebote += 1;
        Ok(SitzungsBeschreibung::angebot(format!("v=0 angebot-{}", z.angebote)))
    }

    async fn lokale_beschreibung_setzen(&self, _: SitzungsBeschreibung) -> MedienResult<()> {
        Ok(())
    }

    async fn entfernte_beschreibung_setzen(&self, _: SitzungsBeschreibung) -> MedienResult<()> {
        if self.inner.lock().antwort_ablehnen {
            return Err(MedienFehler::Native("Antwort abgelehnt".into()));
        }
        Ok(())
    }

    async fn ice_kandidat_anwenden(&self, kandidat: IceKandidat) -> MedienResult<()> {
        self.inner.lock().kandidaten.push(kandidat.candidate);
        Ok(())
    }

    async fn spur_hinzufuegen(&self, spur: Arc<dyn AusgangsSpur>) -> MedienResult<()> {
        self.inner.lock().sender.push(spur.id().to_string());
        Ok(())
    }

    async fn spur_entfernen(&self, spur_id: &str) -> MedienResult<()> {
        self.inner.lock().sender.retain(|s| s != spur_id);
        Ok(())
    }

    async fn gesendete_spur_ids(&self) -> Vec<String> {
        self.inner.lock().sender.clone()
    }

    async fn keyframe_anfordern(&self) -> MedienResult<()> {
        self.inner.lock().keyframes += 1;
        Ok(())
    }

    fn zustand(&self) -> PeerZustand {
        self.inner.lock().zustand
    }

    async fn schliessen(&self) -> MedienResult<()> {
        self.inner.lock().zustand = PeerZustand::Geschlossen;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FakeEngine
// ---------------------------------------------------------------------------

/// Merkt sich jeden erzeugten Peer samt Ereignis-Empfaenger
#[derive(Default)]
pub struct FakeEngine {
    peers: Mutex<Vec<(Arc<FakePeer>, Arc<dyn PeerEreignisse>)>>,
}

impl FakeEngine {
    pub fn peer(&self, index: usize) -> Arc<FakePeer> {
        Arc::clone(&self.peers.lock()[index].0)
    }

    pub fn ereignisse(&self, index: usize) -> Arc<dyn PeerEreignisse> {
        Arc::clone(&self.peers.lock()[index].1)
    }

    pub fn anzahl(&self) -> usize {
        self.peers.lock().len()
    }
}

#[async_trait]
impl MedienEngine for FakeEngine {
    async fn peer_erstellen(
        &self,
        ereignisse: Arc<dyn PeerEreignisse>,
    ) -> MedienResult<Arc<dyn PeerVerbindung>> {
        let peer = FakePeer::neu();
        self.peers.lock().push((Arc::clone(&peer), ereignisse));
        Ok(peer as Arc<dyn PeerVerbindung>)
    }
}

// ---------------------------------------------------------------------------
// Mitschnitt
// ---------------------------------------------------------------------------

/// Zeichnet alle ausgehenden Signaling-Nachrichten auf
#[derive(Default)]
pub struct Mitschnitt {
    pub an_clients: Mutex<Vec<(ClientId, Umschlag)>>,
    pub an_server: Mutex<Vec<(ServerId, Umschlag)>>,
}

impl Mitschnitt {
    /// Teilnehmer-Deltas in Sendereihenfolge: (Kanal, Ereignis, Client)
    pub fn teilnehmer_ereignisse(&self) -> Vec<(String, TeilnehmerEreignis, ClientId)> {
        self.an_server
            .lock()
            .iter()
            .filter_map(|(_, u)| match &u.inhalt {
                Inhalt::Teilnehmer(t) => Some((
                    u.channel.clone().unwrap_or_default(),
                    t.data,
                    t.client_id,
                )),
                _ => None,
            })
            .collect()
    }

    pub fn nachrichten_an(&self, client: ClientId, typ: NachrichtenTyp) -> usize {
        self.an_clients
            .lock()
            .iter()
            .filter(|(c, u)| *c == client && u.typ == typ)
            .count()
    }
}

impl SignalZustellung for Mitschnitt {
    fn an_client(&self, client: ClientId, umschlag: Umschlag) {
        self.an_clients.lock().push((client, umschlag));
    }

    fn an_server(&self, server: ServerId, umschlag: Umschlag) {
        self.an_server.lock().push((server, umschlag));
    }
}
