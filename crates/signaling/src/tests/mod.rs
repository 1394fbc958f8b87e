//! Testaufbau fuer Hub, Dispatcher und Verbindungs-Pumpen

mod dispatcher_tests;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use funkhaus_chat::InMemoryVerzeichnis;
use funkhaus_core::models::{KanalTyp, MitgliedsRolle, Profil};
use funkhaus_core::{ChannelId, ClientId, ServerId};
use funkhaus_protocol::{IceKandidat, NachrichtenTyp, SitzungsBeschreibung, Umschlag};
use funkhaus_voice::{
    AusgangsSpur, MedienEngine, MedienResult, PeerEreignisse, PeerVerbindung, PeerZustand,
    RouterKonfig,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::dispatcher::VerbindungsKontext;
use crate::server_state::{SignalingConfig, SignalingState};

// ---------------------------------------------------------------------------
// Stille Media-Engine
// ---------------------------------------------------------------------------

/// Peer ohne Netzwerk; merkt sich angewendete Kandidaten
pub struct StillerPeer {
    kandidaten: Mutex<Vec<String>>,
    sender: Mutex<Vec<String>>,
    zustand: Mutex<PeerZustand>,
}

impl StillerPeer {
    pub fn kandidaten(&self) -> Vec<String> {
        self.kandidaten.lock().clone()
    }
}

#[async_trait]
impl PeerVerbindung for StillerPeer {
    async fn angebot_erstellen(&self) -> MedienResult<SitzungsBeschreibung> {
        Ok(SitzungsBeschreibung::angebot("v=0"))
    }

    async fn lokale_beschreibung_setzen(&self, _: SitzungsBeschreibung) -> MedienResult<()> {
        Ok(())
    }

    async fn entfernte_beschreibung_setzen(&self, _: SitzungsBeschreibung) -> MedienResult<()> {
        Ok(())
    }

    async fn ice_kandidat_anwenden(&self, kandidat: IceKandidat) -> MedienResult<()> {
        self.kandidaten.lock().push(kandidat.candidate);
        Ok(())
    }

    async fn spur_hinzufuegen(&self, spur: Arc<dyn AusgangsSpur>) -> MedienResult<()> {
        self.sender.lock().push(spur.id().to_string());
        Ok(())
    }

    async fn spur_entfernen(&self, spur_id: &str) -> MedienResult<()> {
        self.sender.lock().retain(|s| s != spur_id);
        Ok(())
    }

    async fn gesendete_spur_ids(&self) -> Vec<String> {
        self.sender.lock().clone()
    }

    async fn keyframe_anfordern(&self) -> MedienResult<()> {
        Ok(())
    }

    fn zustand(&self) -> PeerZustand {
        *self.zustand.lock()
    }

    async fn schliessen(&self) -> MedienResult<()> {
        *self.zustand.lock() = PeerZustand::Geschlossen;
        Ok(())
    }
}

#[derive(Default)]
pub struct StilleEngine {
    peers: Mutex<Vec<Arc<StillerPeer>>>,
}

impl StilleEngine {
    pub fn letzter_peer(&self) -> Arc<StillerPeer> {
        let peers = self.peers.lock();
        Arc::clone(&peers[peers.len() - 1])
    }
}

#[async_trait]
impl MedienEngine for StilleEngine {
    async fn peer_erstellen(
        &self,
        _ereignisse: Arc<dyn PeerEreignisse>,
    ) -> MedienResult<Arc<dyn PeerVerbindung>> {
        let peer = Arc::new(StillerPeer {
            kandidaten: Mutex::new(Vec::new()),
            sender: Mutex::new(Vec::new()),
            zustand: Mutex::new(PeerZustand::Neu),
        });
        self.peers.lock().push(Arc::clone(&peer));
        Ok(peer as Arc<dyn PeerVerbindung>)
    }
}

// ---------------------------------------------------------------------------
// Aufbau
// ---------------------------------------------------------------------------

pub struct Aufbau {
    pub state: Arc<SignalingState>,
    pub engine: Arc<StilleEngine>,
    pub verzeichnis: Arc<InMemoryVerzeichnis>,
    pub besitzer: Profil,
    pub server: ServerId,
    pub textkanal: ChannelId,
    pub voicekanal: ChannelId,
}

pub fn aufbau() -> Aufbau {
    aufbau_mit(SignalingConfig::default())
}

/// Muss innerhalb einer Tokio-Runtime laufen
pub fn aufbau_mit(config: SignalingConfig) -> Aufbau {
    let verzeichnis = Arc::new(InMemoryVerzeichnis::neu());
    let besitzer = verzeichnis.profil_anlegen("Anna", "https://bilder/anna.png");
    let server = verzeichnis.server_anlegen("Stammtisch", besitzer.id);
    let textkanal = verzeichnis.kanal_anlegen(server.id, "allgemein", KanalTyp::Text);
    let voicekanal = verzeichnis.kanal_anlegen(server.id, "Lounge", KanalTyp::Audio);
    let engine = Arc::new(StilleEngine::default());

    let state = SignalingState::neu(
        config,
        engine.clone(),
        RouterKonfig::default(),
        verzeichnis.clone(),
        verzeichnis.clone(),
    );
    Aufbau {
        state,
        engine,
        verzeichnis,
        besitzer,
        server: server.id,
        textkanal: textkanal.id,
        voicekanal: voicekanal.id,
    }
}

impl Aufbau {
    /// Registriert eine Verbindung im Hub ohne echten Socket
    pub fn verbinden(&self, profil: &Profil) -> (VerbindungsKontext, mpsc::Receiver<Arc<str>>) {
        let client_id = ClientId::new();
        let rx = self.state.hub.registrieren(client_id);
        (VerbindungsKontext::neu(client_id, profil.clone()), rx)
    }

    pub fn gast(&self, name: &str) -> Profil {
        let profil = self.verzeichnis.profil_anlegen(name, "");
        self.verzeichnis
            .mitglied_hinzufuegen(self.server, profil.id, MitgliedsRolle::Guest);
        profil
    }
}

/// Wartet auf den naechsten Umschlag des gewuenschten Typs
pub async fn warten_auf(rx: &mut mpsc::Receiver<Arc<str>>, typ: NachrichtenTyp) -> Umschlag {
    let suche = async {
        loop {
            let text = rx.recv().await.expect("Queue geschlossen");
            let umschlag = Umschlag::dekodieren(&text).expect("Server sendet gueltige Umschlaege");
            if umschlag.typ == typ {
                return umschlag;
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), suche)
        .await
        .expect("Umschlag nicht rechtzeitig empfangen")
}

/// Wiederholt eine Pruefung, bis sie gilt oder die Zeit ablaeuft
pub async fn bis<F, Fut>(mut pruefung: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if pruefung().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("Bedingung nicht rechtzeitig erfuellt");
}
