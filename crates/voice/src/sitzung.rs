//! Medien-Sitzung – Verhandlungszustand einer Peer-Verbindung
//!
//! ```text
//! Erstellt --angebot--> Verhandelnd --antwort--> Stabil
//!     \                      |                     |
//!      `---------------------+----schliessen-------+--> Geschlossen
//! ```
//!
//! ICE-Kandidaten, die vor der entfernten Beschreibung eintreffen, werden
//! gepuffert und nach deren Annahme in Eingangsreihenfolge angewendet.
//! Puffer und Zustand liegen hinter einem gemeinsamen async Mutex.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use funkhaus_core::{ChannelId, ClientId, ServerId};
use funkhaus_protocol::{IceKandidat, SitzungsBeschreibung, TeilnehmerEreignis, TeilnehmerInhalt};
use parking_lot::Mutex;

use crate::error::{MedienFehler, MedienResult};
use crate::peer::{AusgangsSpur, PeerVerbindung, PeerZustand};

// ---------------------------------------------------------------------------
// Teilnehmer
// ---------------------------------------------------------------------------

/// Identitaet des Clients, dem eine Sitzung gehoert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Teilnehmer {
    pub client_id: ClientId,
    pub name: String,
    pub bild_url: String,
    /// Vom Browser gemeldete MediaStream-ID
    pub stream_id: Option<String>,
}

impl Teilnehmer {
    /// Roster-Eintrag; ohne Stream-ID wird die Client-ID verwendet
    pub fn als_inhalt(&self, ereignis: TeilnehmerEreignis) -> TeilnehmerInhalt {
        TeilnehmerInhalt {
            data: ereignis,
            username: self.name.clone(),
            stream_id: self
                .stream_id
                .clone()
                .unwrap_or_else(|| self.client_id.to_string()),
            bild_url: self.bild_url.clone(),
            client_id: self.client_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Verhandlungszustand
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerhandlungsZustand {
    /// Noch keine entfernte Beschreibung, noch kein Angebot
    Erstellt,
    /// Angebot gesendet, Kandidaten werden gepuffert
    Verhandelnd,
    /// Entfernte Beschreibung angenommen
    Stabil,
    Geschlossen,
}

struct Verhandlung {
    zustand: VerhandlungsZustand,
    ausstehend: VecDeque<IceKandidat>,
}

// ---------------------------------------------------------------------------
// MedienSitzung
// ---------------------------------------------------------------------------

pub struct MedienSitzung {
    id: u64,
    server: ServerId,
    kanal: ChannelId,
    teilnehmer: Mutex<Teilnehmer>,
    peer: Arc<dyn PeerVerbindung>,
    verhandlung: tokio::sync::Mutex<Verhandlung>,
}

impl MedienSitzung {
    pub fn neu(
        id: u64,
        peer: Arc<dyn PeerVerbindung>,
        teilnehmer: Teilnehmer,
        server: ServerId,
        kanal: ChannelId,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            server,
            kanal,
            teilnehmer: Mutex::new(teilnehmer),
            peer,
            verhandlung: tokio::sync::Mutex::new(Verhandlung {
                zustand: VerhandlungsZustand::Erstellt,
                ausstehend: VecDeque::new(),
            }),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn server(&self) -> ServerId {
        self.server
    }

    pub fn kanal(&self) -> ChannelId {
        self.kanal
    }

    pub fn client_id(&self) -> ClientId {
        self.teilnehmer.lock().client_id
    }

    pub fn teilnehmer(&self) -> Teilnehmer {
        self.teilnehmer.lock().clone()
    }

    pub fn stream_id_setzen(&self, stream_id: Option<String>) {
        if stream_id.is_some() {
            self.teilnehmer.lock().stream_id = stream_id;
        }
    }

    pub fn peer_zustand(&self) -> PeerZustand {
        self.peer.zustand()
    }

    pub async fn zustand(&self) -> VerhandlungsZustand {
        self.verhandlung.lock().await.zustand
    }

    /// Anzahl der noch nicht angewendeten Kandidaten
    pub async fn ausstehende_kandidaten(&self) -> usize {
        self.verhandlung.lock().await.ausstehend.len()
    }

    /// Kandidat anwenden oder bis zur Annahme der Antwort puffern
    pub async fn ice_kandidat_hinzufuegen(&self, kandidat: IceKandidat) -> MedienResult<()> {
        let mut v = self.verhandlung.lock().await;
        match v.zustand {
            VerhandlungsZustand::Geschlossen => Err(MedienFehler::Geschlossen),
            VerhandlungsZustand::Stabil => self.peer.ice_kandidat_anwenden(kandidat).await,
            VerhandlungsZustand::Erstellt | VerhandlungsZustand::Verhandelnd => {
                v.ausstehend.push_back(kandidat);
                Ok(())
            }
        }
    }

    /// Antwort des Browsers setzen und gepufferte Kandidaten anwenden
    ///
    /// Schlaegt das Setzen fehl, bleibt der Puffer unveraendert.
    pub async fn entfernte_beschreibung_setzen(
        &self,
        beschreibung: SitzungsBeschreibung,
    ) -> MedienResult<()> {
        let mut v = self.verhandlung.lock().await;
        if v.zustand == VerhandlungsZustand::Geschlossen {
            return Err(MedienFehler::Geschlossen);
        }

        self.peer.entfernte_beschreibung_setzen(beschreibung).await?;

        while let Some(kandidat) = v.ausstehend.pop_front() {
            if let Err(e) = self.peer.ice_kandidat_anwenden(kandidat).await {
                tracing::warn!(
                    sitzung = self.id,
                    fehler = %e,
                    "Gepufferter ICE-Kandidat abgelehnt"
                );
            }
        }
        v.zustand = VerhandlungsZustand::Stabil;
        Ok(())
    }

    /// Neues Angebot erstellen und als lokale Beschreibung setzen
    pub async fn angebot_erstellen(&self) -> MedienResult<SitzungsBeschreibung> {
        let mut v = self.verhandlung.lock().await;
        if v.zustand == VerhandlungsZustand::Geschlossen {
            return Err(MedienFehler::Geschlossen);
        }

        let angebot = self.peer.angebot_erstellen().await?;
        self.peer.lokale_beschreibung_setzen(angebot.clone()).await?;

        if v.zustand == VerhandlungsZustand::Erstellt {
            v.zustand = VerhandlungsZustand::Verhandelnd;
        }
        Ok(angebot)
    }

    /// Gleicht die gesendeten Spuren an die Soll-Menge an
    pub async fn spuren_abgleichen(&self, soll: &[Arc<dyn AusgangsSpur>]) -> MedienResult<()> {
        let gesendet: HashSet<String> = self.peer.gesendete_spur_ids().await.into_iter().collect();
        let soll_ids: HashSet<&str> = soll.iter().map(|s| s.id()).collect();

        for id in gesendet.iter().filter(|id| !soll_ids.contains(id.as_str())) {
            self.peer.spur_entfernen(id).await?;
        }
        for spur in soll.iter().filter(|s| !gesendet.contains(s.id())) {
            self.peer.spur_hinzufuegen(Arc::clone(spur)).await?;
        }
        Ok(())
    }

    pub async fn keyframe_anfordern(&self) -> MedienResult<()> {
        self.peer.keyframe_anfordern().await
    }

    /// Schliesst die native Verbindung; weitere Aufrufe sind wirkungslos
    pub async fn schliessen(&self) {
        let mut v = self.verhandlung.lock().await;
        if v.zustand == VerhandlungsZustand::Geschlossen {
            return;
        }
        v.zustand = VerhandlungsZustand::Geschlossen;
        v.ausstehend.clear();
        drop(v);

        if let Err(e) = self.peer.schliessen().await {
            tracing::debug!(sitzung = self.id, fehler = %e, "Peer-Verbindung schliessen");
        }
    }
}

impl std::fmt::Debug for MedienSitzung {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MedienSitzung")
            .field("id", &self.id)
            .field("server", &self.server)
            .field("kanal", &self.kanal)
            .field("client", &self.client_id())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
