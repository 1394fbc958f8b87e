//! Schnittstelle zur nativen WebRTC-Engine
//!
//! Router und Medien-Sitzung sprechen nur ueber diese Traits mit der
//! Engine. Die Anbindung an `webrtc` liegt in [`crate::webrtc_engine`],
//! Tests verwenden eigene Attrappen.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use funkhaus_protocol::{IceKandidat, SitzungsBeschreibung};

use crate::error::MedienResult;

/// Verbindungszustand einer nativen Peer-Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerZustand {
    Neu,
    Verbindend,
    Verbunden,
    Getrennt,
    Fehlgeschlagen,
    Geschlossen,
}

/// Geteilte ausgehende Spur, die RTP einer eingehenden Spur weiterreicht
///
/// Eine Instanz wird in jede Peer-Verbindung des Kanals als Sender
/// eingehaengt.
pub trait AusgangsSpur: Send + Sync + 'static {
    /// Spur-ID (identisch zur ID der eingehenden Spur)
    fn id(&self) -> &str;

    fn stream_id(&self) -> &str;

    /// Zugriff auf den konkreten Typ fuer die jeweilige Engine
    fn as_any(&self) -> &dyn Any;
}

/// Eine native Peer-Verbindung
#[async_trait]
pub trait PeerVerbindung: Send + Sync + 'static {
    async fn angebot_erstellen(&self) -> MedienResult<SitzungsBeschreibung>;

    async fn lokale_beschreibung_setzen(&self, beschreibung: SitzungsBeschreibung)
        -> MedienResult<()>;

    async fn entfernte_beschreibung_setzen(
        &self,
        beschreibung: SitzungsBeschreibung,
    ) -> MedienResult<()>;

    async fn ice_kandidat_anwenden(&self, kandidat: IceKandidat) -> MedienResult<()>;

    /// Haengt eine geteilte Spur als Sender an
    async fn spur_hinzufuegen(&self, spur: Arc<dyn AusgangsSpur>) -> MedienResult<()>;

    /// Entfernt den Sender mit dieser Spur-ID
    async fn spur_entfernen(&self, spur_id: &str) -> MedienResult<()>;

    /// IDs aller Spuren, die aktuell gesendet werden
    async fn gesendete_spur_ids(&self) -> Vec<String>;

    /// Fordert per RTCP PLI ein Keyframe fuer alle empfangenen Spuren an
    async fn keyframe_anfordern(&self) -> MedienResult<()>;

    fn zustand(&self) -> PeerZustand;

    async fn schliessen(&self) -> MedienResult<()>;
}

/// Rueckmeldungen der Engine an den Router
///
/// Die Methoden werden aus Engine-Callbacks aufgerufen und duerfen
/// nicht blockieren. Spur- und Zustandsereignisse einer Verbindung
/// werden in Aufrufreihenfolge verarbeitet.
pub trait PeerEreignisse: Send + Sync + 'static {
    fn ice_kandidat_gefunden(&self, kandidat: IceKandidat);

    /// Eine eingehende Spur wurde empfangen; `spur` ist die geteilte Ausgangsspur
    fn spur_empfangen(&self, spur: Arc<dyn AusgangsSpur>);

    /// Die Weiterleitung der eingehenden Spur ist beendet
    fn spur_beendet(&self, spur_id: &str);

    fn zustand_geaendert(&self, zustand: PeerZustand);
}

/// Fabrik fuer Peer-Verbindungen
#[async_trait]
pub trait MedienEngine: Send + Sync + 'static {
    async fn peer_erstellen(
        &self,
        ereignisse: Arc<dyn PeerEreignisse>,
    ) -> MedienResult<Arc<dyn PeerVerbindung>>;
}
