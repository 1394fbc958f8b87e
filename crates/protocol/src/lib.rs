//! funkhaus-protocol – WebSocket-Protokoll-Definitionen
//!
//! Dieses Crate definiert den Signaling-Umschlag und alle Nutzlasten,
//! die zwischen Browser und Server ausgetauscht werden: Chat-Ereignisse,
//! WebRTC-Verhandlung (Angebot, Antwort, ICE-Kandidaten) und die
//! Teilnehmerliste der Voice-Kanaele.

pub mod error;
pub mod inhalt;
pub mod sitzung;
pub mod umschlag;

pub use error::{ProtokollFehler, ProtokollResult};
pub use inhalt::{
    ChatInhalt, Inhalt, TeilnehmerEreignis, TeilnehmerInhalt, Teilnehmerliste, WebRtcInhalt,
};
pub use sitzung::{BeschreibungsTyp, IceKandidat, SitzungsBeschreibung};
pub use umschlag::{NachrichtenTyp, Umschlag};
